use std::collections::HashMap;

use crate::ast::ast::ProbeType;

pub trait FeatureProvider {
    /// True if the kernel offers the BPF helper `name`.
    fn has_helper(&self, name: &str) -> bool;
    fn has_probe_type(&self, probe_type: ProbeType) -> bool;
}

/// Fixed feature set. Anything not listed falls back to the default.
#[derive(Debug, Clone)]
pub struct StaticFeatures {
    default: bool,
    helpers: HashMap<String, bool>,
    probe_types: HashMap<ProbeType, bool>,
}

impl StaticFeatures {
    /// Every helper and probe type is available.
    pub fn all() -> Self {
        StaticFeatures {
            default: true,
            helpers: HashMap::new(),
            probe_types: HashMap::new(),
        }
    }

    /// Nothing is available.
    pub fn none() -> Self {
        StaticFeatures {
            default: false,
            ..StaticFeatures::all()
        }
    }

    pub fn with_helper(mut self, name: &str) -> Self {
        self.helpers.insert(String::from(name), true);
        self
    }

    pub fn without_helper(mut self, name: &str) -> Self {
        self.helpers.insert(String::from(name), false);
        self
    }

    pub fn with_probe_type(mut self, probe_type: ProbeType) -> Self {
        self.probe_types.insert(probe_type, true);
        self
    }

    pub fn without_probe_type(mut self, probe_type: ProbeType) -> Self {
        self.probe_types.insert(probe_type, false);
        self
    }
}

impl Default for StaticFeatures {
    fn default() -> Self {
        StaticFeatures::all()
    }
}

impl FeatureProvider for StaticFeatures {
    fn has_helper(&self, name: &str) -> bool {
        *self.helpers.get(name).unwrap_or(&self.default)
    }

    fn has_probe_type(&self, probe_type: ProbeType) -> bool {
        *self.probe_types.get(&probe_type).unwrap_or(&self.default)
    }
}
