//! Analyser settings.
//!
//! [`AnalyserConfig`] holds the defaults a run starts from. A program's
//! `config = { ... }` block overrides `max_strlen`, `unsafe_mode` and
//! `stack_mode` for that run only.

use crate::ast::types::StackMode;

pub const DEFAULT_MAX_PASSES: usize = 10;
pub const DEFAULT_MAX_STRLEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyserConfig {
    /// Cap on fixed-point passes before giving up.
    pub max_passes: usize,
    /// Longest string value, terminator included.
    pub max_strlen: usize,
    /// Allow calls with side effects outside the traced process.
    pub unsafe_mode: bool,
    /// A child process is launched alongside the program.
    pub has_child: bool,
    /// Only listing probes; attach points are not checked.
    pub listing: bool,
    /// Default output format of `kstack` and `ustack`.
    pub stack_mode: StackMode,
    /// Positional parameters `$1`, `$2`, ...
    pub params: Vec<String>,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        AnalyserConfig {
            max_passes: DEFAULT_MAX_PASSES,
            max_strlen: DEFAULT_MAX_STRLEN,
            unsafe_mode: false,
            has_child: false,
            listing: false,
            stack_mode: StackMode::Bpftrace,
            params: vec![],
        }
    }
}

impl AnalyserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn with_max_strlen(mut self, max_strlen: usize) -> Self {
        self.max_strlen = max_strlen;
        self
    }

    pub fn with_unsafe(mut self, unsafe_mode: bool) -> Self {
        self.unsafe_mode = unsafe_mode;
        self
    }

    pub fn with_child(mut self, has_child: bool) -> Self {
        self.has_child = has_child;
        self
    }

    pub fn with_listing(mut self, listing: bool) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_stack_mode(mut self, stack_mode: StackMode) -> Self {
        self.stack_mode = stack_mode;
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// The 1-based positional parameter `n`.
    pub fn param(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|index| self.params.get(index))
            .map(String::as_str)
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyserConfig::default();
        assert_eq!(config.max_passes, 10);
        assert_eq!(config.max_strlen, 64);
        assert!(!config.unsafe_mode);
        assert_eq!(config.stack_mode, StackMode::Bpftrace);
    }

    #[test]
    fn test_params_are_one_based() {
        let config = AnalyserConfig::new().with_params(vec!["10".to_string(), "sh".to_string()]);
        assert_eq!(config.param(0), None);
        assert_eq!(config.param(1), Some("10"));
        assert_eq!(config.param(2), Some("sh"));
        assert_eq!(config.param(3), None);
        assert_eq!(config.num_params(), 2);
    }

    #[test]
    fn test_max_passes_at_least_one() {
        assert_eq!(AnalyserConfig::new().with_max_passes(0).max_passes, 1);
    }
}
