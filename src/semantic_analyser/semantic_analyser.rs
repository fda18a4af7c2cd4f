use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::{
    ast::{
        ast::{AttachPoint, NodeId, ProbeType, Program},
        types::SizedType,
    },
    config::AnalyserConfig,
    log::DiagnosticSink,
    providers::{FeatureProvider, SymbolProvider},
};

use super::{maps::MapRegistry, scopes::ScopeTable};

/// Bookkeeping for the fixed-point iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTracker {
    num_passes: usize,
    num_unresolved: usize,
    is_final_pass: bool,
}

impl Default for PassTracker {
    fn default() -> Self {
        PassTracker {
            num_passes: 1,
            num_unresolved: 0,
            is_final_pass: false,
        }
    }
}

impl PassTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_num_unresolved(&mut self) {
        self.num_unresolved += 1;
    }

    pub fn reset_num_unresolved(&mut self) {
        self.num_unresolved = 0;
    }

    pub fn get_num_unresolved(&self) -> usize {
        self.num_unresolved
    }

    pub fn inc_num_passes(&mut self) {
        self.num_passes += 1;
    }

    pub fn get_num_passes(&self) -> usize {
        self.num_passes
    }

    pub fn mark_final_pass(&mut self) {
        self.is_final_pass = true;
    }

    pub fn is_final_pass(&self) -> bool {
        self.is_final_pass
    }
}

/// Where the expression being visited sits relative to an assignment.
/// Only the outermost expression of a right-hand side or map key sees
/// anything other than `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum AssignTarget {
    #[default]
    None,
    Map,
    Variable,
    MapKey,
}

#[derive(Debug, Clone)]
pub(super) struct ProbeContext {
    pub attach_points: Vec<AttachPoint>,
    pub probe_type: ProbeType,
}

#[derive(Debug, Clone)]
pub(super) struct SubprogContext {
    pub name: String,
    pub return_type: SizedType,
}

#[derive(Debug, Clone)]
pub(super) struct SubprogSignature {
    pub args: Vec<SizedType>,
    pub return_type: SizedType,
}

/// Decorates a [`Program`] with types.
///
/// ```ignore
/// let mut sink = DiagnosticCollector::new();
/// let mut analyser = SemanticAnalyser::new(&mut sink, &features, &symbols, config);
/// let errors = analyser.analyse(&mut program);
/// ```
pub struct SemanticAnalyser<'a> {
    pub(super) sink: &'a mut dyn DiagnosticSink,
    pub(super) features: &'a dyn FeatureProvider,
    pub(super) symbols: &'a dyn SymbolProvider,
    pub(super) base_config: AnalyserConfig,
    /// `base_config` with the program's config directives applied.
    pub(super) config: AnalyserConfig,
    pub(super) pass_tracker: PassTracker,
    pub(super) error_count: usize,
    pub(super) scopes: ScopeTable,
    pub(super) maps: MapRegistry,
    pub(super) for_captures: BTreeMap<NodeId, Vec<String>>,
    pub(super) loop_depth: usize,
    pub(super) probe: Option<ProbeContext>,
    pub(super) subprog: Option<SubprogContext>,
    pub(super) subprogs: HashMap<String, SubprogSignature>,
    pub(super) assign_target: AssignTarget,
    pub(super) has_begin_probe: bool,
    pub(super) has_end_probe: bool,
    pub(super) has_pos_param: bool,
}

impl<'a> SemanticAnalyser<'a> {
    pub fn new(
        sink: &'a mut dyn DiagnosticSink,
        features: &'a dyn FeatureProvider,
        symbols: &'a dyn SymbolProvider,
        config: AnalyserConfig,
    ) -> Self {
        SemanticAnalyser {
            sink,
            features,
            symbols,
            config: config.clone(),
            base_config: config,
            pass_tracker: PassTracker::new(),
            error_count: 0,
            scopes: ScopeTable::new(),
            maps: MapRegistry::new(),
            for_captures: BTreeMap::new(),
            loop_depth: 0,
            probe: None,
            subprog: None,
            subprogs: HashMap::new(),
            assign_target: AssignTarget::None,
            has_begin_probe: false,
            has_end_probe: false,
            has_pos_param: false,
        }
    }

    fn reset(&mut self) {
        self.config = self.base_config.clone();
        self.pass_tracker = PassTracker::new();
        self.error_count = 0;
        self.scopes.clear();
        self.maps.clear();
        self.for_captures.clear();
        self.loop_depth = 0;
        self.probe = None;
        self.subprog = None;
        self.subprogs.clear();
        self.assign_target = AssignTarget::None;
        self.has_begin_probe = false;
        self.has_end_probe = false;
        self.has_pos_param = false;
    }

    /// Runs passes until every type is known, then a final strict pass.
    /// Returns the number of errors reported; zero means success.
    pub fn analyse(&mut self, program: &mut Program) -> usize {
        self.reset();
        let mut last_unresolved = usize::MAX;

        loop {
            self.run_pass(program);

            let unresolved = self.pass_tracker.get_num_unresolved();
            debug!(
                pass = self.pass_tracker.get_num_passes(),
                unresolved,
                errors = self.error_count,
                "semantic pass finished"
            );

            if self.error_count > 0 {
                return self.error_count;
            }

            if unresolved == 0 {
                break;
            }

            if unresolved >= last_unresolved
                || self.pass_tracker.get_num_passes() >= self.config.max_passes
            {
                let passes = self.pass_tracker.get_num_passes();
                self.final_pass(program);
                self.error(
                    &program.span,
                    format!(
                        "Unable to resolve all types: analysis did not converge after {} passes",
                        passes
                    ),
                );
                return self.error_count;
            }

            last_unresolved = unresolved;
            self.pass_tracker.inc_num_passes();
        }

        self.final_pass(program);
        self.error_count
    }

    fn run_pass(&mut self, program: &mut Program) {
        self.pass_tracker.reset_num_unresolved();
        self.scopes.reset_assignments();
        self.visit_program(program);
    }

    fn final_pass(&mut self, program: &mut Program) {
        self.pass_tracker.inc_num_passes();
        self.pass_tracker.mark_final_pass();
        self.run_pass(program);

        debug!(
            pass = self.pass_tracker.get_num_passes(),
            unresolved = self.pass_tracker.get_num_unresolved(),
            errors = self.error_count,
            "final semantic pass finished"
        );

        if self.error_count == 0 && self.pass_tracker.get_num_unresolved() > 0 {
            self.error(&program.span, "Unable to resolve all types");
        }
    }

    /// Passes taken by the last [`analyse`](Self::analyse) run, final pass
    /// included.
    pub fn num_passes(&self) -> usize {
        self.pass_tracker.get_num_passes()
    }

    /// Outer variables referenced by the body of the `for` statement `id`.
    pub fn captures(&self, id: NodeId) -> Option<&[String]> {
        self.for_captures.get(&id).map(Vec::as_slice)
    }

    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    pub fn scopes(&self) -> &ScopeTable {
        &self.scopes
    }

    /// Settings in effect after the program's config block.
    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_begin_probe(&self) -> bool {
        self.has_begin_probe
    }

    pub fn has_end_probe(&self) -> bool {
        self.has_end_probe
    }

    pub fn has_pos_param(&self) -> bool {
        self.has_pos_param
    }
}
