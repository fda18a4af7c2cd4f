//! Top-level nodes: the config block, subprograms, probes and their attach
//! points.

use std::collections::HashSet;

use crate::ast::{
    ast::{parse_u64, AttachPoint, Config, Probe, ProbeType, Program, Subprog},
    expressions::ExprKind,
    statements::StmtKind,
    types::{SizedType, StackMode},
};

use super::{
    calls::{lookup_call, single_provider_type},
    maps::MapRegistry,
    scopes::{Declaration, Variable},
    semantic_analyser::{ProbeContext, SemanticAnalyser, SubprogContext, SubprogSignature},
};

const PROFILE_UNITS: &[&str] = &["hz", "s", "ms", "us"];
const WATCHPOINT_LENGTHS: &[u64] = &[1, 2, 4, 8];
const ITERATORS: &[&str] = &["task", "task_file", "task_vma"];

impl SemanticAnalyser<'_> {
    pub(super) fn visit_program(&mut self, program: &mut Program) {
        self.config = self.base_config.clone();
        self.has_begin_probe = false;
        self.has_end_probe = false;

        if let Some(config) = program.config.as_mut() {
            self.visit_config(config);
        }

        self.register_subprogs(&mut program.subprogs);
        for subprog in program.subprogs.iter_mut() {
            self.visit_subprog(subprog);
        }

        for probe in program.probes.iter_mut() {
            self.visit_probe(probe);
        }

        if self.pass_tracker.is_final_pass() {
            self.check_map_keys();
            if !self.has_pos_param && self.config.num_params() > 0 {
                self.warning(
                    &program.span,
                    "Positional parameters were given but the program does not use any",
                );
            }
        }
    }

    fn visit_config(&mut self, config: &mut Config) {
        for stmt in config.stmts.iter_mut() {
            let StmtKind::AssignConfigVar { name, expr } = &mut stmt.kind else {
                self.error(&stmt.span, "Only config variables can be assigned in a config block");
                continue;
            };

            match name.as_str() {
                "max_strlen" => match self.literal_integer(expr) {
                    Some(value) if value > 0 => {
                        self.config.max_strlen = value as usize;
                        expr.ty = SizedType::int64();
                    }
                    _ => self.error(&expr.span, "max_strlen expects a positive integer"),
                },
                "unsafe" => match self.literal_integer(expr) {
                    Some(value) => {
                        self.config.unsafe_mode = value != 0;
                        expr.ty = SizedType::int64();
                    }
                    None => self.error(&expr.span, "unsafe expects an integer"),
                },
                "stack_mode" => {
                    let mode = match &expr.kind {
                        ExprKind::StackMode(mode) => Some(*mode),
                        ExprKind::Identifier(name) | ExprKind::String(name) => {
                            StackMode::from_name(name)
                        }
                        _ => None,
                    };

                    match mode {
                        Some(mode) => {
                            self.config.stack_mode = mode;
                            expr.ty = SizedType::stack_mode();
                        }
                        None => self.error(
                            &expr.span,
                            format!("Invalid stack mode: {}", expr.describe()),
                        ),
                    }
                }
                other => {
                    self.error(&stmt.span, format!("Unrecognized config variable: {}", other));
                }
            }
        }
    }

    fn register_subprogs(&mut self, subprogs: &mut [Subprog]) {
        self.subprogs.clear();

        for subprog in subprogs.iter_mut() {
            if lookup_call(&subprog.name).is_some() {
                self.error(
                    &subprog.span,
                    format!("Function name '{}' is reserved for a builtin function", subprog.name),
                );
                continue;
            }

            if self.subprogs.contains_key(&subprog.name) {
                self.error(
                    &subprog.span,
                    format!("Function '{}' is already defined", subprog.name),
                );
                continue;
            }

            let span = subprog.span.clone();
            let mut args = Vec::with_capacity(subprog.args.len());
            for arg in subprog.args.iter_mut() {
                self.resolve_type(&mut arg.ty, &arg.span, true);
                args.push(arg.ty.clone());
            }
            self.resolve_type(&mut subprog.return_type, &span, true);

            self.subprogs.insert(
                subprog.name.clone(),
                SubprogSignature {
                    args,
                    return_type: subprog.return_type.clone(),
                },
            );
        }
    }

    fn visit_subprog(&mut self, subprog: &mut Subprog) {
        self.probe = None;
        self.loop_depth = 0;
        self.subprog = Some(SubprogContext {
            name: subprog.name.clone(),
            return_type: subprog.return_type.clone(),
        });

        self.scopes.push(subprog.id);

        let mut seen = HashSet::new();
        for arg in &subprog.args {
            if !seen.insert(arg.name.as_str()) {
                self.error(
                    &arg.span,
                    format!("Duplicate argument {} in function {}", arg.name, subprog.name),
                );
                continue;
            }

            let decl = Declaration {
                node: subprog.id,
                span: arg.span.clone(),
            };
            if let Err(error) = self
                .scopes
                .declare(&arg.name, Variable::new(arg.ty.clone(), false, true), decl)
            {
                self.scope_error(&arg.span, error);
            }
        }

        self.visit_block(&mut subprog.block);
        self.scopes.pop();
        self.subprog = None;
    }

    fn visit_probe(&mut self, probe: &mut Probe) {
        self.subprog = None;
        self.loop_depth = 0;
        self.probe = Some(ProbeContext {
            attach_points: probe.attach_points.clone(),
            probe_type: single_provider_type(probe),
        });

        for ap in &probe.attach_points {
            self.visit_attach_point(ap);
        }

        self.scopes.push(probe.id);

        if let Some(pred) = probe.pred.as_mut() {
            self.visit_expr(pred);
            if !pred.ty.has_none() && !pred.ty.is_intlike() && !pred.ty.is_pointer() {
                self.error(
                    &pred.span,
                    format!("Invalid type for predicate: '{}'", pred.ty),
                );
            }
        }

        self.visit_block(&mut probe.block);
        self.scopes.pop();
        self.probe = None;
    }

    fn visit_attach_point(&mut self, ap: &AttachPoint) {
        let span = &ap.span;

        match ap.probe_type {
            ProbeType::Invalid => {
                self.error(span, format!("Invalid provider: '{}'", ap.provider));
                return;
            }
            ProbeType::Special => {
                match ap.provider.as_str() {
                    "BEGIN" => self.has_begin_probe = true,
                    _ => self.has_end_probe = true,
                }
                return;
            }
            _ => {}
        }

        if !self.features.has_probe_type(ap.probe_type) {
            self.error(
                span,
                format!("{} probes are not supported by this kernel", ap.probe_type),
            );
            return;
        }

        if ap.malformed {
            self.error(span, format!("Invalid attach point '{}': expected a number", ap.raw));
            return;
        }

        let check_symbols = !self.config.listing && !ap.has_wildcard();

        match ap.probe_type {
            ProbeType::Kprobe | ProbeType::Kretprobe | ProbeType::Fentry | ProbeType::Fexit => {
                if ap.func.is_empty() {
                    self.error(
                        span,
                        format!("{} probes should be attached to a function", ap.probe_type),
                    );
                } else if check_symbols && !self.symbols.has_kernel_function(&ap.func) {
                    self.error(span, format!("Kernel function '{}' does not exist", ap.func));
                }
            }
            ProbeType::RawTracepoint => {
                if ap.func.is_empty() {
                    self.error(span, "rawtracepoint probes should be attached to an event");
                }
            }
            ProbeType::Uprobe | ProbeType::Uretprobe | ProbeType::Usdt => {
                if ap.target.is_empty() {
                    self.error(
                        span,
                        format!("{} probes should have a target binary", ap.probe_type),
                    );
                } else if ap.func.is_empty() {
                    self.error(
                        span,
                        format!("{} probes should be attached to a function", ap.probe_type),
                    );
                }
            }
            ProbeType::Tracepoint => {
                if ap.target.is_empty() || ap.func.is_empty() {
                    self.error(span, "tracepoint probes must have a category and an event");
                } else if check_symbols && !self.symbols.has_tracepoint(&ap.target, &ap.func) {
                    self.error(
                        span,
                        format!("Tracepoint '{}:{}' does not exist", ap.target, ap.func),
                    );
                }
            }
            ProbeType::Profile | ProbeType::Interval => {
                if !PROFILE_UNITS.contains(&ap.target.as_str()) {
                    self.error(
                        span,
                        format!("{} unit '{}' is not one of hz, s, ms or us", ap.probe_type, ap.target),
                    );
                } else if ap.freq.unwrap_or(0) == 0 {
                    self.error(
                        span,
                        format!("{} probes need a non-zero rate", ap.probe_type),
                    );
                }
            }
            ProbeType::Software | ProbeType::Hardware => {
                if ap.target.is_empty() {
                    self.error(
                        span,
                        format!("{} probes should name an event", ap.probe_type),
                    );
                }
            }
            ProbeType::Watchpoint => self.check_watchpoint(ap),
            ProbeType::Iter => {
                if !ITERATORS.contains(&ap.target.as_str()) {
                    self.error(span, format!("iter '{}' is not supported", ap.target));
                }
            }
            ProbeType::Invalid | ProbeType::Special => {}
        }
    }

    fn check_watchpoint(&mut self, ap: &AttachPoint) {
        let span = &ap.span;

        if !parse_u64(&ap.target).is_some_and(|address| address != 0) {
            self.error(span, format!("Invalid watchpoint address: '{}'", ap.target));
            return;
        }

        if !ap.freq.is_some_and(|len| WATCHPOINT_LENGTHS.contains(&len)) {
            self.error(span, "watchpoint length must be one of (1, 2, 4, 8)");
            return;
        }

        let mut modes = HashSet::new();
        let valid = !ap.func.is_empty()
            && ap
                .func
                .chars()
                .all(|mode| matches!(mode, 'r' | 'w' | 'x') && modes.insert(mode));
        if !valid {
            self.error(span, "watchpoint mode must be a combination of (r, w, x)");
        }
    }

    /// Map keys must be settled by the end of the analysis.
    fn check_map_keys(&mut self) {
        let mut failures = vec![];

        for ident in self.maps.idents() {
            let Some(info) = self.maps.get(ident) else {
                continue;
            };
            if let Some(key) = &info.key {
                if let Err(error) = MapRegistry::validate_map_key(ident, key) {
                    failures.push((info.key_span.clone(), error));
                }
            }
        }

        for (span, error) in failures {
            self.map_error(&span, error);
        }
    }
}
