//! Builtin identifiers: `pid`, `comm`, `args`, `arg0`, ...

use std::rc::Rc;

use crate::{
    ast::{
        ast::ProbeType,
        expressions::numbered_builtin,
        types::{AddrSpace, Record, SizedType},
    },
    Span,
};

use super::{
    calls::find_addrspace,
    semantic_analyser::{ProbeContext, SemanticAnalyser},
};

/// Default frame limit of `kstack` and `ustack`.
pub const DEFAULT_STACK_LIMIT: u32 = 127;
/// `argN` is available for N in `0..MAX_ARGS`.
pub const MAX_ARGS: usize = 6;
pub const COMM_SIZE: usize = 16;

impl SemanticAnalyser<'_> {
    pub(super) fn visit_builtin(&mut self, name: &str, span: &Span) -> SizedType {
        match name {
            "pid" | "tid" | "uid" | "gid" | "cpu" | "numaid" | "rand" | "nsecs" | "elapsed"
            | "cgroup" | "jiffies" | "curtask" => SizedType::uint64(),
            "cpid" => {
                if !self.config.has_child {
                    self.error(span, "cpid cannot be used without child command");
                }
                SizedType::uint64()
            }
            "comm" => SizedType::string(COMM_SIZE),
            "username" => SizedType::username(),
            "kstack" => SizedType::stack(true, self.config.stack_mode, DEFAULT_STACK_LIMIT),
            "ustack" => SizedType::stack(false, self.config.stack_mode, DEFAULT_STACK_LIMIT),
            _ => {
                let Some(probe) = self.probe.clone() else {
                    self.error(
                        span,
                        format!("The {} builtin can only be used inside a probe", name),
                    );
                    return SizedType::none();
                };

                match name {
                    "func" => self.builtin_func(&probe, span),
                    "probe" => self.builtin_probe(&probe),
                    "retval" => self.builtin_retval(&probe, span),
                    "args" => self.builtin_args(&probe, span),
                    _ => self.builtin_numbered(name, &probe, span),
                }
            }
        }
    }

    fn builtin_func(&mut self, probe: &ProbeContext, span: &Span) -> SizedType {
        let mut result: Option<SizedType> = None;

        for ap in &probe.attach_points {
            let ty = match ap.probe_type {
                ProbeType::Kprobe | ProbeType::Kretprobe | ProbeType::Fentry | ProbeType::Fexit => {
                    SizedType::ksym()
                }
                ProbeType::Uprobe | ProbeType::Uretprobe | ProbeType::Usdt => SizedType::usym(),
                other => {
                    self.error(
                        span,
                        format!("The func builtin can not be used with '{}' probes", other),
                    );
                    return SizedType::none();
                }
            };

            match &result {
                Some(previous) if *previous != ty => {
                    self.error(
                        span,
                        "The func builtin can not be used in a probe attached to both kernel and user functions",
                    );
                    return SizedType::none();
                }
                _ => result = Some(ty),
            }
        }

        result.unwrap_or_default()
    }

    fn builtin_probe(&mut self, probe: &ProbeContext) -> SizedType {
        let longest = probe
            .attach_points
            .iter()
            .map(|ap| ap.name().len())
            .max()
            .unwrap_or(0);
        SizedType::string(longest + 1)
    }

    fn builtin_retval(&mut self, probe: &ProbeContext, span: &Span) -> SizedType {
        let Some(ap) = probe.attach_points.first() else {
            return SizedType::none();
        };

        for ap in &probe.attach_points {
            if !matches!(
                ap.probe_type,
                ProbeType::Kretprobe | ProbeType::Uretprobe | ProbeType::Fexit
            ) {
                self.error(
                    span,
                    "The retval builtin can only be used with 'kretprobe', 'uretprobe' and 'fexit' probes",
                );
                return SizedType::none();
            }
        }

        match ap.probe_type {
            ProbeType::Fexit => self
                .symbols
                .kfunc_return(&ap.func)
                .unwrap_or_else(SizedType::uint64)
                .with_addrspace(AddrSpace::Kernel),
            other => SizedType::uint64().with_addrspace(find_addrspace(other)),
        }
    }

    fn builtin_args(&mut self, probe: &ProbeContext, span: &Span) -> SizedType {
        let mut layout: Option<Rc<Record>> = None;

        for ap in &probe.attach_points {
            let record = match ap.probe_type {
                ProbeType::Tracepoint | ProbeType::Fentry | ProbeType::Fexit if ap.has_wildcard() => {
                    self.error(
                        span,
                        format!("The args builtin can not be used with wildcard probe '{}'", ap.raw),
                    );
                    return SizedType::none();
                }
                ProbeType::Tracepoint => self.symbols.tracepoint_args(&ap.target, &ap.func),
                ProbeType::Fentry | ProbeType::Fexit => self.symbols.kfunc_args(&ap.func),
                _ => {
                    self.error(
                        span,
                        "The args builtin can only be used with 'tracepoint', 'fentry' and 'fexit' probes",
                    );
                    return SizedType::none();
                }
            };

            let Some(record) = record else {
                self.error(span, format!("Could not resolve the arguments of '{}'", ap.raw));
                return SizedType::none();
            };

            match &layout {
                Some(previous) if **previous != *record => {
                    self.error(
                        span,
                        "The args builtin requires every attach point of the probe to have the same arguments",
                    );
                    return SizedType::none();
                }
                _ => layout = Some(record),
            }
        }

        match layout {
            Some(record) => SizedType::reference(
                SizedType::record(record).with_addrspace(AddrSpace::Kernel),
                AddrSpace::Kernel,
            ),
            None => SizedType::none(),
        }
    }

    /// `argN` and `sargN`.
    fn builtin_numbered(&mut self, name: &str, probe: &ProbeContext, span: &Span) -> SizedType {
        let (allowed, description): (&[ProbeType], &str) =
            if numbered_builtin(name, "sarg").is_some() {
                (&[ProbeType::Kprobe, ProbeType::Uprobe], "'kprobe' and 'uprobe'")
            } else if let Some(n) = numbered_builtin(name, "arg") {
                if n >= MAX_ARGS {
                    self.error(
                        span,
                        format!("{} is out of range: only arg0 to arg{} exist", name, MAX_ARGS - 1),
                    );
                    return SizedType::none();
                }
                (
                    &[ProbeType::Kprobe, ProbeType::Uprobe, ProbeType::Usdt],
                    "'kprobe', 'uprobe' and 'usdt'",
                )
            } else {
                self.error(span, format!("Unknown builtin: {}", name));
                return SizedType::none();
            };

        if let Some(ap) = probe
            .attach_points
            .iter()
            .find(|ap| !allowed.contains(&ap.probe_type))
        {
            self.error(
                span,
                format!(
                    "The {} builtin can only be used with {} probes, not '{}'",
                    name, description, ap.probe_type
                ),
            );
            return SizedType::none();
        }

        SizedType::uint64().with_addrspace(find_addrspace(probe.probe_type))
    }
}
