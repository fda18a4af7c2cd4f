//! Call validation.
//!
//! Every builtin function has a [`CallSignature`] in [`CALL_SIGNATURES`].
//! A call is checked for arity, for availability in the enclosing probe,
//! for its placement (aggregations must be assigned to a map directly) and
//! finally for the kinds of its arguments. User subprograms are checked
//! against their declared signature.

use std::{collections::BTreeSet, fmt::Display};

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    ast::{
        ast::{AttachPoint, Probe, ProbeType},
        expressions::{ExprKind, Expression},
        types::{is_same_type, AddrSpace, SizedType, Type},
    },
    Span,
};

use super::{
    builtins::DEFAULT_STACK_LIMIT,
    maps::MapRegistry,
    semantic_analyser::{AssignTarget, SemanticAnalyser, SubprogSignature},
};

pub const MAX_STACK_LIMIT: i64 = 1024;
pub const MAX_HIST_BITS: i64 = 5;
pub const MAX_LHIST_BUCKETS: i64 = 1000;
/// Upper bound on the argument count of variadic calls.
pub const MAX_VARIADIC_ARGS: usize = 64;

/// How a call's result type is determined.
#[derive(Debug, Clone, Copy)]
pub enum ReturnRule {
    Fixed(fn() -> SizedType),
    /// Aggregation whose sign follows the first argument.
    Signed(fn(bool) -> SizedType),
    /// Depends on the arguments.
    Computed,
}

#[derive(Debug, Clone, Copy)]
pub struct CallSignature {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    /// Probe types the call may appear in; empty means all.
    pub probe_types: &'static [ProbeType],
    /// BPF helper the call needs from the kernel.
    pub helper: Option<&'static str>,
    pub is_unsafe: bool,
    /// Must be the value of a map assignment.
    pub map_only: bool,
    pub ret: ReturnRule,
}

const fn call(name: &'static str, min_args: usize, max_args: usize, ret: ReturnRule) -> CallSignature {
    CallSignature {
        name,
        min_args,
        max_args,
        probe_types: &[],
        helper: None,
        is_unsafe: false,
        map_only: false,
        ret,
    }
}

const fn aggregation(name: &'static str, nargs: usize, ret: ReturnRule) -> CallSignature {
    CallSignature {
        map_only: true,
        ..call(name, nargs, nargs, ret)
    }
}

const REG_PROBES: &[ProbeType] = &[
    ProbeType::Kprobe,
    ProbeType::Kretprobe,
    ProbeType::Uprobe,
    ProbeType::Uretprobe,
    ProbeType::Usdt,
    ProbeType::Profile,
];

const USER_PROBES: &[ProbeType] = &[ProbeType::Uprobe, ProbeType::Uretprobe, ProbeType::Usdt];

const SIGNAL_PROBES: &[ProbeType] = &[
    ProbeType::Kprobe,
    ProbeType::Kretprobe,
    ProbeType::Uprobe,
    ProbeType::Uretprobe,
    ProbeType::Usdt,
    ProbeType::Tracepoint,
    ProbeType::RawTracepoint,
    ProbeType::Profile,
    ProbeType::Fentry,
    ProbeType::Fexit,
];

const PATH_PROBES: &[ProbeType] = &[ProbeType::Fentry, ProbeType::Fexit, ProbeType::Iter];

pub static CALL_SIGNATURES: &[CallSignature] = &[
    aggregation("count", 0, ReturnRule::Fixed(SizedType::count)),
    aggregation("sum", 1, ReturnRule::Signed(SizedType::sum)),
    aggregation("min", 1, ReturnRule::Signed(SizedType::min)),
    aggregation("max", 1, ReturnRule::Signed(SizedType::max)),
    aggregation("avg", 1, ReturnRule::Signed(SizedType::avg)),
    aggregation("stats", 1, ReturnRule::Signed(SizedType::stats)),
    CallSignature {
        max_args: 2,
        ..aggregation("hist", 1, ReturnRule::Fixed(SizedType::hist))
    },
    aggregation("lhist", 4, ReturnRule::Fixed(SizedType::lhist)),
    call("delete", 1, 2, ReturnRule::Fixed(SizedType::void)),
    call("clear", 1, 1, ReturnRule::Fixed(SizedType::void)),
    call("zero", 1, 1, ReturnRule::Fixed(SizedType::void)),
    call("len", 1, 1, ReturnRule::Fixed(SizedType::int64)),
    call("print", 1, 3, ReturnRule::Fixed(SizedType::void)),
    call("printf", 1, MAX_VARIADIC_ARGS, ReturnRule::Fixed(SizedType::void)),
    CallSignature {
        is_unsafe: true,
        ..call("system", 1, MAX_VARIADIC_ARGS, ReturnRule::Fixed(SizedType::void))
    },
    call("cat", 1, MAX_VARIADIC_ARGS, ReturnRule::Fixed(SizedType::void)),
    call("time", 0, 1, ReturnRule::Fixed(SizedType::void)),
    call("strftime", 2, 2, ReturnRule::Fixed(SizedType::timestamp)),
    call("str", 1, 2, ReturnRule::Computed),
    call("buf", 1, 2, ReturnRule::Computed),
    call("ksym", 1, 1, ReturnRule::Fixed(SizedType::ksym)),
    call("usym", 1, 1, ReturnRule::Fixed(SizedType::usym)),
    call("kaddr", 1, 1, ReturnRule::Fixed(SizedType::uint64)),
    CallSignature {
        probe_types: USER_PROBES,
        ..call("uaddr", 1, 1, ReturnRule::Fixed(SizedType::uint64))
    },
    call("kptr", 1, 1, ReturnRule::Computed),
    call("uptr", 1, 1, ReturnRule::Computed),
    call("ntop", 1, 2, ReturnRule::Computed),
    call("macaddr", 1, 1, ReturnRule::Fixed(SizedType::mac_address)),
    CallSignature {
        helper: Some("get_current_cgroup_id"),
        ..call("cgroupid", 1, 1, ReturnRule::Fixed(SizedType::uint64))
    },
    call("join", 1, 2, ReturnRule::Fixed(SizedType::void)),
    CallSignature {
        probe_types: REG_PROBES,
        ..call("reg", 1, 1, ReturnRule::Fixed(SizedType::uint64))
    },
    call("exit", 0, 1, ReturnRule::Fixed(SizedType::void)),
    CallSignature {
        probe_types: SIGNAL_PROBES,
        helper: Some("send_signal"),
        is_unsafe: true,
        ..call("signal", 1, 1, ReturnRule::Fixed(SizedType::void))
    },
    CallSignature {
        probe_types: &[ProbeType::Kprobe],
        helper: Some("override_return"),
        is_unsafe: true,
        ..call("override", 1, 1, ReturnRule::Fixed(SizedType::void))
    },
    call("strncmp", 3, 3, ReturnRule::Fixed(SizedType::uint64)),
    call("strcontains", 2, 2, ReturnRule::Fixed(SizedType::uint64)),
    CallSignature {
        probe_types: PATH_PROBES,
        helper: Some("d_path"),
        ..call("path", 1, 2, ReturnRule::Computed)
    },
    call("kstack", 0, 2, ReturnRule::Computed),
    call("ustack", 0, 2, ReturnRule::Computed),
];

/// Calls whose first argument may name a map as a whole.
const MAP_ARG_CALLS: &[&str] = &["delete", "clear", "zero", "len", "print"];

const REGISTERS: &[&str] = &[
    "ip", "sp", "bp", "ax", "bx", "cx", "dx", "si", "di", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "flags", "orig_ax", "cs", "ss",
];

const SIGNALS: &[&str] = &[
    "SIGABRT", "SIGALRM", "SIGBUS", "SIGCHLD", "SIGCONT", "SIGFPE", "SIGHUP", "SIGILL", "SIGINT",
    "SIGKILL", "SIGPIPE", "SIGPROF", "SIGQUIT", "SIGSEGV", "SIGSTOP", "SIGSYS", "SIGTERM",
    "SIGTRAP", "SIGTSTP", "SIGTTIN", "SIGTTOU", "SIGURG", "SIGUSR1", "SIGUSR2", "SIGVTALRM",
    "SIGWINCH", "SIGXCPU", "SIGXFSZ",
];

lazy_static! {
    static ref FORMAT_SPECIFIER: Regex =
        Regex::new(r"%[-+ #0]*[0-9]*(?:\.[0-9]+)?(?:hh|h|ll|l|z|j|t)?([a-zA-Z%])").unwrap();
}

pub fn lookup_call(name: &str) -> Option<&'static CallSignature> {
    CALL_SIGNATURES.iter().find(|signature| signature.name == name)
}

/// Memory space a probe type's context pointers refer to.
pub fn find_addrspace(probe_type: ProbeType) -> AddrSpace {
    probe_type.addrspace()
}

/// The probe type shared by every attach point, or `Invalid` when they
/// differ.
pub fn single_provider_type(probe: &Probe) -> ProbeType {
    let mut types = probe.attach_points.iter().map(|ap| ap.probe_type);
    match types.next() {
        Some(first) if types.all(|ty| ty == first) => first,
        _ => ProbeType::Invalid,
    }
}

/// Conversion specifiers of a format string, `%%` excluded.
pub fn format_specifiers(format: &str) -> Vec<char> {
    FORMAT_SPECIFIER
        .captures_iter(format)
        .filter_map(|captures| captures.get(1))
        .filter_map(|m| m.as_str().chars().next())
        .filter(|spec| *spec != '%')
        .collect()
}

fn format_accepts(spec: char, ty: &SizedType) -> Option<bool> {
    let accepts = match spec {
        'd' | 'i' | 'u' | 'x' | 'X' | 'o' | 'c' | 'p' => ty.is_intlike() || ty.is_pointer(),
        's' => !ty.is_void() && !matches!(ty.kind, Type::Hist | Type::Lhist | Type::Stats),
        'r' => ty.is_buffer() || ty.is_string() || ty.is_array(),
        _ => return None,
    };
    Some(accepts)
}

/// Argument kinds a call can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Integer,
    String,
    IntOrPointer,
}

impl ArgKind {
    fn accepts(self, ty: &SizedType) -> bool {
        match self {
            ArgKind::Integer => ty.is_intlike(),
            ArgKind::String => ty.is_string(),
            ArgKind::IntOrPointer => ty.is_intlike() || ty.is_pointer(),
        }
    }
}

impl Display for ArgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgKind::Integer => write!(f, "an integer"),
            ArgKind::String => write!(f, "a string"),
            ArgKind::IntOrPointer => write!(f, "an integer or pointer"),
        }
    }
}

impl SemanticAnalyser<'_> {
    pub(super) fn visit_call(
        &mut self,
        func: &str,
        args: &mut [Expression],
        span: &Span,
        target: AssignTarget,
    ) -> SizedType {
        if let Some(signature) = self.subprogs.get(func).cloned() {
            return self.visit_subprog_call(func, &signature, args, span);
        }

        self.visit_call_args(func, args);

        let Some(signature) = lookup_call(func) else {
            self.error(span, format!("Unknown function: '{}'", func));
            return SizedType::none();
        };

        let arity = if signature.min_args == signature.max_args {
            self.check_nargs(func, args, signature.min_args, span)
        } else {
            self.check_varargs(func, args, signature.min_args, signature.max_args, span)
        };
        if !arity || !self.check_call_available(signature, span) {
            return SizedType::none();
        }

        if signature.map_only && !self.check_assignment(func, span, target) {
            return SizedType::none();
        }

        if args.iter().any(|arg| arg.ty.has_none()) {
            return SizedType::none();
        }

        match signature.ret {
            ReturnRule::Fixed(make) => {
                if !self.check_call_args(func, args, span) {
                    return SizedType::none();
                }
                make()
            }
            ReturnRule::Signed(make) => {
                if !self.check_arg(func, args, ArgKind::Integer, 0, false, true) {
                    return SizedType::none();
                }
                make(args[0].ty.is_signed)
            }
            ReturnRule::Computed => self.call_return_type(func, args, span),
        }
    }

    fn visit_call_args(&mut self, func: &str, args: &mut [Expression]) {
        for (index, arg) in args.iter_mut().enumerate() {
            let whole_map = matches!(&arg.kind, ExprKind::Map { keys, .. } if keys.is_empty());
            if index == 0 && whole_map && MAP_ARG_CALLS.contains(&func) {
                self.visit_map_reference(arg);
                continue;
            }

            // string arguments are consumed at compile time and are not
            // bound by max_strlen
            if let ExprKind::String(value) = &arg.kind {
                arg.ty = SizedType::string(value.len() + 1);
                continue;
            }

            self.visit_expr(arg);
        }
    }

    fn visit_subprog_call(
        &mut self,
        func: &str,
        signature: &SubprogSignature,
        args: &mut [Expression],
        span: &Span,
    ) -> SizedType {
        for arg in args.iter_mut() {
            self.visit_expr(arg);
        }

        if args.len() != signature.args.len() {
            self.error(
                span,
                format!(
                    "Function {} requires {} argument(s) ({} provided)",
                    func,
                    signature.args.len(),
                    args.len()
                ),
            );
            return SizedType::none();
        }

        for (index, (arg, want)) in args.iter().zip(&signature.args).enumerate() {
            if arg.ty.has_none() {
                return SizedType::none();
            }

            let compatible = is_same_type(&arg.ty, want) || (arg.ty.is_intlike() && want.is_int());
            if !compatible {
                self.error(
                    &arg.span,
                    format!(
                        "Function {} argument {} is of type '{}', expected '{}'",
                        func,
                        index + 1,
                        arg.ty,
                        want
                    ),
                );
                return SizedType::none();
            }
        }

        signature.return_type.clone()
    }

    pub(super) fn check_nargs(&mut self, func: &str, args: &[Expression], n: usize, span: &Span) -> bool {
        if args.len() == n {
            return true;
        }

        self.error(
            span,
            format!("{}() requires {} argument(s) ({} provided)", func, n, args.len()),
        );
        false
    }

    pub(super) fn check_varargs(
        &mut self,
        func: &str,
        args: &[Expression],
        min: usize,
        max: usize,
        span: &Span,
    ) -> bool {
        if args.len() < min {
            self.error(
                span,
                format!("{}() requires at least {} argument(s) ({} provided)", func, min, args.len()),
            );
            return false;
        }

        if args.len() > max {
            self.error(
                span,
                format!("{}() can only take up to {} arguments ({} provided)", func, max, args.len()),
            );
            return false;
        }

        true
    }

    /// Checks argument `index` (0-based) is of `kind` and, if `want_literal`
    /// is set, a compile-time constant. Reports nothing unless `fail`.
    pub(super) fn check_arg(
        &mut self,
        func: &str,
        args: &[Expression],
        kind: ArgKind,
        index: usize,
        want_literal: bool,
        fail: bool,
    ) -> bool {
        let Some(arg) = args.get(index) else {
            return false;
        };

        if arg.ty.has_none() {
            return false;
        }

        if !kind.accepts(&arg.ty) {
            if fail {
                self.error(
                    &arg.span,
                    format!(
                        "{}() expects {} for argument {} ('{}' provided)",
                        func,
                        kind,
                        index + 1,
                        arg.ty
                    ),
                );
            }
            return false;
        }

        if want_literal && !arg.is_literal() {
            if fail {
                self.error(
                    &arg.span,
                    format!(
                        "{}() expects {} literal for argument {} ({} provided)",
                        func,
                        kind,
                        index + 1,
                        arg.describe()
                    ),
                );
            }
            return false;
        }

        true
    }

    /// Argument `index` names an existing kernel symbol.
    pub(super) fn check_symbol(&mut self, func: &str, args: &[Expression], index: usize) -> bool {
        let Some(arg) = args.get(index) else {
            return false;
        };

        let Some(name) = self.literal_string(arg) else {
            return false;
        };

        if self.config.listing || self.symbols.has_kernel_symbol(&name) {
            return true;
        }

        self.error(&arg.span, format!("{}: no such symbol '{}'", func, name));
        false
    }

    /// Checks `signature` against one attach point of the enclosing probe,
    /// or only its helper and safety outside of probes.
    pub(super) fn check_available(
        &mut self,
        signature: &CallSignature,
        ap: Option<&AttachPoint>,
        span: &Span,
    ) -> bool {
        if let Some(ap) = ap {
            if !signature.probe_types.is_empty() && !signature.probe_types.contains(&ap.probe_type) {
                self.error(
                    span,
                    format!(
                        "{}() can not be used with '{}' probes",
                        signature.name, ap.probe_type
                    ),
                );
                return false;
            }
        }

        if let Some(helper) = signature.helper {
            if !self.features.has_helper(helper) {
                self.error(
                    span,
                    format!(
                        "{}() is not supported by this kernel: missing BPF helper {}",
                        signature.name, helper
                    ),
                );
                return false;
            }
        }

        if signature.is_unsafe && !self.config.unsafe_mode {
            self.error(
                span,
                format!("{}() is an unsafe function being used in safe mode", signature.name),
            );
            return false;
        }

        true
    }

    fn check_call_available(&mut self, signature: &CallSignature, span: &Span) -> bool {
        let attach_points = self
            .probe
            .as_ref()
            .map(|probe| probe.attach_points.clone())
            .unwrap_or_default();

        if attach_points.is_empty() {
            return self.check_available(signature, None, span);
        }

        let mut seen = BTreeSet::new();
        for ap in &attach_points {
            if seen.insert(ap.probe_type) && !self.check_available(signature, Some(ap), span) {
                return false;
            }
        }
        true
    }

    /// Aggregations only make sense as the direct value of a map assignment.
    pub(super) fn check_assignment(&mut self, func: &str, span: &Span, target: AssignTarget) -> bool {
        if target == AssignTarget::Map {
            return true;
        }

        self.error(span, format!("{}() should be directly assigned to a map", func));
        false
    }

    /// Validates the `kstack`/`ustack` call forms and returns the stack type.
    pub(super) fn check_stack_call(
        &mut self,
        func: &str,
        args: &[Expression],
        kernel: bool,
        span: &Span,
    ) -> SizedType {
        let mut mode = self.config.stack_mode;
        let mut limit = DEFAULT_STACK_LIMIT;

        let limit_arg = match args {
            [] => None,
            [single] => match single.kind {
                ExprKind::StackMode(m) => {
                    mode = m;
                    None
                }
                _ => Some(single),
            },
            [first, second] => match first.kind {
                ExprKind::StackMode(m) => {
                    mode = m;
                    Some(second)
                }
                _ => {
                    self.error(
                        &first.span,
                        format!(
                            "{}() expects a stack mode (bpftrace, perf or raw) as its first argument",
                            func
                        ),
                    );
                    return SizedType::none();
                }
            },
            _ => return SizedType::none(),
        };

        if let Some(arg) = limit_arg {
            match self.literal_integer(arg) {
                Some(value) if (1..=MAX_STACK_LIMIT).contains(&value) => limit = value as u32,
                Some(_) => {
                    self.error(
                        &arg.span,
                        format!("{}([int limit]): limit must be between 1 and {}", func, MAX_STACK_LIMIT),
                    );
                    return SizedType::none();
                }
                None => {
                    self.error(
                        &arg.span,
                        format!("{}() expects a stack mode or an integer literal limit", func),
                    );
                    return SizedType::none();
                }
            }
        }

        let addrspace = self
            .probe
            .as_ref()
            .map(|probe| find_addrspace(probe.probe_type))
            .unwrap_or_default();
        let mismatch = match addrspace {
            AddrSpace::Kernel => !kernel,
            AddrSpace::User => kernel,
            AddrSpace::None => false,
        };
        if mismatch {
            self.warning(
                span,
                format!(
                    "{}() collects a {} stack but the probe runs in {} context",
                    func,
                    if kernel { "kernel" } else { "user" },
                    addrspace
                ),
            );
        }

        SizedType::stack(kernel, mode, limit)
    }

    /// Per-call argument rules for calls with a fixed result type.
    fn check_call_args(&mut self, func: &str, args: &[Expression], span: &Span) -> bool {
        match func {
            "hist" => {
                self.check_arg(func, args, ArgKind::Integer, 0, false, true)
                    && (args.len() < 2 || self.check_hist_bits(func, args))
            }
            "lhist" => self.check_lhist(func, args),
            "delete" => self.check_delete(func, args, span),
            "clear" | "zero" => self.check_map_arg(func, args, false),
            "len" => self.check_map_arg(func, args, true),
            "print" => self.check_print(func, args),
            "printf" | "system" | "cat" => {
                self.check_arg(func, args, ArgKind::String, 0, true, true) && self.check_format(func, args)
            }
            "time" => args.is_empty() || self.check_arg(func, args, ArgKind::String, 0, true, true),
            "strftime" => {
                self.check_arg(func, args, ArgKind::String, 0, true, true)
                    && self.check_arg(func, args, ArgKind::Integer, 1, false, true)
            }
            "ksym" | "usym" | "override" => self.check_arg(func, args, ArgKind::Integer, 0, false, true),
            "kaddr" => {
                self.check_arg(func, args, ArgKind::String, 0, true, true)
                    && self.check_symbol(func, args, 0)
            }
            "uaddr" | "cgroupid" => self.check_arg(func, args, ArgKind::String, 0, true, true),
            "macaddr" => {
                let ty = &args[0].ty;
                if ty.is_array() || ty.is_pointer() || ty.is_intlike() {
                    return true;
                }
                self.error(
                    &args[0].span,
                    format!("macaddr() expects an array or pointer argument ('{}' provided)", ty),
                );
                false
            }
            "join" => {
                self.check_arg(func, args, ArgKind::IntOrPointer, 0, false, true)
                    && (args.len() < 2 || self.check_arg(func, args, ArgKind::String, 1, true, true))
            }
            "reg" => {
                if !self.check_arg(func, args, ArgKind::String, 0, true, true) {
                    return false;
                }
                let name = self.literal_string(&args[0]).unwrap_or_default();
                if REGISTERS.contains(&name.as_str()) {
                    return true;
                }
                self.error(
                    &args[0].span,
                    format!("'{}' is not a valid register on this architecture", name),
                );
                false
            }
            "exit" => args.is_empty() || self.check_arg(func, args, ArgKind::Integer, 0, false, true),
            "signal" => self.check_signal(func, args),
            "strncmp" => {
                self.check_arg(func, args, ArgKind::String, 0, false, true)
                    && self.check_arg(func, args, ArgKind::String, 1, false, true)
                    && self.check_arg(func, args, ArgKind::Integer, 2, true, true)
            }
            "strcontains" => {
                self.check_arg(func, args, ArgKind::String, 0, false, true)
                    && self.check_arg(func, args, ArgKind::String, 1, false, true)
            }
            _ => true,
        }
    }

    fn check_hist_bits(&mut self, func: &str, args: &[Expression]) -> bool {
        if !self.check_arg(func, args, ArgKind::Integer, 1, true, true) {
            return false;
        }

        match self.literal_integer(&args[1]) {
            Some(bits) if (0..=MAX_HIST_BITS).contains(&bits) => true,
            bits => {
                self.error(
                    &args[1].span,
                    format!(
                        "{}: bits {} must be between 0 and {}",
                        func,
                        bits.map(|b| b.to_string()).unwrap_or_else(|| args[1].describe()),
                        MAX_HIST_BITS
                    ),
                );
                false
            }
        }
    }

    fn check_lhist(&mut self, func: &str, args: &[Expression]) -> bool {
        if !self.check_arg(func, args, ArgKind::Integer, 0, false, true) {
            return false;
        }
        for index in 1..4 {
            if !self.check_arg(func, args, ArgKind::Integer, index, true, true) {
                return false;
            }
        }

        let (Some(min), Some(max), Some(step)) = (
            self.literal_integer(&args[1]),
            self.literal_integer(&args[2]),
            self.literal_integer(&args[3]),
        ) else {
            return false;
        };

        let problem = if min < 0 {
            Some("invalid min value (must be non-negative)")
        } else if max <= min {
            Some("invalid max value (must be greater than min)")
        } else if step <= 0 {
            Some("invalid step value (must be greater than zero)")
        } else if (max - min) / step > MAX_LHIST_BUCKETS {
            Some("too many buckets (at most 1000)")
        } else {
            None
        };

        match problem {
            Some(problem) => {
                self.error(&args[0].span.join(&args[3].span), format!("{}: {}", func, problem));
                false
            }
            None => true,
        }
    }

    fn check_map_arg(&mut self, func: &str, args: &[Expression], keyed: bool) -> bool {
        let arg = &args[0];
        let Some(ident) = arg.map_ident() else {
            self.error(&arg.span, format!("{}() expects a map argument", func));
            return false;
        };

        if matches!(&arg.kind, ExprKind::Map { keys, .. } if !keys.is_empty()) {
            self.error(
                &arg.span,
                format!("{}() expects a map without explicit keys", func),
            );
            return false;
        }

        if keyed && self.maps.get_map_key_type(ident).is_some_and(|key| key.is_scalar()) {
            self.error(&arg.span, format!("{}() expects a map with keys", func));
            return false;
        }

        true
    }

    fn check_delete(&mut self, func: &str, args: &[Expression], span: &Span) -> bool {
        let map = &args[0];
        let Some(ident) = map.map_ident() else {
            self.error(&map.span, format!("{}() expects a map argument", func));
            return false;
        };

        let [_, key] = args else {
            return true;
        };

        let new = match key.ty.tuple_elements() {
            Some(elements) => MapRegistry::create_key_type(elements),
            None => MapRegistry::create_key_type(std::slice::from_ref(&key.ty)),
        };

        let Some(current) = self.maps.get_map_key_type(ident).cloned() else {
            self.defer_or_error(span, format!("Undefined map: {}", ident));
            return false;
        };

        if MapRegistry::validate_new_key(&current, &new) {
            return true;
        }

        self.error(
            &key.span,
            format!(
                "Argument mismatch for {}: trying to delete with key '{}' when map expects '{}'",
                ident, new, current
            ),
        );
        false
    }

    fn check_print(&mut self, func: &str, args: &[Expression]) -> bool {
        let first = &args[0];
        let whole_map = matches!(&first.kind, ExprKind::Map { keys, .. } if keys.is_empty());

        if whole_map {
            for index in 1..args.len() {
                if !self.check_arg(func, args, ArgKind::Integer, index, true, true) {
                    return false;
                }
            }
            return true;
        }

        if args.len() > 1 {
            self.error(
                &first.span,
                "print() with a non-map argument only takes a single argument",
            );
            return false;
        }

        if first.ty.is_void() {
            self.error(&first.span, "print() can not print a void value");
            return false;
        }

        true
    }

    /// `signal()` takes a signal name literal or a signal number.
    fn check_signal(&mut self, func: &str, args: &[Expression]) -> bool {
        let arg = &args[0];

        if self.check_arg(func, args, ArgKind::String, 0, true, false) {
            let name = self.literal_string(arg).unwrap_or_default();
            if SIGNALS.contains(&name.as_str()) {
                return true;
            }
            self.error(&arg.span, format!("{}: unknown signal '{}'", func, name));
            return false;
        }

        if !self.check_arg(func, args, ArgKind::Integer, 0, false, false) {
            self.error(
                &arg.span,
                format!(
                    "{}() only accepts string literals or integers ({} provided)",
                    func,
                    arg.describe()
                ),
            );
            return false;
        }

        match self.literal_integer(arg) {
            Some(signal) if !(1..=64).contains(&signal) => {
                self.error(&arg.span, format!("{}: invalid signal number {}", func, signal));
                false
            }
            _ => true,
        }
    }

    /// Checks the literal format string of `printf`, `system` and `cat`
    /// against the remaining arguments.
    fn check_format(&mut self, func: &str, args: &[Expression]) -> bool {
        let Some(format) = self.literal_string(&args[0]) else {
            return false;
        };

        let specs = format_specifiers(&format);
        let values = &args[1..];

        if let Some(spec) = specs.iter().find(|spec| format_accepts(**spec, &SizedType::none()).is_none()) {
            self.error(
                &args[0].span,
                format!("{}: invalid format specifier '%{}'", func, spec),
            );
            return false;
        }

        if specs.len() != values.len() {
            self.error(
                &args[0].span,
                format!(
                    "{}: the format string expects {} argument(s) but {} were provided",
                    func,
                    specs.len(),
                    values.len()
                ),
            );
            return false;
        }

        let mut ok = true;
        for (index, (spec, value)) in specs.iter().zip(values).enumerate() {
            if format_accepts(*spec, &value.ty) == Some(false) {
                self.error(
                    &value.span,
                    format!(
                        "{}: %{} specifier does not accept argument {} of type '{}'",
                        func,
                        spec,
                        index + 2,
                        value.ty
                    ),
                );
                ok = false;
            }
        }
        ok
    }

    /// Result type of calls whose type depends on their arguments.
    fn call_return_type(&mut self, func: &str, args: &[Expression], span: &Span) -> SizedType {
        let max_strlen = self.config.max_strlen;

        match func {
            "str" => {
                let source = &args[0].ty;
                if !(source.is_string() || source.is_intlike() || source.is_pointer() || source.is_array()) {
                    self.error(
                        &args[0].span,
                        format!("str() expects a string, integer or pointer ('{}' provided)", source),
                    );
                    return SizedType::none();
                }

                if args.len() == 2 {
                    if !self.check_arg(func, args, ArgKind::Integer, 1, false, true) {
                        return SizedType::none();
                    }
                    return match self.literal_integer(&args[1]) {
                        Some(n) if n >= 0 => SizedType::string((n as usize + 1).min(max_strlen)),
                        _ => SizedType::string(max_strlen),
                    };
                }

                if source.is_string() {
                    source.clone()
                } else {
                    SizedType::string(max_strlen)
                }
            }
            "buf" => {
                let source = args[0].ty.clone();
                if !(source.is_intlike() || source.is_pointer() || source.is_array()) {
                    self.error(
                        &args[0].span,
                        format!("buf() expects an array or pointer ('{}' provided)", source),
                    );
                    return SizedType::none();
                }

                if args.len() == 2 {
                    if !self.check_arg(func, args, ArgKind::Integer, 1, false, true) {
                        return SizedType::none();
                    }
                    return match self.literal_integer(&args[1]) {
                        Some(n) if n < 0 || n as usize > max_strlen => {
                            self.error(
                                &args[1].span,
                                format!("buf: length {} exceeds max_strlen ({})", n, max_strlen),
                            );
                            SizedType::none()
                        }
                        Some(n) => SizedType::buffer(n as usize),
                        None => SizedType::buffer(max_strlen),
                    };
                }

                if source.is_array() {
                    return SizedType::buffer(source.size);
                }

                self.error(span, "buf() requires a length argument for non-array values");
                SizedType::none()
            }
            "kptr" | "uptr" => {
                if !self.check_arg(func, args, ArgKind::IntOrPointer, 0, false, true) {
                    return SizedType::none();
                }
                let addrspace = if func == "kptr" {
                    AddrSpace::Kernel
                } else {
                    AddrSpace::User
                };
                args[0].ty.clone().with_addrspace(addrspace)
            }
            "ntop" => {
                if args.len() == 2 && !self.check_arg(func, args, ArgKind::Integer, 0, false, true) {
                    return SizedType::none();
                }
                let addr = &args[args.len() - 1];
                let valid = addr.ty.is_intlike()
                    || addr.ty.is_pointer()
                    || addr.ty.element().is_some_and(|(_, len)| len == 4 || len == 16);
                if !valid {
                    self.error(
                        &addr.span,
                        format!("ntop() expects an integer or 4/16 byte array ('{}' provided)", addr.ty),
                    );
                    return SizedType::none();
                }
                SizedType::inet(24)
            }
            "path" => {
                if !self.check_arg(func, args, ArgKind::IntOrPointer, 0, false, true) {
                    return SizedType::none();
                }
                if args.len() == 2 {
                    if !self.check_arg(func, args, ArgKind::Integer, 1, true, true) {
                        return SizedType::none();
                    }
                    if let Some(n) = self.literal_integer(&args[1]).filter(|n| *n > 0) {
                        return SizedType::string((n as usize).min(max_strlen));
                    }
                }
                SizedType::string(max_strlen)
            }
            "kstack" => self.check_stack_call(func, args, true, span),
            "ustack" => self.check_stack_call(func, args, false, span),
            _ => SizedType::none(),
        }
    }
}

impl Display for CallSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min_args == self.max_args {
            write!(f, "{}/{}", self.name, self.min_args)
        } else {
            write!(f, "{}/{}..{}", self.name, self.min_args, self.max_args)
        }
    }
}
