//! Program structure: probes, attach points, subprograms and config.

use std::fmt::Display;

use crate::Span;

use super::{statements::Block, statements::Statement, types::SizedType, types::AddrSpace};

/// Parser-assigned identity of a scope-owning node.
pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeType {
    Invalid,
    Special,
    Kprobe,
    Kretprobe,
    Uprobe,
    Uretprobe,
    Usdt,
    Tracepoint,
    RawTracepoint,
    Profile,
    Interval,
    Software,
    Hardware,
    Watchpoint,
    Fentry,
    Fexit,
    Iter,
}

impl ProbeType {
    /// Maps a provider name (or its short alias) to a probe type.
    pub fn from_provider(provider: &str) -> ProbeType {
        match provider {
            "BEGIN" | "END" => ProbeType::Special,
            "kprobe" | "k" => ProbeType::Kprobe,
            "kretprobe" | "kr" => ProbeType::Kretprobe,
            "uprobe" | "u" => ProbeType::Uprobe,
            "uretprobe" | "ur" => ProbeType::Uretprobe,
            "usdt" | "U" => ProbeType::Usdt,
            "tracepoint" | "t" => ProbeType::Tracepoint,
            "rawtracepoint" | "rt" => ProbeType::RawTracepoint,
            "profile" | "p" => ProbeType::Profile,
            "interval" | "i" => ProbeType::Interval,
            "software" | "s" => ProbeType::Software,
            "hardware" | "h" => ProbeType::Hardware,
            "watchpoint" | "w" => ProbeType::Watchpoint,
            "fentry" | "f" | "kfunc" => ProbeType::Fentry,
            "fexit" | "fr" | "kretfunc" => ProbeType::Fexit,
            "iter" | "it" => ProbeType::Iter,
            _ => ProbeType::Invalid,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProbeType::Invalid => "invalid",
            ProbeType::Special => "special",
            ProbeType::Kprobe => "kprobe",
            ProbeType::Kretprobe => "kretprobe",
            ProbeType::Uprobe => "uprobe",
            ProbeType::Uretprobe => "uretprobe",
            ProbeType::Usdt => "usdt",
            ProbeType::Tracepoint => "tracepoint",
            ProbeType::RawTracepoint => "rawtracepoint",
            ProbeType::Profile => "profile",
            ProbeType::Interval => "interval",
            ProbeType::Software => "software",
            ProbeType::Hardware => "hardware",
            ProbeType::Watchpoint => "watchpoint",
            ProbeType::Fentry => "fentry",
            ProbeType::Fexit => "fexit",
            ProbeType::Iter => "iter",
        }
    }

    /// Memory space the probe's context pointers refer to.
    pub fn addrspace(self) -> AddrSpace {
        match self {
            ProbeType::Kprobe
            | ProbeType::Kretprobe
            | ProbeType::Tracepoint
            | ProbeType::RawTracepoint
            | ProbeType::Fentry
            | ProbeType::Fexit
            | ProbeType::Iter => AddrSpace::Kernel,
            ProbeType::Uprobe | ProbeType::Uretprobe | ProbeType::Usdt => AddrSpace::User,
            _ => AddrSpace::None,
        }
    }
}

impl Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One `provider:target:func` location a probe fires at.
///
/// The fields are positional; their meaning depends on the provider:
///
/// | provider      | target      | func        | freq        |
/// |---------------|-------------|-------------|-------------|
/// | kprobe, fentry| module      | function    |             |
/// | uprobe, usdt  | binary path | function    |             |
/// | tracepoint    | category    | event       |             |
/// | profile       | unit        |             | rate        |
/// | software      | event       |             | count       |
/// | watchpoint    | address     | mode        | length      |
/// | iter          | iterator    |             |             |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachPoint {
    pub raw: String,
    pub provider: String,
    pub target: String,
    pub func: String,
    pub freq: Option<u64>,
    /// Set when a numeric field did not parse.
    pub malformed: bool,
    pub probe_type: ProbeType,
    pub span: Span,
}

impl AttachPoint {
    pub fn parse(raw: &str, span: Span) -> AttachPoint {
        let parts = raw.split(':').collect::<Vec<_>>();
        let provider = String::from(parts[0]);
        let probe_type = ProbeType::from_provider(&provider);

        let mut ap = AttachPoint {
            raw: String::from(raw),
            provider,
            target: String::new(),
            func: String::new(),
            freq: None,
            malformed: false,
            probe_type,
            span,
        };

        let part = |n: usize| parts.get(n).map(|s| s.to_string()).unwrap_or_default();

        match probe_type {
            ProbeType::Kprobe
            | ProbeType::Kretprobe
            | ProbeType::Fentry
            | ProbeType::Fexit
            | ProbeType::RawTracepoint => {
                if parts.len() > 2 {
                    ap.target = part(1);
                    ap.func = part(2);
                } else {
                    ap.func = part(1);
                }
            }
            ProbeType::Uprobe | ProbeType::Uretprobe | ProbeType::Tracepoint => {
                ap.target = part(1);
                ap.func = part(2);
            }
            ProbeType::Usdt => {
                ap.target = part(1);
                ap.func = parts.get(2..).map(|rest| rest.join(":")).unwrap_or_default();
            }
            ProbeType::Profile | ProbeType::Interval => {
                ap.target = part(1);
                ap.parse_freq(parts.get(2).copied());
            }
            ProbeType::Software | ProbeType::Hardware => {
                ap.target = part(1);
                ap.parse_freq(parts.get(2).copied());
            }
            ProbeType::Watchpoint => {
                ap.target = part(1);
                ap.parse_freq(parts.get(2).copied());
                ap.func = part(3);
            }
            ProbeType::Iter => {
                ap.target = part(1);
            }
            ProbeType::Special | ProbeType::Invalid => {}
        }

        ap
    }

    fn parse_freq(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };

        match parse_u64(value) {
            Some(freq) => self.freq = Some(freq),
            None => self.malformed = true,
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.target.contains('*') || self.func.contains('*')
    }

    /// Name printed by the `probe` builtin.
    pub fn name(&self) -> String {
        match self.probe_type {
            ProbeType::Special => self.provider.clone(),
            _ => {
                let mut name = String::from(self.probe_type.name());
                for part in [&self.target, &self.func] {
                    if !part.is_empty() {
                        name.push(':');
                        name.push_str(part);
                    }
                }
                name
            }
        }
    }
}

/// Parses a decimal or `0x` hexadecimal unsigned integer.
pub fn parse_u64(value: &str) -> Option<u64> {
    let value = value.replace('_', "");
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub id: NodeId,
    pub attach_points: Vec<AttachPoint>,
    pub pred: Option<super::expressions::Expression>,
    pub block: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SubprogArg {
    pub name: String,
    pub ty: SizedType,
    pub span: Span,
}

/// User-defined function.
#[derive(Debug, Clone)]
pub struct Subprog {
    pub id: NodeId,
    pub name: String,
    pub args: Vec<SubprogArg>,
    pub return_type: SizedType,
    pub block: Block,
    pub span: Span,
}

/// `config = { key = value; ... }`; every statement is an
/// `AssignConfigVar`.
#[derive(Debug, Clone)]
pub struct Config {
    pub id: NodeId,
    pub stmts: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub config: Option<Config>,
    pub subprogs: Vec<Subprog>,
    pub probes: Vec<Probe>,
    pub span: Span,
}
