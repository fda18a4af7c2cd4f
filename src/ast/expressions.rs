use std::fmt::Display;

use crate::Span;

use super::types::{SizedType, StackMode};

/// Builtin identifiers besides `argN` and `sargN`.
pub const BUILTINS: &[&str] = &[
    "pid", "tid", "uid", "gid", "cpu", "numaid", "rand", "nsecs", "elapsed", "cgroup", "jiffies",
    "comm", "kstack", "ustack", "func", "probe", "username", "curtask", "retval", "args", "cpid",
];

/// Returns N for `argN` / `sargN` style names.
pub fn numbered_builtin(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
        || numbered_builtin(name, "arg").is_some()
        || numbered_builtin(name, "sarg").is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Minus,
    Deref,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrement
                | UnaryOp::PreDecrement
                | UnaryOp::PostIncrement
                | UnaryOp::PostDecrement
        )
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Minus => "-",
            UnaryOp::Deref => "*",
            UnaryOp::PreIncrement | UnaryOp::PostIncrement => "++",
            UnaryOp::PreDecrement | UnaryOp::PostDecrement => "--",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Named(String),
    Index(usize),
}

impl Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldRef::Named(name) => write!(f, "{}", name),
            FieldRef::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Operand of `sizeof` and `offsetof`.
#[derive(Debug, Clone)]
pub enum TypeOrExpr {
    Type(SizedType),
    Expr(Box<Expression>),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Integer(u64),
    /// `$N`
    PositionalParameter(usize),
    /// `$#`
    PositionalCount,
    String(String),
    StackMode(StackMode),
    Identifier(String),
    Builtin(String),
    Call {
        func: String,
        args: Vec<Expression>,
    },
    Sizeof(TypeOrExpr),
    Offsetof {
        target: TypeOrExpr,
        field: String,
    },
    Map {
        ident: String,
        keys: Vec<Expression>,
    },
    Variable(String),
    Binop {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unop {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    Ternary {
        cond: Box<Expression>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    FieldAccess {
        expr: Box<Expression>,
        field: FieldRef,
    },
    ArrayAccess {
        expr: Box<Expression>,
        index: Box<Expression>,
    },
    Cast {
        ty: SizedType,
        expr: Box<Expression>,
    },
    Tuple(Vec<Expression>),
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExprKind,
    /// Written by the semantic analyser.
    pub ty: SizedType,
    pub span: Span,
    /// Set when a reference was read as its referent.
    pub implicit_deref: bool,
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expression {
            kind,
            ty: SizedType::none(),
            span,
            implicit_deref: false,
        }
    }

    /// Compile-time constants.
    pub fn is_literal(&self) -> bool {
        match &self.kind {
            ExprKind::Integer(_)
            | ExprKind::String(_)
            | ExprKind::PositionalParameter(_)
            | ExprKind::PositionalCount
            | ExprKind::StackMode(_) => true,
            ExprKind::Unop {
                op: UnaryOp::Minus,
                expr,
            } => matches!(expr.kind, ExprKind::Integer(_)),
            _ => false,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, ExprKind::Map { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, ExprKind::Variable(_))
    }

    /// Map identifier of a map expression.
    pub fn map_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Map { ident, .. } => Some(ident),
            _ => None,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            ExprKind::Integer(value) => value.to_string(),
            ExprKind::PositionalParameter(n) => format!("${}", n),
            ExprKind::PositionalCount => String::from("$#"),
            ExprKind::String(value) => format!("\"{}\"", value),
            ExprKind::StackMode(mode) => mode.to_string(),
            ExprKind::Identifier(name) | ExprKind::Builtin(name) | ExprKind::Variable(name) => {
                name.clone()
            }
            ExprKind::Call { func, .. } => format!("{}()", func),
            ExprKind::Sizeof(_) => String::from("sizeof"),
            ExprKind::Offsetof { .. } => String::from("offsetof"),
            ExprKind::Map { ident, .. } => ident.clone(),
            ExprKind::Binop { op, .. } => format!("binary {}", op),
            ExprKind::Unop { op, .. } => format!("unary {}", op),
            ExprKind::Ternary { .. } => String::from("ternary"),
            ExprKind::FieldAccess { field, .. } => format!(".{}", field),
            ExprKind::ArrayAccess { .. } => String::from("[]"),
            ExprKind::Cast { ty, .. } => format!("({})", ty),
            ExprKind::Tuple(_) => String::from("tuple"),
        }
    }
}
