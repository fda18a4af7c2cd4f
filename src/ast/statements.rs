use crate::Span;

use super::{ast::NodeId, expressions::Expression, types::SizedType};

#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Statement>,
    pub span: Span,
}

/// `let` part of an assignment; `ty` is the declared type, if any.
#[derive(Debug, Clone)]
pub struct VarDeclaration {
    pub ty: Option<SizedType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Return,
    Break,
    Continue,
}

impl JumpKind {
    pub fn name(self) -> &'static str {
        match self {
            JumpKind::Return => "return",
            JumpKind::Break => "break",
            JumpKind::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expression),
    /// `map` is always an `ExprKind::Map`.
    AssignMap {
        map: Expression,
        expr: Expression,
    },
    /// `var` is always an `ExprKind::Variable`.
    AssignVar {
        var: Expression,
        expr: Expression,
        declaration: Option<VarDeclaration>,
    },
    AssignConfigVar {
        name: String,
        expr: Expression,
    },
    VarDecl {
        var: Expression,
        ty: Option<SizedType>,
    },
    If {
        cond: Expression,
        then_block: Block,
        else_block: Option<Block>,
    },
    Unroll {
        count: Expression,
        block: Block,
        /// Iteration count once validated.
        resolved: u64,
    },
    While {
        cond: Expression,
        block: Block,
    },
    For {
        var: Expression,
        map: Expression,
        block: Block,
    },
    Jump {
        kind: JumpKind,
        value: Option<Expression>,
    },
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}
