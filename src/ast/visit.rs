//! Read-only traversals.

use std::collections::BTreeSet;

use super::{
    expressions::{ExprKind, Expression, TypeOrExpr},
    statements::{Block, StmtKind},
};

/// Names of every variable mentioned anywhere in `block`.
pub fn referenced_variables(block: &Block) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_block(block, &mut names);
    names
}

fn collect_block(block: &Block, names: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::Expr(expr) => collect_expr(expr, names),
            StmtKind::AssignMap { map, expr } => {
                collect_expr(map, names);
                collect_expr(expr, names);
            }
            StmtKind::AssignVar { var, expr, .. } => {
                collect_expr(var, names);
                collect_expr(expr, names);
            }
            StmtKind::AssignConfigVar { expr, .. } => collect_expr(expr, names),
            StmtKind::VarDecl { var, .. } => collect_expr(var, names),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                collect_expr(cond, names);
                collect_block(then_block, names);
                if let Some(else_block) = else_block {
                    collect_block(else_block, names);
                }
            }
            StmtKind::Unroll { count, block, .. } => {
                collect_expr(count, names);
                collect_block(block, names);
            }
            StmtKind::While { cond, block } => {
                collect_expr(cond, names);
                collect_block(block, names);
            }
            StmtKind::For { var, map, block } => {
                collect_expr(var, names);
                collect_expr(map, names);
                collect_block(block, names);
            }
            StmtKind::Jump { value, .. } => {
                if let Some(value) = value {
                    collect_expr(value, names);
                }
            }
            StmtKind::Block(block) => collect_block(block, names),
        }
    }
}

fn collect_expr(expr: &Expression, names: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Variable(name) => {
            names.insert(name.clone());
        }
        ExprKind::Call { args, .. } | ExprKind::Tuple(args) => {
            args.iter().for_each(|arg| collect_expr(arg, names));
        }
        ExprKind::Map { keys, .. } => keys.iter().for_each(|key| collect_expr(key, names)),
        ExprKind::Sizeof(TypeOrExpr::Expr(inner))
        | ExprKind::Offsetof {
            target: TypeOrExpr::Expr(inner),
            ..
        }
        | ExprKind::Unop { expr: inner, .. }
        | ExprKind::FieldAccess { expr: inner, .. }
        | ExprKind::Cast { expr: inner, .. } => collect_expr(inner, names),
        ExprKind::Binop { left, right, .. }
        | ExprKind::ArrayAccess {
            expr: left,
            index: right,
        } => {
            collect_expr(left, names);
            collect_expr(right, names);
        }
        ExprKind::Ternary { cond, left, right } => {
            collect_expr(cond, names);
            collect_expr(left, names);
            collect_expr(right, names);
        }
        ExprKind::Integer(_)
        | ExprKind::PositionalParameter(_)
        | ExprKind::PositionalCount
        | ExprKind::String(_)
        | ExprKind::StackMode(_)
        | ExprKind::Identifier(_)
        | ExprKind::Builtin(_)
        | ExprKind::Sizeof(TypeOrExpr::Type(_))
        | ExprKind::Offsetof {
            target: TypeOrExpr::Type(_),
            ..
        } => {}
    }
}
