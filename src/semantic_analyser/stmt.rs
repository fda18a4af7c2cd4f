//! Statement checking: assignments, declarations and control flow.

use crate::{
    ast::{
        ast::NodeId,
        expressions::{ExprKind, Expression},
        statements::{Block, JumpKind, Statement, StmtKind, VarDeclaration},
        types::{is_same_type, SizedType, Type},
        visit::referenced_variables,
    },
    Span, BUG,
};

use super::{
    scopes::{Declaration, Variable},
    semantic_analyser::{AssignTarget, SemanticAnalyser},
};

pub const MAX_UNROLL: i64 = 100;

impl SemanticAnalyser<'_> {
    pub(super) fn visit_block(&mut self, block: &mut Block) {
        self.scopes.push(block.id);
        for stmt in block.stmts.iter_mut() {
            self.visit_stmt(stmt);
        }
        self.scopes.pop();
    }

    pub(super) fn visit_stmt(&mut self, stmt: &mut Statement) {
        let span = stmt.span.clone();
        let id = stmt.id;

        match &mut stmt.kind {
            StmtKind::Expr(expr) => self.visit_expr(expr),
            StmtKind::AssignMap { map, expr } => self.visit_assign_map(map, expr, &span),
            StmtKind::AssignVar {
                var,
                expr,
                declaration,
            } => self.visit_assign_var(id, var, expr, declaration.as_mut(), &span),
            StmtKind::AssignConfigVar { name, .. } => {
                self.error(
                    &span,
                    format!("Config variable '{}' can only be set in a config block", name),
                );
            }
            StmtKind::VarDecl { var, ty } => self.visit_var_decl(id, var, ty.as_mut(), &span),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.visit_expr(cond);
                self.check_condition(cond, "if");
                self.visit_block(then_block);
                if let Some(else_block) = else_block {
                    self.visit_block(else_block);
                }
            }
            StmtKind::Unroll {
                count,
                block,
                resolved,
            } => self.visit_unroll(count, block, resolved),
            StmtKind::While { cond, block } => {
                self.visit_expr(cond);
                self.check_condition(cond, "while");
                self.loop_depth += 1;
                self.visit_block(block);
                self.loop_depth -= 1;
            }
            StmtKind::For { var, map, block } => self.visit_for(id, var, map, block, &span),
            StmtKind::Jump { kind, value } => self.visit_jump(*kind, value.as_mut(), &span),
            StmtKind::Block(block) => self.visit_block(block),
        }
    }

    fn visit_assign_map(&mut self, map: &mut Expression, expr: &mut Expression, span: &Span) {
        let Some(ident) = map.map_ident().map(String::from) else {
            BUG!(self.sink, "map assignment target is not a map: {}", map.describe())
        };

        self.assign_target = AssignTarget::Map;
        self.visit_expr(expr);

        let map_span = map.span.clone();
        if let ExprKind::Map { keys, .. } = &mut map.kind {
            self.visit_map_keys(&ident, keys, &map_span);
        }

        if expr.ty.has_none() || !self.is_valid_assignment(expr, true) {
            return;
        }

        let ty = if expr.ty.is_int() || (expr.ty.is_int_aggregate() && !is_direct_call(expr)) {
            SizedType::int(64, expr.ty.is_signed)
        } else {
            expr.ty.clone()
        };

        match self.maps.assign_map_type(&ident, &ty, span) {
            Ok(ty) => map.ty = ty,
            Err(error) => self.map_error(span, error),
        }
    }

    fn visit_assign_var(
        &mut self,
        id: NodeId,
        var: &mut Expression,
        expr: &mut Expression,
        declaration: Option<&mut VarDeclaration>,
        span: &Span,
    ) {
        let Some(name) = var.variable_name().map(String::from) else {
            BUG!(self.sink, "variable assignment target is not a variable: {}", var.describe())
        };

        self.assign_target = AssignTarget::Variable;
        self.visit_expr(expr);

        let decl = Declaration {
            node: id,
            span: var.span.clone(),
        };

        if let Some(declaration) = declaration {
            let variable = match declaration.ty.as_mut() {
                Some(ty) => {
                    if !self.resolve_type(ty, span, true) {
                        return;
                    }
                    Variable::new(ty.clone(), false, false)
                }
                None => Variable::new(SizedType::none(), true, false),
            };

            if let Err(error) = self.scopes.declare(&name, variable, decl) {
                self.scope_error(&var.span, error);
                return;
            }
        } else if self.scopes.find_declared(&name).is_none() {
            if let Err(error) = self.scopes.declare(&name, Variable::implicit(), decl) {
                self.scope_error(&var.span, error);
                return;
            }
        }

        if expr.ty.has_none() || !self.is_valid_assignment(expr, false) {
            return;
        }

        let ty = if expr.ty.is_int_aggregate() {
            expr.ty.as_integer()
        } else {
            expr.ty.clone()
        };

        match self.scopes.assign(&name, &ty) {
            Ok(ty) => var.ty = ty,
            Err(error) => self.scope_error(span, error),
        }
    }

    fn visit_var_decl(&mut self, id: NodeId, var: &mut Expression, ty: Option<&mut SizedType>, span: &Span) {
        let Some(name) = var.variable_name().map(String::from) else {
            BUG!(self.sink, "declaration of a non-variable: {}", var.describe())
        };

        // a typed declaration is zero-initialised
        let variable = match ty {
            Some(ty) => {
                if !self.resolve_type(ty, span, true) {
                    return;
                }
                Variable::new(ty.clone(), false, true)
            }
            None => Variable::new(SizedType::none(), true, false),
        };
        var.ty = variable.ty.clone();

        let decl = Declaration {
            node: id,
            span: var.span.clone(),
        };
        if let Err(error) = self.scopes.declare(&name, variable, decl) {
            self.scope_error(&var.span, error);
        }
    }

    /// Rejects values that can not be stored.
    pub(super) fn is_valid_assignment(&mut self, expr: &Expression, to_map: bool) -> bool {
        if expr.ty.is_void() {
            self.error(&expr.span, "Value of type void can not be assigned");
            return false;
        }

        if expr.ty.is_aggregate() && !expr.ty.is_int_aggregate() && !is_direct_call(expr) {
            let message = if to_map {
                format!(
                    "Map value '{}' cannot be assigned from one map to another. The function that returns this type must be called directly",
                    expr.ty
                )
            } else {
                format!("Value '{}' cannot be assigned to a variable", expr.ty)
            };
            self.error(&expr.span, message);
            return false;
        }

        if expr.ty.kind == Type::StackMode {
            self.error(&expr.span, "A stack mode can not be assigned");
            return false;
        }

        true
    }

    fn check_condition(&mut self, cond: &Expression, what: &str) {
        if cond.ty.has_none() || cond.ty.is_intlike() || cond.ty.is_pointer() {
            return;
        }

        self.error(
            &cond.span,
            format!("Invalid condition in {}: '{}'", what, cond.ty),
        );
    }

    fn visit_unroll(&mut self, count: &mut Expression, block: &mut Block, resolved: &mut u64) {
        self.visit_expr(count);

        match self.literal_integer(count) {
            Some(n) if (1..=MAX_UNROLL).contains(&n) => *resolved = n as u64,
            Some(n) if n > MAX_UNROLL => {
                self.error(&count.span, format!("unroll maximum value is {}", MAX_UNROLL));
            }
            Some(_) => self.error(&count.span, "unroll minimum value is 1"),
            None if count.ty.has_none() => {}
            None => self.error(&count.span, "unroll count must be an integer literal"),
        }

        self.visit_block(block);
    }

    fn visit_for(
        &mut self,
        id: NodeId,
        var: &mut Expression,
        map: &mut Expression,
        block: &mut Block,
        span: &Span,
    ) {
        let Some(var_name) = var.variable_name().map(String::from) else {
            BUG!(self.sink, "for-loop variable is not a variable: {}", var.describe())
        };

        let ident = match &map.kind {
            ExprKind::Map { ident, keys } if keys.is_empty() => ident.clone(),
            ExprKind::Map { .. } => {
                self.error(&map.span, "Loop expression must be a map without keys");
                return;
            }
            _ => {
                self.error(&map.span, "Loop expression must be a map");
                return;
            }
        };

        let shadowed = self
            .scopes
            .find_declared(&var_name)
            .and(self.scopes.find_declaration(&var_name))
            .map(|decl| decl.span.clone());
        if let Some(first) = shadowed {
            self.error(
                &var.span,
                format!("Loop declaration shadows existing variable: {}", var_name),
            );
            self.hint(&first, format!("{} was first declared here", var_name));
            return;
        }

        let kv = self.for_loop_type(&ident, &map.span);
        let Some(kv) = kv else {
            return;
        };
        map.ty = self.maps.get_map_type(&ident).cloned().unwrap_or_default();
        var.ty = kv.clone();

        let mut captures = vec![];
        for name in referenced_variables(block) {
            if name == var_name {
                continue;
            }

            // only variables declared before the loop are captured
            let Some(variable) = self.scopes.find_declared(&name).cloned() else {
                continue;
            };

            if !variable.was_assigned || variable.ty.has_none() {
                self.defer_or_error(
                    span,
                    format!("Loop body captures variable {} before its type is known", name),
                );
            } else {
                self.scopes.mark_non_resizable(&name);
            }
            captures.push(name);
        }
        self.for_captures.insert(id, captures);

        self.scopes.push(block.id);
        let resolved = !kv.has_none();
        let decl = Declaration {
            node: id,
            span: var.span.clone(),
        };
        if let Err(error) = self
            .scopes
            .declare(&var_name, Variable::new(kv, false, resolved), decl)
        {
            self.scope_error(&var.span, error);
        }

        self.loop_depth += 1;
        for stmt in block.stmts.iter_mut() {
            self.visit_stmt(stmt);
        }
        self.loop_depth -= 1;
        self.scopes.pop();
    }

    /// `(key, value)` tuple of an iterated map; `none` components while
    /// the map is still unknown. `None` after an error.
    fn for_loop_type(&mut self, ident: &str, span: &Span) -> Option<SizedType> {
        let key = self.maps.get_map_key_type(ident).cloned();
        let value = self.maps.get_map_type(ident).filter(|ty| !ty.is_none()).cloned();

        let (Some(key), Some(value)) = (key, value) else {
            self.defer_or_error(span, format!("Undefined map: {}", ident));
            return Some(SizedType::tuple(vec![SizedType::none(), SizedType::none()]));
        };

        if key.is_scalar() {
            self.error(
                span,
                format!("Loop expression does not support scalar map: {}", ident),
            );
            return None;
        }

        if matches!(value.kind, Type::Hist | Type::Lhist | Type::Stats) {
            self.error(
                span,
                format!("Loop expression does not support '{}' map values: {}", value, ident),
            );
            return None;
        }

        let value = if value.is_int_aggregate() {
            value.as_integer()
        } else {
            value
        };

        Some(SizedType::tuple(vec![key.as_loop_type(), value]))
    }

    fn visit_jump(&mut self, kind: JumpKind, value: Option<&mut Expression>, span: &Span) {
        if kind != JumpKind::Return {
            if self.loop_depth == 0 {
                self.error(span, format!("'{}' statement is not allowed outside of a loop", kind.name()));
            }
            return;
        }

        let value = value.map(|value| {
            self.visit_expr(value);
            value
        });

        let Some(subprog) = self.subprog.clone() else {
            if value.is_some() {
                self.error(span, "Return value is not allowed in a probe");
            }
            return;
        };

        match value {
            Some(value) if value.ty.has_none() => {}
            Some(value) => {
                let compatible = is_same_type(&value.ty, &subprog.return_type)
                    || (value.ty.is_intlike() && subprog.return_type.is_int());
                if !compatible {
                    self.error(
                        &value.span,
                        format!(
                            "Function {} is of type '{}', cannot return '{}'",
                            subprog.name, subprog.return_type, value.ty
                        ),
                    );
                }
            }
            None if !subprog.return_type.is_void() => {
                self.error(
                    span,
                    format!(
                        "Function {} must return a value of type '{}'",
                        subprog.name, subprog.return_type
                    ),
                );
            }
            None => {}
        }
    }
}

fn is_direct_call(expr: &Expression) -> bool {
    matches!(expr.kind, ExprKind::Call { .. })
}
