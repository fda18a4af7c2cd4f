//! Expression typing.

use std::rc::Rc;

use crate::{
    ast::{
        ast::parse_u64,
        expressions::{BinaryOp, ExprKind, Expression, FieldRef, TypeOrExpr, UnaryOp},
        types::{is_same_type, unify, AddrSpace, MapKey, Record, SizedType, Type},
    },
    Span,
};

use super::{
    calls::find_addrspace,
    maps::MapRegistry,
    semantic_analyser::{AssignTarget, SemanticAnalyser},
};

/// Type of an integer literal.
pub fn integer_type(value: u64) -> SizedType {
    if value > i64::MAX as u64 {
        SizedType::uint64()
    } else {
        SizedType::int64()
    }
}

/// Numeric value of a positional parameter, if it is one.
pub fn param_as_integer(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| parse_u64(value).and_then(|v| i64::try_from(v).ok()))
}

impl SemanticAnalyser<'_> {
    pub(super) fn visit_expr(&mut self, expr: &mut Expression) {
        let target = std::mem::take(&mut self.assign_target);
        let span = expr.span.clone();

        let ty = match &mut expr.kind {
            ExprKind::Integer(value) => integer_type(*value),
            ExprKind::PositionalParameter(n) => self.visit_positional_parameter(*n, &span),
            ExprKind::PositionalCount => {
                self.has_pos_param = true;
                SizedType::int64()
            }
            ExprKind::String(value) => self.visit_string(value, &span),
            ExprKind::StackMode(_) => SizedType::stack_mode(),
            ExprKind::Identifier(name) => self.visit_identifier(name, &span),
            ExprKind::Builtin(name) => self.visit_builtin(name, &span),
            ExprKind::Call { func, args } => self.visit_call(func, args, &span, target),
            ExprKind::Sizeof(operand) => self.visit_sizeof(operand, &span),
            ExprKind::Offsetof {
                target: operand,
                field,
            } => self.visit_offsetof(operand, field, &span),
            ExprKind::Map { ident, keys } => self.visit_map(ident, keys, &span),
            ExprKind::Variable(name) => self.visit_variable(name, &span),
            ExprKind::Binop { op, left, right } => self.visit_binop(*op, left, right, &span),
            ExprKind::Unop { op, expr } => self.visit_unop(*op, expr, &span),
            ExprKind::Ternary { cond, left, right } => self.visit_ternary(cond, left, right, &span),
            ExprKind::FieldAccess { expr, field } => self.visit_field_access(expr, field, &span),
            ExprKind::ArrayAccess { expr, index } => self.visit_array_access(expr, index, &span),
            ExprKind::Cast { ty, expr } => self.visit_cast(ty, expr, &span),
            ExprKind::Tuple(elements) => self.visit_tuple(elements, &span),
        };

        expr.ty = ty;
        expr.implicit_deref = false;

        if let Type::Reference(referent) = &expr.ty.kind {
            let mut referent = (**referent).clone();
            if referent.addrspace == AddrSpace::None {
                referent.addrspace = expr.ty.addrspace;
            }
            expr.ty = referent;
            expr.implicit_deref = true;
        }
    }

    fn visit_positional_parameter(&mut self, n: usize, span: &Span) -> SizedType {
        self.has_pos_param = true;

        if n == 0 {
            self.error(span, "$0 is not a valid parameter");
            return SizedType::none();
        }

        match self.config.param(n) {
            Some(value) if param_as_integer(value).is_none() => SizedType::string(value.len() + 1),
            _ => SizedType::int64(),
        }
    }

    fn visit_string(&mut self, value: &str, span: &Span) -> SizedType {
        let ty = SizedType::string(value.len() + 1);
        if ty.size > self.config.max_strlen {
            self.error(
                span,
                format!(
                    "String is too long (over {} bytes): {}",
                    self.config.max_strlen, value
                ),
            );
        }
        ty
    }

    fn visit_identifier(&mut self, name: &str, span: &Span) -> SizedType {
        match self.symbols.enum_value(name) {
            Some(_) => SizedType::uint64(),
            None => {
                self.error(span, format!("Unknown identifier: '{}'", name));
                SizedType::none()
            }
        }
    }

    fn visit_sizeof(&mut self, operand: &mut TypeOrExpr, span: &Span) -> SizedType {
        match operand {
            TypeOrExpr::Type(ty) => {
                if !self.resolve_type(ty, span, true) {
                    return SizedType::none();
                }
            }
            TypeOrExpr::Expr(expr) => {
                self.visit_expr(expr);
                if expr.ty.has_none() {
                    return SizedType::none();
                }
            }
        }
        SizedType::uint64()
    }

    fn visit_offsetof(&mut self, target: &mut TypeOrExpr, field: &str, span: &Span) -> SizedType {
        let ty = match target {
            TypeOrExpr::Type(ty) => {
                if !self.resolve_type(ty, span, true) {
                    return SizedType::none();
                }
                ty.clone()
            }
            TypeOrExpr::Expr(expr) => {
                self.visit_expr(expr);
                expr.ty.clone()
            }
        };

        if ty.has_none() {
            return SizedType::none();
        }

        let Some(record) = ty.record_ref() else {
            self.error(span, format!("offsetof() requires a struct type, found '{}'", ty));
            return SizedType::none();
        };

        if record.field(field).is_none() {
            self.error(
                span,
                format!("'{}' has no field named '{}'", ty, field),
            );
            return SizedType::none();
        }

        SizedType::uint64()
    }

    fn visit_map(&mut self, ident: &str, keys: &mut [Expression], span: &Span) -> SizedType {
        self.visit_map_keys(ident, keys, span);

        match self.maps.get_map_type(ident) {
            Some(ty) if !ty.is_none() => ty.clone(),
            _ => {
                self.defer_or_error(span, format!("Undefined map: {}", ident));
                SizedType::none()
            }
        }
    }

    /// Types the key expressions of `ident[...]` and records the key.
    pub(super) fn visit_map_keys(
        &mut self,
        ident: &str,
        keys: &mut [Expression],
        span: &Span,
    ) -> Option<MapKey> {
        for key in keys.iter_mut() {
            self.assign_target = AssignTarget::MapKey;
            self.visit_expr(key);
        }

        let types = keys.iter().map(|key| key.ty.clone()).collect::<Vec<_>>();
        if types.iter().any(SizedType::has_none) {
            return None;
        }

        let key = MapRegistry::create_key_type(&types);
        match self.maps.assign_key(ident, &key, span) {
            Ok(key) => Some(key),
            Err(error) => {
                self.map_error(span, error);
                None
            }
        }
    }

    /// A map named as a whole, e.g. the argument of `clear(@m)`.
    pub(super) fn visit_map_reference(&mut self, expr: &mut Expression) {
        let Some(ident) = expr.map_ident().map(String::from) else {
            self.visit_expr(expr);
            return;
        };

        expr.ty = match self.maps.get_map_type(&ident) {
            Some(ty) if !ty.is_none() => ty.clone(),
            _ => {
                self.defer_or_error(&expr.span, format!("Undefined map: {}", ident));
                SizedType::none()
            }
        };
    }

    fn visit_variable(&mut self, name: &str, span: &Span) -> SizedType {
        match self.scopes.find(name).cloned() {
            None => {
                self.defer_or_error(span, format!("Undefined or undeclared variable: {}", name));
                SizedType::none()
            }
            Some(variable) if !variable.was_assigned => {
                self.defer_or_error(span, format!("Variable used before it was assigned: {}", name));
                SizedType::none()
            }
            Some(variable) if variable.ty.has_none() => {
                self.defer_or_error(span, format!("Could not resolve the type of {}", name));
                SizedType::none()
            }
            Some(variable) => variable.ty,
        }
    }

    fn visit_binop(
        &mut self,
        op: BinaryOp,
        left: &mut Expression,
        right: &mut Expression,
        span: &Span,
    ) -> SizedType {
        self.visit_expr(left);
        self.visit_expr(right);

        let lhs = left.ty.clone();
        let rhs = right.ty.clone();
        if lhs.has_none() || rhs.has_none() {
            return SizedType::none();
        }

        if lhs.is_array() || rhs.is_array() {
            self.error(
                span,
                format!("Invalid operation on array type: '{}' {} '{}'", lhs, op, rhs),
            );
            return SizedType::none();
        }

        if lhs.is_intlike() && rhs.is_intlike() {
            if matches!(op, BinaryOp::Div | BinaryOp::Mod)
                && matches!(right.kind, ExprKind::Integer(0))
            {
                self.error(span, "Divide or modulo by 0 detected");
                return SizedType::none();
            }

            let lhs = lhs.as_integer();
            let rhs = rhs.as_integer();

            if op.is_comparison()
                && lhs.is_signed != rhs.is_signed
                && !left.is_literal()
                && !right.is_literal()
            {
                self.warning(
                    span,
                    format!(
                        "comparison of integers of different signs: '{}' and '{}' can lead to undefined behavior",
                        lhs, rhs
                    ),
                );
            }

            if op.is_comparison() || op.is_logical() {
                return SizedType::uint64();
            }

            return SizedType::int(lhs.size.max(rhs.size) * 8, lhs.is_signed && rhs.is_signed);
        }

        if lhs.is_pointer() || rhs.is_pointer() {
            return self.binop_ptr(op, &lhs, &rhs, span);
        }

        if (lhs.is_string() && rhs.is_string()) || (lhs.is_buffer() && rhs.is_buffer()) {
            if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                return SizedType::uint64();
            }
            self.error(
                span,
                format!("The {} operator can not be used on expressions of type '{}'", op, lhs),
            );
            return SizedType::none();
        }

        self.error(
            span,
            format!("Type mismatch for '{}': comparing '{}' with '{}'", op, lhs, rhs),
        );
        SizedType::none()
    }

    fn binop_ptr(&mut self, op: BinaryOp, lhs: &SizedType, rhs: &SizedType, span: &Span) -> SizedType {
        let invalid = |analyser: &mut Self| {
            analyser.error(
                span,
                format!(
                    "The {} operator can not be used on expressions of types '{}', '{}'",
                    op, lhs, rhs
                ),
            );
            SizedType::none()
        };

        match (lhs.pointee(), rhs.pointee()) {
            (Some(left), Some(right)) => {
                if op.is_comparison() || op.is_logical() {
                    SizedType::uint64()
                } else if op == BinaryOp::Sub {
                    if left.size != right.size {
                        self.error(
                            span,
                            format!(
                                "The - operator requires pointers to types of the same size, found '{}' and '{}'",
                                lhs, rhs
                            ),
                        );
                        return SizedType::none();
                    }
                    SizedType::int64()
                } else {
                    invalid(self)
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                let (ptr, other) = if lhs.is_pointer() { (lhs, rhs) } else { (rhs, lhs) };
                if !other.is_intlike() {
                    return invalid(self);
                }

                if op.is_comparison() || op.is_logical() {
                    SizedType::uint64()
                } else if op == BinaryOp::Add || (op == BinaryOp::Sub && lhs.is_pointer()) {
                    ptr.clone()
                } else {
                    invalid(self)
                }
            }
            (None, None) => invalid(self),
        }
    }

    fn visit_unop(&mut self, op: UnaryOp, operand: &mut Expression, span: &Span) -> SizedType {
        if op.is_increment() {
            return self.visit_increment(op, operand, span);
        }

        self.visit_expr(operand);
        let ty = operand.ty.clone();
        if ty.has_none() {
            return SizedType::none();
        }

        let result = match op {
            UnaryOp::Not if ty.is_intlike() || ty.is_pointer() => Some(SizedType::uint64()),
            UnaryOp::BitNot if ty.is_intlike() => Some(ty.as_integer()),
            UnaryOp::Minus if ty.is_intlike() => Some(SizedType::int(ty.as_integer().size * 8, true)),
            UnaryOp::Deref => match ty.pointee() {
                Some(pointee) if pointee.is_void() => {
                    self.error(span, "Can not dereference a void pointer");
                    return SizedType::none();
                }
                Some(pointee) => {
                    let mut pointee = pointee.clone();
                    if pointee.addrspace == AddrSpace::None {
                        pointee.addrspace = ty.addrspace;
                    }
                    Some(pointee)
                }
                None if ty.is_intlike() => Some(SizedType::uint64()),
                None if ty.is_record() => Some(ty.clone()),
                None => None,
            },
            _ => None,
        };

        result.unwrap_or_else(|| {
            self.error(
                span,
                format!(
                    "The {} operator can not be used on expressions of type '{}'",
                    op, ty
                ),
            );
            SizedType::none()
        })
    }

    fn visit_increment(&mut self, op: UnaryOp, operand: &mut Expression, span: &Span) -> SizedType {
        let ty = match &mut operand.kind {
            ExprKind::Map { ident, keys } => {
                let ident = ident.clone();
                let map_span = operand.span.clone();
                self.visit_map_keys(&ident, keys, &map_span);

                match self.maps.get_map_type(&ident).cloned() {
                    Some(ty) if !ty.is_none() => ty,
                    _ => match self.maps.assign_map_type(&ident, &SizedType::int64(), &map_span) {
                        Ok(ty) => ty,
                        Err(error) => {
                            self.map_error(&map_span, error);
                            return SizedType::none();
                        }
                    },
                }
            }
            ExprKind::Variable(_) => {
                self.visit_expr(operand);
                operand.ty.clone()
            }
            _ => {
                self.error(
                    span,
                    format!("The {} operator must be applied to a map or variable", op),
                );
                return SizedType::none();
            }
        };

        operand.ty = ty.clone();

        if ty.has_none() {
            return SizedType::none();
        }

        if ty.is_intlike() {
            ty.as_integer()
        } else if ty.is_pointer() && operand.is_variable() {
            ty
        } else {
            self.error(
                span,
                format!("The {} operator can only be applied to integers, not '{}'", op, ty),
            );
            SizedType::none()
        }
    }

    fn visit_ternary(
        &mut self,
        cond: &mut Expression,
        left: &mut Expression,
        right: &mut Expression,
        span: &Span,
    ) -> SizedType {
        self.visit_expr(cond);
        self.visit_expr(left);
        self.visit_expr(right);

        if !cond.ty.has_none() && !cond.ty.is_intlike() && !cond.ty.is_pointer() {
            self.error(&cond.span, format!("Invalid condition in ternary: '{}'", cond.ty));
            return SizedType::none();
        }

        let lhs = &left.ty;
        let rhs = &right.ty;
        if cond.ty.has_none() || lhs.has_none() || rhs.has_none() {
            return SizedType::none();
        }

        let unified = if lhs.is_intlike() && rhs.is_intlike() {
            unify(&lhs.as_integer(), &rhs.as_integer())
        } else if is_same_type(lhs, rhs) {
            unify(lhs, rhs)
        } else {
            None
        };

        unified.unwrap_or_else(|| {
            let message = format!(
                "Ternary operator must return the same type: have '{}' and '{}'",
                lhs, rhs
            );
            self.error(span, message);
            SizedType::none()
        })
    }

    fn visit_field_access(
        &mut self,
        base: &mut Expression,
        field: &FieldRef,
        span: &Span,
    ) -> SizedType {
        self.visit_expr(base);
        let ty = base.ty.clone();
        if ty.has_none() {
            return SizedType::none();
        }

        match field {
            FieldRef::Index(index) => match ty.tuple_elements() {
                Some(elements) if *index < elements.len() => elements[*index].clone(),
                Some(elements) => {
                    self.error(
                        span,
                        format!(
                            "Invalid tuple index: {}. Found {} elements in tuple.",
                            index,
                            elements.len()
                        ),
                    );
                    SizedType::none()
                }
                None => {
                    self.error(
                        span,
                        format!("Can not access index '{}' on expression of type '{}'", index, ty),
                    );
                    SizedType::none()
                }
            },
            FieldRef::Named(name) => {
                if ty.is_pointer() {
                    self.error(
                        span,
                        format!(
                            "Can not access field '{}' on type '{}'. Try dereferencing it first, or using '->'",
                            name, ty
                        ),
                    );
                    return SizedType::none();
                }

                let Some(record) = ty.record_ref() else {
                    self.error(
                        span,
                        format!("Can not access field '{}' on expression of type '{}'", name, ty),
                    );
                    return SizedType::none();
                };

                let Some(record) = self.resolve_record(record, span) else {
                    return SizedType::none();
                };

                match record.field(name) {
                    Some(field) => {
                        let mut field_ty = field.ty.clone();
                        if field_ty.addrspace == AddrSpace::None {
                            field_ty.addrspace = ty.addrspace;
                        }
                        field_ty
                    }
                    None => {
                        self.error(
                            span,
                            format!(
                                "Struct/union of type '{}' does not contain a field named '{}'",
                                record.name, name
                            ),
                        );
                        SizedType::none()
                    }
                }
            }
        }
    }

    fn visit_array_access(
        &mut self,
        base: &mut Expression,
        index: &mut Expression,
        span: &Span,
    ) -> SizedType {
        self.visit_expr(base);
        self.visit_expr(index);

        let ty = base.ty.clone();
        if ty.has_none() || index.ty.has_none() {
            return SizedType::none();
        }

        if !index.ty.is_intlike() {
            self.error(
                &index.span,
                format!(
                    "The array index operator [] only accepts integer indices, got '{}'",
                    index.ty
                ),
            );
            return SizedType::none();
        }

        if let Some((element, len)) = ty.element() {
            if let ExprKind::Integer(value) = index.kind {
                if value >= len as u64 {
                    self.error(
                        &index.span,
                        format!("the index {} is out of bounds for array of size {}", value, len),
                    );
                    return SizedType::none();
                }
            }
            let mut element = element.clone();
            if element.addrspace == AddrSpace::None {
                element.addrspace = ty.addrspace;
            }
            return element;
        }

        if let Some(pointee) = ty.pointee() {
            let mut pointee = pointee.clone();
            if pointee.addrspace == AddrSpace::None {
                pointee.addrspace = ty.addrspace;
            }
            return pointee;
        }

        self.error(
            span,
            format!(
                "The array index operator [] can only be used on arrays and pointers, found '{}'",
                ty
            ),
        );
        SizedType::none()
    }

    fn visit_cast(&mut self, target: &mut SizedType, operand: &mut Expression, span: &Span) -> SizedType {
        self.visit_expr(operand);

        if target.is_record() {
            self.error(span, format!("Cannot cast to struct type '{}'", target));
            return SizedType::none();
        }

        if !self.resolve_type(target, span, false) {
            return SizedType::none();
        }

        let from = operand.ty.clone();
        if from.has_none() {
            return SizedType::none();
        }

        let valid = if target.is_int() {
            from.is_intlike()
                || from.is_pointer()
                || from
                    .element()
                    .is_some_and(|(element, _)| element.is_int() && from.size == target.size)
        } else if target.is_pointer() {
            from.is_intlike() || from.is_pointer()
        } else if let Some((element, _)) = target.element() {
            element.is_int() && from.is_int() && from.size == target.size
        } else {
            false
        };

        if !valid {
            self.error(span, format!("Cannot cast from '{}' to '{}'", from, target));
            return SizedType::none();
        }

        let mut ty = target.clone();
        if ty.is_pointer() && ty.addrspace == AddrSpace::None {
            ty.addrspace = if from.is_pointer() {
                from.addrspace
            } else {
                self.probe
                    .as_ref()
                    .map(|probe| find_addrspace(probe.probe_type))
                    .unwrap_or_default()
            };
        }
        ty
    }

    fn visit_tuple(&mut self, elements: &mut [Expression], span: &Span) -> SizedType {
        for element in elements.iter_mut() {
            self.visit_expr(element);
        }

        if elements.iter().any(|element| element.ty.has_none()) {
            return SizedType::none();
        }

        if elements.iter().any(|element| element.ty.is_void()) {
            self.error(span, "Invalid tuple element type: void");
            return SizedType::none();
        }

        SizedType::tuple(elements.iter().map(|element| element.ty.clone()).collect())
    }

    /// Completes a declared type: unsized strings and buffers take
    /// `max_strlen`, struct names are looked up. Returns false if a struct
    /// could not be found and `require_record` is set.
    pub(super) fn resolve_type(&mut self, ty: &mut SizedType, span: &Span, require_record: bool) -> bool {
        match &mut ty.kind {
            Type::String | Type::Buffer if ty.size == 0 => {
                ty.size = self.config.max_strlen;
                true
            }
            Type::Record(record) if !record.is_resolved() => {
                match self.symbols.resolve_struct(&record.name) {
                    Some(resolved) => {
                        ty.size = resolved.size;
                        *record = resolved;
                        true
                    }
                    None if require_record => {
                        let name = record.name.clone();
                        self.error(span, format!("Unknown struct/union: '{}'", name));
                        false
                    }
                    None => true,
                }
            }
            Type::Pointer(pointee) => self.resolve_type(pointee, span, false),
            Type::Array(element, len) => {
                let len = *len;
                let ok = self.resolve_type(element, span, require_record);
                ty.size = element.size * len;
                ok
            }
            _ => true,
        }
    }

    /// The full layout of `record`, reporting an error if it is unknown.
    fn resolve_record(&mut self, record: &Rc<Record>, span: &Span) -> Option<Rc<Record>> {
        if record.is_resolved() {
            return Some(Rc::clone(record));
        }

        match self.symbols.resolve_struct(&record.name) {
            Some(resolved) => Some(resolved),
            None => {
                self.error(span, format!("Unknown struct/union: '{}'", record.name));
                None
            }
        }
    }

    /// Value of a compile-time integer.
    pub(super) fn literal_integer(&self, expr: &Expression) -> Option<i64> {
        match &expr.kind {
            ExprKind::Integer(value) => i64::try_from(*value).ok(),
            ExprKind::Unop {
                op: UnaryOp::Minus,
                expr,
            } => match expr.kind {
                ExprKind::Integer(value) => i64::try_from(value).ok().map(|value| -value),
                _ => None,
            },
            ExprKind::PositionalParameter(n) => match self.config.param(*n) {
                Some(value) => param_as_integer(value),
                None => Some(0),
            },
            ExprKind::PositionalCount => i64::try_from(self.config.num_params()).ok(),
            _ => None,
        }
    }

    /// Value of a compile-time string.
    pub(super) fn literal_string(&self, expr: &Expression) -> Option<String> {
        match &expr.kind {
            ExprKind::String(value) => Some(value.clone()),
            ExprKind::PositionalParameter(n) => self
                .config
                .param(*n)
                .filter(|value| param_as_integer(value).is_none())
                .map(String::from),
            _ => None,
        }
    }
}
