use crate::{
    ast::{
        ast::parse_u64,
        expressions::{is_builtin, BinaryOp, ExprKind, Expression, FieldRef, TypeOrExpr, UnaryOp},
        types::StackMode,
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
};

use super::{
    lookups::BindingPower,
    parser::Parser,
    types::{is_type_start, parse_type},
};

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<Expression, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let Some(nud) = parser.get_nud_lookup().get(&token_kind).copied() else {
        return Err(Error::new(
            ErrorImpl::UnexpectedToken {
                token: parser.current_token().value.clone(),
            },
            parser.get_position(),
        ));
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    while parser.current_bp() > bp {
        let token_kind = parser.current_token_kind();
        let Some(led) = parser.get_led_lookup().get(&token_kind).copied() else {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: parser.current_token().value.clone(),
                },
                parser.get_position(),
            ));
        };

        let bp = parser.current_bp();
        left = led(parser, left, bp)?;
    }

    Ok(left)
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let token = parser.advance().clone();

    let kind = match token.kind {
        TokenKind::Number => match parse_u64(&token.value) {
            Some(value) => ExprKind::Integer(value),
            None => {
                return Err(Error::new(
                    ErrorImpl::NumberParseError { token: token.value },
                    token.span.start,
                ))
            }
        },
        TokenKind::String => ExprKind::String(token.value),
        TokenKind::Variable => ExprKind::Variable(token.value),
        TokenKind::PositionalParam => match token.value.parse() {
            Ok(n) => ExprKind::PositionalParameter(n),
            Err(_) => {
                return Err(Error::new(
                    ErrorImpl::NumberParseError { token: token.value },
                    token.span.start,
                ))
            }
        },
        TokenKind::ParamCount => ExprKind::PositionalCount,
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken { token: token.value },
                token.span.start,
            ))
        }
    };

    Ok(Expression::new(kind, token.span))
}

/// Builtin, call or bare identifier.
pub fn parse_identifier_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let token = parser.advance().clone();

    if parser.current_token_kind() == TokenKind::OpenParen {
        return parse_call_expr(parser, token.value, token.span.start);
    }

    let kind = if is_builtin(&token.value) {
        ExprKind::Builtin(token.value)
    } else {
        ExprKind::Identifier(token.value)
    };

    Ok(Expression::new(kind, token.span))
}

fn parse_call_expr(
    parser: &mut Parser,
    func: String,
    start: crate::Position,
) -> Result<Expression, Error> {
    parser.expect(TokenKind::OpenParen)?;

    let is_stack = func == "kstack" || func == "ustack";
    let mut args = vec![];

    while parser.current_token_kind() != TokenKind::CloseParen {
        let mut arg = parse_expr(parser, BindingPower::Default)?;

        if is_stack {
            if let ExprKind::Identifier(name) = &arg.kind {
                if let Some(mode) = StackMode::from_name(name) {
                    arg.kind = ExprKind::StackMode(mode);
                }
            }
        }
        args.push(arg);

        if parser.current_token_kind() != TokenKind::CloseParen {
            parser.expect(TokenKind::Comma)?;
        }
    }

    parser.expect(TokenKind::CloseParen)?;

    Ok(Expression::new(
        ExprKind::Call { func, args },
        parser.span_from(&start),
    ))
}

pub fn parse_map_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let token = parser.advance().clone();
    let mut keys = vec![];

    if parser.current_token_kind() == TokenKind::OpenBracket {
        parser.advance();
        while parser.current_token_kind() != TokenKind::CloseBracket {
            keys.push(parse_expr(parser, BindingPower::Default)?);

            if parser.current_token_kind() != TokenKind::CloseBracket {
                parser.expect(TokenKind::Comma)?;
            }
        }
        parser.expect(TokenKind::CloseBracket)?;
    }

    Ok(Expression::new(
        ExprKind::Map {
            ident: token.value,
            keys,
        },
        parser.span_from(&token.span.start),
    ))
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Dash => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Ampersand => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::ShiftLeft => BinaryOp::Shl,
        TokenKind::ShiftRight => BinaryOp::Shr,
        TokenKind::Equals => BinaryOp::Eq,
        TokenKind::NotEquals => BinaryOp::Ne,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEquals => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEquals => BinaryOp::Ge,
        TokenKind::And => BinaryOp::LogicalAnd,
        TokenKind::Or => BinaryOp::LogicalOr,
        _ => return None,
    };
    Some(op)
}

/// Operator of a compound assignment such as `+=`.
pub fn compound_assignment_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::PlusEquals => BinaryOp::Add,
        TokenKind::MinusEquals => BinaryOp::Sub,
        TokenKind::StarEquals => BinaryOp::Mul,
        TokenKind::SlashEquals => BinaryOp::Div,
        TokenKind::PercentEquals => BinaryOp::Mod,
        TokenKind::AmpersandEquals => BinaryOp::BitAnd,
        TokenKind::PipeEquals => BinaryOp::BitOr,
        TokenKind::CaretEquals => BinaryOp::BitXor,
        TokenKind::ShiftLeftEquals => BinaryOp::Shl,
        TokenKind::ShiftRightEquals => BinaryOp::Shr,
        _ => return None,
    };
    Some(op)
}

pub fn parse_binary_expr(
    parser: &mut Parser,
    left: Expression,
    bp: BindingPower,
) -> Result<Expression, Error> {
    let operator_token = parser.advance().clone();
    let Some(op) = binary_op(operator_token.kind) else {
        return Err(Error::new(
            ErrorImpl::UnexpectedToken {
                token: operator_token.value,
            },
            operator_token.span.start,
        ));
    };

    let right = parse_expr(parser, bp)?;
    let span = left.span.join(&right.span);

    Ok(Expression::new(
        ExprKind::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    ))
}

pub fn parse_prefix_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let operator_token = parser.advance().clone();
    let op = match operator_token.kind {
        TokenKind::Dash => UnaryOp::Minus,
        TokenKind::Not => UnaryOp::Not,
        TokenKind::Tilde => UnaryOp::BitNot,
        TokenKind::Star => UnaryOp::Deref,
        TokenKind::PlusPlus => UnaryOp::PreIncrement,
        _ => UnaryOp::PreDecrement,
    };

    let rhs = parse_expr(parser, BindingPower::Unary)?;
    let span = operator_token.span.join(&rhs.span);

    Ok(Expression::new(
        ExprKind::Unop {
            op,
            expr: Box::new(rhs),
        },
        span,
    ))
}

pub fn parse_postfix_expr(
    parser: &mut Parser,
    left: Expression,
    _bp: BindingPower,
) -> Result<Expression, Error> {
    let operator_token = parser.advance().clone();
    let op = if operator_token.kind == TokenKind::PlusPlus {
        UnaryOp::PostIncrement
    } else {
        UnaryOp::PostDecrement
    };
    let span = left.span.join(&operator_token.span);

    Ok(Expression::new(
        ExprKind::Unop {
            op,
            expr: Box::new(left),
        },
        span,
    ))
}

pub fn parse_ternary_expr(
    parser: &mut Parser,
    cond: Expression,
    _bp: BindingPower,
) -> Result<Expression, Error> {
    parser.expect(TokenKind::Question)?;
    let left = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::Colon)?;
    // Right associative
    let right = parse_expr(parser, BindingPower::Assignment)?;
    let span = cond.span.join(&right.span);

    Ok(Expression::new(
        ExprKind::Ternary {
            cond: Box::new(cond),
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    ))
}

/// `(expr)`, `(a, b)` tuples and `(type)expr` casts.
pub fn parse_grouping_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let start = parser.advance().span.start.clone();

    if is_type_start(parser) {
        let ty = parse_type(parser, BindingPower::Default)?;
        parser.expect(TokenKind::CloseParen)?;
        let expr = parse_expr(parser, BindingPower::Unary)?;

        return Ok(Expression::new(
            ExprKind::Cast {
                ty,
                expr: Box::new(expr),
            },
            parser.span_from(&start),
        ));
    }

    let was_in_predicate = parser.set_in_predicate(false);
    let first = parse_expr(parser, BindingPower::Default);
    let result = first.and_then(|first| {
        if parser.current_token_kind() != TokenKind::Comma {
            parser.expect(TokenKind::CloseParen)?;
            return Ok(first);
        }

        let mut elements = vec![first];
        while parser.current_token_kind() == TokenKind::Comma {
            parser.advance();
            elements.push(parse_expr(parser, BindingPower::Default)?);
        }
        parser.expect(TokenKind::CloseParen)?;

        Ok(Expression::new(ExprKind::Tuple(elements), parser.span_from(&start)))
    });
    parser.set_in_predicate(was_in_predicate);

    result
}

pub fn parse_member_expr(
    parser: &mut Parser,
    left: Expression,
    _bp: BindingPower,
) -> Result<Expression, Error> {
    let operator = parser.advance().clone();
    let member = parser.advance().clone();

    let field = match member.kind {
        TokenKind::Identifier => FieldRef::Named(member.value),
        TokenKind::Number if operator.kind == TokenKind::Dot => match member.value.parse() {
            Ok(index) => FieldRef::Index(index),
            Err(_) => {
                return Err(Error::new(
                    ErrorImpl::NumberParseError {
                        token: member.value,
                    },
                    member.span.start,
                ))
            }
        },
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: member.value,
                    message: String::from("expected a field name"),
                },
                member.span.start,
            ))
        }
    };

    let span = left.span.join(&member.span);

    // a->b is (*a).b
    let target = if operator.kind == TokenKind::Arrow {
        let left_span = left.span.clone();
        Expression::new(
            ExprKind::Unop {
                op: UnaryOp::Deref,
                expr: Box::new(left),
            },
            left_span,
        )
    } else {
        left
    };

    Ok(Expression::new(
        ExprKind::FieldAccess {
            expr: Box::new(target),
            field,
        },
        span,
    ))
}

pub fn parse_array_access_expr(
    parser: &mut Parser,
    left: Expression,
    _bp: BindingPower,
) -> Result<Expression, Error> {
    parser.expect(TokenKind::OpenBracket)?;
    let index = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;
    let span = parser.span_from(&left.span.start);

    Ok(Expression::new(
        ExprKind::ArrayAccess {
            expr: Box::new(left),
            index: Box::new(index),
        },
        span,
    ))
}

fn parse_type_or_expr(parser: &mut Parser) -> Result<TypeOrExpr, Error> {
    if is_type_start(parser) {
        Ok(TypeOrExpr::Type(parse_type(parser, BindingPower::Default)?))
    } else {
        Ok(TypeOrExpr::Expr(Box::new(parse_expr(
            parser,
            BindingPower::Default,
        )?)))
    }
}

pub fn parse_sizeof_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::OpenParen)?;
    let target = parse_type_or_expr(parser)?;
    parser.expect(TokenKind::CloseParen)?;

    Ok(Expression::new(ExprKind::Sizeof(target), parser.span_from(&start)))
}

pub fn parse_offsetof_expr(parser: &mut Parser) -> Result<Expression, Error> {
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::OpenParen)?;
    let target = parse_type_or_expr(parser)?;
    parser.expect(TokenKind::Comma)?;
    let field = parser.expect(TokenKind::Identifier)?.value;
    parser.expect(TokenKind::CloseParen)?;

    Ok(Expression::new(
        ExprKind::Offsetof { target, field },
        parser.span_from(&start),
    ))
}
