use crate::{
    ast::{
        expressions::{ExprKind, Expression},
        statements::{Block, JumpKind, Statement, StmtKind, VarDeclaration},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    parser::{expr::parse_expr, lookups::BindingPower},
};

use super::{expr::compound_assignment_op, parser::Parser, types::parse_type};

pub fn parse_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    if let Some(handler) = parser
        .get_stmt_lookup()
        .get(&parser.current_token_kind())
        .copied()
    {
        return handler(parser);
    }

    let start = parser.get_position();
    let expr = parse_expr(parser, BindingPower::Default)?;

    let kind = match parser.current_token_kind() {
        TokenKind::Assignment => {
            parser.advance();
            let value = parse_expr(parser, BindingPower::Default)?;
            make_assignment(expr, value, None)?
        }
        kind => match compound_assignment_op(kind) {
            Some(op) => {
                parser.advance();
                let rhs = parse_expr(parser, BindingPower::Default)?;
                let span = expr.span.join(&rhs.span);
                let value = Expression::new(
                    ExprKind::Binop {
                        op,
                        left: Box::new(expr.clone()),
                        right: Box::new(rhs),
                    },
                    span,
                );
                make_assignment(expr, value, None)?
            }
            None => StmtKind::Expr(expr),
        },
    };

    end_stmt(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind,
        span: parser.span_from(&start),
    })
}

/// Routes `target = value` to a map or variable assignment.
fn make_assignment(
    target: Expression,
    value: Expression,
    declaration: Option<VarDeclaration>,
) -> Result<StmtKind, Error> {
    match &target.kind {
        ExprKind::Map { .. } => Ok(StmtKind::AssignMap {
            map: target,
            expr: value,
        }),
        ExprKind::Variable(_) => Ok(StmtKind::AssignVar {
            var: target,
            expr: value,
            declaration,
        }),
        _ => Err(Error::new(
            ErrorImpl::InvalidAssignmentTarget {
                target: target.describe(),
            },
            target.span.start.clone(),
        )),
    }
}

/// Statements end with `;`, which may be left out before `}`.
pub fn end_stmt(parser: &mut Parser) -> Result<(), Error> {
    match parser.current_token_kind() {
        TokenKind::Semicolon => {
            parser.advance();
            Ok(())
        }
        TokenKind::CloseCurly => Ok(()),
        _ => parser.expect(TokenKind::Semicolon).map(|_| ()),
    }
}

pub fn parse_block(parser: &mut Parser) -> Result<Block, Error> {
    let start = parser.expect(TokenKind::OpenCurly)?.span.start;

    let mut stmts = Vec::new();
    while parser.current_token_kind() != TokenKind::CloseCurly {
        if parser.current_token_kind() == TokenKind::Semicolon {
            parser.advance();
            continue;
        }
        stmts.push(parse_stmt(parser)?);
    }

    parser.expect(TokenKind::CloseCurly)?;

    Ok(Block {
        id: parser.advance_id(),
        stmts,
        span: parser.span_from(&start),
    })
}

pub fn parse_block_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let block = parse_block(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        span: block.span.clone(),
        kind: StmtKind::Block(block),
    })
}

pub fn parse_let_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let start = parser.advance().span.start.clone();

    let error = parser.unexpected("expected a variable after `let`");
    let token = parser.expect_error(TokenKind::Variable, Some(error))?;
    let var = Expression::new(ExprKind::Variable(token.value), token.span);

    let ty = if parser.current_token_kind() == TokenKind::Colon {
        parser.advance();
        Some(parse_type(parser, BindingPower::Default)?)
    } else {
        None
    };

    let kind = if parser.current_token_kind() == TokenKind::Assignment {
        parser.advance();
        let value = parse_expr(parser, BindingPower::Default)?;
        make_assignment(var, value, Some(VarDeclaration { ty }))?
    } else {
        StmtKind::VarDecl { var, ty }
    };

    end_stmt(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind,
        span: parser.span_from(&start),
    })
}

pub fn parse_if_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let start = parser.advance().span.start.clone();

    let cond = parse_expr(parser, BindingPower::Default)?;
    let then_block = parse_block(parser)?;

    let else_block = if parser.current_token_kind() == TokenKind::Else {
        parser.advance();
        if parser.current_token_kind() == TokenKind::If {
            // else if: the nested if gets a block of its own
            let nested = parse_if_stmt(parser)?;
            Some(Block {
                id: parser.advance_id(),
                span: nested.span.clone(),
                stmts: vec![nested],
            })
        } else {
            Some(parse_block(parser)?)
        }
    } else {
        None
    };

    Ok(Statement {
        id: parser.advance_id(),
        kind: StmtKind::If {
            cond,
            then_block,
            else_block,
        },
        span: parser.span_from(&start),
    })
}

pub fn parse_while_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let start = parser.advance().span.start.clone();

    let cond = parse_expr(parser, BindingPower::Default)?;
    let block = parse_block(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind: StmtKind::While { cond, block },
        span: parser.span_from(&start),
    })
}

pub fn parse_unroll_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let start = parser.advance().span.start.clone();

    let count = parse_expr(parser, BindingPower::Default)?;
    let block = parse_block(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind: StmtKind::Unroll {
            count,
            block,
            resolved: 0,
        },
        span: parser.span_from(&start),
    })
}

/// `for ($kv : @map) { }`; the parentheses are optional.
pub fn parse_for_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let start = parser.advance().span.start.clone();

    let parenthesised = parser.current_token_kind() == TokenKind::OpenParen;
    if parenthesised {
        parser.advance();
    }

    let error = parser.unexpected("expected a loop variable");
    let token = parser.expect_error(TokenKind::Variable, Some(error))?;
    let var = Expression::new(ExprKind::Variable(token.value), token.span);

    parser.expect(TokenKind::Colon)?;

    let map_position = parser.get_position();
    let map = parse_expr(parser, BindingPower::Default)?;
    if !map.is_map() {
        return Err(Error::new(
            ErrorImpl::UnexpectedTokenDetailed {
                token: map.describe(),
                message: String::from("for loops iterate over maps"),
            },
            map_position,
        ));
    }

    if parenthesised {
        parser.expect(TokenKind::CloseParen)?;
    }

    let block = parse_block(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind: StmtKind::For { var, map, block },
        span: parser.span_from(&start),
    })
}

pub fn parse_jump_stmt(parser: &mut Parser) -> Result<Statement, Error> {
    let token = parser.advance().clone();
    let kind = match token.kind {
        TokenKind::Return => JumpKind::Return,
        TokenKind::Break => JumpKind::Break,
        _ => JumpKind::Continue,
    };

    let value = match parser.current_token_kind() {
        TokenKind::Semicolon | TokenKind::CloseCurly => None,
        _ if kind == JumpKind::Return => Some(parse_expr(parser, BindingPower::Default)?),
        _ => None,
    };

    end_stmt(parser)?;

    Ok(Statement {
        id: parser.advance_id(),
        kind: StmtKind::Jump { kind, value },
        span: parser.span_from(&token.span.start),
    })
}
