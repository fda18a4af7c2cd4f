//! Top-level items: probes, subprograms and the config block.

use crate::{
    ast::{
        ast::{AttachPoint, Config, Probe, Subprog, SubprogArg},
        statements::{Statement, StmtKind},
        types::SizedType,
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
};

use super::{
    expr::parse_expr,
    lookups::BindingPower,
    parser::Parser,
    stmt::{end_stmt, parse_block},
    types::parse_type,
};

/// `ap[, ap]* [/pred/] { ... }`
pub fn parse_probe(parser: &mut Parser) -> Result<Probe, Error> {
    let start = parser.get_position();
    let mut attach_points = vec![];

    loop {
        let token = parser.advance().clone();
        match token.kind {
            TokenKind::AttachPoint | TokenKind::Begin | TokenKind::End => {
                attach_points.push(AttachPoint::parse(&token.value, token.span))
            }
            _ => {
                return Err(Error::new(
                    ErrorImpl::UnexpectedTokenDetailed {
                        token: token.value,
                        message: String::from("expected an attach point"),
                    },
                    token.span.start,
                ))
            }
        }

        if parser.current_token_kind() != TokenKind::Comma {
            break;
        }
        parser.advance();
    }

    let pred = if parser.current_token_kind() == TokenKind::Slash {
        parser.advance();
        let was_in_predicate = parser.set_in_predicate(true);
        let pred = parse_expr(parser, BindingPower::Default);
        parser.set_in_predicate(was_in_predicate);
        let pred = pred?;
        parser.expect(TokenKind::Slash)?;
        Some(pred)
    } else {
        None
    };

    let block = parse_block(parser)?;

    Ok(Probe {
        id: parser.advance_id(),
        attach_points,
        pred,
        block,
        span: parser.span_from(&start),
    })
}

/// `fn name($a: T, ...): T { ... }`; the return type defaults to `void`.
pub fn parse_subprog(parser: &mut Parser) -> Result<Subprog, Error> {
    let start = parser.advance().span.start.clone();
    let name = parser.expect(TokenKind::Identifier)?.value;

    parser.expect(TokenKind::OpenParen)?;

    let mut args = Vec::new();
    while parser.current_token_kind() != TokenKind::CloseParen {
        let error = parser.unexpected("expected an argument variable");
        let token = parser.expect_error(TokenKind::Variable, Some(error))?;
        parser.expect(TokenKind::Colon)?;
        let ty = parse_type(parser, BindingPower::Default)?;
        args.push(SubprogArg {
            name: token.value,
            span: parser.span_from(&token.span.start),
            ty,
        });

        if parser.current_token_kind() != TokenKind::CloseParen {
            parser.expect(TokenKind::Comma)?;
        }
    }

    parser.expect(TokenKind::CloseParen)?;

    let return_type = if parser.current_token_kind() == TokenKind::Colon {
        parser.advance();
        parse_type(parser, BindingPower::Default)?
    } else {
        SizedType::void()
    };

    let block = parse_block(parser)?;

    Ok(Subprog {
        id: parser.advance_id(),
        name,
        args,
        return_type,
        block,
        span: parser.span_from(&start),
    })
}

/// `config = { key = value; ... }`
pub fn parse_config(parser: &mut Parser) -> Result<Config, Error> {
    let start = parser.advance().span.start.clone();
    parser.expect(TokenKind::Assignment)?;
    parser.expect(TokenKind::OpenCurly)?;

    let mut stmts = Vec::new();
    while parser.current_token_kind() != TokenKind::CloseCurly {
        let key = parser.expect(TokenKind::Identifier)?;
        parser.expect(TokenKind::Assignment)?;
        let expr = parse_expr(parser, BindingPower::Default)?;
        end_stmt(parser)?;

        stmts.push(Statement {
            id: parser.advance_id(),
            span: parser.span_from(&key.span.start),
            kind: StmtKind::AssignConfigVar {
                name: key.value,
                expr,
            },
        });
    }

    parser.expect(TokenKind::CloseCurly)?;

    Ok(Config {
        id: parser.advance_id(),
        stmts,
        span: parser.span_from(&start),
    })
}
