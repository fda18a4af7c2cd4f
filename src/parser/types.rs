//! Type parsing implementation.
//!
//! Handles type annotations in casts, `let` declarations, subprogram
//! signatures, `sizeof` and `offsetof`:
//!
//! - Scalar names (`int8` .. `uint64`, `string`, `buffer`, `void`)
//! - `struct X`
//! - Pointers (`T *`) and arrays (`T[N]`); `string[N]` and `buffer[N]` size
//!   the string itself
//!
//! Similar to expression parsing, it uses NUD/LED handlers with
//! binding powers.

use std::{collections::HashMap, rc::Rc};

use crate::{
    ast::{
        ast::parse_u64,
        types::{AddrSpace, Record, SizedType, Type},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
};

use super::{lookups::BindingPower, parser::Parser};

pub type TypeNUDHandler = fn(&mut Parser) -> Result<SizedType, Error>;
pub type TypeLEDHandler = fn(&mut Parser, SizedType, BindingPower) -> Result<SizedType, Error>;
pub type TypeNUDLookup = HashMap<TokenKind, TypeNUDHandler>;
pub type TypeLEDLookup = HashMap<TokenKind, TypeLEDHandler>;
pub type TypeBPLookup = HashMap<TokenKind, BindingPower>;

pub fn create_token_type_lookups(parser: &mut Parser) {
    parser.type_nud(TokenKind::Identifier, parse_symbol_type);
    parser.type_nud(TokenKind::Struct, parse_struct_type);
    parser.type_led(TokenKind::Star, BindingPower::Call, parse_pointer_type);
    parser.type_led(TokenKind::OpenBracket, BindingPower::Call, parse_array_type);
}

/// Maps a scalar type name to its descriptor. Unsized strings and buffers
/// have size 0 until the analyser applies the configured maximum.
pub fn scalar_type(name: &str) -> Option<SizedType> {
    let ty = match name {
        "int8" => SizedType::int(8, true),
        "int16" => SizedType::int(16, true),
        "int32" => SizedType::int(32, true),
        "int64" => SizedType::int(64, true),
        "uint8" => SizedType::int(8, false),
        "uint16" => SizedType::int(16, false),
        "uint32" => SizedType::int(32, false),
        "uint64" => SizedType::int(64, false),
        "string" => SizedType::string(0),
        "buffer" => SizedType::buffer(0),
        "void" => SizedType::void(),
        _ => return None,
    };
    Some(ty)
}

/// True if the current token begins a type rather than an expression.
pub fn is_type_start(parser: &Parser) -> bool {
    match parser.current_token_kind() {
        TokenKind::Struct => true,
        TokenKind::Identifier => scalar_type(&parser.current_token().value).is_some(),
        _ => false,
    }
}

pub fn parse_symbol_type(parser: &mut Parser) -> Result<SizedType, Error> {
    let token = parser.expect(TokenKind::Identifier)?;
    scalar_type(&token.value).ok_or_else(|| {
        Error::new(
            ErrorImpl::UnknownType { type_: token.value },
            token.span.start,
        )
    })
}

pub fn parse_struct_type(parser: &mut Parser) -> Result<SizedType, Error> {
    parser.expect(TokenKind::Struct)?;
    let name = parser.expect(TokenKind::Identifier)?.value;
    Ok(SizedType::record(Rc::new(Record::unresolved(name))))
}

pub fn parse_pointer_type(
    parser: &mut Parser,
    left: SizedType,
    _bp: BindingPower,
) -> Result<SizedType, Error> {
    parser.expect(TokenKind::Star)?;
    Ok(SizedType::pointer(left, AddrSpace::None))
}

pub fn parse_array_type(
    parser: &mut Parser,
    left: SizedType,
    _bp: BindingPower,
) -> Result<SizedType, Error> {
    parser.expect(TokenKind::OpenBracket)?;
    let token = parser.expect(TokenKind::Number)?;
    let Some(len) = parse_u64(&token.value) else {
        return Err(Error::new(
            ErrorImpl::NumberParseError { token: token.value },
            token.span.start,
        ));
    };
    parser.expect(TokenKind::CloseBracket)?;

    let len = len as usize;
    Ok(match left.kind {
        Type::String if left.size == 0 => SizedType::string(len),
        Type::Buffer if left.size == 0 => SizedType::buffer(len),
        _ => SizedType::array(left, len),
    })
}

pub fn parse_type(parser: &mut Parser, bp: BindingPower) -> Result<SizedType, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let Some(nud) = parser.get_type_nud_lookup().get(&token_kind).copied() else {
        return Err(Error::new(
            ErrorImpl::UnexpectedToken {
                token: parser.current_token().value.clone(),
            },
            parser.get_position(),
        ));
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    while parser.current_type_bp() > bp {
        let token_kind = parser.current_token_kind();
        let Some(led) = parser.get_type_led_lookup().get(&token_kind).copied() else {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: parser.current_token().value.clone(),
                },
                parser.get_position(),
            ));
        };

        let bp = parser.current_type_bp();
        left = led(parser, left, bp)?;
    }

    Ok(left)
}
