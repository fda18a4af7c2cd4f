//! Unit tests for the lexer module.

use super::{lexer::tokenize, tokens::TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source.to_string(), Some("test.bt".to_string()))
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_tokenize_keywords() {
    let source = "if else while for unroll return break continue let config fn sizeof offsetof struct".to_string();
    let tokens = tokenize(source, Some("test.bt".to_string())).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::If);
    assert_eq!(tokens[1].kind, TokenKind::Else);
    assert_eq!(tokens[2].kind, TokenKind::While);
    assert_eq!(tokens[3].kind, TokenKind::For);
    assert_eq!(tokens[4].kind, TokenKind::Unroll);
    assert_eq!(tokens[5].kind, TokenKind::Return);
    assert_eq!(tokens[6].kind, TokenKind::Break);
    assert_eq!(tokens[7].kind, TokenKind::Continue);
    assert_eq!(tokens[8].kind, TokenKind::Let);
    assert_eq!(tokens[9].kind, TokenKind::Config);
    assert_eq!(tokens[10].kind, TokenKind::Fn);
    assert_eq!(tokens[11].kind, TokenKind::Sizeof);
    assert_eq!(tokens[12].kind, TokenKind::Offsetof);
    assert_eq!(tokens[13].kind, TokenKind::Struct);
    assert_eq!(tokens[14].kind, TokenKind::EOF);
}

#[test]
fn test_tokenize_sigils() {
    let tokens = tokenize("$x @counts @ $1 $#".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Variable);
    assert_eq!(tokens[0].value, "$x");
    assert_eq!(tokens[1].kind, TokenKind::Map);
    assert_eq!(tokens[1].value, "@counts");
    assert_eq!(tokens[2].kind, TokenKind::Map);
    assert_eq!(tokens[2].value, "@");
    assert_eq!(tokens[3].kind, TokenKind::PositionalParam);
    assert_eq!(tokens[3].value, "1");
    assert_eq!(tokens[4].kind, TokenKind::ParamCount);
}

#[test]
fn test_tokenize_numbers() {
    let tokens = tokenize("42 0x1f 1_000".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Number);
    assert_eq!(tokens[0].value, "42");
    assert_eq!(tokens[1].value, "0x1f");
    assert_eq!(tokens[2].value, "1_000");
}

#[test]
fn test_tokenize_string_escapes() {
    let tokens = tokenize(r#""a\tb\n" "q\"x""#.to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].value, "a\tb\n");
    assert_eq!(tokens[1].value, "q\"x");
}

#[test]
fn test_tokenize_attach_points_only_at_top_level() {
    let tokens = tokenize("kprobe:vfs_read { $a ? 1 : 2 }".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::AttachPoint);
    assert_eq!(tokens[0].value, "kprobe:vfs_read");
    assert_eq!(tokens[1].kind, TokenKind::OpenCurly);
    assert_eq!(tokens[4].kind, TokenKind::Number);
    assert_eq!(tokens[5].kind, TokenKind::Colon);
}

#[test]
fn test_tokenize_attach_point_list() {
    let tokens = tokenize("uprobe:/bin/bash:readline,t:syscalls:sys_enter_* {}".to_string(), None).unwrap();

    assert_eq!(tokens[0].value, "uprobe:/bin/bash:readline");
    assert_eq!(tokens[1].kind, TokenKind::Comma);
    assert_eq!(tokens[2].value, "t:syscalls:sys_enter_*");
}

#[test]
fn test_tokenize_operators_longest_match() {
    assert_eq!(
        kinds("<<= >>= == != <= >= << >> && || -> ++ -- += |="),
        vec![
            TokenKind::ShiftLeftEquals,
            TokenKind::ShiftRightEquals,
            TokenKind::Equals,
            TokenKind::NotEquals,
            TokenKind::LessEquals,
            TokenKind::GreaterEquals,
            TokenKind::ShiftLeft,
            TokenKind::ShiftRight,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Arrow,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
            TokenKind::PlusEquals,
            TokenKind::PipeEquals,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_comments() {
    assert_eq!(
        kinds("// line\n$a /* block\n comment */ = 1;"),
        vec![TokenKind::Variable, TokenKind::Assignment, TokenKind::Number, TokenKind::Semicolon, TokenKind::EOF]
    );
}

#[test]
fn test_token_spans() {
    let tokens = tokenize("BEGIN { @x = 1; }".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Begin);
    assert_eq!(tokens[2].span.start.0, 8);
    assert_eq!(tokens[2].span.end.0, 10);
}

#[test]
fn test_tokenize_unrecognised() {
    let result = tokenize("BEGIN { # }".to_string(), None);
    assert!(result.is_err());
    let error = result.unwrap_err();
    assert_eq!(error.get_position().0, 8);
}

#[test]
fn test_tokenize_hex_escapes() {
    let tokens = tokenize(r#""\x41\x7f""#.to_string(), None).unwrap();
    assert_eq!(tokens[0].value, "A\x7f");
    assert_eq!(tokens[0].value.len(), 2);

    let error = tokenize(r#"BEGIN { @s = "\xff"; }"#.to_string(), None).unwrap_err();
    assert_eq!(error.get_error_name(), "InvalidEscape");
    assert_eq!(error.get_position().0, 13);
}
