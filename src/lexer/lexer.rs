use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{errors::errors::{Error, ErrorImpl}, Position, Span, MK_DEFAULT_HANDLER, MK_TOKEN};

use super::tokens::{Token, TokenKind, RESERVED_LOOKUP};

pub type RegexHandler = fn(&mut Lexer, &Regex);

pub struct RegexPattern {
    regex: Regex,
    handler: RegexHandler,
    /// Only tried outside of any `{ }`.
    top_level_only: bool,
}

impl RegexPattern {
    fn new(pattern: &str, handler: RegexHandler) -> Self {
        RegexPattern { regex: Regex::new(pattern).unwrap(), handler, top_level_only: false }
    }

    fn top_level(pattern: &str, handler: RegexHandler) -> Self {
        RegexPattern { top_level_only: true, ..RegexPattern::new(pattern, handler) }
    }
}

const PROVIDERS: &str = concat!(
    "kprobe|kretprobe|uprobe|uretprobe|usdt|tracepoint|rawtracepoint|profile|interval|",
    "software|hardware|watchpoint|fentry|fexit|kfunc|kretfunc|iter|",
    "kr|ur|rt|fr|it|k|u|U|t|p|i|s|h|w|f",
);

lazy_static! {
    static ref PATTERNS: Vec<RegexPattern> = vec![
        RegexPattern::top_level(&format!("^(?:{}):[^\\s,{{}}]*", PROVIDERS), attach_point_handler),
        RegexPattern::new("^\\s+", skip_handler),
        RegexPattern::new("^//[^\\n]*", skip_handler),
        RegexPattern::new("^/\\*(?s:.*?)\\*/", skip_handler),
        RegexPattern::new("^\"([^\"\\\\]|\\\\.)*\"", string_handler),
        RegexPattern::new("^\\$[0-9]+", positional_handler),
        RegexPattern::new("^\\$#", MK_DEFAULT_HANDLER!(TokenKind::ParamCount, "$#")),
        RegexPattern::new("^\\$[a-zA-Z_][a-zA-Z0-9_]*", variable_handler),
        RegexPattern::new("^@[a-zA-Z0-9_]*", map_handler),
        RegexPattern::new("^(0[xX][0-9a-fA-F_]+|[0-9][0-9_]*)", number_handler),
        RegexPattern::new("^[a-zA-Z_][a-zA-Z0-9_]*", symbol_handler),
        RegexPattern::new("^<<=", MK_DEFAULT_HANDLER!(TokenKind::ShiftLeftEquals, "<<=")),
        RegexPattern::new("^>>=", MK_DEFAULT_HANDLER!(TokenKind::ShiftRightEquals, ">>=")),
        RegexPattern::new("^==", MK_DEFAULT_HANDLER!(TokenKind::Equals, "==")),
        RegexPattern::new("^!=", MK_DEFAULT_HANDLER!(TokenKind::NotEquals, "!=")),
        RegexPattern::new("^<=", MK_DEFAULT_HANDLER!(TokenKind::LessEquals, "<=")),
        RegexPattern::new("^>=", MK_DEFAULT_HANDLER!(TokenKind::GreaterEquals, ">=")),
        RegexPattern::new("^<<", MK_DEFAULT_HANDLER!(TokenKind::ShiftLeft, "<<")),
        RegexPattern::new("^>>", MK_DEFAULT_HANDLER!(TokenKind::ShiftRight, ">>")),
        RegexPattern::new("^&&", MK_DEFAULT_HANDLER!(TokenKind::And, "&&")),
        RegexPattern::new("^\\|\\|", MK_DEFAULT_HANDLER!(TokenKind::Or, "||")),
        RegexPattern::new("^->", MK_DEFAULT_HANDLER!(TokenKind::Arrow, "->")),
        RegexPattern::new("^\\+\\+", MK_DEFAULT_HANDLER!(TokenKind::PlusPlus, "++")),
        RegexPattern::new("^--", MK_DEFAULT_HANDLER!(TokenKind::MinusMinus, "--")),
        RegexPattern::new("^\\+=", MK_DEFAULT_HANDLER!(TokenKind::PlusEquals, "+=")),
        RegexPattern::new("^-=", MK_DEFAULT_HANDLER!(TokenKind::MinusEquals, "-=")),
        RegexPattern::new("^\\*=", MK_DEFAULT_HANDLER!(TokenKind::StarEquals, "*=")),
        RegexPattern::new("^/=", MK_DEFAULT_HANDLER!(TokenKind::SlashEquals, "/=")),
        RegexPattern::new("^%=", MK_DEFAULT_HANDLER!(TokenKind::PercentEquals, "%=")),
        RegexPattern::new("^&=", MK_DEFAULT_HANDLER!(TokenKind::AmpersandEquals, "&=")),
        RegexPattern::new("^\\|=", MK_DEFAULT_HANDLER!(TokenKind::PipeEquals, "|=")),
        RegexPattern::new("^\\^=", MK_DEFAULT_HANDLER!(TokenKind::CaretEquals, "^=")),
        RegexPattern::new("^\\[", MK_DEFAULT_HANDLER!(TokenKind::OpenBracket, "[")),
        RegexPattern::new("^\\]", MK_DEFAULT_HANDLER!(TokenKind::CloseBracket, "]")),
        RegexPattern::new("^\\{", open_curly_handler),
        RegexPattern::new("^\\}", close_curly_handler),
        RegexPattern::new("^\\(", MK_DEFAULT_HANDLER!(TokenKind::OpenParen, "(")),
        RegexPattern::new("^\\)", MK_DEFAULT_HANDLER!(TokenKind::CloseParen, ")")),
        RegexPattern::new("^=", MK_DEFAULT_HANDLER!(TokenKind::Assignment, "=")),
        RegexPattern::new("^!", MK_DEFAULT_HANDLER!(TokenKind::Not, "!")),
        RegexPattern::new("^~", MK_DEFAULT_HANDLER!(TokenKind::Tilde, "~")),
        RegexPattern::new("^<", MK_DEFAULT_HANDLER!(TokenKind::Less, "<")),
        RegexPattern::new("^>", MK_DEFAULT_HANDLER!(TokenKind::Greater, ">")),
        RegexPattern::new("^\\|", MK_DEFAULT_HANDLER!(TokenKind::Pipe, "|")),
        RegexPattern::new("^&", MK_DEFAULT_HANDLER!(TokenKind::Ampersand, "&")),
        RegexPattern::new("^\\^", MK_DEFAULT_HANDLER!(TokenKind::Caret, "^")),
        RegexPattern::new("^\\.", MK_DEFAULT_HANDLER!(TokenKind::Dot, ".")),
        RegexPattern::new("^;", MK_DEFAULT_HANDLER!(TokenKind::Semicolon, ";")),
        RegexPattern::new("^:", MK_DEFAULT_HANDLER!(TokenKind::Colon, ":")),
        RegexPattern::new("^\\?", MK_DEFAULT_HANDLER!(TokenKind::Question, "?")),
        RegexPattern::new("^,", MK_DEFAULT_HANDLER!(TokenKind::Comma, ",")),
        RegexPattern::new("^\\+", MK_DEFAULT_HANDLER!(TokenKind::Plus, "+")),
        RegexPattern::new("^-", MK_DEFAULT_HANDLER!(TokenKind::Dash, "-")),
        RegexPattern::new("^/", MK_DEFAULT_HANDLER!(TokenKind::Slash, "/")),
        RegexPattern::new("^\\*", MK_DEFAULT_HANDLER!(TokenKind::Star, "*")),
        RegexPattern::new("^%", MK_DEFAULT_HANDLER!(TokenKind::Percent, "%")),
    ];
}

pub struct Lexer {
    tokens: Vec<Token>,
    source: String,
    pos: usize,
    file: Rc<String>,
    /// Curly brace nesting depth.
    depth: usize,
    /// Set by a handler that rejects its match.
    error: Option<Error>,
}

impl Lexer {
    pub fn new(source: String, file: Option<String>) -> Lexer {
        let file_name = if let Some(file) = file {
            Rc::new(file)
        } else {
            Rc::new(String::from("stdin"))
        };

        Lexer {
            pos: 0,
            tokens: vec![],
            source,
            file: file_name,
            depth: 0,
            error: None,
        }
    }

    pub fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn remainder(&self) -> &str {
        &self.source[self.pos..]
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Span from `start` to the current position.
    pub fn span_from(&self, start: usize) -> Span {
        Span {
            start: Position(start as u32, Rc::clone(&self.file)),
            end: Position(self.pos as u32, Rc::clone(&self.file)),
        }
    }

    fn matched(&self, regex: &Regex) -> String {
        regex
            .find(self.remainder())
            .map(|m| String::from(m.as_str()))
            .unwrap_or_default()
    }

    /// Pushes the whole match as a token of `kind`.
    fn push_match(&mut self, regex: &Regex, kind: TokenKind) -> String {
        let value = self.matched(regex);
        let start = self.pos;
        self.advance_n(value.len());
        self.push(MK_TOKEN!(kind, value.clone(), self.span_from(start)));
        value
    }
}

fn skip_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    lexer.advance_n(matched.len());
}

fn attach_point_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::AttachPoint);
}

fn variable_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::Variable);
}

fn map_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::Map);
}

fn number_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::Number);
}

fn positional_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    let start = lexer.pos;
    lexer.advance_n(matched.len());
    let span = lexer.span_from(start);
    lexer.push(MK_TOKEN!(TokenKind::PositionalParam, String::from(&matched[1..]), span));
}

fn open_curly_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::OpenCurly);
    lexer.depth += 1;
}

fn close_curly_handler(lexer: &mut Lexer, regex: &Regex) {
    lexer.push_match(regex, TokenKind::CloseCurly);
    lexer.depth = lexer.depth.saturating_sub(1);
}

fn string_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    let start = lexer.pos;
    lexer.advance_n(matched.len());

    let literal = &matched[1..matched.len() - 1];
    let mut result = String::new();
    let mut chars = literal.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }

        match chars.peek() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('0') => result.push('\0'),
            Some('x') => {
                chars.next();
                let mut hex = String::new();
                while hex.len() < 2 {
                    match chars.peek() {
                        Some(ch) if ch.is_ascii_hexdigit() => {
                            hex.push(*ch);
                            chars.next();
                        }
                        _ => break,
                    }
                }

                // string values are ASCII, one byte per char
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) if byte.is_ascii() => result.push(byte as char),
                    Ok(_) => {
                        let escape = format!("\\x{}", hex);
                        let position = Position(start as u32, Rc::clone(&lexer.file));
                        let error = Error::new(ErrorImpl::InvalidEscape { escape }, position);
                        lexer.error = Some(error);
                        return;
                    }
                    Err(_) => result.push_str("\\x"),
                }
                continue;
            }
            _ => {
                // Unknown escape: keep the backslash
                result.push(ch);
                continue;
            }
        }
        chars.next();
    }

    lexer.push(MK_TOKEN!(TokenKind::String, result, lexer.span_from(start)));
}

fn symbol_handler(lexer: &mut Lexer, regex: &Regex) {
    let value = lexer.matched(regex);
    let kind = RESERVED_LOOKUP.get(value.as_str()).copied().unwrap_or(TokenKind::Identifier);
    lexer.push_match(regex, kind);
}

pub fn tokenize(source: String, file: Option<String>) -> Result<Vec<Token>, Error> {
    let mut lex = Lexer::new(source, file);

    while !lex.at_eof() {
        let pattern = PATTERNS.iter().find(|pattern| {
            (!pattern.top_level_only || lex.depth == 0) && pattern.regex.is_match(lex.remainder())
        });

        match pattern {
            Some(pattern) => (pattern.handler)(&mut lex, &pattern.regex),
            None => {
                let token = lex.remainder().chars().next().map(String::from).unwrap_or_default();
                let position = Position(lex.pos as u32, Rc::clone(&lex.file));
                return Err(Error::new(ErrorImpl::UnrecognisedToken { token }, position));
            }
        }

        if let Some(error) = lex.error.take() {
            return Err(error);
        }
    }

    let eof = lex.span_from(lex.pos);
    lex.push(MK_TOKEN!(TokenKind::EOF, String::from("EOF"), eof));
    Ok(lex.tokens)
}
