//! Utility macros.
//!
//! - `MK_TOKEN!` - Creates a Token instance
//! - `MK_DEFAULT_HANDLER!` - Creates a lexer handler for fixed-text tokens
//! - `BUG!` - Reports an internal invariant violation and aborts

/// Creates a Token instance.
///
/// # Example
///
/// ```ignore
/// let token = MK_TOKEN!(TokenKind::Number, "42".to_string(), span);
/// ```
#[macro_export]
macro_rules! MK_TOKEN {
    ($kind:expr, $value:expr, $span:expr) => {
        Token {
            kind: $kind,
            value: $value,
            span: $span,
        }
    };
}

/// Creates a lexer handler for a token whose text never varies.
///
/// # Example
///
/// ```ignore
/// RegexPattern::new("^\\+", MK_DEFAULT_HANDLER!(TokenKind::Plus, "+"))
/// ```
#[macro_export]
macro_rules! MK_DEFAULT_HANDLER {
    ($kind:expr, $value:literal) => {
        |lexer: &mut Lexer, _regex: &Regex| {
            let start = lexer.pos;
            lexer.advance_n($value.len());
            lexer.push(MK_TOKEN!($kind, String::from($value), lexer.span_from(start)));
        }
    };
}

/// Reports an internal invariant violation through a diagnostic sink, then
/// aborts the process. Evaluates to `!`.
///
/// ```ignore
/// BUG!(self.sink, "map assignment target is not a map: {:?}", kind);
/// ```
#[macro_export]
macro_rules! BUG {
    ($sink:expr, $($arg:tt)*) => {{
        let message = format!("[{}:{}] {}", file!(), line!(), format!($($arg)*));
        $sink.take_input($crate::log::LogType::Bug, None, &message);
        std::process::abort()
    }};
}
