use std::fmt::Display;

use thiserror::Error;

use crate::{log::{DiagnosticSink, LogType}, Position, Span};

/// Lexer or parser failure at a source position.
#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_internal_error(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::UnknownType { .. } => "UnknownType",
            ErrorImpl::InvalidAssignmentTarget { .. } => "InvalidAssignmentTarget",
            ErrorImpl::DuplicateConfig => "DuplicateConfig",
            ErrorImpl::InvalidEscape { .. } => "InvalidEscape",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorTip::None,
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, did you miss a semicolon?",
                token
            )),
            ErrorImpl::UnexpectedTokenDetailed { token, message } => {
                ErrorTip::Suggestion(format!("Unexpected token: `{}`, {}", token, message))
            }
            ErrorImpl::NumberParseError { token } => ErrorTip::Suggestion(format!(
                "Invalid number: `{}`, is it above the 64-bit integer limit?",
                token
            )),
            ErrorImpl::UnknownType { type_ } => {
                ErrorTip::Suggestion(format!("Unknown type `{}` found", type_))
            }
            ErrorImpl::InvalidAssignmentTarget { target } => ErrorTip::Suggestion(format!(
                "Only maps and variables can be assigned to, found `{}`",
                target
            )),
            ErrorImpl::DuplicateConfig => {
                ErrorTip::Suggestion(String::from("Only one config block is allowed"))
            }
            ErrorImpl::InvalidEscape { escape } => ErrorTip::Suggestion(format!(
                "Escape `{}` is outside of ASCII, strings only hold bytes up to \\x7f",
                escape
            )),
        }
    }

    /// Sends this error to `sink` as an `Error` level message.
    pub fn report(&self, sink: &mut dyn DiagnosticSink) {
        let end = Position(self.position.0 + 1, self.position.1.clone());
        let span = Span::new(self.position.clone(), end);
        let message = match self.get_tip() {
            ErrorTip::None => format!("{}: {}", self.get_error_name(), self.internal_error),
            tip => format!("{}: {}", self.get_error_name(), tip),
        };
        sink.take_input(LogType::Error, Some(&span), &message);
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ErrorImpl {
    #[error("unrecognised token: {token:?}")]
    UnrecognisedToken { token: String },
    #[error("unexpected token: {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected token ({message:?}): {token:?}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("error parsing number: {token:?}")]
    NumberParseError { token: String },
    #[error("unknown type {type_} found")]
    UnknownType { type_: String },
    #[error("invalid assignment target {target:?}")]
    InvalidAssignmentTarget { target: String },
    #[error("duplicate config block")]
    DuplicateConfig,
    #[error("invalid escape sequence {escape:?}")]
    InvalidEscape { escape: String },
}

/// Failure of a pipeline stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    #[error("{pass} pass failed with {errors} error(s)")]
    Failed { pass: &'static str, errors: usize },
}
