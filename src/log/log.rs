use std::{
    collections::HashSet,
    fmt::Display,
    io::{self, Write},
};

use miette::{
    Diagnostic, GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, Severity,
    SourceCode, SourceSpan,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{get_line_at_position, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogType {
    Debug,
    V1,
    Hint,
    Warning,
    Error,
    Bug,
}

impl LogType {
    pub fn can_disable(self) -> bool {
        !matches!(self, LogType::Error | LogType::Bug)
    }
}

impl Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogType::Debug => "DEBUG",
            LogType::V1 => "V1",
            LogType::Hint => "HINT",
            LogType::Warning => "WARNING",
            LogType::Error => "ERROR",
            LogType::Bug => "BUG",
        };
        write!(f, "{}", name)
    }
}

/// Receives every message the analyser emits.
pub trait DiagnosticSink {
    fn take_input(&mut self, level: LogType, span: Option<&Span>, message: &str);
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("log level {0} can not be disabled")]
    CannotDisable(LogType),
}

#[derive(Debug, Error)]
#[error("{message}")]
struct LogDiagnostic {
    message: String,
    severity: Severity,
    src: NamedSource<String>,
    span: SourceSpan,
}

impl Diagnostic for LogDiagnostic {
    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            None, self.span,
        ))))
    }
}

/// Renders diagnostics for one program source.
pub struct Log {
    filename: String,
    source: String,
    enabled: HashSet<LogType>,
    colorize: bool,
    out: Box<dyn Write>,
}

impl Log {
    /// Creates a log writing to stderr with every level except `Debug` and
    /// `V1` enabled.
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        Log {
            filename: filename.into(),
            source: source.into(),
            enabled: HashSet::from([
                LogType::Hint,
                LogType::Warning,
                LogType::Error,
                LogType::Bug,
            ]),
            colorize: false,
            out: Box::new(io::stderr()),
        }
    }

    pub fn with_writer(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_color(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    pub fn enable(&mut self, level: LogType) {
        self.enabled.insert(level);
    }

    pub fn disable(&mut self, level: LogType) -> Result<(), LogError> {
        if !level.can_disable() {
            return Err(LogError::CannotDisable(level));
        }
        self.enabled.remove(&level);
        Ok(())
    }

    pub fn is_enabled(&self, level: LogType) -> bool {
        self.enabled.contains(&level)
    }

    /// Renders one message the way it would be written to the output.
    pub fn render(&self, level: LogType, span: Option<&Span>, message: &str) -> String {
        let Some(span) = span.filter(|span| self.in_source(span)) else {
            return format!("{}: {}\n", level, message);
        };

        let message = match level {
            LogType::Bug => format!("BUG: {}", message),
            _ => String::from(message),
        };

        let severity = match level {
            LogType::Hint | LogType::Debug | LogType::V1 => Severity::Advice,
            LogType::Warning => Severity::Warning,
            LogType::Error | LogType::Bug => Severity::Error,
        };

        let diagnostic = LogDiagnostic {
            message,
            severity,
            src: NamedSource::new(self.filename.clone(), self.source.clone()),
            span: SourceSpan::from((span.offset(), span.len())),
        };

        let theme = if self.colorize {
            GraphicalTheme::unicode()
        } else {
            GraphicalTheme::unicode_nocolor()
        };

        let mut rendered = String::new();
        match GraphicalReportHandler::new_themed(theme).render_report(&mut rendered, &diagnostic) {
            Ok(()) => rendered,
            Err(_) => format!("{}: {}: {}\n", self.location(span), level, diagnostic.message),
        }
    }

    fn in_source(&self, span: &Span) -> bool {
        !span.is_null() && span.end.0 as usize <= self.source.len()
    }

    /// `file:line:col` for the start of `span`.
    fn location(&self, span: &Span) -> String {
        match get_line_at_position(&self.source, span.start.0) {
            Some((line, _, column)) => format!("{}:{}:{}", self.filename, line, column + 1),
            None => self.filename.clone(),
        }
    }
}

impl DiagnosticSink for Log {
    fn take_input(&mut self, level: LogType, span: Option<&Span>, message: &str) {
        if !self.is_enabled(level) {
            return;
        }

        match level {
            LogType::Debug | LogType::V1 => {
                let location = span
                    .filter(|span| self.in_source(span))
                    .map(|span| self.location(span))
                    .unwrap_or_else(|| self.filename.clone());
                if level == LogType::Debug {
                    debug!("{}: {}", location, message);
                } else {
                    info!("{}: {}", location, message);
                }
            }
            _ => {
                let rendered = self.render(level, span, message);
                if let Err(error) = self.out.write_all(rendered.as_bytes()) {
                    warn!("failed to write diagnostic: {}", error);
                }

                // the process aborts right after a bug report
                if level == LogType::Bug {
                    if let Err(error) = self.out.flush() {
                        warn!("failed to flush diagnostics: {}", error);
                    }
                }
            }
        }
    }
}
