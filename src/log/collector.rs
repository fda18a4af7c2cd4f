use crate::Span;

use super::log::{DiagnosticSink, LogType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogType,
    pub span: Option<Span>,
    pub message: String,
}

/// Sink that keeps every message, in emission order.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticCollector {
    entries: Vec<LogEntry>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn with_level(&self, level: LogType) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| entry.level == level)
    }

    pub fn errors(&self) -> Vec<&LogEntry> {
        self.with_level(LogType::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&LogEntry> {
        self.with_level(LogType::Warning).collect()
    }

    pub fn hints(&self) -> Vec<&LogEntry> {
        self.with_level(LogType::Hint).collect()
    }

    pub fn count(&self, level: LogType) -> usize {
        self.with_level(level).count()
    }

    /// True if a message at `level` contains `needle`.
    pub fn contains(&self, level: LogType, needle: &str) -> bool {
        self.with_level(level)
            .any(|entry| entry.message.contains(needle))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl DiagnosticSink for DiagnosticCollector {
    fn take_input(&mut self, level: LogType, span: Option<&Span>, message: &str) {
        self.entries.push(LogEntry {
            level,
            span: span.cloned(),
            message: String::from(message),
        });
    }
}
