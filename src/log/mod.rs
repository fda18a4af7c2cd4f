//! Diagnostic output.
//!
//! Everything the analyser reports goes through the [`log::DiagnosticSink`]
//! trait. Two sinks are provided:
//!
//! - [`log::Log`] renders messages against the program source using miette and
//!   forwards debug output to `tracing`
//! - [`collector::DiagnosticCollector`] keeps every message in memory

pub mod collector;
pub mod log;

pub use collector::{DiagnosticCollector, LogEntry};
pub use log::{DiagnosticSink, Log, LogError, LogType};

#[cfg(test)]
mod tests;
