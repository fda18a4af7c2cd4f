//! Unit tests for diagnostic sinks.

use std::{cell::RefCell, io::Write, rc::Rc};

use super::{DiagnosticCollector, DiagnosticSink, Log, LogError, LogType};
use crate::{Position, Span};

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }
}

fn span(start: u32, end: u32) -> Span {
    let file = Rc::new(String::from("test.bt"));
    Span::new(Position(start, Rc::clone(&file)), Position(end, file))
}

#[test]
fn test_errors_can_not_be_disabled() {
    let mut log = Log::new("test.bt", "");

    assert_eq!(log.disable(LogType::Error), Err(LogError::CannotDisable(LogType::Error)));
    assert_eq!(log.disable(LogType::Bug), Err(LogError::CannotDisable(LogType::Bug)));
    assert!(log.is_enabled(LogType::Error));

    assert!(log.disable(LogType::Warning).is_ok());
    assert!(!log.is_enabled(LogType::Warning));
}

#[test]
fn test_disabled_level_is_not_written() {
    let buf = SharedBuf::default();
    let mut log = Log::new("test.bt", "BEGIN { }").with_writer(Box::new(buf.clone()));
    log.disable(LogType::Warning).unwrap();

    log.take_input(LogType::Warning, None, "quiet please");
    assert!(buf.contents().is_empty());

    log.take_input(LogType::Error, None, "loud");
    assert_eq!(buf.contents(), "ERROR: loud\n");
}

#[test]
fn test_render_with_span_names_file_and_message() {
    let source = "BEGIN { @x = 1; }\n";
    let log = Log::new("test.bt", source);

    let rendered = log.render(LogType::Error, Some(&span(8, 10)), "Undefined map: @x");
    assert!(rendered.contains("Undefined map: @x"));
    assert!(rendered.contains("test.bt"));
    assert!(rendered.contains("@x = 1"));
}

#[test]
fn test_render_span_outside_source_falls_back_to_plain() {
    let log = Log::new("test.bt", "short");
    let rendered = log.render(LogType::Warning, Some(&span(40, 50)), "far away");
    assert_eq!(rendered, "WARNING: far away\n");
}

#[test]
fn test_bug_messages_are_prefixed() {
    let log = Log::new("test.bt", "");
    assert_eq!(log.render(LogType::Bug, None, "oops"), "BUG: oops\n");
}

#[test]
fn test_collector_counts_by_level() {
    let mut collector = DiagnosticCollector::new();
    collector.take_input(LogType::Error, Some(&span(0, 1)), "first error");
    collector.take_input(LogType::Hint, None, "a hint");
    collector.take_input(LogType::Error, None, "second error");

    assert_eq!(collector.count(LogType::Error), 2);
    assert_eq!(collector.hints().len(), 1);
    assert!(collector.contains(LogType::Error, "second"));
    assert!(!collector.contains(LogType::Hint, "error"));
    assert_eq!(collector.errors()[0].span, Some(span(0, 1)));

    collector.clear();
    assert!(collector.entries().is_empty());
}

#[test]
fn test_bug_is_flushed() {
    let buf = SharedBuf::default();
    let writer = std::io::BufWriter::with_capacity(4096, buf.clone());
    let mut log = Log::new("test.bt", "BEGIN { }").with_writer(Box::new(writer));

    log.take_input(LogType::Bug, None, "lost map type");
    assert!(buf.contents().contains("lost map type"));
}
