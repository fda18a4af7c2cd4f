#![allow(clippy::module_inception)]

use std::rc::Rc;

pub mod ast;
pub mod config;
pub mod errors;
pub mod lexer;
pub mod log;
pub mod macros;
pub mod parser;
pub mod pass_manager;
pub mod providers;
pub mod semantic_analyser;

extern crate regex;

/// Byte offset into a named source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Span used for nodes built outside of the parser.
    pub fn null() -> Self {
        Span {
            start: Position::null(),
            end: Position::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.start.0 == 0 && self.end.0 == 0 && self.start.1.as_str() == "<null>"
    }

    pub fn offset(&self) -> usize {
        self.start.0 as usize
    }

    pub fn len(&self) -> usize {
        self.end.0.saturating_sub(self.start.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Covers `self` through `other`.
    pub fn join(&self, other: &Span) -> Span {
        Span {
            start: self.start.clone(),
            end: other.end.clone(),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::null()
    }
}

/// Returns the 1-based line number, the line text and the column of `position`.
pub fn get_line_at_position(source: &str, position: u32) -> Option<(usize, String, usize)> {
    let pos = position as usize;

    if pos > source.len() {
        return None;
    }

    let mut start = 0;
    let mut line_number = 1;

    for line in source.split_inclusive('\n') {
        let end = start + line.len();

        if (start..end).contains(&pos) {
            return Some((line_number, line.trim_end_matches('\n').to_string(), pos - start));
        }

        start = end;
        line_number += 1;
    }

    // End of input sits just past the last line.
    let last = source.lines().last().unwrap_or("");
    Some((line_number.max(2) - 1, last.to_string(), last.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_line_at_position() {
        let source = "Hello, world!\nfoo\nbar\nTesting { }\n";

        let (line_number, line, line_pos) = get_line_at_position(source, 10).unwrap();
        assert_eq!(line_number, 1);
        assert_eq!(line, "Hello, world!");
        assert_eq!(line_pos, 10);

        let (line_number, line, line_pos) = get_line_at_position(source, 30).unwrap();
        assert_eq!(line_number, 4);
        assert_eq!(line, "Testing { }");
        assert_eq!(line_pos, 8);
    }

    #[test]
    fn test_get_line_past_end() {
        assert!(get_line_at_position("abc", 10).is_none());
    }

    #[test]
    fn test_span_len_and_join() {
        let file = Rc::new(String::from("a.bt"));
        let a = Span::new(Position(2, Rc::clone(&file)), Position(5, Rc::clone(&file)));
        let b = Span::new(Position(8, Rc::clone(&file)), Position(12, Rc::clone(&file)));

        assert_eq!(a.len(), 3);
        assert_eq!(a.join(&b).len(), 10);
        assert!(Span::null().is_null());
        assert!(!a.is_null());
    }
}
