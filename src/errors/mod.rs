//! Error types for the front-end and the pass pipeline.
//!
//! - [`errors::Error`] carries lexer and parser failures with a source position
//! - [`errors::PassError`] is returned when a pipeline stage fails
//!
//! Semantic problems are not errors in this sense: the analyser reports them
//! through a diagnostic sink and only returns a count.

pub mod errors;
