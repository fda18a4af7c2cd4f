//! Abstract Syntax Tree definitions.
//!
//! - Program structure (probes, attach points, subprograms, config)
//! - Expression and statement nodes as closed enums
//! - Type descriptors written back by the semantic analyser
//!
//! Probes, subprograms, blocks and statements carry a [`ast::NodeId`] assigned
//! by the parser. Scope tables key on these ids.

pub mod ast;
pub mod expressions;
pub mod statements;
pub mod types;
pub mod visit;
