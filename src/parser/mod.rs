//! Parser module for building the Abstract Syntax Tree (AST).
//!
//! Transforms a stream of tokens into a [`crate::ast::ast::Program`]. It uses a
//! Pratt parser for expressions with proper operator precedence and handles:
//!
//! - Top-level items (probes with predicates, `fn` subprograms, `config`)
//! - Statements (assignments, `let`, control flow, loops)
//! - Expressions (operators, calls, maps, casts, field access)
//! - Type annotations
//!
//! Compound assignments (`@x += 1`) are desugared into plain assignments and
//! `a->b` is parsed as `(*a).b`. Every probe, subprogram, block and
//! statement gets a fresh node id.

pub mod expr;
pub mod lookups;
pub mod parser;
pub mod program;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod tests;
