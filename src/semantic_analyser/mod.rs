//! Semantic analysis of a parsed program.
//!
//! The analyser decorates every expression of the AST with its type while:
//!
//! - Tracking `$variables` in lexical scopes keyed by node id
//! - Inferring map key and value types program-wide
//! - Checking builtin calls against their signatures
//! - Validating probes, attach points, subprograms and config directives
//!
//! Types may depend on code that appears later in the program, so the whole
//! tree is walked repeatedly until nothing is left unresolved. A final strict
//! pass then turns whatever is still unknown into errors.

pub mod builtins;
pub mod calls;
mod diagnostics;
pub mod expr;
pub mod maps;
mod probes;
pub mod scopes;
pub mod semantic_analyser;
mod stmt;

pub use maps::{MapInfo, MapRegistry, MapTypeError};
pub use scopes::{ScopeError, ScopeTable, Variable};
pub use semantic_analyser::{PassTracker, SemanticAnalyser};

#[cfg(test)]
mod tests;
