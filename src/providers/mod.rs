//! Capability queries the analyser consumes.
//!
//! Whether a BPF helper or probe type is available, and which kernel
//! functions, tracepoints and types exist, is decided outside the analyser.
//! It asks through [`features::FeatureProvider`] and
//! [`symbols::SymbolProvider`]; static implementations back the tests and
//! the command-line driver.

pub mod features;
pub mod symbols;

pub use features::{FeatureProvider, StaticFeatures};
pub use symbols::{PermissiveSymbols, StaticSymbols, SymbolProvider};
