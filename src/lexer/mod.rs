//! Lexical analysis.
//!
//! Converts program text into a token stream using an ordered list of regex
//! patterns. Attach points (`kprobe:vfs_read`, `uprobe:/bin/sh:main`) are only
//! recognised outside of braces, so probe bodies can use `:` freely.

pub mod lexer;
pub mod tokens;

#[cfg(test)]
mod tests;
