//! `mython` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` turns indentation-structured Mython source into the
//!   token stream a parser consumes
//! - shared runtime object/value model: `runtime`
//! - execution: `statement` walks already-parsed syntax trees against the
//!   runtime model
pub mod lexer;
pub mod runtime;
pub mod statement;
