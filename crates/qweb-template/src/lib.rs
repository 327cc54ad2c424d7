//! Template parser for qweb-rs.
//!
//! This crate parses the `t-*` directive dialect (an XML subset) into a
//! span-carrying AST consumed by the compiler, and extracts named templates
//! from bundle documents.

pub mod ast;
pub mod error;
pub mod parser;
pub mod span;

pub use ast::*;
pub use error::{ParseError, ParseResult};
pub use parser::{parse_bundle, parse_template};
pub use span::{LineIndex, Span};
