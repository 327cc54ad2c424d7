//! QWeb template compiler.
//!
//! Turns a parsed template into a render program: a typed instruction list
//! executed at render time against an evaluation context to build a VNode
//! tree. The directive pipeline is priority-ordered and extensible; the
//! expression dialect is a whitelisted JS-like subset with compile-time
//! scope resolution.

pub mod compile;
pub mod context;
pub mod directives;
pub mod error;
pub mod expr;
pub mod ir;

pub use compile::compile;
pub use context::CompilationContext;
pub use directives::{Directive, DirectiveRegistry};
pub use error::{CompileError, CompileErrorCode, CompileResult};
pub use expr::{BinOp, Expr, HandlerExpr, Literal, UnaryOp};
pub use ir::{Addr, BlockId, ExprId, FmtPart, HandlerSpec, Instr, Program};
