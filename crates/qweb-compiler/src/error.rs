//! Errors raised while compiling a template.

use qweb_template::Span;
use std::fmt;

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// An error that occurred during template compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// The error message.
    pub message: String,
    /// The span where the error occurred.
    pub span: Span,
    /// The error code.
    pub code: CompileErrorCode,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, code: CompileErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
        }
    }

    /// Create an unknown-directive error.
    pub fn unknown_directive(name: &str, span: Span) -> Self {
        Self::new(
            format!("Unknown QWeb directive: 't-{}'", name),
            span,
            CompileErrorCode::UnknownDirective,
        )
    }

    /// Create an invalid-expression error, surfacing the template name the
    /// way the render errors do.
    pub fn invalid_expression(template: &str, detail: &str, span: Span) -> Self {
        Self::new(
            format!(
                "Invalid generated code while compiling template '{}': {}",
                template, detail
            ),
            span,
            CompileErrorCode::InvalidExpression,
        )
    }

    /// Create an invalid-tag error for misplaced `t-call`.
    pub fn invalid_tag(tag: &str, span: Span) -> Self {
        Self::new(
            format!("Invalid tag '{}' for t-call directive (only <t> is allowed)", tag),
            span,
            CompileErrorCode::InvalidTag,
        )
    }

    /// Create a missing-event-name error for bare `t-on`.
    pub fn missing_event_name(span: Span) -> Self {
        Self::new(
            "Missing event name with t-on directive",
            span,
            CompileErrorCode::MissingEventName,
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Error codes for template compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorCode {
    /// Unknown directive attribute.
    UnknownDirective,
    /// Invalid expression syntax.
    InvalidExpression,
    /// `t-call` on a non-`<t>` element.
    InvalidTag,
    /// `t-on` without an event name.
    MissingEventName,
    /// `t-elif`/`t-else` without a preceding `t-if`.
    MisplacedBranch,
    /// `t-foreach` without `t-as`.
    MissingLoopAlias,
}

impl CompileErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownDirective => "unknown-directive",
            Self::InvalidExpression => "invalid-expression",
            Self::InvalidTag => "invalid-tag",
            Self::MissingEventName => "missing-event-name",
            Self::MisplacedBranch => "misplaced-branch",
            Self::MissingLoopAlias => "missing-loop-alias",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
