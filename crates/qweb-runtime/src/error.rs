//! Runtime error surface.
//!
//! Compile-time failures (`ParseError`, `CompileError`, duplicate names)
//! abort registration through [`RegisterError`]; render-time failures
//! reject before any patch through [`RenderError`]; exceptions raised by
//! user hooks surface as [`LifecycleError`] through the widget operations.

use qweb_compiler::CompileError;
use qweb_template::ParseError;
use std::fmt;

/// An error raised while rendering a template.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// `t-call` or `render` named a template that is not registered.
    TemplateNotFound { template: String },
    /// The template produced more than one root vnode.
    MultipleRoots { template: String },
    /// The template produced no root vnode.
    NoRoot { template: String },
    /// A named `t-on-*` handler did not resolve against the context.
    MissingHandler { handler: String, template: String },
    /// `t-foreach` evaluated to something that is not iterable.
    InvalidLoop { template: String },
    /// Any other evaluation failure.
    Eval { template: String, detail: String },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateNotFound { template } => {
                write!(f, "Template '{}' does not exist", template)
            }
            Self::MultipleRoots { template } => write!(
                f,
                "A template should not have more than one root node (in template '{}')",
                template
            ),
            Self::NoRoot { template } => {
                write!(f, "Template '{}' did not produce a root node", template)
            }
            Self::MissingHandler { handler, template } => write!(
                f,
                "Missing handler '{}' when evaluating template '{}'",
                handler, template
            ),
            Self::InvalidLoop { template } => {
                write!(f, "Invalid loop expression (in template '{}')", template)
            }
            Self::Eval { template, detail } => {
                write!(f, "Error while evaluating template '{}': {}", template, detail)
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// An error raised while registering a template.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterError {
    /// The template source is malformed.
    Parse(ParseError),
    /// The template failed to compile.
    Compile(CompileError),
    /// A template with the same name is already registered.
    Conflict { name: String },
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Compile(e) => e.fmt(f),
            Self::Conflict { name } => write!(f, "Template '{}' already defined", name),
        }
    }
}

impl std::error::Error for RegisterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Compile(e) => Some(e),
            Self::Conflict { .. } => None,
        }
    }
}

impl From<ParseError> for RegisterError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<CompileError> for RegisterError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

/// An error raised from a user lifecycle hook.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleError {
    /// The failure reported by the hook.
    pub message: String,
    /// Widget name, filled in by the runtime.
    pub widget: Option<String>,
    /// Hook name, filled in by the runtime.
    pub hook: Option<&'static str>,
}

impl LifecycleError {
    /// Create a lifecycle error with a message; the runtime attaches the
    /// widget and hook names.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            widget: None,
            hook: None,
        }
    }

    pub(crate) fn in_hook(mut self, widget: &str, hook: &'static str) -> Self {
        self.widget.get_or_insert_with(|| widget.to_string());
        self.hook.get_or_insert(hook);
        self
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.widget, self.hook) {
            (Some(widget), Some(hook)) => {
                write!(f, "Error in {}.{}: {}", widget, hook, self.message)
            }
            _ => write!(f, "Lifecycle error: {}", self.message),
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Any error surfaced by the widget runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    Render(RenderError),
    Lifecycle(LifecycleError),
    /// `t-widget` referenced a name with no registered factory.
    UnknownWidget { name: String },
    /// An operation targeted a destroyed widget.
    Destroyed,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => e.fmt(f),
            Self::Lifecycle(e) => e.fmt(f),
            Self::UnknownWidget { name } => write!(f, "No widget registered under '{}'", name),
            Self::Destroyed => write!(f, "Widget is destroyed"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<RenderError> for RuntimeError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

impl From<LifecycleError> for RuntimeError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = RenderError::TemplateNotFound {
            template: "missing".into(),
        };
        assert_eq!(err.to_string(), "Template 'missing' does not exist");

        let err = RenderError::MissingHandler {
            handler: "inc".into(),
            template: "counter".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing handler 'inc' when evaluating template 'counter'"
        );

        let err = RegisterError::Conflict { name: "t".into() };
        assert_eq!(err.to_string(), "Template 't' already defined");
    }

    #[test]
    fn test_lifecycle_context() {
        let err = LifecycleError::new("boom").in_hook("counter", "willStart");
        assert_eq!(err.to_string(), "Error in counter.willStart: boom");
    }
}
