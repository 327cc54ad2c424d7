//! AST types for parsed templates.

use crate::span::Span;
use smol_str::SmolStr;

/// A node in the template parse tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateNode {
    /// An element, possibly carrying directive attributes.
    Element(ElementNode),
    /// A text node, stored verbatim; whitespace is normalized at compile
    /// time so `<pre>` subtrees keep their content.
    Text(TextNode),
    /// A comment.
    Comment(CommentNode),
}

impl TemplateNode {
    /// Get the span of this node.
    pub fn span(&self) -> Span {
        match self {
            Self::Element(n) => n.span,
            Self::Text(n) => n.span,
            Self::Comment(n) => n.span,
        }
    }
}

/// An element node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementNode {
    /// The tag name.
    pub tag: SmolStr,
    /// Attributes in source order, directives included.
    pub attrs: Vec<Attr>,
    /// Child nodes.
    pub children: Vec<TemplateNode>,
    /// Self-closing tag.
    pub self_closing: bool,
    /// Source span.
    pub span: Span,
    /// Span of the tag name.
    pub tag_span: Span,
}

impl ElementNode {
    /// Directive attributes (`t-` prefixed), in source order.
    pub fn directives(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter().filter(|a| a.kind == AttrKind::Directive)
    }

    /// Ordinary attributes, in source order.
    pub fn statics(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter().filter(|a| a.kind == AttrKind::Static)
    }

    /// Look up a directive by its name without the `t-` prefix.
    pub fn directive(&self, name: &str) -> Option<&Attr> {
        self.directives().find(|a| a.directive_name() == Some(name))
    }

    /// Whether the element carries a directive.
    pub fn has_directive(&self, name: &str) -> bool {
        self.directive(name).is_some()
    }

    /// Whether this is the transparent `<t>` element that emits no node of
    /// its own.
    pub fn is_transparent(&self) -> bool {
        self.tag == "t"
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attr {
    /// Full attribute name as written (e.g. `class`, `t-esc`, `t-att-id`).
    pub name: SmolStr,
    /// Attribute value; valueless attributes hold the empty string.
    pub value: String,
    /// Static attribute or `t-` directive.
    pub kind: AttrKind,
    /// Source span.
    pub span: Span,
}

impl Attr {
    /// The directive name without the `t-` prefix, for directive attrs.
    pub fn directive_name(&self) -> Option<&str> {
        match self.kind {
            AttrKind::Directive => self.name.strip_prefix("t-"),
            AttrKind::Static => None,
        }
    }
}

/// Kind of attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrKind {
    /// Ordinary attribute, emitted onto the element.
    Static,
    /// `t-` directive, interpreted by the compiler.
    Directive,
}

/// A text node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextNode {
    /// Verbatim text content with entities decoded.
    pub content: String,
    /// Source span.
    pub span: Span,
}

/// A comment node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommentNode {
    /// The comment content.
    pub content: String,
    /// Source span.
    pub span: Span,
}
