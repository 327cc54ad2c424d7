//! Virtual DOM for qweb-rs.
//!
//! This crate provides the VNode data model, an in-memory document tree
//! exposing the abstract DOM operations the runtime relies on
//! (create/insert/remove/set-attribute/add-event-listener), and the patcher
//! that reconciles two VNode trees against the live document.

pub mod dom;
pub mod html;
pub mod patch;

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

pub use dom::{Document, NodeId};
pub use patch::{create_element, patch, Modules, NoopModules};

/// Sentinel selector marking a fragment vnode: a sequence of root-level
/// vnodes whose children are hoisted into the surrounding children list.
pub const FRAGMENT_SEL: &str = "t";

/// Selector used by comment vnodes.
pub const COMMENT_SEL: &str = "!";

/// A node in a virtual DOM tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VNode {
    /// An element (or a fragment, when `sel` is [`FRAGMENT_SEL`]).
    Element(VElement),
    /// A text node.
    Text(VText),
    /// A comment node.
    Comment(VComment),
}

/// An element vnode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VElement {
    /// Tag selector.
    pub sel: SmolStr,
    /// Attributes, listeners and hook payloads.
    pub data: VNodeData,
    /// Ordered child vnodes.
    pub children: Vec<VNode>,
    /// The live document node, populated by create/patch.
    pub elm: Option<NodeId>,
    /// Set while a freshly created node awaits its `insert` hook.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub fresh: bool,
}

/// A text vnode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VText {
    pub text: String,
    pub elm: Option<NodeId>,
}

/// A comment vnode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VComment {
    pub text: String,
    pub elm: Option<NodeId>,
}

/// Data attached to an element vnode.
///
/// Everything here is declarative: listeners reference handler descriptors
/// by token, and the widget/ref/transition payloads are interpreted by the
/// module hooks the runtime installs on the patcher.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VNodeData {
    /// Diffing key. Required for keyed sibling reconciliation.
    pub key: Option<SmolStr>,
    /// Plain attributes in insertion order.
    pub attrs: IndexMap<SmolStr, String>,
    /// Class names; static and dynamic contributions merge here.
    pub class: IndexSet<SmolStr>,
    /// Style properties.
    pub style: IndexMap<SmolStr, String>,
    /// Event listeners declared on this node.
    pub on: Vec<Listener>,
    /// Index of a widget descriptor produced by the current render.
    pub widget: Option<u32>,
    /// Widget instance bound to this node, carried across patches.
    pub widget_id: Option<u64>,
    /// Ref name evaluated at render time.
    pub ref_name: Option<SmolStr>,
    /// Transition name for enter/leave hooks.
    pub transition: Option<SmolStr>,
}

/// An event listener owned by a vnode. The token is opaque to this crate;
/// the runtime packs a widget id and handler index into it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Listener {
    pub event: SmolStr,
    pub token: u64,
}

impl VNode {
    /// Build an element vnode.
    pub fn element(sel: impl Into<SmolStr>, data: VNodeData, children: Vec<VNode>) -> Self {
        VNode::Element(VElement {
            sel: sel.into(),
            data,
            children,
            elm: None,
            fresh: false,
        })
    }

    /// Build a text vnode.
    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(VText {
            text: text.into(),
            elm: None,
        })
    }

    /// Build a comment vnode.
    pub fn comment(text: impl Into<String>) -> Self {
        VNode::Comment(VComment {
            text: text.into(),
            elm: None,
        })
    }

    /// Build a fragment: an element with the sentinel selector whose
    /// children are hoisted into the surrounding list.
    pub fn fragment(children: Vec<VNode>) -> Self {
        VNode::element(FRAGMENT_SEL, VNodeData::default(), children)
    }

    /// Whether this vnode is a fragment.
    pub fn is_fragment(&self) -> bool {
        matches!(self, VNode::Element(el) if el.sel == FRAGMENT_SEL)
    }

    /// The diffing key, if any.
    pub fn key(&self) -> Option<&SmolStr> {
        match self {
            VNode::Element(el) => el.data.key.as_ref(),
            _ => None,
        }
    }

    /// The live document node this vnode is bound to.
    pub fn elm(&self) -> Option<NodeId> {
        match self {
            VNode::Element(el) => el.elm,
            VNode::Text(t) => t.elm,
            VNode::Comment(c) => c.elm,
        }
    }

    pub(crate) fn set_elm(&mut self, elm: Option<NodeId>) {
        match self {
            VNode::Element(el) => el.elm = elm,
            VNode::Text(t) => t.elm = elm,
            VNode::Comment(c) => c.elm = elm,
        }
    }
}

impl VNodeData {
    /// Merge a space-separated class string into the class set.
    pub fn add_classes(&mut self, classes: &str) {
        for c in classes.split_ascii_whitespace() {
            self.class.insert(SmolStr::new(c));
        }
    }

    /// Merge a `prop: value; prop: value` style string.
    pub fn add_styles(&mut self, style: &str) {
        for decl in style.split(';') {
            if let Some((prop, value)) = decl.split_once(':') {
                let prop = prop.trim();
                if !prop.is_empty() {
                    self.style
                        .insert(SmolStr::new(prop), value.trim().to_string());
                }
            }
        }
    }
}

/// Boolean HTML attributes that are reflected as element properties: set as
/// both property and attribute when truthy, removed as property when falsy.
pub const BOOL_ATTRS: &[&str] = &[
    "checked", "selected", "disabled", "readonly", "required", "autofocus", "multiple", "hidden",
    "open",
];

/// Whether an attribute name is a boolean HTML attribute.
pub fn is_bool_attr(name: &str) -> bool {
    BOOL_ATTRS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tree() {
        let mut data = VNodeData::default();
        data.attrs.insert("id".into(), "app".into());
        let node = VNode::element(
            "div",
            data,
            vec![VNode::text("hello"), VNode::element("span", VNodeData::default(), vec![])],
        );
        match node {
            VNode::Element(el) => {
                assert_eq!(el.sel, "div");
                assert_eq!(el.data.attrs.get("id").unwrap(), "app");
                assert_eq!(el.children.len(), 2);
                assert!(el.elm.is_none());
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn test_class_merge() {
        let mut data = VNodeData::default();
        data.add_classes("hello");
        data.add_classes("world  hello");
        let classes: Vec<_> = data.class.iter().map(|c| c.as_str()).collect();
        assert_eq!(classes, vec!["hello", "world"]);
    }

    #[test]
    fn test_style_merge() {
        let mut data = VNodeData::default();
        data.add_styles("color: red; margin: 0");
        data.add_styles("color: blue;");
        assert_eq!(data.style.get("color").unwrap(), "blue");
        assert_eq!(data.style.get("margin").unwrap(), "0");
    }

    #[test]
    fn test_fragment_sentinel() {
        let frag = VNode::fragment(vec![VNode::text("a"), VNode::text("b")]);
        assert!(frag.is_fragment());
        assert!(!VNode::element("table", VNodeData::default(), vec![]).is_fragment());
    }

    #[test]
    fn test_bool_attrs() {
        assert!(is_bool_attr("checked"));
        assert!(is_bool_attr("disabled"));
        assert!(!is_bool_attr("class"));
    }
}
