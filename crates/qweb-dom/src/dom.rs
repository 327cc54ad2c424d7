//! In-memory document tree.
//!
//! The runtime never touches a browser: it drives this arena-backed tree
//! through the same operations a DOM renderer would use (create, insert,
//! remove, set-attribute, add-event-listener) and the tests assert on its
//! serialized HTML.

use crate::Listener;
use indexmap::IndexMap;
use smol_str::SmolStr;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub tag: SmolStr,
    pub attrs: IndexMap<SmolStr, String>,
    /// Boolean properties mirrored from boolean attributes.
    pub props: IndexMap<SmolStr, bool>,
    pub listeners: Vec<Listener>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An arena-backed document tree rooted at a `<body>` element.
///
/// Removed subtrees stay in the arena but are unreachable from the root;
/// [`Document::in_document`] distinguishes attached from detached nodes.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only the root `<body>` element.
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Element(ElementData {
                tag: SmolStr::new("body"),
                attrs: IndexMap::new(),
                props: IndexMap::new(),
                listeners: Vec::new(),
            }),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// The root `<body>` node.
    pub fn body(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<SmolStr>) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.into(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
            listeners: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Insert `child` under `parent` before `before`; append when `before`
    /// is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        let children = &mut self.nodes[parent.index()].children;
        let pos = before
            .and_then(|b| children.iter().position(|&c| c == b))
            .unwrap_or(children.len());
        children.insert(pos, child);
    }

    /// Replace `old` with `new` in `old`'s parent, detaching `old`.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) {
        if let Some(parent) = self.nodes[old.index()].parent {
            self.insert_before(parent, new, Some(old));
            self.detach(old);
        }
    }

    /// Detach a node from its parent. No-op for detached nodes.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != node);
        }
    }

    /// The parent of a node, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    /// The ordered children of a node.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    /// The sibling immediately after `node`, if any.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.index()].parent?;
        let siblings = &self.nodes[parent.index()].children;
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Whether a node is reachable from the document root.
    pub fn in_document(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root {
                return true;
            }
            match self.nodes[current.index()].parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Tag name of an element node.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(el) => Some(&el.tag),
            _ => None,
        }
    }

    /// Whether a node is a comment node.
    pub fn is_comment(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.index()].kind, NodeKind::Comment(_))
    }

    /// Attributes of an element node in insertion order.
    pub fn attributes(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        let attrs = match &self.nodes[node.index()].kind {
            NodeKind::Element(el) => Some(&el.attrs),
            _ => None,
        };
        attrs
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Text content of a text or comment node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.index()].kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    /// Overwrite the content of a text or comment node.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = text.into(),
            NodeKind::Element(_) => {}
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: impl Into<SmolStr>, value: impl Into<String>) {
        if let NodeKind::Element(el) = &mut self.nodes[node.index()].kind {
            el.attrs.insert(name.into(), value.into());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element(el) = &mut self.nodes[node.index()].kind {
            el.attrs.shift_remove(name);
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(el) => el.attrs.get(name).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Set a boolean element property (`checked`, `disabled`, ...).
    pub fn set_prop(&mut self, node: NodeId, name: impl Into<SmolStr>, value: bool) {
        let name = name.into();
        if let NodeKind::Element(el) = &mut self.nodes[node.index()].kind {
            if value {
                el.props.insert(name, true);
            } else {
                el.props.shift_remove(&name);
            }
        }
    }

    pub fn prop(&self, node: NodeId, name: &str) -> bool {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(el) => el.props.get(name).copied().unwrap_or(false),
            _ => false,
        }
    }

    /// Replace the listener list of an element.
    pub fn set_listeners(&mut self, node: NodeId, listeners: Vec<Listener>) {
        if let NodeKind::Element(el) = &mut self.nodes[node.index()].kind {
            el.listeners = listeners;
        }
    }

    /// Listener tokens registered on `node` for `event`.
    pub fn listeners_for(&self, node: NodeId, event: &str) -> Vec<u64> {
        match &self.nodes[node.index()].kind {
            NodeKind::Element(el) => el
                .listeners
                .iter()
                .filter(|l| l.event == event)
                .map(|l| l.token)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn node(&self, node: NodeId) -> &Node {
        &self.nodes[node.index()]
    }
}
