//! HTML serialization and fragment parsing for the document tree.
//!
//! Serialization backs the test assertions; fragment parsing backs raw-HTML
//! injection, which mirrors `innerHTML` semantics: lenient, best-effort.

use crate::dom::{Document, NodeId, NodeKind};
use smol_str::SmolStr;

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Escape text-node content. Attribute values additionally escape quotes.
fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Decode the named and numeric entities the template dialect uses.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let entity = rest.split(';').next().unwrap_or("");
        let decoded = match entity {
            "&amp" => Some('&'),
            "&lt" => Some('<'),
            "&gt" => Some('>'),
            "&quot" => Some('"'),
            "&#39" | "&apos" => Some('\''),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[entity.len() + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

impl Document {
    /// Serialize a node and its subtree to HTML.
    ///
    /// Text content is escaped here; the engine itself never escapes, so a
    /// text node holding `<ok>` serializes as `&lt;ok&gt;`.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, node);
        out
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.write_node(&mut out, child);
        }
        out
    }

    fn write_node(&self, out: &mut String, node: NodeId) {
        match &self.node(node).kind {
            NodeKind::Text(t) => escape_text(out, t),
            NodeKind::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_attr(out, value);
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void(&el.tag) {
                    return;
                }
                for &child in self.children(node) {
                    self.write_node(out, child);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    /// Replace the children of `node` with nodes parsed from an HTML
    /// fragment, `innerHTML`-style.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) {
        for child in self.children(node).to_vec() {
            self.detach(child);
        }
        for parsed in self.parse_fragment(html) {
            self.append_child(node, parsed);
        }
    }

    /// Parse an HTML fragment into detached nodes. Lenient: unclosed tags
    /// close at end of input, unknown entities pass through.
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let bytes = html.as_bytes();
        let mut i = 0usize;
        let mut roots: Vec<NodeId> = Vec::new();
        // (node, tag) pairs of currently open elements
        let mut stack: Vec<(NodeId, SmolStr)> = Vec::new();

        macro_rules! attach {
            ($node:expr) => {
                match stack.last() {
                    Some(&(parent, _)) => self.append_child(parent, $node),
                    None => roots.push($node),
                }
            };
        }

        while i < bytes.len() {
            if bytes[i] == b'<' {
                if html[i..].starts_with("<!--") {
                    let end = html[i + 4..].find("-->").map(|p| i + 4 + p);
                    let content = &html[i + 4..end.unwrap_or(html.len())];
                    let comment = self.create_comment(content);
                    attach!(comment);
                    i = end.map(|e| e + 3).unwrap_or(html.len());
                    continue;
                }
                if i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    i += 2;
                    let tag = read_name(bytes, &mut i);
                    while i < bytes.len() && bytes[i] != b'>' {
                        i += 1;
                    }
                    i = (i + 1).min(bytes.len());
                    // pop to the matching open tag, closing anything inside
                    if let Some(pos) = stack.iter().rposition(|(_, t)| *t == tag) {
                        stack.truncate(pos);
                    }
                    continue;
                }
                i += 1;
                let tag = read_name(bytes, &mut i);
                if tag.is_empty() {
                    continue;
                }
                let node = self.create_element(tag.clone());
                let mut self_closing = false;
                loop {
                    skip_ws(bytes, &mut i);
                    if i >= bytes.len() {
                        break;
                    }
                    match bytes[i] {
                        b'>' => {
                            i += 1;
                            break;
                        }
                        b'/' => {
                            self_closing = true;
                            i += 1;
                        }
                        _ => {
                            let name = read_name(bytes, &mut i);
                            if name.is_empty() {
                                i += 1;
                                continue;
                            }
                            skip_ws(bytes, &mut i);
                            let mut value = String::new();
                            if i < bytes.len() && bytes[i] == b'=' {
                                i += 1;
                                skip_ws(bytes, &mut i);
                                if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                                    let quote = bytes[i];
                                    i += 1;
                                    let start = i;
                                    while i < bytes.len() && bytes[i] != quote {
                                        i += 1;
                                    }
                                    value = decode_entities(&html[start..i]);
                                    i = (i + 1).min(bytes.len());
                                }
                            }
                            self.set_attribute(node, name, value);
                        }
                    }
                }
                attach!(node);
                if !self_closing && !is_void(&tag) {
                    stack.push((node, tag));
                }
            } else {
                let start = i;
                while i < bytes.len() && bytes[i] != b'<' {
                    i += 1;
                }
                let text = decode_entities(&html[start..i]);
                if !text.is_empty() {
                    let node = self.create_text(text);
                    attach!(node);
                }
            }
        }
        roots
    }
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn read_name(bytes: &[u8], i: &mut usize) -> SmolStr {
    let start = *i;
    while *i < bytes.len() {
        match bytes[*i] {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b':' => *i += 1,
            _ => break,
        }
    }
    SmolStr::new(std::str::from_utf8(&bytes[start..*i]).unwrap_or_default())
}
