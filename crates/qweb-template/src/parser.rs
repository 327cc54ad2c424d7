//! Parser for the template dialect.
//!
//! Accepts the XML subset the directive grammar needs: elements, quoted
//! attributes, text, comments and self-closing tags. Anything malformed
//! (unclosed or mismatched tags, stray markup, unterminated comments)
//! raises [`ParseError`] so registration fails before compilation starts.

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::span::Span;
use smol_str::SmolStr;

/// Parse a single template: exactly one root element, optionally surrounded
/// by whitespace and comments.
pub fn parse_template(source: &str) -> ParseResult<ElementNode> {
    let mut parser = TemplateParser::new(source);
    let nodes = parser.parse_nodes(None)?;
    let mut root = None;
    for node in nodes {
        match node {
            TemplateNode::Element(el) => {
                if root.is_some() {
                    return Err(ParseError::new("multiple root elements", el.span));
                }
                root = Some(el);
            }
            TemplateNode::Text(t) => {
                if !t.content.trim().is_empty() {
                    return Err(ParseError::new("text content outside the root element", t.span));
                }
            }
            TemplateNode::Comment(_) => {}
        }
    }
    root.ok_or_else(|| ParseError::new("missing root element", Span::empty(0)))
}

/// Parse a bundle document and collect every child element carrying a
/// `t-name` attribute, in document order. The `t-name` attribute itself is
/// consumed.
pub fn parse_bundle(source: &str) -> ParseResult<Vec<(SmolStr, ElementNode)>> {
    let root = parse_template(source)?;
    let mut templates = Vec::new();
    for child in root.children {
        if let TemplateNode::Element(mut el) = child {
            let name = el
                .attrs
                .iter()
                .position(|a| a.name == "t-name")
                .map(|i| el.attrs.remove(i).value);
            if let Some(name) = name {
                templates.push((SmolStr::new(name), el));
            }
        }
    }
    Ok(templates)
}

/// Cursor-based parser over the template source.
struct TemplateParser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> TemplateParser<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.advance();
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn error(&self, detail: impl Into<String>, start: usize) -> ParseError {
        ParseError::new(detail, Span::from_range(start..self.pos))
    }

    /// Parse sibling nodes until the matching end tag (or EOF at top level).
    fn parse_nodes(&mut self, end_tag: Option<&str>) -> ParseResult<Vec<TemplateNode>> {
        let mut nodes = Vec::new();
        loop {
            if self.is_eof() {
                match end_tag {
                    Some(tag) => {
                        return Err(self.error(format!("unclosed tag '{}'", tag), self.pos))
                    }
                    None => break,
                }
            }
            if self.starts_with("</") {
                let close_start = self.pos;
                self.consume("</");
                self.skip_whitespace();
                let tag = self.read_name();
                self.skip_whitespace();
                if !self.consume(">") {
                    return Err(self.error("malformed closing tag", close_start));
                }
                match end_tag {
                    Some(open) if tag == open => return Ok(nodes),
                    Some(open) => {
                        return Err(self.error(
                            format!("closing tag '{}' does not match '{}'", tag, open),
                            close_start,
                        ))
                    }
                    None => {
                        return Err(self.error(format!("stray closing tag '{}'", tag), close_start))
                    }
                }
            }
            nodes.push(self.parse_node()?);
        }
        Ok(nodes)
    }

    fn parse_node(&mut self) -> ParseResult<TemplateNode> {
        if self.starts_with("<!--") {
            return self.parse_comment().map(TemplateNode::Comment);
        }
        if self.starts_with("<") {
            return self.parse_element().map(TemplateNode::Element);
        }
        self.parse_text().map(TemplateNode::Text)
    }

    fn parse_comment(&mut self) -> ParseResult<CommentNode> {
        let start = self.pos;
        self.consume("<!--");
        match self.remaining().find("-->") {
            Some(end) => {
                let content = self.remaining()[..end].to_string();
                self.pos += end + 3;
                Ok(CommentNode {
                    content,
                    span: Span::from_range(start..self.pos),
                })
            }
            None => {
                self.pos = self.source.len();
                Err(self.error("unterminated comment", start))
            }
        }
    }

    fn parse_text(&mut self) -> ParseResult<TextNode> {
        let start = self.pos;
        let raw = self.read_while(|c| c != '<');
        Ok(TextNode {
            content: decode_entities(raw),
            span: Span::from_range(start..self.pos),
        })
    }

    fn parse_element(&mut self) -> ParseResult<ElementNode> {
        let start = self.pos;
        self.consume("<");
        let tag_start = self.pos;
        let tag = SmolStr::new(self.read_name());
        let tag_span = Span::from_range(tag_start..self.pos);
        if tag.is_empty() {
            return Err(self.error("expected tag name", start));
        }

        let attrs = self.parse_attributes(&tag)?;

        self.skip_whitespace();
        let self_closing = self.consume("/>");
        if !self_closing && !self.consume(">") {
            return Err(self.error(format!("malformed tag '{}'", tag), start));
        }

        let children = if self_closing {
            Vec::new()
        } else {
            self.parse_nodes(Some(&tag))?
        };

        Ok(ElementNode {
            tag,
            attrs,
            children,
            self_closing,
            span: Span::from_range(start..self.pos),
            tag_span,
        })
    }

    fn parse_attributes(&mut self, tag: &str) -> ParseResult<Vec<Attr>> {
        let mut attrs: Vec<Attr> = Vec::new();
        loop {
            self.skip_whitespace();
            if self.is_eof() {
                return Err(self.error(format!("unclosed tag '{}'", tag), self.pos));
            }
            if self.starts_with(">") || self.starts_with("/>") {
                return Ok(attrs);
            }

            let attr_start = self.pos;
            let name = SmolStr::new(self.read_name());
            if name.is_empty() {
                return Err(self.error(
                    format!("unexpected character in tag '{}'", tag),
                    attr_start,
                ));
            }
            if attrs.iter().any(|a| a.name == name) {
                return Err(self.error(format!("duplicate attribute '{}'", name), attr_start));
            }

            self.skip_whitespace();
            let value = if self.consume("=") {
                self.skip_whitespace();
                let quote = match self.peek() {
                    Some(q @ ('"' | '\'')) => q,
                    _ => {
                        return Err(self
                            .error(format!("expected quoted value for attribute '{}'", name), attr_start))
                    }
                };
                self.advance();
                let raw = self.read_while(|c| c != quote);
                if self.advance() != Some(quote) {
                    return Err(self.error(
                        format!("unterminated value for attribute '{}'", name),
                        attr_start,
                    ));
                }
                decode_entities(raw)
            } else {
                String::new()
            };

            let kind = if name.starts_with("t-") {
                AttrKind::Directive
            } else {
                AttrKind::Static
            };
            attrs.push(Attr {
                name,
                value,
                kind,
                span: Span::from_range(attr_start..self.pos),
            });
        }
    }

    fn read_name(&mut self) -> &'a str {
        self.read_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
    }
}

/// Decode the entity subset the dialect supports.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let el = parse_template("<div>Hello</div>").unwrap();
        assert_eq!(el.tag, "div");
        assert_eq!(el.children.len(), 1);
        match &el.children[0] {
            TemplateNode::Text(t) => assert_eq!(t.content, "Hello"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_parse_directives() {
        let el =
            parse_template(r#"<div class="app" t-if="cond"><t t-esc="value"/></div>"#).unwrap();
        assert!(el.has_directive("if"));
        assert_eq!(el.statics().count(), 1);
        match &el.children[0] {
            TemplateNode::Element(t) => {
                assert!(t.is_transparent());
                assert!(t.self_closing);
                assert_eq!(t.directive("esc").unwrap().value, "value");
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn test_parse_valueless_attribute() {
        let el = parse_template("<div t-debug=\"\"><span t-debug/></div>").unwrap();
        assert!(el.has_directive("debug"));
    }

    #[test]
    fn test_parse_entities() {
        let el = parse_template("<p title=\"a &amp; b\">1 &lt; 2</p>").unwrap();
        assert_eq!(el.statics().next().unwrap().value, "a & b");
        match &el.children[0] {
            TemplateNode::Text(t) => assert_eq!(t.content, "1 < 2"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_unclosed_tag_is_invalid() {
        let err = parse_template("<div>").unwrap_err();
        assert!(err.to_string().starts_with("Invalid XML in template"));
    }

    #[test]
    fn test_mismatched_close_is_invalid() {
        assert!(parse_template("<div><span></div></span>").is_err());
        assert!(parse_template("<div></p>").is_err());
    }

    #[test]
    fn test_multiple_roots_are_invalid() {
        assert!(parse_template("<div/><div/>").is_err());
        assert!(parse_template("text<div/>").is_err());
    }

    #[test]
    fn test_unquoted_attribute_is_invalid() {
        assert!(parse_template("<div class=app></div>").is_err());
    }

    #[test]
    fn test_comments_are_kept() {
        let el = parse_template("<div><!-- note --></div>").unwrap();
        match &el.children[0] {
            TemplateNode::Comment(c) => assert_eq!(c.content, " note "),
            _ => panic!("expected comment"),
        }
    }

    #[test]
    fn test_parse_bundle() {
        let source = r#"<templates>
            <t t-name="alpha"><span>a</span></t>
            <div t-name="beta" class="b"/>
            <ignored/>
        </templates>"#;
        let templates = parse_bundle(source).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].0, "alpha");
        assert_eq!(templates[1].0, "beta");
        // t-name is consumed during registration
        assert!(!templates[1].1.attrs.iter().any(|a| a.name == "t-name"));
        assert_eq!(templates[1].1.statics().next().unwrap().value, "b");
    }

    #[test]
    fn test_pre_text_preserved_verbatim() {
        let el = parse_template("<pre>  line\n  indented</pre>").unwrap();
        match &el.children[0] {
            TemplateNode::Text(t) => assert_eq!(t.content, "  line\n  indented"),
            _ => panic!("expected text"),
        }
    }
}
