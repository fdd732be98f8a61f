//! A small markup dialect for bundles: elements with quoted attributes, text and comments.

use crate::error::ViewError;

/// Elements that never have children.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

/// Parses a markup fragment.
///
/// Whitespace-only text between elements is dropped.
pub fn parse(markup: &str) -> Result<Vec<MarkupNode>, ViewError> {
    let mut parser = Parser {
        source: markup,
        pos: 0,
    };
    parser.nodes(None)
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn error(&self, reason: impl Into<String>) -> ViewError {
        ViewError::Markup {
            reason: reason.into(),
            offset: self.pos,
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !f(*c))
            .map_or(rest.len(), |(i, _)| i);
        self.pos += end;
        &rest[..end]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    /// Parses nodes until the closing tag of `parent`, or the end of input at the top level.
    fn nodes(&mut self, parent: Option<&str>) -> Result<Vec<MarkupNode>, ViewError> {
        let mut nodes = Vec::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return match parent {
                    Some(tag) => Err(self.error(format!("unclosed <{}>", tag))),
                    None => Ok(nodes),
                };
            }

            if rest.starts_with("<!--") {
                let end = rest.find("-->").ok_or_else(|| self.error("unterminated comment"))?;
                self.pos += end + 3;
            } else if rest.starts_with("</") {
                let end = rest.find('>').ok_or_else(|| self.error("unterminated tag"))?;
                let tag = rest[2..end].trim();
                return match parent {
                    Some(open) if open.eq_ignore_ascii_case(tag) => {
                        self.pos += end + 1;
                        Ok(nodes)
                    }
                    _ => Err(self.error(format!("unexpected </{}>", tag))),
                };
            } else if rest.starts_with('<') {
                nodes.push(self.element()?);
            } else {
                let text = self.take_while(|c| c != '<');
                if !text.trim().is_empty() {
                    nodes.push(MarkupNode::Text(text.to_string()));
                }
            }
        }
    }

    fn element(&mut self) -> Result<MarkupNode, ViewError> {
        self.pos += 1;
        let tag = self
            .take_while(|c| !c.is_whitespace() && c != '>' && c != '/')
            .to_string();
        if tag.is_empty() {
            return Err(self.error("expected a tag name"));
        }

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(MarkupNode::Element {
                    tag,
                    attributes,
                    children: Vec::new(),
                });
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(self.error(format!("unterminated <{}>", tag)));
            }

            let name = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_string();
            if name.is_empty() {
                return Err(self.error("expected an attribute name"));
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()?
            } else {
                String::new()
            };
            attributes.push((name, value));
        }

        let children = if is_void(&tag) {
            Vec::new()
        } else {
            self.nodes(Some(tag.as_str()))?
        };

        Ok(MarkupNode::Element {
            tag,
            attributes,
            children,
        })
    }

    fn attribute_value(&mut self) -> Result<String, ViewError> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote) if quote == '"' || quote == '\'' => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated attribute value"))?;
                self.pos += end + 2;
                Ok(unescape(&rest[1..end + 1]))
            }
            _ => Ok(unescape(
                self.take_while(|c| !c.is_whitespace() && c != '>'),
            )),
        }
    }
}

/// Decodes the character references written by [`render`].
fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    // &amp; goes last so that escaped references stay literal
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Serializes nodes back to markup.
pub fn render(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(text),
            MarkupNode::Element {
                tag,
                attributes,
                children,
            } => {
                render_open_tag(tag, attributes, out);
                if !is_void(tag) {
                    render(children, out);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

pub(crate) fn render_open_tag(tag: &str, attributes: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        for c in value.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '"' => out.push_str("&quot;"),
                c => out.push(c),
            }
        }
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}
