//! Compound selectors.

use crate::error::ViewError;
use core::fmt;
use std::str::FromStr;

/// One attribute condition, `[name]` or `[name="value"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

/// A compound selector such as `div.panel[data-view-name="root"]`.
///
/// Combinators are not supported: every part must hold for the same element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

impl Selector {
    /// Matches elements that have the attribute, whatever its value.
    pub fn has_attribute(name: &str) -> Selector {
        Selector {
            attributes: vec![AttributeMatch {
                name: name.to_string(),
                value: None,
            }],
            ..Selector::default()
        }
    }

    /// Matches elements whose attribute equals `value`.
    pub fn attribute_equals(name: &str, value: &str) -> Selector {
        Selector {
            attributes: vec![AttributeMatch {
                name: name.to_string(),
                value: Some(value.to_string()),
            }],
            ..Selector::default()
        }
    }

    /// Returns true if an element with the given tag and attributes matches.
    pub fn matches(&self, tag: &str, attributes: &[(String, String)]) -> bool {
        let attribute = |name: &str| {
            attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if attribute("id") != Some(expected.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = attribute("class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| classes.split_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attributes.iter().all(|m| match (attribute(&m.name), &m.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(have), Some(want)) => have == want,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl FromStr for Selector {
    type Err = ViewError;

    fn from_str(source: &str) -> Result<Selector, ViewError> {
        let fail = |reason: &str| ViewError::InvalidSelector {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        let mut selector = Selector::default();
        let mut rest = source.trim();
        if rest.is_empty() {
            return Err(fail("empty selector"));
        }

        let ident = |s: &str| -> usize { s.find(|c| !is_ident_char(c)).unwrap_or(s.len()) };

        let end = ident(rest);
        if end > 0 {
            selector.tag = Some(rest[..end].to_string());
            rest = &rest[end..];
        }

        while let Some(c) = rest.chars().next() {
            match c {
                '#' | '.' => {
                    let end = ident(&rest[1..]) + 1;
                    if end == 1 {
                        return Err(fail("expected a name"));
                    }
                    let name = rest[1..end].to_string();
                    if c == '#' {
                        selector.id = Some(name);
                    } else {
                        selector.classes.push(name);
                    }
                    rest = &rest[end..];
                }
                '[' => {
                    let close = rest.find(']').ok_or_else(|| fail("unclosed `[`"))?;
                    let body = &rest[1..close];
                    let condition = match body.find('=') {
                        Some(eq) => {
                            let value = body[eq + 1..].trim();
                            let value = value
                                .strip_prefix('"')
                                .and_then(|v| v.strip_suffix('"'))
                                .or_else(|| {
                                    value.strip_prefix('\'').and_then(|v| v.strip_suffix('\''))
                                })
                                .unwrap_or(value);
                            AttributeMatch {
                                name: body[..eq].trim().to_string(),
                                value: Some(value.to_string()),
                            }
                        }
                        None => AttributeMatch {
                            name: body.trim().to_string(),
                            value: None,
                        },
                    };
                    if condition.name.is_empty() {
                        return Err(fail("expected an attribute name"));
                    }
                    selector.attributes.push(condition);
                    rest = &rest[close + 1..];
                }
                _ => return Err(fail("combinators are not supported")),
            }
        }

        Ok(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for m in &self.attributes {
            match &m.value {
                Some(value) => write!(f, "[{}=\"{}\"]", m.name, value)?,
                None => write!(f, "[{}]", m.name)?,
            }
        }
        Ok(())
    }
}
