//! The document views are loaded into.

use crate::error::ViewError;
use crate::markup::{self, MarkupNode};
use crate::selector::Selector;

/// Refers to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(usize);

/// An element tree with selector queries and the few mutations the view engine needs.
///
/// Implemented by the host environment. [`MemoryDocument`] is a complete in-memory
/// implementation.
pub trait Document {
    /// The top-level element; global queries start here.
    fn root(&self) -> ElementId;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Child elements in document order.
    fn children(&self, element: ElementId) -> Vec<ElementId>;

    fn matches(&self, element: ElementId, selector: &Selector) -> bool;

    /// Replaces the contents of `element` with parsed markup.
    fn set_markup(&mut self, element: ElementId, markup: &str) -> Result<(), ViewError>;

    /// Removes all contents of `element`.
    fn clear(&mut self, element: ElementId);

    /// Serializes the contents of `element`.
    fn inner_markup(&self, element: ElementId) -> String;

    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str);

    fn has_class(&self, element: ElementId, class: &str) -> bool;

    fn toggle_class(&mut self, element: ElementId, class: &str, on: bool);

    fn set_displayed(&mut self, element: ElementId, displayed: bool);

    fn is_displayed(&self, element: ElementId) -> bool;

    /// All descendants of `scope` matching `selector`, in document order.
    fn query(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        let mut found = Vec::new();
        collect(self, scope, selector, None, &mut found);
        found
    }

    /// Like [`Document::query`], but does not descend into elements matching `boundary`.
    ///
    /// Boundary elements themselves are still candidates.
    fn query_bounded(
        &self,
        scope: ElementId,
        selector: &Selector,
        boundary: &Selector,
    ) -> Vec<ElementId> {
        self.query_within(scope, selector, &|element| self.matches(element, boundary))
    }

    /// Like [`Document::query`], but does not descend into elements for which `stop` is true.
    ///
    /// Those elements themselves are still candidates.
    fn query_within(
        &self,
        scope: ElementId,
        selector: &Selector,
        stop: &dyn Fn(ElementId) -> bool,
    ) -> Vec<ElementId> {
        let mut found = Vec::new();
        collect(self, scope, selector, Some(stop), &mut found);
        found
    }

    /// The closest proper ancestor of `element` matching `selector`.
    fn closest(&self, element: ElementId, selector: &Selector) -> Option<ElementId> {
        let mut current = self.parent(element);
        while let Some(id) = current {
            if self.matches(id, selector) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }
}

fn collect<D: Document + ?Sized>(
    document: &D,
    scope: ElementId,
    selector: &Selector,
    stop: Option<&dyn Fn(ElementId) -> bool>,
    found: &mut Vec<ElementId>,
) {
    for child in document.children(scope) {
        if document.matches(child, selector) {
            found.push(child);
        }
        if stop.map_or(true, |stop| !stop(child)) {
            collect(document, child, selector, stop, found);
        }
    }
}

#[derive(Debug, Clone)]
enum Content {
    Element(ElementId),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    content: Vec<Content>,
    parent: Option<ElementId>,
    displayed: bool,
}

/// An in-memory document.
///
/// Cleared elements stay in the arena but are unreachable from the root.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    elements: Vec<Element>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        MemoryDocument::new()
    }
}

impl MemoryDocument {
    /// Creates an empty document with a `body` root.
    pub fn new() -> MemoryDocument {
        MemoryDocument {
            elements: vec![Element {
                tag: "body".into(),
                attributes: Vec::new(),
                content: Vec::new(),
                parent: None,
                displayed: true,
            }],
        }
    }

    /// Creates a document whose body contains `markup`.
    pub fn from_markup(markup: &str) -> Result<MemoryDocument, ViewError> {
        let mut document = MemoryDocument::new();
        let root = document.root();
        document.set_markup(root, markup)?;
        Ok(document)
    }

    fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    fn instantiate(&mut self, parent: ElementId, nodes: Vec<MarkupNode>) {
        for node in nodes {
            match node {
                MarkupNode::Text(text) => self.element_mut(parent).content.push(Content::Text(text)),
                MarkupNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let id = ElementId(self.elements.len());
                    self.elements.push(Element {
                        tag,
                        attributes,
                        content: Vec::new(),
                        parent: Some(parent),
                        displayed: true,
                    });
                    self.element_mut(parent).content.push(Content::Element(id));
                    self.instantiate(id, children);
                }
            }
        }
    }

    fn render(&self, id: ElementId, out: &mut String) {
        for content in &self.element(id).content {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Element(child) => {
                    let element = self.element(*child);
                    markup::render_open_tag(&element.tag, &element.attributes, out);
                    if !markup::is_void(&element.tag) {
                        self.render(*child, out);
                        out.push_str("</");
                        out.push_str(&element.tag);
                        out.push('>');
                    }
                }
            }
        }
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> ElementId {
        ElementId(0)
    }

    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.element(element).parent
    }

    fn children(&self, element: ElementId) -> Vec<ElementId> {
        self.element(element)
            .content
            .iter()
            .filter_map(|c| match c {
                Content::Element(id) => Some(*id),
                Content::Text(_) => None,
            })
            .collect()
    }

    fn matches(&self, element: ElementId, selector: &Selector) -> bool {
        let element = self.element(element);
        selector.matches(&element.tag, &element.attributes)
    }

    fn set_markup(&mut self, element: ElementId, markup: &str) -> Result<(), ViewError> {
        // parse first so a bad bundle leaves the old contents alone
        let nodes = markup::parse(markup)?;
        self.clear(element);
        self.instantiate(element, nodes);
        Ok(())
    }

    fn clear(&mut self, element: ElementId) {
        let content = std::mem::replace(&mut self.element_mut(element).content, Vec::new());
        for c in content {
            if let Content::Element(id) = c {
                self.element_mut(id).parent = None;
            }
        }
    }

    fn inner_markup(&self, element: ElementId) -> String {
        let mut out = String::new();
        self.render(element, &mut out);
        out
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.element(element)
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) {
        let attributes = &mut self.element_mut(element).attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn has_class(&self, element: ElementId, class: &str) -> bool {
        self.attribute(element, "class")
            .map_or(false, |c| c.split_whitespace().any(|have| have == class))
    }

    fn toggle_class(&mut self, element: ElementId, class: &str, on: bool) {
        let current = self.attribute(element, "class").unwrap_or_default();
        let mut classes: Vec<&str> = current
            .split_whitespace()
            .filter(|have| *have != class)
            .collect();
        if on {
            classes.push(class);
        }
        let joined = classes.join(" ");
        self.set_attribute(element, "class", &joined);
    }

    fn set_displayed(&mut self, element: ElementId, displayed: bool) {
        self.element_mut(element).displayed = displayed;
    }

    fn is_displayed(&self, element: ElementId) -> bool {
        self.element(element).displayed
    }
}
