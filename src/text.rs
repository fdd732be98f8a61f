//! Cascading text sheets.
//!
//! A text sheet is a JSON tree whose objects are contexts and whose leaves are texts:
//!
//! ```json
//! { "RootView": { "title": "Home" }, "detail": { "title": "Details" }, "title": "Untitled" }
//! ```
//!
//! A lookup path starts with the text key, followed by context keys from the most specific to
//! the least specific one. Every definition of the text key is a candidate; a candidate counts if
//! all of its enclosing objects appear in the lookup path in order. Candidates are scored by where
//! their contexts match, earlier (more specific) positions weighing more, and the best one wins.

use crate::error::ViewError;
use crate::tree::ViewTree;
use crate::view::ViewId;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A loaded text sheet.
#[derive(Debug, Clone)]
pub struct TextSheet {
    tree: Map<String, Value>,
    /// Per text key, the enclosing object keys of each definition, innermost first, in document
    /// order.
    paths_by_key: HashMap<String, Vec<Vec<String>>>,
}

impl TextSheet {
    pub fn from_json(json: &str) -> Result<TextSheet, ViewError> {
        let value = serde_json::from_str(json).map_err(|err| ViewError::TextSheet {
            reason: err.to_string(),
        })?;
        TextSheet::from_value(value)
    }

    /// Fails unless `value` is an object.
    pub fn from_value(value: Value) -> Result<TextSheet, ViewError> {
        let tree = match value {
            Value::Object(tree) => tree,
            other => {
                return Err(ViewError::TextSheet {
                    reason: format!("expected an object at the top level, got {}", other),
                })
            }
        };

        let mut paths_by_key = HashMap::new();
        index(&tree, &mut Vec::new(), &mut paths_by_key);
        tracing::debug!(keys = paths_by_key.len(), "indexed text sheet");

        Ok(TextSheet { tree, paths_by_key })
    }

    /// Looks up the text for `path`, which is the text key followed by context keys.
    ///
    /// Returns None if no definition matches or the best match is not a string.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        let key = path.first()?.as_ref();
        let best = self.best_path(key, path)?;

        let mut node = &self.tree;
        for context in best.iter().rev() {
            node = node.get(context)?.as_object()?;
        }
        node.get(key)?.as_str()
    }

    fn best_path<S: AsRef<str>>(&self, key: &str, path: &[S]) -> Option<&Vec<String>> {
        let mut best = None;
        let mut best_score = None;

        for candidate in self.paths_by_key.get(key)? {
            let mut score: u64 = 0;
            let mut remaining = candidate.iter().peekable();
            for input in path {
                score <<= 1;
                if remaining.peek().map(|s| s.as_str()) == Some(input.as_ref()) {
                    score += 1;
                    remaining.next();
                }
            }
            let consumed = remaining.peek().is_none();

            if consumed && best_score.map_or(true, |best| score > best) {
                best_score = Some(score);
                best = Some(candidate);
            }
        }

        best
    }
}

fn index(
    node: &Map<String, Value>,
    current: &mut Vec<String>,
    paths_by_key: &mut HashMap<String, Vec<Vec<String>>>,
) {
    for (key, value) in node {
        match value {
            Value::Object(child) => {
                current.insert(0, key.clone());
                index(child, current, paths_by_key);
                current.remove(0);
            }
            _ => paths_by_key
                .entry(key.clone())
                .or_insert_with(Vec::new)
                .push(current.clone()),
        }
    }
}

impl ViewTree {
    /// Type names and container names from the view up to the root:
    /// `[type, name, parent type, parent name, ...]`.
    pub fn path_to_root(&self, id: ViewId) -> Result<Vec<String>, ViewError> {
        self.node(id)?;
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(view) = current {
            let view_type = self.view(view)?.type_name().to_string();
            path.push(view_type);
            path.push(self.name(view)?.unwrap_or_default());
            current = self.parent(view)?;
        }
        Ok(path)
    }

    /// Looks up a text in the context of a view.
    ///
    /// `keys` are prepended to [`ViewTree::path_to_root`] one by one, so the last key ends up
    /// first and is the text key.
    pub fn text_for_key<'s>(
        &self,
        id: ViewId,
        sheet: &'s TextSheet,
        keys: &[&str],
    ) -> Result<Option<&'s str>, ViewError> {
        let mut path: Vec<String> = keys.iter().rev().map(|key| key.to_string()).collect();
        path.extend(self.path_to_root(id)?);
        Ok(sheet.get(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::loader::StaticLoader;
    use crate::tree::ViewConfig;
    use crate::view::View;
    use std::any::Any;
    use std::sync::Arc;

    const SHEET: &str = r#"{
        "A": { "X": "A.X", "B": { "X": "A.B.X" }, "C": { "Y": "A.C.Y" } },
        "C": { "X": "C.X" },
        "Y": "Y",
        "N": 42
    }"#;

    #[test]
    fn more_specific_context_wins() {
        let sheet = TextSheet::from_json(SHEET).unwrap();

        assert_eq!(sheet.get(&["X", "B", "A"]), Some("A.B.X"));
        assert_eq!(sheet.get(&["X", "A"]), Some("A.X"));
        assert_eq!(sheet.get(&["X", "C", "A"]), Some("C.X"), "C is more specific than A");
        assert_eq!(sheet.get(&["Y", "C", "A"]), Some("A.C.Y"));
        assert_eq!(sheet.get(&["Y", "B"]), Some("Y"), "top-level fallback");
    }

    #[test]
    fn missing_texts() {
        let sheet = TextSheet::from_json(SHEET).unwrap();

        assert_eq!(sheet.get(&["X"]), None, "every X needs a context");
        assert_eq!(sheet.get(&["X", "B"]), None, "B is only defined inside A");
        assert_eq!(sheet.get(&["Z", "A"]), None);
        assert_eq!(sheet.get(&["N"]), None, "not a string");
        assert_eq!(sheet.get::<&str>(&[]), None);
    }

    #[test]
    fn child_context_beats_ancestor() {
        let sheet =
            TextSheet::from_json(r#"{ "R": { "title": "Home" }, "c": { "title": "Child" } }"#)
                .unwrap();
        assert_eq!(sheet.get(&["title", "c"]), Some("Child"));
        assert_eq!(sheet.get(&["title", "c", "R"]), Some("Child"));
        assert_eq!(sheet.get(&["title", "x", "R"]), Some("Home"));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            TextSheet::from_json("[1, 2]"),
            Err(ViewError::TextSheet { .. })
        ));
        assert!(matches!(
            TextSheet::from_json("{"),
            Err(ViewError::TextSheet { .. })
        ));
    }

    #[derive(Debug)]
    struct HomeView;

    impl View for HomeView {
        fn type_name(&self) -> &str {
            "HomeView"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn text_for_view() {
        let document = MemoryDocument::from_markup(r#"<div data-view-name="root"></div>"#).unwrap();
        let mut tree = ViewTree::new(document, StaticLoader::new());
        let root = tree.create(ViewConfig::new("root", "root").with_view(Arc::new(HomeView)));
        let c = tree.create(ViewConfig::new("c", "child"));
        tree.set_parent(c, Some(root)).unwrap();

        assert_eq!(
            tree.path_to_root(c).unwrap(),
            vec!["View", "c", "HomeView", "root"]
        );

        let sheet = TextSheet::from_json(
            r#"{ "HomeView": { "title": "Home", "c": { "button": { "label": "Go" } } } }"#,
        )
        .unwrap();
        assert_eq!(tree.text_for_key(c, &sheet, &["title"]).unwrap(), Some("Home"));
        assert_eq!(
            tree.text_for_key(c, &sheet, &["button", "label"]).unwrap(),
            Some("Go")
        );
        assert_eq!(tree.text_for_key(root, &sheet, &["missing"]).unwrap(), None);
    }
}
