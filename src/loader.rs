//! Bundle loading.
//!
//! The tree never blocks on a fetch: it hands the loader a [`BundleResponder`] and picks the
//! answer up from its channel the next time the host calls [`ViewTree::poll`].
//!
//! [`ViewTree::poll`]: crate::ViewTree::poll

use crate::view::ViewId;
use crossbeam::channel::Sender;
use std::collections::HashMap;

/// Refers to a stylesheet applied by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleHandle(pub String);

/// Markup and stylesheet of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub markup: String,
    pub style: StyleHandle,
}

/// A loader answer on its way back to the tree.
#[derive(Debug)]
pub(crate) struct Response {
    pub view: ViewId,
    pub ticket: u64,
    pub result: Result<Bundle, String>,
}

/// Answers exactly one bundle request.
#[derive(Debug)]
pub struct BundleResponder {
    sender: Sender<Response>,
    view: ViewId,
    ticket: u64,
    bundle: String,
}

impl BundleResponder {
    pub(crate) fn new(sender: Sender<Response>, view: ViewId, ticket: u64, bundle: &str) -> Self {
        BundleResponder {
            sender,
            view,
            ticket,
            bundle: bundle.to_string(),
        }
    }

    /// The requested bundle id.
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// The view the bundle is loaded for.
    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn resolve(self, bundle: Bundle) {
        self.send(Ok(bundle));
    }

    /// Fails the load with a status such as `404 Not Found`.
    pub fn reject(self, status: impl Into<String>) {
        self.send(Err(status.into()));
    }

    fn send(self, result: Result<Bundle, String>) {
        let response = Response {
            view: self.view,
            ticket: self.ticket,
            result,
        };
        if self.sender.send(response).is_err() {
            tracing::debug!(bundle = %self.bundle, "view tree is gone; dropping bundle response");
        }
    }
}

/// Fetches bundles.
///
/// Implementations may answer right away or keep the responder and answer later; either way the
/// tree only sees the answer on its next poll.
pub trait ResourceLoader {
    fn fetch(&mut self, bundle: &str, responder: BundleResponder);
}

impl<F: FnMut(&str, BundleResponder)> ResourceLoader for F {
    fn fetch(&mut self, bundle: &str, responder: BundleResponder) {
        self(bundle, responder)
    }
}

/// Serves bundles from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    bundles: HashMap<String, String>,
}

impl StaticLoader {
    pub fn new() -> StaticLoader {
        StaticLoader::default()
    }

    pub fn with_bundle(mut self, bundle: &str, markup: &str) -> StaticLoader {
        self.insert(bundle, markup);
        self
    }

    pub fn insert(&mut self, bundle: &str, markup: &str) {
        self.bundles.insert(bundle.to_string(), markup.to_string());
    }
}

impl ResourceLoader for StaticLoader {
    fn fetch(&mut self, bundle: &str, responder: BundleResponder) {
        match self.bundles.get(bundle) {
            Some(markup) => responder.resolve(Bundle {
                markup: markup.clone(),
                style: StyleHandle(format!("{}.css", bundle)),
            }),
            None => responder.reject("404 Not Found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    #[test]
    fn static_loader_answers_through_the_channel() {
        let (sender, receiver) = channel::unbounded();
        let view = ViewId::new();
        let mut loader = StaticLoader::new().with_bundle("root", "<p></p>");

        loader.fetch("root", BundleResponder::new(sender.clone(), view, 1, "root"));
        loader.fetch("nope", BundleResponder::new(sender, view, 2, "nope"));

        let ok = receiver.try_recv().unwrap();
        assert_eq!(ok.ticket, 1);
        assert_eq!(ok.result.unwrap().style, StyleHandle("root.css".into()));
        let err = receiver.try_recv().unwrap();
        assert_eq!(err.result, Err("404 Not Found".to_string()));
    }
}
