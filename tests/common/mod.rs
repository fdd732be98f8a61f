//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use viewy::dom::{Document, ElementId};
use viewy::driver::{AttributeDriver, Position, RenderDriver};
use viewy::loader::{Bundle, BundleResponder, ResourceLoader, StyleHandle};
use viewy::{View, ViewContext};

/// Holds on to bundle requests until the test answers them, in any order.
#[derive(Clone, Default)]
pub struct ManualLoader {
    bundles: Arc<HashMap<String, String>>,
    pending: Arc<Mutex<Vec<BundleResponder>>>,
}

impl ManualLoader {
    pub fn new(bundles: &[(&str, &str)]) -> ManualLoader {
        ManualLoader {
            bundles: Arc::new(
                bundles
                    .iter()
                    .map(|(id, markup)| (id.to_string(), markup.to_string()))
                    .collect(),
            ),
            pending: Arc::default(),
        }
    }

    /// Bundle ids of unanswered requests, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.pending
            .lock()
            .iter()
            .map(|r| r.bundle().to_string())
            .collect()
    }

    fn take(&self, bundle: &str) -> Option<BundleResponder> {
        let mut pending = self.pending.lock();
        let index = pending.iter().position(|r| r.bundle() == bundle)?;
        Some(pending.remove(index))
    }

    /// Answers the oldest request for `bundle`. Returns false if there is none.
    pub fn answer(&self, bundle: &str) -> bool {
        let markup = self.bundles.get(bundle).cloned().unwrap_or_default();
        match self.take(bundle) {
            Some(responder) => {
                responder.resolve(Bundle {
                    markup,
                    style: StyleHandle(format!("{}.css", bundle)),
                });
                true
            }
            None => false,
        }
    }

    pub fn fail(&self, bundle: &str, status: &str) -> bool {
        match self.take(bundle) {
            Some(responder) => {
                responder.reject(status);
                true
            }
            None => false,
        }
    }
}

impl ResourceLoader for ManualLoader {
    fn fetch(&mut self, _bundle: &str, responder: BundleResponder) {
        self.pending.lock().push(responder);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Slot name, position, animated.
    Place(String, Position, bool),
    Flush(String),
}

/// Records what the navigation view asks of the driver, by slot name.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    pub steps: Arc<Mutex<Vec<Step>>>,
}

impl RecordingDriver {
    pub fn take(&self) -> Vec<Step> {
        std::mem::replace(&mut *self.steps.lock(), Vec::new())
    }
}

fn slot_name(document: &dyn Document, container: ElementId) -> String {
    document
        .attribute(container, "data-view-container")
        .unwrap_or_default()
}

impl RenderDriver for RecordingDriver {
    fn place(
        &mut self,
        document: &mut dyn Document,
        container: ElementId,
        position: Position,
        animated: bool,
    ) {
        let slot = slot_name(document, container);
        self.steps.lock().push(Step::Place(slot, position, animated));
        AttributeDriver.place(document, container, position, animated);
    }

    fn flush_layout(&mut self, document: &mut dyn Document, container: ElementId) {
        let slot = slot_name(document, container);
        self.steps.lock().push(Step::Flush(slot));
        AttributeDriver.flush_layout(document, container);
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

/// A view that logs `name:hook` for every hook call.
#[derive(Debug)]
pub struct Recorder {
    log: Log,
}

pub fn recorder(log: &Log) -> Arc<dyn View> {
    Arc::new(Recorder {
        log: Arc::clone(log),
    })
}

impl Recorder {
    fn record(&self, context: &ViewContext, hook: &str) {
        self.log.lock().push(format!("{}:{}", context.name, hook));
    }
}

impl View for Recorder {
    fn children_will_load(&self, context: &ViewContext) {
        self.record(context, "children_will_load");
    }

    fn did_load(&self, context: &ViewContext) {
        self.record(context, "did_load");
    }

    fn will_unload(&self, context: &ViewContext) {
        self.record(context, "will_unload");
    }

    fn will_appear(&self, context: &ViewContext) {
        self.record(context, "will_appear");
    }

    fn did_appear(&self, context: &ViewContext) {
        self.record(context, "did_appear");
    }

    fn will_disappear(&self, context: &ViewContext) {
        self.record(context, "will_disappear");
    }

    fn did_disappear(&self, context: &ViewContext) {
        self.record(context, "did_disappear");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn take_log(log: &Log) -> Vec<String> {
    std::mem::replace(&mut *log.lock(), Vec::new())
}
