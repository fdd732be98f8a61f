//! Notifications and completion signals.

use crate::error::ViewError;
use crate::view::ViewContext;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// A shared notification handler.
pub struct Handler(Arc<Mutex<dyn FnMut(&ViewContext) + Send>>);

impl Clone for Handler {
    fn clone(&self) -> Self {
        Handler(Arc::clone(&self.0))
    }
}

impl Handler {
    pub fn new<F: 'static + FnMut(&ViewContext) + Send>(handler: F) -> Self {
        Handler(Arc::new(Mutex::new(handler)))
    }

    fn call(&self, context: &ViewContext) {
        let mut handler = self.0.lock();
        (&mut *handler)(context)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handler(..)")
    }
}

/// Refers to a subscription in a [`Notifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
}

/// A multi-subscriber notification.
///
/// Handlers are called in subscription order. Handlers registered with [`Notifier::once`] are
/// removed after their first call.
#[derive(Debug, Default)]
pub struct Notifier {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl Notifier {
    pub fn new() -> Notifier {
        Notifier::default()
    }

    fn add(&mut self, handler: Handler, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, handler, once });
        id
    }

    /// Calls `handler` every time the notification fires.
    pub fn subscribe<F: 'static + FnMut(&ViewContext) + Send>(
        &mut self,
        handler: F,
    ) -> SubscriptionId {
        self.add(Handler::new(handler), false)
    }

    /// Calls `handler` the next time the notification fires, then forgets it.
    pub fn once<F: 'static + FnMut(&ViewContext) + Send>(&mut self, handler: F) -> SubscriptionId {
        self.add(Handler::new(handler), true)
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let len = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != len
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn fire(&mut self, context: &ViewContext) {
        // once-handlers are dropped before being called so a panicking handler can't fire twice
        let subscriptions: Vec<_> = self
            .subscriptions
            .iter()
            .map(|s| s.handler.clone())
            .collect();
        self.subscriptions.retain(|s| !s.once);
        for handler in subscriptions {
            handler.call(context);
        }
    }
}

/// Resolves once an asynchronous operation (a load or a transition) has finished.
///
/// Only the first resolution counts.
#[derive(Clone, Default)]
pub struct Completion(Arc<Mutex<Option<Result<(), ViewError>>>>);

impl Completion {
    pub(crate) fn new() -> Completion {
        Completion::default()
    }

    pub(crate) fn resolve(&self, result: Result<(), ViewError>) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.0.lock().is_some()
    }

    /// Returns the outcome, or None while still pending.
    pub fn result(&self) -> Option<Result<(), ViewError>> {
        self.0.lock().clone()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &*self.0.lock() {
            None => write!(f, "Completion(pending)"),
            Some(Ok(())) => write!(f, "Completion(done)"),
            Some(Err(err)) => write!(f, "Completion(failed: {})", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewId;

    fn context() -> ViewContext {
        ViewContext {
            id: ViewId::new(),
            name: "root".into(),
            bundle: "root".into(),
            parent: None,
        }
    }

    #[test]
    fn once_handlers_fire_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = Notifier::new();

        let c = Arc::clone(&calls);
        notifier.subscribe(move |_| c.lock().push("always"));
        let c = Arc::clone(&calls);
        notifier.once(move |_| c.lock().push("once"));

        notifier.fire(&context());
        notifier.fire(&context());

        assert_eq!(*calls.lock(), vec!["always", "once", "always"]);
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let calls = Arc::new(Mutex::new(0));
        let mut notifier = Notifier::new();
        let c = Arc::clone(&calls);
        let id = notifier.subscribe(move |_| *c.lock() += 1);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id), "second unsubscribe should report nothing removed");
        notifier.fire(&context());
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn completion_keeps_first_result() {
        let completion = Completion::new();
        assert!(!completion.is_resolved());
        completion.resolve(Ok(()));
        completion.resolve(Err(ViewError::TextSheet {
            reason: "late".into(),
        }));
        assert_eq!(completion.result(), Some(Ok(())));
    }
}
