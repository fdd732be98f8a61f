use crate::dom::{Document, ElementId};
use crate::driver::{AttributeDriver, RenderDriver};
use crate::error::ViewError;
use crate::events::{Completion, Notifier};
use crate::loader::{BundleResponder, ResourceLoader, Response, StyleHandle};
use crate::navigation::{Navigator, Timer};
use crate::property::{guard_unloaded, Describe, Property};
use crate::selector::Selector;
use crate::timer::Timeline;
use crate::view::{View, ViewContext, ViewId};
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

/// Attribute selecting the container of a view by name.
pub const VIEW_NAME_ATTRIBUTE: &str = "data-view-name";

/// Attribute selecting a named container slot, see [`ViewTree::set_slot`].
pub const SLOT_ATTRIBUTE: &str = "data-view-container";

/// Construction-time configuration of a view.
#[derive(Debug)]
pub struct ViewConfig {
    pub name: Option<String>,
    pub bundle: Option<String>,
    pub view: Arc<dyn View>,
}

impl ViewConfig {
    pub fn new(name: &str, bundle: &str) -> ViewConfig {
        ViewConfig {
            name: Some(name.to_string()),
            bundle: Some(bundle.to_string()),
            view: Arc::new(()),
        }
    }

    pub fn with_view(mut self, view: Arc<dyn View>) -> ViewConfig {
        self.view = view;
        self
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            name: None,
            bundle: None,
            view: Arc::new(()),
        }
    }
}

/// Where a view is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    /// The bundle has been requested; the container is reserved but not bound.
    Fetching,
    /// Markup is injected; waiting for children to load.
    Loading,
    /// The view and all its descendants are loaded.
    Loaded,
}

#[derive(Debug, Clone)]
enum NodeState {
    Unloaded,
    Fetching { ticket: u64, container: ElementId },
    Loading { container: ElementId, style: StyleHandle },
    Loaded { container: ElementId, style: StyleHandle },
}

impl NodeState {
    /// The bound container, if the view counts as loaded.
    fn bound_container(&self) -> Option<ElementId> {
        match self {
            NodeState::Loading { container, .. } | NodeState::Loaded { container, .. } => {
                Some(*container)
            }
            _ => None,
        }
    }

    fn is_loaded(&self) -> bool {
        self.bound_container().is_some()
    }

    fn is_unloaded(&self) -> bool {
        matches!(self, NodeState::Unloaded)
    }

    fn load_state(&self) -> LoadState {
        match self {
            NodeState::Unloaded => LoadState::Unloaded,
            NodeState::Fetching { .. } => LoadState::Fetching,
            NodeState::Loading { .. } => LoadState::Loading,
            NodeState::Loaded { .. } => LoadState::Loaded,
        }
    }
}

/// A node in the view tree.
#[derive(Debug)]
pub(crate) struct Node {
    view: Arc<dyn View>,
    name: Option<String>,
    bundle: Option<String>,
    slot: Option<String>,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    state: NodeState,
    children_will_load: Notifier,
    did_load: Notifier,
    will_unload: Notifier,
    /// Completions resolved by the next `did_load` (or load failure).
    waiting: Vec<Completion>,
}

impl Describe for Node {
    fn describe(&self) -> String {
        format!(
            "[{}&{}@{}]",
            self.view.type_name(),
            self.bundle.as_deref().unwrap_or("?"),
            self.name.as_deref().unwrap_or("?")
        )
    }
}

fn get_name(node: &Node) -> Option<String> {
    node.name.clone()
}

fn set_name(node: &mut Node, name: Option<String>) -> Result<(), ViewError> {
    guard_unloaded(node, !node.state.is_unloaded(), "name")?;
    node.name = name;
    Ok(())
}

fn get_bundle(node: &Node) -> Option<String> {
    node.bundle.clone()
}

fn set_bundle(node: &mut Node, bundle: Option<String>) -> Result<(), ViewError> {
    guard_unloaded(node, !node.state.is_unloaded(), "bundle")?;
    node.bundle = bundle;
    Ok(())
}

fn get_slot(node: &Node) -> Option<String> {
    node.slot.clone()
}

fn set_slot(node: &mut Node, slot: Option<String>) -> Result<(), ViewError> {
    guard_unloaded(node, !node.state.is_unloaded(), "slot")?;
    node.slot = slot;
    Ok(())
}

fn get_parent(node: &Node) -> Option<ViewId> {
    node.parent
}

fn get_is_loaded(node: &Node) -> bool {
    node.state.is_loaded()
}

fn get_is_root(node: &Node) -> bool {
    node.parent.is_none()
}

const NAME: Property<Node, Option<String>> = Property {
    name: "name",
    getter: Some(get_name),
    setter: Some(set_name),
};

const BUNDLE: Property<Node, Option<String>> = Property {
    name: "bundle",
    getter: Some(get_bundle),
    setter: Some(set_bundle),
};

const SLOT: Property<Node, Option<String>> = Property {
    name: "slot",
    getter: Some(get_slot),
    setter: Some(set_slot),
};

// parent is written through ViewTree::set_parent, which needs the siblings
const PARENT: Property<Node, Option<ViewId>> = Property {
    name: "parent",
    getter: Some(get_parent),
    setter: None,
};

const IS_LOADED: Property<Node, bool> = Property {
    name: "isLoaded",
    getter: Some(get_is_loaded),
    setter: None,
};

const IS_ROOT: Property<Node, bool> = Property {
    name: "isRoot",
    getter: Some(get_is_root),
    setter: None,
};

/// Lifecycle points at which view hooks are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    ChildrenWillLoad,
    DidLoad,
    WillUnload,
    WillAppear,
    DidAppear,
    WillDisappear,
    DidDisappear,
}

/// A tree of views, and the runtime that loads them.
///
/// All views live in the tree and refer to each other by [`ViewId`]. Loading is asynchronous:
/// bundle requests go out to the [`ResourceLoader`] and their answers, as well as transition
/// timers, are applied when the host calls [`ViewTree::poll`] or [`ViewTree::advance`].
pub struct ViewTree {
    pub(crate) nodes: HashMap<ViewId, Node>,
    pub(crate) document: Box<dyn Document>,
    loader: Box<dyn ResourceLoader>,
    pub(crate) driver: Box<dyn RenderDriver>,
    /// Container elements reserved or bound by a view.
    bindings: HashMap<ElementId, ViewId>,
    response_send: Sender<Response>,
    response_recv: Receiver<Response>,
    pub(crate) timeline: Timeline<Timer>,
    pub(crate) navigators: HashMap<ViewId, Navigator>,
    next_ticket: u64,
}

impl ViewTree {
    /// Creates a tree that drives transitions through element attributes.
    pub fn new<D, L>(document: D, loader: L) -> ViewTree
    where
        D: Document + 'static,
        L: ResourceLoader + 'static,
    {
        ViewTree::with_driver(document, loader, AttributeDriver)
    }

    pub fn with_driver<D, L, R>(document: D, loader: L, driver: R) -> ViewTree
    where
        D: Document + 'static,
        L: ResourceLoader + 'static,
        R: RenderDriver + 'static,
    {
        let (response_send, response_recv) = channel::unbounded();

        ViewTree {
            nodes: HashMap::new(),
            document: Box::new(document),
            loader: Box::new(loader),
            driver: Box::new(driver),
            bindings: HashMap::new(),
            response_send,
            response_recv,
            timeline: Timeline::new(),
            navigators: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn document(&self) -> &dyn Document {
        &*self.document
    }

    pub fn document_mut(&mut self) -> &mut dyn Document {
        &mut *self.document
    }

    /// Adds a detached, unloaded view to the tree.
    pub fn create(&mut self, config: ViewConfig) -> ViewId {
        let id = ViewId::new();
        self.nodes.insert(
            id,
            Node {
                view: config.view,
                name: config.name,
                bundle: config.bundle,
                slot: None,
                parent: None,
                children: Vec::new(),
                state: NodeState::Unloaded,
                children_will_load: Notifier::new(),
                did_load: Notifier::new(),
                will_unload: Notifier::new(),
                waiting: Vec::new(),
            },
        );
        id
    }

    /// Detaches a view (unloading it) and removes it and its descendants from the tree.
    pub fn destroy(&mut self, id: ViewId) -> Result<(), ViewError> {
        if self.node(id)?.parent.is_some() {
            self.detach(id)?;
        } else if self.nodes[&id].state.is_loaded() {
            self.unload(id)?;
        } else {
            self.abandon(id);
            self.release(id);
        }
        self.drop_subtree(id);
        Ok(())
    }

    fn drop_subtree(&mut self, id: ViewId) {
        if let Some(node) = self.nodes.remove(&id) {
            self.navigators.remove(&id);
            self.navigation_view_dropped(id);
            for child in node.children {
                self.drop_subtree(child);
            }
        }
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub(crate) fn node(&self, id: ViewId) -> Result<&Node, ViewError> {
        self.nodes
            .get(&id)
            .ok_or(ViewError::UnknownView { view: id })
    }

    fn node_mut(&mut self, id: ViewId) -> Result<&mut Node, ViewError> {
        self.nodes
            .get_mut(&id)
            .ok_or(ViewError::UnknownView { view: id })
    }

    pub fn view(&self, id: ViewId) -> Result<&Arc<dyn View>, ViewError> {
        Ok(&self.node(id)?.view)
    }

    pub fn name(&self, id: ViewId) -> Result<Option<String>, ViewError> {
        NAME.get(self.node(id)?)
    }

    /// Fails with [`ViewError::IllegalState`] while the view is loaded, and with
    /// [`ViewError::DuplicateName`] if a sibling already has the name.
    pub fn set_name(&mut self, id: ViewId, name: impl Into<String>) -> Result<(), ViewError> {
        let name = name.into();
        let node = self.node(id)?;
        if let Some(parent) = node.parent {
            if let Some(existing) = self.nodes[&parent]
                .children
                .iter()
                .copied()
                .find(|c| *c != id && self.nodes[c].name.as_deref() == Some(name.as_str()))
            {
                // the guard reports a loaded view first
                guard_unloaded(node, !node.state.is_unloaded(), NAME.name())?;
                return Err(ViewError::DuplicateName {
                    view: self.describe(parent),
                    existing: self.describe(existing),
                    name,
                });
            }
        }
        NAME.set(self.node_mut(id)?, Some(name))
    }

    pub fn bundle(&self, id: ViewId) -> Result<Option<String>, ViewError> {
        BUNDLE.get(self.node(id)?)
    }

    /// Fails with [`ViewError::IllegalState`] while the view is loaded.
    pub fn set_bundle(&mut self, id: ViewId, bundle: impl Into<String>) -> Result<(), ViewError> {
        BUNDLE.set(self.node_mut(id)?, Some(bundle.into()))
    }

    pub fn slot(&self, id: ViewId) -> Result<Option<String>, ViewError> {
        SLOT.get(self.node(id)?)
    }

    /// Makes the view load into the element of its parent marked `data-view-container="slot"`
    /// instead of the one matching its name.
    pub fn set_slot(&mut self, id: ViewId, slot: Option<String>) -> Result<(), ViewError> {
        SLOT.set(self.node_mut(id)?, slot)
    }

    pub fn parent(&self, id: ViewId) -> Result<Option<ViewId>, ViewError> {
        PARENT.get(self.node(id)?)
    }

    pub fn children(&self, id: ViewId) -> Result<&[ViewId], ViewError> {
        Ok(&self.node(id)?.children)
    }

    /// True while a container is bound, i.e. from markup injection until unload.
    pub fn is_loaded(&self, id: ViewId) -> Result<bool, ViewError> {
        IS_LOADED.get(self.node(id)?)
    }

    pub fn is_root(&self, id: ViewId) -> Result<bool, ViewError> {
        IS_ROOT.get(self.node(id)?)
    }

    pub fn load_state(&self, id: ViewId) -> Result<LoadState, ViewError> {
        Ok(self.node(id)?.state.load_state())
    }

    /// The bound container element.
    pub fn container(&self, id: ViewId) -> Result<Option<ElementId>, ViewError> {
        Ok(self.node(id)?.state.bound_container())
    }

    pub fn on_children_will_load(&mut self, id: ViewId) -> Result<&mut Notifier, ViewError> {
        Ok(&mut self.node_mut(id)?.children_will_load)
    }

    pub fn on_did_load(&mut self, id: ViewId) -> Result<&mut Notifier, ViewError> {
        Ok(&mut self.node_mut(id)?.did_load)
    }

    pub fn on_will_unload(&mut self, id: ViewId) -> Result<&mut Notifier, ViewError> {
        Ok(&mut self.node_mut(id)?.will_unload)
    }

    pub(crate) fn context(&self, id: ViewId) -> Option<ViewContext> {
        self.nodes.get(&id).map(|node| ViewContext {
            id,
            name: node.name.clone().unwrap_or_default(),
            bundle: node.bundle.clone().unwrap_or_default(),
            parent: node.parent,
        })
    }

    /// Calls the view hook, then the subscribers of the matching notification.
    pub(crate) fn fire(&mut self, id: ViewId, hook: Hook) {
        let context = match self.context(id) {
            Some(context) => context,
            None => return,
        };
        let view = Arc::clone(&self.nodes[&id].view);
        match hook {
            Hook::ChildrenWillLoad => view.children_will_load(&context),
            Hook::DidLoad => view.did_load(&context),
            Hook::WillUnload => view.will_unload(&context),
            Hook::WillAppear => view.will_appear(&context),
            Hook::DidAppear => view.did_appear(&context),
            Hook::WillDisappear => view.will_disappear(&context),
            Hook::DidDisappear => view.did_disappear(&context),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            match hook {
                Hook::ChildrenWillLoad => node.children_will_load.fire(&context),
                Hook::DidLoad => node.did_load.fire(&context),
                Hook::WillUnload => node.will_unload.fire(&context),
                _ => (),
            }
        }
    }

    // - hierarchy

    fn is_ancestor(&self, ancestor: ViewId, of: ViewId) -> bool {
        let mut current = self.nodes.get(&of).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// The sibling under `parent` (other than `id`) that already uses `id`’s name.
    fn name_collision(&self, parent: ViewId, id: ViewId) -> Option<ViewId> {
        let name = self.nodes.get(&id)?.name.as_ref()?;
        self.nodes[&parent]
            .children
            .iter()
            .copied()
            .find(|c| *c != id && self.nodes[c].name.as_ref() == Some(name))
    }

    /// Attaches the view to a new parent, or detaches it with `None`.
    ///
    /// Attaching a loaded view fails with [`ViewError::IllegalState`]; attaching to a loaded
    /// parent starts loading the view right away. Detaching unloads the view first.
    pub fn set_parent(&mut self, id: ViewId, parent: Option<ViewId>) -> Result<(), ViewError> {
        match parent {
            Some(parent) => self.attach(id, parent),
            None => self.detach(id),
        }
    }

    fn attach(&mut self, id: ViewId, parent: ViewId) -> Result<(), ViewError> {
        let node = self.node(id)?;
        if !self.nodes.contains_key(&parent) {
            return Err(ViewError::InvalidParent {
                view: self.describe(id),
                parent,
            });
        }
        guard_unloaded(node, node.state.is_loaded(), PARENT.name())?;
        if parent == id || self.is_ancestor(id, parent) {
            return Err(ViewError::CycleDetected {
                view: self.describe(id),
                parent: self.describe(parent),
            });
        }
        if let Some(existing) = self.name_collision(parent, id) {
            return Err(ViewError::DuplicateName {
                view: self.describe(parent),
                existing: self.describe(existing),
                name: self.nodes[&existing].name.clone().unwrap_or_default(),
            });
        }

        if node.parent.is_some() {
            self.detach(id)?;
        } else {
            // a root may still be waiting for its bundle
            self.abandon(id);
            self.release(id);
        }

        self.node_mut(id)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(id);

        if self.nodes[&parent].state.is_loaded() {
            if let Err(error) = self.start_load(id) {
                // leave the view detached rather than attached and stuck unloaded
                self.node_mut(id)?.parent = None;
                self.node_mut(parent)?.children.retain(|c| *c != id);
                return Err(error);
            }
        }
        Ok(())
    }

    fn detach(&mut self, id: ViewId) -> Result<(), ViewError> {
        let node = self.node(id)?;
        let parent = match node.parent {
            Some(parent) => parent,
            None => {
                return Err(ViewError::NoParent {
                    view: self.describe(id),
                })
            }
        };

        if node.state.is_loaded() {
            self.unload_subtree(id);
        } else {
            self.abandon(id);
            self.release(id);
        }

        self.node_mut(id)?.parent = None;
        self.node_mut(parent)?.children.retain(|c| *c != id);
        // the parent may have been waiting for this child only
        self.try_finish_load(parent);
        Ok(())
    }

    /// Replaces all children. Current children are unloaded and detached first.
    pub fn set_children(&mut self, id: ViewId, children: &[ViewId]) -> Result<(), ViewError> {
        self.node(id)?;
        for (i, child) in children.iter().enumerate() {
            let node = self.node(*child)?;
            if *child == id || self.is_ancestor(*child, id) {
                return Err(ViewError::CycleDetected {
                    view: self.describe(*child),
                    parent: self.describe(id),
                });
            }
            if node.parent != Some(id) {
                guard_unloaded(node, node.state.is_loaded(), PARENT.name())?;
            }
            if let Some(name) = &node.name {
                if let Some(existing) = children[..i]
                    .iter()
                    .find(|other| self.nodes[*other].name.as_ref() == Some(name))
                {
                    return Err(ViewError::DuplicateName {
                        view: self.describe(id),
                        existing: self.describe(*existing),
                        name: name.clone(),
                    });
                }
            }
        }

        self.remove_all_children(id)?;
        for child in children {
            self.attach(*child, id)?;
        }
        Ok(())
    }

    /// Appends a child. The returned completion resolves on the child’s next `did_load`.
    pub fn add_child(&mut self, parent: ViewId, child: ViewId) -> Result<Completion, ViewError> {
        self.attach(child, parent)?;
        let completion = Completion::new();
        self.node_mut(child)?.waiting.push(completion.clone());
        Ok(completion)
    }

    pub fn remove_child(&mut self, parent: ViewId, child: ViewId) -> Result<(), ViewError> {
        if !self.node(parent)?.children.contains(&child) {
            return Err(ViewError::NotAChild {
                view: self.describe(parent),
                child: self.describe(child),
            });
        }
        self.detach(child)
    }

    pub fn remove_all_children(&mut self, parent: ViewId) -> Result<(), ViewError> {
        for child in self.node(parent)?.children.clone() {
            self.detach(child)?;
        }
        Ok(())
    }

    pub fn remove_from_parent(&mut self, id: ViewId) -> Result<(), ViewError> {
        self.detach(id)
    }

    // - lifecycle

    /// Starts loading a view that has no parent.
    ///
    /// The completion resolves once the whole subtree is loaded, or with the first load error
    /// in it.
    pub fn set_as_root(&mut self, id: ViewId) -> Result<Completion, ViewError> {
        if let Some(parent) = self.node(id)?.parent {
            return Err(ViewError::AlreadyHasParent {
                view: self.describe(id),
                parent: self.describe(parent),
            });
        }
        self.load(id)
    }

    /// Starts loading a view whose parent (if any) is loaded.
    pub fn load(&mut self, id: ViewId) -> Result<Completion, ViewError> {
        self.start_load(id)?;
        let completion = Completion::new();
        self.node_mut(id)?.waiting.push(completion.clone());
        Ok(completion)
    }

    /// Validates every precondition, then reserves the container and requests the bundle.
    fn start_load(&mut self, id: ViewId) -> Result<(), ViewError> {
        let node = self.node(id)?;
        if let Some(parent) = node.parent {
            if !self.nodes[&parent].state.is_loaded() {
                return Err(ViewError::ParentNotLoaded {
                    view: self.describe(id),
                });
            }
        }
        if node.name.as_deref().map_or(true, str::is_empty) {
            return Err(ViewError::MissingName {
                view: self.describe(id),
            });
        }
        let bundle = match node.bundle.as_deref() {
            Some(bundle) if !bundle.is_empty() => bundle.to_string(),
            _ => {
                return Err(ViewError::MissingBundle {
                    view: self.describe(id),
                })
            }
        };
        if !node.state.is_unloaded() {
            return Err(ViewError::AlreadyLoaded {
                view: self.describe(id),
            });
        }
        let container = self.resolve_container(id)?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.bindings.insert(container, id);
        self.node_mut(id)?.state = NodeState::Fetching { ticket, container };

        tracing::debug!(view = %self.describe(id), bundle = %bundle, "requesting bundle");
        let responder = BundleResponder::new(self.response_send.clone(), id, ticket, &bundle);
        self.loader.fetch(&bundle, responder);
        Ok(())
    }

    /// Finds the one element the view may load into.
    fn resolve_container(&self, id: ViewId) -> Result<ElementId, ViewError> {
        let node = self.node(id)?;
        let selector = match (&node.slot, node.parent) {
            (Some(slot), Some(_)) => Selector::attribute_equals(SLOT_ATTRIBUTE, slot),
            _ => Selector::attribute_equals(
                VIEW_NAME_ATTRIBUTE,
                node.name.as_deref().unwrap_or_default(),
            ),
        };

        let matches = match node.parent {
            Some(parent) => match self.nodes[&parent].state.bound_container() {
                Some(scope) => self.query_owned(scope, &selector),
                None => {
                    return Err(ViewError::ParentNotLoaded {
                        view: self.describe(id),
                    })
                }
            },
            None => self.document.query(self.document.root(), &selector),
        };

        let container = match matches.len() {
            0 => {
                return Err(ViewError::ContainerNotFound {
                    view: self.describe(id),
                    selector: selector.to_string(),
                })
            }
            1 => matches[0],
            count => {
                return Err(ViewError::AmbiguousContainer {
                    view: self.describe(id),
                    selector: selector.to_string(),
                    count,
                })
            }
        };

        let boundary = Selector::has_attribute(VIEW_NAME_ATTRIBUTE);
        if node.parent.is_none() && self.document.closest(container, &boundary).is_some() {
            return Err(ViewError::InvalidRootContainer {
                view: self.describe(id),
            });
        }
        if let Some(owner) = self.bindings.get(&container) {
            if *owner != id {
                return Err(ViewError::ContainerInUse {
                    view: self.describe(id),
                    owner: self.describe(*owner),
                });
            }
        }
        Ok(container)
    }

    /// Drops the container reservation of a view that is not bound yet, or the binding of one
    /// being unloaded. Pending bundle answers for it will be discarded.
    fn release(&mut self, id: ViewId) {
        let node = match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => return,
        };
        let container = match &node.state {
            NodeState::Unloaded => return,
            NodeState::Fetching { container, .. }
            | NodeState::Loading { container, .. }
            | NodeState::Loaded { container, .. } => *container,
        };
        node.state = NodeState::Unloaded;
        if self.bindings.get(&container) == Some(&id) {
            self.bindings.remove(&container);
        }
    }

    /// Fails the completions of a view whose load is cut short by an unload or a detach.
    fn abandon(&mut self, id: ViewId) {
        let node = match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => return,
        };
        let loading = matches!(
            node.state,
            NodeState::Fetching { .. } | NodeState::Loading { .. }
        );
        if !loading || node.waiting.is_empty() {
            return;
        }
        let waiting = mem::take(&mut node.waiting);
        let error = ViewError::LoadAbandoned {
            view: self.describe(id),
        };
        tracing::warn!(error = %error, "abandoning load");
        for completion in waiting {
            completion.resolve(Err(error.clone()));
        }
    }

    fn apply_response(&mut self, response: Response) {
        let id = response.view;
        let container = match self.nodes.get(&id).map(|n| &n.state) {
            Some(NodeState::Fetching { ticket, container }) if *ticket == response.ticket => {
                *container
            }
            _ => {
                tracing::debug!(view = %id, "discarding stale bundle response");
                return;
            }
        };

        let bundle = match response.result {
            Ok(bundle) => bundle,
            Err(status) => {
                let error = ViewError::BundleFetch {
                    bundle: self.nodes[&id].bundle.clone().unwrap_or_default(),
                    status,
                };
                self.release(id);
                self.fail_load(id, error);
                return;
            }
        };

        if let Err(error) = self.document.set_markup(container, &bundle.markup) {
            self.release(id);
            self.fail_load(id, error);
            return;
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = NodeState::Loading {
                container,
                style: bundle.style,
            };
        }

        self.fire(id, Hook::ChildrenWillLoad);

        // children start loading together; did_load waits for all of them
        for child in self.nodes[&id].children.clone() {
            if !self.nodes[&child].state.is_unloaded() {
                continue;
            }
            if let Err(error) = self.start_load(child) {
                self.fail_load(child, error);
            }
        }

        self.try_finish_load(id);
    }

    /// Fires `did_load` if the view is loading and every child is loaded.
    fn try_finish_load(&mut self, id: ViewId) {
        let node = match self.nodes.get(&id) {
            Some(node) => node,
            None => return,
        };
        let (container, style) = match &node.state {
            NodeState::Loading { container, style } => (*container, style.clone()),
            _ => return,
        };
        let children_loaded = node
            .children
            .iter()
            .all(|c| matches!(self.nodes[c].state, NodeState::Loaded { .. }));
        if !children_loaded {
            return;
        }

        let parent = node.parent;
        let waiting = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.state = NodeState::Loaded { container, style };
                mem::take(&mut node.waiting)
            }
            None => return,
        };

        tracing::debug!(view = %self.describe(id), "view did load");
        self.fire(id, Hook::DidLoad);
        for completion in waiting {
            completion.resolve(Ok(()));
        }

        if self.navigators.contains_key(&id) {
            self.navigation_did_load(id);
        }
        if let Some(parent) = parent {
            if self.navigators.contains_key(&parent) {
                self.navigation_child_did_load(parent, id);
            }
            self.try_finish_load(parent);
        }
    }

    /// Reports a failed load to the view and to every ancestor still waiting on it.
    fn fail_load(&mut self, id: ViewId, error: ViewError) {
        tracing::error!(view = %self.describe(id), error = %error, "view failed to load");
        self.report_failure(id, error);
    }

    fn report_failure(&mut self, id: ViewId, error: ViewError) {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = match self.nodes.get_mut(&cur) {
                Some(node) => node,
                None => break,
            };
            if cur != id && !matches!(node.state, NodeState::Loading { .. }) {
                break;
            }
            for completion in mem::take(&mut node.waiting) {
                completion.resolve(Err(error.clone()));
            }
            current = node.parent;
        }

        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if self.navigators.contains_key(&parent) {
                self.navigation_child_failed(parent, id, error);
            }
        }
    }

    /// Unloads a loaded view and its subtree.
    ///
    /// `will_unload` fires on the view before any descendant. Loads still in progress in the
    /// subtree are abandoned: their completions fail with [`ViewError::LoadAbandoned`], and so
    /// do those of ancestors that were waiting on the view.
    pub fn unload(&mut self, id: ViewId) -> Result<(), ViewError> {
        let node = self.node(id)?;
        if !node.state.is_loaded() {
            return Err(ViewError::NotLoaded {
                view: self.describe(id),
            });
        }
        let was_loading = matches!(node.state, NodeState::Loading { .. });

        self.unload_subtree(id);
        if was_loading {
            let error = ViewError::LoadAbandoned {
                view: self.describe(id),
            };
            self.report_failure(id, error);
        }
        Ok(())
    }

    fn unload_subtree(&mut self, id: ViewId) {
        let container = match self.nodes.get(&id).and_then(|n| n.state.bound_container()) {
            Some(container) => container,
            None => return,
        };

        tracing::debug!(view = %self.describe(id), "unloading view");
        self.abandon(id);
        self.fire(id, Hook::WillUnload);
        if self.navigators.contains_key(&id) {
            self.navigation_will_unload(id);
        }

        let children = match self.nodes.get(&id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            if self.nodes[&child].state.is_loaded() {
                self.unload_subtree(child);
            } else {
                self.abandon(child);
                self.release(child);
            }
        }

        self.document.clear(container);
        self.release(id);
    }

    // - markup

    /// Queries the markup owned by a loaded view.
    ///
    /// Without a selector, returns the top-level elements of the view. With one, returns the
    /// matching elements that are not inside a nested view’s container, be it a named
    /// container or one bound by a child view.
    pub fn scoped_query(
        &self,
        id: ViewId,
        selector: Option<&str>,
    ) -> Result<Vec<ElementId>, ViewError> {
        let container = match self.node(id)?.state.bound_container() {
            Some(container) => container,
            None => {
                return Err(ViewError::NotLoaded {
                    view: self.describe(id),
                })
            }
        };
        match selector {
            None => Ok(self.document.children(container)),
            Some(selector) => {
                let selector: Selector = selector.parse()?;
                Ok(self.query_owned(container, &selector))
            }
        }
    }

    /// Matches below `container` that belong to the view bound to it.
    ///
    /// Named view containers and containers reserved or bound by another view are matched
    /// but not searched.
    pub(crate) fn query_owned(&self, container: ElementId, selector: &Selector) -> Vec<ElementId> {
        let boundary = Selector::has_attribute(VIEW_NAME_ATTRIBUTE);
        self.document.query_within(container, selector, &|element| {
            self.document.matches(element, &boundary)
                || (element != container && self.bindings.contains_key(&element))
        })
    }

    // - runtime

    /// Applies bundle answers and runs due timers until nothing is left to do right now.
    pub fn poll(&mut self) {
        loop {
            if let Ok(response) = self.response_recv.try_recv() {
                self.apply_response(response);
                continue;
            }
            if let Some(timer) = self.timeline.pop_due() {
                self.fire_timer(timer);
                continue;
            }
            break;
        }
    }

    /// Moves virtual time forward, running timers as their deadlines pass.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.timeline.now() + duration;
        self.poll();
        while let Some(deadline) = self.timeline.next_deadline() {
            if deadline > target {
                break;
            }
            self.timeline.set_now(deadline);
            self.poll();
        }
        self.timeline.set_now(target);
        self.poll();
    }

    /// Polls and fast-forwards through every scheduled timer.
    ///
    /// Bundle requests the loader has not answered yet are not waited for.
    pub fn run_until_idle(&mut self) {
        self.poll();
        while let Some(deadline) = self.timeline.next_deadline() {
            self.timeline.set_now(deadline);
            self.poll();
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.timeline.now()
    }

    /// True if transition timers are scheduled.
    pub fn has_pending_timers(&self) -> bool {
        !self.timeline.is_empty()
    }

    // - diagnostics

    /// Visits the view and its descendants in pre-order with their depth.
    pub fn traverse<F: FnMut(ViewId, usize)>(
        &self,
        id: ViewId,
        mut visitor: F,
    ) -> Result<(), ViewError> {
        self.node(id)?;
        self.traverse_inner(id, 0, &mut visitor);
        Ok(())
    }

    fn traverse_inner<F: FnMut(ViewId, usize)>(&self, id: ViewId, level: usize, visitor: &mut F) {
        visitor(id, level);
        if let Some(node) = self.nodes.get(&id) {
            for child in &node.children {
                self.traverse_inner(*child, level + 1, visitor);
            }
        }
    }

    /// Container names from the root down to the view, e.g. `root/a/c`.
    pub fn path_in_hierarchy(&self, id: ViewId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|id| self.nodes.get(&id)) {
            names.push(node.name.as_deref().unwrap_or("?"));
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }

    /// A description like `[MyView&bundle@root/a:loaded]`.
    ///
    /// The bundle is left out when it equals the type name.
    pub fn describe(&self, id: ViewId) -> String {
        let node = match self.nodes.get(&id) {
            Some(node) => node,
            None => return format!("[unknown view {}]", id),
        };
        let type_name = node.view.type_name();
        let mut out = format!("[{}", type_name);
        if let Some(bundle) = &node.bundle {
            if bundle != type_name {
                out.push('&');
                out.push_str(bundle);
            }
        }
        out.push('@');
        out.push_str(&self.path_in_hierarchy(id));
        out.push_str(if node.state.is_loaded() {
            ":loaded]"
        } else {
            ":!loaded]"
        });
        out
    }

    /// One line per view, indented by depth.
    ///
    /// ```text
    /// [View&root@root:loaded]
    /// |--> [View&a@root/a:loaded]
    /// |    |--> [View&c@root/a/c:loaded]
    /// ```
    pub fn hierarchy(&self, id: ViewId) -> Result<String, ViewError> {
        let mut out = String::new();
        self.traverse(id, |view, level| {
            for _ in 1..level {
                out.push_str("|    ");
            }
            if level > 0 {
                out.push_str("|--> ");
            }
            out.push_str(&self.describe(view));
            out.push('\n');
        })?;
        Ok(out)
    }
}
