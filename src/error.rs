//! Errors.

use crate::view::ViewId;
use thiserror::Error;

/// Everything that can go wrong in the view tree, the navigation controller and the
/// collaborators around them.
///
/// View descriptions in messages use the `[Type&bundle@path:loaded]` format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("{view}->{property}(): getter is not implemented")]
    NotImplemented { view: String, property: &'static str },
    #[error("{view}->{property}(..): setter is not implemented, property is read only")]
    ReadOnlyProperty { view: String, property: &'static str },
    #[error("{view}->{property}(..): cannot change property while view is loaded")]
    IllegalState { view: String, property: &'static str },

    #[error("{view}: view has no parent view")]
    NoParent { view: String },
    #[error("{view}: child view {existing} already occupies the container named `{name}`")]
    DuplicateName {
        view: String,
        existing: String,
        name: String,
    },
    #[error("{view}: {parent} is not a view of this tree")]
    InvalidParent { view: String, parent: ViewId },
    #[error("{view}: {parent} is the view itself or one of its descendants")]
    CycleDetected { view: String, parent: String },
    #[error("{view}: {child} is not a child view")]
    NotAChild { view: String, child: String },
    #[error("{view}: cannot become a root view, parent view is {parent}")]
    AlreadyHasParent { view: String, parent: String },
    #[error("no view with id {view} in this tree")]
    UnknownView { view: ViewId },

    #[error("{view}->load(): parent view is not loaded yet")]
    ParentNotLoaded { view: String },
    #[error("{view}->load(): container name not specified")]
    MissingName { view: String },
    #[error("{view}->load(): bundle not specified")]
    MissingBundle { view: String },
    #[error("{view}->load(): cannot load, view already loaded")]
    AlreadyLoaded { view: String },
    #[error("{view}->load(): unloaded before the load finished")]
    LoadAbandoned { view: String },
    #[error("{view}: view is not loaded")]
    NotLoaded { view: String },
    #[error("{view}->load(): no container element matches {selector}")]
    ContainerNotFound { view: String, selector: String },
    #[error("{view}->load(): {count} container elements match {selector}")]
    AmbiguousContainer {
        view: String,
        selector: String,
        count: usize,
    },
    #[error("{view}->load(): the container of a root view cannot be inside another view")]
    InvalidRootContainer { view: String },
    #[error("{view}->load(): container element is already owned by {owner}")]
    ContainerInUse { view: String, owner: String },
    #[error("error loading bundle `{bundle}`: {status}")]
    BundleFetch { bundle: String, status: String },

    #[error("show was called with a view that does not exist ({view})")]
    MissingView { view: ViewId },
    #[error("transition style `{style}` does not exist")]
    UnknownTransitionStyle { style: String },
    #[error("{view} is not a navigation view")]
    NotANavigator { view: String },
    #[error("{view}: unloaded during the transition to {target}")]
    TransitionAbandoned { view: String, target: String },
    #[error("{view}: history is empty, cannot go back")]
    EmptyHistory { view: String },

    #[error("invalid markup at byte {offset}: {reason}")]
    Markup { reason: String, offset: usize },
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("invalid text sheet: {reason}")]
    TextSheet { reason: String },
}

pub type Result<T, E = ViewError> = std::result::Result<T, E>;
