//! Composes a screen out of views that each own a scoped region of markup.
//!
//! See [`ViewTree`] for the lifecycle and [`navigation`] for animated view swapping.

pub mod dom;
pub mod driver;
mod error;
pub mod events;
pub mod loader;
pub mod markup;
pub mod navigation;
mod property;
pub mod selector;
mod text;
mod timer;
mod tree;
mod view;

pub use error::{Result, ViewError};
pub use events::{Completion, Notifier, SubscriptionId};
pub use navigation::{
    HistoryEntry, NavigationConfig, NavigationView, ShowRequest, TransitionPhase, TransitionStyle,
};
pub use property::{guard_unloaded, Describe, Property};
pub use text::TextSheet;
pub use tree::{LoadState, ViewConfig, ViewTree, SLOT_ATTRIBUTE, VIEW_NAME_ATTRIBUTE};
pub use view::{View, ViewContext, ViewId};
