use core::any::Any;
use core::fmt;
use uuid::Uuid;

/// Identifies a view in a [`ViewTree`](crate::ViewTree).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u32, u16, u16, [u8; 8]);

impl ViewId {
    pub(crate) fn new() -> ViewId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        ViewId(a, b, c, *d)
    }
}

impl fmt::Debug for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ViewId({:08x}-{:04x})", self.0, self.1)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// What a view sees of itself when one of its hooks is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewContext {
    pub id: ViewId,
    pub name: String,
    pub bundle: String,
    pub parent: Option<ViewId>,
}

/// Behavior of a view.
///
/// Views are the composable units of the tree: each one owns the container element selected by
/// its name while it is loaded. The tree calls these hooks at fixed points of the lifecycle;
/// implementors override the ones they care about. State that needs to change in a hook should
/// live behind a lock, since hooks only get `&self`.
///
/// Lifecycle order for a subtree:
///
/// - `children_will_load`: markup is injected, children are about to start loading
/// - `did_load`: fires after every child fired its own `did_load`
/// - `will_unload`: fires before any descendant is unloaded
///
/// The appear/disappear hooks are only called for views shown by a navigation view.
pub trait View: Any + fmt::Debug + Send + Sync {
    /// Name of the view type, used in descriptions and text lookup paths.
    fn type_name(&self) -> &str {
        "View"
    }

    /// Called after the markup has been injected and before children start loading.
    fn children_will_load(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called once the view and all its descendants are loaded.
    fn did_load(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called before the view and its descendants are unloaded.
    fn will_unload(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called before the view slides into the visible container.
    fn will_appear(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called once the view has settled in the visible container.
    fn did_appear(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called before the view leaves the visible container.
    fn will_disappear(&self, context: &ViewContext) {
        let _ = context;
    }

    /// Called after the view left the visible container, right before it is unloaded.
    fn did_disappear(&self, context: &ViewContext) {
        let _ = context;
    }

    /// For downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A plain view without any behavior of its own.
impl View for () {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_view_id_display() {
    let a = ViewId::new();
    let b = ViewId::new();
    assert_ne!(a, b, "view ids should be unique");
    assert_eq!(a.to_string().len(), 8);
    assert!(format!("{:?}", a).starts_with("ViewId("));
}
