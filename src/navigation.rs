//! Navigation views: a view with two container slots that swaps child views with animated
//! transitions.
//!
//! Requests are queued and run strictly one after another. A transition goes through
//!
//! 1. `Entering`: the new view is attached into the hidden slot and loads. Once it did load,
//!    both slots get their initial positions and a tick is scheduled.
//! 2. `Settling`: on the tick, both slots move to their final positions. After the settle delay
//!    the slots swap roles, the old view is detached and the transition completes.

use crate::dom::ElementId;
use crate::driver::Position;
use crate::error::ViewError;
use crate::events::{Completion, Notifier};
use crate::selector::Selector;
use crate::tree::{Hook, ViewConfig, ViewTree, SLOT_ATTRIBUTE};
use crate::view::{View, ViewId};
use core::fmt;
use std::collections::VecDeque;
use std::mem;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How long an animated transition takes to settle.
pub const ANIMATED_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Settle delay of a `noAnimation` transition.
pub const INSTANT_SETTLE_DELAY: Duration = Duration::from_millis(0);

/// Default container slot names of a navigation view.
pub const DEFAULT_SLOTS: [&str; 2] = ["contentViewContainer_1", "contentViewContainer_2"];

/// Spatial motion of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionStyle {
    NoAnimation,
    Splash,
    FromRight,
    FromLeft,
    FromOver,
    FromBelow,
    FromSmall,
    FromBig,
    Clockwise,
    CounterClockwise,
}

/// Where the old view goes and where the new one comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directions {
    pub old_goes_to: Position,
    pub new_comes_from: Position,
}

impl TransitionStyle {
    pub const ALL: [TransitionStyle; 10] = [
        TransitionStyle::NoAnimation,
        TransitionStyle::Splash,
        TransitionStyle::FromRight,
        TransitionStyle::FromLeft,
        TransitionStyle::FromOver,
        TransitionStyle::FromBelow,
        TransitionStyle::FromSmall,
        TransitionStyle::FromBig,
        TransitionStyle::Clockwise,
        TransitionStyle::CounterClockwise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionStyle::NoAnimation => "noAnimation",
            TransitionStyle::Splash => "splash",
            TransitionStyle::FromRight => "fromRight",
            TransitionStyle::FromLeft => "fromLeft",
            TransitionStyle::FromOver => "fromOver",
            TransitionStyle::FromBelow => "fromBelow",
            TransitionStyle::FromSmall => "fromSmall",
            TransitionStyle::FromBig => "fromBig",
            TransitionStyle::Clockwise => "clockwise",
            TransitionStyle::CounterClockwise => "counterClockwise",
        }
    }

    pub fn directions(&self) -> Directions {
        use Position::*;
        let (old_goes_to, new_comes_from) = match self {
            TransitionStyle::NoAnimation | TransitionStyle::Splash => (Back, Back),
            TransitionStyle::FromRight => (Left, Right),
            TransitionStyle::FromLeft => (Right, Left),
            TransitionStyle::FromOver => (Below, Over),
            TransitionStyle::FromBelow => (Over, Below),
            TransitionStyle::FromBig => (Small, Big),
            TransitionStyle::FromSmall => (Big, Small),
            TransitionStyle::Clockwise => (Small, CounterClockwise),
            TransitionStyle::CounterClockwise => (Small, Clockwise),
        };
        Directions {
            old_goes_to,
            new_comes_from,
        }
    }

    /// Everything but `noAnimation` is animated, including `splash`.
    pub fn is_animated(&self) -> bool {
        *self != TransitionStyle::NoAnimation
    }

    fn settle_delay(&self) -> Duration {
        if self.is_animated() {
            ANIMATED_SETTLE_DELAY
        } else {
            INSTANT_SETTLE_DELAY
        }
    }
}

impl Default for TransitionStyle {
    fn default() -> Self {
        TransitionStyle::Splash
    }
}

impl FromStr for TransitionStyle {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransitionStyle::ALL
            .iter()
            .copied()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| ViewError::UnknownTransitionStyle {
                style: s.to_string(),
            })
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to show a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRequest {
    pub view: ViewId,
    pub style: TransitionStyle,
    /// If false, the view can't be navigated back to.
    pub track_history: bool,
    /// Clears the history before recording this request.
    pub purge_history: bool,
}

impl ShowRequest {
    pub fn new(view: ViewId) -> ShowRequest {
        ShowRequest {
            view,
            style: TransitionStyle::default(),
            track_history: true,
            purge_history: false,
        }
    }

    pub fn style(mut self, style: TransitionStyle) -> ShowRequest {
        self.style = style;
        self
    }

    /// Sets the style by name, e.g. `fromRight`.
    pub fn style_named(self, style: &str) -> Result<ShowRequest, ViewError> {
        Ok(self.style(style.parse()?))
    }

    pub fn track_history(mut self, track: bool) -> ShowRequest {
        self.track_history = track;
        self
    }

    pub fn purge_history(mut self, purge: bool) -> ShowRequest {
        self.purge_history = purge;
        self
    }
}

/// A recorded show request.
///
/// Entries that don't track history lose their view once shown and only keep the style, which
/// is replayed when navigating back past them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub view: Option<ViewId>,
    pub style: TransitionStyle,
    pub track_history: bool,
}

/// Configuration of a navigation view.
#[derive(Debug)]
pub struct NavigationConfig {
    pub name: String,
    pub bundle: String,
    /// Shown without animation as soon as the navigation view has loaded.
    pub root_view: ViewId,
    /// `data-view-container` values of the two slots in the bundle markup.
    pub slots: [String; 2],
    pub view: Arc<dyn View>,
}

impl NavigationConfig {
    pub fn new(name: &str, bundle: &str, root_view: ViewId) -> NavigationConfig {
        NavigationConfig {
            name: name.to_string(),
            bundle: bundle.to_string(),
            root_view,
            slots: [DEFAULT_SLOTS[0].to_string(), DEFAULT_SLOTS[1].to_string()],
            view: Arc::new(NavigationView),
        }
    }

    pub fn with_slots(mut self, first: &str, second: &str) -> NavigationConfig {
        self.slots = [first.to_string(), second.to_string()];
        self
    }

    pub fn with_view(mut self, view: Arc<dyn View>) -> NavigationConfig {
        self.view = view;
        self
    }
}

/// The default view behind a navigation view.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationView;

impl View for NavigationView {
    fn type_name(&self) -> &str {
        "NavigationView"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Observable phase of a navigation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    /// The new view is loading into the hidden slot.
    Entering,
    /// Containers are moving to their final positions.
    Settling,
}

#[derive(Debug)]
enum Request {
    Show(ShowRequest, Completion),
    Back(Completion),
}

#[derive(Debug)]
struct Transition {
    serial: u64,
    view: ViewId,
    style: TransitionStyle,
    /// Set when going back; swaps the direction table.
    invert: bool,
    /// Set if this transition pushed a history entry.
    recorded: bool,
    /// Set once initial positions are placed.
    started: bool,
    completion: Completion,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Entering(Transition),
    Settling(Transition),
}

/// Transition timers on the tree timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timer {
    Tick { navigator: ViewId, serial: u64 },
    Settle { navigator: ViewId, serial: u64 },
}

#[derive(Debug)]
pub(crate) struct Navigator {
    slots: [String; 2],
    /// Index into `slots` of the visible slot.
    visible_slot: usize,
    visible_view: Option<ViewId>,
    history: Vec<HistoryEntry>,
    queue: VecDeque<Request>,
    phase: Phase,
    /// Set while the navigation view is loaded; the queue only runs then.
    ready: bool,
    serial: u64,
    before_child_will_appear: Notifier,
}

impl Navigator {
    fn new(slots: [String; 2]) -> Navigator {
        Navigator {
            slots,
            visible_slot: 0,
            visible_view: None,
            history: Vec::new(),
            queue: VecDeque::new(),
            phase: Phase::Idle,
            ready: false,
            serial: 0,
            before_child_will_appear: Notifier::new(),
        }
    }

    fn is_idle(&self) -> bool {
        self.ready && matches!(self.phase, Phase::Idle) && self.queue.is_empty()
    }
}

impl ViewTree {
    /// Creates a navigation view and queues its root view.
    ///
    /// The navigation view still has to be attached or set as root to load; the root view is
    /// shown without animation once it has.
    pub fn create_navigation(&mut self, config: NavigationConfig) -> Result<ViewId, ViewError> {
        if !self.contains(config.root_view) {
            return Err(ViewError::MissingView {
                view: config.root_view,
            });
        }
        let id = self.create(ViewConfig {
            name: Some(config.name),
            bundle: Some(config.bundle),
            view: config.view,
        });
        self.navigators.insert(id, Navigator::new(config.slots));
        self.show(
            id,
            ShowRequest::new(config.root_view).style(TransitionStyle::NoAnimation),
        )?;
        Ok(id)
    }

    fn navigator(&self, id: ViewId) -> Result<&Navigator, ViewError> {
        self.node(id)?;
        self.navigators
            .get(&id)
            .ok_or_else(|| ViewError::NotANavigator {
                view: self.describe(id),
            })
    }

    fn navigator_mut(&mut self, id: ViewId) -> Result<&mut Navigator, ViewError> {
        self.navigator(id)?;
        self.navigators
            .get_mut(&id)
            .ok_or(ViewError::UnknownView { view: id })
    }

    pub fn is_navigator(&self, id: ViewId) -> bool {
        self.navigators.contains_key(&id)
    }

    /// Queues a transition to `request.view`.
    ///
    /// The completion resolves once the view is visible, or with the error that stopped it.
    pub fn show(&mut self, navigator: ViewId, request: ShowRequest) -> Result<Completion, ViewError> {
        self.navigator(navigator)?;
        if !self.contains(request.view) {
            return Err(ViewError::MissingView { view: request.view });
        }
        let completion = Completion::new();
        self.navigator_mut(navigator)?
            .queue
            .push_back(Request::Show(request, completion.clone()));
        self.pump(navigator);
        Ok(completion)
    }

    /// Like [`ViewTree::show`], but drops the request unless the navigation view is idle.
    pub fn show_if_idle(
        &mut self,
        navigator: ViewId,
        request: ShowRequest,
    ) -> Result<Option<Completion>, ViewError> {
        if !self.navigator(navigator)?.is_idle() {
            tracing::debug!(navigator = %self.describe(navigator), "busy; dropping show request");
            return Ok(None);
        }
        self.show(navigator, request).map(Some)
    }

    /// Queues a transition back to the previous view that tracks history.
    pub fn back(&mut self, navigator: ViewId) -> Result<Completion, ViewError> {
        let completion = Completion::new();
        self.navigator_mut(navigator)?
            .queue
            .push_back(Request::Back(completion.clone()));
        self.pump(navigator);
        Ok(completion)
    }

    /// Like [`ViewTree::back`], but drops the request unless the navigation view is idle.
    pub fn back_if_idle(&mut self, navigator: ViewId) -> Result<Option<Completion>, ViewError> {
        if !self.navigator(navigator)?.is_idle() {
            tracing::debug!(navigator = %self.describe(navigator), "busy; dropping back request");
            return Ok(None);
        }
        self.back(navigator).map(Some)
    }

    /// True if an entry before the current one tracks history.
    pub fn can_go_back(&self, navigator: ViewId) -> Result<bool, ViewError> {
        let history = &self.navigator(navigator)?.history;
        let before_current = history.len().saturating_sub(1);
        Ok(history[..before_current].iter().any(|e| e.track_history))
    }

    pub fn visible_view(&self, navigator: ViewId) -> Result<Option<ViewId>, ViewError> {
        Ok(self.navigator(navigator)?.visible_view)
    }

    pub fn history(&self, navigator: ViewId) -> Result<&[HistoryEntry], ViewError> {
        Ok(&self.navigator(navigator)?.history)
    }

    /// True if the navigation view is loaded with nothing running or queued.
    pub fn is_idle(&self, navigator: ViewId) -> Result<bool, ViewError> {
        Ok(self.navigator(navigator)?.is_idle())
    }

    pub fn transition_phase(&self, navigator: ViewId) -> Result<TransitionPhase, ViewError> {
        Ok(match self.navigator(navigator)?.phase {
            Phase::Idle => TransitionPhase::Idle,
            Phase::Entering(_) => TransitionPhase::Entering,
            Phase::Settling(_) => TransitionPhase::Settling,
        })
    }

    /// Fires for a loaded child right before its `will_appear`.
    pub fn on_before_child_will_appear(
        &mut self,
        navigator: ViewId,
    ) -> Result<&mut Notifier, ViewError> {
        Ok(&mut self.navigator_mut(navigator)?.before_child_will_appear)
    }

    /// Starts queued requests while the navigation view is ready and idle.
    fn pump(&mut self, id: ViewId) {
        loop {
            let request = {
                let navigator = match self.navigators.get_mut(&id) {
                    Some(navigator) => navigator,
                    None => return,
                };
                if !navigator.ready || !matches!(navigator.phase, Phase::Idle) {
                    return;
                }
                match navigator.queue.pop_front() {
                    Some(Request::Show(request, completion)) => {
                        if request.purge_history {
                            navigator.history.clear();
                        }
                        navigator.history.push(HistoryEntry {
                            view: Some(request.view),
                            style: request.style,
                            track_history: request.track_history,
                        });
                        Request::Show(request, completion)
                    }
                    Some(request) => request,
                    None => return,
                }
            };

            match request {
                Request::Show(request, completion) => {
                    self.show_now(id, request.view, request.style, false, true, completion)
                }
                Request::Back(completion) => self.back_now(id, completion),
            }
        }
    }

    fn show_now(
        &mut self,
        id: ViewId,
        view: ViewId,
        style: TransitionStyle,
        invert: bool,
        recorded: bool,
        completion: Completion,
    ) {
        let (visible_view, hidden_slot) = match self.navigators.get(&id) {
            Some(navigator) => (
                navigator.visible_view,
                navigator.slots[1 - navigator.visible_slot].clone(),
            ),
            None => return,
        };

        if visible_view == Some(view) {
            if recorded {
                if let Some(navigator) = self.navigators.get_mut(&id) {
                    navigator.history.pop();
                }
            }
            tracing::warn!(view = %self.describe(view), "view is already visible; not loading it again");
            completion.resolve(Ok(()));
            return;
        }

        let attached = self
            .set_slot(view, Some(hidden_slot))
            .and_then(|_| self.set_parent(view, Some(id)));
        if let Err(error) = attached {
            self.abort_transition(id, view, recorded, completion, error);
            return;
        }

        if let Some(navigator) = self.navigators.get_mut(&id) {
            navigator.serial += 1;
            navigator.phase = Phase::Entering(Transition {
                serial: navigator.serial,
                view,
                style,
                invert,
                recorded,
                started: false,
                completion,
            });
        }
        tracing::debug!(
            navigator = %self.describe(id),
            view = %self.describe(view),
            style = %style,
            invert,
            "transition entering"
        );
    }

    fn back_now(&mut self, id: ViewId, completion: Completion) {
        let target = match self.navigators.get_mut(&id) {
            Some(navigator) => loop {
                if navigator.history.len() <= 1 {
                    break None;
                }
                let discarded = match navigator.history.pop() {
                    Some(entry) => entry,
                    None => break None,
                };
                match navigator.history.last() {
                    Some(peek) if peek.track_history => break Some((peek.view, discarded.style)),
                    Some(_) => continue,
                    None => break None,
                }
            },
            None => return,
        };

        match target {
            Some((Some(view), style)) => self.show_now(id, view, style, true, false, completion),
            _ => {
                let error = ViewError::EmptyHistory {
                    view: self.describe(id),
                };
                tracing::warn!(error = %error, "ignoring back request");
                completion.resolve(Ok(()));
            }
        }
    }

    /// Undoes a transition that failed before settling.
    fn abort_transition(
        &mut self,
        id: ViewId,
        view: ViewId,
        recorded: bool,
        completion: Completion,
        error: ViewError,
    ) {
        tracing::error!(
            navigator = %self.describe(id),
            view = %self.describe(view),
            error = %error,
            "transition failed"
        );
        if self.parent(view).ok().flatten() == Some(id) {
            if let Err(detach_error) = self.set_parent(view, None) {
                tracing::debug!(error = %detach_error, "could not detach failed view");
            }
        }
        if let Some(navigator) = self.navigators.get_mut(&id) {
            if recorded {
                navigator.history.pop();
            }
        }
        completion.resolve(Err(error));
    }

    /// The visible and the hidden slot elements, if the navigation view is loaded.
    fn slot_elements(&self, id: ViewId) -> (Option<ElementId>, Option<ElementId>) {
        let navigator = match self.navigators.get(&id) {
            Some(navigator) => navigator,
            None => return (None, None),
        };
        let container = match self.container(id) {
            Ok(Some(container)) => container,
            _ => return (None, None),
        };
        let find = |slot: &str| {
            let selector = Selector::attribute_equals(SLOT_ATTRIBUTE, slot);
            self.query_owned(container, &selector).first().copied()
        };
        (
            find(&navigator.slots[navigator.visible_slot]),
            find(&navigator.slots[1 - navigator.visible_slot]),
        )
    }

    fn place(&mut self, element: Option<ElementId>, position: Position, animated: bool) {
        if let Some(element) = element {
            self.driver
                .place(self.document.as_mut(), element, position, animated);
        }
    }

    // - hooks from the tree

    pub(crate) fn navigation_did_load(&mut self, id: ViewId) {
        let visible_view = match self.navigators.get_mut(&id) {
            Some(navigator) => {
                navigator.ready = true;
                navigator.visible_view
            }
            None => return,
        };

        let (visible, hidden) = self.slot_elements(id);
        if visible.is_none() || hidden.is_none() {
            tracing::warn!(navigator = %self.describe(id), "navigation view is missing a container slot");
        }

        // reloaded with a view already shown
        if let Some(view) = visible_view {
            if self.is_loaded(view).unwrap_or(false) {
                self.place(visible, Position::Center, false);
                self.fire(view, Hook::WillAppear);
                self.fire(view, Hook::DidAppear);
            }
        }

        self.pump(id);
    }

    /// Closes the queue and fails the transition in flight, if any. Queued requests run once
    /// the navigation view loads again.
    pub(crate) fn navigation_will_unload(&mut self, id: ViewId) {
        let transition = match self.navigators.get_mut(&id) {
            Some(navigator) => {
                navigator.ready = false;
                match mem::replace(&mut navigator.phase, Phase::Idle) {
                    Phase::Entering(transition) | Phase::Settling(transition) => transition,
                    Phase::Idle => return,
                }
            }
            None => return,
        };
        let error = ViewError::TransitionAbandoned {
            view: self.describe(id),
            target: self.describe(transition.view),
        };
        self.abort_transition(
            id,
            transition.view,
            transition.recorded,
            transition.completion,
            error,
        );
    }

    /// Forgets a view removed from the tree.
    pub(crate) fn navigation_view_dropped(&mut self, view: ViewId) {
        let mut interrupted = Vec::new();
        for (id, navigator) in self.navigators.iter_mut() {
            if navigator.visible_view == Some(view) {
                navigator.visible_view = None;
            }
            navigator.history.retain(|entry| entry.view != Some(view));
            let in_flight = match &navigator.phase {
                Phase::Entering(transition) | Phase::Settling(transition) => {
                    transition.view == view
                }
                Phase::Idle => false,
            };
            if in_flight {
                if let Phase::Entering(transition) | Phase::Settling(transition) =
                    mem::replace(&mut navigator.phase, Phase::Idle)
                {
                    interrupted.push((*id, transition.completion));
                }
            }
        }

        for (id, completion) in interrupted {
            tracing::warn!(navigator = %self.describe(id), view = %view, "shown view was destroyed");
            completion.resolve(Err(ViewError::UnknownView { view }));
            self.pump(id);
        }
    }

    pub(crate) fn navigation_child_did_load(&mut self, id: ViewId, child: ViewId) {
        let (serial, style, invert, old) = match self.navigators.get_mut(&id) {
            Some(Navigator {
                phase: Phase::Entering(transition),
                visible_view,
                ..
            }) if transition.view == child && !transition.started => {
                transition.started = true;
                (
                    transition.serial,
                    transition.style,
                    transition.invert,
                    *visible_view,
                )
            }
            _ => return,
        };

        if let Some(old) = old {
            self.fire(old, Hook::WillDisappear);
        }
        if let Some(context) = self.context(child) {
            if let Some(navigator) = self.navigators.get_mut(&id) {
                navigator.before_child_will_appear.fire(&context);
            }
        }
        self.fire(child, Hook::WillAppear);

        let directions = style.directions();
        let (visible, hidden) = self.slot_elements(id);
        self.place(visible, Position::Center, false);
        self.place(
            hidden,
            if invert {
                directions.old_goes_to
            } else {
                directions.new_comes_from
            },
            false,
        );

        self.timeline.schedule(
            Duration::from_millis(0),
            Timer::Tick {
                navigator: id,
                serial,
            },
        );
    }

    pub(crate) fn navigation_child_failed(&mut self, id: ViewId, child: ViewId, error: ViewError) {
        let transition = match self.navigators.get_mut(&id) {
            Some(navigator) => match mem::replace(&mut navigator.phase, Phase::Idle) {
                Phase::Entering(transition) if transition.view == child => transition,
                phase => {
                    navigator.phase = phase;
                    return;
                }
            },
            None => return,
        };
        self.abort_transition(id, child, transition.recorded, transition.completion, error);
        self.pump(id);
    }

    pub(crate) fn fire_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Tick { navigator, serial } => self.transition_tick(navigator, serial),
            Timer::Settle { navigator, serial } => self.transition_settle(navigator, serial),
        }
    }

    fn transition_tick(&mut self, id: ViewId, serial: u64) {
        let (style, invert) = match self.navigators.get_mut(&id) {
            Some(navigator) => match mem::replace(&mut navigator.phase, Phase::Idle) {
                Phase::Entering(transition) if transition.serial == serial => {
                    let params = (transition.style, transition.invert);
                    navigator.phase = Phase::Settling(transition);
                    params
                }
                phase => {
                    navigator.phase = phase;
                    tracing::debug!(serial, "ignoring stale transition tick");
                    return;
                }
            },
            None => return,
        };

        let directions = style.directions();
        let animated = style.is_animated();
        let (visible, hidden) = self.slot_elements(id);
        self.place(
            visible,
            if invert {
                directions.new_comes_from
            } else {
                directions.old_goes_to
            },
            animated,
        );
        self.place(hidden, Position::Center, animated);

        self.timeline.schedule(
            style.settle_delay(),
            Timer::Settle {
                navigator: id,
                serial,
            },
        );
    }

    fn transition_settle(&mut self, id: ViewId, serial: u64) {
        let (transition, old) = match self.navigators.get_mut(&id) {
            Some(navigator) => match mem::replace(&mut navigator.phase, Phase::Idle) {
                Phase::Settling(transition) if transition.serial == serial => {
                    navigator.visible_slot = 1 - navigator.visible_slot;
                    let old = navigator.visible_view.replace(transition.view);
                    (transition, old)
                }
                phase => {
                    navigator.phase = phase;
                    tracing::debug!(serial, "ignoring stale settle timer");
                    return;
                }
            },
            None => return,
        };

        if let Some(old) = old {
            self.fire(old, Hook::DidDisappear);
            if let Err(error) = self.set_parent(old, None) {
                tracing::warn!(view = %self.describe(old), error = %error, "could not detach hidden view");
            }
        }
        self.fire(transition.view, Hook::DidAppear);

        let (visible, _) = self.slot_elements(id);
        if let Some(visible) = visible {
            self.driver.flush_layout(self.document.as_mut(), visible);
        }

        if let Some(navigator) = self.navigators.get_mut(&id) {
            if transition.recorded {
                if let Some(entry) = navigator.history.last_mut() {
                    if !entry.track_history {
                        entry.view = None;
                    }
                }
            }
        }

        tracing::debug!(
            navigator = %self.describe(id),
            view = %self.describe(transition.view),
            "transition settled"
        );
        transition.completion.resolve(Ok(()));
        self.pump(id);
    }
}
