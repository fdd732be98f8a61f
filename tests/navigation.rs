mod common;

use common::{recorder, take_log, Log, RecordingDriver, Step};
use std::sync::Arc;
use std::time::Duration;
use viewy::dom::MemoryDocument;
use viewy::driver::Position;
use viewy::loader::StaticLoader;
use viewy::navigation::{ANIMATED_SETTLE_DELAY, DEFAULT_SLOTS};
use viewy::{
    LoadState, NavigationConfig, ShowRequest, TransitionPhase, TransitionStyle, ViewConfig,
    ViewError, ViewId, ViewTree,
};

const NAV_MARKUP: &str = r#"<div class="stage">
    <div data-view-container="contentViewContainer_1"></div>
    <div data-view-container="contentViewContainer_2"></div>
</div>"#;

struct Fixture {
    tree: ViewTree,
    driver: RecordingDriver,
    log: Log,
    nav: ViewId,
    home: ViewId,
}

impl Fixture {
    fn view(&mut self, name: &str) -> ViewId {
        self.tree
            .create(ViewConfig::new(name, name).with_view(recorder(&self.log)))
    }

    fn show(&mut self, view: ViewId, style: TransitionStyle) -> viewy::Completion {
        self.tree
            .show(self.nav, ShowRequest::new(view).style(style))
            .unwrap()
    }
}

fn slot(index: usize) -> String {
    DEFAULT_SLOTS[index].to_string()
}

fn fixture() -> Fixture {
    let mut loader = StaticLoader::new().with_bundle("nav", NAV_MARKUP);
    for name in &["home", "b", "c", "d"] {
        loader.insert(name, &format!("<p>{}</p>", name));
    }
    let driver = RecordingDriver::default();
    let mut tree = ViewTree::with_driver(
        MemoryDocument::from_markup(r#"<div data-view-name="nav"></div>"#).unwrap(),
        loader,
        driver.clone(),
    );
    let log: Log = Arc::default();

    let home = tree.create(ViewConfig::new("home", "home").with_view(recorder(&log)));
    let nav = tree
        .create_navigation(NavigationConfig::new("nav", "nav", home))
        .unwrap();
    tree.set_as_root(nav).unwrap();
    tree.run_until_idle();

    Fixture {
        tree,
        driver,
        log,
        nav,
        home,
    }
}

#[test]
fn root_view_is_shown_without_animation() {
    let mut f = fixture();

    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(f.tree.parent(f.home).unwrap(), Some(f.nav));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    assert!(f.tree.is_idle(f.nav).unwrap());
    assert!(!f.tree.can_go_back(f.nav).unwrap());
    assert_eq!(f.tree.now(), Duration::from_millis(0), "no settle delay without animation");
    assert_eq!(
        take_log(&f.log),
        vec![
            "home:children_will_load",
            "home:did_load",
            "home:will_appear",
            "home:did_appear",
        ]
    );
    assert_eq!(
        f.driver.take(),
        vec![
            Step::Place(slot(0), Position::Center, false),
            Step::Place(slot(1), Position::Back, false),
            Step::Place(slot(0), Position::Back, false),
            Step::Place(slot(1), Position::Center, false),
            Step::Flush(slot(1)),
        ]
    );
}

#[test]
fn transitions_run_one_at_a_time() {
    let mut f = fixture();
    let b = f.view("b");
    let c = f.view("c");
    take_log(&f.log);
    f.driver.take();

    let shown_b = f.show(b, TransitionStyle::FromRight);
    let shown_c = f.show(c, TransitionStyle::FromLeft);
    assert_eq!(f.tree.transition_phase(f.nav).unwrap(), TransitionPhase::Entering);
    assert_eq!(f.tree.load_state(b).unwrap(), LoadState::Fetching);
    assert_eq!(f.tree.parent(c).unwrap(), None, "c waits for b");

    f.tree.poll();
    assert_eq!(f.tree.transition_phase(f.nav).unwrap(), TransitionPhase::Settling);
    f.tree.advance(ANIMATED_SETTLE_DELAY - Duration::from_millis(1));
    assert!(!shown_b.is_resolved());
    assert_eq!(f.tree.load_state(c).unwrap(), LoadState::Unloaded);

    f.tree.advance(Duration::from_millis(1));
    assert_eq!(shown_b.result(), Some(Ok(())));
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(b));
    assert_eq!(f.tree.parent(f.home).unwrap(), None, "the old view is detached");
    assert!(!f.tree.is_loaded(f.home).unwrap());
    assert_eq!(
        f.tree.transition_phase(f.nav).unwrap(),
        TransitionPhase::Settling,
        "c started as soon as b settled"
    );

    f.tree.run_until_idle();
    assert_eq!(shown_c.result(), Some(Ok(())));
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(c));
    assert_eq!(f.tree.now(), ANIMATED_SETTLE_DELAY * 2);

    assert_eq!(
        f.driver.take(),
        vec![
            // b comes in from the right into slot 0
            Step::Place(slot(1), Position::Center, false),
            Step::Place(slot(0), Position::Right, false),
            Step::Place(slot(1), Position::Left, true),
            Step::Place(slot(0), Position::Center, true),
            Step::Flush(slot(0)),
            // then c from the left into slot 1
            Step::Place(slot(0), Position::Center, false),
            Step::Place(slot(1), Position::Left, false),
            Step::Place(slot(0), Position::Right, true),
            Step::Place(slot(1), Position::Center, true),
            Step::Flush(slot(1)),
        ]
    );

    let log = take_log(&f.log);
    let first_b_transition: Vec<_> = log.iter().take(7).map(String::as_str).collect();
    assert_eq!(
        first_b_transition,
        vec![
            "b:children_will_load",
            "b:did_load",
            "home:will_disappear",
            "b:will_appear",
            "home:did_disappear",
            "home:will_unload",
            "b:did_appear",
        ]
    );
}

#[test]
fn back_replays_the_style_inverted() {
    let mut f = fixture();
    let b = f.view("b");
    f.show(b, TransitionStyle::FromRight);
    f.tree.run_until_idle();
    assert!(f.tree.can_go_back(f.nav).unwrap());
    f.driver.take();

    let back = f.tree.back(f.nav).unwrap();
    f.tree.run_until_idle();

    assert_eq!(back.result(), Some(Ok(())));
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    assert!(!f.tree.can_go_back(f.nav).unwrap());
    assert_eq!(
        f.driver.take(),
        vec![
            Step::Place(slot(0), Position::Center, false),
            Step::Place(slot(1), Position::Left, false),
            Step::Place(slot(0), Position::Right, true),
            Step::Place(slot(1), Position::Center, true),
            Step::Flush(slot(1)),
        ]
    );
}

#[test]
fn back_from_the_root_view_does_nothing() {
    let mut f = fixture();
    let back = f.tree.back(f.nav).unwrap();

    assert_eq!(back.result(), Some(Ok(())));
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    assert!(f.tree.is_idle(f.nav).unwrap());
}

#[test]
fn back_skips_untracked_views() {
    let mut f = fixture();
    let b = f.view("b");
    let c = f.view("c");

    f.tree
        .show(
            f.nav,
            ShowRequest::new(b)
                .style(TransitionStyle::FromBelow)
                .track_history(false),
        )
        .unwrap();
    f.show(c, TransitionStyle::FromRight);
    f.tree.run_until_idle();

    let history = f.tree.history(f.nav).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].view, None, "untracked entries forget their view");
    assert_eq!(history[1].style, TransitionStyle::FromBelow);

    f.driver.take();
    f.tree.back(f.nav).unwrap();
    f.tree.run_until_idle();

    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    // the style of the last discarded entry is replayed
    let steps = f.driver.take();
    assert_eq!(steps[1], Step::Place(slot(0), Position::Over, false));
}

#[test]
fn untracked_show_then_back() {
    let mut f = fixture();
    let a = f.view("b");
    f.tree
        .show(f.nav, ShowRequest::new(a).track_history(false))
        .unwrap();
    f.tree.run_until_idle();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(a));
    assert!(f.tree.can_go_back(f.nav).unwrap());

    f.tree.back(f.nav).unwrap();
    f.tree.run_until_idle();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
}

#[test]
fn purge_history_forgets_earlier_views() {
    let mut f = fixture();
    let b = f.view("b");
    f.tree
        .show(f.nav, ShowRequest::new(b).purge_history(true))
        .unwrap();
    f.tree.run_until_idle();

    let history = f.tree.history(f.nav).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].view, Some(b));
    assert!(!f.tree.can_go_back(f.nav).unwrap());
}

#[test]
fn if_idle_requests_are_dropped_while_busy() {
    let mut f = fixture();
    let b = f.view("b");
    let c = f.view("c");

    assert!(f
        .tree
        .show_if_idle(f.nav, ShowRequest::new(b))
        .unwrap()
        .is_some());
    assert!(f
        .tree
        .show_if_idle(f.nav, ShowRequest::new(c))
        .unwrap()
        .is_none());
    assert!(f.tree.back_if_idle(f.nav).unwrap().is_none());

    f.tree.run_until_idle();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(b));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 2);
    assert!(f.tree.back_if_idle(f.nav).unwrap().is_some());
}

#[test]
fn showing_the_visible_view_is_a_no_op() {
    let mut f = fixture();
    f.driver.take();

    let shown = f.show(f.home, TransitionStyle::FromRight);
    assert_eq!(shown.result(), Some(Ok(())));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    assert!(f.driver.take().is_empty());
}

#[test]
fn show_errors() {
    let mut f = fixture();
    let gone = f.view("d");
    f.tree.destroy(gone).unwrap();

    assert_eq!(
        f.tree.show(f.nav, ShowRequest::new(gone)).unwrap_err(),
        ViewError::MissingView { view: gone }
    );
    assert!(matches!(
        f.tree.show(f.home, ShowRequest::new(f.home)),
        Err(ViewError::NotANavigator { .. })
    ));
    assert!(matches!(
        ShowRequest::new(f.home).style_named("diagonal"),
        Err(ViewError::UnknownTransitionStyle { .. })
    ));
}

#[test]
fn failed_view_load_fails_the_transition() {
    let mut f = fixture();
    let broken = f
        .tree
        .create(ViewConfig::new("broken", "missing-bundle"));
    let b = f.view("b");

    let failed = f.show(broken, TransitionStyle::FromRight);
    let next = f.show(b, TransitionStyle::FromRight);
    f.tree.run_until_idle();

    assert!(matches!(
        failed.result(),
        Some(Err(ViewError::BundleFetch { .. }))
    ));
    assert_eq!(f.tree.parent(broken).unwrap(), None);
    assert_eq!(next.result(), Some(Ok(())), "the queue keeps going");
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(b));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 2);
}

#[test]
fn hooks_before_child_appears() {
    let mut f = fixture();
    let b = f.view("b");
    let seen: Log = Arc::default();
    let sink = Arc::clone(&seen);
    f.tree
        .on_before_child_will_appear(f.nav)
        .unwrap()
        .subscribe(move |context| sink.lock().push(context.name.clone()));

    f.show(b, TransitionStyle::Splash);
    f.tree.run_until_idle();
    assert_eq!(take_log(&seen), vec!["b"]);
    assert_eq!(f.tree.now(), ANIMATED_SETTLE_DELAY, "splash still waits for the settle delay");
}

#[test]
fn reloading_the_navigation_view_restores_the_visible_view() {
    let mut f = fixture();
    take_log(&f.log);

    f.tree.unload(f.nav).unwrap();
    assert!(!f.tree.is_idle(f.nav).unwrap());
    f.tree.load(f.nav).unwrap();
    f.tree.run_until_idle();

    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(
        take_log(&f.log),
        vec![
            "home:will_unload",
            "home:children_will_load",
            "home:did_load",
            "home:will_appear",
            "home:did_appear",
        ]
    );
}

#[test]
fn scoped_query_on_the_navigator_stays_out_of_shown_views() {
    let f = fixture();

    assert!(f.tree.scoped_query(f.nav, Some("p")).unwrap().is_empty());
    let slots = f
        .tree
        .scoped_query(f.nav, Some("[data-view-container]"))
        .unwrap();
    assert_eq!(slots.len(), 2, "the slots themselves still belong to the navigator");

    let own = f.tree.scoped_query(f.home, Some("p")).unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(f.tree.document().inner_markup(own[0]), "home");
}

#[test]
fn unloading_mid_transition_abandons_it() {
    let mut f = fixture();
    let b = f.view("b");

    let shown = f.show(b, TransitionStyle::FromRight);
    f.tree.poll();
    assert_eq!(f.tree.transition_phase(f.nav).unwrap(), TransitionPhase::Settling);
    take_log(&f.log);

    f.tree.unload(f.nav).unwrap();
    assert!(matches!(
        shown.result(),
        Some(Err(ViewError::TransitionAbandoned { .. }))
    ));
    assert_eq!(f.tree.transition_phase(f.nav).unwrap(), TransitionPhase::Idle);
    assert_eq!(f.tree.parent(b).unwrap(), None);
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);

    // the settle timer finds nothing to settle
    f.tree.run_until_idle();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(take_log(&f.log), vec!["b:will_unload", "home:will_unload"]);

    f.tree.load(f.nav).unwrap();
    f.tree.run_until_idle();
    assert!(f.tree.is_idle(f.nav).unwrap());
    assert!(f.tree.is_loaded(f.home).unwrap());
    assert!(!f.tree.is_loaded(b).unwrap());
}

#[test]
fn destroyed_views_leave_the_navigator() {
    let mut f = fixture();
    let b = f.view("b");
    let c = f.view("c");

    f.show(b, TransitionStyle::FromRight);
    f.tree.run_until_idle();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(b));

    f.tree.destroy(b).unwrap();
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), None);
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 1);
    assert!(!f.tree.can_go_back(f.nav).unwrap());

    // destroyed while entering
    let shown = f.show(c, TransitionStyle::FromRight);
    f.tree.destroy(c).unwrap();
    assert_eq!(shown.result(), Some(Err(ViewError::UnknownView { view: c })));
    assert!(f.tree.is_idle(f.nav).unwrap());
    f.tree.run_until_idle();

    let back_home = f.show(f.home, TransitionStyle::FromLeft);
    f.tree.run_until_idle();
    assert_eq!(back_home.result(), Some(Ok(())));
    assert_eq!(f.tree.visible_view(f.nav).unwrap(), Some(f.home));
    assert_eq!(f.tree.history(f.nav).unwrap().len(), 2);
}
