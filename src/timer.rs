use std::collections::BTreeMap;
use std::time::Duration;

/// Virtual time and the tasks scheduled on it.
///
/// Tasks due at the same instant run in scheduling order.
#[derive(Debug)]
pub(crate) struct Timeline<T> {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), T>,
}

impl<T> Timeline<T> {
    pub fn new() -> Timeline<T> {
        Timeline {
            now: Duration::from_millis(0),
            next_seq: 0,
            queue: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((self.now + delay, seq), task);
    }

    /// Removes the earliest task that is due.
    pub fn pop_due(&mut self) -> Option<T> {
        let key = *self.queue.keys().next()?;
        if key.0 > self.now {
            return None;
        }
        self.queue.remove(&key)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Moves time forward. Time never goes backwards.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[test]
fn test_timeline_order() {
    let mut timeline = Timeline::new();
    timeline.schedule(Duration::from_millis(400), "settle");
    timeline.schedule(Duration::from_millis(0), "tick");
    timeline.schedule(Duration::from_millis(0), "tick 2");

    assert_eq!(timeline.pop_due(), Some("tick"));
    assert_eq!(timeline.pop_due(), Some("tick 2"));
    assert_eq!(timeline.pop_due(), None, "settle is not due yet");
    assert_eq!(timeline.next_deadline(), Some(Duration::from_millis(400)));

    timeline.set_now(Duration::from_millis(400));
    assert_eq!(timeline.pop_due(), Some("settle"));
    assert!(timeline.is_empty());
}
