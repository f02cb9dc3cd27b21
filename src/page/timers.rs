use std::cell::{Cell, RefCell};
use std::time::Duration;

use tokio::time::Instant;

/// Identifies a pending page timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u32);

struct TimerEntry {
    id: TimerId,
    due: Instant,
    callback: Box<dyn FnOnce()>,
}

/// One-shot timers owned by a page. Nothing fires on its own: the host drains
/// due timers with [`TimerQueue::take_due`] between event dispatches.
pub(crate) struct TimerQueue {
    next_id: Cell<u32>,
    timers: RefCell<Vec<TimerEntry>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            timers: RefCell::new(Vec::new()),
        }
    }

    fn next_id(&self) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));
        TimerId(id)
    }

    pub fn register(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_id();
        let entry = TimerEntry {
            id,
            due: Instant::now() + delay,
            callback,
        };
        self.timers.borrow_mut().push(entry);
        id
    }

    pub fn clear(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|entry| entry.id != id);
        timers.len() != before
    }

    pub fn clear_all(&self) {
        self.timers.borrow_mut().clear();
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.borrow().iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.borrow().iter().map(|entry| entry.due).min()
    }

    /// Removes every timer due at `now`, earliest first. Callbacks are handed
    /// back so they run without the queue borrowed.
    pub fn take_due(&self, now: Instant) -> Vec<Box<dyn FnOnce()>> {
        let mut timers = self.timers.borrow_mut();
        let mut due = Vec::new();
        let mut index = 0;
        while index < timers.len() {
            if timers[index].due <= now {
                due.push(timers.remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|entry| (entry.due, entry.id.0));
        due.into_iter().map(|entry| entry.callback).collect()
    }
}
