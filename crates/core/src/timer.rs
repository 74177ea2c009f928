//! Single-threaded timer schedule for the event loop
//!
//! Packet handlers never block: work that must happen later (a delayed
//! effect, a periodic announce) is scheduled here and fired by the event
//! loop on a future tick. Cancellation by [`TimerId`] is the only
//! async-like cancellation semantic in the dispatch core.
//!
//! The queue is owned by the event-loop task and is not shared across
//! threads; callbacks must be `Send` only because the owning task may be
//! scheduled on any runtime worker.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Handle for a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

type TimerCallback = Box<dyn FnOnce() + Send>;

/// Min-heap timer schedule.
///
/// `cancel` removes the callback immediately; the heap entry is dropped
/// lazily when its deadline pops. Expired-but-cancelled entries therefore
/// cost one heap pop and nothing else.
pub struct TimerQueue {
    next_id: u64,
    deadlines: BinaryHeap<Reverse<(Instant, TimerId)>>,
    callbacks: HashMap<TimerId, TimerCallback>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            deadlines: BinaryHeap::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Schedule `callback` to fire `delay` from now.
    pub fn schedule<F>(&mut self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.deadlines.push(Reverse((Instant::now() + delay, id)));
        self.callbacks.insert(id, Box::new(callback));
        id
    }

    /// Cancel a scheduled timer.
    ///
    /// Returns `true` if the timer was still pending, `false` if it had
    /// already fired or been cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.callbacks.remove(&id).is_some()
    }

    /// Fire every timer whose deadline is at or before `now`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if deadline > now {
                break;
            }
            self.deadlines.pop();
            if let Some(callback) = self.callbacks.remove(&id) {
                callback();
                fired += 1;
            }
        }
        fired
    }

    /// Deadline of the earliest pending (non-cancelled) timer.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id))) = self.deadlines.peek().copied() {
            if self.callbacks.contains_key(&id) {
                return Some(deadline);
            }
            // cancelled entry, drop it
            self.deadlines.pop();
        }
        None
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_due_timers_fire_in_order() {
        let mut queue = TimerQueue::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let log_a = log.clone();
        queue.schedule(Duration::from_millis(0), move || log_a.lock().push("a"));
        let log_b = log.clone();
        queue.schedule(Duration::from_millis(1), move || log_b.lock().push("b"));

        let fired = queue.run_due(Instant::now() + Duration::from_secs(1));
        assert_eq!(fired, 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_future_timers_do_not_fire() {
        let mut queue = TimerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        queue.schedule(Duration::from_secs(60), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(queue.run_due(Instant::now()), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut queue = TimerQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let id = queue.schedule(Duration::from_millis(0), move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.run_due(Instant::now() + Duration::from_secs(1)), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let mut queue = TimerQueue::new();
        let early = queue.schedule(Duration::from_millis(1), || {});
        queue.schedule(Duration::from_secs(10), || {});

        queue.cancel(early);
        let deadline = queue.next_deadline().unwrap();
        assert!(deadline > Instant::now() + Duration::from_secs(5));
    }
}
