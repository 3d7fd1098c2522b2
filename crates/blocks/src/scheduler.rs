//! Deferred tasks against a controllable clock.
//!
//! Focus moves are not applied in the same turn as the edit that requested
//! them; they are queued for a short delay and run by the owner's `tick`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

struct Task<T> {
    id: TaskId,
    due: Duration,
    payload: T,
}

/// Tasks come out of [`DeferredQueue::take_due`] by due time, then by the order
/// they were scheduled in.
pub struct DeferredQueue<T> {
    tasks: Vec<Task<T>>,
    next_id: u64,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, payload: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Task { id, due, payload });
        id
    }

    /// Returns false when the task already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        self.tasks.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }

    pub fn take_due(&mut self, now: Duration) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.due <= now);
        self.tasks = pending;
        due.sort_by_key(|task| (task.due, task.id));
        due.into_iter().map(|task| task.payload).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.iter().map(|task| task.due).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_tasks_run_in_time_then_insertion_order() {
        let mut queue = DeferredQueue::new();
        queue.schedule(Duration::from_millis(20), "late");
        queue.schedule(Duration::from_millis(10), "first");
        queue.schedule(Duration::from_millis(10), "second");

        assert!(queue.take_due(Duration::from_millis(5)).is_empty());
        assert_eq!(
            queue.take_due(Duration::from_millis(10)),
            vec!["first", "second"]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_due(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let mut queue = DeferredQueue::new();
        let id = queue.schedule(Duration::ZERO, 1);
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(queue.take_due(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn virtual_clock_clones_share_time() {
        let clock = VirtualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(7));
        assert_eq!(other.now(), Duration::from_millis(7));
    }
}
