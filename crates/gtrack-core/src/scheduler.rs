#![forbid(unsafe_code)]

//! Single-threaded virtual-time timer queue.
//!
//! The [`Scheduler`] is the engine's event-loop stand-in. Timers are
//! registered with a delay relative to the current virtual time and fire when
//! the clock is advanced past their deadline. Tests drive the clock with
//! [`Scheduler::advance`]; a live embedding pumps it from a wall clock through
//! [`RealtimeDriver`].
//!
//! # Design Invariants
//!
//! 1. **Deterministic order**: due timers fire by `(deadline, registration order)`.
//! 2. **Re-entrancy**: no internal borrow is held while a callback runs, so a
//!    callback may schedule or cancel timers (including on itself).
//! 3. **Monotonic clock**: `now()` never moves backwards.
//! 4. **Containment**: with a [`FaultBoundary`] installed, a panicking
//!    callback is reported and the remaining timers still fire.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::fault::FaultBoundary;

/// Upper bound on callbacks executed by [`Scheduler::run_until_idle`].
pub const IDLE_CALLBACK_LIMIT: usize = 10_000;

/// Opaque handle to a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type Callback = Box<dyn FnOnce()>;

struct SchedulerInner {
    now: Duration,
    next_id: u64,
    /// Pending callbacks ordered by (deadline, id).
    queue: BTreeMap<(Duration, u64), Callback>,
    /// Reverse index for cancellation.
    deadlines: HashMap<u64, Duration>,
    boundary: Option<FaultBoundary>,
    fired: u64,
}

/// Shared handle to the virtual-time timer queue.
///
/// Cloning an `Scheduler` yields another handle to the **same** queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an empty scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                now: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
                boundary: None,
                fired: 0,
            })),
        }
    }

    /// Route callback panics through `boundary`.
    pub fn set_fault_boundary(&self, boundary: FaultBoundary) {
        self.inner.borrow_mut().boundary = Some(boundary);
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Register `callback` to run once `delay` has elapsed.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let deadline = inner.now.saturating_add(delay);
        inner.queue.insert((deadline, id), Box::new(callback));
        inner.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.deadlines.remove(&id.0) {
            Some(deadline) => inner.queue.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    /// Whether `id` is still waiting to fire.
    #[must_use]
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.inner.borrow().deadlines.contains_key(&id.0)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.borrow().queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Total callbacks fired since creation.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.inner.borrow().fired
    }

    /// Advance virtual time by `delta`, firing every timer that falls due.
    ///
    /// Returns the number of callbacks executed.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.now().saturating_add(delta);
        self.run_until(target, usize::MAX)
    }

    /// Advance virtual time to the absolute instant `target`.
    ///
    /// A target in the past fires nothing and leaves the clock unchanged.
    pub fn advance_to(&self, target: Duration) -> usize {
        if target < self.now() {
            return 0;
        }
        self.run_until(target, usize::MAX)
    }

    /// Fire timers until the queue is empty.
    ///
    /// Stops after [`IDLE_CALLBACK_LIMIT`] callbacks so self-rescheduling
    /// timers cannot spin forever.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        while let Some(deadline) = self.next_deadline() {
            if total >= IDLE_CALLBACK_LIMIT {
                tracing::warn!(
                    pending = self.pending(),
                    "scheduler did not go idle within the callback limit"
                );
                break;
            }
            total += self.run_until(deadline, IDLE_CALLBACK_LIMIT - total);
        }
        total
    }

    fn run_until(&self, target: Duration, budget: usize) -> usize {
        let mut executed = 0;
        while executed < budget {
            let (callback, boundary) = {
                let mut inner = self.inner.borrow_mut();
                let key = match inner.queue.keys().next() {
                    Some(&key) if key.0 <= target => key,
                    _ => break,
                };
                let Some(callback) = inner.queue.remove(&key) else {
                    break;
                };
                inner.deadlines.remove(&key.1);
                inner.now = key.0;
                inner.fired += 1;
                (callback, inner.boundary.clone())
            };

            match boundary {
                Some(boundary) => {
                    boundary.guard("timer", callback);
                }
                None => callback(),
            }
            executed += 1;
        }

        let mut inner = self.inner.borrow_mut();
        if executed < budget && inner.now < target {
            inner.now = target;
        }
        executed
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .field("fired", &inner.fired)
            .finish()
    }
}

/// Pumps a [`Scheduler`] from the wall clock.
///
/// Virtual time zero corresponds to the moment the driver was created.
#[derive(Debug, Clone)]
pub struct RealtimeDriver {
    scheduler: Scheduler,
    origin: Instant,
}

impl RealtimeDriver {
    /// Start driving `scheduler` from now.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            origin: Instant::now(),
        }
    }

    /// Fire every timer that is due according to the wall clock.
    pub fn pump(&self) -> usize {
        self.scheduler.advance_to(self.origin.elapsed())
    }

    /// How long the host may sleep before the next timer falls due.
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(self.origin.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, Scheduler) {
        (Rc::new(RefCell::new(Vec::new())), Scheduler::new())
    }

    #[test]
    fn fires_in_deadline_then_registration_order() {
        let (log, scheduler) = recorder();
        for (delay, label) in [(30, "c"), (10, "a"), (10, "b")] {
            let log = Rc::clone(&log);
            scheduler.schedule(Duration::from_millis(delay), move || log.borrow_mut().push(label));
        }

        assert_eq!(scheduler.advance(Duration::from_millis(10)), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(10));

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_millis(110));
    }

    #[test]
    fn cancel_prevents_firing() {
        let (log, scheduler) = recorder();
        let sink = Rc::clone(&log);
        let id = scheduler.schedule(Duration::from_millis(5), move || sink.borrow_mut().push("x"));
        assert!(scheduler.is_scheduled(id));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        scheduler.advance(Duration::from_millis(10));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn callbacks_can_reschedule() {
        let (log, scheduler) = recorder();
        let inner_log = Rc::clone(&log);
        let handle = scheduler.clone();
        scheduler.schedule(Duration::from_millis(10), move || {
            inner_log.borrow_mut().push("outer");
            let nested = Rc::clone(&inner_log);
            handle.schedule(Duration::from_millis(10), move || nested.borrow_mut().push("inner"));
        });

        scheduler.advance(Duration::from_millis(15));
        assert_eq!(*log.borrow(), vec!["outer"]);
        scheduler.advance(Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn nested_timer_due_within_same_advance_fires() {
        let (log, scheduler) = recorder();
        let inner_log = Rc::clone(&log);
        let handle = scheduler.clone();
        scheduler.schedule(Duration::from_millis(10), move || {
            let nested = Rc::clone(&inner_log);
            handle.schedule(Duration::ZERO, move || nested.borrow_mut().push("zero-delay"));
        });
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec!["zero-delay"]);
    }

    #[test]
    fn advance_to_past_is_noop() {
        let scheduler = Scheduler::new();
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(scheduler.advance_to(Duration::from_millis(10)), 0);
        assert_eq!(scheduler.now(), Duration::from_millis(50));
    }

    #[test]
    fn run_until_idle_drains_queue() {
        let (log, scheduler) = recorder();
        let sink = Rc::clone(&log);
        scheduler.schedule(Duration::from_secs(30), move || sink.borrow_mut().push("late"));
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.now(), Duration::from_secs(30));
    }

    #[test]
    fn run_until_idle_stops_self_rescheduling_timers() {
        fn tick(scheduler: Scheduler) {
            let next = scheduler.clone();
            scheduler.schedule(Duration::from_millis(1), move || tick(next));
        }
        let scheduler = Scheduler::new();
        tick(scheduler.clone());
        assert_eq!(scheduler.run_until_idle(), IDLE_CALLBACK_LIMIT);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn panicking_callback_is_contained() {
        let (log, scheduler) = recorder();
        let boundary = FaultBoundary::logging_only();
        scheduler.set_fault_boundary(boundary.clone());

        scheduler.schedule(Duration::from_millis(1), || panic!("timer exploded"));
        let sink = Rc::clone(&log);
        scheduler.schedule(Duration::from_millis(2), move || sink.borrow_mut().push("after"));

        scheduler.advance(Duration::from_millis(5));
        assert_eq!(boundary.fault_count(), 1);
        assert_eq!(*log.borrow(), vec!["after"]);
    }
}
