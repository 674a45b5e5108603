#![forbid(unsafe_code)]

//! Debounce and throttle wrappers over the [`Scheduler`].
//!
//! A [`Debounced`] action fires once after the input goes quiet for its
//! delay, with the arguments of the last call. A [`Throttled`] action fires
//! on the first call of a window and drops the rest.
//!
//! Both own at most one timer at a time: every debounce trigger cancels and
//! replaces the pending timer; a throttle window is governed by exactly one
//! timer and dropped calls are never queued.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::scheduler::{Scheduler, TimerId};

/// Errors raised when constructing timing wrappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    /// A delay or interval was negative.
    InvalidArgument { name: &'static str, value: i64 },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid argument `{name}`: {value} must not be negative")
            }
        }
    }
}

impl std::error::Error for TimingError {}

/// Result alias for timing operations.
pub type Result<T> = std::result::Result<T, TimingError>;

/// Convert a millisecond count into a [`Duration`], rejecting negatives.
pub fn delay_from_millis(name: &'static str, millis: i64) -> Result<Duration> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| TimingError::InvalidArgument {
            name,
            value: millis,
        })
}

type Action<A> = Rc<RefCell<dyn FnMut(A)>>;

struct DebounceSlot<A> {
    timer: Option<TimerId>,
    args: Option<A>,
}

/// Triggerable that collapses bursts of calls into one trailing invocation.
///
/// Clones share the same pending slot.
pub struct Debounced<A> {
    scheduler: Scheduler,
    delay: Duration,
    action: Action<A>,
    slot: Rc<RefCell<DebounceSlot<A>>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            delay: self.delay,
            action: Rc::clone(&self.action),
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<A: 'static> Debounced<A> {
    /// Wrap `action` with a trailing debounce of `delay`.
    pub fn new(scheduler: &Scheduler, delay: Duration, action: impl FnMut(A) + 'static) -> Self {
        Self {
            scheduler: scheduler.clone(),
            delay,
            action: Rc::new(RefCell::new(action)),
            slot: Rc::new(RefCell::new(DebounceSlot {
                timer: None,
                args: None,
            })),
        }
    }

    /// Record a call. Replaces the pending arguments and restarts the delay.
    pub fn trigger(&self, args: A) {
        let previous = {
            let mut slot = self.slot.borrow_mut();
            slot.args = Some(args);
            slot.timer.take()
        };
        if let Some(id) = previous {
            self.scheduler.cancel(id);
        }

        let slot = Rc::downgrade(&self.slot);
        let action = Rc::clone(&self.action);
        let id = self.scheduler.schedule(self.delay, move || {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let args = {
                let mut slot = slot.borrow_mut();
                slot.timer = None;
                slot.args.take()
            };
            if let Some(args) = args {
                (action.borrow_mut())(args);
            }
        });
        self.slot.borrow_mut().timer = Some(id);
    }

    /// Drop the pending call, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let (timer, had_args) = {
            let mut slot = self.slot.borrow_mut();
            (slot.timer.take(), slot.args.take().is_some())
        };
        if let Some(id) = timer {
            self.scheduler.cancel(id);
        }
        had_args
    }

    /// Fire the pending call immediately. Returns whether one was pending.
    pub fn flush(&self) -> bool {
        let (timer, args) = {
            let mut slot = self.slot.borrow_mut();
            (slot.timer.take(), slot.args.take())
        };
        if let Some(id) = timer {
            self.scheduler.cancel(id);
        }
        match args {
            Some(args) => {
                (self.action.borrow_mut())(args);
                true
            }
            None => false,
        }
    }

    /// Whether a call is waiting for the delay to elapse.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.borrow().timer.is_some()
    }

    /// Configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<A> fmt::Debug for Debounced<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("delay", &self.delay)
            .field("pending", &self.slot.borrow().timer.is_some())
            .finish()
    }
}

/// Triggerable that fires at most once per interval.
pub struct Throttled<A> {
    scheduler: Scheduler,
    interval: Duration,
    action: Action<A>,
    window: Rc<RefCell<Option<TimerId>>>,
}

impl<A> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            interval: self.interval,
            action: Rc::clone(&self.action),
            window: Rc::clone(&self.window),
        }
    }
}

impl<A: 'static> Throttled<A> {
    /// Wrap `action` with a leading-edge throttle of `interval`.
    pub fn new(scheduler: &Scheduler, interval: Duration, action: impl FnMut(A) + 'static) -> Self {
        Self {
            scheduler: scheduler.clone(),
            interval,
            action: Rc::new(RefCell::new(action)),
            window: Rc::new(RefCell::new(None)),
        }
    }

    /// Fire `action` unless a window is open. Returns whether it fired.
    pub fn trigger(&self, args: A) -> bool {
        if self.window.borrow().is_some() {
            return false;
        }

        let window = Rc::downgrade(&self.window);
        let id = self.scheduler.schedule(self.interval, move || {
            if let Some(window) = window.upgrade() {
                *window.borrow_mut() = None;
            }
        });
        *self.window.borrow_mut() = Some(id);

        (self.action.borrow_mut())(args);
        true
    }

    /// Whether a throttle window is currently open.
    #[must_use]
    pub fn in_window(&self) -> bool {
        self.window.borrow().is_some()
    }
}

impl<A> fmt::Debug for Throttled<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("interval", &self.interval)
            .field("in_window", &self.window.borrow().is_some())
            .finish()
    }
}

/// Build a [`Debounced`] from a millisecond delay.
///
/// # Errors
///
/// Returns [`TimingError::InvalidArgument`] if `delay_ms` is negative.
pub fn debounce<A: 'static>(
    scheduler: &Scheduler,
    delay_ms: i64,
    action: impl FnMut(A) + 'static,
) -> Result<Debounced<A>> {
    let delay = delay_from_millis("delay_ms", delay_ms)?;
    Ok(Debounced::new(scheduler, delay, action))
}

/// Build a [`Throttled`] from a millisecond interval.
///
/// # Errors
///
/// Returns [`TimingError::InvalidArgument`] if `interval_ms` is negative.
pub fn throttle<A: 'static>(
    scheduler: &Scheduler,
    interval_ms: i64,
    action: impl FnMut(A) + 'static,
) -> Result<Throttled<A>> {
    let interval = delay_from_millis("interval_ms", interval_ms)?;
    Ok(Throttled::new(scheduler, interval, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn capture() -> (Rc<RefCell<Vec<u32>>>, impl FnMut(u32) + 'static) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        (calls, move |v| sink.borrow_mut().push(v))
    }

    #[test]
    fn debounce_burst_fires_once_with_last_args() {
        let scheduler = Scheduler::new();
        let (calls, action) = capture();
        let debounced = debounce(&scheduler, 100, action).unwrap();

        for i in 1..=5 {
            debounced.trigger(i);
            scheduler.advance(Duration::from_millis(10));
        }
        assert!(calls.borrow().is_empty());
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*calls.borrow(), vec![5]);
        assert!(!debounced.is_pending());
    }

    #[test]
    fn debounce_rejects_negative_delay() {
        let scheduler = Scheduler::new();
        let err = debounce::<()>(&scheduler, -1, |()| {}).unwrap_err();
        assert_eq!(
            err,
            TimingError::InvalidArgument {
                name: "delay_ms",
                value: -1
            }
        );
        assert!(throttle::<()>(&scheduler, -5, |()| {}).is_err());
    }

    #[test]
    fn debounce_flush_and_cancel() {
        let scheduler = Scheduler::new();
        let (calls, action) = capture();
        let debounced = debounce(&scheduler, 50, action).unwrap();

        debounced.trigger(1);
        assert!(debounced.flush());
        assert_eq!(*calls.borrow(), vec![1]);
        assert_eq!(scheduler.pending(), 0);
        assert!(!debounced.flush());

        debounced.trigger(2);
        assert!(debounced.cancel());
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*calls.borrow(), vec![1]);
    }

    #[test]
    fn throttle_fires_leading_and_drops_rest() {
        let scheduler = Scheduler::new();
        let (calls, action) = capture();
        let throttled = throttle(&scheduler, 100, action).unwrap();

        assert!(throttled.trigger(1));
        assert!(!throttled.trigger(2));
        scheduler.advance(Duration::from_millis(50));
        assert!(!throttled.trigger(3));
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(50));
        assert!(!throttled.in_window());
        assert!(throttled.trigger(4));
        assert_eq!(*calls.borrow(), vec![1, 4]);
    }

    proptest! {
        #[test]
        fn debounce_fires_last_value_of_each_quiet_gap(
            gaps in proptest::collection::vec(0u64..250, 1..40),
        ) {
            let delay = 100u64;
            let scheduler = Scheduler::new();
            let (calls, action) = capture();
            let debounced = debounce(&scheduler, delay as i64, action).unwrap();

            let mut expected = Vec::new();
            for (i, gap) in gaps.iter().enumerate() {
                debounced.trigger(i as u32);
                if *gap >= delay {
                    expected.push(i as u32);
                }
                scheduler.advance(Duration::from_millis(*gap));
            }
            scheduler.run_until_idle();
            if gaps.last().is_some_and(|gap| *gap < delay) {
                expected.push((gaps.len() - 1) as u32);
            }

            prop_assert_eq!(&*calls.borrow(), &expected);
            prop_assert!(scheduler.pending() == 0);
        }
    }
}
