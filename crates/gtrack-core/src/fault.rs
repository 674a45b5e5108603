#![forbid(unsafe_code)]

//! Top-level fault containment.
//!
//! Any panic raised by an event handler or a timer callback is caught here,
//! logged, and reported to a hook (the page shows a generic error
//! notification). The page keeps running afterwards.
//!
//! # Failure Modes
//!
//! | Scenario | Behavior |
//! |----------|----------|
//! | Handler panics with `&str` / `String` | Message captured verbatim |
//! | Handler panics with another payload | Message is `"unknown panic"` |
//! | Hook itself panics | Propagates; hooks must not panic |

use std::cell::Cell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

/// A fault captured from a panicking handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Where the fault happened (e.g. `"timer"`, `"dispatch:submit"`).
    pub context: String,
    /// Message extracted from the panic payload.
    pub message: String,
}

impl Fault {
    fn from_panic(payload: Box<dyn std::any::Any + Send>, context: &str) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self {
            context: context.to_string(),
            message,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled fault in {}: {}", self.context, self.message)
    }
}

impl std::error::Error for Fault {}

/// Run `f`, converting a panic into a [`Fault`].
pub fn catch_fault<R>(context: &str, f: impl FnOnce() -> R) -> Result<R, Fault> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Fault::from_panic(payload, context))
}

/// Callback invoked for every caught fault.
pub type FaultHook = Rc<dyn Fn(&Fault)>;

/// Shared boundary that contains panics and forwards them to a hook.
///
/// Cloning shares the hook and the fault counter.
#[derive(Clone, Default)]
pub struct FaultBoundary {
    hook: Option<FaultHook>,
    faults: Rc<Cell<u64>>,
}

impl FaultBoundary {
    /// Create a boundary reporting to `hook`.
    pub fn new(hook: impl Fn(&Fault) + 'static) -> Self {
        Self {
            hook: Some(Rc::new(hook)),
            faults: Rc::new(Cell::new(0)),
        }
    }

    /// Create a boundary that only logs.
    #[must_use]
    pub fn logging_only() -> Self {
        Self::default()
    }

    /// Run `f` inside the boundary. Returns `None` if it panicked.
    pub fn guard<R>(&self, context: &str, f: impl FnOnce() -> R) -> Option<R> {
        match catch_fault(context, f) {
            Ok(value) => Some(value),
            Err(fault) => {
                self.faults.set(self.faults.get() + 1);
                tracing::error!(context = %fault.context, reason = %fault.message, "caught unhandled fault");
                if let Some(hook) = &self.hook {
                    hook(&fault);
                }
                None
            }
        }
    }

    /// Number of faults caught so far.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.get()
    }
}

impl fmt::Debug for FaultBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultBoundary")
            .field("has_hook", &self.hook.is_some())
            .field("faults", &self.faults.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn guard_passes_through_values() {
        let boundary = FaultBoundary::logging_only();
        assert_eq!(boundary.guard("test", || 7), Some(7));
        assert_eq!(boundary.fault_count(), 0);
    }

    #[test]
    fn guard_reports_panics_to_hook() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let boundary = FaultBoundary::new(move |fault| sink.borrow_mut().push(fault.clone()));

        let result: Option<()> = boundary.guard("dispatch:click", || panic!("boom"));
        assert!(result.is_none());
        assert_eq!(boundary.fault_count(), 1);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].context, "dispatch:click");
        assert_eq!(seen[0].message, "boom");
    }

    #[test]
    fn formatted_panic_message_is_captured() {
        let err = catch_fault("timer", || panic!("bad value {}", 3)).unwrap_err();
        assert_eq!(err.message, "bad value 3");
        assert!(err.to_string().contains("timer"));
    }
}
