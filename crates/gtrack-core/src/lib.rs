#![forbid(unsafe_code)]

//! Core: virtual-time scheduling, debounce/throttle, the page model, page
//! events and fault containment.

pub mod event;
pub mod fault;
pub mod page;
pub mod scheduler;
pub mod timing;

pub use event::{EventKind, Key, PageEvent};
pub use fault::{Fault, FaultBoundary, catch_fault};
pub use page::{Element, ElementId, InputKind, Page, Selector, SelectorError, SharedPage};
pub use scheduler::{RealtimeDriver, Scheduler, TimerId};
pub use timing::{Debounced, Throttled, TimingError, debounce, throttle};
