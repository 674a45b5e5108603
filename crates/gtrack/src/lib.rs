#![forbid(unsafe_code)]

//! Graduate Tracker public facade.
//!
//! Wires the page components into one [`GraduateTracker`] context, routes
//! page events through a fault boundary and offers the logging setup.
//!
//! ```
//! use std::time::Duration;
//! use gtrack::prelude::*;
//!
//! let mut page = Page::new();
//! let root = page.root();
//! let form = page.append(root, Element::new("form"));
//! let name = page.append(form, Element::input(InputKind::Text, "name").required());
//!
//! let mut tracker = GraduateTracker::new(page, TrackerConfig::default());
//! tracker.init();
//! let outcome = tracker.dispatch(&PageEvent::submit(form));
//! assert!(outcome.blocks_submit());
//!
//! assert_eq!(tracker.page().borrow().focused(), Some(name));
//! assert_eq!(tracker.notifications().visible_with_level(Level::Error).len(), 1);
//! tracker.advance(Duration::from_secs(1));
//! ```

use std::fmt;

pub mod logging;
pub mod tracker;

// --- Re-exports ------------------------------------------------------------

pub use gtrack_core::{
    Element, ElementId, EventKind, InputKind, Key, Page, PageEvent, Scheduler, Selector,
    SharedPage, TimingError,
};
pub use gtrack_runtime::{ConfigError, LoggingConfig, PersistenceAdapter, TrackerConfig};
pub use gtrack_widgets::{Context, Level, Notifications, SubmitOutcome};
pub use tracker::{Components, DispatchOutcome, Feature, GraduateTracker, Modules, Utils};

pub use gtrack_core as core;
pub use gtrack_runtime as runtime;
pub use gtrack_widgets as widgets;

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Timing(TimingError),
    Logging(logging::LoggingError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Timing(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Timing(err) => Some(err),
            Self::Logging(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<TimingError> for Error {
    fn from(err: TimingError) -> Self {
        Self::Timing(err)
    }
}

impl From<logging::LoggingError> for Error {
    fn from(err: logging::LoggingError) -> Self {
        Self::Logging(err)
    }
}

/// Standard result type for facade APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DispatchOutcome, Element, ElementId, Error, EventKind, Feature, GraduateTracker,
        InputKind, Key, Level, Page, PageEvent, Result, Selector, SubmitOutcome, TrackerConfig,
    };

    pub use crate::{core, runtime, widgets};
}
