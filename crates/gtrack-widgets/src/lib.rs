#![forbid(unsafe_code)]

//! Page components for the Graduate Tracker engine.
//!
//! Every component is built from a shared [`Context`] and reacts to
//! [`PageEvent`](gtrack_core::PageEvent)s through its `handle_event`.
//!
//! | Module | Opt-in |
//! |--------|--------|
//! | [`notification`] | always |
//! | [`form`] | every `<form>`, auto-save with `data-autosave` |
//! | [`survey`] | `#surveyResponseForm` |
//! | [`table`] | `th[data-sort]`, `#selectAll`, `.item-checkbox` |
//! | [`search`] | `data-search`, `data-filter` / `data-filterable` |
//! | [`dashboard`] | `#statisticsChart`, `#trendsChart`, `data-quick-action`, `.stat-number` |
//! | [`animations`] | `data-animate`, `data-hover` |
//! | [`accessibility`] | interactive elements, `data-dynamic` |

pub mod accessibility;
pub mod animations;
pub mod clipboard;
pub mod context;
pub mod dashboard;
pub mod form;
pub mod notification;
pub mod search;
pub mod survey;
pub mod table;
pub mod validation;

pub use clipboard::{ClipboardError, ClipboardWriter, CopyOutcome, MemoryClipboard, copy_to_clipboard};
pub use context::Context;
pub use dashboard::{ChartConfig, Dashboard, QuickAction, StatsSource, format_date, format_number};
pub use form::{AutoSaveState, FieldValue, FormController, FormSnapshot, SubmitOutcome};
pub use notification::{Level, Notification, NotificationId, NotificationView, Notifications, Phase};
pub use search::SearchController;
pub use survey::{ResponseSet, SurveyTracker};
pub use table::{SortDirection, TableEnhancer};
pub use validation::{
    FieldRules, ValidationError, ValidationResult, Validator, format_national_id,
    format_phone_number, is_valid_email, is_valid_phone,
};
