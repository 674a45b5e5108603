#![forbid(unsafe_code)]

//! Transient, auto-dismissing notifications.
//!
//! The [`Notifications`] service keeps an ordered list of notifications and
//! drives each through a small lifecycle on the injected scheduler:
//!
//! ```text
//!   show ──► Visible ──(ttl elapsed | dismiss)──► Removing ──(transition)──► Gone
//! ```
//!
//! `Removing` is the exit transition: the notification is still rendered
//! (with its `exiting` flag set) until the transition window elapses, then it
//! is deleted for good.
//!
//! # Invariants
//!
//! 1. New notifications are appended after every rendered one; removals never
//!    reorder the rest.
//! 2. Both removal phases are idempotent. A dismiss racing the ttl timer is
//!    resolved by whichever runs first; the other is a no-op.
//! 3. Ids are never reused.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gtrack_core::Scheduler;
//! use gtrack_widgets::notification::{Level, Notifications};
//!
//! let scheduler = Scheduler::new();
//! let notifications = Notifications::with_defaults(&scheduler);
//!
//! let id = notifications.error("x");
//! notifications.dismiss(id);
//! assert_eq!(notifications.visible_count(), 0);
//!
//! scheduler.advance(Duration::from_secs(10));
//! assert!(notifications.is_empty());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use gtrack_core::scheduler::{Scheduler, TimerId};
use serde::{Deserialize, Serialize};

/// Default lifetime of a notification.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);
/// Length of the exit transition.
pub const REMOVAL_TRANSITION: Duration = Duration::from_millis(300);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Icon class shown next to the message.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Success => "bi-check-circle-fill",
            Self::Error => "bi-exclamation-triangle-fill",
            Self::Warning => "bi-exclamation-circle-fill",
            Self::Info => "bi-info-circle-fill",
        }
    }
}

/// Unique identifier for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification-{}", self.0)
    }
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Visible,
    /// Exit transition running; still rendered.
    Removing,
    /// Deleted. Terminal.
    Gone,
}

/// A notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub level: Level,
    /// Scheduler time at creation.
    pub created_at: Duration,
    pub ttl: Duration,
    pub phase: Phase,
}

/// Render projection of one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub classes: String,
    pub icon: &'static str,
    pub message: String,
    pub exiting: bool,
}

/// Queue statistics for monitoring and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total notifications shown.
    pub total_shown: u64,
    /// Notifications dismissed before their ttl.
    pub user_dismissed: u64,
    /// Notifications that reached their ttl.
    pub auto_expired: u64,
    /// Notifications hard-deleted after the exit transition.
    pub removed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalCause {
    Dismissed,
    Expired,
}

struct QueueInner {
    items: Vec<Notification>,
    next_id: u64,
    expiry: HashMap<NotificationId, TimerId>,
    stats: QueueStats,
}

/// The notification service.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Notifications {
    scheduler: Scheduler,
    default_ttl: Duration,
    transition: Duration,
    inner: Rc<RefCell<QueueInner>>,
}

impl Notifications {
    /// Queue with the given default ttl and exit transition.
    pub fn new(scheduler: &Scheduler, default_ttl: Duration, transition: Duration) -> Self {
        Self {
            scheduler: scheduler.clone(),
            default_ttl,
            transition,
            inner: Rc::new(RefCell::new(QueueInner {
                items: Vec::new(),
                next_id: 1,
                expiry: HashMap::new(),
                stats: QueueStats::default(),
            })),
        }
    }

    /// Queue with [`DEFAULT_TTL`] and [`REMOVAL_TRANSITION`].
    #[must_use]
    pub fn with_defaults(scheduler: &Scheduler) -> Self {
        Self::new(scheduler, DEFAULT_TTL, REMOVAL_TRANSITION)
    }

    /// Append a notification and schedule its auto-removal.
    ///
    /// `ttl` of `None` or zero uses the default ttl.
    pub fn show(
        &self,
        message: impl Into<String>,
        level: Level,
        ttl: Option<Duration>,
    ) -> NotificationId {
        let ttl = match ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.default_ttl,
        };
        let message = message.into();

        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = NotificationId(inner.next_id);
            inner.next_id += 1;
            inner.stats.total_shown += 1;
            inner.items.push(Notification {
                id,
                message,
                level,
                created_at: self.scheduler.now(),
                ttl,
                phase: Phase::Visible,
            });
            id
        };

        let this = self.clone();
        let timer = self
            .scheduler
            .schedule(ttl, move || {
                this.begin_removal(id, RemovalCause::Expired);
            });
        self.inner.borrow_mut().expiry.insert(id, timer);

        tracing::debug!(
            %id,
            level = level.as_str(),
            ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            "notification shown"
        );
        id
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, Level::Success, None)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, Level::Error, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, Level::Warning, None)
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, Level::Info, None)
    }

    /// [`success`](Self::success) with its own ttl.
    pub fn success_for(&self, message: impl Into<String>, ttl: Duration) -> NotificationId {
        self.show(message, Level::Success, Some(ttl))
    }

    pub fn error_for(&self, message: impl Into<String>, ttl: Duration) -> NotificationId {
        self.show(message, Level::Error, Some(ttl))
    }

    pub fn warning_for(&self, message: impl Into<String>, ttl: Duration) -> NotificationId {
        self.show(message, Level::Warning, Some(ttl))
    }

    pub fn info_for(&self, message: impl Into<String>, ttl: Duration) -> NotificationId {
        self.show(message, Level::Info, Some(ttl))
    }

    /// Start removing `id` before its ttl. Returns `false` if it was already
    /// removing or gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        self.begin_removal(id, RemovalCause::Dismissed)
    }

    /// Dismiss every visible notification.
    pub fn dismiss_all(&self) -> usize {
        let ids: Vec<NotificationId> = self
            .inner
            .borrow()
            .items
            .iter()
            .filter(|n| n.phase == Phase::Visible)
            .map(|n| n.id)
            .collect();
        ids.into_iter().filter(|id| self.dismiss(*id)).count()
    }

    fn begin_removal(&self, id: NotificationId, cause: RemovalCause) -> bool {
        let expiry = {
            let mut inner = self.inner.borrow_mut();
            let Some(item) = inner.items.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            if item.phase != Phase::Visible {
                return false;
            }
            item.phase = Phase::Removing;
            match cause {
                RemovalCause::Dismissed => inner.stats.user_dismissed += 1,
                RemovalCause::Expired => inner.stats.auto_expired += 1,
            }
            inner.expiry.remove(&id)
        };
        if cause == RemovalCause::Dismissed {
            if let Some(timer) = expiry {
                self.scheduler.cancel(timer);
            }
        }

        let this = self.clone();
        self.scheduler
            .schedule(self.transition, move || this.hard_delete(id));
        tracing::debug!(%id, ?cause, "notification removing");
        true
    }

    fn hard_delete(&self, id: NotificationId) {
        let mut inner = self.inner.borrow_mut();
        let before = inner.items.len();
        inner.items.retain(|n| n.id != id);
        if inner.items.len() != before {
            inner.stats.removed += 1;
        }
    }

    /// Current phase of `id`. Unknown ids report `Gone`.
    #[must_use]
    pub fn phase(&self, id: NotificationId) -> Phase {
        self.inner
            .borrow()
            .items
            .iter()
            .find(|n| n.id == id)
            .map_or(Phase::Gone, |n| n.phase)
    }

    /// Snapshot of `id`, if still rendered.
    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner.borrow().items.iter().find(|n| n.id == id).cloned()
    }

    /// Snapshot of every rendered notification, oldest first.
    #[must_use]
    pub fn items(&self) -> Vec<Notification> {
        self.inner.borrow().items.clone()
    }

    /// Notifications in the `Visible` phase.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.inner
            .borrow()
            .items
            .iter()
            .filter(|n| n.phase == Phase::Visible)
            .count()
    }

    /// Visible notifications with the given level.
    #[must_use]
    pub fn visible_with_level(&self, level: Level) -> Vec<Notification> {
        self.inner
            .borrow()
            .items
            .iter()
            .filter(|n| n.phase == Phase::Visible && n.level == level)
            .cloned()
            .collect()
    }

    /// Rendered notifications (visible or removing).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Project the queue into view models, oldest first.
    #[must_use]
    pub fn render(&self) -> Vec<NotificationView> {
        self.inner
            .borrow()
            .items
            .iter()
            .map(|n| NotificationView {
                id: n.id.to_string(),
                classes: format!(
                    "alert alert-{} alert-dismissible fade show notification-item",
                    n.level.as_str()
                ),
                icon: n.level.icon(),
                message: n.message.clone(),
                exiting: n.phase == Phase::Removing,
            })
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner.borrow().stats
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Notifications")
            .field("items", &inner.items.len())
            .field("default_ttl", &self.default_ttl)
            .field("stats", &inner.stats)
            .finish()
    }
}
