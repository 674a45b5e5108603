#![forbid(unsafe_code)]

//! Services shared by every component.

use std::rc::Rc;

use gtrack_core::page::{Page, SharedPage};
use gtrack_core::scheduler::Scheduler;
use gtrack_runtime::config::{Messages, TimingConfig, TrackerConfig};
use gtrack_runtime::persistence::PersistenceAdapter;

use crate::notification::Notifications;

/// Explicitly constructed services handed to each component.
///
/// Cloning is cheap: every field is a handle.
#[derive(Clone)]
pub struct Context {
    pub scheduler: Scheduler,
    pub page: SharedPage,
    pub persistence: PersistenceAdapter,
    pub notifications: Notifications,
    pub config: Rc<TrackerConfig>,
}

impl Context {
    pub fn new(
        scheduler: Scheduler,
        page: SharedPage,
        persistence: PersistenceAdapter,
        config: TrackerConfig,
    ) -> Self {
        let notifications = Notifications::new(
            &scheduler,
            config.timing.notification_ttl(),
            config.timing.removal_transition(),
        );
        Self {
            scheduler,
            page,
            persistence,
            notifications,
            config: Rc::new(config),
        }
    }

    /// Fresh scheduler, in-memory persistence and default configuration.
    #[must_use]
    pub fn for_page(page: Page) -> Self {
        Self::new(
            Scheduler::new(),
            page.into_shared(),
            PersistenceAdapter::in_memory(),
            TrackerConfig::default(),
        )
    }

    #[must_use]
    pub fn messages(&self) -> &Messages {
        &self.config.messages
    }

    #[must_use]
    pub fn timing(&self) -> &TimingConfig {
        &self.config.timing
    }
}
