#![forbid(unsafe_code)]

//! The page-level [`GraduateTracker`] context.
//!
//! # Architecture
//!
//! ```text
//!   host events ──► dispatch ──► FaultBoundary::guard ──► route
//!                                                          │
//!        accessibility ◄── animations ◄── tables ◄─────────┤
//!        search ◄── dashboard ◄── forms ◄── survey ◄───────┘
//!
//!   host clock  ──► advance ──► Scheduler ──► timers (guarded by the same boundary)
//! ```
//!
//! Every feature is initialised independently through [`GraduateTracker::enable`];
//! [`GraduateTracker::init`] enables all of them and schedules the welcome
//! notification.
//!
//! # Failure Modes
//!
//! | Scenario | Behavior |
//! |----------|----------|
//! | Handler or timer panics | Logged at error level, one `unexpected_error` notification |
//! | Feature initialisation panics | Same; the feature stays disabled |
//! | Event for an uninitialised feature | Ignored |
//! | Submit blocked by validation | [`DispatchOutcome::blocks_submit`] is `true`; the host must not send it |

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::fault::{Fault, FaultBoundary};
use gtrack_core::page::{ElementId, Page, Selector, SharedPage};
use gtrack_core::scheduler::{Scheduler, TimerId};
use gtrack_core::timing::{self, Debounced, Throttled};
use gtrack_runtime::config::{TimingConfig, TrackerConfig};
use gtrack_runtime::persistence::PersistenceAdapter;
use gtrack_widgets::clipboard::{self, ClipboardWriter, CopyOutcome};
use gtrack_widgets::context::Context;
use gtrack_widgets::dashboard::{self, Dashboard};
use gtrack_widgets::form::{FormController, SubmitOutcome};
use gtrack_widgets::notification::Notifications;
use gtrack_widgets::search::SearchController;
use gtrack_widgets::survey::{SURVEY_FORM_ID, SurveyTracker};
use gtrack_widgets::table::TableEnhancer;
use gtrack_widgets::validation::{self, ValidationResult};
use gtrack_widgets::{accessibility, animations};
use time::Date;

use crate::Result;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// An independently initialisable part of the page behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    Forms,
    Tables,
    Animations,
    Survey,
    Dashboard,
    Search,
    Accessibility,
}

impl Feature {
    /// Every feature, in initialisation order.
    pub const ALL: [Self; 7] = [
        Self::Forms,
        Self::Tables,
        Self::Animations,
        Self::Survey,
        Self::Dashboard,
        Self::Search,
        Self::Accessibility,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forms => "forms",
            Self::Tables => "tables",
            Self::Animations => "animations",
            Self::Survey => "survey",
            Self::Dashboard => "dashboard",
            Self::Search => "search",
            Self::Accessibility => "accessibility",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Scheduling, validation and formatting helpers.
pub struct Utils {
    ctx: Context,
}

impl Utils {
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.ctx.scheduler
    }

    /// Debounce `action` on the page scheduler.
    ///
    /// # Errors
    ///
    /// Fails for a negative delay.
    pub fn debounce<A: 'static>(
        &self,
        delay_ms: i64,
        action: impl FnMut(A) + 'static,
    ) -> Result<Debounced<A>> {
        Ok(timing::debounce(&self.ctx.scheduler, delay_ms, action)?)
    }

    /// Throttle `action` on the page scheduler.
    ///
    /// # Errors
    ///
    /// Fails for a negative interval.
    pub fn throttle<A: 'static>(
        &self,
        interval_ms: i64,
        action: impl FnMut(A) + 'static,
    ) -> Result<Throttled<A>> {
        Ok(timing::throttle(&self.ctx.scheduler, interval_ms, action)?)
    }

    /// Validate one field and update its inline feedback.
    pub fn validate_field(&self, field: ElementId) -> ValidationResult {
        let mut page = self.ctx.page.borrow_mut();
        validation::validate_element(&mut page, field, self.ctx.messages())
    }

    #[must_use]
    pub fn format_phone_number(&self, value: &str) -> String {
        validation::format_phone_number(value)
    }

    #[must_use]
    pub fn format_national_id(&self, value: &str) -> String {
        validation::format_national_id(value)
    }

    /// Arabic-Indic digits with grouping.
    #[must_use]
    pub fn format_number(&self, value: i64) -> String {
        dashboard::format_number(value)
    }

    /// Day, Arabic month name and year in Arabic-Indic digits.
    #[must_use]
    pub fn format_date(&self, date: Date) -> String {
        dashboard::format_date(date)
    }

    /// Copy `text`, falling back to a focused textarea on the page.
    pub fn copy_to_clipboard(
        &self,
        clipboard: Option<&dyn ClipboardWriter>,
        text: &str,
    ) -> CopyOutcome {
        let mut page = self.ctx.page.borrow_mut();
        clipboard::copy_to_clipboard(&mut page, clipboard, text)
    }
}

/// Notifications, forms, tables and animations.
pub struct Components {
    notifications: Notifications,
    forms: Vec<FormController>,
    tables: Option<TableEnhancer>,
    animations: bool,
}

impl Components {
    #[must_use]
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    #[must_use]
    pub fn forms(&self) -> &[FormController] {
        &self.forms
    }

    /// Controller attached to `form`.
    #[must_use]
    pub fn form(&self, form: ElementId) -> Option<&FormController> {
        self.forms.iter().find(|c| c.form() == form)
    }

    #[must_use]
    pub fn tables(&self) -> Option<&TableEnhancer> {
        self.tables.as_ref()
    }

    /// Whether scroll reveal and hover effects are wired.
    #[must_use]
    pub fn animations(&self) -> bool {
        self.animations
    }
}

/// Survey, dashboard, search and accessibility.
#[derive(Default)]
pub struct Modules {
    survey: Option<SurveyTracker>,
    dashboard: Option<Dashboard>,
    search: Option<SearchController>,
    accessibility: bool,
}

impl Modules {
    /// `None` until enabled or when the page has no survey form.
    #[must_use]
    pub fn survey(&self) -> Option<&SurveyTracker> {
        self.survey.as_ref()
    }

    #[must_use]
    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.dashboard.as_ref()
    }

    #[must_use]
    pub fn search(&self) -> Option<&SearchController> {
        self.search.as_ref()
    }

    #[must_use]
    pub fn accessibility(&self) -> bool {
        self.accessibility
    }
}

// ---------------------------------------------------------------------------
// Dispatch outcome
// ---------------------------------------------------------------------------

/// What a dispatched page event did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    handled: bool,
    submit: Option<SubmitOutcome>,
}

impl DispatchOutcome {
    /// Whether any feature reacted to the event.
    #[must_use]
    pub fn handled(&self) -> bool {
        self.handled
    }

    /// Validation result of a submit event for a tracked form.
    #[must_use]
    pub fn submit(&self) -> Option<&SubmitOutcome> {
        self.submit.as_ref()
    }

    /// A tracked form refused the submission.
    #[must_use]
    pub fn blocks_submit(&self) -> bool {
        self.submit.as_ref().is_some_and(SubmitOutcome::is_blocked)
    }
}

// ---------------------------------------------------------------------------
// GraduateTracker
// ---------------------------------------------------------------------------

/// Explicitly constructed page context.
pub struct GraduateTracker {
    ctx: Context,
    boundary: FaultBoundary,
    utils: Utils,
    components: Components,
    modules: Modules,
    enabled: BTreeSet<Feature>,
    welcome: Option<TimerId>,
}

impl GraduateTracker {
    /// Tracker over `page` with in-memory persistence.
    #[must_use]
    pub fn new(page: Page, config: TrackerConfig) -> Self {
        Self::with_services(
            Scheduler::new(),
            page.into_shared(),
            PersistenceAdapter::in_memory(),
            config,
        )
    }

    /// Tracker over `page` configured from TOML.
    ///
    /// # Errors
    ///
    /// Fails when the TOML does not parse or holds invalid values.
    pub fn from_toml(page: Page, toml: &str) -> Result<Self> {
        let config = TrackerConfig::from_toml_str_validated(toml)?;
        Ok(Self::new(page, config))
    }

    /// Tracker over explicitly provided services.
    ///
    /// Installs the fault boundary on `scheduler`, so timer callbacks are
    /// contained the same way as dispatched events.
    pub fn with_services(
        scheduler: Scheduler,
        page: SharedPage,
        persistence: PersistenceAdapter,
        config: TrackerConfig,
    ) -> Self {
        let ctx = Context::new(scheduler, page, persistence, config);
        let notifications = ctx.notifications.clone();
        let message = ctx.messages().unexpected_error.clone();
        let boundary = FaultBoundary::new(move |_fault: &Fault| {
            notifications.error(message.as_str());
        });
        ctx.scheduler.set_fault_boundary(boundary.clone());

        Self {
            utils: Utils { ctx: ctx.clone() },
            components: Components {
                notifications: ctx.notifications.clone(),
                forms: Vec::new(),
                tables: None,
                animations: false,
            },
            modules: Modules::default(),
            ctx,
            boundary,
            enabled: BTreeSet::new(),
            welcome: None,
        }
    }

    /// Enable every feature and schedule the welcome notification.
    pub fn init(&mut self) {
        for feature in Feature::ALL {
            self.enable(feature);
        }
        self.schedule_welcome();
        tracing::info!(enabled = self.enabled.len(), "graduate tracker initialised");
    }

    /// Initialise one feature. Returns `false` if it was already enabled or
    /// its initialisation faulted.
    pub fn enable(&mut self, feature: Feature) -> bool {
        if self.enabled.contains(&feature) {
            return false;
        }
        let context = format!("init:{feature}");
        let boundary = self.boundary.clone();
        let ok = boundary
            .guard(&context, || self.attach(feature))
            .is_some();
        if ok {
            self.enabled.insert(feature);
            tracing::debug!(%feature, "feature enabled");
        }
        ok
    }

    fn attach(&mut self, feature: Feature) {
        let ctx = &self.ctx;
        match feature {
            Feature::Forms => {
                let survey = Selector::id(SURVEY_FORM_ID);
                self.components.forms = FormController::attach_all(ctx, Some(&survey));
            }
            Feature::Tables => self.components.tables = Some(TableEnhancer::attach(ctx)),
            Feature::Animations => {
                animations::observe(&mut ctx.page.borrow_mut());
                self.components.animations = true;
            }
            Feature::Survey => self.modules.survey = SurveyTracker::attach(ctx),
            Feature::Dashboard => self.modules.dashboard = Some(Dashboard::attach(ctx)),
            Feature::Search => self.modules.search = Some(SearchController::attach(ctx)),
            Feature::Accessibility => {
                accessibility::init(&mut ctx.page.borrow_mut());
                self.modules.accessibility = true;
            }
        }
    }

    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    fn schedule_welcome(&mut self) {
        if self.welcome.is_some() {
            return;
        }
        let timing = self.ctx.timing();
        let ttl = TimingConfig::ms(timing.welcome_ttl_ms);
        let notifications = self.ctx.notifications.clone();
        let message = self.ctx.messages().welcome.clone();
        self.welcome = Some(self.ctx.scheduler.schedule(
            TimingConfig::ms(timing.welcome_delay_ms),
            move || {
                notifications.success_for(message, ttl);
            },
        ));
    }

    // -- Event flow ---------------------------------------------------------

    /// Route a page event to every enabled feature. A panicking handler is
    /// contained, reported and yields an unhandled outcome.
    pub fn dispatch(&self, event: &PageEvent) -> DispatchOutcome {
        let context = format!("dispatch:{}", event.label());
        self.boundary
            .guard(&context, || self.route(event))
            .unwrap_or_default()
    }

    /// Validate `form` as a submit attempt would. `None` when no enabled
    /// feature tracks the form or validation faulted.
    pub fn submit(&self, form: ElementId) -> Option<SubmitOutcome> {
        self.boundary
            .guard("submit", || self.submit_form(form))
            .flatten()
    }

    fn submit_form(&self, form: ElementId) -> Option<SubmitOutcome> {
        if let Some(controller) = self.components.form(form) {
            return Some(controller.submit());
        }
        self.modules
            .survey
            .as_ref()
            .filter(|survey| survey.form() == form)
            .map(SurveyTracker::submit)
    }

    fn route(&self, event: &PageEvent) -> DispatchOutcome {
        let mut handled = false;
        if self.is_enabled(Feature::Accessibility) {
            handled |= accessibility::handle_event(&mut self.ctx.page.borrow_mut(), event);
        }
        if self.is_enabled(Feature::Animations) {
            handled |= animations::handle_event(&mut self.ctx.page.borrow_mut(), event);
        }
        if let Some(tables) = &self.components.tables {
            handled |= tables.handle_event(event);
        }
        if let Some(search) = &self.modules.search {
            handled |= search.handle_event(event);
        }
        if let Some(dashboard) = &self.modules.dashboard {
            handled |= dashboard.handle_event(event);
        }
        if matches!(event.kind, EventKind::Submit) {
            let submit = self.submit_form(event.target);
            return DispatchOutcome {
                handled: handled || submit.is_some(),
                submit,
            };
        }
        for form in &self.components.forms {
            handled |= form.handle_event(event);
        }
        if let Some(survey) = &self.modules.survey {
            handled |= survey.handle_event(event);
        }
        DispatchOutcome {
            handled,
            submit: None,
        }
    }

    /// Report a structural change under `element` so dynamic containers
    /// refresh their focus order.
    pub fn notify_mutation(&self, element: ElementId) -> bool {
        self.is_enabled(Feature::Accessibility)
            && accessibility::on_mutation(&mut self.ctx.page.borrow_mut(), element)
    }

    /// Advance virtual time, firing due timers. Returns the number fired.
    pub fn advance(&self, delta: Duration) -> usize {
        self.ctx.scheduler.advance(delta)
    }

    // -- Accessors ----------------------------------------------------------

    #[must_use]
    pub fn utils(&self) -> &Utils {
        &self.utils
    }

    #[must_use]
    pub fn components(&self) -> &Components {
        &self.components
    }

    #[must_use]
    pub fn modules(&self) -> &Modules {
        &self.modules
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    #[must_use]
    pub fn page(&self) -> &SharedPage {
        &self.ctx.page
    }

    #[must_use]
    pub fn notifications(&self) -> &Notifications {
        &self.ctx.notifications
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.ctx.scheduler
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.ctx.config
    }

    /// Faults contained so far.
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.boundary.fault_count()
    }
}

impl fmt::Debug for GraduateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraduateTracker")
            .field("enabled", &self.enabled)
            .field("forms", &self.components.forms.len())
            .field("survey", &self.modules.survey.is_some())
            .field("faults", &self.boundary.fault_count())
            .finish()
    }
}
