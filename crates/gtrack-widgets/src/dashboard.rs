#![forbid(unsafe_code)]

//! Dashboard: chart configurations, quick actions and live stat counters.
//!
//! Charts are described declaratively and handed to the charting
//! collaborator as JSON; nothing here draws.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unknown quick action | Logged at debug, ignored |
//! | Unparseable stat text | Counter animates from 0 |
//! | No stats source | Refresh timer never armed |

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{ElementId, Page, Selector};
use gtrack_core::scheduler::TimerId;
use gtrack_runtime::config::TimingConfig;
use serde::Serialize;
use time::Date;

use crate::context::Context;

pub const QUICK_ACTION_ATTR: &str = "data-quick-action";
pub const STATISTICS_CANVAS_ID: &str = "statisticsChart";
pub const TRENDS_CANVAS_ID: &str = "trendsChart";

// ---------------------------------------------------------------------------
// Chart configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Doughnut,
    Line,
}

/// One color for the whole dataset, or one per data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Colors {
    One(String),
    Each(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub data: Vec<f64>,
    pub background_color: Colors,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Font {
    pub family: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendLabels {
    pub font: Font,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Legend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<LegendLabels>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plugins {
    pub legend: Legend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub begin_at_zero: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scales {
    pub y: Axis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
    pub plugins: Plugins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scales: Option<Scales>,
}

/// A complete chart description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
}

impl ChartConfig {
    /// Employment status breakdown.
    #[must_use]
    pub fn statistics() -> Self {
        Self {
            kind: ChartKind::Doughnut,
            data: ChartData {
                labels: strings(&["موظفون", "غير موظفين", "عمل حر", "يدرسون"]),
                datasets: vec![Dataset {
                    label: None,
                    data: vec![65.0, 20.0, 10.0, 5.0],
                    background_color: Colors::Each(strings(&[
                        "#28a745", "#dc3545", "#ffc107", "#17a2b8",
                    ])),
                    border_color: None,
                    border_width: Some(0),
                    tension: None,
                    fill: None,
                }],
            },
            options: ChartOptions {
                responsive: true,
                maintain_aspect_ratio: false,
                plugins: Plugins {
                    legend: Legend {
                        display: None,
                        position: Some("bottom".into()),
                        labels: Some(LegendLabels {
                            font: Font {
                                family: "Segoe UI".into(),
                            },
                        }),
                    },
                },
                scales: None,
            },
        }
    }

    /// Monthly employment rate.
    #[must_use]
    pub fn trends() -> Self {
        Self {
            kind: ChartKind::Line,
            data: ChartData {
                labels: strings(&["يناير", "فبراير", "مارس", "أبريل", "مايو", "يونيو"]),
                datasets: vec![Dataset {
                    label: Some("معدل التوظيف".into()),
                    data: vec![65.0, 68.0, 70.0, 72.0, 75.0, 78.0],
                    background_color: Colors::One("rgba(102, 126, 234, 0.1)".into()),
                    border_color: Some("#667eea".into()),
                    border_width: None,
                    tension: Some(0.4),
                    fill: Some(true),
                }],
            },
            options: ChartOptions {
                responsive: true,
                maintain_aspect_ratio: false,
                plugins: Plugins {
                    legend: Legend {
                        display: Some(false),
                        ..Legend::default()
                    },
                },
                scales: Some(Scales {
                    y: Axis {
                        begin_at_zero: true,
                        max: Some(100.0),
                    },
                }),
            },
        }
    }

    /// # Errors
    ///
    /// Propagates `serde_json` serialization errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Charts whose canvas exists on the page, keyed by canvas id.
#[must_use]
pub fn charts_for_page(page: &Page) -> Vec<(String, ChartConfig)> {
    [
        (STATISTICS_CANVAS_ID, ChartConfig::statistics as fn() -> ChartConfig),
        (TRENDS_CANVAS_ID, ChartConfig::trends),
    ]
    .into_iter()
    .filter(|(canvas, _)| page.find_by_dom_id(canvas).is_some())
    .map(|(canvas, build)| (canvas.to_string(), build()))
    .collect()
}

// ---------------------------------------------------------------------------
// Number formatting
// ---------------------------------------------------------------------------

const ARABIC_INDIC_DIGITS: [char; 10] = ['٠', '١', '٢', '٣', '٤', '٥', '٦', '٧', '٨', '٩'];
const ARABIC_THOUSANDS_SEPARATOR: char = '٬';

/// Format with Arabic-Indic digits and grouped thousands.
#[must_use]
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::new();
    if value < 0 {
        out.push('-');
    }
    let len = digits.len();
    for (i, b) in digits.bytes().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(ARABIC_THOUSANDS_SEPARATOR);
        }
        out.push(ARABIC_INDIC_DIGITS[usize::from(b - b'0')]);
    }
    out
}

const ARABIC_MONTHS: [&str; 12] = [
    "يناير", "فبراير", "مارس", "أبريل", "مايو", "يونيو",
    "يوليو", "أغسطس", "سبتمبر", "أكتوبر", "نوفمبر", "ديسمبر",
];

/// Format as day, Arabic month name and year, e.g. `١٥ يناير ٢٠٢٤`.
///
/// Digits are Arabic-Indic and the year is not grouped.
#[must_use]
pub fn format_date(date: Date) -> String {
    let month = ARABIC_MONTHS
        .get(usize::from(u8::from(date.month())) - 1)
        .copied()
        .unwrap_or_default();
    format!(
        "{} {month} {}",
        arabic_digits(&date.day().to_string()),
        arabic_digits(&date.year().to_string())
    )
}

fn arabic_digits(ascii: &str) -> String {
    ascii
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => ARABIC_INDIC_DIGITS[d as usize],
            None => c,
        })
        .collect()
}

/// Read a number written with ASCII or Arabic-Indic digits, ignoring
/// grouping separators. `None` when no digit is present.
#[must_use]
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    let negative = text.starts_with('-');
    let mut value: i64 = 0;
    let mut seen = false;
    for c in text.chars() {
        let digit = match c {
            '0'..='9' => c as i64 - '0' as i64,
            _ => match ARABIC_INDIC_DIGITS.iter().position(|d| *d == c) {
                Some(d) => d as i64,
                None => continue,
            },
        };
        seen = true;
        value = value.saturating_mul(10).saturating_add(digit);
    }
    seen.then_some(if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// Quick actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAction {
    ExportData,
    SendSurvey,
    GenerateReport,
}

impl QuickAction {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "export-data" => Some(Self::ExportData),
            "send-survey" => Some(Self::SendSurvey),
            "generate-report" => Some(Self::GenerateReport),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExportData => "export-data",
            Self::SendSurvey => "send-survey",
            Self::GenerateReport => "generate-report",
        }
    }
}

// ---------------------------------------------------------------------------
// Stats source
// ---------------------------------------------------------------------------

/// Supplies fresh values for the dashboard counters.
pub trait StatsSource {
    /// New value for the `index`-th counter, currently showing `current`.
    fn next_value(&mut self, index: usize, current: i64) -> i64;
}

impl<F> StatsSource for F
where
    F: FnMut(usize, i64) -> i64,
{
    fn next_value(&mut self, index: usize, current: i64) -> i64 {
        self(index, current)
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

struct DashboardInner {
    ctx: Context,
    charts: Vec<(String, ChartConfig)>,
    source: RefCell<Option<Box<dyn StatsSource>>>,
    refresh_timer: Cell<Option<TimerId>>,
    frames: RefCell<HashMap<ElementId, Vec<TimerId>>>,
}

/// Dashboard module. Cloning yields another handle.
#[derive(Clone)]
pub struct Dashboard {
    inner: Rc<DashboardInner>,
}

impl Dashboard {
    pub fn attach(ctx: &Context) -> Self {
        let charts = charts_for_page(&ctx.page.borrow());
        tracing::debug!(charts = charts.len(), "dashboard attached");
        Self {
            inner: Rc::new(DashboardInner {
                ctx: ctx.clone(),
                charts,
                source: RefCell::new(None),
                refresh_timer: Cell::new(None),
                frames: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Chart configurations for the canvases present on the page.
    #[must_use]
    pub fn charts(&self) -> &[(String, ChartConfig)] {
        &self.inner.charts
    }

    /// Install a stats source and start the periodic refresh.
    pub fn start_refresh(&self, source: impl StatsSource + 'static) {
        *self.inner.source.borrow_mut() = Some(Box::new(source));
        self.stop_refresh();
        schedule_refresh(&self.inner);
    }

    /// Cancel the periodic refresh. Returns whether it was running.
    pub fn stop_refresh(&self) -> bool {
        self.inner
            .refresh_timer
            .take()
            .is_some_and(|timer| self.inner.ctx.scheduler.cancel(timer))
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .refresh_timer
            .get()
            .is_some_and(|timer| self.inner.ctx.scheduler.is_scheduled(timer))
    }

    /// Pull new values for every `.stat-number` and animate towards them.
    /// Returns the number of counters updated.
    pub fn update_stats(&self) -> usize {
        update_stats(&self.inner)
    }

    /// Animate `counter` from `start` to `end`.
    pub fn animate_counter(&self, counter: ElementId, start: i64, end: i64) {
        animate_counter(&self.inner, counter, start, end);
    }

    /// Route a page event. Returns `false` when no dashboard behavior
    /// applies.
    pub fn handle_event(&self, event: &PageEvent) -> bool {
        if !matches!(event.kind, EventKind::Click) {
            return false;
        }
        let name = {
            let page = self.inner.ctx.page.borrow();
            page.closest(event.target, &Selector::has_attr(QUICK_ACTION_ATTR))
                .and_then(|id| page[id].attr(QUICK_ACTION_ATTR).map(str::to_string))
        };
        match name {
            Some(name) => {
                self.run_quick_action(&name);
                true
            }
            None => false,
        }
    }

    /// Run a quick action by name. Unknown names are logged and ignored.
    pub fn run_quick_action(&self, name: &str) -> Option<QuickAction> {
        let Some(action) = QuickAction::parse(name) else {
            tracing::debug!(action = name, "unknown quick action");
            return None;
        };
        let ctx = &self.inner.ctx;
        let messages = ctx.messages();
        let follow_up = match action {
            QuickAction::ExportData => {
                ctx.notifications.info(messages.export_started.as_str());
                Some((ctx.timing().export_delay_ms, messages.export_finished.clone()))
            }
            QuickAction::SendSurvey => {
                ctx.notifications.info(messages.send_survey.as_str());
                None
            }
            QuickAction::GenerateReport => {
                ctx.notifications.info(messages.report_started.as_str());
                Some((ctx.timing().report_delay_ms, messages.report_finished.clone()))
            }
        };
        if let Some((delay_ms, message)) = follow_up {
            let notifications = ctx.notifications.clone();
            ctx.scheduler.schedule(TimingConfig::ms(delay_ms), move || {
                notifications.success(message);
            });
        }
        tracing::debug!(action = action.as_str(), "quick action");
        Some(action)
    }
}

fn schedule_refresh(inner: &Rc<DashboardInner>) {
    let weak: Weak<DashboardInner> = Rc::downgrade(inner);
    let period = TimingConfig::ms(inner.ctx.timing().dashboard_refresh_ms);
    let timer = inner.ctx.scheduler.schedule(period, move || {
        if let Some(inner) = weak.upgrade() {
            update_stats(&inner);
            schedule_refresh(&inner);
        }
    });
    inner.refresh_timer.set(Some(timer));
}

fn update_stats(inner: &Rc<DashboardInner>) -> usize {
    let counters: Vec<(ElementId, i64)> = {
        let page = inner.ctx.page.borrow();
        page.query_all(page.root(), &Selector::class("stat-number"))
            .into_iter()
            .map(|id| (id, parse_number(&page[id].text).unwrap_or(0)))
            .collect()
    };
    let targets: Vec<(ElementId, i64, i64)> = {
        let mut source = inner.source.borrow_mut();
        let Some(source) = source.as_mut() else {
            return 0;
        };
        counters
            .into_iter()
            .enumerate()
            .map(|(index, (id, current))| (id, current, source.next_value(index, current)))
            .collect()
    };
    for &(id, start, end) in &targets {
        animate_counter(inner, id, start, end);
    }
    targets.len()
}

fn animate_counter(inner: &Rc<DashboardInner>, counter: ElementId, start: i64, end: i64) {
    let scheduler = &inner.ctx.scheduler;
    if let Some(previous) = inner.frames.borrow_mut().remove(&counter) {
        for timer in previous {
            scheduler.cancel(timer);
        }
    }

    let timing = inner.ctx.timing();
    let frames = i64::from(timing.counter_animation_frames.max(1));
    let duration = TimingConfig::ms(timing.counter_animation_ms);
    let mut timers = Vec::new();
    for frame in 1..=frames {
        let value = start + ((end - start) * frame).div_euclid(frames);
        let at = duration.mul_f64(frame as f64 / frames as f64);
        let page = Rc::clone(&inner.ctx.page);
        timers.push(scheduler.schedule(at, move || {
            if let Some(el) = page.borrow_mut().get_mut(counter) {
                el.text = format_number(value);
            }
        }));
    }
    inner.frames.borrow_mut().insert(counter, timers);
}
