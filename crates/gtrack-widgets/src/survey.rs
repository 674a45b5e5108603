#![forbid(unsafe_code)]

//! Survey progress tracking.
//!
//! The tracker owns a [`ResponseSet`] mirrored into the store under
//! [`RESPONSES_KEY`] after every mutation. Progress is derived from that set,
//! never adjusted incrementally:
//!
//! ```text
//! percentage = floor(answered / total * 100)
//! ```
//!
//! where `total` is the number of question cards found at attach time and a
//! question counts as answered when any of its fields holds a non-empty value.
//!
//! # Design Invariants
//!
//! 1. The completed notification is raised at most once per tracker.
//! 2. `percentage()` never exceeds 100 even if the stored set names questions
//!    that are no longer on the page.
//! 3. Radio and text fields overwrite; checkbox fields keep an ordered list
//!    without duplicates.
//! 4. Replay merges the stored set under the live one: a question answered
//!    before the load resolved keeps its live answer, and only the other
//!    questions are written back into the page. Nothing is written to the
//!    store until the merge has happened.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{Element, ElementId, InputKind, Page, Selector};
use gtrack_core::timing::Debounced;
use gtrack_runtime::config::TimingConfig;
use gtrack_runtime::persistence::WriteHandle;

use crate::context::Context;
use crate::form::{FieldValue, FormSnapshot, SubmitOutcome, checkable_value, is_checkable};

/// DOM id of the survey form.
pub const SURVEY_FORM_ID: &str = "surveyResponseForm";
/// Storage key of the response set.
pub const RESPONSES_KEY: &str = "survey_responses";
/// Attribute carrying a question card's id.
pub const QUESTION_ATTR: &str = "data-question";
/// Attribute of generated "next question" buttons, holding the target index.
pub const NEXT_QUESTION_ATTR: &str = "data-next-question";

const HIGHLIGHT_COLOR: &str = "#28a745";
const FLAG_COLOR: &str = "#dc3545";
const SHAKE_CLASS: &str = "shake";

/// Responses of one question keyed by field name.
pub type QuestionResponses = BTreeMap<String, FieldValue>;
/// Every recorded response keyed by question id.
pub type ResponseSet = BTreeMap<String, QuestionResponses>;

/// `floor(answered / total * 100)`, zero for an empty survey.
#[must_use]
pub fn percentage(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = answered.min(total) * 100 / total;
    u8::try_from(pct).unwrap_or(100)
}

/// Whether any field of a question holds a non-empty value.
#[must_use]
pub fn is_answered(responses: &QuestionResponses) -> bool {
    responses.values().any(|value| match value {
        FieldValue::Single(v) => !v.trim().is_empty(),
        FieldValue::List(values) => values.iter().any(|v| !v.trim().is_empty()),
    })
}

#[derive(Debug, Clone)]
struct Question {
    id: String,
    card: ElementId,
}

#[derive(Debug, Default)]
struct SurveyState {
    responses: ResponseSet,
    percentage: u8,
    completed_notified: bool,
    /// The stored set is still loading; writes wait for the merge.
    replay_pending: bool,
    /// Set once the stored set has been dropped; a late replay is ignored.
    replay_discarded: bool,
}

struct SurveyInner {
    ctx: Context,
    form: ElementId,
    questions: Vec<Question>,
    state: RefCell<SurveyState>,
    text_inputs: RefCell<HashMap<ElementId, Debounced<()>>>,
}

/// Progress tracker bound to `#surveyResponseForm`.
///
/// Cloning yields another handle to the same tracker.
#[derive(Clone)]
pub struct SurveyTracker {
    inner: Rc<SurveyInner>,
}

impl SurveyTracker {
    /// Attach to the survey form, if the page has one: add navigation
    /// buttons, replay stored responses and render the initial progress.
    pub fn attach(ctx: &Context) -> Option<Self> {
        let (form, questions) = {
            let mut page = ctx.page.borrow_mut();
            let form = page.find_by_dom_id(SURVEY_FORM_ID)?;
            let questions: Vec<Question> = page
                .query_all(form, &Selector::class("question-card"))
                .into_iter()
                .map(|card| Question {
                    id: page[card].attr(QUESTION_ATTR).unwrap_or_default().to_string(),
                    card,
                })
                .collect();
            add_navigation(&mut page, &questions, &ctx.messages().next_question);
            (form, questions)
        };

        let tracker = Self {
            inner: Rc::new(SurveyInner {
                ctx: ctx.clone(),
                form,
                questions,
                state: RefCell::new(SurveyState::default()),
                text_inputs: RefCell::new(HashMap::new()),
            }),
        };
        tracker.bind_text_inputs();
        tracker.replay();
        tracker.refresh_progress();
        tracing::debug!(total = tracker.total_questions(), "survey attached");
        Some(tracker)
    }

    #[must_use]
    pub fn form(&self) -> ElementId {
        self.inner.form
    }

    /// Question cards found at attach time.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.inner.questions.len()
    }

    #[must_use]
    pub fn answered_questions(&self) -> usize {
        let state = self.inner.state.borrow();
        self.inner
            .questions
            .iter()
            .filter(|q| state.responses.get(&q.id).is_some_and(is_answered))
            .count()
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.inner.state.borrow().percentage
    }

    #[must_use]
    pub fn responses(&self) -> ResponseSet {
        self.inner.state.borrow().responses.clone()
    }

    /// Route a page event. Returns `false` when the event is not for the
    /// survey.
    pub fn handle_event(&self, event: &PageEvent) -> bool {
        let target = event.target;
        let owned = target == self.inner.form
            || self.inner.ctx.page.borrow().contains(self.inner.form, target);
        if !owned {
            return false;
        }
        match &event.kind {
            EventKind::Change => {
                if !self.record_response(target) {
                    return false;
                }
                if let Some(card) = self.card_of(target) {
                    self.highlight(card);
                }
            }
            EventKind::Input => {
                let debounced = self.inner.text_inputs.borrow().get(&target).cloned();
                match debounced {
                    Some(debounced) => debounced.trigger(()),
                    None => return false,
                }
            }
            EventKind::Click => return self.go_to_next(target),
            EventKind::Submit if target == self.inner.form => {
                self.submit();
            }
            _ => return false,
        }
        true
    }

    /// Record the current state of `control` into the response set, persist
    /// the set and refresh progress. Returns `false` for controls outside any
    /// question card.
    pub fn record_response(&self, control: ElementId) -> bool {
        let Some(question) = self.question_of(control) else {
            return false;
        };
        let (name, kind, value, checked) = {
            let page = self.inner.ctx.page.borrow();
            let Some(el) = page.get(control) else {
                return false;
            };
            let (Some(name), Some(kind)) = (el.name(), el.kind) else {
                return false;
            };
            let value = if is_checkable(el) {
                checkable_value(el).to_string()
            } else {
                el.value.clone()
            };
            (name.to_string(), kind, value, el.checked)
        };

        {
            let mut state = self.inner.state.borrow_mut();
            let fields = state.responses.entry(question.id.clone()).or_default();
            match kind {
                InputKind::Checkbox => {
                    let mut list = match fields.remove(&name) {
                        Some(FieldValue::List(list)) => list,
                        Some(FieldValue::Single(single)) if !single.is_empty() => vec![single],
                        _ => Vec::new(),
                    };
                    list.retain(|v| v != &value);
                    if checked {
                        list.push(value);
                    }
                    fields.insert(name, FieldValue::List(list));
                }
                _ => {
                    fields.insert(name, FieldValue::Single(value));
                }
            }
        }

        self.persist();
        self.refresh_progress();
        true
    }

    /// Check required questions; block and flag, or forward.
    pub fn submit(&self) -> SubmitOutcome {
        let mut unmet = Vec::new();
        {
            let mut page = self.inner.ctx.page.borrow_mut();
            let form = self.inner.form;
            let required: Vec<ElementId> = page
                .query_all(form, &Selector::has_attr("required"))
                .into_iter()
                .filter(|id| page[*id].kind.is_some())
                .collect();

            let mut checked_names: Vec<String> = Vec::new();
            for id in required {
                let Some(name) = page[id].name().map(str::to_string) else {
                    continue;
                };
                if checked_names.contains(&name) {
                    continue;
                }
                checked_names.push(name.clone());

                let answered = page
                    .query_all(form, &Selector::attr_eq("name", &name))
                    .into_iter()
                    .any(|other| {
                        let el = &page[other];
                        if is_checkable(el) {
                            el.checked
                        } else {
                            !el.value.trim().is_empty()
                        }
                    });
                let Some(card) = page.closest(id, &Selector::class("question-card")) else {
                    if !answered {
                        unmet.push(id);
                    }
                    continue;
                };
                if answered {
                    if !unmet.contains(&card) {
                        clear_flag(&mut page[card]);
                    }
                } else {
                    flag(&mut page[card]);
                    if !unmet.contains(&card) {
                        unmet.push(card);
                    }
                }
            }

            if let Some(&first) = unmet.first() {
                page.scroll_into_view(first, self.inner.ctx.timing().scroll_offset_px);
            }
        }

        if unmet.is_empty() {
            tracing::debug!("survey submit forwarded");
            SubmitOutcome::Forwarded
        } else {
            let ctx = &self.inner.ctx;
            ctx.notifications
                .error(ctx.messages().survey_required_unanswered.as_str());
            tracing::debug!(unmet = unmet.len(), "survey submit blocked");
            SubmitOutcome::Blocked { invalid: unmet }
        }
    }

    /// The server accepted the survey: drop the stored set and confirm.
    pub fn confirm_submitted(&self) -> WriteHandle {
        {
            let mut state = self.inner.state.borrow_mut();
            state.responses.clear();
            state.replay_discarded = true;
        }
        let ctx = &self.inner.ctx;
        let handle = ctx.persistence.clear(RESPONSES_KEY);
        ctx.notifications.success(ctx.messages().survey_submitted.as_str());
        handle
    }

    fn persist(&self) {
        let responses = {
            let state = self.inner.state.borrow();
            if state.replay_pending {
                return;
            }
            state.responses.clone()
        };
        self.inner.ctx.persistence.save(RESPONSES_KEY, &responses);
    }

    /// Recompute the percentage from the response set and project it.
    fn refresh_progress(&self) {
        let pct = percentage(self.answered_questions(), self.total_questions());
        let notify = {
            let mut state = self.inner.state.borrow_mut();
            state.percentage = pct;
            let first_time = pct == 100 && !state.completed_notified;
            if first_time {
                state.completed_notified = true;
            }
            first_time
        };

        {
            let mut page = self.inner.ctx.page.borrow_mut();
            render_progress(&mut page, pct);
        }

        if notify {
            let ctx = self.inner.ctx.clone();
            let delay = TimingConfig::ms(ctx.timing().completion_delay_ms);
            ctx.scheduler.clone().schedule(delay, move || {
                ctx.notifications.success(ctx.messages().survey_completed.as_str());
            });
            tracing::debug!("survey completed");
        }
    }

    /// Load the stored set, merge it under the live responses and write the
    /// stored answers back into the controls.
    fn replay(&self) {
        self.inner.state.borrow_mut().replay_pending = true;
        let weak = Rc::downgrade(&self.inner);
        self.inner
            .ctx
            .persistence
            .load::<ResponseSet>(RESPONSES_KEY)
            .then(move |stored: &Option<ResponseSet>| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let live = {
                    let mut state = inner.state.borrow_mut();
                    state.replay_pending = false;
                    if state.replay_discarded {
                        return;
                    }
                    state.responses.clone()
                };
                let stored = stored.clone().unwrap_or_default();
                {
                    let mut page = inner.ctx.page.borrow_mut();
                    for question in &inner.questions {
                        if live.contains_key(&question.id) {
                            continue;
                        }
                        if let Some(fields) = stored.get(&question.id) {
                            let snapshot = FormSnapshot {
                                form_key: question.id.clone(),
                                fields: fields.clone(),
                            };
                            snapshot.apply(&mut page, question.card);
                        }
                    }
                }
                let mut merged = stored.clone();
                merged.extend(live.iter().map(|(id, fields)| (id.clone(), fields.clone())));
                let diverged = merged != stored;
                inner.state.borrow_mut().responses = merged;
                tracing::debug!(stored = stored.len(), live = live.len(), "survey replayed");
                let tracker = SurveyTracker { inner };
                if diverged {
                    tracker.persist();
                }
                tracker.refresh_progress();
            });
    }

    fn bind_text_inputs(&self) {
        let delay = TimingConfig::ms(self.inner.ctx.timing().survey_input_debounce_ms);
        let controls: Vec<ElementId> = {
            let page = self.inner.ctx.page.borrow();
            self.inner
                .questions
                .iter()
                .flat_map(|q| page.form_controls(q.card))
                .filter(|id| !is_checkable(&page[*id]))
                .collect()
        };
        let mut map = self.inner.text_inputs.borrow_mut();
        for control in controls {
            let weak: Weak<SurveyInner> = Rc::downgrade(&self.inner);
            let debounced = Debounced::new(&self.inner.ctx.scheduler, delay, move |()| {
                if let Some(inner) = weak.upgrade() {
                    SurveyTracker { inner }.record_response(control);
                }
            });
            map.insert(control, debounced);
        }
    }

    fn question_of(&self, control: ElementId) -> Option<Question> {
        let card = self.card_of(control)?;
        self.inner.questions.iter().find(|q| q.card == card).cloned()
    }

    fn card_of(&self, id: ElementId) -> Option<ElementId> {
        self.inner
            .ctx
            .page
            .borrow()
            .closest(id, &Selector::class("question-card"))
    }

    /// Outline a changed card in green for a moment.
    fn highlight(&self, card: ElementId) {
        let ctx = &self.inner.ctx;
        ctx.page.borrow_mut()[card].set_style("border-color", HIGHLIGHT_COLOR);
        let page = Rc::clone(&ctx.page);
        ctx.scheduler.schedule(
            TimingConfig::ms(ctx.timing().card_highlight_ms),
            move || {
                let mut page = page.borrow_mut();
                if page[card].style("border-color") == Some(HIGHLIGHT_COLOR) {
                    page[card].set_style("border-color", "");
                }
            },
        );
    }

    fn go_to_next(&self, button: ElementId) -> bool {
        let mut page = self.inner.ctx.page.borrow_mut();
        let Some(index) = page
            .get(button)
            .and_then(|el| el.attr(NEXT_QUESTION_ATTR))
            .and_then(|v| v.parse::<usize>().ok())
        else {
            return false;
        };
        let Some(next) = self.inner.questions.get(index) else {
            return false;
        };
        page.scroll_into_view(next.card, self.inner.ctx.timing().scroll_offset_px);
        true
    }
}

/// Append a "next question" button to every card but the last.
fn add_navigation(page: &mut Page, questions: &[Question], label: &str) {
    let last = questions.len().saturating_sub(1);
    for (index, question) in questions.iter().enumerate().take(last) {
        let host = page
            .query(question.card, &Selector::class("card-body"))
            .unwrap_or(question.card);
        page.append(
            host,
            Element::new("button")
                .with_attr("type", "button")
                .with_class("btn btn-outline-primary btn-sm mt-3")
                .with_attr(NEXT_QUESTION_ATTR, &(index + 1).to_string())
                .with_text(label),
        );
    }
}

fn render_progress(page: &mut Page, pct: u8) {
    let root = page.root();
    if let Some(bar) = page.query(root, &Selector::class("progress-bar")) {
        let bar = &mut page[bar];
        bar.set_style("width", format!("{pct}%"));
        bar.set_class("bg-success", pct == 100);
    }
    if let Some(label) = page.query(root, &Selector::class("progress-percentage")) {
        page[label].text = format!("{pct}%");
    }
}

fn flag(card: &mut Element) {
    card.set_style("border-color", FLAG_COLOR);
    card.add_class(SHAKE_CLASS);
}

fn clear_flag(card: &mut Element) {
    if card.style("border-color") == Some(FLAG_COLOR) {
        card.set_style("border-color", "");
    }
    card.remove_class(SHAKE_CLASS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Level;
    use gtrack_core::scheduler::Scheduler;
    use gtrack_runtime::config::TrackerConfig;
    use gtrack_runtime::persistence::{LatentStore, MemoryStorage, PersistenceAdapter, StorageBackend};
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        ctx: Context,
        radios: Vec<Vec<ElementId>>,
        cards: Vec<ElementId>,
        bar: ElementId,
        label: ElementId,
    }

    /// `n` single-choice required questions with two options each.
    fn fixture(n: usize) -> Fixture {
        fixture_on(n, Context::for_page)
    }

    fn fixture_on(n: usize, make_ctx: impl FnOnce(Page) -> Context) -> Fixture {
        let mut page = Page::new();
        let root = page.root();
        let bar = page.append(root, Element::new("div").with_class("progress-bar"));
        let label = page.append(root, Element::new("span").with_class("progress-percentage"));
        let form = page.append(root, Element::new("form").with_id(SURVEY_FORM_ID));
        let mut radios = Vec::new();
        let mut cards = Vec::new();
        for q in 0..n {
            let card = page.append(
                form,
                Element::new("div")
                    .with_class("card question-card")
                    .with_attr(QUESTION_ATTR, &format!("q{q}"))
                    .at(1000 * q as i64 + 500, 300),
            );
            let body = page.append(card, Element::new("div").with_class("card-body"));
            let name = format!("question_{q}");
            let options = ["yes", "no"]
                .iter()
                .map(|v| {
                    page.append(
                        body,
                        Element::input(InputKind::Radio, &name)
                            .with_attr("value", v)
                            .required(),
                    )
                })
                .collect();
            radios.push(options);
            cards.push(card);
        }
        Fixture {
            ctx: make_ctx(page),
            radios,
            cards,
            bar,
            label,
        }
    }

    fn answer(f: &Fixture, tracker: &SurveyTracker, q: usize, option: usize) {
        let id = f.radios[q][option];
        f.ctx.page.borrow_mut()[id].checked = true;
        tracker.handle_event(&PageEvent::change(id));
    }

    #[test]
    fn half_answered_is_fifty_percent() {
        let f = fixture(4);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        answer(&f, &tracker, 0, 0);
        answer(&f, &tracker, 1, 1);
        assert_eq!(tracker.percentage(), 50);
        let page = f.ctx.page.borrow();
        assert_eq!(page[f.bar].style("width"), Some("50%"));
        assert_eq!(page[f.label].text, "50%");
        assert!(!page[f.bar].has_class("bg-success"));
    }

    #[test]
    fn completion_notice_fires_once() {
        let f = fixture(4);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        for q in 0..4 {
            answer(&f, &tracker, q, 0);
        }
        answer(&f, &tracker, 2, 1);
        assert_eq!(tracker.percentage(), 100);
        assert!(f.ctx.page.borrow()[f.bar].has_class("bg-success"));

        assert!(f.ctx.notifications.is_empty());
        f.ctx.scheduler.advance(Duration::from_millis(500));
        assert_eq!(f.ctx.notifications.visible_with_level(Level::Success).len(), 1);
        f.ctx.scheduler.run_until_idle();
        assert_eq!(f.ctx.notifications.stats().total_shown, 1);
    }

    #[test]
    fn responses_persist_and_replay() {
        let f = fixture(3);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        answer(&f, &tracker, 1, 1);
        let stored = f
            .ctx
            .persistence
            .load::<ResponseSet>(RESPONSES_KEY)
            .value()
            .flatten()
            .unwrap();
        assert_eq!(
            stored["q1"]["question_1"],
            FieldValue::Single("no".into())
        );

        {
            let mut page = f.ctx.page.borrow_mut();
            for option in f.radios.iter().flatten() {
                page[*option].checked = false;
            }
        }
        let replayed = SurveyTracker::attach(&f.ctx).unwrap();
        assert!(f.ctx.page.borrow()[f.radios[1][1]].checked);
        assert_eq!(replayed.answered_questions(), 1);
        assert_eq!(replayed.percentage(), 33);
    }

    /// Services over a store that completes every operation after 50ms.
    fn latent_context(page: Page, scheduler: &Scheduler, backend: &Arc<MemoryStorage>) -> Context {
        let store = LatentStore::new(backend.clone(), scheduler, Duration::from_millis(50));
        Context::new(
            scheduler.clone(),
            page.into_shared(),
            PersistenceAdapter::new(store),
            TrackerConfig::default(),
        )
    }

    #[test]
    fn answer_given_before_replay_resolves_is_kept() {
        let scheduler = Scheduler::new();
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set_item(RESPONSES_KEY, r#"{"q0":{"question_0":"yes"}}"#)
            .unwrap();
        let f = fixture_on(4, |page| latent_context(page, &scheduler, &backend));
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();

        answer(&f, &tracker, 1, 1);
        assert_eq!(tracker.percentage(), 25);

        f.ctx.scheduler.run_until_idle();
        assert_eq!(tracker.percentage(), 50);
        {
            let page = f.ctx.page.borrow();
            assert!(page[f.radios[0][0]].checked);
            assert!(page[f.radios[1][1]].checked);
        }
        let stored: ResponseSet =
            serde_json::from_str(&backend.get_item(RESPONSES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, tracker.responses());
        assert_eq!(stored["q1"]["question_1"], FieldValue::Single("no".into()));
        assert_eq!(stored["q0"]["question_0"], FieldValue::Single("yes".into()));
    }

    #[test]
    fn stored_answers_are_dropped_when_confirmed_before_replay() {
        let scheduler = Scheduler::new();
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set_item(RESPONSES_KEY, r#"{"q0":{"question_0":"yes"}}"#)
            .unwrap();
        let f = fixture_on(2, |page| latent_context(page, &scheduler, &backend));
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();

        tracker.confirm_submitted();
        f.ctx.scheduler.run_until_idle();
        assert!(tracker.responses().is_empty());
        assert!(!f.ctx.page.borrow()[f.radios[0][0]].checked);
        assert_eq!(backend.get_item(RESPONSES_KEY).unwrap(), None);
    }

    #[test]
    fn checkbox_responses_toggle_in_a_list() {
        let mut page = Page::new();
        let form = page.append(page.root(), Element::new("form").with_id(SURVEY_FORM_ID));
        let card = page.append(
            form,
            Element::new("div")
                .with_class("question-card")
                .with_attr(QUESTION_ATTR, "skills"),
        );
        let boxes: Vec<ElementId> = ["a", "b"]
            .iter()
            .map(|v| page.append(card, Element::input(InputKind::Checkbox, "s").with_attr("value", v)))
            .collect();
        let ctx = Context::for_page(page);
        let tracker = SurveyTracker::attach(&ctx).unwrap();

        for id in &boxes {
            ctx.page.borrow_mut()[*id].checked = true;
            tracker.record_response(*id);
        }
        ctx.page.borrow_mut()[boxes[0]].checked = false;
        tracker.record_response(boxes[0]);
        assert_eq!(
            tracker.responses()["skills"]["s"],
            FieldValue::List(vec!["b".into()])
        );

        ctx.page.borrow_mut()[boxes[1]].checked = false;
        tracker.record_response(boxes[1]);
        assert_eq!(tracker.percentage(), 0);
    }

    #[test]
    fn text_answers_go_through_debounce() {
        let mut page = Page::new();
        let form = page.append(page.root(), Element::new("form").with_id(SURVEY_FORM_ID));
        let card = page.append(
            form,
            Element::new("div")
                .with_class("question-card")
                .with_attr(QUESTION_ATTR, "feedback"),
        );
        let text = page.append(card, Element::input(InputKind::TextArea, "comment"));
        let ctx = Context::for_page(page);
        let tracker = SurveyTracker::attach(&ctx).unwrap();

        ctx.page.borrow_mut()[text].value = "جيد".into();
        assert!(tracker.handle_event(&PageEvent::input(text)));
        assert_eq!(tracker.percentage(), 0);
        ctx.scheduler.advance(Duration::from_millis(500));
        assert_eq!(tracker.percentage(), 100);
    }

    #[test]
    fn blocked_submit_flags_cards_and_raises_one_error() {
        let f = fixture(3);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        answer(&f, &tracker, 0, 0);

        let outcome = tracker.submit();
        assert_eq!(
            outcome,
            SubmitOutcome::Blocked {
                invalid: vec![f.cards[1], f.cards[2]]
            }
        );
        let page = f.ctx.page.borrow();
        assert_eq!(page[f.cards[1]].style("border-color"), Some(FLAG_COLOR));
        assert!(page[f.cards[2]].has_class(SHAKE_CLASS));
        assert!(!page[f.cards[0]].has_class(SHAKE_CLASS));
        assert_eq!(page.scroll_top(), 1400);
        drop(page);
        assert_eq!(f.ctx.notifications.visible_with_level(Level::Error).len(), 1);
    }

    #[test]
    fn confirmed_submit_clears_store() {
        let f = fixture(1);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        answer(&f, &tracker, 0, 0);
        assert_eq!(tracker.submit(), SubmitOutcome::Forwarded);
        tracker.confirm_submitted();
        assert_eq!(
            f.ctx.persistence.load::<ResponseSet>(RESPONSES_KEY).value(),
            Some(None)
        );
        assert!(tracker.responses().is_empty());
    }

    #[test]
    fn highlight_fades_after_a_second() {
        let f = fixture(2);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        answer(&f, &tracker, 0, 0);
        assert_eq!(
            f.ctx.page.borrow()[f.cards[0]].style("border-color"),
            Some(HIGHLIGHT_COLOR)
        );
        f.ctx.scheduler.advance(Duration::from_millis(1000));
        assert_eq!(f.ctx.page.borrow()[f.cards[0]].style("border-color"), None);
    }

    #[test]
    fn next_button_scrolls_to_following_card() {
        let f = fixture(3);
        let tracker = SurveyTracker::attach(&f.ctx).unwrap();
        let button = {
            let page = f.ctx.page.borrow();
            page.query(f.cards[0], &Selector::has_attr(NEXT_QUESTION_ATTR))
                .unwrap()
        };
        assert!(tracker.handle_event(&PageEvent::click(button)));
        assert_eq!(f.ctx.page.borrow().scroll_top(), 1400);
        let page = f.ctx.page.borrow();
        assert!(page.query(f.cards[2], &Selector::has_attr(NEXT_QUESTION_ATTR)).is_none());
    }

    proptest! {
        #[test]
        fn percentage_is_floor_and_bounded(answered in 0usize..50, total in 1usize..50) {
            let pct = percentage(answered, total);
            prop_assert!(pct <= 100);
            prop_assert_eq!(pct as usize, answered.min(total) * 100 / total);
        }
    }
}
