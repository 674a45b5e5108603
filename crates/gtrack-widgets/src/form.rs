#![forbid(unsafe_code)]

//! Form enhancement: validation, input formatting, auto-save and restore.
//!
//! # Architecture
//!
//! ```text
//!  input/change ──► mark_dirty ──► Debounced(1000ms) ──► capture ──► PersistenceAdapter::save
//!                        │                                               │
//!                        ▼                                               ▼
//!                  state = Dirty                         Written + same generation ⇒ Saved
//!
//!  attach ──► load(form_<key>) ──► apply fields not edited since (one shot)
//!  submit ──► validate all ──► Blocked (focus first, one error) | Forwarded (loading buttons)
//!  confirm_submitted / clear ──► cancel debounce, remove snapshot, state = Idle
//! ```
//!
//! # Design Invariants
//!
//! 1. A snapshot is overwritten wholesale on every save; there is at most one
//!    per form key.
//! 2. Restore runs at most once per controller, and never overwrites a field
//!    the user edited while the load was in flight.
//! 3. `Saved` is only reached when the write issued for the latest mutation
//!    lands; a mutation in between keeps the form `Dirty`.
//! 4. No snapshot is written while the restore load is pending; a save that
//!    comes due meanwhile is re-armed once the load resolves.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Corrupt stored snapshot | Treated as absent by the adapter, nothing restored |
//! | Store write fails | Logged at warn, form stays `Dirty` |
//! | Snapshot names an unknown field | Ignored |
//! | Load resolves after the user typed | Edited fields keep their input, the merged form is saved |
//! | Load resolves after `clear` | Discarded |

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{Element, ElementId, InputKind, Page, Selector};
use gtrack_core::timing::Debounced;
use gtrack_runtime::config::TimingConfig;
use gtrack_runtime::persistence::{WriteHandle, WriteOutcome};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::validation::{
    FieldRules, ValidationResult, format_national_id, format_phone_number, validate_element,
};

/// Attribute that opts a form into auto-save; its value is the form key.
pub const AUTOSAVE_ATTR: &str = "data-autosave";

/// Class added to the parent of a focused (or filled) field.
pub const FOCUSED_CLASS: &str = "input-focused";

// ---------------------------------------------------------------------------
// Snapshot model
// ---------------------------------------------------------------------------

/// A stored field value: one value, or every value of a repeated name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Whether `candidate` is (one of) the stored values.
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            Self::Single(value) => value == candidate,
            Self::List(values) => values.iter().any(|v| v == candidate),
        }
    }

    /// Add a value for a repeated name, promoting a single value to a list.
    pub fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                let first = std::mem::take(first);
                *self = Self::List(vec![first, value]);
            }
            Self::List(values) => values.push(value),
        }
    }

    /// Text assigned to a single value control.
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::List(values) => values.join(","),
        }
    }
}

/// Stored field values keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// The persisted state of one auto-saved form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    pub form_key: String,
    pub fields: FieldMap,
}

impl FormSnapshot {
    /// Storage key for a form key.
    #[must_use]
    pub fn storage_key_for(form_key: &str) -> String {
        format!("form_{form_key}")
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        Self::storage_key_for(&self.form_key)
    }

    /// Capture the successful controls of `form`.
    #[must_use]
    pub fn capture(page: &Page, form: ElementId, form_key: &str) -> Self {
        let mut fields = FieldMap::new();
        for (name, value) in page.form_entries(form) {
            match fields.get_mut(&name) {
                Some(existing) => existing.push(value),
                None => {
                    fields.insert(name, FieldValue::Single(value));
                }
            }
        }
        Self {
            form_key: form_key.to_string(),
            fields,
        }
    }

    /// Write the stored values back into `form`. Returns the number of
    /// controls touched.
    ///
    /// Radios and checkboxes are checked by membership; other controls get
    /// the value assigned. Several same-named value controls paired with a
    /// list are filled positionally.
    pub fn apply(&self, page: &mut Page, form: ElementId) -> usize {
        self.apply_except(page, form, &BTreeSet::new())
    }

    /// Like [`apply`](Self::apply), leaving the fields named in `skip` alone.
    pub fn apply_except(&self, page: &mut Page, form: ElementId, skip: &BTreeSet<String>) -> usize {
        let mut touched = 0;
        for (name, value) in self.fields.iter().filter(|(name, _)| !skip.contains(*name)) {
            let controls: Vec<ElementId> = page
                .query_all(form, &Selector::attr_eq("name", name))
                .into_iter()
                .filter(|id| page[*id].kind.is_some())
                .collect();
            let value_controls: Vec<ElementId> = controls
                .iter()
                .copied()
                .filter(|id| !is_checkable(&page[*id]))
                .collect();

            for &id in &controls {
                if is_checkable(&page[id]) {
                    let own = checkable_value(&page[id]).to_string();
                    page[id].checked = value.contains(&own);
                    touched += 1;
                }
            }

            match value {
                FieldValue::List(items) if value_controls.len() > 1 => {
                    for (i, &id) in value_controls.iter().enumerate() {
                        page[id].value = items.get(i).cloned().unwrap_or_default();
                    }
                }
                _ => {
                    let text = value.joined();
                    for &id in &value_controls {
                        page[id].value = text.clone();
                    }
                }
            }
            touched += value_controls.len();
        }
        touched
    }
}

pub(crate) fn is_checkable(el: &Element) -> bool {
    el.kind.is_some_and(InputKind::is_checkable)
}

/// Value a radio or checkbox submits when checked.
pub(crate) fn checkable_value(el: &Element) -> &str {
    el.attr("value").unwrap_or("on")
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Auto-save lifecycle of one form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoSaveState {
    #[default]
    Idle,
    Dirty,
    Saved,
}

/// Result of a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// At least one field failed; nothing was submitted.
    Blocked { invalid: Vec<ElementId> },
    /// Every field passed; the submission goes to the server.
    Forwarded,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

#[derive(Debug, Default)]
struct AutoSaveShared {
    state: AutoSaveState,
    generation: u64,
    restore_requested: bool,
    restore_pending: bool,
    restore_cancelled: bool,
    /// An auto-save fired while the restore was pending.
    save_deferred: bool,
    restored_fields: usize,
    /// Names of fields changed by the user since attach.
    edited: BTreeSet<String>,
}

struct AutoSave {
    form_key: String,
    trigger: Debounced<()>,
    shared: Rc<RefCell<AutoSaveShared>>,
}

/// Enhancement attached to one `<form>`.
pub struct FormController {
    ctx: Context,
    form: ElementId,
    autosave: Option<AutoSave>,
}

impl FormController {
    /// Attach to `form`: initialise floating labels and, for auto-save
    /// forms, restore the stored snapshot.
    pub fn attach(ctx: &Context, form: ElementId) -> Self {
        let form_key = {
            let mut page = ctx.page.borrow_mut();
            init_floating_labels(&mut page, form);
            page.get(form)
                .and_then(|el| el.attr(AUTOSAVE_ATTR))
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        };

        let autosave = form_key.map(|form_key| {
            let shared = Rc::new(RefCell::new(AutoSaveShared::default()));
            let trigger = Debounced::new(
                &ctx.scheduler,
                TimingConfig::ms(ctx.timing().autosave_debounce_ms),
                save_action(ctx.clone(), form, form_key.clone(), Rc::clone(&shared)),
            );
            AutoSave {
                form_key,
                trigger,
                shared,
            }
        });

        let controller = Self {
            ctx: ctx.clone(),
            form,
            autosave,
        };
        controller.restore();
        tracing::debug!(
            form = %form,
            autosave = controller.form_key().unwrap_or("-"),
            "form attached"
        );
        controller
    }

    /// Attach to every form on the page except those matching `exclude`.
    pub fn attach_all(ctx: &Context, exclude: Option<&Selector>) -> Vec<Self> {
        let forms: Vec<ElementId> = {
            let page = ctx.page.borrow();
            page.query_all(page.root(), &Selector::tag("form"))
                .into_iter()
                .filter(|id| exclude.is_none_or(|sel| !page.matches(*id, sel)))
                .collect()
        };
        forms.into_iter().map(|form| Self::attach(ctx, form)).collect()
    }

    #[must_use]
    pub fn form(&self) -> ElementId {
        self.form
    }

    /// The `data-autosave` key, when auto-save is on.
    #[must_use]
    pub fn form_key(&self) -> Option<&str> {
        self.autosave.as_ref().map(|a| a.form_key.as_str())
    }

    #[must_use]
    pub fn state(&self) -> AutoSaveState {
        self.autosave
            .as_ref()
            .map_or(AutoSaveState::Idle, |a| a.shared.borrow().state)
    }

    /// Controls filled in by the restore, once it has completed.
    #[must_use]
    pub fn restored_fields(&self) -> usize {
        self.autosave
            .as_ref()
            .map_or(0, |a| a.shared.borrow().restored_fields)
    }

    /// Whether `target` is this form or one of its descendants.
    #[must_use]
    pub fn owns(&self, target: ElementId) -> bool {
        target == self.form || self.ctx.page.borrow().contains(self.form, target)
    }

    /// Current field values.
    #[must_use]
    pub fn snapshot(&self) -> FormSnapshot {
        let page = self.ctx.page.borrow();
        FormSnapshot::capture(&page, self.form, self.form_key().unwrap_or_default())
    }

    /// Route a page event. Returns `false` when the event is not for this
    /// form.
    pub fn handle_event(&self, event: &PageEvent) -> bool {
        if !self.owns(event.target) {
            return false;
        }
        match &event.kind {
            EventKind::Input => {
                self.format_input(event.target);
                self.record_edit(event.target);
                self.mark_dirty();
            }
            EventKind::Change => {
                self.record_edit(event.target);
                self.mark_dirty();
            }
            EventKind::Focus => self.on_focus(event.target),
            EventKind::Blur => self.on_blur(event.target),
            EventKind::Submit if event.target == self.form => {
                self.submit();
            }
            _ => return false,
        }
        true
    }

    /// Record a mutation and (re)start the auto-save debounce.
    pub fn mark_dirty(&self) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        {
            let mut shared = autosave.shared.borrow_mut();
            shared.state = AutoSaveState::Dirty;
            shared.generation += 1;
        }
        autosave.trigger.trigger(());
    }

    fn record_edit(&self, target: ElementId) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        let name = self.ctx.page.borrow().get(target).and_then(Element::name).map(str::to_string);
        if let Some(name) = name {
            autosave.shared.borrow_mut().edited.insert(name);
        }
    }

    /// Run a pending auto-save immediately.
    pub fn save_now(&self) -> bool {
        self.autosave.as_ref().is_some_and(|a| a.trigger.flush())
    }

    /// Load the stored snapshot into the form. Only the first call has an
    /// effect.
    pub fn restore(&self) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        {
            let mut shared = autosave.shared.borrow_mut();
            if shared.restore_requested {
                return;
            }
            shared.restore_requested = true;
            shared.restore_pending = true;
        }

        let key = FormSnapshot::storage_key_for(&autosave.form_key);
        let form_key = autosave.form_key.clone();
        let page = Rc::clone(&self.ctx.page);
        let shared = Rc::clone(&autosave.shared);
        let trigger = autosave.trigger.clone();
        let form = self.form;
        self.ctx
            .persistence
            .load::<FieldMap>(&key)
            .then(move |fields: &Option<FieldMap>| {
                let (cancelled, edited, deferred) = {
                    let mut shared = shared.borrow_mut();
                    shared.restore_pending = false;
                    (
                        shared.restore_cancelled,
                        shared.edited.clone(),
                        std::mem::take(&mut shared.save_deferred),
                    )
                };
                if cancelled {
                    return;
                }
                let touched = match fields {
                    Some(fields) => {
                        let snapshot = FormSnapshot {
                            form_key,
                            fields: fields.clone(),
                        };
                        let mut page = page.borrow_mut();
                        let touched = snapshot.apply_except(&mut page, form, &edited);
                        init_floating_labels(&mut page, form);
                        tracing::debug!(
                            key = %snapshot.storage_key(),
                            touched,
                            kept = edited.len(),
                            "form restored"
                        );
                        touched
                    }
                    None => 0,
                };
                let merged = touched > 0 && !edited.is_empty();
                {
                    let mut shared = shared.borrow_mut();
                    shared.restored_fields = touched;
                    if merged {
                        shared.state = AutoSaveState::Dirty;
                        shared.generation += 1;
                    }
                }
                if merged || deferred {
                    trigger.trigger(());
                }
            });
    }

    /// Validate every control; block or forward the submission.
    pub fn submit(&self) -> SubmitOutcome {
        let messages = self.ctx.messages();
        let mut invalid = Vec::new();
        {
            let mut page = self.ctx.page.borrow_mut();
            for id in page.form_controls(self.form) {
                if page[id].kind == Some(InputKind::Hidden) {
                    continue;
                }
                if let ValidationResult::Invalid(_) = validate_element(&mut page, id, messages) {
                    invalid.push(id);
                }
            }

            if let Some(&first) = invalid.first() {
                page.scroll_into_view(first, self.ctx.timing().scroll_offset_px);
                page.focus(first);
            } else {
                for button in page.query_all(self.form, &Selector::attr_eq("type", "submit")) {
                    if page[button].tag == "button" {
                        show_loading(&mut page[button]);
                    }
                }
            }
        }

        if invalid.is_empty() {
            tracing::debug!(form = %self.form, "submit forwarded");
            SubmitOutcome::Forwarded
        } else {
            self.ctx.notifications.error(messages.form_has_errors.as_str());
            tracing::debug!(form = %self.form, invalid = invalid.len(), "submit blocked");
            SubmitOutcome::Blocked { invalid }
        }
    }

    /// The server accepted the submission: drop the stored snapshot.
    pub fn confirm_submitted(&self) -> Option<WriteHandle> {
        let handle = self.clear();
        let mut page = self.ctx.page.borrow_mut();
        for button in page.query_all(self.form, &Selector::attr_eq("type", "submit")) {
            hide_loading(&mut page[button]);
        }
        handle
    }

    /// Cancel any pending save and remove the stored snapshot.
    pub fn clear(&self) -> Option<WriteHandle> {
        let autosave = self.autosave.as_ref()?;
        autosave.trigger.cancel();
        {
            let mut shared = autosave.shared.borrow_mut();
            shared.state = AutoSaveState::Idle;
            shared.generation += 1;
            shared.restore_cancelled = true;
        }
        let key = FormSnapshot::storage_key_for(&autosave.form_key);
        tracing::debug!(%key, "form snapshot cleared");
        Some(self.ctx.persistence.clear(&key))
    }

    fn format_input(&self, id: ElementId) {
        let mut page = self.ctx.page.borrow_mut();
        let Some(el) = page.get_mut(id) else {
            return;
        };
        if !el.kind.is_some_and(InputKind::is_text_like) {
            return;
        }
        let rules = FieldRules::for_element(el);
        if rules.phone {
            el.value = format_phone_number(&el.value);
        } else if rules.national_id {
            el.value = format_national_id(&el.value);
        }
    }

    fn on_focus(&self, id: ElementId) {
        let mut page = self.ctx.page.borrow_mut();
        let parent = match page.get(id) {
            Some(el) if el.kind.is_some() && !is_checkable(el) => el.parent(),
            _ => None,
        };
        if let Some(parent) = parent {
            page[parent].add_class(FOCUSED_CLASS);
        }
    }

    fn on_blur(&self, id: ElementId) {
        let mut page = self.ctx.page.borrow_mut();
        let parent = match page.get(id) {
            Some(el) if el.kind.is_some() => el.parent().filter(|_| !is_checkable(el) && el.value.is_empty()),
            _ => return,
        };
        if let Some(parent) = parent {
            page[parent].remove_class(FOCUSED_CLASS);
        }
        validate_element(&mut page, id, self.ctx.messages());
    }
}

fn save_action(
    ctx: Context,
    form: ElementId,
    form_key: String,
    shared: Rc<RefCell<AutoSaveShared>>,
) -> impl FnMut(()) + 'static {
    move |()| {
        {
            let mut shared = shared.borrow_mut();
            if shared.restore_pending {
                shared.save_deferred = true;
                return;
            }
        }
        let snapshot = {
            let page = ctx.page.borrow();
            FormSnapshot::capture(&page, form, &form_key)
        };
        let generation = shared.borrow().generation;
        let key = snapshot.storage_key();
        let handle = ctx.persistence.save(&key, &snapshot.fields);
        let shared = Rc::clone(&shared);
        handle.then(move |result| match result {
            Ok(WriteOutcome::Written) => {
                let mut shared = shared.borrow_mut();
                if shared.generation == generation && shared.state == AutoSaveState::Dirty {
                    shared.state = AutoSaveState::Saved;
                }
            }
            Ok(WriteOutcome::Superseded) => {}
            Err(err) => tracing::warn!(%key, error = %err, "auto-save failed"),
        });
    }
}

fn init_floating_labels(page: &mut Page, form: ElementId) {
    for id in page.form_controls(form) {
        let el = &page[id];
        if is_checkable(el) || el.value.is_empty() {
            continue;
        }
        if let Some(parent) = el.parent() {
            page[parent].add_class(FOCUSED_CLASS);
        }
    }
}

fn show_loading(button: &mut Element) {
    button.add_class("loading");
    button.disabled = true;
}

fn hide_loading(button: &mut Element) {
    button.remove_class("loading");
    button.disabled = false;
}
