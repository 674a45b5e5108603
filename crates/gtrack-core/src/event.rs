#![forbid(unsafe_code)]

//! Page events delivered to the engine.

use crate::page::ElementId;

/// Keys the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab,
    Enter,
    Other(String),
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The value of a control changed while typing.
    Input,
    /// A committed change (selection, checkbox toggle, leaving a field).
    Change,
    Focus,
    Blur,
    Click,
    /// A form submit attempt.
    Submit,
    KeyDown { key: Key, shift: bool },
    PointerEnter,
    PointerLeave,
    /// The viewport moved or was resized.
    Scroll { top: i64, height: i64 },
}

/// An event aimed at one element of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEvent {
    pub target: ElementId,
    pub kind: EventKind,
}

impl PageEvent {
    #[must_use]
    pub fn new(target: ElementId, kind: EventKind) -> Self {
        Self { target, kind }
    }

    #[must_use]
    pub fn input(target: ElementId) -> Self {
        Self::new(target, EventKind::Input)
    }

    #[must_use]
    pub fn change(target: ElementId) -> Self {
        Self::new(target, EventKind::Change)
    }

    #[must_use]
    pub fn focus(target: ElementId) -> Self {
        Self::new(target, EventKind::Focus)
    }

    #[must_use]
    pub fn blur(target: ElementId) -> Self {
        Self::new(target, EventKind::Blur)
    }

    #[must_use]
    pub fn click(target: ElementId) -> Self {
        Self::new(target, EventKind::Click)
    }

    #[must_use]
    pub fn submit(form: ElementId) -> Self {
        Self::new(form, EventKind::Submit)
    }

    #[must_use]
    pub fn key(target: ElementId, key: Key, shift: bool) -> Self {
        Self::new(target, EventKind::KeyDown { key, shift })
    }

    /// Short label used in logs and fault contexts.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self.kind {
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::Click => "click",
            EventKind::Submit => "submit",
            EventKind::KeyDown { .. } => "keydown",
            EventKind::PointerEnter => "pointerenter",
            EventKind::PointerLeave => "pointerleave",
            EventKind::Scroll { .. } => "scroll",
        }
    }
}
