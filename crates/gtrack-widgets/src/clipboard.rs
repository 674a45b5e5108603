#![forbid(unsafe_code)]

//! Copy-to-clipboard with a manual-copy fallback.
//!
//! When no clipboard capability is present, or it refuses the write, the
//! text is placed in an invisible, focused textarea appended to the page so
//! the user can copy it by hand.

use std::cell::RefCell;
use std::fmt;

use gtrack_core::page::{Element, ElementId, InputKind, Page};

pub const FALLBACK_CLASS: &str = "clipboard-fallback";

/// Clipboard errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    NotAvailable,
    WriteError(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAvailable => write!(f, "clipboard not available"),
            Self::WriteError(msg) => write!(f, "clipboard write failed: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

/// The host's clipboard capability.
pub trait ClipboardWriter {
    /// # Errors
    ///
    /// Returns [`ClipboardError`] when the text could not be written.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// In-process clipboard.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: RefCell<Option<String>>,
    unavailable: bool,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that refuses every write.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            contents: RefCell::new(None),
            unavailable: true,
        }
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.unavailable {
            return Err(ClipboardError::NotAvailable);
        }
        *self.contents.borrow_mut() = Some(text.to_string());
        Ok(())
    }
}

/// Where copied text ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Clipboard,
    /// The textarea holding the text for manual copy.
    ManualFallback(ElementId),
}

/// Copy `text`, falling back to a selected textarea on the page.
pub fn copy_to_clipboard(
    page: &mut Page,
    clipboard: Option<&dyn ClipboardWriter>,
    text: &str,
) -> CopyOutcome {
    let result = clipboard.map_or(Err(ClipboardError::NotAvailable), |c| c.write_text(text));
    match result {
        Ok(()) => CopyOutcome::Clipboard,
        Err(err) => {
            tracing::debug!(error = %err, "clipboard fallback");
            let mut area = Element::input(InputKind::TextArea, "")
                .with_class(FALLBACK_CLASS)
                .with_attr("readonly", "")
                .with_attr("aria-hidden", "true")
                .with_value(text);
            area.set_style("position", "fixed");
            area.set_style("opacity", "0");
            let root = page.root();
            let id = page.append(root, area);
            page.focus(id);
            CopyOutcome::ManualFallback(id)
        }
    }
}
