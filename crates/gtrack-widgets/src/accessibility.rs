#![forbid(unsafe_code)]

//! Accessibility helpers: aria labels, roving tabindex, keyboard handling.

use gtrack_core::event::{EventKind, Key, PageEvent};
use gtrack_core::page::{Element, ElementId, InputKind, Page, Selector};

pub const DYNAMIC_ATTR: &str = "data-dynamic";

fn interactive() -> Selector {
    ["button", "a", "input", "select", "textarea"]
        .into_iter()
        .map(Selector::tag)
        .reduce(Selector::or)
        .unwrap_or_else(|| Selector::tag("button"))
}

/// Give every unlabelled interactive element an `aria-label` taken from its
/// text, value or placeholder. Returns the number of elements stamped.
pub fn stamp_aria_labels(page: &mut Page) -> usize {
    let root = page.root();
    let mut stamped = 0;
    for id in page.query_all(root, &interactive()) {
        let el = &page[id];
        if el.has_attr("aria-label") || el.has_attr("aria-labelledby") {
            continue;
        }
        let text = page.text_content(id);
        let label = [text.as_str(), el.value.as_str(), el.attr("placeholder").unwrap_or("")]
            .into_iter()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(label) = label {
            page[id].set_attr("aria-label", label);
            stamped += 1;
        }
    }
    stamped
}

/// Candidates for a roving tabindex inside a dynamic container.
fn is_roving_candidate(el: &Element) -> bool {
    if el.attr("tabindex").is_some_and(|t| t.trim() != "-1") || el.has_attr("href") {
        return true;
    }
    match el.tag.as_str() {
        "button" | "select" | "textarea" => true,
        "input" => el.kind != Some(InputKind::Hidden),
        _ => false,
    }
}

/// First candidate gets `tabindex="0"`, the rest `-1`. Returns the number
/// of candidates.
pub fn update_focusable(page: &mut Page, container: ElementId) -> usize {
    let candidates: Vec<ElementId> = page
        .descendants(container)
        .into_iter()
        .filter(|id| is_roving_candidate(&page[*id]))
        .collect();
    for (index, id) in candidates.iter().enumerate() {
        page[*id].set_attr("tabindex", if index == 0 { "0" } else { "-1" });
    }
    candidates.len()
}

/// Refresh the dynamic container enclosing a mutated element.
pub fn on_mutation(page: &mut Page, mutated: ElementId) -> bool {
    match page.closest(mutated, &Selector::has_attr(DYNAMIC_ATTR)) {
        Some(container) => {
            update_focusable(page, container);
            true
        }
        None => false,
    }
}

/// Close every open modal. Returns the number closed.
pub fn close_modals(page: &mut Page) -> usize {
    let root = page.root();
    let open: Vec<ElementId> = page
        .query_all(root, &Selector::class("modal"))
        .into_iter()
        .filter(|id| page[*id].has_class("show"))
        .collect();
    for &id in &open {
        let modal = &mut page[id];
        modal.remove_class("show");
        modal.set_style("display", "none");
        modal.set_attr("aria-hidden", "true");
    }
    open.len()
}

/// Move focus one step through the focusable order, wrapping at both ends.
pub fn move_focus(page: &mut Page, backward: bool) -> Option<ElementId> {
    let order = page.focusable_order();
    let last = order.len().checked_sub(1)?;
    let current = page.focused().and_then(|f| order.iter().position(|id| *id == f));
    let next = match (current, backward) {
        (None, false) => 0,
        (None, true) => last,
        (Some(0), true) => last,
        (Some(i), true) => i - 1,
        (Some(i), false) if i == last => 0,
        (Some(i), false) => i + 1,
    };
    let target = order[next];
    page.focus(target);
    Some(target)
}

/// Initialise labels and every dynamic container.
pub fn init(page: &mut Page) {
    let stamped = stamp_aria_labels(page);
    let root = page.root();
    for container in page.query_all(root, &Selector::has_attr(DYNAMIC_ATTR)) {
        update_focusable(page, container);
    }
    tracing::debug!(stamped, "accessibility initialised");
}

/// Route a key event. Returns `false` for keys without behavior.
pub fn handle_event(page: &mut Page, event: &PageEvent) -> bool {
    let EventKind::KeyDown { key, shift } = &event.kind else {
        return false;
    };
    match key {
        Key::Escape => {
            close_modals(page);
            page.blur();
            true
        }
        Key::Tab => move_focus(page, *shift).is_some(),
        _ => false,
    }
}
