#![forbid(unsafe_code)]

//! Scroll-in animations and hover effects.

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{Element, ElementId, Page, Selector};

pub const ANIMATE_ATTR: &str = "data-animate";
pub const HOVER_ATTR: &str = "data-hover";
pub const ANIMATE_IN_CLASS: &str = "animate-in";

/// Share of an element that must be visible before it animates in.
pub const INTERSECTION_THRESHOLD: f64 = 0.1;
/// The viewport's bottom edge is pulled up by this many pixels.
pub const BOTTOM_MARGIN_PX: i64 = 50;

/// Hover effect named by `data-hover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverEffect {
    Lift,
    Scale,
    Glow,
}

impl HoverEffect {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lift" => Some(Self::Lift),
            "scale" => Some(Self::Scale),
            "glow" => Some(Self::Glow),
            _ => None,
        }
    }

    fn apply(self, el: &mut Element) {
        match self {
            Self::Lift => {
                el.set_style("transform", "translateY(-5px)");
                el.set_style("box-shadow", "0 10px 25px rgba(0,0,0,0.15)");
            }
            Self::Scale => el.set_style("transform", "scale(1.05)"),
            Self::Glow => el.set_style("box-shadow", "0 0 20px rgba(102, 126, 234, 0.5)"),
        }
    }
}

fn clear_hover(el: &mut Element) {
    el.set_style("transform", "");
    el.set_style("box-shadow", "");
}

/// Whether enough of `el` lies inside the observed viewport band.
#[must_use]
pub fn intersects(el: &Element, scroll_top: i64, viewport_height: i64) -> bool {
    let band_top = scroll_top;
    let band_bottom = scroll_top + viewport_height - BOTTOM_MARGIN_PX;
    if band_bottom <= band_top {
        return false;
    }
    let top = el.offset_top;
    let bottom = el.offset_top + el.height.max(0);
    if el.height <= 0 {
        return top >= band_top && top < band_bottom;
    }
    let visible = (bottom.min(band_bottom) - top.max(band_top)).max(0);
    visible as f64 / el.height as f64 >= INTERSECTION_THRESHOLD
}

/// Mark every displayed `[data-animate]` element that now intersects the
/// viewport. Elements animate in once. Returns the newly marked elements.
pub fn observe(page: &mut Page) -> Vec<ElementId> {
    let (top, height) = (page.scroll_top(), page.viewport_height());
    let root = page.root();
    let mut marked = Vec::new();
    for id in page.query_all(root, &Selector::has_attr(ANIMATE_ATTR)) {
        if page[id].has_class(ANIMATE_IN_CLASS) || !page.is_displayed(id) {
            continue;
        }
        if intersects(&page[id], top, height) {
            page[id].add_class(ANIMATE_IN_CLASS);
            marked.push(id);
        }
    }
    marked
}

/// Route a page event. Returns `false` when no animation applies.
pub fn handle_event(page: &mut Page, event: &PageEvent) -> bool {
    match event.kind {
        EventKind::Scroll { top, height } => {
            page.set_viewport(top, height);
            let marked = observe(page);
            if !marked.is_empty() {
                tracing::debug!(count = marked.len(), "animated in");
            }
            true
        }
        EventKind::PointerEnter | EventKind::PointerLeave => {
            let Some(el) = page.get_mut(event.target) else {
                return false;
            };
            let Some(effect) = el.attr(HOVER_ATTR).and_then(HoverEffect::parse) else {
                return false;
            };
            if event.kind == EventKind::PointerEnter {
                effect.apply(el);
            } else {
                clear_hover(el);
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_and_bottom_margin() {
        let el = Element::new("div").at(700, 100);
        // Band is [0, 750): 50px of 100 visible.
        assert!(intersects(&el, 0, 800));
        let el = Element::new("div").at(745, 100);
        // 5px of 100 visible.
        assert!(!intersects(&el, 0, 800));
        let el = Element::new("div").at(740, 100);
        assert!(intersects(&el, 0, 800));
    }

    #[test]
    fn scroll_marks_once() {
        let mut page = Page::new();
        let root = page.root();
        let near = page.append(root, Element::new("section").with_attr(ANIMATE_ATTR, "").at(100, 200));
        let far = page.append(root, Element::new("section").with_attr(ANIMATE_ATTR, "").at(2000, 200));

        assert_eq!(observe(&mut page), vec![near]);
        assert!(observe(&mut page).is_empty());

        let scroll = PageEvent::new(root, EventKind::Scroll { top: 1600, height: 800 });
        assert!(handle_event(&mut page, &scroll));
        assert!(page[far].has_class(ANIMATE_IN_CLASS));
        assert_eq!(page.scroll_top(), 1600);
    }

    #[test]
    fn hover_effects_apply_and_clear() {
        let mut page = Page::new();
        let card = page.append(page.root(), Element::new("div").with_attr(HOVER_ATTR, "lift"));
        let plain = page.append(page.root(), Element::new("div"));

        assert!(handle_event(&mut page, &PageEvent::new(card, EventKind::PointerEnter)));
        assert_eq!(page[card].style("transform"), Some("translateY(-5px)"));
        assert!(handle_event(&mut page, &PageEvent::new(card, EventKind::PointerLeave)));
        assert_eq!(page[card].style("transform"), None);
        assert!(!handle_event(&mut page, &PageEvent::new(plain, EventKind::PointerEnter)));
    }
}
