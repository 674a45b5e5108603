#![forbid(unsafe_code)]

//! Debounced text search, attribute filters and the advanced search panel.

use std::collections::{BTreeMap, HashMap};

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{Element, ElementId, Page, Selector};
use gtrack_core::timing::Debounced;
use gtrack_runtime::config::{Messages, TimingConfig};

use crate::context::Context;

pub const SEARCH_ATTR: &str = "data-search";
pub const FILTER_ATTR: &str = "data-filter";
pub const FILTERABLE_ATTR: &str = "data-filterable";
pub const ADVANCED_TOGGLE_ID: &str = "advancedSearchToggle";
pub const ADVANCED_PANEL_ID: &str = "advancedSearchPanel";

fn set_shown(el: &mut Element, shown: bool) {
    el.hidden = !shown;
    el.set_style("display", if shown { "" } else { "none" });
}

/// Run a search for the value of `input` over the elements its
/// `data-search` selector names. Returns the number of matches.
///
/// Matching is a case-insensitive substring test on the text content; an
/// empty term shows everything and hides the result count.
pub fn perform_search(page: &mut Page, input: ElementId, messages: &Messages) -> usize {
    let Some(el) = page.get(input) else {
        return 0;
    };
    let term = el.value.to_lowercase();
    let Some(raw) = el.attr(SEARCH_ATTR) else {
        return 0;
    };
    let selector = match Selector::parse(raw) {
        Ok(selector) => selector,
        Err(err) => {
            tracing::warn!(selector = raw, error = %err, "invalid search target selector");
            return 0;
        }
    };

    let root = page.root();
    let targets = page.query_all(root, &selector);
    let mut matches = 0;
    for target in targets {
        let shown = page.text_content(target).to_lowercase().contains(&term);
        let el = &mut page[target];
        set_shown(el, shown);
        el.highlight = (shown && !term.is_empty()).then(|| term.clone());
        if shown {
            matches += 1;
        }
    }

    if let Some(count) = page.query(root, &Selector::class("search-results-count")) {
        let count = &mut page[count];
        if term.is_empty() {
            count.set_style("display", "none");
        } else {
            count.text = messages.search_summary(matches);
            count.set_style("display", "block");
        }
    }
    tracing::debug!(term = %term, matches, "search performed");
    matches
}

/// Current non-empty filter values keyed by category.
#[must_use]
pub fn active_filters(page: &Page) -> BTreeMap<String, String> {
    page.query_all(page.root(), &Selector::has_attr(FILTER_ATTR))
        .into_iter()
        .filter_map(|id| {
            let el = &page[id];
            let category = el.attr(FILTER_ATTR)?;
            (!el.value.is_empty()).then(|| (category.to_string(), el.value.clone()))
        })
        .collect()
}

/// Show `[data-filterable]` items whose `data-<category>` attributes agree
/// with every filter. Items without the attribute, or with it empty, pass.
/// Returns the number of items shown.
pub fn apply_filters(page: &mut Page, filters: &BTreeMap<String, String>) -> usize {
    let root = page.root();
    let mut shown_count = 0;
    for item in page.query_all(root, &Selector::has_attr(FILTERABLE_ATTR)) {
        let el = &mut page[item];
        let shown = filters
            .iter()
            .all(|(category, wanted)| match el.data(category) {
                None | Some("") => true,
                Some(value) => value == wanted.as_str(),
            });
        set_shown(el, shown);
        if shown {
            shown_count += 1;
        }
    }
    shown_count
}

/// Search inputs, filter selects and the advanced panel toggle.
pub struct SearchController {
    ctx: Context,
    inputs: HashMap<ElementId, Debounced<()>>,
}

impl SearchController {
    pub fn attach(ctx: &Context) -> Self {
        let delay = TimingConfig::ms(ctx.timing().search_debounce_ms);
        let ids = {
            let page = ctx.page.borrow();
            page.query_all(page.root(), &Selector::has_attr(SEARCH_ATTR))
        };
        let inputs = ids
            .into_iter()
            .map(|input| {
                let handler = ctx.clone();
                let debounced = Debounced::new(&ctx.scheduler, delay, move |()| {
                    let mut page = handler.page.borrow_mut();
                    perform_search(&mut page, input, handler.messages());
                });
                (input, debounced)
            })
            .collect();
        Self {
            ctx: ctx.clone(),
            inputs,
        }
    }

    /// Number of bound search inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Route a page event. Returns `false` when no search behavior applies.
    pub fn handle_event(&self, event: &PageEvent) -> bool {
        let target = event.target;
        match &event.kind {
            EventKind::Input => match self.inputs.get(&target) {
                Some(debounced) => {
                    debounced.trigger(());
                    true
                }
                None => false,
            },
            EventKind::Change => {
                let mut page = self.ctx.page.borrow_mut();
                if !page.get(target).is_some_and(|el| el.has_attr(FILTER_ATTR)) {
                    return false;
                }
                let filters = active_filters(&page);
                let shown = apply_filters(&mut page, &filters);
                tracing::debug!(filters = filters.len(), shown, "filters applied");
                true
            }
            EventKind::Click => {
                let is_toggle = {
                    let page = self.ctx.page.borrow();
                    page.closest(target, &Selector::id(ADVANCED_TOGGLE_ID)).is_some()
                };
                is_toggle && self.toggle_advanced().is_some()
            }
            _ => false,
        }
    }

    /// Show or hide the advanced search panel. Returns whether it is now
    /// visible, or `None` without a panel.
    pub fn toggle_advanced(&self) -> Option<bool> {
        let mut page = self.ctx.page.borrow_mut();
        let panel = page.find_by_dom_id(ADVANCED_PANEL_ID)?;
        let el = &mut page[panel];
        let visible = el.style("display") != Some("none") && !el.hidden;
        let now_visible = !visible;
        el.hidden = !now_visible;
        el.set_style("display", if now_visible { "block" } else { "none" });
        if now_visible {
            el.set_style("animation", "fadeInUp 0.3s ease-out");
        }
        Some(now_visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtrack_core::page::InputKind;
    use std::time::Duration;

    fn page_with_cards() -> (Page, ElementId, Vec<ElementId>, ElementId) {
        let mut page = Page::new();
        let root = page.root();
        let input = page.append(
            root,
            Element::input(InputKind::Text, "q").with_attr(SEARCH_ATTR, ".graduate-card"),
        );
        let count = page.append(root, Element::new("div").with_class("search-results-count"));
        let cards = ["Sara Ahmed", "Omar Saleh", "Sarah Khalid"]
            .iter()
            .map(|name| {
                let card = page.append(root, Element::new("div").with_class("graduate-card"));
                page.append(card, Element::new("h5").with_text(name));
                card
            })
            .collect();
        (page, input, cards, count)
    }

    #[test]
    fn search_hides_non_matches_and_counts() {
        let (mut page, input, cards, count) = page_with_cards();
        page[input].value = "SAR".into();
        let messages = Messages::default();
        assert_eq!(perform_search(&mut page, input, &messages), 2);
        assert!(page[cards[0]].highlight.is_some());
        assert!(page[cards[1]].hidden);
        assert_eq!(page[count].text, messages.search_summary(2));
        assert_eq!(page[count].style("display"), Some("block"));

        page[input].value.clear();
        assert_eq!(perform_search(&mut page, input, &messages), 3);
        assert!(page[cards[0]].highlight.is_none());
        assert_eq!(page[count].style("display"), Some("none"));
    }

    #[test]
    fn search_input_is_debounced() {
        let (page, input, cards, _) = page_with_cards();
        let ctx = Context::for_page(page);
        let search = SearchController::attach(&ctx);
        assert_eq!(search.input_count(), 1);

        ctx.page.borrow_mut()[input].value = "omar".into();
        assert!(search.handle_event(&PageEvent::input(input)));
        ctx.scheduler.advance(Duration::from_millis(200));
        assert!(!ctx.page.borrow()[cards[0]].hidden);
        assert!(search.handle_event(&PageEvent::input(input)));
        ctx.scheduler.advance(Duration::from_millis(300));
        assert!(ctx.page.borrow()[cards[0]].hidden);
    }

    #[test]
    fn empty_category_attribute_passes_filter() {
        let mut page = Page::new();
        let root = page.root();
        let blank = page.append(
            root,
            Element::new("div")
                .with_attr(FILTERABLE_ATTR, "")
                .with_attr("data-year", ""),
        );
        let other = page.append(
            root,
            Element::new("div")
                .with_attr(FILTERABLE_ATTR, "")
                .with_attr("data-year", "2021"),
        );
        let filters = BTreeMap::from([("year".to_string(), "2023".to_string())]);
        assert_eq!(apply_filters(&mut page, &filters), 1);
        assert!(!page[blank].hidden);
        assert!(page[other].hidden);
    }

    #[test]
    fn filters_combine_and_ignore_missing_attributes() {
        let mut page = Page::new();
        let root = page.root();
        let year = page.append(
            root,
            Element::input(InputKind::Select, "year").with_attr(FILTER_ATTR, "year"),
        );
        let status = page.append(
            root,
            Element::input(InputKind::Select, "status").with_attr(FILTER_ATTR, "status"),
        );
        let a = page.append(
            root,
            Element::new("div")
                .with_attr(FILTERABLE_ATTR, "")
                .with_attr("data-year", "2023")
                .with_attr("data-status", "employed"),
        );
        let b = page.append(
            root,
            Element::new("div")
                .with_attr(FILTERABLE_ATTR, "")
                .with_attr("data-year", "2022"),
        );
        let c = page.append(root, Element::new("div").with_attr(FILTERABLE_ATTR, ""));
        let ctx = Context::for_page(page);
        let search = SearchController::attach(&ctx);

        ctx.page.borrow_mut()[year].value = "2023".into();
        assert!(search.handle_event(&PageEvent::change(year)));
        {
            let page = ctx.page.borrow();
            assert!(!page[a].hidden);
            assert!(page[b].hidden);
            assert!(!page[c].hidden);
        }

        ctx.page.borrow_mut()[status].value = "studying".into();
        search.handle_event(&PageEvent::change(status));
        assert!(ctx.page.borrow()[a].hidden);
    }

    #[test]
    fn advanced_panel_toggles() {
        let mut page = Page::new();
        let root = page.root();
        let toggle = page.append(root, Element::new("button").with_id(ADVANCED_TOGGLE_ID));
        let panel = page.append(root, Element::new("div").with_id(ADVANCED_PANEL_ID));
        page[panel].set_style("display", "none");
        let ctx = Context::for_page(page);
        let search = SearchController::attach(&ctx);

        assert!(search.handle_event(&PageEvent::click(toggle)));
        assert_eq!(ctx.page.borrow()[panel].style("display"), Some("block"));
        assert_eq!(search.toggle_advanced(), Some(false));
        assert!(ctx.page.borrow()[panel].hidden);
    }
}
