#![forbid(unsafe_code)]

//! Table enhancement: column sorting, bulk selection and row hover.

use std::cmp::Ordering;

use gtrack_core::event::{EventKind, PageEvent};
use gtrack_core::page::{ElementId, Page, Selector};

use crate::context::Context;

pub const SORT_ATTR: &str = "data-sort";
pub const BULK_ACTION_ATTR: &str = "data-bulk-action";
pub const SELECT_ALL_ID: &str = "selectAll";

const ROW_HOVER_TRANSFORM: &str = "scale(1.01)";
const ROW_HOVER_SHADOW: &str = "0 4px 12px rgba(0,0,0,0.1)";

/// Direction a column is currently sorted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Ascending => "sort-asc",
            Self::Descending => "sort-desc",
        }
    }
}

fn item_checkbox() -> Selector {
    Selector::class("item-checkbox").or(Selector::class("graduate-checkbox"))
}

fn selected_count_target() -> Selector {
    Selector::id("selectedCount").or(Selector::class("selected-count"))
}

/// Sorting, selection and hover behavior for every `.table` on the page.
#[derive(Clone)]
pub struct TableEnhancer {
    ctx: Context,
}

impl TableEnhancer {
    pub fn attach(ctx: &Context) -> Self {
        {
            let mut page = ctx.page.borrow_mut();
            let root = page.root();
            for header in page.query_all(root, &Selector::has_attr(SORT_ATTR)) {
                if page[header].tag == "th" {
                    page[header].set_style("cursor", "pointer");
                }
            }
        }
        let enhancer = Self { ctx: ctx.clone() };
        enhancer.update_bulk_ui();
        enhancer
    }

    /// Route a page event. Returns `false` when no table behavior applies.
    pub fn handle_event(&self, event: &PageEvent) -> bool {
        let target = event.target;
        match &event.kind {
            EventKind::Click => {
                let header = {
                    let page = self.ctx.page.borrow();
                    page.closest(target, &Selector::has_attr(SORT_ATTR))
                        .filter(|id| page[*id].tag == "th")
                };
                match header {
                    Some(header) => self.sort_by_header(header).is_some(),
                    None => false,
                }
            }
            EventKind::Change => {
                let (is_select_all, is_item) = {
                    let page = self.ctx.page.borrow();
                    (
                        page.matches(target, &Selector::id(SELECT_ALL_ID)),
                        page.matches(target, &item_checkbox()),
                    )
                };
                if is_select_all {
                    let checked = self.ctx.page.borrow()[target].checked;
                    self.select_all(target, checked);
                    true
                } else if is_item {
                    self.update_bulk_ui();
                    self.update_select_all_state();
                    true
                } else {
                    false
                }
            }
            EventKind::PointerEnter => self.hover_row(target, true),
            EventKind::PointerLeave => self.hover_row(target, false),
            _ => false,
        }
    }

    /// Sort the body of the header's table by its column, toggling the
    /// direction. Returns the new direction.
    pub fn sort_by_header(&self, header: ElementId) -> Option<SortDirection> {
        let mut page = self.ctx.page.borrow_mut();
        let column = page.get(header)?.attr(SORT_ATTR)?.to_string();
        let table = page.closest(header, &Selector::tag("table"))?;
        let tbody = page.query(table, &Selector::tag("tbody"))?;
        let cell_index = page[header]
            .parent()
            .and_then(|row| page[row].children().iter().position(|c| *c == header));

        let direction = if page[header].has_class(SortDirection::Ascending.class()) {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };

        let mut rows: Vec<(ElementId, String)> = page
            .query_all(tbody, &Selector::tag("tr"))
            .into_iter()
            .map(|row| (row, sort_key(&page, row, &column, cell_index)))
            .collect();
        rows.sort_by(|(_, a), (_, b)| {
            let ord = compare_text(a, b);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
        let order: Vec<ElementId> = rows.into_iter().map(|(row, _)| row).collect();
        page.reorder_children(tbody, &order);

        for th in page.query_all(table, &Selector::tag("th")) {
            page[th].remove_class(SortDirection::Ascending.class());
            page[th].remove_class(SortDirection::Descending.class());
        }
        page[header].add_class(direction.class());
        tracing::debug!(%column, direction = direction.class(), rows = order.len(), "table sorted");
        Some(direction)
    }

    /// Check or uncheck every item checkbox in the select-all's table.
    pub fn select_all(&self, select_all: ElementId, checked: bool) -> usize {
        let changed = {
            let mut page = self.ctx.page.borrow_mut();
            page[select_all].checked = checked;
            page[select_all].indeterminate = false;
            let Some(table) = table_for(&page, select_all) else {
                return 0;
            };
            let items = page.query_all(table, &item_checkbox());
            for &item in &items {
                page[item].checked = checked;
            }
            items.len()
        };
        self.update_bulk_ui();
        changed
    }

    /// Show or hide bulk actions and refresh the selected count. Returns the
    /// number of checked items on the page.
    pub fn update_bulk_ui(&self) -> usize {
        let mut page = self.ctx.page.borrow_mut();
        let root = page.root();
        let selected = page
            .query_all(root, &item_checkbox())
            .into_iter()
            .filter(|id| page[*id].checked)
            .count();

        let display = if selected > 0 { "block" } else { "none" };
        for action in page.query_all(root, &Selector::has_attr(BULK_ACTION_ATTR)) {
            page[action].set_style("display", display);
        }
        let summary = self.ctx.messages().selection_summary(selected);
        for target in page.query_all(root, &selected_count_target()) {
            page[target].text = summary.clone();
        }
        selected
    }

    /// Recompute each select-all's tri-state from its table's items.
    pub fn update_select_all_state(&self) {
        let mut page = self.ctx.page.borrow_mut();
        let root = page.root();
        for select_all in page.query_all(root, &Selector::id(SELECT_ALL_ID)) {
            let Some(table) = table_for(&page, select_all) else {
                continue;
            };
            let items = page.query_all(table, &item_checkbox());
            let checked = items.iter().filter(|id| page[**id].checked).count();
            let el = &mut page[select_all];
            match checked {
                0 => {
                    el.checked = false;
                    el.indeterminate = false;
                }
                n if n == items.len() => {
                    el.checked = true;
                    el.indeterminate = false;
                }
                _ => {
                    el.checked = false;
                    el.indeterminate = true;
                }
            }
        }
    }

    fn hover_row(&self, target: ElementId, enter: bool) -> bool {
        let mut page = self.ctx.page.borrow_mut();
        let is_row = page.get(target).is_some_and(|el| el.tag == "tr")
            && page.closest(target, &Selector::class("table")).is_some()
            && page.closest(target, &Selector::tag("tbody")).is_some();
        if !is_row {
            return false;
        }
        let row = &mut page[target];
        if enter {
            row.set_style("transform", ROW_HOVER_TRANSFORM);
            row.set_style("box-shadow", ROW_HOVER_SHADOW);
        } else {
            row.set_style("transform", "");
            row.set_style("box-shadow", "");
        }
        true
    }
}

/// The table a select-all governs: its own table, or the one in its card.
fn table_for(page: &Page, select_all: ElementId) -> Option<ElementId> {
    page.closest(select_all, &Selector::tag("table")).or_else(|| {
        page.closest(select_all, &Selector::class("card"))
            .and_then(|card| page.query(card, &Selector::tag("table")))
    })
}

fn sort_key(page: &Page, row: ElementId, column: &str, cell_index: Option<usize>) -> String {
    if let Some(cell) = page.query(row, &Selector::attr_eq("data-value", column)) {
        return page.text_content(cell);
    }
    cell_index
        .and_then(|i| {
            page[row]
                .children()
                .iter()
                .filter(|c| matches!(page[**c].tag.as_str(), "td" | "th"))
                .nth(i)
                .copied()
        })
        .map(|cell| page.text_content(cell))
        .unwrap_or_default()
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
