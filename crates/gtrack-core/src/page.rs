#![forbid(unsafe_code)]

//! In-memory render tree.
//!
//! [`Page`] is an arena of [`Element`]s standing in for the server-rendered
//! document. Controllers read and mutate it through [`ElementId`] handles and
//! find elements with a small CSS-like [`Selector`] subset:
//!
//! - type selectors (`form`, `input`, `*`)
//! - `#id`, `.class`, `[attr]`, `[attr=value]`, `[attr="value"]`
//! - the `:checked` pseudo-class
//! - descendant combinators (whitespace) and selector lists (`,`)
//!
//! Elements are never removed from the arena, so an `ElementId` obtained from
//! a page stays valid for the lifetime of that page.
//!
//! # Example
//!
//! ```
//! use gtrack_core::page::{Element, InputKind, Page, Selector};
//!
//! let mut page = Page::new();
//! let form = page.append(page.root(), Element::new("form").with_attr("data-autosave", "profile"));
//! page.append(form, Element::input(InputKind::Email, "email").with_value("a@b.co"));
//!
//! let selector = Selector::parse("form[data-autosave] input[type=email]").unwrap();
//! let email = page.query(page.root(), &selector).unwrap();
//! assert_eq!(page[email].value, "a@b.co");
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

/// Shared, mutable handle to a page.
pub type SharedPage = Rc<RefCell<Page>>;

/// Handle to an element inside a [`Page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u32);

impl ElementId {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a form control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Text,
    Email,
    Tel,
    Number,
    Password,
    Date,
    Radio,
    Checkbox,
    Hidden,
    Select,
    TextArea,
}

impl InputKind {
    /// Value of the `type` attribute for `<input>` kinds.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Number => "number",
            Self::Password => "password",
            Self::Date => "date",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Hidden => "hidden",
            Self::Select => "select",
            Self::TextArea => "textarea",
        }
    }

    /// Radio buttons and checkboxes.
    #[must_use]
    pub const fn is_checkable(self) -> bool {
        matches!(self, Self::Radio | Self::Checkbox)
    }

    /// Controls that hold free-form typed text.
    #[must_use]
    pub const fn is_text_like(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Email | Self::Tel | Self::Number | Self::Password | Self::TextArea
        )
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::TextArea => "textarea",
            _ => "input",
        }
    }
}

/// A node of the render tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    /// Control kind for `input`, `select` and `textarea` elements.
    pub kind: Option<InputKind>,
    /// Current control value.
    pub value: String,
    /// Own text (children contribute to [`Page::text_content`]).
    pub text: String,
    pub checked: bool,
    pub indeterminate: bool,
    pub disabled: bool,
    pub hidden: bool,
    pub attrs: BTreeMap<String, String>,
    pub classes: BTreeSet<String>,
    pub style: BTreeMap<String, String>,
    /// Highlighted search term (rendered as `<mark>`).
    pub highlight: Option<String>,
    /// Vertical layout position, used for scrolling and viewport checks.
    pub offset_top: i64,
    pub height: i64,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    /// Plain element with the given tag.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Form control named `name`.
    #[must_use]
    pub fn input(kind: InputKind, name: &str) -> Self {
        let mut el = Self::new(kind.tag());
        el.kind = Some(kind);
        if el.tag == "input" {
            el.attrs.insert("type".into(), kind.as_str().into());
        }
        if !name.is_empty() {
            el.attrs.insert("name".into(), name.into());
        }
        el
    }

    #[must_use]
    pub fn with_id(self, id: &str) -> Self {
        self.with_attr("id", id)
    }

    #[must_use]
    pub fn with_class(mut self, classes: &str) -> Self {
        for class in classes.split_whitespace() {
            self.classes.insert(class.to_string());
        }
        self
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    #[must_use]
    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Mark the control as `required`.
    #[must_use]
    pub fn required(self) -> Self {
        self.with_attr("required", "")
    }

    /// Place the element at `offset_top` with the given height.
    #[must_use]
    pub fn at(mut self, offset_top: i64, height: i64) -> Self {
        self.offset_top = offset_top;
        self.height = height;
        self
    }

    /// The `id` attribute.
    #[must_use]
    pub fn dom_id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// The `name` attribute.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attr("name").filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// `data-<name>` attribute.
    #[must_use]
    pub fn data(&self, name: &str) -> Option<&str> {
        self.attrs.get(&format!("data-{name}")).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.has_attr("required")
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    /// Add or remove `class` depending on `on`.
    pub fn set_class(&mut self, class: &str, on: bool) {
        if on {
            self.add_class(class);
        } else {
            self.remove_class(class);
        }
    }

    #[must_use]
    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    /// Set an inline style. An empty value removes the property.
    pub fn set_style(&mut self, property: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.style.remove(property);
        } else {
            self.style.insert(property.to_string(), value);
        }
    }

    /// Whether the element takes part in keyboard focus order.
    #[must_use]
    pub fn is_focusable(&self) -> bool {
        if self.disabled || self.hidden {
            return false;
        }
        if let Some(tabindex) = self.attr("tabindex") {
            return tabindex.trim().parse::<i32>().map_or(true, |t| t >= 0);
        }
        match self.tag.as_str() {
            "button" | "select" | "textarea" => true,
            "input" => self.kind != Some(InputKind::Hidden),
            "a" => self.has_attr("href"),
            _ => false,
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

/// The render tree.
#[derive(Debug, Clone)]
pub struct Page {
    elements: Vec<Element>,
    focused: Option<ElementId>,
    scroll_top: i64,
    viewport_height: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    /// Default viewport height.
    pub const DEFAULT_VIEWPORT_HEIGHT: i64 = 800;

    /// Empty page holding only `<body>`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elements: vec![Element::new("body")],
            focused: None,
            scroll_top: 0,
            viewport_height: Self::DEFAULT_VIEWPORT_HEIGHT,
        }
    }

    /// Wrap the page in a shared handle.
    #[must_use]
    pub fn into_shared(self) -> SharedPage {
        Rc::new(RefCell::new(self))
    }

    /// The `<body>` element.
    #[must_use]
    pub const fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// Number of elements, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.len() <= 1
    }

    /// Append `element` as the last child of `parent`.
    pub fn append(&mut self, parent: ElementId, mut element: Element) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        element.parent = Some(parent);
        element.children.clear();
        self.elements.push(element);
        if let Some(parent) = self.elements.get_mut(parent.index()) {
            parent.children.push(id);
        }
        id
    }

    /// Replace the child order of `parent`. Ids that are not already
    /// children of `parent` are ignored, and children missing from `order`
    /// keep their relative order at the end.
    pub fn reorder_children(&mut self, parent: ElementId, order: &[ElementId]) {
        let Some(current) = self.elements.get(parent.index()).map(|p| p.children.clone()) else {
            return;
        };
        let mut next: Vec<ElementId> = Vec::with_capacity(current.len());
        for id in order {
            if current.contains(id) && !next.contains(id) {
                next.push(*id);
            }
        }
        for id in current {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        self.elements[parent.index()].children = next;
    }

    #[must_use]
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index())
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.index())
    }

    /// All elements below `scope` in document order (excluding `scope`).
    #[must_use]
    pub fn descendants(&self, scope: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let Some(root) = self.get(scope) else {
            return out;
        };
        let mut stack: Vec<ElementId> = root.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.elements[id.index()].children.iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut cursor = self.get(id).and_then(Element::parent);
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.elements[parent.index()].parent;
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
        ancestor == id || self.ancestors(id).contains(&ancestor)
    }

    /// Whether `id` matches `selector`.
    #[must_use]
    pub fn matches(&self, id: ElementId, selector: &Selector) -> bool {
        selector
            .alternatives
            .iter()
            .any(|chain| self.matches_chain(id, chain))
    }

    fn matches_chain(&self, id: ElementId, chain: &[Compound]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        let Some(el) = self.get(id) else {
            return false;
        };
        if !last.matches(el) {
            return false;
        }
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in self.ancestors(id) {
            let Some(compound) = remaining.peek() else {
                break;
            };
            if compound.matches(&self.elements[ancestor.index()]) {
                remaining.next();
            }
        }
        remaining.peek().is_none()
    }

    /// First descendant of `scope` matching `selector`.
    #[must_use]
    pub fn query(&self, scope: ElementId, selector: &Selector) -> Option<ElementId> {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    /// Every descendant of `scope` matching `selector`, in document order.
    #[must_use]
    pub fn query_all(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    /// Nearest inclusive ancestor of `id` matching `selector`.
    #[must_use]
    pub fn closest(&self, id: ElementId, selector: &Selector) -> Option<ElementId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|candidate| self.matches(*candidate, selector))
    }

    /// Element whose `id` attribute equals `dom_id`.
    #[must_use]
    pub fn find_by_dom_id(&self, dom_id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .position(|el| el.dom_id() == Some(dom_id))
            .map(|index| ElementId(index as u32))
    }

    /// Text of `id` and its descendants, non-empty pieces joined by a space.
    #[must_use]
    pub fn text_content(&self, id: ElementId) -> String {
        let Some(el) = self.get(id) else {
            return String::new();
        };
        let mut pieces: Vec<&str> = Vec::new();
        if !el.text.trim().is_empty() {
            pieces.push(el.text.trim());
        }
        for child in self.descendants(id) {
            let text = self.elements[child.index()].text.trim();
            if !text.is_empty() {
                pieces.push(text);
            }
        }
        pieces.join(" ")
    }

    /// Form controls (`input`, `select`, `textarea`) below `form`.
    #[must_use]
    pub fn form_controls(&self, form: ElementId) -> Vec<ElementId> {
        self.descendants(form)
            .into_iter()
            .filter(|id| self.elements[id.index()].kind.is_some())
            .collect()
    }

    /// Successful controls of `form` as `(name, value)` pairs, in document
    /// order: named, enabled, and for radios/checkboxes only when checked.
    #[must_use]
    pub fn form_entries(&self, form: ElementId) -> Vec<(String, String)> {
        self.form_controls(form)
            .into_iter()
            .filter_map(|id| {
                let el = &self.elements[id.index()];
                let name = el.name()?;
                if el.disabled {
                    return None;
                }
                let kind = el.kind?;
                if kind.is_checkable() && !el.checked {
                    return None;
                }
                let value = if kind.is_checkable() && !el.has_attr("value") {
                    "on".to_string()
                } else if kind.is_checkable() {
                    el.attr("value").unwrap_or_default().to_string()
                } else {
                    el.value.clone()
                };
                Some((name.to_string(), value))
            })
            .collect()
    }

    /// Whether `id` and all of its ancestors are shown.
    #[must_use]
    pub fn is_displayed(&self, id: ElementId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .all(|candidate| self.get(candidate).is_some_and(|el| !el.hidden))
    }

    // ─── Focus & scrolling ───────────────────────────────────────────────

    #[must_use]
    pub fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    pub fn focus(&mut self, id: ElementId) {
        if self.get(id).is_some() {
            self.focused = Some(id);
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Displayed, focusable elements in document order.
    #[must_use]
    pub fn focusable_order(&self) -> Vec<ElementId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.elements[id.index()].is_focusable() && self.is_displayed(*id))
            .collect()
    }

    #[must_use]
    pub fn scroll_top(&self) -> i64 {
        self.scroll_top
    }

    #[must_use]
    pub fn viewport_height(&self) -> i64 {
        self.viewport_height
    }

    /// Set the viewport position and size.
    pub fn set_viewport(&mut self, scroll_top: i64, height: i64) {
        self.scroll_top = scroll_top.max(0);
        self.viewport_height = height.max(0);
    }

    /// Scroll so that `id` sits `offset` pixels below the top of the viewport.
    pub fn scroll_into_view(&mut self, id: ElementId, offset: i64) {
        if let Some(el) = self.get(id) {
            self.scroll_top = (el.offset_top - offset).max(0);
        }
    }
}

impl Index<ElementId> for Page {
    type Output = Element;

    fn index(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }
}

impl IndexMut<ElementId> for Page {
    fn index_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.index()]
    }
}

// ─── Selectors ───────────────────────────────────────────────────────────

/// Error raised by [`Selector::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    Empty,
    Unexpected { found: char, position: usize },
    Unterminated { position: usize },
    UnsupportedPseudo(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty selector"),
            Self::Unexpected { found, position } => {
                write!(f, "unexpected '{found}' at position {position}")
            }
            Self::Unterminated { position } => {
                write!(f, "unterminated attribute selector at position {position}")
            }
            Self::UnsupportedPseudo(name) => write!(f, "unsupported pseudo-class ':{name}'"),
        }
    }
}

impl std::error::Error for SelectorError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Present(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    checked: bool,
}

impl Compound {
    fn matches(&self, el: &Element) -> bool {
        if self.tag.as_deref().is_some_and(|tag| tag != el.tag) {
            return false;
        }
        if self.checked && !el.checked {
            return false;
        }
        self.ids.iter().all(|id| el.dom_id() == Some(id.as_str()))
            && self.classes.iter().all(|class| el.has_class(class))
            && self.attrs.iter().all(|attr| match attr {
                AttrMatch::Present(name) => el.has_attr(name),
                AttrMatch::Equals(name, value) => el.attr(name) == Some(value.as_str()),
            })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    fn single(compound: Compound) -> Self {
        Self {
            alternatives: vec![vec![compound]],
        }
    }

    /// `tag`
    #[must_use]
    pub fn tag(tag: &str) -> Self {
        Self::single(Compound {
            tag: Some(tag.to_ascii_lowercase()),
            ..Compound::default()
        })
    }

    /// `#id`
    #[must_use]
    pub fn id(id: &str) -> Self {
        Self::single(Compound {
            ids: vec![id.to_string()],
            ..Compound::default()
        })
    }

    /// `.class`
    #[must_use]
    pub fn class(class: &str) -> Self {
        Self::single(Compound {
            classes: vec![class.to_string()],
            ..Compound::default()
        })
    }

    /// `[name]`
    #[must_use]
    pub fn has_attr(name: &str) -> Self {
        Self::single(Compound {
            attrs: vec![AttrMatch::Present(name.to_string())],
            ..Compound::default()
        })
    }

    /// `[name="value"]`
    #[must_use]
    pub fn attr_eq(name: &str, value: &str) -> Self {
        Self::single(Compound {
            attrs: vec![AttrMatch::Equals(name.to_string(), value.to_string())],
            ..Compound::default()
        })
    }

    /// Selector list matching either `self` or `other`.
    #[must_use]
    pub fn or(mut self, other: Selector) -> Self {
        self.alternatives.extend(other.alternatives);
        self
    }

    /// Parse a selector list.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError`] for empty input, stray characters,
    /// unterminated attribute brackets and pseudo-classes other than
    /// `:checked`.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        let mut offset = 0;
        for part in input.split(',') {
            let chain = parse_chain(part, offset)?;
            offset += part.len() + 1;
            alternatives.push(chain);
        }
        Ok(Self { alternatives })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_chain(input: &str, base: usize) -> Result<Vec<Compound>, SelectorError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut chain = Vec::new();
    let mut i = 0;

    let read_ident = |i: &mut usize| -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = chars.get(*i) {
            if !is_ident_char(c) {
                break;
            }
            out.push(c);
            *i += 1;
        }
        out
    };

    while i < chars.len() {
        if chars[i].1.is_whitespace() {
            i += 1;
            continue;
        }

        let mut compound = Compound::default();
        let start = i;
        while let Some(&(pos, c)) = chars.get(i) {
            match c {
                c if c.is_whitespace() => break,
                '*' if i == start => {
                    i += 1;
                }
                '#' | '.' => {
                    i += 1;
                    let ident = read_ident(&mut i);
                    if ident.is_empty() {
                        return Err(SelectorError::Unexpected {
                            found: c,
                            position: base + pos,
                        });
                    }
                    if c == '#' {
                        compound.ids.push(ident);
                    } else {
                        compound.classes.push(ident);
                    }
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&(_, c)| c == ']')
                        .map(|rel| i + rel)
                        .ok_or(SelectorError::Unterminated { position: base + pos })?;
                    let body: String = chars[i + 1..close].iter().map(|&(_, c)| c).collect();
                    compound.attrs.push(parse_attr(&body, base + pos)?);
                    i = close + 1;
                }
                ':' => {
                    i += 1;
                    let ident = read_ident(&mut i);
                    if ident != "checked" {
                        return Err(SelectorError::UnsupportedPseudo(ident));
                    }
                    compound.checked = true;
                }
                c if is_ident_char(c) && i == start => {
                    compound.tag = Some(read_ident(&mut i).to_ascii_lowercase());
                }
                other => {
                    return Err(SelectorError::Unexpected {
                        found: other,
                        position: base + pos,
                    });
                }
            }
        }
        chain.push(compound);
    }

    if chain.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(chain)
}

fn parse_attr(body: &str, position: usize) -> Result<AttrMatch, SelectorError> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            if name.is_empty() || !name.chars().all(is_ident_char) {
                return Err(SelectorError::Unterminated { position });
            }
            Ok(AttrMatch::Present(name.to_string()))
        }
        Some((name, value)) => {
            let name = name.trim();
            if name.is_empty() || !name.chars().all(is_ident_char) {
                return Err(SelectorError::Unterminated { position });
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Ok(AttrMatch::Equals(name.to_string(), value.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Page, ElementId, ElementId, ElementId) {
        let mut page = Page::new();
        let form = page.append(
            page.root(),
            Element::new("form").with_id("signup").with_attr("data-autosave", "signup"),
        );
        let group = page.append(form, Element::new("div").with_class("form-group"));
        let email = page.append(group, Element::input(InputKind::Email, "email").required());
        let radio = page.append(
            form,
            Element::input(InputKind::Radio, "status")
                .with_attr("value", "employed")
                .with_checked(true),
        );
        (page, form, email, radio)
    }

    #[test]
    fn parses_compound_and_descendant_selectors() {
        let (page, form, email, radio) = sample();
        let root = page.root();

        let sel = Selector::parse("form[data-autosave] .form-group input[type=\"email\"]").unwrap();
        assert_eq!(page.query(root, &sel), Some(email));

        let sel = Selector::parse("#signup").unwrap();
        assert_eq!(page.query(root, &sel), Some(form));

        let sel = Selector::parse("input[type=radio]:checked, textarea").unwrap();
        assert_eq!(page.query_all(root, &sel), vec![radio]);

        let sel = Selector::parse("*[required]").unwrap();
        assert_eq!(page.query_all(root, &sel), vec![email]);
    }

    #[test]
    fn selector_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("input[type"),
            Err(SelectorError::Unterminated { .. })
        ));
        assert_eq!(
            Selector::parse("a:hover"),
            Err(SelectorError::UnsupportedPseudo("hover".into()))
        );
        assert!(matches!(
            Selector::parse("div > p"),
            Err(SelectorError::Unexpected { found: '>', .. })
        ));
    }

    #[test]
    fn closest_includes_self() {
        let (page, form, email, _) = sample();
        assert_eq!(page.closest(email, &Selector::tag("form")), Some(form));
        assert_eq!(page.closest(form, &Selector::tag("form")), Some(form));
        assert_eq!(page.closest(email, &Selector::tag("table")), None);
    }

    #[test]
    fn form_entries_follow_form_data_rules() {
        let (mut page, form, email, _) = sample();
        page[email].value = "x@y.sa".into();
        page.append(form, Element::input(InputKind::Checkbox, "skills").with_attr("value", "rust"));
        page.append(
            form,
            Element::input(InputKind::Checkbox, "skills")
                .with_attr("value", "sql")
                .with_checked(true),
        );
        let mut disabled = Element::input(InputKind::Text, "ignored");
        disabled.disabled = true;
        page.append(form, disabled);

        assert_eq!(
            page.form_entries(form),
            vec![
                ("email".to_string(), "x@y.sa".to_string()),
                ("status".to_string(), "employed".to_string()),
                ("skills".to_string(), "sql".to_string()),
            ]
        );
    }

    #[test]
    fn reorder_children_keeps_unlisted_tail() {
        let mut page = Page::new();
        let body = page.root();
        let a = page.append(body, Element::new("tr"));
        let b = page.append(body, Element::new("tr"));
        let c = page.append(body, Element::new("tr"));
        page.reorder_children(body, &[c, a]);
        assert_eq!(page[body].children(), &[c, a, b]);
    }

    #[test]
    fn text_content_joins_descendants() {
        let mut page = Page::new();
        let row = page.append(page.root(), Element::new("tr"));
        page.append(row, Element::new("td").with_text(" Sara "));
        page.append(row, Element::new("td").with_text("Riyadh"));
        assert_eq!(page.text_content(row), "Sara Riyadh");
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let mut page = Page::new();
        let mut panel = Element::new("div");
        panel.hidden = true;
        let panel = page.append(page.root(), panel);
        let button = page.append(panel, Element::new("button"));
        assert!(!page.is_displayed(button));
        assert!(page.focusable_order().is_empty());
    }

    #[test]
    fn scroll_into_view_clamps_at_zero() {
        let mut page = Page::new();
        let near = page.append(page.root(), Element::new("div").at(40, 20));
        let far = page.append(page.root(), Element::new("div").at(900, 20));
        page.scroll_into_view(near, 100);
        assert_eq!(page.scroll_top(), 0);
        page.scroll_into_view(far, 100);
        assert_eq!(page.scroll_top(), 800);
    }
}
