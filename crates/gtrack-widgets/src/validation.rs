#![forbid(unsafe_code)]

//! Field validation, input formatting and inline feedback.
//!
//! Validation failures are never errors: they become a [`ValidationResult`]
//! and are surfaced as inline feedback next to the field (`is-invalid` class
//! plus an `.invalid-feedback` element).
//!
//! # Rules
//!
//! | Rule | Applies to | Passes when |
//! |------|------------|-------------|
//! | [`Required`] | `required` controls | trimmed value non-empty (checkables: one of the group checked) |
//! | [`Email`] | `type=email` | empty, or `local@domain.tld` without whitespace |
//! | [`SaudiPhone`] | `type=tel` or `name=phone` | empty, or `(+966|966|0)?5` + 8 digits, whitespace ignored |
//! | [`NationalId`] | `name=national_id` | empty, or exactly 10 digits |
//!
//! When several rules fail, the message of the last failing rule in the
//! table order is shown.

use std::fmt;
use std::sync::LazyLock;

use gtrack_core::page::{Element, ElementId, InputKind, Page, Selector};
use gtrack_runtime::config::Messages;
use regex::Regex;

// ---------------------------------------------------------------------------
// Error Codes
// ---------------------------------------------------------------------------

/// Error code for required field validation.
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Error code for email validation.
pub const ERROR_CODE_EMAIL: &str = "email";
/// Error code for phone validation.
pub const ERROR_CODE_PHONE: &str = "phone";
/// Error code for national id validation.
pub const ERROR_CODE_NATIONAL_ID: &str = "national_id";

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());
static PHONE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\+966|966|0)?5[0-9]{8}$").ok());

// ---------------------------------------------------------------------------
// ValidationError / ValidationResult
// ---------------------------------------------------------------------------

/// A failed rule: stable code plus the message to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The result of a validation operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }

    /// Later failures override earlier ones.
    #[must_use]
    fn then(self, next: Self) -> Self {
        match next {
            Self::Valid => self,
            invalid => invalid,
        }
    }
}

// ---------------------------------------------------------------------------
// Validator Trait
// ---------------------------------------------------------------------------

/// A rule over values of type `T`.
pub trait Validator<T: ?Sized>: Send + Sync {
    fn validate(&self, value: &T) -> ValidationResult;

    /// Message shown when the rule fails.
    fn error_message(&self) -> &str;

    fn fail(&self, code: &'static str) -> ValidationResult {
        ValidationResult::Invalid(ValidationError::new(code, self.error_message()))
    }
}

/// Rejects empty (or whitespace-only) values.
#[derive(Debug, Clone)]
pub struct Required {
    message: String,
}

impl Required {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator<str> for Required {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            self.fail(ERROR_CODE_REQUIRED)
        } else {
            ValidationResult::Valid
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Email address shape check. Empty values pass.
#[derive(Debug, Clone)]
pub struct Email {
    message: String,
}

impl Email {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator<str> for Email {
    fn validate(&self, value: &str) -> ValidationResult {
        let value = value.trim();
        if value.is_empty() || is_valid_email(value) {
            ValidationResult::Valid
        } else {
            self.fail(ERROR_CODE_EMAIL)
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Saudi mobile number check. Empty values pass.
#[derive(Debug, Clone)]
pub struct SaudiPhone {
    message: String,
}

impl SaudiPhone {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator<str> for SaudiPhone {
    fn validate(&self, value: &str) -> ValidationResult {
        let value = value.trim();
        if value.is_empty() || is_valid_phone(value) {
            ValidationResult::Valid
        } else {
            self.fail(ERROR_CODE_PHONE)
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Ten-digit national identifier. Empty values pass.
#[derive(Debug, Clone)]
pub struct NationalId {
    message: String,
}

impl NationalId {
    /// Required number of digits.
    pub const LEN: usize = 10;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Validator<str> for NationalId {
    fn validate(&self, value: &str) -> ValidationResult {
        let value = value.trim();
        let ok = value.is_empty()
            || (value.len() == Self::LEN && value.bytes().all(|b| b.is_ascii_digit()));
        if ok {
            ValidationResult::Valid
        } else {
            self.fail(ERROR_CODE_NATIONAL_ID)
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

// ---------------------------------------------------------------------------
// Pattern helpers and formatting
// ---------------------------------------------------------------------------

#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(value))
}

/// Whitespace anywhere in the number is ignored.
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    PHONE_RE.as_ref().is_some_and(|re| re.is_match(&compact))
}

/// Normalize a typed phone number towards `+966` form.
///
/// Non-digits are stripped first; `966…` gains a `+`, `05…` becomes
/// `+9665…`, and a bare 9-digit `5…` number gains `+966`. Anything else is
/// left as digits only.
#[must_use]
pub fn format_phone_number(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with("966") {
        format!("+{digits}")
    } else if let Some(rest) = digits.strip_prefix('0').filter(|rest| rest.starts_with('5')) {
        format!("+966{rest}")
    } else if digits.starts_with('5') && digits.len() == 9 {
        format!("+966{digits}")
    } else {
        digits
    }
}

/// Keep at most ten digits.
#[must_use]
pub fn format_national_id(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_digit)
        .take(NationalId::LEN)
        .collect()
}

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

/// Which rules apply to a control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldRules {
    pub required: bool,
    pub email: bool,
    pub phone: bool,
    pub national_id: bool,
}

impl FieldRules {
    /// Rules implied by the element's attributes.
    #[must_use]
    pub fn for_element(el: &Element) -> Self {
        let name = el.name();
        Self {
            required: el.is_required(),
            email: el.kind == Some(InputKind::Email),
            phone: el.kind == Some(InputKind::Tel) || name == Some("phone"),
            national_id: name == Some("national_id"),
        }
    }

    /// Whether no rule applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Run every applicable rule over `value`.
    #[must_use]
    pub fn check(&self, value: &str, messages: &Messages) -> ValidationResult {
        let mut result = ValidationResult::Valid;
        if self.required {
            result = result.then(Required::new(messages.required.as_str()).validate(value));
        }
        if self.email {
            result = result.then(Email::new(messages.invalid_email.as_str()).validate(value));
        }
        if self.phone {
            result = result.then(SaudiPhone::new(messages.invalid_phone.as_str()).validate(value));
        }
        if self.national_id {
            result =
                result.then(NationalId::new(messages.invalid_national_id.as_str()).validate(value));
        }
        result
    }
}

/// Value a control contributes to validation.
///
/// Radio buttons and checkboxes count as filled when any control with the
/// same name in the same form is checked.
#[must_use]
pub fn effective_value(page: &Page, id: ElementId) -> String {
    let el = &page[id];
    match el.kind {
        Some(kind) if kind.is_checkable() => {
            let scope = page
                .closest(id, &Selector::tag("form"))
                .unwrap_or_else(|| page.root());
            let any_checked = el.name().is_some_and(|name| {
                page.query_all(scope, &Selector::attr_eq("name", name))
                    .into_iter()
                    .any(|other| page[other].checked)
            }) || el.checked;
            if any_checked { "on".into() } else { String::new() }
        }
        _ => el.value.clone(),
    }
}

/// Validate one control and update its inline feedback.
pub fn validate_element(page: &mut Page, id: ElementId, messages: &Messages) -> ValidationResult {
    let rules = FieldRules::for_element(&page[id]);
    let result = rules.check(&effective_value(page, id), messages);
    apply_feedback(page, id, &result);
    result
}

/// Reflect `result` on the control: `is-valid`/`is-invalid` classes and the
/// sibling feedback element, created on first failure.
pub fn apply_feedback(page: &mut Page, id: ElementId, result: &ValidationResult) {
    let Some(parent) = page.get(id).and_then(Element::parent) else {
        return;
    };
    let feedback_selector = Selector::class("invalid-feedback").or(Selector::class("valid-feedback"));
    let feedback = page.query(parent, &feedback_selector);

    match result {
        ValidationResult::Valid => {
            let el = &mut page[id];
            el.remove_class("is-invalid");
            el.add_class("is-valid");
            if let Some(feedback) = feedback {
                let fb = &mut page[feedback];
                fb.text.clear();
                fb.set_style("display", "none");
            }
        }
        ValidationResult::Invalid(error) => {
            let el = &mut page[id];
            el.remove_class("is-valid");
            el.add_class("is-invalid");
            let feedback = feedback.unwrap_or_else(|| {
                page.append(parent, Element::new("div").with_class("invalid-feedback"))
            });
            let fb = &mut page[feedback];
            fb.text = error.message.clone();
            fb.set_style("display", "block");
        }
    }
}

/// Feedback text currently shown for `id`, if any.
#[must_use]
pub fn feedback_text(page: &Page, id: ElementId) -> Option<String> {
    let parent = page.get(id)?.parent()?;
    let feedback = page.query(parent, &Selector::class("invalid-feedback"))?;
    let fb = &page[feedback];
    (fb.style("display") == Some("block") && !fb.text.is_empty()).then(|| fb.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> Messages {
        Messages::default()
    }

    #[test]
    fn phone_patterns() {
        assert!(is_valid_phone("0512345678"));
        assert!(is_valid_phone("512345678"));
        assert!(is_valid_phone("+966512345678"));
        assert!(is_valid_phone("966 51 234 5678"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("0612345678"));
        assert!(!is_valid_phone("+96651234567"));
    }

    #[test]
    fn email_patterns() {
        assert!(is_valid_email("sara@uni.edu.sa"));
        assert!(!is_valid_email("sara@uni"));
        assert!(!is_valid_email("sa ra@uni.sa"));
        assert!(!is_valid_email("@uni.sa"));
    }

    #[test]
    fn phone_formatting() {
        assert_eq!(format_phone_number("0512345678"), "+966512345678");
        assert_eq!(format_phone_number("966512345678"), "+966512345678");
        assert_eq!(format_phone_number("512345678"), "+966512345678");
        assert_eq!(format_phone_number("05-1234"), "+96651234");
        assert_eq!(format_phone_number("12ab3"), "123");
    }

    #[test]
    fn national_id_formatting() {
        assert_eq!(format_national_id("10-2345-6789-99"), "1023456789");
        assert_eq!(format_national_id("abc"), "");
    }

    #[test]
    fn last_failing_rule_wins() {
        let rules = FieldRules {
            required: true,
            phone: true,
            national_id: true,
            ..FieldRules::default()
        };
        let m = messages();
        let result = rules.check("12345", &m);
        assert_eq!(result.error().map(|e| e.code), Some(ERROR_CODE_NATIONAL_ID));

        let result = rules.check("  ", &m);
        assert_eq!(result.error().map(|e| e.message.as_str()), Some(m.required.as_str()));
    }

    #[test]
    fn feedback_element_is_created_then_reused() {
        let mut page = Page::new();
        let group = page.append(page.root(), Element::new("div"));
        let email = page.append(group, Element::input(InputKind::Email, "email").with_value("bad"));
        let m = messages();

        assert!(!validate_element(&mut page, email, &m).is_valid());
        assert!(page[email].has_class("is-invalid"));
        assert_eq!(feedback_text(&page, email).as_deref(), Some(m.invalid_email.as_str()));
        let count = page.len();

        page[email].value = "ok@site.sa".into();
        assert!(validate_element(&mut page, email, &m).is_valid());
        assert!(page[email].has_class("is-valid"));
        assert!(!page[email].has_class("is-invalid"));
        assert_eq!(feedback_text(&page, email), None);
        assert_eq!(page.len(), count);
    }

    #[test]
    fn required_radio_group_passes_when_any_checked() {
        let mut page = Page::new();
        let form = page.append(page.root(), Element::new("form"));
        let a = page.append(form, Element::input(InputKind::Radio, "status").required());
        let b = page.append(form, Element::input(InputKind::Radio, "status"));
        let m = messages();
        assert!(!validate_element(&mut page, a, &m).is_valid());
        page[b].checked = true;
        assert!(validate_element(&mut page, a, &m).is_valid());
    }
}
