#![forbid(unsafe_code)]

//! Tracker configuration as data.
//!
//! Every timing constant and user-facing message the engine uses lives in a
//! single [`TrackerConfig`] that can be loaded from TOML or JSON. Missing
//! sections and fields fall back to their defaults, so an empty document is
//! a valid configuration.
//!
//! ```toml
//! [timing]
//! autosave_debounce_ms = 1500
//! notification_ttl_ms = 4000
//!
//! [messages]
//! welcome = "Welcome back!"
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level TrackerConfig
// ---------------------------------------------------------------------------

/// All tunables of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub timing: TimingConfig,
    pub messages: Messages,
    pub logging: LoggingConfig,
}

impl TrackerConfig {
    /// Load from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::TomlSerialize)
    }

    /// Check parameter ranges.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let t = &self.timing;

        if t.notification_ttl_ms == 0 {
            errors.push("timing.notification_ttl_ms must be > 0".into());
        }
        if t.dashboard_refresh_ms == 0 {
            errors.push("timing.dashboard_refresh_ms must be > 0".into());
        }
        if t.counter_animation_ms == 0 {
            errors.push("timing.counter_animation_ms must be > 0".into());
        }
        if t.counter_animation_frames == 0 {
            errors.push("timing.counter_animation_frames must be > 0".into());
        }
        if t.removal_transition_ms > t.notification_ttl_ms {
            errors.push(format!(
                "timing.removal_transition_ms ({}) must not exceed timing.notification_ttl_ms ({})",
                t.removal_transition_ms, t.notification_ttl_ms
            ));
        }

        for (name, text) in self.messages.entries() {
            if text.trim().is_empty() {
                errors.push(format!("messages.{name} must not be empty"));
            }
        }

        if !LoggingConfig::LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "logging.level must be one of {}, got {:?}",
                LoggingConfig::LEVELS.join("/"),
                self.logging.level
            ));
        }

        errors
    }

    /// Load from TOML and reject invalid values.
    pub fn from_toml_str_validated(s: &str) -> Result<Self, ConfigError> {
        let config = Self::from_toml_str(s)?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Delays, windows and lifetimes, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Generic UI animation length.
    pub animation_ms: u64,
    /// Search input debounce.
    pub search_debounce_ms: u64,
    /// Form auto-save debounce.
    pub autosave_debounce_ms: u64,
    /// Survey free-text debounce.
    pub survey_input_debounce_ms: u64,
    /// Default notification lifetime.
    pub notification_ttl_ms: u64,
    /// Exit transition before a notification is deleted.
    pub removal_transition_ms: u64,
    /// Delay before the welcome notification.
    pub welcome_delay_ms: u64,
    /// Welcome notification lifetime.
    pub welcome_ttl_ms: u64,
    /// Delay before the survey completed notification.
    pub completion_delay_ms: u64,
    /// How long a changed question card stays highlighted.
    pub card_highlight_ms: u64,
    /// Dashboard statistics refresh period.
    pub dashboard_refresh_ms: u64,
    /// Stat counter animation length.
    pub counter_animation_ms: u64,
    /// Frames in a stat counter animation.
    pub counter_animation_frames: u32,
    /// Simulated duration of the export quick action.
    pub export_delay_ms: u64,
    /// Simulated duration of the report quick action.
    pub report_delay_ms: u64,
    /// Distance kept above a field scrolled into view, in pixels.
    pub scroll_offset_px: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            animation_ms: 300,
            search_debounce_ms: 300,
            autosave_debounce_ms: 1000,
            survey_input_debounce_ms: 500,
            notification_ttl_ms: 5000,
            removal_transition_ms: 300,
            welcome_delay_ms: 1000,
            welcome_ttl_ms: 3000,
            completion_delay_ms: 500,
            card_highlight_ms: 1000,
            dashboard_refresh_ms: 30_000,
            counter_animation_ms: 1000,
            counter_animation_frames: 60,
            export_delay_ms: 2000,
            report_delay_ms: 3000,
            scroll_offset_px: 100,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[must_use]
    pub fn notification_ttl(&self) -> Duration {
        Self::ms(self.notification_ttl_ms)
    }

    #[must_use]
    pub fn removal_transition(&self) -> Duration {
        Self::ms(self.removal_transition_ms)
    }
}

/// User-facing texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub required: String,
    pub invalid_email: String,
    pub invalid_phone: String,
    pub invalid_national_id: String,
    pub form_has_errors: String,
    pub survey_required_unanswered: String,
    pub survey_completed: String,
    pub survey_submitted: String,
    pub welcome: String,
    pub unexpected_error: String,
    pub export_started: String,
    pub export_finished: String,
    pub send_survey: String,
    pub report_started: String,
    pub report_finished: String,
    /// Label of the survey "next question" button.
    pub next_question: String,
    pub nothing_selected: String,
    /// `{n}` is replaced by the number of selected items.
    pub selected_count: String,
    /// `{n}` is replaced by the number of matches.
    pub search_results: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            required: "هذا الحقل مطلوب".into(),
            invalid_email: "يرجى إدخال بريد إلكتروني صحيح".into(),
            invalid_phone: "يرجى إدخال رقم هاتف صحيح".into(),
            invalid_national_id: "رقم الهوية يجب أن يكون 10 أرقام".into(),
            form_has_errors: "يرجى تصحيح الأخطاء في النموذج".into(),
            survey_required_unanswered: "يرجى الإجابة على جميع الأسئلة المطلوبة".into(),
            survey_completed: "تم إكمال جميع الأسئلة!".into(),
            survey_submitted: "تم إرسال الاستبيان بنجاح!".into(),
            welcome: "مرحباً بك في نظام تتبع الخريجين!".into(),
            unexpected_error: "حدث خطأ غير متوقع. يرجى المحاولة مرة أخرى.".into(),
            export_started: "جاري تصدير البيانات...".into(),
            export_finished: "تم تصدير البيانات بنجاح".into(),
            send_survey: "فتح نافذة إرسال الاستبيان...".into(),
            report_started: "جاري إنشاء التقرير...".into(),
            report_finished: "تم إنشاء التقرير بنجاح".into(),
            next_question: "السؤال التالي".into(),
            nothing_selected: "لم يتم تحديد أي عنصر".into(),
            selected_count: "تم تحديد {n} عنصر".into(),
            search_results: "تم العثور على {n} نتيجة".into(),
        }
    }
}

impl Messages {
    /// Selection summary for `n` items.
    #[must_use]
    pub fn selection_summary(&self, n: usize) -> String {
        if n == 0 {
            self.nothing_selected.clone()
        } else {
            self.selected_count.replace("{n}", &n.to_string())
        }
    }

    /// Search summary for `n` matches.
    #[must_use]
    pub fn search_summary(&self, n: usize) -> String {
        self.search_results.replace("{n}", &n.to_string())
    }

    fn entries(&self) -> [(&'static str, &str); 19] {
        [
            ("required", self.required.as_str()),
            ("invalid_email", self.invalid_email.as_str()),
            ("invalid_phone", self.invalid_phone.as_str()),
            ("invalid_national_id", self.invalid_national_id.as_str()),
            ("form_has_errors", self.form_has_errors.as_str()),
            ("survey_required_unanswered", self.survey_required_unanswered.as_str()),
            ("survey_completed", self.survey_completed.as_str()),
            ("survey_submitted", self.survey_submitted.as_str()),
            ("welcome", self.welcome.as_str()),
            ("unexpected_error", self.unexpected_error.as_str()),
            ("export_started", self.export_started.as_str()),
            ("export_finished", self.export_finished.as_str()),
            ("send_survey", self.send_survey.as_str()),
            ("report_started", self.report_started.as_str()),
            ("report_finished", self.report_finished.as_str()),
            ("next_question", self.next_question.as_str()),
            ("nothing_selected", self.nothing_selected.as_str()),
            ("selected_count", self.selected_count.as_str()),
            ("search_results", self.search_results.as_str()),
        ]
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings consumed by the facade's subscriber setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `GTRACK_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Include span/target names in output.
    pub with_target: bool,
}

impl LoggingConfig {
    /// Accepted `level` values.
    pub const LEVELS: [&'static str; 6] = ["trace", "debug", "info", "warn", "error", "off"];
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
            with_target: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// TOML encode error.
    TomlSerialize(toml::ser::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::TomlSerialize(e) => write!(f, "TOML encode error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::TomlSerialize(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.timing.autosave_debounce_ms, 1000);
        assert_eq!(config.timing.notification_ttl_ms, 5000);
        assert_eq!(config.timing.removal_transition_ms, 300);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = TrackerConfig::from_toml_str("").unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = TrackerConfig::from_toml_str(
            r#"
            [timing]
            autosave_debounce_ms = 250

            [messages]
            welcome = "hi"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.autosave_debounce_ms, 250);
        assert_eq!(config.timing.search_debounce_ms, 300);
        assert_eq!(config.messages.welcome, "hi");
        assert_eq!(config.messages.required, Messages::default().required);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn json_round_trip() {
        let mut config = TrackerConfig::default();
        config.timing.dashboard_refresh_ms = 10_000;
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(TrackerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn toml_round_trip() {
        let config = TrackerConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(TrackerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = TrackerConfig::default();
        config.timing.notification_ttl_ms = 0;
        config.messages.welcome = "  ".into();
        config.logging.level = "loud".into();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("notification_ttl_ms must be > 0")));
        assert!(errors.iter().any(|e| e.contains("removal_transition_ms")));
        assert!(errors.iter().any(|e| e.contains("messages.welcome")));
        assert!(errors.iter().any(|e| e.contains("logging.level")));
    }

    #[test]
    fn validated_loader_rejects_bad_values() {
        let err = TrackerConfig::from_toml_str_validated("[timing]\ndashboard_refresh_ms = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("dashboard_refresh_ms"));
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        assert!(matches!(
            TrackerConfig::from_toml_str("[timing"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn message_templates() {
        let messages = Messages::default();
        assert_eq!(messages.selection_summary(0), "لم يتم تحديد أي عنصر");
        assert_eq!(messages.selection_summary(3), "تم تحديد 3 عنصر");
        assert_eq!(messages.search_summary(2), "تم العثور على 2 نتيجة");
    }
}
