//! Settings domain types and validation.
//!
//! [`SpeakSettings`] travel with every request from the UI; [`EngineSettings`]
//! tune the engine once at construction. Both are pure data.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::isolation::IsolationMode;
use crate::language::{LanguageTable, OnDeviceSupport};

/// Default supervision window for unreliable on-device languages.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 3000;

/// Default minimum spacing between published word highlights.
pub const DEFAULT_HIGHLIGHT_THROTTLE_MS: u64 = 50;

/// Default period of the remote highlight schedule.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Default visual pause after a sentence-terminal word (remote path).
pub const DEFAULT_SENTENCE_PAUSE_MS: u64 = 250;

/// Default visual pause after a clause-terminal word (remote path, off).
pub const DEFAULT_CLAUSE_PAUSE_MS: u64 = 0;

pub const DEFAULT_NORMAL_WORDS_PER_SECOND: f32 = 2.5;
pub const DEFAULT_SLOW_WORDS_PER_SECOND: f32 = 1.6;

/// Speaking faster than this is treated as a silent on-device failure.
pub const DEFAULT_MAX_PLAUSIBLE_CHARS_PER_SECOND: f32 = 40.0;

/// Texts shorter than this are never flagged as ending prematurely.
pub const DEFAULT_MIN_CHARS_FOR_PREMATURE_CHECK: usize = 12;

/// Upper bound for every millisecond setting (one hour).
pub const MAX_INTERVAL_MS: u64 = 3_600_000;

/// Pace multiplier applied for [`Speed::Fast`].
const FAST_PACE: f32 = 1.25;

// ── Speed ──────────────────────────────────────────────────────────

/// Requested speaking speed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "SpeedRepr", into = "SpeedRepr")]
pub enum Speed {
    Slow,
    #[default]
    Normal,
    Fast,
    /// Explicit on-device rate multiplier.
    Rate(f32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SpeedRepr {
    Named(String),
    Rate(f32),
}

impl TryFrom<SpeedRepr> for Speed {
    type Error = String;

    fn try_from(value: SpeedRepr) -> Result<Self, Self::Error> {
        match value {
            SpeedRepr::Named(name) => name.parse(),
            SpeedRepr::Rate(rate) => Self::rate(rate),
        }
    }
}

impl From<Speed> for SpeedRepr {
    fn from(value: Speed) -> Self {
        match value {
            Speed::Rate(rate) => Self::Rate(rate),
            named => Self::Named(named.to_string()),
        }
    }
}

impl Speed {
    /// Validated explicit rate.
    pub fn rate(rate: f32) -> Result<Self, String> {
        if rate.is_finite() && rate > 0.0 {
            Ok(Self::Rate(rate))
        } else {
            Err(format!("speed must be a positive number, got {rate}"))
        }
    }

    /// Rate multiplier for the on-device provider.
    pub fn native_rate(self) -> f32 {
        match self {
            Self::Slow => 0.7,
            Self::Normal => 1.0,
            Self::Fast => 1.3,
            Self::Rate(rate) => rate.clamp(0.1, 10.0),
        }
    }

    /// Whether the remote service should render its slow variant.
    pub fn is_slow(self) -> bool {
        self.native_rate() < 0.9
    }

    /// Words per second a listener should expect at this speed.
    pub fn expected_words_per_second(self, settings: &EngineSettings) -> f32 {
        let normal = settings.effective_normal_words_per_second();
        match self {
            Self::Slow => settings.effective_slow_words_per_second(),
            Self::Normal => normal,
            Self::Fast => normal * FAST_PACE,
            Self::Rate(_) if self.is_slow() => settings.effective_slow_words_per_second(),
            Self::Rate(rate) => normal * rate,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slow => f.write_str("slow"),
            Self::Normal => f.write_str("normal"),
            Self::Fast => f.write_str("fast"),
            Self::Rate(rate) => write!(f, "{rate}"),
        }
    }
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "normal" | "" => Ok(Self::Normal),
            "fast" => Ok(Self::Fast),
            other => other
                .parse::<f32>()
                .map_err(|_| format!("unknown speed: {other}"))
                .and_then(Self::rate),
        }
    }
}

// ── Per-request settings ───────────────────────────────────────────

/// Settings attached to one `speak()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeakSettings {
    /// Language code or BCP-47 tag.
    pub language: String,
    pub speed: Speed,
    pub isolation_mode: IsolationMode,
    /// Remote accent, as the top-level domain the service renders from
    /// (`"co.uk"`). The service default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

impl Default for SpeakSettings {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            speed: Speed::Normal,
            isolation_mode: IsolationMode::None,
            accent: None,
        }
    }
}

impl SpeakSettings {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub const fn with_isolation(mut self, mode: IsolationMode) -> Self {
        self.isolation_mode = mode;
        self
    }

    /// Set the remote accent; blank values clear it.
    #[must_use]
    pub fn with_accent(mut self, accent: impl Into<String>) -> Self {
        let accent = accent.into();
        self.accent = Some(accent.trim().to_owned()).filter(|a| !a.is_empty());
        self
    }

    /// Accent to request from the remote service, if any.
    pub fn remote_accent(&self) -> Option<&str> {
        self.accent.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Immutable request submitted to the playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceRequest {
    pub text: String,
    #[serde(flatten)]
    pub settings: SpeakSettings,
}

impl UtteranceRequest {
    pub fn new(text: impl Into<String>, settings: SpeakSettings) -> Self {
        Self {
            text: text.into(),
            settings,
        }
    }
}

// ── Engine settings ────────────────────────────────────────────────

/// Engine tuning.
///
/// All fields are optional so partial JSON files work; use the
/// `effective_*` accessors to read values with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Time the on-device provider gets to start an unreliable language.
    pub startup_timeout_ms: Option<u64>,

    /// Minimum spacing between published highlights (<= 20/s at 50).
    pub highlight_throttle_ms: Option<u64>,

    /// Period of the remote highlight schedule.
    pub tick_interval_ms: Option<u64>,

    pub sentence_pause_ms: Option<u64>,
    pub clause_pause_ms: Option<u64>,

    pub normal_words_per_second: Option<f32>,
    pub slow_words_per_second: Option<f32>,

    pub max_plausible_chars_per_second: Option<f32>,
    pub min_chars_for_premature_check: Option<usize>,

    /// Capability table; the built-in table when absent.
    pub languages: Option<LanguageTable>,
}

impl EngineSettings {
    /// Create settings with every value filled in.
    pub fn with_defaults() -> Self {
        Self {
            startup_timeout_ms: Some(DEFAULT_STARTUP_TIMEOUT_MS),
            highlight_throttle_ms: Some(DEFAULT_HIGHLIGHT_THROTTLE_MS),
            tick_interval_ms: Some(DEFAULT_TICK_INTERVAL_MS),
            sentence_pause_ms: Some(DEFAULT_SENTENCE_PAUSE_MS),
            clause_pause_ms: Some(DEFAULT_CLAUSE_PAUSE_MS),
            normal_words_per_second: Some(DEFAULT_NORMAL_WORDS_PER_SECOND),
            slow_words_per_second: Some(DEFAULT_SLOW_WORDS_PER_SECOND),
            max_plausible_chars_per_second: Some(DEFAULT_MAX_PLAUSIBLE_CHARS_PER_SECOND),
            min_chars_for_premature_check: Some(DEFAULT_MIN_CHARS_FOR_PREMATURE_CHECK),
            languages: Some(LanguageTable::default()),
        }
    }

    /// Parse and validate settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate_settings(&settings)?;
        Ok(settings)
    }

    pub fn effective_startup_timeout(&self) -> Duration {
        Duration::from_millis(
            self.startup_timeout_ms
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT_MS),
        )
    }

    pub fn effective_highlight_throttle(&self) -> Duration {
        Duration::from_millis(
            self.highlight_throttle_ms
                .unwrap_or(DEFAULT_HIGHLIGHT_THROTTLE_MS),
        )
    }

    pub fn effective_tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.unwrap_or(DEFAULT_TICK_INTERVAL_MS))
    }

    pub fn effective_sentence_pause(&self) -> Duration {
        Duration::from_millis(self.sentence_pause_ms.unwrap_or(DEFAULT_SENTENCE_PAUSE_MS))
    }

    pub fn effective_clause_pause(&self) -> Duration {
        Duration::from_millis(self.clause_pause_ms.unwrap_or(DEFAULT_CLAUSE_PAUSE_MS))
    }

    pub fn effective_normal_words_per_second(&self) -> f32 {
        self.normal_words_per_second
            .unwrap_or(DEFAULT_NORMAL_WORDS_PER_SECOND)
    }

    pub fn effective_slow_words_per_second(&self) -> f32 {
        self.slow_words_per_second
            .unwrap_or(DEFAULT_SLOW_WORDS_PER_SECOND)
    }

    pub fn effective_max_plausible_chars_per_second(&self) -> f32 {
        self.max_plausible_chars_per_second
            .unwrap_or(DEFAULT_MAX_PLAUSIBLE_CHARS_PER_SECOND)
    }

    pub fn effective_min_chars_for_premature_check(&self) -> usize {
        self.min_chars_for_premature_check
            .unwrap_or(DEFAULT_MIN_CHARS_FOR_PREMATURE_CHECK)
    }

    pub fn effective_languages(&self) -> LanguageTable {
        self.languages.clone().unwrap_or_default()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("{field} must be a positive number, got {value}")]
    InvalidPace { field: &'static str, value: f32 },

    #[error("Language table cannot be empty")]
    EmptyLanguageTable,

    #[error("Language '{0}' is marked as on-device but has no voice tag")]
    MissingOnDeviceTag(String),

    #[error("Invalid settings JSON: {0}")]
    Parse(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &EngineSettings) -> Result<(), SettingsError> {
    let intervals = [
        ("startup_timeout_ms", settings.startup_timeout_ms),
        ("highlight_throttle_ms", settings.highlight_throttle_ms),
        ("tick_interval_ms", settings.tick_interval_ms),
    ];
    if let Some((field, _)) = intervals.into_iter().find(|(_, v)| *v == Some(0)) {
        return Err(SettingsError::ZeroInterval(field));
    }

    let bounded = intervals.into_iter().chain([
        ("sentence_pause_ms", settings.sentence_pause_ms),
        ("clause_pause_ms", settings.clause_pause_ms),
    ]);
    for (field, value) in bounded {
        if let Some(value) = value.filter(|v| *v > MAX_INTERVAL_MS) {
            return Err(SettingsError::OutOfRange {
                field,
                value,
                max: MAX_INTERVAL_MS,
            });
        }
    }

    let paces = [
        ("normal_words_per_second", settings.normal_words_per_second),
        ("slow_words_per_second", settings.slow_words_per_second),
        (
            "max_plausible_chars_per_second",
            settings.max_plausible_chars_per_second,
        ),
    ];
    for (field, value) in paces {
        if let Some(value) = value {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::InvalidPace { field, value });
            }
        }
    }

    if let Some(table) = &settings.languages {
        if table.is_empty() {
            return Err(SettingsError::EmptyLanguageTable);
        }
        if let Some((code, _)) = table.iter().find(|(_, cap)| {
            cap.on_device != OnDeviceSupport::Unsupported && cap.on_device_tag.trim().is_empty()
        }) {
            return Err(SettingsError::MissingOnDeviceTag(code.to_owned()));
        }
    }

    Ok(())
}
