//! Playback events for listeners outside the engine.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "word_highlighted", "wordIndex": 3, "charIndex": 13 }
//! ```

use serde::{Deserialize, Serialize};

use crate::session::ProviderKind;

/// Everything the playback engine reports while speaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// A provider began producing audio.
    SpeakingStarted {
        provider: ProviderKind,
        #[serde(rename = "wordCount")]
        word_count: usize,
    },

    /// The primary provider failed and the remote path takes over.
    ProviderFallback {
        from: ProviderKind,
        to: ProviderKind,
        reason: String,
    },

    /// The highlighted word changed (after throttling).
    WordHighlighted {
        #[serde(rename = "wordIndex")]
        word_index: usize,
        #[serde(rename = "charIndex")]
        char_index: usize,
    },

    /// The utterance played to the end.
    SpeakingFinished { provider: ProviderKind },

    /// Playback was stopped by the user or replaced by a new request.
    SpeakingStopped,

    /// Playback failed; `message` is the user-facing text.
    PlaybackError { message: String },
}

impl PlaybackEvent {
    pub fn playback_error(message: impl Into<String>) -> Self {
        Self::PlaybackError {
            message: message.into(),
        }
    }

    /// Short event name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SpeakingStarted { .. } => "speaking_started",
            Self::ProviderFallback { .. } => "provider_fallback",
            Self::WordHighlighted { .. } => "word_highlighted",
            Self::SpeakingFinished { .. } => "speaking_finished",
            Self::SpeakingStopped => "speaking_stopped",
            Self::PlaybackError { .. } => "playback_error",
        }
    }
}
