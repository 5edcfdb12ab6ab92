//! Published playback session state.
//!
//! [`SessionState`] is the snapshot a UI renders from. It is written only by
//! the playback engine and read through a watch channel.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::isolation::{self, IsolationMode, IsolationView};
use crate::text::TextStructure;

/// Position in the provider fallback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    #[default]
    Idle,
    TryingPrimary,
    PlayingPrimary,
    TryingSecondary,
    PlayingSecondary,
    Ended,
}

impl PlaybackPhase {
    /// Whether a provider is currently attempting or playing.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Ended)
    }
}

/// Which provider drives the word index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OnDevice,
    Remote,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnDevice => f.write_str("on-device"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Identifies one provider attempt. Events tagged with a stale id are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(u64);

impl AttemptId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Snapshot of the playback session.
///
/// Serializes in camelCase; absent indices are written as `-1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_loading: bool,
    pub is_playing: bool,
    /// Text of the active (or last) utterance.
    pub current_text: String,
    #[serde(with = "index_sentinel")]
    pub current_word_index: Option<usize>,
    #[serde(with = "index_sentinel")]
    pub current_char_index: Option<usize>,
    /// Short user-facing error, cleared by the next `speak` or `clear_error`.
    pub error: Option<String>,
    pub phase: PlaybackPhase,
    pub provider: Option<ProviderKind>,
    pub isolation_mode: IsolationMode,
    /// Structure of `current_text`, shared with the engine.
    #[serde(skip)]
    pub structure: Option<Arc<TextStructure>>,
}

impl SessionState {
    /// Isolation weights for the current word, when a text is loaded.
    pub fn isolation(&self) -> Option<IsolationView<'_>> {
        self.structure.as_deref().map(|structure| {
            isolation::resolve(structure, self.current_word_index, self.isolation_mode)
        })
    }

    /// Per-word weights; empty when no text is loaded.
    pub fn word_weights(&self) -> Vec<f32> {
        self.isolation()
            .map(|view| view.word_weights())
            .unwrap_or_default()
    }

    /// Text of the currently highlighted word.
    pub fn current_word(&self) -> Option<&str> {
        let structure = self.structure.as_deref()?;
        let index = self.current_word_index?;
        structure.word(index).map(|span| span.text.as_str())
    }

    /// Whether the session is neither loading nor playing.
    pub const fn is_settled(&self) -> bool {
        !self.is_loading && !self.is_playing
    }
}

/// `Option<usize>` on the wire as a signed index with `-1` for `None`.
mod index_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(usize::try_from(raw).ok())
    }
}
