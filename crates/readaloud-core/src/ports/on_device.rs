//! On-device speech synthesis port.
//!
//! Models a platform speech engine: a voice catalog plus fire-and-forget
//! utterances that report progress through a [`NativeEventSink`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sink::NativeEventSink;

/// A voice offered by the on-device engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceDescriptor {
    pub id: String,
    pub name: String,
    /// BCP-47 tag, e.g. `"en-US"`.
    pub language_tag: String,
    /// The engine's default voice for its language.
    pub is_default: bool,
    /// Synthesized locally rather than by a network service.
    pub local_service: bool,
}

/// What to speak and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceSpec {
    pub text: String,
    pub language_tag: String,
    pub voice_id: String,
    /// Rate multiplier, `1.0` is the engine's normal pace.
    pub rate: f32,
}

/// Granularity of a boundary event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Word,
    Sentence,
}

/// Error codes an on-device engine reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeErrorCode {
    #[error("utterance interrupted")]
    Interrupted,

    #[error("utterance canceled")]
    Canceled,

    #[error("language unavailable")]
    LanguageUnavailable,

    #[error("voice unavailable")]
    VoiceUnavailable,

    #[error("audio output busy")]
    AudioBusy,

    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
}

impl NativeErrorCode {
    /// Interruption is the expected outcome of cancelling an utterance.
    pub const fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted | Self::Canceled)
    }
}

/// Events emitted by a running utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    Started,
    /// `char_index` is a character offset into the utterance text.
    Boundary { char_index: usize, kind: BoundaryKind },
    Ended,
    Error(NativeErrorCode),
}

/// The on-device speech engine.
pub trait OnDeviceSynthesizer: Send + Sync {
    /// Voices currently installed.
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Begin speaking. Progress arrives on `sink`; the returned handle
    /// cancels the utterance.
    fn start_utterance(
        &self,
        spec: UtteranceSpec,
        sink: NativeEventSink,
    ) -> Result<Box<dyn UtteranceHandle>, NativeErrorCode>;
}

/// Owned handle to a running utterance.
pub trait UtteranceHandle: Send {
    /// Stop speaking. Engines usually answer with an `Interrupted` error.
    fn cancel(&mut self);
}
