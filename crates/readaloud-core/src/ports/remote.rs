//! Remote speech synthesis port.
//!
//! The remote service returns a pre-rendered clip; the only timing it offers
//! is the clip's total duration.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::sink::ClipEventSink;

/// Errors from the remote service or the clip it produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote speech service unreachable: {0}")]
    Transport(String),

    #[error("remote speech service returned no audio")]
    EmptyPayload,

    #[error("audio could not be decoded: {0}")]
    Decode(String),

    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// Events emitted while a clip plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipEvent {
    Ended,
    Failed(String),
}

/// Renders text into an audio clip.
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    /// `accent` is the service domain selecting a regional voice
    /// (`"co.uk"`); `None` leaves the service default.
    async fn render_audio(
        &self,
        text: &str,
        language: &str,
        slow: bool,
        accent: Option<&str>,
    ) -> Result<Box<dyn AudioResource>, RemoteError>;
}

/// A rendered clip, exclusively owned by the session playing it.
#[async_trait]
pub trait AudioResource: Send {
    /// Size of the encoded payload.
    fn byte_len(&self) -> usize;

    /// Duration once the clip is fully loaded.
    async fn loaded_duration(&mut self) -> Result<Duration, RemoteError>;

    /// Start playback; completion arrives on `sink`.
    fn play(&mut self, sink: ClipEventSink) -> Result<(), RemoteError>;

    /// Stop playback. Must be safe to call more than once.
    fn pause(&mut self);
}
