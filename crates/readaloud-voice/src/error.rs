//! Playback engine error types.

use std::time::Duration;

use readaloud_core::{NativeErrorCode, RemoteError};

/// Message shown for any failure without a more specific wording.
pub const GENERIC_FAILURE_MESSAGE: &str = "Error generating speech. Please try again.";

/// Message shown when `speak` is called without text.
pub const EMPTY_TEXT_MESSAGE: &str = "Please enter some text to speak.";

/// Errors that can occur while speaking an utterance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// Neither provider can speak the language. Never retried.
    #[error("Language '{0}' is not supported by any speech provider")]
    UnsupportedLanguage(String),

    /// The on-device engine has no voice for the language.
    #[error("No on-device voice available for '{0}'")]
    NoVoiceAvailable(String),

    /// The on-device engine never started speaking.
    #[error("On-device speech did not start within {0:?}")]
    SynthesisTimeout(Duration),

    /// The utterance was cancelled. Expected after `stop()`.
    #[error("Speech was interrupted")]
    SynthesisInterrupted,

    /// The on-device engine reported a failure.
    #[error("Speech synthesis failed: {0}")]
    SynthesisError(String),

    /// The on-device engine claimed to finish faster than speech is possible.
    #[error("On-device speech ended after {elapsed:?} for {chars} characters")]
    PrematureEnd { elapsed: Duration, chars: usize },

    /// The remote service or its clip failed.
    #[error("Remote speech failed: {0}")]
    RemoteTransport(String),

    /// The remote service returned a clip with no audio.
    #[error("Remote speech service returned empty audio")]
    EmptyAudio,

    /// `speak` was called with whitespace-only text.
    #[error("Please enter some text to speak.")]
    EmptyText,

    /// The playback engine task has stopped.
    #[error("Playback engine has shut down")]
    ControllerClosed,
}

impl SpeechError {
    /// Map an on-device error code, attributing voice errors to `language`.
    pub fn from_native(code: NativeErrorCode, language: &str) -> Self {
        match code {
            NativeErrorCode::Interrupted | NativeErrorCode::Canceled => Self::SynthesisInterrupted,
            NativeErrorCode::LanguageUnavailable | NativeErrorCode::VoiceUnavailable => {
                Self::NoVoiceAvailable(language.to_owned())
            }
            other => Self::SynthesisError(other.to_string()),
        }
    }

    /// Short text for the session's error field.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyText => EMPTY_TEXT_MESSAGE.to_owned(),
            Self::UnsupportedLanguage(language) => {
                format!("Speech is not available for language '{language}'.")
            }
            Self::NoVoiceAvailable(language) => {
                format!("No voice is installed for language '{language}'.")
            }
            Self::ControllerClosed => self.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_owned(),
        }
    }
}

impl From<RemoteError> for SpeechError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::EmptyPayload => Self::EmptyAudio,
            other => Self::RemoteTransport(other.to_string()),
        }
    }
}
