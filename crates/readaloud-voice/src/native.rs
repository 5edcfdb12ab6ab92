//! On-device synthesis driver.
//!
//! Starts an utterance on the platform engine, translates its events into
//! [`DriverSignal`]s and detects the two silent failure modes of unreliable
//! languages: never starting, and "finishing" faster than anyone can speak.

use std::sync::Arc;
use std::time::Duration;

use readaloud_core::{
    BoundaryKind, EngineSettings, NativeEvent, NativeEventSink, OnDeviceSynthesizer,
    TextStructure, UtteranceHandle, UtteranceSpec, VoiceDescriptor, primary_subtag,
};
use tokio::time::Instant;

use crate::error::SpeechError;
use crate::throttle::Highlight;

/// Timing limits for on-device attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeLimits {
    pub startup_timeout: Duration,
    pub max_plausible_chars_per_second: f32,
    pub min_chars_for_premature_check: usize,
}

impl NativeLimits {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            startup_timeout: settings.effective_startup_timeout(),
            max_plausible_chars_per_second: settings.effective_max_plausible_chars_per_second(),
            min_chars_for_premature_check: settings.effective_min_chars_for_premature_check(),
        }
    }
}

impl Default for NativeLimits {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// What a provider event means for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSignal {
    Started,
    Word(Highlight),
    Finished,
    Failed(SpeechError),
    Ignored,
}

/// Pick the best voice for `tag`.
///
/// Exact tag matches beat primary-subtag matches; within a tier the
/// engine's default voice wins, then local voices.
pub fn select_voice<'a>(voices: &'a [VoiceDescriptor], tag: &str) -> Option<&'a VoiceDescriptor> {
    let wanted = normalize_tag(tag);
    let wanted_primary = primary_subtag(tag);

    voices
        .iter()
        .filter_map(|voice| {
            let tier = if normalize_tag(&voice.language_tag) == wanted {
                0
            } else if primary_subtag(&voice.language_tag) == wanted_primary {
                1
            } else {
                return None;
            };
            Some(((tier, !voice.is_default, !voice.local_service), voice))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, voice)| voice)
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

/// One running on-device utterance.
pub struct NativeAttempt {
    handle: Option<Box<dyn UtteranceHandle>>,
    structure: Arc<TextStructure>,
    language: String,
    unreliable: bool,
    limits: NativeLimits,
    launched_at: Instant,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    finished: bool,
}

impl std::fmt::Debug for NativeAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeAttempt")
            .field("language", &self.language)
            .field("unreliable", &self.unreliable)
            .field("started", &self.started_at.is_some())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl NativeAttempt {
    /// Select a voice and start speaking `structure`'s text.
    ///
    /// Fails fast with [`SpeechError::NoVoiceAvailable`] when the engine has
    /// no voice for `language_tag`. The startup deadline is armed only for
    /// unreliable languages.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        synthesizer: &dyn OnDeviceSynthesizer,
        structure: Arc<TextStructure>,
        language_tag: &str,
        rate: f32,
        unreliable: bool,
        limits: NativeLimits,
        sink: NativeEventSink,
        now: Instant,
    ) -> Result<Self, SpeechError> {
        let voices = synthesizer.voices();
        let voice = select_voice(&voices, language_tag)
            .ok_or_else(|| SpeechError::NoVoiceAvailable(language_tag.to_owned()))?;

        tracing::debug!(
            voice = %voice.id,
            language = %language_tag,
            unreliable,
            "Starting on-device utterance"
        );

        let spec = UtteranceSpec {
            text: structure.text().to_owned(),
            language_tag: language_tag.to_owned(),
            voice_id: voice.id.clone(),
            rate,
        };
        let handle = synthesizer
            .start_utterance(spec, sink)
            .map_err(|code| SpeechError::from_native(code, language_tag))?;

        Ok(Self {
            handle: Some(handle),
            structure,
            language: language_tag.to_owned(),
            unreliable,
            limits,
            launched_at: now,
            started_at: None,
            deadline: unreliable.then(|| now + limits.startup_timeout),
            finished: false,
        })
    }

    pub const fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Deadline for the engine to report that it started, if armed.
    pub const fn startup_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Translate one engine event.
    pub fn interpret(&mut self, event: NativeEvent, now: Instant) -> DriverSignal {
        if self.finished {
            return DriverSignal::Ignored;
        }
        match event {
            NativeEvent::Started => {
                if self.mark_started(now) {
                    DriverSignal::Started
                } else {
                    DriverSignal::Ignored
                }
            }
            NativeEvent::Boundary {
                char_index,
                kind: BoundaryKind::Word,
            } => {
                // Some engines skip the start event and go straight to boundaries.
                self.mark_started(now);
                match self.structure.word_at_char(char_index) {
                    Some(word_index) => DriverSignal::Word(Highlight {
                        word_index,
                        char_index,
                    }),
                    None => DriverSignal::Ignored,
                }
            }
            NativeEvent::Boundary { .. } => DriverSignal::Ignored,
            NativeEvent::Ended => {
                self.finished = true;
                self.deadline = None;
                match self.premature_end(now) {
                    Some(err) => DriverSignal::Failed(err),
                    None => DriverSignal::Finished,
                }
            }
            // Our own cancel drops the handle first; anything else means the
            // system cut the utterance short and nothing more will arrive.
            NativeEvent::Error(code) if code.is_interruption() => {
                if self.handle.is_none() {
                    tracing::trace!(language = %self.language, "Ignoring utterance interruption");
                    return DriverSignal::Ignored;
                }
                self.finished = true;
                self.deadline = None;
                tracing::warn!(language = %self.language, "Utterance interrupted by the system");
                DriverSignal::Failed(SpeechError::SynthesisError(format!(
                    "utterance was interrupted ({code})"
                )))
            }
            NativeEvent::Error(code) => {
                self.finished = true;
                self.deadline = None;
                DriverSignal::Failed(SpeechError::from_native(code, &self.language))
            }
        }
    }

    /// Returns the timeout error once the startup deadline passes unanswered.
    pub fn check_timeout(&mut self, now: Instant) -> Option<SpeechError> {
        let deadline = self.deadline?;
        if now < deadline || self.started_at.is_some() {
            return None;
        }
        self.deadline = None;
        Some(SpeechError::SynthesisTimeout(self.limits.startup_timeout))
    }

    /// Cancel the utterance (if still running) and drop the engine handle.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if !self.finished {
                handle.cancel();
            }
        }
        self.deadline = None;
    }

    fn mark_started(&mut self, now: Instant) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        self.deadline = None;
        true
    }

    fn premature_end(&self, now: Instant) -> Option<SpeechError> {
        if !self.unreliable {
            return None;
        }
        let chars = self.structure.text().trim().chars().count();
        if chars < self.limits.min_chars_for_premature_check {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started_at.unwrap_or(self.launched_at));
        let fastest =
            Duration::try_from_secs_f32(chars as f32 / self.limits.max_plausible_chars_per_second)
                .ok()?;
        (elapsed < fastest).then_some(SpeechError::PrematureEnd { elapsed, chars })
    }
}

impl Drop for NativeAttempt {
    fn drop(&mut self) {
        self.release();
    }
}
