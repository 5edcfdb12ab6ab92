//! Offline on-device provider.
//!
//! Speaks nothing; instead it walks the text on a words-per-minute clock and
//! emits the same start/boundary/end events a platform engine would. Used
//! for `--simulate` runs and as a stand-in where no speech engine exists.

use std::time::Duration;

use readaloud_core::{
    BoundaryKind, NativeErrorCode, NativeEventSink, OnDeviceSynthesizer, TextStructure,
    UtteranceHandle, UtteranceSpec, VoiceDescriptor,
};
use tokio_util::sync::CancellationToken;

/// Default speaking pace at rate `1.0`.
pub const DEFAULT_WORDS_PER_MINUTE: f32 = 170.0;

const DEFAULT_START_DELAY: Duration = Duration::from_millis(120);

/// A fake speech engine driven by a timer.
#[derive(Debug, Clone)]
pub struct SimulatedSynthesizer {
    voices: Vec<VoiceDescriptor>,
    words_per_minute: f32,
    start_delay: Duration,
}

impl Default for SimulatedSynthesizer {
    fn default() -> Self {
        let voices = [
            ("sim-en", "Simulated English", "en-US"),
            ("sim-es", "Simulated Spanish", "es-ES"),
            ("sim-fr", "Simulated French", "fr-FR"),
            ("sim-de", "Simulated German", "de-DE"),
        ]
        .into_iter()
        .map(|(id, name, tag)| VoiceDescriptor {
            id: id.to_owned(),
            name: name.to_owned(),
            language_tag: tag.to_owned(),
            is_default: true,
            local_service: true,
        })
        .collect();
        Self::new(voices)
    }
}

impl SimulatedSynthesizer {
    /// An engine offering exactly `voices`.
    pub const fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            voices,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            start_delay: DEFAULT_START_DELAY,
        }
    }

    #[must_use]
    pub const fn with_words_per_minute(mut self, words_per_minute: f32) -> Self {
        self.words_per_minute = words_per_minute;
        self
    }

    #[must_use]
    pub const fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    fn word_interval(&self, rate: f32) -> Duration {
        let per_minute = (self.words_per_minute * rate).max(1.0);
        Duration::from_secs_f32(60.0 / per_minute)
    }
}

impl OnDeviceSynthesizer for SimulatedSynthesizer {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    fn start_utterance(
        &self,
        spec: UtteranceSpec,
        sink: NativeEventSink,
    ) -> Result<Box<dyn UtteranceHandle>, NativeErrorCode> {
        if !self.voices.iter().any(|v| v.id == spec.voice_id) {
            return Err(NativeErrorCode::VoiceUnavailable);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NativeErrorCode::SynthesisFailed(e.to_string()))?;

        let structure = TextStructure::analyze(&spec.text);
        let interval = self.word_interval(spec.rate);
        let start_delay = self.start_delay;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        runtime.spawn(async move {
            let interrupted = |sink: &NativeEventSink| sink.error(NativeErrorCode::Interrupted);

            tokio::select! {
                () = cancelled.cancelled() => return interrupted(&sink),
                () = tokio::time::sleep(start_delay) => {}
            }
            sink.started();

            for word in structure.words() {
                sink.boundary(word.start, BoundaryKind::Word);
                if word.text.ends_with(['.', '!', '?']) {
                    sink.boundary(word.start, BoundaryKind::Sentence);
                }
                tokio::select! {
                    () = cancelled.cancelled() => return interrupted(&sink),
                    () = tokio::time::sleep(interval) => {}
                }
            }
            sink.ended();
        });

        Ok(Box::new(SimulatedUtterance { token }))
    }
}

struct SimulatedUtterance {
    token: CancellationToken,
}

impl UtteranceHandle for SimulatedUtterance {
    fn cancel(&mut self) {
        self.token.cancel();
    }
}

impl Drop for SimulatedUtterance {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
