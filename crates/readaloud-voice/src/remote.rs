//! Remote timing simulator.
//!
//! The remote provider returns a finished clip and nothing else, so word
//! timing is reconstructed: the clip duration is spread over the words in
//! proportion to their length, with additive visual pauses after
//! sentence-ending (and optionally clause-ending) words. The result is a
//! best-effort estimate, not lip-sync.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use readaloud_core::{
    AudioResource, ClipEventSink, EngineSettings, RemoteSynthesizer, Speed, TextStructure,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SpeechError;
use crate::throttle::Highlight;

/// Sentence pauses stretch by this factor for slow speech.
const SLOW_PAUSE_FACTOR: f32 = 1.5;

/// Divergence between expected and actual pace that is worth a warning.
const PACE_WARNING_RATIO: f32 = 2.0;

/// Pacing parameters for highlight schedules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemotePacing {
    pub sentence_pause: Duration,
    pub clause_pause: Duration,
    pub tick_interval: Duration,
}

impl RemotePacing {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            sentence_pause: settings.effective_sentence_pause(),
            clause_pause: settings.effective_clause_pause(),
            tick_interval: settings.effective_tick_interval(),
        }
    }

    fn pause_after(&self, word: &str, slow: bool) -> Duration {
        if word.contains(['.', '!', '?']) {
            if slow {
                self.sentence_pause.mul_f32(SLOW_PAUSE_FACTOR)
            } else {
                self.sentence_pause
            }
        } else if word.contains([',', ';', ':']) {
            self.clause_pause
        } else {
            Duration::ZERO
        }
    }
}

impl Default for RemotePacing {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// One entry of a [`HighlightSchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWord {
    pub word_index: usize,
    pub char_index: usize,
    /// Offset from playback start at which the word is highlighted.
    pub at: Duration,
    /// Share of the clip duration spent on this word.
    pub delay: Duration,
    /// Extra visual pause after this word.
    pub pause: Duration,
}

/// Word highlight times for one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSchedule {
    words: Vec<ScheduledWord>,
    cursor: Option<usize>,
}

impl HighlightSchedule {
    /// Distribute `clip_duration` over the words of `structure`.
    ///
    /// Each word's delay is proportional to `chars + 1`; the delays sum to
    /// exactly `clip_duration`. Pauses come on top of that.
    pub fn build(
        structure: &TextStructure,
        clip_duration: Duration,
        pacing: &RemotePacing,
        slow: bool,
    ) -> Self {
        let weights: Vec<u128> = structure
            .words()
            .iter()
            .map(|word| word.char_len() as u128 + 1)
            .collect();
        let total_weight: u128 = weights.iter().sum();
        let total_nanos = clip_duration.as_nanos();

        // Boundaries from cumulative weights, so rounding never accumulates.
        let boundary = |cumulative: u128| -> Duration {
            if total_weight == 0 {
                return Duration::ZERO;
            }
            let nanos = total_nanos * cumulative / total_weight;
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };

        let mut words = Vec::with_capacity(weights.len());
        let mut cumulative = 0;
        let mut pauses = Duration::ZERO;
        for (word, weight) in structure.words().iter().zip(&weights) {
            let start = boundary(cumulative);
            cumulative += weight;
            let delay = boundary(cumulative) - start;
            let pause = pacing.pause_after(&word.text, slow);
            words.push(ScheduledWord {
                word_index: word.index,
                char_index: word.start,
                at: start + pauses,
                delay,
                pause,
            });
            pauses += pause;
        }

        Self {
            words,
            cursor: None,
        }
    }

    pub fn words(&self) -> &[ScheduledWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn total_delay(&self) -> Duration {
        self.words.iter().map(|w| w.delay).sum()
    }

    pub fn total_pause(&self) -> Duration {
        self.words.iter().map(|w| w.pause).sum()
    }

    /// Whether the last word has been highlighted.
    pub fn is_exhausted(&self) -> bool {
        self.words.is_empty() || self.cursor == Some(self.words.len() - 1)
    }

    /// Advance to `elapsed` and return the latest newly-due word, if the
    /// highlighted word changed.
    pub fn advance(&mut self, elapsed: Duration) -> Option<&ScheduledWord> {
        let due = self.words.partition_point(|w| w.at <= elapsed);
        let latest = due.checked_sub(1)?;
        if self.cursor.is_some_and(|c| c >= latest) {
            return None;
        }
        self.cursor = Some(latest);
        self.words.get(latest)
    }
}

/// Warn when the clip's pace is far from what the speed setting implies.
fn check_pace(words: usize, duration: Duration, speed: Speed, settings: &EngineSettings) {
    if words == 0 || duration.is_zero() {
        return;
    }
    let expected = speed.expected_words_per_second(settings);
    let actual = words as f32 / duration.as_secs_f32();
    let ratio = actual / expected;
    if !(1.0 / PACE_WARNING_RATIO..=PACE_WARNING_RATIO).contains(&ratio) {
        tracing::warn!(
            expected_wps = expected,
            actual_wps = actual,
            "Remote clip pace diverges from the expected pace; clip duration wins"
        );
    }
}

/// A fully loaded remote clip.
pub struct LoadedClip {
    pub resource: Box<dyn AudioResource>,
    pub duration: Duration,
}

impl fmt::Debug for LoadedClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedClip")
            .field("bytes", &self.resource.byte_len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Render and load a clip, rejecting empty audio.
pub async fn load_clip(
    remote: &dyn RemoteSynthesizer,
    text: &str,
    language: &str,
    slow: bool,
    accent: Option<&str>,
) -> Result<LoadedClip, SpeechError> {
    let mut resource = remote.render_audio(text, language, slow, accent).await?;
    if resource.byte_len() == 0 {
        return Err(SpeechError::EmptyAudio);
    }
    let duration = resource.loaded_duration().await?;
    if duration.is_zero() {
        return Err(SpeechError::EmptyAudio);
    }
    Ok(LoadedClip { resource, duration })
}

/// Drives the remote provider for one engine.
#[derive(Clone)]
pub struct RemoteTimingSimulator {
    remote: Arc<dyn RemoteSynthesizer>,
    pacing: RemotePacing,
    settings: EngineSettings,
}

impl RemoteTimingSimulator {
    pub fn new(remote: Arc<dyn RemoteSynthesizer>, settings: &EngineSettings) -> Self {
        Self {
            remote,
            pacing: RemotePacing::from_settings(settings),
            settings: settings.clone(),
        }
    }

    pub const fn pacing(&self) -> &RemotePacing {
        &self.pacing
    }

    /// Fetch and load a clip in the background.
    ///
    /// `deliver` runs once with the outcome unless `token` is cancelled
    /// first. The returned task can also be aborted directly.
    pub fn spawn_fetch(
        &self,
        text: String,
        language: String,
        slow: bool,
        accent: Option<String>,
        token: CancellationToken,
        deliver: impl FnOnce(Result<LoadedClip, SpeechError>) + Send + 'static,
    ) -> JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            tracing::debug!(
                language = %language,
                slow,
                accent = accent.as_deref(),
                "Requesting remote clip"
            );
            let outcome = tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("Remote fetch cancelled");
                    return;
                }
                outcome = load_clip(
                    remote.as_ref(),
                    &text,
                    &language,
                    slow,
                    accent.as_deref(),
                ) => outcome,
            };
            deliver(outcome);
        })
    }

    /// Build the schedule for a loaded clip.
    pub fn schedule(
        &self,
        structure: &TextStructure,
        clip: &LoadedClip,
        speed: Speed,
    ) -> HighlightSchedule {
        check_pace(structure.word_count(), clip.duration, speed, &self.settings);
        HighlightSchedule::build(structure, clip.duration, &self.pacing, speed.is_slow())
    }
}

/// A playing remote clip and its highlight schedule.
pub struct RemotePlayback {
    resource: Option<Box<dyn AudioResource>>,
    schedule: HighlightSchedule,
    started_at: Instant,
    next_tick: Instant,
    tick_interval: Duration,
}

impl fmt::Debug for RemotePlayback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePlayback")
            .field("words", &self.schedule.len())
            .field("started_at", &self.started_at)
            .field("released", &self.resource.is_none())
            .finish_non_exhaustive()
    }
}

impl RemotePlayback {
    /// Start the clip; the first tick is due immediately.
    pub fn start(
        clip: LoadedClip,
        schedule: HighlightSchedule,
        tick_interval: Duration,
        sink: ClipEventSink,
        now: Instant,
    ) -> Result<Self, SpeechError> {
        let LoadedClip { mut resource, .. } = clip;
        resource.play(sink)?;
        Ok(Self {
            resource: Some(resource),
            schedule,
            started_at: now,
            next_tick: now,
            tick_interval,
        })
    }

    /// When the schedule next needs attention; `None` once exhausted.
    pub fn next_tick(&self) -> Option<Instant> {
        (self.resource.is_some() && !self.schedule.is_exhausted()).then_some(self.next_tick)
    }

    /// Handle a tick at `now`. Ticks stay on the grid anchored at playback
    /// start, skipping any that were missed.
    pub fn on_tick(&mut self, now: Instant) -> Option<Highlight> {
        if now < self.next_tick {
            return None;
        }
        let period = self.tick_interval.max(Duration::from_millis(1));
        while self.next_tick <= now {
            self.next_tick += period;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        self.schedule.advance(elapsed).map(|word| Highlight {
            word_index: word.word_index,
            char_index: word.char_index,
        })
    }

    pub const fn schedule(&self) -> &HighlightSchedule {
        &self.schedule
    }

    /// Pause the clip and stop the schedule. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.pause();
        }
    }
}

impl Drop for RemotePlayback {
    fn drop(&mut self) {
        self.release();
    }
}
