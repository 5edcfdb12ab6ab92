//! Scripted providers shared by the controller integration tests.
//!
//! Every mock writes to a shared [`CallLog`] so tests can assert both what
//! happened and in which order (e.g. "first session released before the
//! second started").

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use readaloud_core::{
    AudioResource, BoundaryKind, ClipEventSink, NativeErrorCode, NativeEventSink,
    OnDeviceSynthesizer, PlaybackEvent, PlaybackEventEmitter, RemoteError, RemoteSynthesizer,
    SessionState, TextStructure, UtteranceHandle, UtteranceSpec, VoiceDescriptor,
};
use readaloud_voice::PlaybackHandle;
use tokio_util::sync::CancellationToken;

// ── Call log ───────────────────────────────────────────────────────

/// Ordered record of provider calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Position of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }
}

// ── On-device mock ─────────────────────────────────────────────────

/// What the mock engine does after `start_utterance`.
#[derive(Debug, Clone, Copy)]
pub enum OnDeviceScript {
    /// Accept the utterance and never report anything.
    Silent,
    /// Start, report every word `interval` apart, then end.
    Speak { interval: Duration },
    /// Start and end straight away.
    EndAtOnce,
    /// Reject the utterance with a synthesis failure.
    Fail,
    /// Stay silent for `after`, then speak every word `interval` apart and
    /// end, ignoring any cancel in between.
    StartLate { after: Duration, interval: Duration },
    /// Start, report the first word, then get cut off by the system after
    /// `after`.
    InterruptedAfter { after: Duration },
}

pub struct MockOnDevice {
    voices: Vec<VoiceDescriptor>,
    script: OnDeviceScript,
    log: CallLog,
    pub cancels: Arc<AtomicUsize>,
}

impl MockOnDevice {
    pub fn new(script: OnDeviceScript, log: CallLog) -> Self {
        let voices = ["en-US", "es-ES", "hi-IN", "ne-NP", "ja-JP"]
            .into_iter()
            .map(|tag| VoiceDescriptor {
                id: format!("mock-{tag}"),
                name: format!("Mock {tag}"),
                language_tag: tag.to_owned(),
                is_default: true,
                local_service: true,
            })
            .collect();
        Self {
            voices,
            script,
            log,
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn without_voices(mut self) -> Self {
        self.voices.clear();
        self
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl OnDeviceSynthesizer for MockOnDevice {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    fn start_utterance(
        &self,
        spec: UtteranceSpec,
        sink: NativeEventSink,
    ) -> Result<Box<dyn UtteranceHandle>, NativeErrorCode> {
        self.log
            .push(format!("native:start:{}:{}", spec.language_tag, spec.text));
        let token = CancellationToken::new();

        match self.script {
            OnDeviceScript::Silent => {}
            OnDeviceScript::Fail => {
                return Err(NativeErrorCode::SynthesisFailed("engine crashed".into()));
            }
            OnDeviceScript::EndAtOnce => {
                sink.started();
                sink.ended();
            }
            OnDeviceScript::Speak { interval } => {
                let structure = TextStructure::analyze(&spec.text);
                let sink = sink.clone();
                let cancelled = token.clone();
                tokio::spawn(async move {
                    sink.started();
                    for word in structure.words() {
                        sink.boundary(word.start, BoundaryKind::Word);
                        tokio::select! {
                            () = cancelled.cancelled() => return,
                            () = tokio::time::sleep(interval) => {}
                        }
                    }
                    sink.ended();
                });
            }
            OnDeviceScript::StartLate { after, interval } => {
                let structure = TextStructure::analyze(&spec.text);
                let sink = sink.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    sink.started();
                    for word in structure.words() {
                        sink.boundary(word.start, BoundaryKind::Word);
                        tokio::time::sleep(interval).await;
                    }
                    sink.ended();
                });
            }
            OnDeviceScript::InterruptedAfter { after } => {
                let sink = sink.clone();
                let cancelled = token.clone();
                tokio::spawn(async move {
                    sink.started();
                    sink.boundary(0, BoundaryKind::Word);
                    tokio::select! {
                        () = cancelled.cancelled() => {}
                        () = tokio::time::sleep(after) => sink.error(NativeErrorCode::Interrupted),
                    }
                });
            }
        }

        Ok(Box::new(MockUtterance {
            token,
            sink,
            log: self.log.clone(),
            cancels: Arc::clone(&self.cancels),
        }))
    }
}

struct MockUtterance {
    token: CancellationToken,
    sink: NativeEventSink,
    log: CallLog,
    cancels: Arc<AtomicUsize>,
}

impl UtteranceHandle for MockUtterance {
    fn cancel(&mut self) {
        self.log.push("native:cancel");
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        // Real engines report the cancellation as an interruption.
        self.sink.error(NativeErrorCode::Interrupted);
    }
}

// ── Remote mock ────────────────────────────────────────────────────

/// What the mock service returns.
#[derive(Debug, Clone, Copy)]
pub enum RemoteScript {
    /// A clip of this length, delivered after `latency`.
    Clip { duration: Duration, latency: Duration },
    /// A zero-byte clip.
    Empty,
    /// Service unreachable.
    Unreachable,
}

pub struct MockRemote {
    script: RemoteScript,
    log: CallLog,
    pub renders: Arc<AtomicUsize>,
    pub pauses: Arc<AtomicUsize>,
}

impl MockRemote {
    pub fn new(script: RemoteScript, log: CallLog) -> Self {
        Self {
            script,
            log,
            renders: Arc::new(AtomicUsize::new(0)),
            pauses: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn clip(duration: Duration, log: CallLog) -> Self {
        Self::new(
            RemoteScript::Clip {
                duration,
                latency: Duration::from_millis(40),
            },
            log,
        )
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn pause_count(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSynthesizer for MockRemote {
    async fn render_audio(
        &self,
        _text: &str,
        language: &str,
        slow: bool,
        accent: Option<&str>,
    ) -> Result<Box<dyn AudioResource>, RemoteError> {
        match accent {
            Some(accent) => self.log.push(format!("remote:render:{language}:{slow}:{accent}")),
            None => self.log.push(format!("remote:render:{language}:{slow}")),
        }
        self.renders.fetch_add(1, Ordering::SeqCst);

        let (duration, bytes) = match self.script {
            RemoteScript::Clip { duration, latency } => {
                tokio::time::sleep(latency).await;
                (duration, 4_096)
            }
            RemoteScript::Empty => (Duration::ZERO, 0),
            RemoteScript::Unreachable => {
                return Err(RemoteError::Transport("connection refused".into()));
            }
        };
        Ok(Box::new(MockClip {
            duration,
            bytes,
            log: self.log.clone(),
            pauses: Arc::clone(&self.pauses),
            token: CancellationToken::new(),
        }))
    }
}

struct MockClip {
    duration: Duration,
    bytes: usize,
    log: CallLog,
    pauses: Arc<AtomicUsize>,
    token: CancellationToken,
}

#[async_trait]
impl AudioResource for MockClip {
    fn byte_len(&self) -> usize {
        self.bytes
    }

    async fn loaded_duration(&mut self) -> Result<Duration, RemoteError> {
        Ok(self.duration)
    }

    fn play(&mut self, sink: ClipEventSink) -> Result<(), RemoteError> {
        self.log.push("clip:play");
        let duration = self.duration;
        let stopped = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = stopped.cancelled() => {}
                () = tokio::time::sleep(duration) => sink.ended(),
            }
        });
        Ok(())
    }

    fn pause(&mut self) {
        self.log.push("clip:pause");
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }
}

impl Drop for MockClip {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ── Event recording ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drain all recorded events.
    pub fn drain(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn count(&self, pred: impl Fn(&PlaybackEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl PlaybackEventEmitter for RecordingEmitter {
    fn emit(&self, event: PlaybackEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn PlaybackEventEmitter> {
        Box::new(self.clone())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Let virtual time pass so timers and spawned provider tasks run.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Wait (in virtual time) for a state matching `pred`.
pub async fn settle(
    handle: &PlaybackHandle,
    pred: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    tokio::time::timeout(Duration::from_secs(60), handle.wait_until(pred))
        .await
        .expect("state never reached")
        .expect("engine closed")
}
