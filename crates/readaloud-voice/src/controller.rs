//! Playback session controller.
//!
//! A single tokio task (the engine) owns all playback state. The outside
//! world talks to it through a [`PlaybackHandle`]: commands go in on a
//! bounded channel, state comes out on a watch channel. Providers report
//! back on an unbounded channel with every event tagged by the attempt that
//! produced it, and all timers (startup timeout, schedule ticks, highlight
//! flush) collapse into one next-wakeup deadline.

use std::sync::Arc;
use std::time::Duration;

use readaloud_core::{
    AnalysisCache, AttemptId, ClipEvent, ClipEventSink, EngineSettings, LanguageTable,
    NativeEvent, NativeEventSink, NoopEmitter, OnDeviceSynthesizer, PlaybackEvent,
    PlaybackEventEmitter, PlaybackPhase, ProviderKind, RemoteSynthesizer, SessionState,
    SettingsError, SpeakSettings, UtteranceRequest, validate_settings,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::error::SpeechError;
use crate::fallback::{FallbackController, FallbackDecision, Route, plan_route};
use crate::native::{DriverSignal, NativeAttempt, NativeLimits};
use crate::remote::{LoadedClip, RemotePlayback, RemoteTimingSimulator};
use crate::session::{ActiveProvider, Session};
use crate::throttle::{Highlight, HighlightThrottle};

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 32;

enum Command {
    Speak(UtteranceRequest),
    Stop,
    ClearError,
    /// Replies once every earlier command and queued provider event is handled.
    Sync(oneshot::Sender<()>),
    Shutdown,
}

enum EngineEvent {
    Native(AttemptId, NativeEvent),
    Clip(AttemptId, ClipEvent),
    ClipLoaded(AttemptId, Result<LoadedClip, SpeechError>),
}

impl EngineEvent {
    const fn attempt(&self) -> AttemptId {
        match self {
            Self::Native(attempt, _) | Self::Clip(attempt, _) | Self::ClipLoaded(attempt, _) => {
                *attempt
            }
        }
    }
}

// ── Builder ────────────────────────────────────────────────────────

/// Assembles providers and settings into a running engine.
pub struct PlaybackController {
    settings: EngineSettings,
    on_device: Option<Arc<dyn OnDeviceSynthesizer>>,
    remote: Option<Arc<dyn RemoteSynthesizer>>,
    emitter: Arc<dyn PlaybackEventEmitter>,
}

impl PlaybackController {
    /// Start assembling an engine. Settings are validated here so a bad
    /// value can never take the running engine down.
    pub fn new(settings: EngineSettings) -> Result<Self, SettingsError> {
        validate_settings(&settings)?;
        Ok(Self {
            settings,
            on_device: None,
            remote: None,
            emitter: Arc::new(NoopEmitter::new()),
        })
    }

    #[must_use]
    pub fn with_on_device(mut self, provider: Arc<dyn OnDeviceSynthesizer>) -> Self {
        self.on_device = Some(provider);
        self
    }

    #[must_use]
    pub fn with_remote(mut self, provider: Arc<dyn RemoteSynthesizer>) -> Self {
        self.remote = Some(provider);
        self
    }

    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<dyn PlaybackEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Spawn the engine task on the current tokio runtime.
    pub fn spawn(self) -> PlaybackHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::default());

        let engine = Engine {
            table: self.settings.effective_languages(),
            limits: NativeLimits::from_settings(&self.settings),
            throttle_window: self.settings.effective_highlight_throttle(),
            tick_interval: self.settings.effective_tick_interval(),
            remote: self
                .remote
                .map(|remote| RemoteTimingSimulator::new(remote, &self.settings)),
            on_device: self.on_device,
            emitter: self.emitter,
            state: state_tx,
            events: event_tx,
            cache: AnalysisCache::new(),
            last_attempt: AttemptId::default(),
            session: None,
        };
        tokio::spawn(engine.run(command_rx, event_rx));

        PlaybackHandle {
            commands: command_tx,
            state: state_rx,
        }
    }
}

// ── Handle ─────────────────────────────────────────────────────────

/// Cloneable handle to a running engine. The engine stops once every
/// handle is dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl PlaybackHandle {
    /// Stop whatever is playing and speak `text`.
    pub async fn speak(
        &self,
        text: impl Into<String>,
        settings: SpeakSettings,
    ) -> Result<(), SpeechError> {
        self.send(Command::Speak(UtteranceRequest::new(text, settings)))
            .await
    }

    pub async fn speak_request(&self, request: UtteranceRequest) -> Result<(), SpeechError> {
        self.send(Command::Speak(request)).await
    }

    /// Stop playback. Calling it while idle is harmless.
    pub async fn stop(&self) -> Result<(), SpeechError> {
        self.send(Command::Stop).await
    }

    pub async fn clear_error(&self) -> Result<(), SpeechError> {
        self.send(Command::ClearError).await
    }

    /// Wait until the engine has handled everything sent before this call.
    pub async fn sync(&self) -> Result<(), SpeechError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Sync(reply)).await?;
        done.await.map_err(|_| SpeechError::ControllerClosed)
    }

    /// Stop playback, end the engine task and wait for it to finish.
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_ok() {
            self.commands.closed().await;
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait for a state matching `predicate` (checked against the current
    /// state first).
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState, SpeechError> {
        let mut state = self.subscribe();
        let matched = state
            .wait_for(predicate)
            .await
            .map_err(|_| SpeechError::ControllerClosed)?;
        Ok(matched.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), SpeechError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SpeechError::ControllerClosed)
    }
}

// ── Engine ─────────────────────────────────────────────────────────

struct Engine {
    table: LanguageTable,
    limits: NativeLimits,
    throttle_window: Duration,
    tick_interval: Duration,
    on_device: Option<Arc<dyn OnDeviceSynthesizer>>,
    remote: Option<RemoteTimingSimulator>,
    emitter: Arc<dyn PlaybackEventEmitter>,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<EngineEvent>,
    cache: AnalysisCache,
    last_attempt: AttemptId,
    session: Option<Session>,
}

/// The parts of [`SessionState`] that change during playback.
#[derive(Debug, PartialEq, Eq)]
struct Progress {
    is_loading: bool,
    is_playing: bool,
    word_index: Option<usize>,
    char_index: Option<usize>,
    phase: PlaybackPhase,
    provider: Option<ProviderKind>,
    error: Option<String>,
}

impl Progress {
    fn of(state: &SessionState) -> Self {
        Self {
            is_loading: state.is_loading,
            is_playing: state.is_playing,
            word_index: state.current_word_index,
            char_index: state.current_char_index,
            phase: state.phase,
            provider: state.provider,
            error: state.error.clone(),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Engine {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        tracing::debug!("Playback engine started");
        loop {
            let wakeup = self.session.as_ref().and_then(Session::next_wakeup);
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.handle_event(event),
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                () = sleep_until_opt(wakeup) => self.handle_timers(Instant::now()),
            }
        }
        self.stop();
        tracing::debug!("Playback engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Speak(request) => self.speak(request),
            Command::Stop => self.stop(),
            Command::ClearError => {
                self.update(|s| s.error = None);
            }
            Command::Sync(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    // ── Commands ───────────────────────────────────────────────────

    fn speak(&mut self, request: UtteranceRequest) {
        self.stop();

        if request.text.trim().is_empty() {
            self.surface(SpeechError::EmptyText);
            return;
        }

        let route = match plan_route(
            &self.table,
            &request.settings.language,
            self.on_device.is_some(),
            self.remote.is_some(),
        ) {
            Ok(route) => route,
            Err(err) => {
                self.surface(err);
                return;
            }
        };

        let structure = self.cache.get_or_analyze(&request.text);
        let attempt = self.next_attempt();
        let mut fallback = FallbackController::new(route);
        let phase = fallback.begin();

        tracing::info!(
            attempt = %attempt,
            language = %request.settings.language,
            words = structure.word_count(),
            phase = ?phase,
            "Speaking"
        );

        let next = SessionState {
            is_loading: true,
            is_playing: false,
            current_text: request.text.clone(),
            current_word_index: None,
            current_char_index: None,
            error: None,
            phase,
            provider: None,
            isolation_mode: request.settings.isolation_mode,
            structure: Some(Arc::clone(&structure)),
        };
        self.session = Some(Session::new(
            attempt,
            request,
            structure,
            fallback,
            HighlightThrottle::new(self.throttle_window),
        ));
        self.state.send_replace(next);

        if phase == PlaybackPhase::TryingPrimary {
            self.start_primary();
        } else {
            self.start_secondary();
        }
    }

    /// Tear down the active session. Idempotent.
    fn stop(&mut self) {
        let stopped = self.release_session();
        self.update(|s| {
            s.is_loading = false;
            s.is_playing = false;
            s.current_word_index = None;
            s.current_char_index = None;
            s.phase = PlaybackPhase::Idle;
        });
        if stopped {
            self.emit(PlaybackEvent::SpeakingStopped);
        }
    }

    // ── Providers ──────────────────────────────────────────────────

    fn start_primary(&mut self) {
        let Some(on_device) = self.on_device.clone() else {
            self.primary_failed(SpeechError::SynthesisError(
                "no on-device provider configured".into(),
            ));
            return;
        };
        let attempt = self.next_attempt();
        let events = self.events.clone();
        let sink = NativeEventSink::new(attempt, move |attempt, event| {
            let _ = events.send(EngineEvent::Native(attempt, event));
        });

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Route::PrimaryFirst {
            native_tag,
            unreliable,
            ..
        } = session.fallback.route().clone()
        else {
            return;
        };
        session.attempt = attempt;

        let started = NativeAttempt::start(
            on_device.as_ref(),
            Arc::clone(&session.structure),
            &native_tag,
            session.request.settings.speed.native_rate(),
            unreliable,
            self.limits,
            sink,
            Instant::now(),
        );
        match started {
            Ok(native) => {
                session.replace_provider(ActiveProvider::Native(native));
                self.update(|s| s.provider = Some(ProviderKind::OnDevice));
            }
            Err(err) => self.primary_failed(err),
        }
    }

    fn primary_failed(&mut self, err: SpeechError) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.fallback.on_primary_failure(err.clone()) {
            FallbackDecision::Ignore => {}
            FallbackDecision::TrySecondary { remote_language } => {
                tracing::warn!(
                    attempt = %session.attempt,
                    error = %err,
                    remote = %remote_language,
                    "On-device speech failed, falling back to remote"
                );
                session.release_provider();
                session.throttle.reset();
                self.update(|s| {
                    s.is_loading = true;
                    s.is_playing = false;
                    s.current_word_index = None;
                    s.current_char_index = None;
                    s.phase = PlaybackPhase::TryingSecondary;
                });
                self.emit(PlaybackEvent::ProviderFallback {
                    from: ProviderKind::OnDevice,
                    to: ProviderKind::Remote,
                    reason: err.to_string(),
                });
                self.start_secondary();
            }
            FallbackDecision::Surface(err) => self.surface(err),
        }
    }

    fn start_secondary(&mut self) {
        let Some(remote) = self.remote.clone() else {
            let language = self
                .session
                .as_ref()
                .map(|s| s.request.settings.language.clone())
                .unwrap_or_default();
            self.surface(SpeechError::UnsupportedLanguage(language));
            return;
        };
        let attempt = self.next_attempt();
        let events = self.events.clone();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(language) = session.fallback.route().remote_language().map(str::to_owned)
        else {
            return;
        };
        session.attempt = attempt;

        let fetch = remote.spawn_fetch(
            session.request.text.clone(),
            language,
            session.request.settings.speed.is_slow(),
            session.request.settings.remote_accent().map(str::to_owned),
            session.token.child_token(),
            move |outcome| {
                let _ = events.send(EngineEvent::ClipLoaded(attempt, outcome));
            },
        );
        session.replace_provider(ActiveProvider::RemoteLoading(fetch));
        self.update(|s| {
            s.is_loading = true;
            s.provider = Some(ProviderKind::Remote);
            s.phase = PlaybackPhase::TryingSecondary;
        });
    }

    fn play_clip(&mut self, clip: LoadedClip, now: Instant) {
        let (Some(remote), Some(session)) = (self.remote.as_ref(), self.session.as_mut()) else {
            return;
        };
        let schedule = remote.schedule(&session.structure, &clip, session.request.settings.speed);
        tracing::debug!(
            attempt = %session.attempt,
            duration_ms = clip.duration.as_millis(),
            words = schedule.len(),
            "Remote clip loaded"
        );

        let events = self.events.clone();
        let sink = ClipEventSink::new(session.attempt, move |attempt, event| {
            let _ = events.send(EngineEvent::Clip(attempt, event));
        });
        match RemotePlayback::start(clip, schedule, self.tick_interval, sink, now) {
            Ok(playback) => {
                session.replace_provider(ActiveProvider::Remote(playback));
                self.on_started();
            }
            Err(err) => self.surface(err),
        }
    }

    // ── Provider events ────────────────────────────────────────────

    fn handle_event(&mut self, event: EngineEvent) {
        let now = Instant::now();
        let Some(session) = self.session.as_mut() else {
            tracing::trace!(attempt = %event.attempt(), "Discarding event with no session");
            return;
        };
        if !session.accepts(event.attempt()) {
            tracing::trace!(
                attempt = %event.attempt(),
                current = %session.attempt,
                "Discarding stale provider event"
            );
            return;
        }

        match event {
            EngineEvent::Native(_, native) => {
                let Some(ActiveProvider::Native(attempt)) = session.provider.as_mut() else {
                    return;
                };
                match attempt.interpret(native, now) {
                    DriverSignal::Started => self.on_started(),
                    DriverSignal::Word(highlight) => {
                        self.on_started();
                        self.offer_highlight(highlight, now);
                    }
                    DriverSignal::Finished => self.complete(),
                    DriverSignal::Failed(err) => self.primary_failed(err),
                    DriverSignal::Ignored => {}
                }
            }
            EngineEvent::ClipLoaded(_, Ok(clip)) => self.play_clip(clip, now),
            EngineEvent::ClipLoaded(_, Err(err)) => self.surface(err),
            EngineEvent::Clip(_, ClipEvent::Ended) => self.complete(),
            EngineEvent::Clip(_, ClipEvent::Failed(message)) => {
                self.surface(SpeechError::RemoteTransport(message));
            }
        }
    }

    fn handle_timers(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_live() {
            return;
        }

        let mut timeout = None;
        let mut tick = None;
        match session.provider.as_mut() {
            Some(ActiveProvider::Native(attempt)) => timeout = attempt.check_timeout(now),
            Some(ActiveProvider::Remote(playback)) => tick = playback.on_tick(now),
            Some(ActiveProvider::RemoteLoading(_)) | None => {}
        }
        let flushed = session.throttle.flush(now);

        if let Some(highlight) = flushed {
            self.publish_highlight(highlight);
        }
        if let Some(highlight) = tick {
            self.offer_highlight(highlight, now);
        }
        if let Some(err) = timeout {
            self.primary_failed(err);
        }
    }

    /// Move from a trying phase to the matching playing phase.
    fn on_started(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !matches!(
            session.fallback.phase(),
            PlaybackPhase::TryingPrimary | PlaybackPhase::TryingSecondary
        ) {
            return;
        }
        let phase = session.fallback.on_started();
        let provider = session.provider_kind();
        let word_count = session.structure.word_count();
        tracing::info!(attempt = %session.attempt, provider = ?provider, "Speech started");

        self.update(|s| {
            s.is_loading = false;
            s.is_playing = true;
            s.phase = phase;
            s.provider = provider;
        });
        if let Some(provider) = provider {
            self.emit(PlaybackEvent::SpeakingStarted {
                provider,
                word_count,
            });
        }
    }

    fn offer_highlight(&mut self, highlight: Highlight, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(highlight) = session.throttle.offer(highlight, now) {
            self.publish_highlight(highlight);
        }
    }

    fn publish_highlight(&self, highlight: Highlight) {
        self.update(|s| {
            s.current_word_index = Some(highlight.word_index);
            s.current_char_index = Some(highlight.char_index);
        });
        self.emit(PlaybackEvent::WordHighlighted {
            word_index: highlight.word_index,
            char_index: highlight.char_index,
        });
    }

    fn complete(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.fallback.finish();
        let provider = session.provider_kind();
        tracing::info!(attempt = %session.attempt, provider = ?provider, "Speech finished");
        session.release();
        drop(session);

        self.update(|s| {
            s.is_loading = false;
            s.is_playing = false;
            s.current_word_index = None;
            s.current_char_index = None;
            s.phase = PlaybackPhase::Ended;
        });
        if let Some(provider) = provider {
            self.emit(PlaybackEvent::SpeakingFinished { provider });
        }
    }

    /// End the session with a user-visible error.
    fn surface(&mut self, err: SpeechError) {
        if let Some(mut session) = self.session.take() {
            session.fallback.reset();
            session.release();
        }
        tracing::warn!(error = %err, "Speech failed");

        let message = err.user_message();
        self.update(|s| {
            s.is_loading = false;
            s.is_playing = false;
            s.current_word_index = None;
            s.current_char_index = None;
            s.phase = PlaybackPhase::Idle;
            s.error = Some(message.clone());
        });
        self.emit(PlaybackEvent::PlaybackError { message });
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn release_session(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        tracing::info!(attempt = %session.attempt, "Stopping speech");
        session.fallback.reset();
        session.release();
        true
    }

    const fn next_attempt(&mut self) -> AttemptId {
        self.last_attempt = self.last_attempt.next();
        self.last_attempt
    }

    /// Apply `change` and notify subscribers only if something changed.
    ///
    /// Text and structure are only replaced wholesale by `speak`, so only
    /// the progress fields are compared.
    fn update(&self, change: impl FnOnce(&mut SessionState)) {
        self.state.send_if_modified(|state| {
            let before = Progress::of(state);
            change(state);
            Progress::of(state) != before
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        tracing::debug!(event = event.kind(), "Playback event");
        self.emitter.emit(event);
    }
}
