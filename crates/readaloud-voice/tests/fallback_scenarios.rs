//! Integration tests for provider fallback and remote playback.
//!
//! # What is tested
//!
//! - Startup timeout on an unreliable language falls back exactly once
//! - Missing voices and implausibly fast endings fall back
//! - Reliable languages surface synthesis failures instead of falling back
//! - Remote failures surface once and never loop
//! - A primary that wakes up after the fallback cannot touch the session
//! - Remote-only routes schedule highlights across the clip duration
//! - Stopping while a clip loads or plays abandons it and its schedule
//! - The requested accent reaches the remote service

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    CallLog, MockOnDevice, MockRemote, OnDeviceScript, RecordingEmitter, RemoteScript, advance,
    settle,
};
use readaloud_core::{
    EngineSettings, PlaybackEvent, PlaybackPhase, ProviderKind, SpeakSettings, Speed,
};
use readaloud_voice::{GENERIC_FAILURE_MESSAGE, PlaybackController, PlaybackHandle};

struct Harness {
    handle: PlaybackHandle,
    on_device: Option<Arc<MockOnDevice>>,
    remote: Arc<MockRemote>,
    emitter: RecordingEmitter,
    log: CallLog,
}

fn harness(on_device: Option<MockOnDevice>, remote: RemoteScript, log: CallLog) -> Harness {
    let on_device = on_device.map(Arc::new);
    let remote = Arc::new(MockRemote::new(remote, log.clone()));
    let emitter = RecordingEmitter::new();

    let mut controller = PlaybackController::new(EngineSettings::default())
        .unwrap()
        .with_remote(remote.clone())
        .with_emitter(Arc::new(emitter.clone()));
    if let Some(on_device) = &on_device {
        controller = controller.with_on_device(on_device.clone());
    }
    Harness {
        handle: controller.spawn(),
        on_device,
        remote,
        emitter,
        log,
    }
}

const fn clip(seconds: u64) -> RemoteScript {
    RemoteScript::Clip {
        duration: Duration::from_secs(seconds),
        latency: Duration::from_millis(40),
    }
}

fn is_fallback(event: &PlaybackEvent) -> bool {
    matches!(event, PlaybackEvent::ProviderFallback { .. })
}

// ── Fallback triggers ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn startup_timeout_falls_back_to_remote_once() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Silent, log.clone())),
        clip(2),
        log,
    );

    h.handle
        .speak("namaste duniya kaise ho", SpeakSettings::new("hi"))
        .await
        .unwrap();

    advance(Duration::from_millis(2_900)).await;
    let state = h.handle.state();
    assert_eq!(state.phase, PlaybackPhase::TryingPrimary);
    assert!(state.is_loading);
    assert_eq!(h.remote.render_count(), 0);

    let state = settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;
    assert_eq!(state.error, None);
    assert_eq!(h.remote.render_count(), 1);
    assert_eq!(h.on_device.as_ref().unwrap().cancel_count(), 1);
    assert!(h.log.entries().contains(&"remote:render:hi:false".to_owned()));

    let events = h.emitter.events();
    assert_eq!(events.iter().filter(|e| is_fallback(e)).count(), 1);
    let Some(PlaybackEvent::ProviderFallback { from, to, reason }) =
        events.iter().find(|e| is_fallback(e))
    else {
        unreachable!()
    };
    assert_eq!((*from, *to), (ProviderKind::OnDevice, ProviderKind::Remote));
    assert!(reason.contains("did not start"), "{reason}");

    assert!(events.contains(&PlaybackEvent::SpeakingStarted {
        provider: ProviderKind::Remote,
        word_count: 4
    }));
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::SpeakingFinished {
            provider: ProviderKind::Remote
        })
    );
}

#[tokio::test(start_paused = true)]
async fn reliable_language_has_no_startup_deadline() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Silent, log.clone())),
        clip(2),
        log,
    );

    h.handle
        .speak("Hello there", SpeakSettings::new("en"))
        .await
        .unwrap();
    advance(Duration::from_secs(30)).await;

    assert_eq!(h.handle.state().phase, PlaybackPhase::TryingPrimary);
    assert_eq!(h.remote.render_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_voice_falls_back_immediately() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Silent, log.clone()).without_voices()),
        clip(1),
        log,
    );

    h.handle
        .speak("Namaste from Kathmandu", SpeakSettings::new("ne"))
        .await
        .unwrap();
    // Less than the clip latency, so the remote is still loading.
    advance(Duration::from_millis(10)).await;

    // Nepali falls back to the Hindi remote voice.
    assert!(h.log.entries().contains(&"remote:render:hi:false".to_owned()));
    assert_eq!(h.log.count("native:start"), 0);
    assert_eq!(h.handle.state().phase, PlaybackPhase::TryingSecondary);

    settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;
}

#[tokio::test(start_paused = true)]
async fn implausibly_fast_end_falls_back() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::EndAtOnce, log.clone())),
        clip(3),
        log,
    );

    h.handle
        .speak(
            "This sentence is far too long to finish instantly.",
            SpeakSettings::new("ja"),
        )
        .await
        .unwrap();
    settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;

    assert_eq!(h.remote.render_count(), 1);
    let events = h.emitter.events();
    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::SpeakingStarted { provider, .. } => Some(*provider),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![ProviderKind::OnDevice, ProviderKind::Remote]);
    assert_eq!(events.iter().filter(|e| is_fallback(e)).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reliable_language_trusts_a_fast_end() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::EndAtOnce, log.clone())),
        clip(3),
        log,
    );

    h.handle
        .speak(
            "This sentence is far too long to finish instantly.",
            SpeakSettings::new("en"),
        )
        .await
        .unwrap();
    settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;

    assert_eq!(h.remote.render_count(), 0);
    assert!(!h.emitter.events().iter().any(is_fallback));
}

#[tokio::test(start_paused = true)]
async fn late_primary_events_are_discarded_after_fallback() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(
            OnDeviceScript::StartLate {
                after: Duration::from_secs(4),
                interval: Duration::from_millis(50),
            },
            log.clone(),
        )),
        clip(2),
        log,
    );

    h.handle
        .speak("namaste duniya kaise ho aap", SpeakSettings::new("hi"))
        .await
        .unwrap();
    let state = settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;
    assert_eq!(state.error, None);
    advance(Duration::from_secs(10)).await;

    // The on-device engine speaks from 4s on, while the remote clip plays.
    let events = h.emitter.events();
    let started: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::SpeakingStarted { provider, .. } => Some(*provider),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![ProviderKind::Remote]);

    let words: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::WordHighlighted { word_index, .. } => Some(*word_index),
            _ => None,
        })
        .collect();
    assert_eq!(words, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        h.emitter
            .count(|e| matches!(e, PlaybackEvent::SpeakingFinished { .. })),
        1
    );
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::SpeakingFinished {
            provider: ProviderKind::Remote
        })
    );
    assert_eq!(h.handle.state().phase, PlaybackPhase::Ended);
}

// ── Surfaced failures ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reliable_synthesis_failure_surfaces() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Fail, log.clone())),
        clip(1),
        log,
    );

    h.handle
        .speak("Hello there", SpeakSettings::new("en"))
        .await
        .unwrap();
    h.handle.sync().await.unwrap();

    let state = h.handle.state();
    assert_eq!(state.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert_eq!(state.phase, PlaybackPhase::Idle);
    assert!(!state.is_loading);
    assert_eq!(h.remote.render_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unreliable_synthesis_failure_falls_back() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Fail, log.clone())),
        clip(1),
        log,
    );

    h.handle
        .speak("namaste duniya", SpeakSettings::new("hi"))
        .await
        .unwrap();
    let state = settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;

    assert_eq!(state.error, None);
    assert_eq!(h.remote.render_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_after_fallback_surfaces_once() {
    let log = CallLog::default();
    let h = harness(
        Some(MockOnDevice::new(OnDeviceScript::Silent, log.clone())),
        RemoteScript::Unreachable,
        log,
    );

    h.handle
        .speak("namaste duniya", SpeakSettings::new("hi"))
        .await
        .unwrap();
    let state = settle(&h.handle, |s| s.error.is_some()).await;
    advance(Duration::from_secs(10)).await;

    assert_eq!(state.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert_eq!(state.phase, PlaybackPhase::Idle);
    assert!(!state.is_loading);
    assert_eq!(h.remote.render_count(), 1);
    assert_eq!(
        h.emitter
            .count(|e| matches!(e, PlaybackEvent::PlaybackError { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn empty_remote_audio_surfaces() {
    let h = harness(None, RemoteScript::Empty, CallLog::default());

    h.handle
        .speak("konnichiwa", SpeakSettings::new("ja"))
        .await
        .unwrap();
    let state = settle(&h.handle, |s| s.error.is_some()).await;

    assert_eq!(state.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert_eq!(h.log.count("clip:play"), 0);
}

// ── Remote playback ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn remote_only_route_highlights_every_word() {
    let h = harness(None, clip(2), CallLog::default());

    h.handle
        .speak("one two three four", SpeakSettings::new("ja"))
        .await
        .unwrap();
    let state = settle(&h.handle, |s| s.phase == PlaybackPhase::Ended).await;
    assert_eq!(state.current_word_index, None);

    let events = h.emitter.events();
    let words: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::WordHighlighted { word_index, .. } => Some(*word_index),
            _ => None,
        })
        .collect();
    assert_eq!(words, vec![0, 1, 2, 3]);
    assert!(!events.iter().any(is_fallback));
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::SpeakingFinished {
            provider: ProviderKind::Remote
        })
    );
    assert_eq!(h.log.count("clip:play"), 1);
    assert_eq!(h.remote.pause_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_speed_requests_slow_remote_audio() {
    let h = harness(None, clip(2), CallLog::default());

    h.handle
        .speak(
            "one two",
            SpeakSettings::new("ja").with_speed(Speed::Slow),
        )
        .await
        .unwrap();
    advance(Duration::from_millis(10)).await;

    assert!(h.log.entries().contains(&"remote:render:ja:true".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn accent_is_forwarded_to_remote() {
    let h = harness(None, clip(1), CallLog::default());

    h.handle
        .speak("good day", SpeakSettings::new("en").with_accent("co.uk"))
        .await
        .unwrap();
    advance(Duration::from_millis(10)).await;

    assert!(h.log.entries().contains(&"remote:render:en:false:co.uk".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn stop_mid_clip_cancels_the_schedule() {
    let h = harness(None, clip(4), CallLog::default());

    h.handle
        .speak("one two three four five six", SpeakSettings::new("ja"))
        .await
        .unwrap();
    settle(&h.handle, |s| s.current_word_index.is_some_and(|i| i >= 1)).await;

    h.handle.stop().await.unwrap();
    h.handle.stop().await.unwrap();
    h.handle.sync().await.unwrap();
    h.emitter.drain();
    advance(Duration::from_secs(10)).await;

    let state = h.handle.state();
    assert_eq!(state.current_word_index, None);
    assert_eq!(state.phase, PlaybackPhase::Idle);
    assert!(!state.is_playing);
    assert!(h.emitter.events().is_empty());
    assert_eq!(h.remote.pause_count(), 1);
    assert_eq!(h.log.count("clip:play"), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_while_loading_abandons_the_clip() {
    let log = CallLog::default();
    let h = harness(
        None,
        RemoteScript::Clip {
            duration: Duration::from_secs(2),
            latency: Duration::from_secs(5),
        },
        log,
    );

    h.handle
        .speak("konnichiwa sekai", SpeakSettings::new("ja"))
        .await
        .unwrap();
    advance(Duration::from_millis(100)).await;
    assert!(h.handle.state().is_loading);

    h.handle.stop().await.unwrap();
    advance(Duration::from_secs(10)).await;

    assert_eq!(h.remote.render_count(), 1);
    assert_eq!(h.log.count("clip:play"), 0);
    assert!(
        !h.emitter
            .events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::SpeakingStarted { .. }))
    );
    assert_eq!(h.handle.state().phase, PlaybackPhase::Idle);
}
