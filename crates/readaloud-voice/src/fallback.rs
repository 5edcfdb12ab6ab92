//! Provider selection and fallback.
//!
//! Each `speak()` walks a small state machine:
//!
//! ```text
//! Idle ─► TryingPrimary ─► PlayingPrimary ─► Ended
//!   │          │                 │
//!   │          ▼                 ▼
//!   └────► TryingSecondary ─► PlayingSecondary ─► Ended
//! ```
//!
//! The primary is the on-device engine, the secondary the remote service.
//! The secondary is tried at most once per request.

use readaloud_core::{LanguageTable, OnDeviceSupport, PlaybackPhase};

use crate::error::SpeechError;

/// Which providers a request will use, decided before anything starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Try on-device first; fall back to `remote` if it is set.
    PrimaryFirst {
        native_tag: String,
        unreliable: bool,
        remote: Option<String>,
    },
    /// The language is only available remotely.
    SecondaryOnly { remote: String },
}

impl Route {
    pub fn remote_language(&self) -> Option<&str> {
        match self {
            Self::PrimaryFirst { remote, .. } => remote.as_deref(),
            Self::SecondaryOnly { remote } => Some(remote),
        }
    }

    pub const fn is_unreliable(&self) -> bool {
        matches!(
            self,
            Self::PrimaryFirst {
                unreliable: true,
                ..
            }
        )
    }
}

/// Choose providers for `language` from the capability table.
///
/// `on_device_available`/`remote_available` say whether the engine was
/// built with each provider at all.
pub fn plan_route(
    table: &LanguageTable,
    language: &str,
    on_device_available: bool,
    remote_available: bool,
) -> Result<Route, SpeechError> {
    let unsupported = || SpeechError::UnsupportedLanguage(language.to_owned());
    let capability = table.lookup(language).ok_or_else(unsupported)?;

    let remote = capability
        .remote_code
        .clone()
        .filter(|_| remote_available);

    match capability.on_device {
        support @ (OnDeviceSupport::Reliable | OnDeviceSupport::Unreliable)
            if on_device_available =>
        {
            // Keep a region the caller asked for ("pt-PT" stays "pt-PT").
            let native_tag = if language.contains(['-', '_']) {
                language.replace('_', "-")
            } else {
                capability.on_device_tag.clone()
            };
            Ok(Route::PrimaryFirst {
                native_tag,
                unreliable: support == OnDeviceSupport::Unreliable,
                remote,
            })
        }
        _ => remote
            .map(|remote| Route::SecondaryOnly { remote })
            .ok_or_else(unsupported),
    }
}

/// Outcome of a provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Not a failure (cancellation side effect).
    Ignore,
    /// Start the remote provider in this language.
    TrySecondary { remote_language: String },
    /// Give up and show the error.
    Surface(SpeechError),
}

/// Per-request fallback state machine.
#[derive(Debug, Clone)]
pub struct FallbackController {
    route: Route,
    phase: PlaybackPhase,
    fell_back: bool,
}

impl FallbackController {
    pub const fn new(route: Route) -> Self {
        Self {
            route,
            phase: PlaybackPhase::Idle,
            fell_back: false,
        }
    }

    pub const fn route(&self) -> &Route {
        &self.route
    }

    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub const fn fell_back(&self) -> bool {
        self.fell_back
    }

    /// Leave `Idle` for the first provider of the route.
    pub fn begin(&mut self) -> PlaybackPhase {
        self.phase = match self.route {
            Route::PrimaryFirst { .. } => PlaybackPhase::TryingPrimary,
            Route::SecondaryOnly { .. } => PlaybackPhase::TryingSecondary,
        };
        self.phase
    }

    /// The active provider started speaking.
    pub fn on_started(&mut self) -> PlaybackPhase {
        self.phase = match self.phase {
            PlaybackPhase::TryingPrimary => PlaybackPhase::PlayingPrimary,
            PlaybackPhase::TryingSecondary => PlaybackPhase::PlayingSecondary,
            other => other,
        };
        self.phase
    }

    /// Decide what a primary-provider failure leads to.
    pub fn on_primary_failure(&mut self, error: SpeechError) -> FallbackDecision {
        if error == SpeechError::SynthesisInterrupted {
            return FallbackDecision::Ignore;
        }

        let unreliable = self.route.is_unreliable();
        let eligible = match (self.phase, &error) {
            (
                PlaybackPhase::TryingPrimary,
                SpeechError::NoVoiceAvailable(_)
                | SpeechError::SynthesisTimeout(_)
                | SpeechError::PrematureEnd { .. },
            )
            | (PlaybackPhase::PlayingPrimary, SpeechError::PrematureEnd { .. }) => true,
            (PlaybackPhase::TryingPrimary, SpeechError::SynthesisError(_)) => unreliable,
            _ => false,
        };

        match self.route.remote_language() {
            Some(remote) if eligible && !self.fell_back => {
                let remote_language = remote.to_owned();
                self.fell_back = true;
                self.phase = PlaybackPhase::TryingSecondary;
                FallbackDecision::TrySecondary { remote_language }
            }
            _ => {
                self.phase = PlaybackPhase::Idle;
                FallbackDecision::Surface(error)
            }
        }
    }

    /// Playback completed normally.
    pub fn finish(&mut self) {
        self.phase = PlaybackPhase::Ended;
    }

    /// Back to `Idle` (stop or surfaced error).
    pub fn reset(&mut self) {
        self.phase = PlaybackPhase::Idle;
    }
}
