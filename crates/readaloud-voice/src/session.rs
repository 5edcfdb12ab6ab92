//! The single owned playback session.
//!
//! Everything one `speak()` call holds lives here: the attempt id, the stop
//! token, the fallback state and the provider resource. Releasing the
//! session releases the resource exactly once.

use std::sync::Arc;

use readaloud_core::{AttemptId, ProviderKind, TextStructure, UtteranceRequest};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::fallback::FallbackController;
use crate::native::NativeAttempt;
use crate::remote::RemotePlayback;
use crate::throttle::HighlightThrottle;

/// The provider resource currently owned by a session.
#[derive(Debug)]
pub enum ActiveProvider {
    Native(NativeAttempt),
    /// Remote clip being fetched and loaded.
    RemoteLoading(JoinHandle<()>),
    Remote(RemotePlayback),
}

impl ActiveProvider {
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Native(_) => ProviderKind::OnDevice,
            Self::RemoteLoading(_) | Self::Remote(_) => ProviderKind::Remote,
        }
    }

    fn release(self) {
        match self {
            Self::Native(mut attempt) => attempt.release(),
            Self::RemoteLoading(fetch) => fetch.abort(),
            Self::Remote(mut playback) => playback.release(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub attempt: AttemptId,
    pub request: UtteranceRequest,
    pub structure: Arc<TextStructure>,
    pub token: CancellationToken,
    pub fallback: FallbackController,
    pub provider: Option<ActiveProvider>,
    pub throttle: HighlightThrottle,
}

impl Session {
    pub fn new(
        attempt: AttemptId,
        request: UtteranceRequest,
        structure: Arc<TextStructure>,
        fallback: FallbackController,
        throttle: HighlightThrottle,
    ) -> Self {
        Self {
            attempt,
            request,
            structure,
            token: CancellationToken::new(),
            fallback,
            provider: None,
            throttle,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Whether an event from `attempt` may still touch this session.
    pub fn accepts(&self, attempt: AttemptId) -> bool {
        self.is_live() && attempt == self.attempt
    }

    pub fn provider_kind(&self) -> Option<ProviderKind> {
        self.provider.as_ref().map(ActiveProvider::kind)
    }

    /// Swap in a new provider, releasing the previous one.
    pub fn replace_provider(&mut self, provider: ActiveProvider) {
        self.release_provider();
        self.provider = Some(provider);
    }

    pub fn release_provider(&mut self) {
        if let Some(provider) = self.provider.take() {
            tracing::debug!(attempt = %self.attempt, provider = %provider.kind(), "Releasing provider");
            provider.release();
        }
    }

    /// Cancel the session token and release the provider. Idempotent.
    pub fn release(&mut self) {
        self.token.cancel();
        self.release_provider();
        self.throttle.reset();
    }

    /// Earliest timer any part of the session needs.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let provider = match &self.provider {
            Some(ActiveProvider::Native(attempt)) => attempt.startup_deadline(),
            Some(ActiveProvider::Remote(playback)) => playback.next_tick(),
            Some(ActiveProvider::RemoteLoading(_)) | None => None,
        };
        [provider, self.throttle.flush_at()]
            .into_iter()
            .flatten()
            .min()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}
