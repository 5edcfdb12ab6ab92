//! HTTP client for the remote speech service.
//!
//! The service exposes `GET /tts?text=..&lang=..&slow=..[&tld=..]` and
//! answers with an encoded audio clip (MP3 or WAV). `tld` picks the accent.

use async_trait::async_trait;
use readaloud_core::{AudioResource, RemoteError, RemoteSynthesizer};

use crate::clip::DecodedClip;

/// Default base URL of the remote speech service.
pub const DEFAULT_TTS_URL: &str = "http://localhost:8000";

/// [`RemoteSynthesizer`] backed by the `/tts` HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpRemoteSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteSynthesizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/tts", self.base_url.trim_end_matches('/'))
    }

    fn request(
        &self,
        text: &str,
        language: &str,
        slow: bool,
        accent: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let slow = if slow { "true" } else { "false" };
        let mut query = vec![("text", text), ("lang", language), ("slow", slow)];
        if let Some(accent) = accent {
            query.push(("tld", accent));
        }
        self.client.get(self.endpoint()).query(&query)
    }
}

impl Default for HttpRemoteSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_TTS_URL)
    }
}

#[async_trait]
impl RemoteSynthesizer for HttpRemoteSynthesizer {
    async fn render_audio(
        &self,
        text: &str,
        language: &str,
        slow: bool,
        accent: Option<&str>,
    ) -> Result<Box<dyn AudioResource>, RemoteError> {
        tracing::debug!(
            url = %self.endpoint(),
            language = %language,
            slow,
            accent,
            chars = text.chars().count(),
            "Requesting speech"
        );

        let response = self
            .request(text, language, slow, accent)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Err(RemoteError::EmptyPayload);
        }

        tracing::debug!(bytes = bytes.len(), "Received speech clip");
        Ok(Box::new(DecodedClip::new(bytes.to_vec())))
    }
}
