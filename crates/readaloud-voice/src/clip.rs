//! Decoded audio clips played through `rodio`.
//!
//! The payload is decoded fully before playback so its duration is known
//! exactly. Playback runs on a dedicated OS thread because
//! `rodio::OutputStream` is `!Send` on some platforms; the clip only holds
//! a stop channel to that thread.

use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, ensure};
use async_trait::async_trait;
use readaloud_core::{AudioResource, ClipEventSink, RemoteError};
use rodio::{Decoder, OutputStream, Sink, Source};

/// How often the playback thread checks for a stop request or drain.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Interleaved PCM samples.
#[derive(Debug, Clone)]
struct Pcm {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl Pcm {
    #[allow(clippy::cast_precision_loss)]
    fn duration(&self) -> Duration {
        let frames = self.samples.len() / usize::from(self.channels);
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }
}

fn decode(bytes: Vec<u8>) -> anyhow::Result<Pcm> {
    let decoder = Decoder::new(Cursor::new(bytes)).context("unrecognised audio format")?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    ensure!(channels > 0, "audio has no channels");
    ensure!(sample_rate > 0, "audio has no sample rate");

    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
    Ok(Pcm {
        samples,
        channels,
        sample_rate,
    })
}

struct Player {
    stop: mpsc::Sender<()>,
}

/// An encoded clip that decodes on load and plays on its own thread.
pub struct DecodedClip {
    encoded: Vec<u8>,
    pcm: Option<Pcm>,
    player: Option<Player>,
}

impl std::fmt::Debug for DecodedClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedClip")
            .field("bytes", &self.encoded.len())
            .field("decoded", &self.pcm.is_some())
            .field("playing", &self.player.is_some())
            .finish()
    }
}

impl DecodedClip {
    pub const fn new(encoded: Vec<u8>) -> Self {
        Self {
            encoded,
            pcm: None,
            player: None,
        }
    }
}

#[async_trait]
impl AudioResource for DecodedClip {
    fn byte_len(&self) -> usize {
        self.encoded.len()
    }

    async fn loaded_duration(&mut self) -> Result<Duration, RemoteError> {
        if let Some(pcm) = &self.pcm {
            return Ok(pcm.duration());
        }
        let encoded = self.encoded.clone();
        let pcm = tokio::task::spawn_blocking(move || decode(encoded))
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?
            .map_err(|e| RemoteError::Decode(format!("{e:#}")))?;

        let duration = pcm.duration();
        tracing::debug!(
            channels = pcm.channels,
            sample_rate = pcm.sample_rate,
            duration_ms = duration.as_millis(),
            "Decoded speech clip"
        );
        self.pcm = Some(pcm);
        Ok(duration)
    }

    fn play(&mut self, sink: ClipEventSink) -> Result<(), RemoteError> {
        let pcm = self
            .pcm
            .clone()
            .ok_or_else(|| RemoteError::Playback("clip played before loading".into()))?;
        self.pause();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        thread::Builder::new()
            .name("readaloud-clip".into())
            .spawn(move || run_player(&pcm, &stop_rx, &sink))
            .map_err(|e| RemoteError::Playback(format!("failed to spawn audio thread: {e}")))?;

        self.player = Some(Player { stop: stop_tx });
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(player) = self.player.take() {
            // The thread may already have exited after draining.
            let _ = player.stop.send(());
        }
    }
}

impl Drop for DecodedClip {
    fn drop(&mut self) {
        self.pause();
    }
}

/// Body of the playback thread. Owns the output stream for its lifetime.
fn run_player(pcm: &Pcm, stop: &mpsc::Receiver<()>, sink: &ClipEventSink) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            sink.failed(format!("no audio output device: {e}"));
            return;
        }
    };
    let player = match Sink::try_new(&handle) {
        Ok(player) => player,
        Err(e) => {
            sink.failed(format!("failed to open audio output: {e}"));
            return;
        }
    };
    player.append(rodio::buffer::SamplesBuffer::new(
        pcm.channels,
        pcm.sample_rate,
        pcm.samples.clone(),
    ));
    tracing::debug!("Clip playback started");

    loop {
        match stop.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                player.stop();
                tracing::debug!("Clip playback stopped");
                return;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if player.empty() {
            tracing::debug!("Clip playback finished");
            sink.ended();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16-bit mono PCM WAV with `frames` silent frames.
    fn silent_wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let data_len = frames * 2;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.resize(wav.len() + data_len as usize, 0);
        wav
    }

    #[tokio::test]
    async fn duration_comes_from_decoded_samples() {
        let mut clip = DecodedClip::new(silent_wav(8_000, 4_000));
        assert_eq!(clip.byte_len(), 44 + 8_000);
        let duration = clip.loaded_duration().await.unwrap();
        assert_eq!(duration, Duration::from_millis(500));
        // cached
        assert_eq!(clip.loaded_duration().await.unwrap(), duration);
    }

    #[tokio::test]
    async fn garbage_fails_to_decode() {
        let mut clip = DecodedClip::new(b"definitely not audio".to_vec());
        assert!(matches!(
            clip.loaded_duration().await,
            Err(RemoteError::Decode(_))
        ));
    }

    #[test]
    fn play_requires_loading_first() {
        let mut clip = DecodedClip::new(silent_wav(8_000, 10));
        let sink = ClipEventSink::new(readaloud_core::AttemptId::default(), |_, _| {});
        assert!(matches!(clip.play(sink), Err(RemoteError::Playback(_))));
        clip.pause();
    }
}
