//! `readaloud speak`
//!
//! Builds an engine for this one request, then follows its state and events
//! until playback finishes, fails or the user presses Ctrl-C.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;

use anyhow::{Context, bail};
use readaloud_core::{
    EngineSettings, PlaybackEvent, PlaybackEventEmitter, SpeakSettings, UtteranceRequest,
};
use readaloud_voice::{HttpRemoteSynthesizer, PlaybackController, SimulatedSynthesizer};
use tokio::sync::mpsc;

use crate::commands::SpeakArgs;
use crate::render::TerminalRenderer;

/// Forwards engine events to the command loop.
#[derive(Clone)]
struct ChannelEmitter {
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackEventEmitter for ChannelEmitter {
    fn emit(&self, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn PlaybackEventEmitter> {
        Box::new(self.clone())
    }
}

/// How a speak command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Finished,
    Interrupted,
    Failed(String),
}

/// Final outcome once `event` arrives, if it ends the utterance.
fn outcome_of(event: &PlaybackEvent) -> Option<Outcome> {
    match event {
        PlaybackEvent::SpeakingFinished { .. } => Some(Outcome::Finished),
        PlaybackEvent::SpeakingStopped => Some(Outcome::Interrupted),
        PlaybackEvent::PlaybackError { message } => Some(Outcome::Failed(message.clone())),
        _ => None,
    }
}

fn read_text(args: &SpeakArgs) -> anyhow::Result<String> {
    if let Some(path) = &args.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    match args.text.as_deref() {
        Some(text) if text != "-" => Ok(text.to_owned()),
        _ => {
            if io::stdin().is_terminal() {
                bail!("no text given; pass it as an argument, with --file, or on stdin");
            }
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

pub async fn execute(settings: &EngineSettings, args: SpeakArgs) -> anyhow::Result<()> {
    let text = read_text(&args)?;
    let mut speak = SpeakSettings::new(args.lang.clone())
        .with_speed(args.speed)
        .with_isolation(args.isolation);
    if let Some(accent) = &args.accent {
        speak = speak.with_accent(accent.as_str());
    }
    let request = UtteranceRequest::new(text, speak);

    let (tx, mut events) = mpsc::unbounded_channel();
    let mut controller = PlaybackController::new(settings.clone())
        .context("invalid engine settings")?
        .with_emitter(Arc::new(ChannelEmitter { tx }));
    if args.simulate {
        controller = controller.with_on_device(Arc::new(SimulatedSynthesizer::default()));
    }
    if !args.offline {
        controller = controller.with_remote(Arc::new(HttpRemoteSynthesizer::new(&args.tts_url)));
    }
    let handle = controller.spawn();

    tracing::debug!(
        language = %request.settings.language,
        speed = %request.settings.speed,
        accent = request.settings.remote_accent(),
        simulate = args.simulate,
        offline = args.offline,
        "Starting speak command"
    );
    handle.speak_request(request).await?;

    let mut renderer = (!args.json).then(TerminalRenderer::stdout);
    let mut state = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                handle.stop().await?;
                break Outcome::Interrupted;
            }
            Some(event) = events.recv() => {
                if args.json {
                    println!("{}", serde_json::to_string(&event)?);
                }
                if let Some(outcome) = outcome_of(&event) {
                    break outcome;
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break Outcome::Failed("playback engine stopped".into());
                }
                if let Some(renderer) = renderer.as_mut() {
                    let snapshot = state.borrow_and_update().clone();
                    renderer.draw(&snapshot)?;
                }
            }
        }
    };

    if let Some(renderer) = renderer.as_mut() {
        renderer.finish()?;
    }
    handle.shutdown().await;

    match outcome {
        Outcome::Finished | Outcome::Interrupted => Ok(()),
        Outcome::Failed(message) => bail!(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readaloud_core::ProviderKind;

    #[test]
    fn terminal_events_end_the_loop() {
        assert_eq!(
            outcome_of(&PlaybackEvent::SpeakingFinished {
                provider: ProviderKind::Remote
            }),
            Some(Outcome::Finished)
        );
        assert_eq!(
            outcome_of(&PlaybackEvent::playback_error("nope")),
            Some(Outcome::Failed("nope".into()))
        );
        assert_eq!(
            outcome_of(&PlaybackEvent::WordHighlighted {
                word_index: 1,
                char_index: 4
            }),
            None
        );
    }

    #[test]
    fn explicit_text_wins_over_stdin() {
        use clap::Parser;
        let cli = crate::Cli::parse_from(["readaloud", "speak", "hello there"]);
        let Some(crate::Commands::Speak(args)) = cli.command else {
            panic!("expected speak");
        };
        assert_eq!(read_text(&args).unwrap(), "hello there");
    }

    #[tokio::test]
    async fn invalid_engine_settings_are_rejected() {
        let settings = EngineSettings {
            max_plausible_chars_per_second: Some(0.0),
            ..Default::default()
        };
        let args = SpeakArgs {
            text: Some("hello".into()),
            file: None,
            lang: "en".into(),
            speed: readaloud_core::Speed::Normal,
            accent: None,
            isolation: readaloud_core::IsolationMode::None,
            simulate: true,
            offline: true,
            tts_url: String::new(),
            json: true,
        };
        let err = execute(&settings, args).await.unwrap_err();
        assert!(format!("{err:#}").contains("max_plausible_chars_per_second"));
    }

    #[test]
    fn text_file_is_read() {
        use clap::Parser;
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "From a file.").unwrap();

        let cli = crate::Cli::parse_from([
            "readaloud",
            "speak",
            "--file",
            file.path().to_str().unwrap(),
        ]);
        let Some(crate::Commands::Speak(args)) = cli.command else {
            panic!("expected speak");
        };
        assert_eq!(read_text(&args).unwrap(), "From a file.");
    }
}
