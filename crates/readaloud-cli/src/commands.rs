//! Available commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use readaloud_core::{IsolationMode, Speed};
use readaloud_voice::DEFAULT_TTS_URL;

#[derive(Subcommand)]
pub enum Commands {
    /// Speak text and highlight each word as it is spoken
    Speak(SpeakArgs),

    /// List on-device voices and which one each language would use
    Voices,

    /// Show the language capability table
    Languages {
        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct SpeakArgs {
    /// Text to speak; reads stdin when omitted or "-"
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Language code (e.g. "en", "hi", "pt-BR")
    #[arg(short, long, default_value = "en")]
    pub lang: String,

    /// Speed: slow, normal, fast or a rate such as 1.2
    #[arg(short, long, default_value = "normal")]
    pub speed: Speed,

    /// Remote accent by service domain (e.g. "co.uk", "co.in"); see `languages`
    #[arg(short, long)]
    pub accent: Option<String>,

    /// Dim everything outside the current paragraph or sentence
    #[arg(short, long, default_value = "none")]
    pub isolation: IsolationMode,

    /// Use the simulated on-device engine (no audio)
    #[arg(long)]
    pub simulate: bool,

    /// Never contact the remote speech service
    #[arg(long)]
    pub offline: bool,

    /// Base URL of the remote speech service
    #[arg(long, env = "READALOUD_TTS_URL", default_value = DEFAULT_TTS_URL)]
    pub tts_url: String,

    /// Print playback events as JSON lines instead of rendering the text
    #[arg(long)]
    pub json: bool,
}
