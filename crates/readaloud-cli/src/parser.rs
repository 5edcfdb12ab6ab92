//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Read text aloud with synchronized word highlighting.
#[derive(Parser)]
#[command(name = "readaloud")]
#[command(about = "Read text aloud with synchronized word highlighting")]
#[command(version)]
pub struct Cli {
    /// Engine settings file (JSON)
    #[arg(long = "config", global = true, env = "READALOUD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use readaloud_core::{IsolationMode, Speed};

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "readaloud",
            "--verbose",
            "--config",
            "/tmp/readaloud.json",
            "languages",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/readaloud.json")));
        assert!(matches!(cli.command, Some(Commands::Languages { json: false })));
    }

    #[test]
    fn test_speak_args() {
        let cli = Cli::parse_from([
            "readaloud",
            "speak",
            "--lang",
            "hi",
            "--speed",
            "slow",
            "--isolation",
            "sentence",
            "--accent",
            "co.in",
            "--simulate",
            "--tts-url",
            "http://tts.local:9000",
            "Namaste duniya",
        ]);
        let Some(Commands::Speak(args)) = cli.command else {
            panic!("expected speak");
        };
        assert_eq!(args.text.as_deref(), Some("Namaste duniya"));
        assert_eq!(args.lang, "hi");
        assert_eq!(args.speed, Speed::Slow);
        assert_eq!(args.isolation, IsolationMode::Sentence);
        assert_eq!(args.accent.as_deref(), Some("co.in"));
        assert!(args.simulate);
        assert!(!args.offline);
        assert_eq!(args.tts_url, "http://tts.local:9000");
    }

    #[test]
    fn test_speak_defaults_and_numeric_speed() {
        let cli = Cli::parse_from(["readaloud", "speak", "--speed", "1.2", "hello"]);
        let Some(Commands::Speak(args)) = cli.command else {
            panic!("expected speak");
        };
        assert_eq!(args.lang, "en");
        assert_eq!(args.speed, Speed::Rate(1.2));
        assert_eq!(args.isolation, IsolationMode::None);
    }

    #[test]
    fn test_invalid_speed_is_rejected() {
        assert!(Cli::try_parse_from(["readaloud", "speak", "--speed", "warp", "hi"]).is_err());
        assert!(Cli::try_parse_from(["readaloud", "speak", "--isolation", "word", "hi"]).is_err());
    }
}
