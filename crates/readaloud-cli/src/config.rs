//! Engine settings for a CLI invocation.

use std::fs;
use std::path::Path;

use anyhow::Context;
use readaloud_core::EngineSettings;

/// Load engine settings from `path`, or the defaults when no file is given.
///
/// Values missing from the file fall back to the built-in defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::with_defaults());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings = EngineSettings::from_json_str(&json)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loaded engine settings");
    Ok(settings)
}
