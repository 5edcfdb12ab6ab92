//! `readaloud voices`

use readaloud_core::{EngineSettings, OnDeviceSynthesizer, VoiceDescriptor};
use readaloud_voice::{SimulatedSynthesizer, select_voice};

/// One line per installed voice, then the voice each language would use.
pub fn voice_lines(engine: &dyn OnDeviceSynthesizer, settings: &EngineSettings) -> Vec<String> {
    let voices = engine.voices();
    let mut lines: Vec<String> = voices
        .iter()
        .map(|v: &VoiceDescriptor| {
            format!(
                "{:<10} {:<8} {}{}",
                v.id,
                v.language_tag,
                v.name,
                if v.is_default { " (default)" } else { "" }
            )
        })
        .collect();

    lines.push(String::new());
    for (code, capability) in settings.effective_languages().iter() {
        if !capability.on_device.is_supported() {
            continue;
        }
        let choice = select_voice(&voices, &capability.on_device_tag)
            .map_or("no voice, remote only", |v| v.id.as_str());
        lines.push(format!("{code:<6} -> {choice}"));
    }
    lines
}

pub fn execute(settings: &EngineSettings) {
    // The simulated engine is the only bundled on-device provider.
    let engine = SimulatedSynthesizer::default();
    for line in voice_lines(&engine, settings) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_languages_to_voices() {
        let lines = voice_lines(&SimulatedSynthesizer::default(), &EngineSettings::with_defaults());
        assert!(lines.iter().any(|l| l.starts_with("sim-en")));
        assert!(lines.iter().any(|l| l == &format!("{:<6} -> sim-fr", "fr")));
        assert!(
            lines
                .iter()
                .any(|l| l == &format!("{:<6} -> no voice, remote only", "hi"))
        );
    }
}
