//! `readaloud languages`

use readaloud_core::{EngineSettings, LanguageCapability, OnDeviceSupport, REMOTE_ACCENTS};

const fn support_label(support: OnDeviceSupport) -> &'static str {
    match support {
        OnDeviceSupport::Reliable => "reliable",
        OnDeviceSupport::Unreliable => "unreliable",
        OnDeviceSupport::Unsupported => "-",
    }
}

fn row(code: &str, capability: &LanguageCapability) -> String {
    format!(
        "{:<6} {:<12} {:<11} {:<8} {}",
        code,
        capability.name.as_deref().unwrap_or("-"),
        support_label(capability.on_device),
        capability.on_device_tag,
        capability.remote_code.as_deref().unwrap_or("-"),
    )
}

/// Render the capability table as aligned text lines.
pub fn table_lines(settings: &EngineSettings) -> Vec<String> {
    let table = settings.effective_languages();
    let mut lines = vec![format!(
        "{:<6} {:<12} {:<11} {:<8} {}",
        "CODE", "NAME", "ON-DEVICE", "TAG", "REMOTE"
    )];
    lines.extend(table.iter().map(|(code, capability)| row(code, capability)));
    lines
}

/// Remote accents, one per line.
pub fn accent_lines() -> Vec<String> {
    let mut lines = vec![format!("{:<8} {:<6} {}", "ACCENT", "LANG", "NAME")];
    lines.extend(
        REMOTE_ACCENTS
            .iter()
            .map(|a| format!("{:<8} {:<6} {}", a.tld, a.language, a.name)),
    );
    lines
}

pub fn execute(settings: &EngineSettings, json: bool) -> anyhow::Result<()> {
    if json {
        let listing = serde_json::json!({
            "languages": settings.effective_languages(),
            "accents": REMOTE_ACCENTS,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for line in table_lines(settings) {
            println!("{line}");
        }
        println!();
        for line in accent_lines() {
            println!("{line}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_language_with_remote_mapping() {
        let settings = EngineSettings::with_defaults();
        let lines = table_lines(&settings);
        assert_eq!(lines.len(), settings.effective_languages().len() + 1);

        let nepali = lines.iter().find(|l| l.starts_with("ne ")).unwrap();
        assert!(nepali.contains("unreliable"));
        assert!(nepali.contains("ne-NP"));
        assert!(nepali.trim_end().ends_with("hi"));
    }

    #[test]
    fn lists_remote_accents() {
        let lines = accent_lines();
        assert_eq!(lines.len(), REMOTE_ACCENTS.len() + 1);
        let british = lines.iter().find(|l| l.starts_with("co.uk ")).unwrap();
        assert!(british.contains("British English"));
    }
}
