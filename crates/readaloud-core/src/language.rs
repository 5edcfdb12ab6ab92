//! Language capability table.
//!
//! One table answers every "can provider X speak language Y" question, keyed
//! by the primary language subtag (`"en"` for `"en-GB"`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How well the on-device provider handles a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnDeviceSupport {
    /// Voices are expected to exist and to report word boundaries.
    Reliable,
    /// Voices may be missing or silently fail; supervise with a timeout.
    Unreliable,
    Unsupported,
}

impl OnDeviceSupport {
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Per-language entry of the [`LanguageTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageCapability {
    /// Human readable name, for listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub on_device: OnDeviceSupport,
    /// BCP-47 tag handed to the on-device provider (e.g. `"hi-IN"`).
    pub on_device_tag: String,
    /// Code sent to the remote service, `None` when it cannot speak it.
    #[serde(default)]
    pub remote_code: Option<String>,
}

impl LanguageCapability {
    fn builtin(name: &str, support: OnDeviceSupport, tag: &str, remote: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            on_device: support,
            on_device_tag: tag.to_owned(),
            remote_code: Some(remote.to_owned()),
        }
    }
}

/// Capability table keyed by primary language subtag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTable {
    entries: BTreeMap<String, LanguageCapability>,
}

impl Default for LanguageTable {
    fn default() -> Self {
        use OnDeviceSupport::{Reliable, Unreliable};

        let builtin = [
            ("en", LanguageCapability::builtin("English", Reliable, "en-US", "en")),
            ("es", LanguageCapability::builtin("Spanish", Reliable, "es-ES", "es")),
            ("fr", LanguageCapability::builtin("French", Reliable, "fr-FR", "fr")),
            ("de", LanguageCapability::builtin("German", Reliable, "de-DE", "de")),
            ("it", LanguageCapability::builtin("Italian", Reliable, "it-IT", "it")),
            ("pt", LanguageCapability::builtin("Portuguese", Reliable, "pt-BR", "pt")),
            ("hi", LanguageCapability::builtin("Hindi", Unreliable, "hi-IN", "hi")),
            // The remote service has no Nepali voice; Hindi shares the script.
            ("ne", LanguageCapability::builtin("Nepali", Unreliable, "ne-NP", "hi")),
            ("ja", LanguageCapability::builtin("Japanese", Unreliable, "ja-JP", "ja")),
            ("ko", LanguageCapability::builtin("Korean", Unreliable, "ko-KR", "ko")),
            ("zh", LanguageCapability::builtin("Chinese", Unreliable, "zh-CN", "zh")),
            ("ar", LanguageCapability::builtin("Arabic", Unreliable, "ar-SA", "ar")),
            ("ru", LanguageCapability::builtin("Russian", Unreliable, "ru-RU", "ru")),
        ];

        Self {
            entries: builtin
                .into_iter()
                .map(|(code, cap)| (code.to_owned(), cap))
                .collect(),
        }
    }
}

impl LanguageTable {
    /// An empty table: every language is unsupported.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Look up a language by code or full tag (`"pt-BR"` → `"pt"`).
    pub fn lookup(&self, language: &str) -> Option<&LanguageCapability> {
        self.entries.get(&primary_subtag(language))
    }

    pub fn insert(&mut self, code: &str, capability: LanguageCapability) {
        self.entries.insert(primary_subtag(code), capability);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LanguageCapability)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A regional accent the remote service can render, selected by the
/// top-level domain it is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemoteAccent {
    pub tld: &'static str,
    pub name: &'static str,
    /// Primary subtag of the language the accent applies to.
    pub language: &'static str,
}

impl RemoteAccent {
    const fn english(tld: &'static str, name: &'static str) -> Self {
        Self {
            tld,
            name,
            language: "en",
        }
    }
}

/// Accents offered by the remote service. `"com"` is its default.
pub const REMOTE_ACCENTS: &[RemoteAccent] = &[
    RemoteAccent::english("com", "US English"),
    RemoteAccent::english("co.uk", "British English"),
    RemoteAccent::english("ca", "Canadian English"),
    RemoteAccent::english("co.in", "Indian English"),
    RemoteAccent::english("com.au", "Australian English"),
    RemoteAccent::english("co.za", "South African English"),
];

/// Accents listed for `language` (code or full tag).
pub fn accents_for(language: &str) -> impl Iterator<Item = &'static RemoteAccent> {
    let primary = primary_subtag(language);
    REMOTE_ACCENTS.iter().filter(move |a| a.language == primary)
}

/// Lowercased primary subtag of a BCP-47 tag; accepts `_` as separator.
pub fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
