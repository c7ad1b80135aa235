//! File extension to language tag mapping used for highlighting.

use std::collections::BTreeMap;

const BUILTIN: &[(&str, &str)] = &[("js", "javascript"), ("ex", "elixir"), ("py", "python")];

/// Extension lookup table. Extensions are stored without the leading dot and lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageMap {
    entries: BTreeMap<String, String>,
}

impl Default for LanguageMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageMap {
    /// An empty map; every lookup yields `None`.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut map = Self::empty();
        for (extension, language) in BUILTIN {
            map.insert(extension, language);
        }
        map
    }

    /// Built-in entries with `overrides` layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut map = Self::builtin();
        for (extension, language) in overrides {
            map.insert(extension, language);
        }
        map
    }

    pub fn insert(&mut self, extension: &str, language: &str) {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.entries.insert(key, language.to_owned());
    }

    /// Language tag for `path`, or `None` for unknown extensions.
    pub fn language_for(&self, path: &str) -> Option<&str> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, extension) = file_name.rsplit_once('.')?;
        self.entries
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }
}
