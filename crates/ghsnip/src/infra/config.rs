//! Settings management: built-in defaults, the user settings file, and env overrides.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};

static DEFAULT_SETTINGS: &str = include_str!("../../assets/default-settings.toml");
const SETTINGS_FILE: &str = "ghsnip/settings.toml";

/// Keys accepted by [`Settings::get`] and [`Settings::set`], besides `languages.<ext>`.
pub const SETTING_KEYS: &[&str] = &[
    "access_token",
    "default_owner",
    "default_repo",
    "max_lines_shown",
    "host",
    "api_url",
    "branch",
    "theme",
    "strict_references",
];

/// Flat settings record shared read-only by every render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Bearer token for the content API. Empty means anonymous requests.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub default_owner: String,
    #[serde(default)]
    pub default_repo: String,
    /// Lines shown when a reference has no explicit end line.
    #[serde(default = "Settings::default_max_lines_shown")]
    pub max_lines_shown: usize,
    /// Web host used for links to the original file.
    #[serde(default = "Settings::default_host")]
    pub host: String,
    #[serde(default = "Settings::default_api_url")]
    pub api_url: String,
    #[serde(default = "Settings::default_branch")]
    pub branch: String,
    #[serde(default = "Settings::default_theme")]
    pub theme: String,
    /// Reject malformed `#L` suffixes and inverted ranges instead of guessing.
    #[serde(default)]
    pub strict_references: bool,
    /// Extra `extension = "language"` entries for highlighting.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
}

impl Settings {
    fn default_max_lines_shown() -> usize {
        20
    }

    fn default_host() -> String {
        "github.com".into()
    }

    fn default_api_url() -> String {
        "https://api.github.com".into()
    }

    fn default_branch() -> String {
        "main".into()
    }

    fn default_theme() -> String {
        "InspiredGitHub".into()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            default_owner: String::new(),
            default_repo: String::new(),
            max_lines_shown: Self::default_max_lines_shown(),
            host: Self::default_host(),
            api_url: Self::default_api_url(),
            branch: Self::default_branch(),
            theme: Self::default_theme(),
            strict_references: false,
            languages: BTreeMap::new(),
        }
    }
}

/// One settings file. Absent keys leave the lower layer untouched.
#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsLayer {
    access_token: Option<String>,
    default_owner: Option<String>,
    default_repo: Option<String>,
    max_lines_shown: Option<usize>,
    host: Option<String>,
    api_url: Option<String>,
    branch: Option<String>,
    theme: Option<String>,
    strict_references: Option<bool>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
}

impl SettingsLayer {
    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        toml::from_str(&data)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))
    }
}

/// Environment overrides for the credential and default repository.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    access_token: Option<String>,
    default_owner: Option<String>,
    default_repo: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            access_token: env::var("GHSNIP_TOKEN")
                .or_else(|_| env::var("GITHUB_TOKEN"))
                .ok(),
            default_owner: env::var("GHSNIP_OWNER").ok(),
            default_repo: env::var("GHSNIP_REPO").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(token: &str, owner: &str) -> Self {
        Self {
            access_token: Some(token.to_owned()),
            default_owner: Some(owner.to_owned()),
            default_repo: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the per-user settings file when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(settings_path);
        Self::load_with_layers(path, EnvOverrides::from_env())
    }

    /// Defaults plus the file at `path`, ignoring the environment. Used before saving so env
    /// overrides never end up on disk.
    pub fn load_file(path: &Path) -> Result<Self> {
        Self::load_with_layers(Some(path.to_path_buf()), EnvOverrides::default())
    }

    fn load_with_layers(file: Option<PathBuf>, env_overrides: EnvOverrides) -> Result<Self> {
        let mut settings = Self::from_str(DEFAULT_SETTINGS)?;

        if let Some(path) = file.filter(|path| path.exists()) {
            tracing::debug!(path = %path.display(), "loading settings file");
            settings = settings.merge(SettingsLayer::from_file(&path)?);
        }

        let settings = apply_env_overrides(settings, env_overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn from_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse built-in settings")
    }

    fn merge(mut self, layer: SettingsLayer) -> Self {
        if let Some(value) = layer.access_token {
            self.access_token = value;
        }
        if let Some(value) = layer.default_owner {
            self.default_owner = value;
        }
        if let Some(value) = layer.default_repo {
            self.default_repo = value;
        }
        if let Some(value) = layer.max_lines_shown {
            self.max_lines_shown = value;
        }
        if let Some(value) = layer.host {
            self.host = value;
        }
        if let Some(value) = layer.api_url {
            self.api_url = value;
        }
        if let Some(value) = layer.branch {
            self.branch = value;
        }
        if let Some(value) = layer.theme {
            self.theme = value;
        }
        if let Some(value) = layer.strict_references {
            self.strict_references = value;
        }
        self.languages.extend(layer.languages);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_lines_shown == 0 {
            bail!("max_lines_shown must be at least 1");
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!("api_url must be an http(s) URL, got '{}'", self.api_url);
        }
        Ok(())
    }

    /// Persist settings as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create settings directory {}", parent.display())
            })?;
        }
        let data = toml::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, data)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Read one setting as text.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "access_token" => self.access_token.clone(),
            "default_owner" => self.default_owner.clone(),
            "default_repo" => self.default_repo.clone(),
            "max_lines_shown" => self.max_lines_shown.to_string(),
            "host" => self.host.clone(),
            "api_url" => self.api_url.clone(),
            "branch" => self.branch.clone(),
            "theme" => self.theme.clone(),
            "strict_references" => self.strict_references.to_string(),
            other => match other.strip_prefix("languages.") {
                Some(extension) => self
                    .languages
                    .get(extension)
                    .cloned()
                    .ok_or_else(|| anyhow!("no language configured for '.{extension}'"))?,
                None => return Err(unknown_setting(other)),
            },
        };
        Ok(value)
    }

    /// Update one setting from text. An empty value removes a `languages.<ext>` entry.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "access_token" => self.access_token = value.to_owned(),
            "default_owner" => self.default_owner = value.to_owned(),
            "default_repo" => self.default_repo = value.to_owned(),
            "max_lines_shown" => {
                let lines: usize = value
                    .trim()
                    .parse()
                    .with_context(|| format!("max_lines_shown must be a number, got '{value}'"))?;
                if lines == 0 {
                    bail!("max_lines_shown must be at least 1");
                }
                self.max_lines_shown = lines;
            }
            "host" => self.host = value.trim().trim_end_matches('/').to_owned(),
            "api_url" => {
                let url = value.trim().trim_end_matches('/').to_owned();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    bail!("api_url must be an http(s) URL, got '{value}'");
                }
                self.api_url = url;
            }
            "branch" => self.branch = value.to_owned(),
            "theme" => self.theme = value.to_owned(),
            "strict_references" => {
                self.strict_references = value
                    .trim()
                    .parse()
                    .with_context(|| format!("strict_references must be true or false, got '{value}'"))?;
            }
            other => match other.strip_prefix("languages.") {
                Some(extension) if !extension.is_empty() => {
                    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
                    if value.is_empty() {
                        self.languages.remove(&extension);
                    } else {
                        self.languages.insert(extension, value.to_owned());
                    }
                }
                _ => return Err(unknown_setting(other)),
            },
        }
        Ok(())
    }

    /// Copy with the access token masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.access_token.is_empty() {
            copy.access_token = "********".into();
        }
        copy
    }
}

fn unknown_setting(key: &str) -> anyhow::Error {
    anyhow!(
        "unknown setting '{key}', expected one of: {}, languages.<ext>",
        SETTING_KEYS.join(", ")
    )
}

/// Default location of the per-user settings file.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join(SETTINGS_FILE))
}

fn apply_env_overrides(mut settings: Settings, env: EnvOverrides) -> Settings {
    if let Some(token) = env.access_token {
        settings.access_token = token;
    }
    if let Some(owner) = env.default_owner {
        settings.default_owner = owner;
    }
    if let Some(repo) = env.default_repo {
        settings.default_repo = repo;
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_default_impl() -> Result<()> {
        assert_eq!(Settings::from_str(DEFAULT_SETTINGS)?, Settings::default());
        Ok(())
    }

    #[test]
    fn load_uses_defaults_when_no_file() -> Result<()> {
        let settings = Settings::load_with_layers(None, EnvOverrides::default())?;
        assert_eq!(settings.max_lines_shown, 20);
        assert_eq!(settings.host, "github.com");
        assert!(settings.access_token.is_empty());
        Ok(())
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("settings.toml");
        fs::write(
            &file,
            r#"
default_owner = "octo"
max_lines_shown = 5

[languages]
rs = "rust"
"#,
        )?;

        let settings = Settings::load_with_layers(Some(file), EnvOverrides::default())?;
        assert_eq!(settings.default_owner, "octo");
        assert_eq!(settings.default_repo, "");
        assert_eq!(settings.max_lines_shown, 5);
        assert_eq!(settings.branch, "main");
        assert_eq!(settings.languages.get("rs").map(String::as_str), Some("rust"));
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("settings.toml");
        fs::write(&file, "access_token = \"from-file\"\ndefault_owner = \"file\"\n")?;

        let settings =
            Settings::load_with_layers(Some(file), EnvOverrides::for_tests("from-env", "env"))?;
        assert_eq!(settings.access_token, "from-env");
        assert_eq!(settings.default_owner, "env");
        Ok(())
    }

    #[test]
    fn zero_window_is_rejected() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("settings.toml");
        fs::write(&file, "max_lines_shown = 0\n")?;
        assert!(Settings::load_with_layers(Some(file), EnvOverrides::default()).is_err());
        Ok(())
    }

    #[test]
    fn invalid_file_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        assert!(Settings::load_with_layers(Some(file), EnvOverrides::default()).is_err());
        Ok(())
    }

    #[test]
    fn save_then_load_keeps_values() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("nested/dir/settings.toml");

        let mut settings = Settings::default();
        settings.set("default_repo", "demo")?;
        settings.set("max_lines_shown", "7")?;
        settings.set("languages.rs", "rust")?;
        settings.save(&file)?;

        let loaded = Settings::load_with_layers(Some(file), EnvOverrides::default())?;
        assert_eq!(loaded, settings);
        Ok(())
    }

    #[test]
    fn set_validates_values() {
        let mut settings = Settings::default();
        assert!(settings.set("max_lines_shown", "0").is_err());
        assert!(settings.set("max_lines_shown", "many").is_err());
        assert!(settings.set("api_url", "ftp://example").is_err());
        assert!(settings.set("strict_references", "maybe").is_err());
        assert!(settings.set("colour", "blue").is_err());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_key_lists_valid_keys() {
        let err = Settings::default()
            .get("colour")
            .expect_err("unknown key")
            .to_string();
        assert!(err.starts_with("unknown setting 'colour', expected one of: access_token,"));
        assert!(err.contains("strict_references, languages.<ext>"));
    }

    #[test]
    fn language_entries_can_be_removed() -> Result<()> {
        let mut settings = Settings::default();
        settings.set("languages..RS", "rust")?;
        assert_eq!(settings.get("languages.rs")?, "rust");
        settings.set("languages.rs", "")?;
        assert!(settings.get("languages.rs").is_err());
        Ok(())
    }

    #[test]
    fn redacted_hides_token() {
        let settings = Settings {
            access_token: "ghp_secret".into(),
            ..Settings::default()
        };
        assert_eq!(settings.redacted().access_token, "********");
        assert_eq!(Settings::default().redacted().access_token, "");
    }
}
