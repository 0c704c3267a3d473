//! Configuration management for Scribe.
//!
//! Parses `scribe.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `kumascript.url`
//! - `kumascript.base_url`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the store snapshot path.
    pub snapshot: Option<PathBuf>,
    /// Override the kumascript service URL.
    pub kumascript_url: Option<String>,
    /// Override the force-immediate rendering switch.
    pub force_immediate: Option<bool>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "scribe.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Locale and tree settings.
    pub wiki: WikiConfig,
    /// Render scheduling settings.
    pub rendering: RenderingConfig,
    /// Kumascript renderer configuration (optional section).
    /// When present, `url` is required.
    kumascript: Option<KumascriptConfigRaw>,
    /// Store configuration (paths are relative strings from TOML).
    store: StoreConfigRaw,

    /// Resolved kumascript configuration (set after loading).
    #[serde(skip)]
    pub kumascript_resolved: KumascriptConfig,
    /// Resolved store configuration (set after loading).
    #[serde(skip)]
    pub store_resolved: StoreConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Locale and tree configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    /// Source-of-truth locale every translation derives from.
    pub canonical_locale: String,
    /// Known locales. Empty means any locale is accepted.
    pub locales: Vec<String>,
    /// Upper bound on breadcrumb walks (cycle guard).
    pub max_breadcrumb_depth: usize,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            canonical_locale: "en-US".to_owned(),
            locales: Vec::new(),
            max_breadcrumb_depth: 64,
        }
    }
}

impl WikiConfig {
    /// Whether `locale` is allowed by this configuration.
    #[must_use]
    pub fn accepts_locale(&self, locale: &str) -> bool {
        locale == self.canonical_locale
            || self.locales.is_empty()
            || self.locales.iter().any(|l| l == locale)
    }
}

/// Render scheduling configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Age after which a scheduled or in-progress render is considered abandoned.
    pub render_timeout_secs: u64,
    /// Renders taking at least this long flip the document to deferred rendering.
    pub force_defer_secs: u64,
    /// Render synchronously even for documents marked `defer_rendering`.
    pub force_immediate: bool,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            render_timeout_secs: 180,
            force_defer_secs: 10,
            force_immediate: false,
        }
    }
}

impl RenderingConfig {
    /// Staleness window for scheduled and in-progress renders.
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Render duration threshold for forced deferral.
    #[must_use]
    pub fn force_defer(&self) -> Duration {
        Duration::from_secs(self.force_defer_secs)
    }
}

/// Raw kumascript configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KumascriptConfigRaw {
    url: Option<String>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

/// Resolved kumascript configuration.
#[derive(Debug)]
pub struct KumascriptConfig {
    /// Kumascript service URL. `None` renders documents as their raw html.
    pub url: Option<String>,
    /// HTTP timeout. Zero bypasses the service entirely.
    pub timeout_secs: u64,
    /// Site base URL handed to macros.
    pub base_url: String,
}

impl Default for KumascriptConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 2,
            base_url: "http://localhost:8000".to_owned(),
        }
    }
}

impl KumascriptConfig {
    /// HTTP timeout for kumascript requests.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Raw store configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreConfigRaw {
    snapshot: Option<String>,
    cache_dir: Option<String>,
}

/// Resolved store configuration with absolute paths.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// JSON snapshot file backing the document store.
    pub snapshot: PathBuf,
    /// Directory for the rendered-document projection cache.
    pub cache_dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`kumascript.url`").
        field: String,
        /// Error message (e.g., "${`KUMASCRIPT_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `scribe.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(snapshot) = &settings.snapshot {
            self.store_resolved.snapshot.clone_from(snapshot);
        }
        if let Some(url) = &settings.kumascript_url {
            self.kumascript_resolved.url = Some(url.clone());
        }
        if let Some(force_immediate) = settings.force_immediate {
            self.rendering.force_immediate = force_immediate;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            wiki: WikiConfig::default(),
            rendering: RenderingConfig::default(),
            kumascript: None,
            store: StoreConfigRaw::default(),
            kumascript_resolved: KumascriptConfig::default(),
            store_resolved: StoreConfig {
                snapshot: base.join(".scribe").join("wiki.json"),
                cache_dir: base.join(".scribe").join("cache"),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_wiki()?;
        self.validate_rendering()?;
        self.validate_kumascript()?;
        Ok(())
    }

    fn validate_wiki(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.wiki.canonical_locale, "wiki.canonical_locale")?;
        if !self.wiki.locales.is_empty()
            && !self.wiki.locales.contains(&self.wiki.canonical_locale)
        {
            return Err(ConfigError::Validation(format!(
                "wiki.locales must include the canonical locale {}",
                self.wiki.canonical_locale
            )));
        }
        if self.wiki.max_breadcrumb_depth == 0 {
            return Err(ConfigError::Validation(
                "wiki.max_breadcrumb_depth must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_rendering(&self) -> Result<(), ConfigError> {
        // A zero window would make every pending render look abandoned
        if self.rendering.render_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "rendering.render_timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_kumascript(&self) -> Result<(), ConfigError> {
        if let Some(ref url) = self.kumascript_resolved.url {
            require_non_empty(url, "kumascript.url")?;
            require_http_url(url, "kumascript.url")?;
        }
        require_http_url(&self.kumascript_resolved.base_url, "kumascript.base_url")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref mut kumascript) = self.kumascript {
            if let Some(ref url) = kumascript.url {
                kumascript.url = Some(expand::expand_env(url, "kumascript.url")?);
            }
            if let Some(ref base_url) = kumascript.base_url {
                kumascript.base_url = Some(expand::expand_env(base_url, "kumascript.base_url")?);
            }
        }
        Ok(())
    }

    /// Resolve relative paths and optional sections.
    ///
    /// Validates that `url` is provided when `[kumascript]` section exists.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.store_resolved = StoreConfig {
            snapshot: resolve(self.store.snapshot.as_deref(), ".scribe/wiki.json"),
            cache_dir: resolve(self.store.cache_dir.as_deref(), ".scribe/cache"),
        };

        self.kumascript_resolved = match &self.kumascript {
            Some(raw) => {
                let url = raw.url.clone().ok_or_else(|| {
                    ConfigError::Validation(
                        "[kumascript] section requires url to be set".to_owned(),
                    )
                })?;
                let defaults = KumascriptConfig::default();
                KumascriptConfig {
                    url: Some(url),
                    timeout_secs: raw.timeout_secs.unwrap_or(defaults.timeout_secs),
                    base_url: raw.base_url.clone().unwrap_or(defaults.base_url),
                }
            }
            None => KumascriptConfig::default(),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.wiki.canonical_locale, "en-US");
        assert_eq!(config.wiki.max_breadcrumb_depth, 64);
        assert_eq!(config.rendering.render_timeout_secs, 180);
        assert_eq!(config.rendering.force_defer_secs, 10);
        assert!(!config.rendering.force_immediate);
        assert_eq!(config.kumascript_resolved.url, None);
        assert_eq!(
            config.store_resolved.snapshot,
            PathBuf::from("/test/.scribe/wiki.json")
        );
        assert_eq!(
            config.store_resolved.cache_dir,
            PathBuf::from("/test/.scribe/cache")
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.wiki.canonical_locale, "en-US");
        assert!(config.wiki.locales.is_empty());
    }

    #[test]
    fn test_parse_rendering_config() {
        let toml = r"
[rendering]
render_timeout_secs = 60
force_defer_secs = 3
force_immediate = true
";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.rendering.render_timeout(), Duration::from_secs(60));
        assert_eq!(config.rendering.force_defer(), Duration::from_secs(3));
        assert!(config.rendering.force_immediate);
    }

    #[test]
    fn test_accepts_locale() {
        let toml = r#"
[wiki]
canonical_locale = "en-US"
locales = ["en-US", "fr", "de"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.wiki.accepts_locale("fr"));
        assert!(config.wiki.accepts_locale("en-US"));
        assert!(!config.wiki.accepts_locale("ja"));

        let open = WikiConfig::default();
        assert!(open.accepts_locale("ja"));
    }

    #[test]
    fn test_load_from_file_resolves_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[store]
snapshot = "data/wiki.json"

[kumascript]
url = "http://localhost:9080"
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(
            config.store_resolved.snapshot,
            temp_dir.path().join("data/wiki.json")
        );
        assert_eq!(
            config.store_resolved.cache_dir,
            temp_dir.path().join(".scribe/cache")
        );
        assert_eq!(
            config.kumascript_resolved.url.as_deref(),
            Some("http://localhost:9080")
        );
        assert_eq!(config.kumascript_resolved.timeout(), Duration::from_secs(5));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_kumascript_section_requires_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[kumascript]\ntimeout_secs = 5\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("requires url"));
    }

    #[test]
    fn test_validate_rejects_bad_kumascript_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[kumascript]\nurl = \"ftp://ks\"\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_validate_locales_must_include_canonical() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.wiki.locales = vec!["fr".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_render_timeout() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.rendering.render_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let err = Config::load(Some(Path::new("/nonexistent/scribe.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_cli_settings_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();

        let settings = CliSettings {
            snapshot: Some(PathBuf::from("/tmp/other.json")),
            kumascript_url: Some("https://ks.example.com".to_owned()),
            force_immediate: Some(true),
        };
        let config = Config::load(Some(&path), Some(&settings)).unwrap();
        assert_eq!(
            config.store_resolved.snapshot,
            PathBuf::from("/tmp/other.json")
        );
        assert_eq!(
            config.kumascript_resolved.url.as_deref(),
            Some("https://ks.example.com")
        );
        assert!(config.rendering.force_immediate);
    }
}
