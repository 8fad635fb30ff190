//! Configuration management for mmd.
//!
//! Parses `mmd.toml` with serde, discovering it in the current directory or
//! any parent when no path is given. [`CliSettings`] overrides are applied
//! after loading.
//!
//! ```toml
//! [library]
//! source = "module"      # "module" | "remote" | "kroki"
//! url = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs"
//! kroki_url = "https://kroki.io"
//! timeout = 30
//!
//! [mermaid]
//! start_on_load = true
//! theme = "default"
//!
//! [cache]
//! enabled = true
//! dir = ".mmd/cache"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! `library.url` and `library.kroki_url` support `${VAR}` (error if unset)
//! and `${VAR:-default}`.

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mmd.toml";

/// ES module build of the diagram library served from the public CDN.
pub const DEFAULT_LIBRARY_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs";

/// Default cache directory, relative to the config file.
const DEFAULT_CACHE_DIR: &str = ".mmd/cache";

/// CLI settings that override configuration file values.
#[derive(Debug, Default)]
pub struct CliSettings {
    pub source: Option<LibrarySource>,
    pub url: Option<String>,
    pub kroki_url: Option<String>,
    pub theme: Option<String>,
    pub cache_enabled: Option<bool>,
}

/// How the diagram library is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibrarySource {
    /// Static module import; nothing is fetched at activation time.
    #[default]
    Module,
    /// Fetched from `library.url` and verified before activation proceeds.
    Remote,
    /// Rendered server-side by a Kroki instance at `library.kroki_url`.
    Kroki,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibrarySettings,
    pub mermaid: MermaidSettings,
    cache: CacheConfigRaw,

    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file, if one was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// `[library]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    pub source: LibrarySource,
    /// Module specifier or URL the library is imported from.
    pub url: String,
    /// Kroki server URL, required for `source = "kroki"`.
    pub kroki_url: Option<String>,
    /// Load and HTTP timeout in seconds.
    pub timeout: u64,
}

impl LibrarySettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            source: LibrarySource::default(),
            url: DEFAULT_LIBRARY_URL.to_owned(),
            kroki_url: None,
            timeout: 30,
        }
    }
}

/// `[mermaid]` section: the static options handed to the library.
///
/// No other keys are recognized.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MermaidSettings {
    pub start_on_load: bool,
    pub theme: String,
}

impl Default for MermaidSettings {
    fn default() -> Self {
        Self {
            start_on_load: true,
            theme: "default".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
}

/// Resolved cache configuration.
#[derive(Debug, Default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Absolute (config-relative) cache directory.
    pub dir: PathBuf,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config key (e.g. `library.url`).
        field: String,
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration, then apply CLI overrides.
    ///
    /// With `config_path`, that file must exist. Without it, `mmd.toml` is
    /// searched for in the current directory and its parents; if none is
    /// found the defaults are used, relative to the current directory.
    ///
    /// The result is validated after overrides are applied.
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
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source) = settings.source {
            self.library.source = source;
        }
        if let Some(url) = &settings.url {
            self.library.url.clone_from(url);
        }
        if let Some(kroki_url) = &settings.kroki_url {
            self.library.kroki_url = Some(kroki_url.clone());
        }
        if let Some(theme) = &settings.theme {
            self.mermaid.theme.clone_from(theme);
        }
        if let Some(enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = enabled;
        }
    }

    /// Check that the configured values can be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_library()?;
        require_non_empty(&self.mermaid.theme, "mermaid.theme")?;
        Ok(())
    }

    fn validate_library(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.library.url, "library.url")?;

        if self.library.timeout == 0 {
            return Err(ConfigError::Validation(
                "library.timeout must be greater than 0".to_owned(),
            ));
        }

        match self.library.source {
            LibrarySource::Module => {}
            LibrarySource::Remote => require_http_url(&self.library.url, "library.url")?,
            LibrarySource::Kroki => {
                let kroki_url = self.library.kroki_url.as_deref().ok_or_else(|| {
                    ConfigError::Validation(
                        "library.kroki_url is required when library.source = \"kroki\""
                            .to_owned(),
                    )
                })?;
                require_non_empty(kroki_url, "library.kroki_url")?;
                require_http_url(kroki_url, "library.kroki_url")?;
            }
        }

        Ok(())
    }

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

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            library: LibrarySettings::default(),
            mermaid: MermaidSettings::default(),
            cache: CacheConfigRaw::default(),
            cache_resolved: CacheConfig {
                enabled: true,
                dir: base.join(DEFAULT_CACHE_DIR),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.library.url = expand::expand_env(&self.library.url, "library.url")?;
        if let Some(url) = &self.library.kroki_url {
            self.library.kroki_url = Some(expand::expand_env(url, "library.kroki_url")?);
        }
        Ok(())
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(DEFAULT_CACHE_DIR)),
        };
    }
}
