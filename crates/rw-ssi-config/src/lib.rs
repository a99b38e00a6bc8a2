//! Configuration management for rw-ssi.
//!
//! Parses `ssi.toml` configuration files with serde and provides
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
//! - `files.root_dir`
//! - every value in `[variables]`

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "ssi.toml";

/// Recognised `sizefmt` values.
const SIZE_FORMATS: [&str; 2] = ["abbrev", "bytes"];

/// CLI settings that override configuration file values.
///
/// Only non-None values override the loaded config; variables are merged on
/// top of `[variables]`.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override document root.
    pub root_dir: Option<PathBuf>,
    /// Extra variables, later entries win.
    pub variables: Vec<(String, String)>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial `#config` values.
    pub ssi: SsiConfig,
    /// File resolution (paths are relative strings from TOML).
    files: FilesConfigRaw,
    /// Variables seeded into every document.
    pub variables: BTreeMap<String, String>,

    /// Resolved file configuration (set after loading).
    #[serde(skip)]
    pub files_resolved: FilesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Initial values for the strings `#config` can change.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SsiConfig {
    /// Message written in place of a failed directive.
    pub errmsg: String,
    /// strftime format for dates.
    pub timefmt: String,
    /// `abbrev` or `bytes`.
    pub sizefmt: String,
}

impl Default for SsiConfig {
    fn default() -> Self {
        Self {
            errmsg: "[an error occurred while processing this directive]".to_owned(),
            timefmt: "%A, %d-%b-%Y %T %Z".to_owned(),
            sizefmt: "abbrev".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FilesConfigRaw {
    root_dir: Option<String>,
}

/// Resolved file configuration with absolute paths.
#[derive(Debug, Default)]
pub struct FilesConfig {
    /// Document root for `virtual` paths.
    pub root_dir: PathBuf,
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
        /// Config field path (e.g., "`files.root_dir`").
        field: String,
        /// Error message (e.g., "${`SITE_ROOT`} not set").
        message: String,
    },
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `ssi.toml` in current directory and parents.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, or parsing,
    /// expansion or validation fails.
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

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(root_dir) = &settings.root_dir {
            self.files_resolved.root_dir.clone_from(root_dir);
        }
        for (name, value) in &settings.variables {
            self.variables.insert(name.clone(), value.clone());
        }
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizefmt = &self.ssi.sizefmt;
        if !SIZE_FORMATS.iter().any(|f| f.eq_ignore_ascii_case(sizefmt)) {
            return Err(ConfigError::Validation(format!(
                "ssi.sizefmt must be one of {}, got {sizefmt:?}",
                SIZE_FORMATS.join(", ")
            )));
        }

        if self.files.root_dir.as_deref() == Some("") {
            return Err(ConfigError::Validation(
                "files.root_dir cannot be empty".to_owned(),
            ));
        }

        Ok(())
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

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            ssi: SsiConfig::default(),
            files: FilesConfigRaw::default(),
            variables: BTreeMap::new(),
            files_resolved: FilesConfig {
                root_dir: base.to_path_buf(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.validate()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref root_dir) = self.files.root_dir {
            self.files.root_dir = Some(expand::expand_env(root_dir, "files.root_dir")?);
        }

        for (name, value) in &mut self.variables {
            *value = expand::expand_env(value, &format!("variables.{name}"))?;
        }

        Ok(())
    }

    /// Resolve the document root relative to the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.files_resolved = FilesConfig {
            root_dir: config_dir.join(self.files.root_dir.as_deref().unwrap_or(".")),
        };
    }
}
