// Application settings
// Loaded from <config_dir>/leadsync/config.toml

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use leadsync_recon::DuplicatePolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:3030";

// ── Log level ───────────────────────────────────────────────────────

/// Minimum severity that gets logged.
///
/// Parsing is lenient: `warning` is accepted for `warn`, case is ignored,
/// and anything unrecognized falls back to `info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl From<String> for LogLevel {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

impl FromStr for LogLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Rate-limit backoff tuning. Wait before retry `n` (0-based) is
/// `base_delay_ms * multiplier^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 100, multiplier: 2 }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the lead API.
    pub api_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    pub log_level: LogLevel,

    /// Worker threads for batch processing (1 = sequential).
    pub concurrency: usize,

    /// Handling of repeated emails within one input file.
    pub duplicates: DuplicatePolicy,

    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 5,
            log_level: LogLevel::Info,
            concurrency: 1,
            duplicates: DuplicatePolicy::FirstWins,
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url must start with http:// or https:// (got '{}')",
                self.api_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.retry.multiplier == 0 {
            return Err(ConfigError::Invalid("retry.multiplier must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Loading ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `<config_dir>/leadsync/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("leadsync").join("config.toml"))
}

/// Load settings from `explicit`, or from [`default_path`] when `None`.
///
/// An explicit path must exist. A missing default file yields defaults.
pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Settings::default()),
        },
    };

    let contents = fs::read_to_string(&path)
        .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
    let settings =
        Settings::from_toml(&contents).map_err(|source| ConfigError::Parse { path, source })?;
    settings.validate()?;
    Ok(settings)
}
