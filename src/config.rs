//! Bot configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables, then
//! validated. Patterns, dates and the timezone are all checked at load time.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::slacker::DEFAULT_API_BASE;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const ACTIVATED_ENV_VAR: &str = "DESTALINATOR_ACTIVATED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config key '{0}' must not be empty")]
    EmptyKey(&'static str),

    #[error("invalid date '{value}' for {key}, expected YYYY-MM-DD")]
    InvalidDate {
        key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid ignore_channel_patterns entry: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid schedule_timezone '{0}'")]
    InvalidTimezone(String),

    #[error("schedule_hour must be between 0 and 23, got {0}")]
    InvalidHour(u32),

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    #[error("no config path given and no user config directory available")]
    NoConfigDir,
}

/// Re-post a message to `output_channel` once `emoji` reached `threshold`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FlaggerRule {
    pub emoji: String,
    pub threshold: u32,
    pub output_channel: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Workspace subdomain, `<slack_name>.slack.com`
    pub slack_name: String,

    #[serde(default)]
    pub activated: bool,

    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: u32,

    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: u32,

    #[serde(default)]
    pub ignore_users: Vec<String>,

    #[serde(default)]
    pub ignore_channels: Vec<String>,

    #[serde(default)]
    pub ignore_channel_patterns: Vec<String>,

    #[serde(default = "default_included_subtypes")]
    pub included_subtypes: Vec<String>,

    pub earliest_archive_date: Option<String>,

    pub earliest_archive_date_env_varname: Option<String>,

    pub warning_text: String,

    pub closure_text: String,

    pub general_message_channel: Option<String>,

    #[serde(default = "default_lookback_days")]
    pub announce_lookback_days: u32,

    #[serde(default)]
    pub flagger_rules: Vec<FlaggerRule>,

    #[serde(default = "default_lookback_days")]
    pub flagger_lookback_days: u32,

    #[serde(default = "default_schedule_hour")]
    pub schedule_hour: u32,

    #[serde(default = "default_schedule_timezone")]
    pub schedule_timezone: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_warn_threshold() -> u32 {
    30
}

fn default_archive_threshold() -> u32 {
    60
}

fn default_included_subtypes() -> Vec<String> {
    ["bot_message", "channel_name", "file_share", "me_message", "thread_broadcast"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_lookback_days() -> u32 {
    1
}

fn default_schedule_hour() -> u32 {
    10
}

fn default_schedule_timezone() -> String {
    "UTC".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("destalinator").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

pub fn parse_date(key: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| {
        ConfigError::InvalidDate {
            key: key.to_string(),
            value: value.to_string(),
            source,
        }
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Reads `path` and applies overrides from the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    pub fn load_with_env<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!(path = %path.display(), "loading config");
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides(env)?;

        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env(ACTIVATED_ENV_VAR) {
            self.activated = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnvVar {
                name: ACTIVATED_ENV_VAR.to_string(),
                message: format!("expected a boolean, got '{value}'"),
            })?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("slack_name", &self.slack_name),
            ("warning_text", &self.warning_text),
            ("closure_text", &self.closure_text),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyKey(key));
            }
        }

        self.ignore_channel_patterns()?;

        if let Some(date) = &self.earliest_archive_date {
            parse_date("earliest_archive_date", date)?;
        }

        self.timezone()?;

        if self.schedule_hour > 23 {
            return Err(ConfigError::InvalidHour(self.schedule_hour));
        }

        Ok(())
    }

    pub fn ignore_channel_patterns(&self) -> Result<RegexSet, ConfigError> {
        Ok(RegexSet::new(&self.ignore_channel_patterns)?)
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.schedule_timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.schedule_timezone.clone()))
    }
}
