//! Global econcal configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_BATCH_SIZE, MATCH_WINDOW, QUERY_CACHE_TTL, SIMILARITY_THRESHOLD,
};
use crate::error::{EconCalError, EconCalResult};
use crate::matcher::MatcherConfig;
use crate::remote::DEFAULT_BACKEND_TIMEOUT;

/// Overrides the config file location. `~` is expanded.
const CONFIG_PATH_VAR: &str = "ECONCAL_CONFIG";

/// Prefix for environment overrides, e.g. `ECONCAL_BACKEND=postgres`.
const ENV_PREFIX: &str = "ECONCAL";

fn default_threshold() -> f64 {
    SIMILARITY_THRESHOLD
}

fn default_match_window() -> String {
    humantime::format_duration(MATCH_WINDOW).to_string()
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_cache_ttl() -> String {
    humantime::format_duration(QUERY_CACHE_TTL).to_string()
}

fn default_backend_timeout() -> String {
    humantime::format_duration(DEFAULT_BACKEND_TIMEOUT).to_string()
}

/// Global configuration at ~/.config/econcal/config.toml
///
/// Durations are humantime strings ("5m", "90s").
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EconCalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_match_window")]
    pub match_window: String,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: String,

    #[serde(default = "default_backend_timeout")]
    pub backend_timeout: String,

    /// IANA zone used for day grouping. Unset means the system zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Default for EconCalConfig {
    fn default() -> Self {
        EconCalConfig {
            backend: None,
            similarity_threshold: default_threshold(),
            match_window: default_match_window(),
            max_batch_size: default_max_batch_size(),
            cache_ttl: default_cache_ttl(),
            backend_timeout: default_backend_timeout(),
            timezone: None,
        }
    }
}

impl EconCalConfig {
    pub fn config_path() -> EconCalResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Ok(PathBuf::from(shellexpand::tilde(&path).into_owned()));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| EconCalError::Config("Could not determine config directory".into()))?
            .join("econcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, creating a commented file on first use.
    pub fn load() -> EconCalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from `path` (missing is fine) with `ECONCAL_*` overrides on top.
    pub fn load_from(path: &Path) -> EconCalResult<Self> {
        let config: EconCalConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| EconCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| EconCalError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> EconCalResult<()> {
        let contents = format!(
            "\
# econcal configuration

# Backend binary to use (econcal-backend-<name> on PATH):
# backend = \"postgres\"

# Minimum name similarity for two releases to count as the same event:
# similarity_threshold = {}

# How far apart two releases may be scheduled and still match:
# match_window = \"{}\"

# Events per bulk-ingest request:
# max_batch_size = {}

# How long range queries stay cached:
# cache_ttl = \"{}\"

# How long to wait for the backend:
# backend_timeout = \"{}\"

# Zone used to group events by day (defaults to the system zone):
# timezone = \"Europe/London\"
",
            SIMILARITY_THRESHOLD,
            default_match_window(),
            DEFAULT_MAX_BATCH_SIZE,
            default_cache_ttl(),
            default_backend_timeout(),
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EconCalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| EconCalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    fn validate(&self) -> EconCalResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EconCalError::Config(format!(
                "similarity_threshold must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }
        if self.max_batch_size == 0 {
            return Err(EconCalError::Config("max_batch_size must be at least 1".into()));
        }
        self.match_window()?;
        self.cache_ttl()?;
        self.backend_timeout()?;
        self.timezone()?;
        Ok(())
    }

    /// The configured backend name, or an error telling the user to set one.
    pub fn require_backend(&self) -> EconCalResult<&str> {
        self.backend.as_deref().ok_or_else(|| {
            EconCalError::Config(
                "No backend configured. Set `backend` in the config file or ECONCAL_BACKEND."
                    .into(),
            )
        })
    }

    pub fn match_window(&self) -> EconCalResult<Duration> {
        parse_duration("match_window", &self.match_window)
    }

    pub fn cache_ttl(&self) -> EconCalResult<Duration> {
        parse_duration("cache_ttl", &self.cache_ttl)
    }

    pub fn backend_timeout(&self) -> EconCalResult<Duration> {
        parse_duration("backend_timeout", &self.backend_timeout)
    }

    pub fn matcher_config(&self) -> EconCalResult<MatcherConfig> {
        Ok(MatcherConfig {
            threshold: self.similarity_threshold,
            window: self.match_window()?,
        })
    }

    /// Configured zone, if any. Falling back to the system zone is left to
    /// the caller.
    pub fn timezone(&self) -> EconCalResult<Option<Tz>> {
        self.timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| EconCalError::Config(format!("Unknown timezone '{name}'")))
            })
            .transpose()
    }
}

fn parse_duration(key: &str, value: &str) -> EconCalResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| EconCalError::Config(format!("Invalid {key} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        EconCalConfig::create_default_config(&path).unwrap();
        assert!(path.exists());

        let config = EconCalConfig::load_from(&path).unwrap();
        assert_eq!(config.backend, None);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.match_window().unwrap(), Duration::from_secs(300));
        assert_eq!(config.max_batch_size, 200);
        assert_eq!(config.backend_timeout().unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "backend = \"postgres\"\nsimilarity_threshold = 0.9\nmatch_window = \"10m\"\ntimezone = \"Europe/London\"\n",
        )
        .unwrap();

        let config = EconCalConfig::load_from(&path).unwrap();
        assert_eq!(config.require_backend().unwrap(), "postgres");

        let matcher = config.matcher_config().unwrap();
        assert_eq!(matcher.threshold, 0.9);
        assert_eq!(matcher.window, Duration::from_secs(600));
        assert_eq!(config.timezone().unwrap(), Some(chrono_tz::Europe::London));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();

        for body in [
            "similarity_threshold = 1.5\n",
            "max_batch_size = 0\n",
            "cache_ttl = \"soon\"\n",
            "timezone = \"Mars/Olympus\"\n",
        ] {
            let path = dir.path().join("config.toml");
            std::fs::write(&path, body).unwrap();
            assert!(
                matches!(EconCalConfig::load_from(&path), Err(EconCalError::Config(_))),
                "expected config error for {body:?}"
            );
        }
    }

    #[test]
    fn test_missing_backend_is_reported() {
        let config = EconCalConfig::default();
        assert!(matches!(config.require_backend(), Err(EconCalError::Config(_))));
    }
}
