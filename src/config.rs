use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::request_filter::FilterList;
use crate::utils::paths;

/// Runtime configuration of the shell.
///
/// Layered as built-in defaults, then the TOML file, then `TUBESHELL_`
/// environment variables (`TUBESHELL_STORAGE__WRITE_DEBOUNCE_MS=100`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub host: HostConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path of the settings document, or "auto" for the platform config directory.
    pub settings_file: String,
    pub write_debounce_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// 0 waits for the main window indefinitely.
    pub ready_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Session partitions the request filter is applied to.
    pub partitions: Vec<String>,
    /// Replaces the built-in list when not empty.
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Appended to whichever list is active.
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

pub const DEFAULT_PARTITION: &str = "persist:player";

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            storage: StorageConfig {
                settings_file: "auto".to_string(),
                write_debounce_ms: 300,
            },
            host: HostConfig { ready_timeout_ms: 0 },
            filter: FilterConfig {
                partitions: vec![DEFAULT_PARTITION.to_string()],
                patterns: Vec::new(),
                extra_patterns: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TUBESHELL_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "pretty" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        if self.storage.settings_file.trim().is_empty() {
            anyhow::bail!("storage.settings_file must not be empty");
        }

        if self.filter.partitions.is_empty() {
            anyhow::bail!("filter.partitions must name at least one session partition");
        }

        for (i, partition) in self.filter.partitions.iter().enumerate() {
            if partition.trim().is_empty() {
                anyhow::bail!("Empty partition name at filter.partitions[{}]", i);
            }
        }

        self.filter_list()
            .context("Invalid filter.patterns / filter.extra_patterns")?;

        Ok(())
    }

    /// Resolved location of the settings document.
    pub fn settings_path(&self) -> Result<PathBuf> {
        if self.storage.settings_file == "auto" {
            paths::default_settings_file()
        } else {
            Ok(PathBuf::from(&self.storage.settings_file))
        }
    }

    pub fn write_debounce(&self) -> Duration {
        Duration::from_millis(self.storage.write_debounce_ms)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        match self.host.ready_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Active filter list: configured patterns (or the built-in list) plus extras.
    pub fn filter_list(&self) -> crate::error::Result<FilterList> {
        let base = if self.filter.patterns.is_empty() {
            FilterList::builtin()
        } else {
            FilterList::parse("configured", &self.filter.patterns)?
        };

        if self.filter.extra_patterns.is_empty() {
            return Ok(base);
        }

        let extra = FilterList::parse("extra", &self.filter.extra_patterns)?;
        Ok(base.extended(&extra))
    }
}
