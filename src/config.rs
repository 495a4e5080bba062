use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_store_path")]
    pub store_path: String,

    #[serde(default)]
    pub updates: UpdateConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpdateConfig {
    #[serde(default = "default_update_interval")]
    pub interval_hours: u64,
    #[serde(default = "default_repository_url")]
    pub repository_url: String,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Catalog entry served to force-styled sites.
    #[serde(default = "default_fallback_style")]
    pub fallback_style: String,
    #[serde(default = "default_decision_cache_capacity")]
    pub decision_cache_capacity: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_decisions")]
    pub log_decisions: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8787
}
fn default_store_path() -> String {
    "transparent-zen.json".to_string()
}
fn default_update_interval() -> u64 {
    2
}
fn default_repository_url() -> String {
    "https://sameerasw.github.io/my-internet/styles.json".to_string()
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_fallback_style() -> String {
    "example.com".to_string()
}
fn default_decision_cache_capacity() -> u64 {
    10000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_decisions() -> bool {
    true
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store_path: default_store_path(),
            updates: UpdateConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_update_interval(),
            repository_url: default_repository_url(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_style: default_fallback_style(),
            decision_cache_capacity: default_decision_cache_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_decisions: default_log_decisions(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        config.validate().context("Invalid config")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.updates.interval_hours == 0 {
            bail!("updates.interval_hours must be at least 1");
        }
        if self.updates.timeout_secs == 0 {
            bail!("updates.timeout_secs must be at least 1");
        }
        if self.stats.enable && self.stats.log_interval_seconds == 0 {
            bail!("stats.log_interval_seconds must be at least 1 when stats are enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            port = 9000

            [engine]
            fallback_style = "fallback.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.engine.fallback_style, "fallback.com");
        assert_eq!(config.engine.decision_cache_capacity, 10000);
        assert_eq!(config.updates.interval_hours, 2);
        assert!(config.logging.log_decisions);
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        assert!(Config::parse("[updates]\ninterval_hours = 0").is_err());
        assert!(Config::parse("[stats]\nlog_interval_seconds = 0").is_err());
        assert!(Config::parse("[stats]\nenable = false\nlog_interval_seconds = 0").is_ok());
        assert!(Config::parse("[updates]\ninterval_hours = 6").is_ok());
    }

    #[test]
    fn test_empty_toml_equals_default() {
        let config: Config = toml::from_str("").unwrap();
        let default = Config::default();
        assert_eq!(config.store_path, default.store_path);
        assert_eq!(config.updates.repository_url, default.updates.repository_url);
        assert_eq!(config.stats.log_interval_seconds, 300);
    }
}
