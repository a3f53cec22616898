//! Configuration for Codelens.

use crate::error::CoreError;
use codelens_analytics::AnalyticsOptions;
use codelens_indexer::EngineOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodelensConfig {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Query engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Executed queries kept in history
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Page size when a query sets no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Maximum suggestions returned
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Maximum edit distance accepted by fuzzy search
    #[serde(default = "default_fuzzy_max_distance")]
    pub fuzzy_max_distance: usize,
}

/// Analytics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// File complexity above which a file counts as complex
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: u32,

    /// Minimum score for a file to be reported as a hotspot
    #[serde(default = "default_hotspot_threshold")]
    pub hotspot_threshold: f64,

    /// Days of complexity history kept per file
    #[serde(default = "default_history_window_days")]
    pub history_window_days: u32,
}

/// Incremental pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Paths indexed per flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between the first queued change and its flush
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_history_size() -> usize {
    100
}

fn default_limit() -> usize {
    50
}

fn default_suggestion_limit() -> usize {
    10
}

fn default_fuzzy_max_distance() -> usize {
    2
}

fn default_complexity_threshold() -> u32 {
    10
}

fn default_hotspot_threshold() -> f64 {
    5.0
}

fn default_history_window_days() -> u32 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for CodelensConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            analytics: AnalyticsConfig::default(),
            pipeline: PipelineConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            default_limit: default_limit(),
            suggestion_limit: default_suggestion_limit(),
            fuzzy_max_distance: default_fuzzy_max_distance(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_complexity_threshold(),
            hotspot_threshold: default_hotspot_threshold(),
            history_window_days: default_history_window_days(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SearchConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            history_size: self.history_size,
            default_limit: self.default_limit,
            suggestion_limit: self.suggestion_limit,
            fuzzy_max_distance: self.fuzzy_max_distance,
        }
    }
}

impl AnalyticsConfig {
    pub fn options(&self) -> AnalyticsOptions {
        AnalyticsOptions {
            complexity_threshold: self.complexity_threshold,
            hotspot_threshold: self.hotspot_threshold,
            history_window_days: self.history_window_days,
        }
    }
}

impl PipelineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl CodelensConfig {
    /// Default location: `<config dir>/codelens/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("codelens").join("config.yaml"))
    }

    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(config_path) = Self::default_path() else {
            return Self::default();
        };

        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_yaml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = CodelensConfig::default();
        assert_eq!(config.search.history_size, 100);
        assert_eq!(config.search.default_limit, 50);
        assert_eq!(config.search.fuzzy_max_distance, 2);
        assert_eq!(config.analytics.complexity_threshold, 10);
        assert_eq!(config.analytics.hotspot_threshold, 5.0);
        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.debounce(), Duration::from_millis(300));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "pipeline:\n  batch_size: 25\nlog_level: debug\n";
        let config: CodelensConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.pipeline.debounce_ms, 300);
        assert_eq!(config.search, SearchConfig::default());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "analytics:\n  hotspot_threshold: 8.5\n").unwrap();

        let config = CodelensConfig::load_from(&path).unwrap();
        assert_eq!(config.analytics.hotspot_threshold, 8.5);
        assert_eq!(config.analytics.options().complexity_threshold, 10);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "pipeline: [not, a, map]\n").unwrap();
        assert!(matches!(
            CodelensConfig::load_from(&path),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            CodelensConfig::load_from(&temp_dir.path().join("missing.yaml")),
            Err(CoreError::Io(_))
        ));
    }
}
