//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use recflow_core::{Compression, FailurePolicy, IngestConfig};
use serde::Deserialize;

/// Global configuration for recflow
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestSection,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub push_backoff_ms: u64,
    pub poll_interval_ms: u64,
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub verify_checksums: bool,
}

impl Default for IngestSection {
    fn default() -> Self {
        let d = IngestConfig::default();
        Self {
            batch_size: d.batch_size,
            queue_capacity: d.queue_capacity,
            push_backoff_ms: d.push_backoff.as_millis() as u64,
            poll_interval_ms: d.poll_interval.as_millis() as u64,
            workers: d.workers,
            failure_policy: d.failure_policy,
            verify_checksums: d.verify_checksums,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Compression of generated shard files
    pub compression: Compression,
    pub shards: usize,
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            shards: 10,
            prefix: "dataset".to_string(),
        }
    }
}

/// Ingestion flags given on the command line; each one overrides the file
#[derive(Debug, Clone, Default)]
pub struct IngestOverrides {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub backoff_ms: Option<u64>,
    pub policy: Option<FailurePolicy>,
    pub no_verify: bool,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./recflow.toml (current directory)
    /// 2. ~/.config/recflow/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("recflow.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "recflow") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Core ingestion settings with command line overrides applied
    pub fn ingest_config(&self, overrides: &IngestOverrides) -> IngestConfig {
        let file = &self.ingest;
        IngestConfig {
            batch_size: overrides.batch_size.unwrap_or(file.batch_size),
            queue_capacity: overrides.queue_capacity.unwrap_or(file.queue_capacity),
            push_backoff: Duration::from_millis(overrides.backoff_ms.unwrap_or(file.push_backoff_ms)),
            poll_interval: Duration::from_millis(file.poll_interval_ms),
            workers: overrides.workers.unwrap_or(file.workers),
            failure_policy: overrides.policy.unwrap_or(file.failure_policy),
            verify_checksums: file.verify_checksums && !overrides.no_verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.ingest.push_backoff_ms, 1000);
        assert_eq!(config.ingest.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.output.shards, 10);
        assert_eq!(config.output.prefix, "dataset");
        assert!(config.ingest.workers >= 1);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[ingest]
batch_size = 32
queue_capacity = 5000
failure_policy = "tolerate"
verify_checksums = false

[output]
compression = "gzip"
shards = 4
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ingest.batch_size, 32);
        assert_eq!(config.ingest.queue_capacity, 5000);
        assert_eq!(config.ingest.failure_policy, FailurePolicy::Tolerate);
        assert!(!config.ingest.verify_checksums);
        assert_eq!(config.ingest.push_backoff_ms, 1000);
        assert_eq!(config.output.compression, Compression::Gzip);
        assert_eq!(config.output.shards, 4);
        assert_eq!(config.output.prefix, "dataset");
    }

    #[test]
    fn overrides_win_over_file() {
        let config: Config = toml::from_str("[ingest]\nworkers = 2\nbatch_size = 50\n").unwrap();
        let ingest = config.ingest_config(&IngestOverrides {
            workers: Some(8),
            backoff_ms: Some(5),
            policy: Some(FailurePolicy::Tolerate),
            no_verify: true,
            ..Default::default()
        });
        assert_eq!(ingest.workers, 8);
        assert_eq!(ingest.batch_size, 50);
        assert_eq!(ingest.push_backoff, Duration::from_millis(5));
        assert_eq!(ingest.failure_policy, FailurePolicy::Tolerate);
        assert!(!ingest.verify_checksums);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recflow.toml");
        std::fs::write(&path, "[ingest]\nbatch_size = \"lots\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
