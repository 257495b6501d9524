//! Configuration management for the churn scorer

use crate::models::training::TrainingParams;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub artifact: ArtifactConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub input: InputConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Trained pipeline artifact location
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Path of the JSON artifact written by the fitting tool
    pub path: String,
}

/// Batch scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Rayon worker threads (0 = one per core)
    #[serde(default)]
    pub workers: usize,
    /// Records scored per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    256
}

/// Dataset input; stdin is read when no path is set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    pub path: Option<String>,
}

/// Offline fitting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Version tag recorded in the artifact
    pub model_version: String,
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    pub l2: f64,
    pub balance_classes: bool,
}

impl TrainingConfig {
    pub fn params(&self) -> TrainingParams {
        TrainingParams {
            learning_rate: self.learning_rate,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
            l2: self.l2,
            balance_classes: self.balance_classes,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between periodic summaries
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file plus `CHURN__` environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path plus `CHURN__` environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// `CHURN__SECTION__KEY` overrides `section.key`
fn environment() -> Environment {
    Environment::with_prefix("CHURN").separator("__")
}

impl Default for AppConfig {
    fn default() -> Self {
        let params = TrainingParams::default();
        Self {
            artifact: ArtifactConfig {
                path: "models/churn_pipeline.json".to_string(),
            },
            pipeline: PipelineConfig {
                workers: 0,
                batch_size: default_batch_size(),
            },
            input: InputConfig::default(),
            training: TrainingConfig {
                model_version: "churn-logistic-v1".to_string(),
                learning_rate: params.learning_rate,
                max_iter: params.max_iter,
                tolerance: params.tolerance,
                l2: params.l2,
                balance_classes: params.balance_classes,
            },
            metrics: MetricsConfig {
                report_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
