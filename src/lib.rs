//! Churn Risk Scorer Library
//!
//! Scores telecom customers for churn risk: schema normalization, a fitted
//! feature encoder, a probabilistic classifier and risk-tier analytics, applied
//! uniformly to single records and to whole datasets.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod synthetic;
pub mod types;

pub use config::AppConfig;
pub use error::{ArtifactError, EmptyDatasetError, EncodingError, SchemaError, ScoringError};
pub use models::{summarize, SharedPipeline, TrainedPipeline};
pub use normalizer::normalize;
pub use pipeline::ScoringPipeline;
pub use types::{AnalyticsSummary, CustomerInput, RawRecord, RiskTier, ScoredCustomer};
