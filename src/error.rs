//! Error types for the churn scoring pipeline

use thiserror::Error;

/// A required canonical feature is absent after field renaming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("required feature '{feature}' is missing from the customer record")]
    MissingFeature { feature: String },
}

/// Structural mismatch between a record and the fitted encoder.
///
/// Signals artifact/schema version skew. Unknown categories are never
/// reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("encoder feature '{feature}' is missing from the customer record")]
    MissingFeature { feature: String },

    #[error("feature '{feature}' cannot be encoded: expected {expected}")]
    TypeMismatch {
        feature: String,
        expected: &'static str,
    },

    #[error("encoded vector has {actual} values, classifier expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("encoded values overflow the classifier margin ({margin})")]
    NonFiniteMargin { margin: String },
}

/// Analytics requested over zero scored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot summarize an empty dataset")]
pub struct EmptyDatasetError;

/// Errors raised by the scoring operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    EmptyDataset(#[from] EmptyDatasetError),
}

/// Errors raised while building, saving or loading a trained pipeline.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("artifact fingerprint mismatch: recorded {recorded}, computed {computed}")]
    FingerprintMismatch { recorded: String, computed: String },

    #[error("classifier was fitted against encoder {expected}, bundled encoder is {found}")]
    EncoderMismatch { expected: String, found: String },

    #[error("encoder produces {encoder} features, classifier expects {classifier}")]
    DimensionMismatch { encoder: usize, classifier: usize },

    #[error("invalid model parameters: {0}")]
    InvalidModel(String),
}

/// Errors raised by the offline fitting procedure.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("cannot fit on an empty dataset")]
    EmptyDataset,

    #[error("{records} records but {labels} labels")]
    LabelCountMismatch { records: usize, labels: usize },

    #[error("label {0} is not binary (expected 0 or 1)")]
    NonBinaryLabel(u8),

    #[error("training data contains a single class; both churned and retained customers are required")]
    SingleClass,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_missing_field() {
        let err = SchemaError::MissingFeature {
            feature: "Tenure Months".to_string(),
        };
        assert!(err.to_string().contains("Tenure Months"));
    }

    #[test]
    fn test_scoring_error_wraps_sources() {
        let err: ScoringError = EmptyDatasetError.into();
        assert_eq!(err, ScoringError::EmptyDataset(EmptyDatasetError));
        assert_eq!(err.to_string(), "cannot summarize an empty dataset");
    }
}
