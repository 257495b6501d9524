//! Versioned artifact bundling the fitted encoder with its classifier.
//!
//! Encoder and classifier are always saved and loaded together. A bundle whose
//! classifier was fitted against a different encoder is rejected when it is
//! constructed, so scoring can never mix the two.

use crate::error::ArtifactError;
use crate::models::classifier::Classifier;
use crate::models::encoder::FeatureEncoder;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Current on-disk envelope version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Diagnostic identity of a loaded pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub model_version: String,
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    /// SHA-256 over the encoder and classifier parameters
    pub fingerprint: String,
}

/// Immutable encoder + classifier pair produced by one fitting run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedPipeline {
    identity: ArtifactIdentity,
    encoder: FeatureEncoder,
    classifier: Classifier,
}

/// Serialized form of [`TrainedPipeline`]
#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    identity: ArtifactIdentity,
    encoder: FeatureEncoder,
    classifier: Classifier,
}

impl TrainedPipeline {
    /// Bundle a freshly fitted encoder/classifier pair under a new run id
    pub fn new(
        model_version: impl Into<String>,
        encoder: FeatureEncoder,
        classifier: Classifier,
    ) -> Result<Self, ArtifactError> {
        check_pair(&encoder, &classifier)?;
        let identity = ArtifactIdentity {
            model_version: model_version.into(),
            run_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            fingerprint: pair_fingerprint(&encoder, &classifier),
        };
        Ok(Self {
            identity,
            encoder,
            classifier,
        })
    }

    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Serialize to JSON; f64 values round-trip bit for bit
    pub fn to_json(&self) -> Result<String, ArtifactError> {
        let envelope = ArtifactEnvelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            identity: self.identity.clone(),
            encoder: self.encoder.clone(),
            classifier: self.classifier.clone(),
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Parse and verify a serialized artifact
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let envelope: ArtifactEnvelope = serde_json::from_str(json)?;
        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedFormat {
                found: envelope.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        envelope.encoder.validate()?;
        envelope.classifier.validate()?;
        check_pair(&envelope.encoder, &envelope.classifier)?;

        let computed = pair_fingerprint(&envelope.encoder, &envelope.classifier);
        if computed != envelope.identity.fingerprint {
            return Err(ArtifactError::FingerprintMismatch {
                recorded: envelope.identity.fingerprint,
                computed,
            });
        }

        Ok(Self {
            identity: envelope.identity,
            encoder: envelope.encoder,
            classifier: envelope.classifier,
        })
    }

    /// Write the artifact to a file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;

        info!(
            path = %path.display(),
            model_version = %self.identity.model_version,
            fingerprint = %self.identity.fingerprint,
            "Saved trained pipeline"
        );
        Ok(())
    }

    /// Load and verify an artifact written by [`TrainedPipeline::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let pipeline = Self::from_json(&json)?;

        info!(
            path = %path.display(),
            model_version = %pipeline.identity.model_version,
            run_id = %pipeline.identity.run_id,
            family = pipeline.classifier.model().name(),
            features = pipeline.encoder.width(),
            "Loaded trained pipeline"
        );
        Ok(pipeline)
    }
}

fn check_pair(encoder: &FeatureEncoder, classifier: &Classifier) -> Result<(), ArtifactError> {
    let encoder_fingerprint = encoder.fingerprint();
    if classifier.fitted_against() != encoder_fingerprint {
        return Err(ArtifactError::EncoderMismatch {
            expected: classifier.fitted_against().to_string(),
            found: encoder_fingerprint,
        });
    }
    if classifier.input_dim() != encoder.width() {
        return Err(ArtifactError::DimensionMismatch {
            encoder: encoder.width(),
            classifier: classifier.input_dim(),
        });
    }
    Ok(())
}

fn pair_fingerprint(encoder: &FeatureEncoder, classifier: &Classifier) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoder.fingerprint().as_bytes());
    hasher.update(classifier.fingerprint().as_bytes());
    hex::encode(hasher.finalize())
}

/// Process-wide holder allowing a whole pipeline to be replaced atomically.
///
/// Readers take an `Arc` snapshot (see `ScoringPipeline::from_shared`), so a
/// call in flight keeps the bundle it started with even if a new one is
/// installed meanwhile.
#[derive(Debug)]
pub struct SharedPipeline {
    current: RwLock<Arc<TrainedPipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: TrainedPipeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(pipeline)),
        }
    }

    /// Current pipeline snapshot
    pub fn snapshot(&self) -> Arc<TrainedPipeline> {
        self.current.read().clone()
    }

    /// Install a new pipeline, returning the previous one
    pub fn replace(&self, pipeline: TrainedPipeline) -> Arc<TrainedPipeline> {
        let next = Arc::new(pipeline);
        info!(
            model_version = %next.identity.model_version,
            fingerprint = %next.identity.fingerprint,
            "Swapping trained pipeline"
        );
        std::mem::replace(&mut *self.current.write(), next)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::classifier::{
        LogisticModel, ModelFamily, RegressionTree, TreeEnsemble, TreeNode,
    };
    use crate::models::encoder::tests::tenure_contract_encoder;
    use crate::models::encoder::{CategoricalColumn, NumericColumn};

    /// Tenure/contract pipeline where long tenure and long contracts lower churn
    pub(crate) fn tenure_contract_pipeline() -> TrainedPipeline {
        let encoder = tenure_contract_encoder();
        let classifier = Classifier::new(
            ModelFamily::Logistic(LogisticModel {
                coefficients: vec![-1.2, 1.5, -0.3, -1.0],
                intercept: -0.1,
            }),
            &encoder,
        )
        .unwrap();
        TrainedPipeline::new("test-v1", encoder, classifier).unwrap()
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let pipeline = tenure_contract_pipeline();
        let restored = TrainedPipeline::from_json(&pipeline.to_json().unwrap()).unwrap();
        assert_eq!(restored, pipeline);
        assert_eq!(
            restored.encoder().fingerprint(),
            pipeline.encoder().fingerprint()
        );
    }

    #[test]
    fn test_tree_ensemble_round_trip_is_exact() {
        let encoder = tenure_contract_encoder();
        let ensemble = TreeEnsemble {
            num_features: encoder.width(),
            base_margin: -0.318_472_615_903_1,
            trees: vec![
                RegressionTree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 0,
                            threshold: -1.234_567_890_123,
                            left: 1,
                            right: 2,
                        },
                        TreeNode::Leaf { value: 0.1 + 0.2 },
                        TreeNode::Leaf { value: -0.7 },
                    ],
                },
                RegressionTree {
                    nodes: vec![TreeNode::Leaf { value: 1e-17 }],
                },
            ],
        };
        let classifier =
            Classifier::new(ModelFamily::TreeEnsemble(ensemble), &encoder).unwrap();
        let pipeline = TrainedPipeline::new("trees-v1", encoder, classifier).unwrap();

        let json = pipeline.to_json().unwrap();
        assert!(json.contains("\"family\": \"tree_ensemble\""));
        let restored = TrainedPipeline::from_json(&json).unwrap();
        assert_eq!(restored, pipeline);
        assert_eq!(
            restored.classifier().fingerprint(),
            pipeline.classifier().fingerprint()
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.json");
        let pipeline = tenure_contract_pipeline();

        pipeline.save(&path).unwrap();
        let loaded = TrainedPipeline::load(&path).unwrap();
        assert_eq!(loaded.identity(), pipeline.identity());
        assert_eq!(loaded.identity().model_version, "test-v1");
    }

    #[test]
    fn test_mismatched_encoder_is_rejected() {
        let pipeline = tenure_contract_pipeline();
        let other_encoder = FeatureEncoder::from_parts(
            vec![NumericColumn {
                name: "Tenure Months".to_string(),
                mean: 24.0,
                std: 12.0,
            }],
            vec![CategoricalColumn {
                name: "Contract".to_string(),
                categories: vec![
                    "Month-to-month".to_string(),
                    "One year".to_string(),
                    "Two year".to_string(),
                ],
            }],
        )
        .unwrap();

        let result = TrainedPipeline::new("mixed", other_encoder, pipeline.classifier().clone());
        assert!(matches!(result, Err(ArtifactError::EncoderMismatch { .. })));
    }

    #[test]
    fn test_tampered_artifact_is_rejected() {
        let pipeline = tenure_contract_pipeline();
        let mut value: serde_json::Value = serde_json::from_str(&pipeline.to_json().unwrap()).unwrap();
        value["classifier"]["model"]["intercept"] = serde_json::json!(3.0);

        let result = TrainedPipeline::from_json(&value.to_string());
        assert!(matches!(result, Err(ArtifactError::FingerprintMismatch { .. })));
    }

    #[test]
    fn test_unknown_format_version_is_rejected() {
        let pipeline = tenure_contract_pipeline();
        let mut value: serde_json::Value = serde_json::from_str(&pipeline.to_json().unwrap()).unwrap();
        value["format_version"] = serde_json::json!(99);

        assert!(matches!(
            TrainedPipeline::from_json(&value.to_string()),
            Err(ArtifactError::UnsupportedFormat {
                found: 99,
                expected: 1
            })
        ));
    }

    #[test]
    fn test_shared_pipeline_swaps_whole_bundle() {
        let shared = SharedPipeline::new(tenure_contract_pipeline());
        let before = shared.snapshot();

        let previous = shared.replace(tenure_contract_pipeline());
        assert_eq!(previous.identity().run_id, before.identity().run_id);
        assert_ne!(shared.snapshot().identity().run_id, before.identity().run_id);
        // Old snapshot stays intact for callers still holding it
        assert_eq!(before.identity().model_version, "test-v1");
    }
}
