//! Trained probabilistic classifier producing a class-1 (churn) probability.

use crate::error::{ArtifactError, EncodingError};
use crate::models::encoder::{EncodedFeatureVector, FeatureEncoder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Common surface of every model family
pub trait ProbabilityModel {
    /// Number of encoded features the model consumes
    fn input_dim(&self) -> usize;

    /// Raw log-odds for one encoded vector of length `input_dim`
    fn margin(&self, features: &[f64]) -> f64;

    /// Structural checks run once at load time
    fn validate(&self) -> Result<(), ArtifactError>;
}

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Linear model over the encoded vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl ProbabilityModel for LogisticModel {
    fn input_dim(&self) -> usize {
        self.coefficients.len()
    }

    fn margin(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .fold(self.intercept, |acc, (w, x)| acc + w * x)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err(ArtifactError::InvalidModel(
                "logistic model has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Node of a regression tree, children referenced by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go left when `features[feature] < threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Single regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).copied().unwrap_or(0.0);
                    index = if x < *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return *value,
                // validate() guarantees every reachable index exists
                None => return 0.0,
            }
        }
    }
}

/// Additive boosted trees: `sigmoid(base_margin + sum(tree leaves))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub num_features: usize,
    pub base_margin: f64,
    pub trees: Vec<RegressionTree>,
}

impl ProbabilityModel for TreeEnsemble {
    fn input_dim(&self) -> usize {
        self.num_features
    }

    fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.evaluate(features))
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if !self.base_margin.is_finite() {
            return Err(ArtifactError::InvalidModel(
                "tree ensemble has a non-finite base margin".to_string(),
            ));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ArtifactError::InvalidModel(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        // Children must point forward so traversal always terminates
                        let children_ok = *left > i
                            && *right > i
                            && *left < tree.nodes.len()
                            && *right < tree.nodes.len();
                        if *feature >= self.num_features || !threshold.is_finite() || !children_ok
                        {
                            return Err(ArtifactError::InvalidModel(format!(
                                "tree {t} node {i} is malformed"
                            )));
                        }
                    }
                    TreeNode::Leaf { value } if !value.is_finite() => {
                        return Err(ArtifactError::InvalidModel(format!(
                            "tree {t} node {i} has a non-finite leaf"
                        )));
                    }
                    TreeNode::Leaf { .. } => {}
                }
            }
        }
        Ok(())
    }
}

/// Supported model families, tagged in the serialized artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelFamily {
    Logistic(LogisticModel),
    TreeEnsemble(TreeEnsemble),
}

impl ModelFamily {
    fn as_model(&self) -> &dyn ProbabilityModel {
        match self {
            ModelFamily::Logistic(m) => m,
            ModelFamily::TreeEnsemble(m) => m,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Logistic(_) => "logistic",
            ModelFamily::TreeEnsemble(_) => "tree_ensemble",
        }
    }
}

/// A fitted model bound to the encoder it was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    model: ModelFamily,
    encoder_fingerprint: String,
}

impl Classifier {
    /// Bind a model to the encoder whose output it was fitted on
    pub fn new(model: ModelFamily, encoder: &FeatureEncoder) -> Result<Self, ArtifactError> {
        let classifier = Self {
            model,
            encoder_fingerprint: encoder.fingerprint(),
        };
        classifier.validate()?;
        if classifier.input_dim() != encoder.width() {
            return Err(ArtifactError::DimensionMismatch {
                encoder: encoder.width(),
                classifier: classifier.input_dim(),
            });
        }
        Ok(classifier)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        self.model.as_model().validate()
    }

    pub fn model(&self) -> &ModelFamily {
        &self.model
    }

    /// Fingerprint of the encoder this classifier was fitted against
    pub fn fitted_against(&self) -> &str {
        &self.encoder_fingerprint
    }

    pub fn input_dim(&self) -> usize {
        self.model.as_model().input_dim()
    }

    /// Churn probability in [0, 1]; deterministic for a given vector.
    ///
    /// Extreme inputs can overflow the margin to an infinity or NaN, which
    /// is reported instead of being turned into a probability.
    pub fn predict_probability(&self, vector: &EncodedFeatureVector) -> Result<f64, EncodingError> {
        let expected = self.input_dim();
        if vector.len() != expected {
            return Err(EncodingError::ArityMismatch {
                expected,
                actual: vector.len(),
            });
        }
        let model = self.model.as_model();
        let margin = model.margin(vector.as_slice());
        if !margin.is_finite() {
            return Err(EncodingError::NonFiniteMargin {
                margin: margin.to_string(),
            });
        }
        Ok(sigmoid(margin).clamp(0.0, 1.0))
    }

    /// SHA-256 over the model parameters and the bound encoder fingerprint
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.encoder_fingerprint.as_bytes());
        match &self.model {
            ModelFamily::Logistic(m) => {
                hasher.update(m.intercept.to_bits().to_le_bytes());
                for w in &m.coefficients {
                    hasher.update(w.to_bits().to_le_bytes());
                }
            }
            ModelFamily::TreeEnsemble(m) => {
                hasher.update((m.num_features as u64).to_le_bytes());
                hasher.update(m.base_margin.to_bits().to_le_bytes());
                for tree in &m.trees {
                    hasher.update(b"tree\0");
                    for node in &tree.nodes {
                        match node {
                            TreeNode::Split {
                                feature,
                                threshold,
                                left,
                                right,
                            } => {
                                hasher.update([1u8]);
                                hasher.update((*feature as u64).to_le_bytes());
                                hasher.update(threshold.to_bits().to_le_bytes());
                                hasher.update((*left as u64).to_le_bytes());
                                hasher.update((*right as u64).to_le_bytes());
                            }
                            TreeNode::Leaf { value } => {
                                hasher.update([2u8]);
                                hasher.update(value.to_bits().to_le_bytes());
                            }
                        }
                    }
                }
            }
        }
        hex::encode(hasher.finalize())
    }
}
