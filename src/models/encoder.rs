//! Fitted feature encoder: numeric standardization plus categorical indicators.
//!
//! The encoder is fitted once offline and then treated as read-only
//! configuration. Output layout is all numeric columns in fit order followed
//! by one indicator per category, categories sorted at fit time.

use crate::error::{ArtifactError, EncodingError, TrainingError};
use crate::types::customer::CustomerRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};

/// Standardization statistics captured for one numeric feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub mean: f64,
    /// Population standard deviation; zero means the column was constant
    pub std: f64,
}

impl NumericColumn {
    fn scale(&self) -> f64 {
        if self.std > 0.0 {
            self.std
        } else {
            1.0
        }
    }
}

/// Category vocabulary captured for one categorical feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// Model-ready feature vector, only produced by [`FeatureEncoder::encode`]
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector(Vec<f64>);

impl EncodedFeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fitted numeric/categorical transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
}

impl FeatureEncoder {
    /// Build an encoder from previously captured statistics
    pub fn from_parts(
        numeric: Vec<NumericColumn>,
        categorical: Vec<CategoricalColumn>,
    ) -> Result<Self, ArtifactError> {
        let encoder = Self {
            numeric,
            categorical,
        };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Learn means, standard deviations and vocabularies from a dataset
    pub fn fit(
        records: &[CustomerRecord],
        numeric: &[&str],
        categorical: &[&str],
    ) -> Result<Self, TrainingError> {
        if records.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let mut numeric_columns = Vec::with_capacity(numeric.len());
        for &name in numeric {
            let mut values = Vec::with_capacity(records.len());
            for record in records {
                values.push(numeric_value(record, name)?);
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            numeric_columns.push(NumericColumn {
                name: name.to_string(),
                mean,
                std: variance.sqrt(),
            });
        }

        let mut categorical_columns = Vec::with_capacity(categorical.len());
        for &name in categorical {
            let mut vocabulary = BTreeSet::new();
            for record in records {
                let value = record
                    .get(name)
                    .ok_or_else(|| EncodingError::MissingFeature {
                        feature: name.to_string(),
                    })?;
                vocabulary.insert(value.category_label().into_owned());
            }
            categorical_columns.push(CategoricalColumn {
                name: name.to_string(),
                categories: vocabulary.into_iter().collect(),
            });
        }

        Ok(Self {
            numeric: numeric_columns,
            categorical: categorical_columns,
        })
    }

    /// Check internal consistency (finite statistics, unique names and categories)
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let mut names = HashSet::new();
        for column in &self.numeric {
            if !column.mean.is_finite() || !column.std.is_finite() || column.std < 0.0 {
                return Err(ArtifactError::InvalidModel(format!(
                    "numeric column '{}' has invalid statistics",
                    column.name
                )));
            }
            if !names.insert(column.name.as_str()) {
                return Err(ArtifactError::InvalidModel(format!(
                    "duplicate encoder column '{}'",
                    column.name
                )));
            }
        }
        for column in &self.categorical {
            if !names.insert(column.name.as_str()) {
                return Err(ArtifactError::InvalidModel(format!(
                    "duplicate encoder column '{}'",
                    column.name
                )));
            }
            let unique: HashSet<_> = column.categories.iter().collect();
            if unique.len() != column.categories.len() {
                return Err(ArtifactError::InvalidModel(format!(
                    "categorical column '{}' repeats a category",
                    column.name
                )));
            }
        }
        Ok(())
    }

    /// Length of every vector this encoder produces
    pub fn width(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Names of the encoded columns, `<feature>_<category>` for indicators
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}_{}", column.name, category));
            }
        }
        names
    }

    /// Encode a record.
    ///
    /// Unseen categories produce an all-zero indicator block. Out-of-range
    /// numerics are standardized like any other value.
    pub fn encode(&self, record: &CustomerRecord) -> Result<EncodedFeatureVector, EncodingError> {
        let mut features = Vec::with_capacity(self.width());

        for column in &self.numeric {
            let value = numeric_value(record, &column.name)?;
            features.push((value - column.mean) / column.scale());
        }

        for column in &self.categorical {
            let value = record
                .get(&column.name)
                .ok_or_else(|| EncodingError::MissingFeature {
                    feature: column.name.clone(),
                })?;
            let label = value.category_label();
            features.extend(
                column
                    .categories
                    .iter()
                    .map(|category| if *category == label { 1.0 } else { 0.0 }),
            );
        }

        Ok(EncodedFeatureVector(features))
    }

    /// SHA-256 over the exact fitted statistics (bit patterns, not text)
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for column in &self.numeric {
            hasher.update(b"numeric\0");
            hasher.update(column.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(column.mean.to_bits().to_le_bytes());
            hasher.update(column.std.to_bits().to_le_bytes());
        }
        for column in &self.categorical {
            hasher.update(b"categorical\0");
            hasher.update(column.name.as_bytes());
            hasher.update([0u8]);
            for category in &column.categories {
                hasher.update(category.as_bytes());
                hasher.update([0u8]);
            }
        }
        hex::encode(hasher.finalize())
    }
}

fn numeric_value(record: &CustomerRecord, name: &str) -> Result<f64, EncodingError> {
    let value = record
        .get(name)
        .ok_or_else(|| EncodingError::MissingFeature {
            feature: name.to_string(),
        })?;
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(EncodingError::TypeMismatch {
            feature: name.to_string(),
            expected: "a finite number",
        }),
        None => Err(EncodingError::TypeMismatch {
            feature: name.to_string(),
            expected: "a number",
        }),
    }
}
