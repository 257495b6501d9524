//! Offline fitting of the encoder + logistic classifier pair.
//!
//! Full-batch gradient descent on the weighted log loss with an L2 penalty.
//! No randomness is involved, so the same dataset and parameters always
//! produce the same artifact parameters.

use crate::error::TrainingError;
use crate::models::artifact::TrainedPipeline;
use crate::models::classifier::{sigmoid, Classifier, LogisticModel, ModelFamily};
use crate::models::encoder::{EncodedFeatureVector, FeatureEncoder};
use crate::normalizer::{normalize, CATEGORICAL_FEATURES, NUMERIC_FEATURES};
use crate::types::customer::RawRecord;
use tracing::{debug, info};

/// Gradient descent hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once every gradient component is below this magnitude
    pub tolerance: f64,
    pub l2: f64,
    /// Weight classes inversely to their frequency
    pub balance_classes: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iter: 2000,
            tolerance: 1e-6,
            l2: 1e-3,
            balance_classes: true,
        }
    }
}

fn check_labels(rows: usize, labels: &[u8]) -> Result<(), TrainingError> {
    if rows == 0 {
        return Err(TrainingError::EmptyDataset);
    }
    if rows != labels.len() {
        return Err(TrainingError::LabelCountMismatch {
            records: rows,
            labels: labels.len(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&y| y > 1) {
        return Err(TrainingError::NonBinaryLabel(bad));
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(TrainingError::SingleClass);
    }
    Ok(())
}

/// Fit logistic coefficients on encoded vectors
pub fn fit_logistic(
    rows: &[EncodedFeatureVector],
    labels: &[u8],
    params: &TrainingParams,
) -> Result<LogisticModel, TrainingError> {
    check_labels(rows.len(), labels)?;

    let n = rows.len() as f64;
    let dim = rows[0].len();
    let positives = labels.iter().filter(|&&y| y == 1).count() as f64;
    let (w_neg, w_pos) = if params.balance_classes {
        (n / (2.0 * (n - positives)), n / (2.0 * positives))
    } else {
        (1.0, 1.0)
    };

    let mut coefficients = vec![0.0; dim];
    let mut intercept = 0.0;
    let mut iterations = 0;

    for iter in 0..params.max_iter {
        iterations = iter + 1;
        let mut coef_grad = vec![0.0; dim];
        let mut intercept_grad = 0.0;
        let mut loss = 0.0;

        for (row, &label) in rows.iter().zip(labels) {
            let x = row.as_slice();
            let z = coefficients
                .iter()
                .zip(x)
                .fold(intercept, |acc, (w, v)| acc + w * v);
            let p = sigmoid(z);
            let y = f64::from(label);
            let weight = if label == 1 { w_pos } else { w_neg };

            let error = weight * (p - y);
            intercept_grad += error;
            for (g, v) in coef_grad.iter_mut().zip(x) {
                *g += error * v;
            }
            loss -= weight * (y * p.max(1e-15).ln() + (1.0 - y) * (1.0 - p).max(1e-15).ln());
        }

        intercept_grad /= n;
        for (g, w) in coef_grad.iter_mut().zip(&coefficients) {
            *g = *g / n + params.l2 * w;
        }

        intercept -= params.learning_rate * intercept_grad;
        for (w, g) in coefficients.iter_mut().zip(&coef_grad) {
            *w -= params.learning_rate * g;
        }

        if iter % 100 == 0 {
            debug!(iteration = iter, loss = loss / n, "Gradient descent progress");
        }

        let converged = intercept_grad.abs() < params.tolerance
            && coef_grad.iter().all(|g| g.abs() < params.tolerance);
        if converged {
            break;
        }
    }

    info!(
        iterations = iterations,
        features = dim,
        samples = rows.len(),
        "Logistic model fitted"
    );

    Ok(LogisticModel {
        coefficients,
        intercept,
    })
}

/// Fit encoder and classifier on raw records and bundle them as one artifact
pub fn fit_pipeline(
    records: &[RawRecord],
    labels: &[u8],
    params: &TrainingParams,
    model_version: &str,
) -> Result<TrainedPipeline, TrainingError> {
    check_labels(records.len(), labels)?;

    let normalized = records
        .iter()
        .map(normalize)
        .collect::<Result<Vec<_>, _>>()?;

    let encoder = FeatureEncoder::fit(&normalized, &NUMERIC_FEATURES, &CATEGORICAL_FEATURES)?;
    info!(
        width = encoder.width(),
        numeric = encoder.numeric_columns().len(),
        categorical = encoder.categorical_columns().len(),
        "Feature encoder fitted"
    );

    let encoded = normalized
        .iter()
        .map(|r| encoder.encode(r))
        .collect::<Result<Vec<_>, _>>()?;

    let model = fit_logistic(&encoded, labels, params)?;
    let classifier = Classifier::new(ModelFamily::Logistic(model), &encoder)?;
    Ok(TrainedPipeline::new(model_version, encoder, classifier)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::synthetic;
    use std::sync::OnceLock;

    static SYNTHETIC: OnceLock<TrainedPipeline> = OnceLock::new();

    /// Pipeline fitted once on seeded synthetic customers, shared across tests
    pub(crate) fn synthetic_pipeline() -> TrainedPipeline {
        SYNTHETIC.get_or_init(fit_synthetic).clone()
    }

    fn fit_synthetic() -> TrainedPipeline {
        let dataset = synthetic::generate(1500, 42);
        let labels: Vec<u8> = dataset.iter().map(|c| c.churned).collect();
        let records: Vec<RawRecord> = dataset.into_iter().map(|c| c.customer.into_raw()).collect();
        let params = TrainingParams {
            max_iter: 600,
            ..TrainingParams::default()
        };
        fit_pipeline(&records, &labels, &params, "synthetic-test").unwrap()
    }

    #[test]
    fn test_fit_is_deterministic() {
        let a = fit_synthetic();
        let b = fit_synthetic();
        assert_eq!(a.encoder(), b.encoder());
        assert_eq!(a.classifier(), b.classifier());
        assert_eq!(a.identity().fingerprint, b.identity().fingerprint);
    }

    #[test]
    fn test_fitted_model_learns_contract_signal() {
        let pipeline = synthetic_pipeline();
        let names = pipeline.encoder().output_names();
        let ModelFamily::Logistic(model) = pipeline.classifier().model() else {
            panic!("expected logistic model");
        };

        let weight = |name: &str| {
            let idx = names.iter().position(|n| n == name).unwrap();
            model.coefficients[idx]
        };
        assert!(weight("Contract_Month-to-month") > weight("Contract_Two year"));
        assert_eq!(model.coefficients.len(), pipeline.encoder().width());
    }

    #[test]
    fn test_label_validation() {
        let rows: Vec<RawRecord> = synthetic::generate(3, 1)
            .into_iter()
            .map(|c| c.customer.into_raw())
            .collect();
        let params = TrainingParams::default();

        assert!(matches!(
            fit_pipeline(&rows, &[0, 1], &params, "v"),
            Err(TrainingError::LabelCountMismatch {
                records: 3,
                labels: 2
            })
        ));
        assert!(matches!(
            fit_pipeline(&rows, &[0, 2, 1], &params, "v"),
            Err(TrainingError::NonBinaryLabel(2))
        ));
        assert!(matches!(
            fit_pipeline(&rows, &[1, 1, 1], &params, "v"),
            Err(TrainingError::SingleClass)
        ));
        assert!(matches!(
            fit_pipeline(&[], &[], &params, "v"),
            Err(TrainingError::EmptyDataset)
        ));
    }

    #[test]
    fn test_missing_field_fails_fit() {
        let mut rows: Vec<RawRecord> = synthetic::generate(2, 3)
            .into_iter()
            .map(|c| c.customer.into_raw())
            .collect();
        rows[1].remove("Contract");

        assert!(matches!(
            fit_pipeline(&rows, &[0, 1], &TrainingParams::default(), "v"),
            Err(TrainingError::Schema(_))
        ));
    }
}
