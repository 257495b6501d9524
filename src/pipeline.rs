//! Scoring pipeline: normalize -> encode -> classify -> bucket.
//!
//! The pipeline holds a shared, read-only [`TrainedPipeline`]. Every scoring
//! call is a pure function of its input and that artifact, so records can be
//! scored on any thread in any order.

use crate::error::ScoringError;
use crate::models::aggregator::summarize;
use crate::models::artifact::{ArtifactIdentity, SharedPipeline, TrainedPipeline};
use crate::normalizer::normalize;
use crate::types::customer::RawRecord;
use crate::types::score::{AnalyticsSummary, ScoredCustomer};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Scores raw customer records against one trained pipeline
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    trained: Arc<TrainedPipeline>,
}

impl ScoringPipeline {
    pub fn new(trained: Arc<TrainedPipeline>) -> Self {
        Self { trained }
    }

    /// Pipeline over the bundle currently installed in `shared`.
    ///
    /// Later swaps do not affect the returned pipeline.
    pub fn from_shared(shared: &SharedPipeline) -> Self {
        Self::new(shared.snapshot())
    }

    /// Identity of the artifact backing this pipeline
    pub fn identity(&self) -> &ArtifactIdentity {
        self.trained.identity()
    }

    pub fn trained(&self) -> &Arc<TrainedPipeline> {
        &self.trained
    }

    /// Score a single record
    pub fn score(&self, raw: &RawRecord) -> Result<ScoredCustomer, ScoringError> {
        let record = normalize(raw)?;
        let vector = self.trained.encoder().encode(&record)?;
        let probability = self.trained.classifier().predict_probability(&vector)?;
        let scored = ScoredCustomer::from_probability(probability);

        debug!(
            probability = probability,
            risk_tier = %scored.risk_tier(),
            "Customer scored"
        );
        Ok(scored)
    }

    /// Score every record independently, keeping input order.
    ///
    /// Records are scored in parallel; the result for index `i` is exactly
    /// `score(&records[i])`.
    pub fn score_each(&self, records: &[RawRecord]) -> Vec<Result<ScoredCustomer, ScoringError>> {
        records.par_iter().map(|raw| self.score(raw)).collect()
    }

    /// Score a batch, failing with the error of the first bad record in input order
    pub fn score_all(&self, records: &[RawRecord]) -> Result<Vec<ScoredCustomer>, ScoringError> {
        self.score_each(records)
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.map_err(|e| {
                    warn!(index = index, error = %e, "Batch scoring failed");
                    e
                })
            })
            .collect()
    }

    /// Score a dataset and reduce it to portfolio analytics
    pub fn analyze(&self, records: &[RawRecord]) -> Result<AnalyticsSummary, ScoringError> {
        let scored = self.score_all(records)?;
        Ok(summarize(&scored)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmptyDatasetError, SchemaError};
    use crate::models::artifact::tests::tenure_contract_pipeline;
    use crate::models::training::tests::synthetic_pipeline;
    use crate::synthetic;
    use crate::types::customer::tests::{loyal_customer, new_fiber_customer};
    use crate::types::customer::FeatureValue;
    use crate::types::score::RiskTier;

    fn hand_built() -> ScoringPipeline {
        ScoringPipeline::new(Arc::new(tenure_contract_pipeline()))
    }

    /// Record with the given tenure and contract, other fields from the loyal customer
    fn with_tenure_contract(tenure: i64, contract: &str) -> RawRecord {
        let mut raw = loyal_customer().into_raw();
        raw.insert("Tenure_Months".to_string(), FeatureValue::Integer(tenure));
        raw.insert("Contract".to_string(), contract.into());
        raw
    }

    #[test]
    fn test_score_loyal_customer_is_low_risk() {
        let scored = hand_built().score(&loyal_customer().into_raw()).unwrap();
        assert!(scored.probability() < 0.4);
        assert_eq!(scored.risk_tier(), RiskTier::Low);
        assert_eq!(scored.predicted_label(), 0);
    }

    #[test]
    fn test_score_new_month_to_month_customer_is_at_risk() {
        let scored = hand_built().score(&new_fiber_customer().into_raw()).unwrap();
        assert!(matches!(scored.risk_tier(), RiskTier::Medium | RiskTier::High));
        assert_eq!(scored.predicted_label(), u8::from(scored.probability() > 0.5));
    }

    #[test]
    fn test_fitted_pipeline_scenarios() {
        let pipeline = ScoringPipeline::new(Arc::new(synthetic_pipeline()));

        let loyal = pipeline.score(&loyal_customer().into_raw()).unwrap();
        assert!(loyal.probability() < 0.4, "p = {}", loyal.probability());
        assert_eq!(loyal.risk_tier(), RiskTier::Low);

        let at_risk = pipeline.score(&new_fiber_customer().into_raw()).unwrap();
        assert!(
            matches!(at_risk.risk_tier(), RiskTier::Medium | RiskTier::High),
            "p = {}",
            at_risk.probability()
        );
    }

    #[test]
    fn test_unknown_category_still_scores() {
        let pipeline = ScoringPipeline::new(Arc::new(synthetic_pipeline()));
        let mut raw = new_fiber_customer().into_raw();
        raw.insert("Payment_Method".to_string(), "Cryptocurrency".into());
        raw.insert("Internet_Service".to_string(), "Satellite".into());

        let scored = pipeline.score(&raw).unwrap();
        assert!((0.0..=1.0).contains(&scored.probability()));
    }

    #[test]
    fn test_unknown_category_matches_zero_indicator() {
        let pipeline = hand_built();
        let unknown = pipeline
            .score(&with_tenure_contract(30, "Three year"))
            .unwrap();
        // Tenure at the mean and no contract indicator leaves only the intercept
        let expected = crate::models::classifier::sigmoid(-0.1);
        assert!((unknown.probability() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let mut raw = loyal_customer().into_raw();
        raw.remove("Payment_Method");

        assert_eq!(
            hand_built().score(&raw),
            Err(ScoringError::Schema(SchemaError::MissingFeature {
                feature: "Payment Method".to_string()
            }))
        );
    }

    #[test]
    fn test_batch_equals_repeated_single_scoring() {
        let pipeline = ScoringPipeline::new(Arc::new(synthetic_pipeline()));
        let records: Vec<RawRecord> = synthetic::generate(200, 9)
            .into_iter()
            .map(|c| c.customer.into_raw())
            .collect();

        let batch = pipeline.score_all(&records).unwrap();
        let single: Vec<_> = records.iter().map(|r| pipeline.score(r).unwrap()).collect();
        assert_eq!(batch, single);

        // Any partitioning gives the same element-wise result
        let mut chunked = Vec::new();
        for chunk in records.chunks(37) {
            chunked.extend(pipeline.score_all(chunk).unwrap());
        }
        assert_eq!(chunked, single);

        // Reordering input reorders output identically
        let reversed: Vec<RawRecord> = records.iter().rev().cloned().collect();
        let mut scored_reversed = pipeline.score_all(&reversed).unwrap();
        scored_reversed.reverse();
        assert_eq!(scored_reversed, single);
    }

    #[test]
    fn test_score_all_reports_first_failure_in_order() {
        let mut records = vec![loyal_customer().into_raw(); 5];
        records[1].remove("Gender");
        records[3].remove("CLTV");

        assert_eq!(
            hand_built().score_all(&records),
            Err(ScoringError::Schema(SchemaError::MissingFeature {
                feature: "Gender".to_string()
            }))
        );
    }

    #[test]
    fn test_analyze_scenario_counts() {
        let pipeline = hand_built();
        // Hand-built model: margin = -0.1 - 1.2 * (tenure - 30) / 10 + contract weight
        let mut records = Vec::new();
        for tenure in [1, 5, 10] {
            records.push(with_tenure_contract(tenure, "Month-to-month"));
        }
        for tenure in [25, 28] {
            records.push(with_tenure_contract(tenure, "One year"));
        }
        for tenure in [40, 50, 60, 70, 72] {
            records.push(with_tenure_contract(tenure, "Two year"));
        }

        let scored = pipeline.score_all(&records).unwrap();
        let tiers: Vec<_> = scored.iter().map(|s| s.risk_tier()).collect();
        assert_eq!(&tiers[..3], &[RiskTier::High; 3]);
        assert_eq!(&tiers[3..5], &[RiskTier::Medium; 2]);
        assert_eq!(&tiers[5..], &[RiskTier::Low; 5]);

        let report = pipeline.analyze(&records).unwrap().report();
        assert_eq!(report.total_customers, 10);
        assert_eq!(report.high_risk, 3);
        assert_eq!(report.medium_risk, 2);
        assert_eq!(report.low_risk, 5);
        assert_eq!(report.critical_percentage, 30.0);
    }

    #[test]
    fn test_shared_snapshot_survives_swap() {
        let shared = SharedPipeline::new(tenure_contract_pipeline());
        let before = ScoringPipeline::from_shared(&shared);
        let loyal = loyal_customer().into_raw();
        let p_before = before.score(&loyal).unwrap().probability();

        shared.replace(synthetic_pipeline());
        let after = ScoringPipeline::from_shared(&shared);

        assert_eq!(before.score(&loyal).unwrap().probability(), p_before);
        assert_eq!(after.identity().model_version, "synthetic-test");
        assert_eq!(before.identity().model_version, "test-v1");
    }

    #[test]
    fn test_analyze_empty_dataset() {
        assert_eq!(
            hand_built().analyze(&[]),
            Err(ScoringError::EmptyDataset(EmptyDatasetError))
        );
    }
}
