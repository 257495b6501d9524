//! Aggregation of per-customer scores into portfolio analytics

use crate::error::EmptyDatasetError;
use crate::types::score::{AnalyticsSummary, RiskTier, ScoredCustomer};

/// Running tally of scored customers.
///
/// Can be fed incrementally (one batch at a time) and merged across
/// partitions; [`RiskAggregator::finish`] derives the summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskAggregator {
    total: usize,
    high: usize,
    medium: usize,
    low: usize,
    /// Sum of unrounded probabilities
    probability_sum: f64,
}

impl RiskAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one scored customer
    pub fn record(&mut self, scored: &ScoredCustomer) {
        self.total += 1;
        self.probability_sum += scored.probability();
        match scored.risk_tier() {
            RiskTier::High => self.high += 1,
            RiskTier::Medium => self.medium += 1,
            RiskTier::Low => self.low += 1,
        }
    }

    /// Add every customer of a batch
    pub fn extend<'a>(&mut self, scored: impl IntoIterator<Item = &'a ScoredCustomer>) {
        for s in scored {
            self.record(s);
        }
    }

    /// Combine with a tally built over another partition
    pub fn merge(&mut self, other: &RiskAggregator) {
        self.total += other.total;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.probability_sum += other.probability_sum;
    }

    pub fn count(&self) -> usize {
        self.total
    }

    /// Derive the summary; an empty tally has no defined mean or percentage
    pub fn finish(&self) -> Result<AnalyticsSummary, EmptyDatasetError> {
        if self.total == 0 {
            return Err(EmptyDatasetError);
        }

        let total = self.total as f64;
        Ok(AnalyticsSummary {
            total_count: self.total,
            high_count: self.high,
            medium_count: self.medium,
            low_count: self.low,
            mean_probability: self.probability_sum / total,
            critical_percentage: self.high as f64 / total * 100.0,
        })
    }
}

/// Summarize a scored dataset in a single pass
pub fn summarize(scored: &[ScoredCustomer]) -> Result<AnalyticsSummary, EmptyDatasetError> {
    let mut aggregator = RiskAggregator::new();
    aggregator.extend(scored);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(probabilities: &[f64]) -> Vec<ScoredCustomer> {
        probabilities
            .iter()
            .map(|&p| ScoredCustomer::from_probability(p))
            .collect()
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        assert_eq!(summarize(&[]), Err(EmptyDatasetError));
    }

    #[test]
    fn test_tier_counts_and_percentage() {
        // 3 high, 2 medium, 5 low
        let batch = scored(&[0.9, 0.75, 0.7, 0.5, 0.4, 0.39, 0.2, 0.1, 0.05, 0.0]);
        let summary = summarize(&batch).unwrap();

        assert_eq!(summary.total_count, 10);
        assert_eq!(summary.high_count, 3);
        assert_eq!(summary.medium_count, 2);
        assert_eq!(summary.low_count, 5);
        assert_eq!(
            summary.high_count + summary.medium_count + summary.low_count,
            summary.total_count
        );
        assert!((summary.critical_percentage - 30.0).abs() < 1e-9);
        assert_eq!(summary.report().critical_percentage, 30.0);
    }

    #[test]
    fn test_mean_uses_unrounded_probabilities() {
        let batch = scored(&[0.0004, 0.0004]);
        let summary = summarize(&batch).unwrap();
        assert!((summary.mean_probability - 0.0004).abs() < 1e-15);
        assert_eq!(batch[0].report().churn_probability, 0.0);
    }

    #[test]
    fn test_reported_percentage_rounds_half_to_even() {
        let mut probabilities = vec![0.9];
        probabilities.extend([0.1; 31]);
        let summary = summarize(&scored(&probabilities)).unwrap();

        assert_eq!(summary.critical_percentage, 3.125);
        assert_eq!(summary.report().critical_percentage, 3.12);
    }

    #[test]
    fn test_all_or_nothing_critical() {
        let all_high = summarize(&scored(&[0.7, 0.8, 0.99])).unwrap();
        assert_eq!(all_high.critical_percentage, 100.0);

        let none_high = summarize(&scored(&[0.1, 0.69, 0.4])).unwrap();
        assert_eq!(none_high.critical_percentage, 0.0);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let batch = scored(&[0.9, 0.45, 0.1, 0.72, 0.3]);
        let (left, right) = batch.split_at(2);

        let mut a = RiskAggregator::new();
        a.extend(left);
        let mut b = RiskAggregator::new();
        b.extend(right);
        a.merge(&b);

        let merged = a.finish().unwrap();
        let single = summarize(&batch).unwrap();
        assert_eq!(merged.total_count, single.total_count);
        assert_eq!(merged.high_count, single.high_count);
        assert!((merged.mean_probability - single.mean_probability).abs() < 1e-12);
    }
}
