//! Scoring and analytics result structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Probability above which a customer is labelled as churning
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Lowest probability in the High tier (inclusive)
pub const HIGH_RISK_FLOOR: f64 = 0.7;

/// Lowest probability in the Medium tier (inclusive)
pub const MEDIUM_RISK_FLOOR: f64 = 0.4;

/// Coarse churn risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Bucket a churn probability.
    ///
    /// Each band is closed on its lower bound: 0.7 is High, 0.4 is Medium.
    pub fn classify(probability: f64) -> Self {
        if probability >= HIGH_RISK_FLOOR {
            RiskTier::High
        } else if probability >= MEDIUM_RISK_FLOOR {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round to a fixed number of decimal digits for presentation.
///
/// Exact halves go to the even digit, so 3.125 becomes 3.12.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round_ties_even() / factor
}

/// Outcome of scoring one customer.
///
/// Holds the full-precision probability; rounding only happens in
/// [`ScoredCustomer::report`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCustomer {
    probability: f64,
    predicted_label: u8,
    risk_tier: RiskTier,
}

impl ScoredCustomer {
    /// Derive label and tier from a class-1 probability
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            predicted_label: u8::from(probability > DECISION_THRESHOLD),
            risk_tier: RiskTier::classify(probability),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// 1 when churn is predicted, 0 otherwise
    pub fn predicted_label(&self) -> u8 {
        self.predicted_label
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    /// Presentation form with the probability rounded to 3 digits
    pub fn report(&self) -> PredictionReport {
        PredictionReport {
            churn_probability: round_to(self.probability, 3),
            prediction: self.predicted_label,
            risk_tier: self.risk_tier,
        }
    }
}

/// Wire shape of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub churn_probability: f64,
    pub prediction: u8,
    pub risk_tier: RiskTier,
}

/// Aggregate statistics over a scored customer base
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSummary {
    pub total_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    /// Mean of the unrounded probabilities
    pub mean_probability: f64,
    /// Share of High tier customers, in percent
    pub critical_percentage: f64,
}

impl AnalyticsSummary {
    /// Presentation form: mean rounded to 3 digits, percentage to 2
    pub fn report(&self) -> AnalyticsReport {
        AnalyticsReport {
            total_customers: self.total_count,
            high_risk: self.high_count,
            medium_risk: self.medium_count,
            low_risk: self.low_count,
            average_churn_probability: round_to(self.mean_probability, 3),
            critical_percentage: round_to(self.critical_percentage, 2),
        }
    }
}

/// Wire shape of the analytics summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_customers: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub average_churn_probability: f64,
    pub critical_percentage: f64,
}
