//! Type definitions for the churn scoring pipeline

pub mod customer;
pub mod score;

pub use customer::{CustomerInput, CustomerRecord, FeatureValue, InputError, RawRecord};
pub use score::{AnalyticsReport, AnalyticsSummary, PredictionReport, RiskTier, ScoredCustomer};
