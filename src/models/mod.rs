//! Fitted model components: encoder, classifier, artifact bundle and analytics

pub mod aggregator;
pub mod artifact;
pub mod classifier;
pub mod encoder;
pub mod training;

pub use aggregator::{summarize, RiskAggregator};
pub use artifact::{ArtifactIdentity, SharedPipeline, TrainedPipeline};
pub use classifier::{Classifier, LogisticModel, ModelFamily, TreeEnsemble};
pub use encoder::{EncodedFeatureVector, FeatureEncoder};
