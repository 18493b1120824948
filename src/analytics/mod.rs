//! Cluster and trend analytics over the knowledge graph.

pub mod clusters;
pub mod trends;

pub use clusters::{ClusterAnalyzer, ClusterAnalyzerOptions, ClusterGap, ClusterInsight};
pub use trends::{
    ActivityPoint, LifecyclePhase, PhasePrediction, TrendAnalysis, TrendDirection, TrendOptions,
    TrendPredictor, linear_fit,
};
