//! Diabetes risk scoring with a linear Support Vector Machine
//!
//! The Pima Indians diabetes table is standardized, split into stratified
//! train and holdout partitions and used to fit a linear C-SVC by sequential
//! minimal optimization. Platt scaling turns the SVM margin into calibrated
//! probabilities. The fitted pipeline is immutable and cached for the life
//! of the process.
//!
//! ```rust,no_run
//! use diabetes_risk::{load, LoaderConfig, ModelCell, PatientFeatures, Pipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! static MODEL: ModelCell = ModelCell::new();
//!
//! let pipeline = MODEL.get_or_fit(|| {
//!     let dataset = load(&LoaderConfig::default());
//!     Pipeline::fit(&dataset, &PipelineConfig::default())
//! })?;
//!
//! let result = pipeline.predict(&PatientFeatures::defaults())?;
//! println!("{}: {:.1}%", result.verdict(), result.probability_positive * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod calibration;
pub mod config;
pub mod core;
pub mod data;
pub mod kernel;
pub mod optimizer;
pub mod pipeline;
pub mod solver;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{EvaluationMetrics, ModelInfo, TrainedModel, SVM};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::calibration::PlattScaling;
pub use crate::config::{LoaderConfig, PipelineConfig, DEFAULT_DATASET_URL};
pub use crate::core::error::{FetchError, Result, RiskError};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::{
    load, load_with, DatasetOrigin, DatasetSource, Outcome, PatientFeatures, PatientRecord,
    PimaDataset, ADVISORY_BOUNDS, FEATURE_NAMES,
};
pub use crate::kernel::{Kernel, LinearKernel};
pub use crate::optimizer::{LinearModel, SVMOptimizer, TrainedSVM};
pub use crate::pipeline::{
    FittedPipeline, ModelCell, ModelSummary, Pipeline, PipelineState, PredictionResult,
};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
