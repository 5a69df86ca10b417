//! High-level API for training calibrated SVM classifiers
//!
//! This module wraps the optimizer in a builder and adds Platt-scaled
//! probabilities and evaluation metrics on top of the raw margin.
//!
//! # Quick Start
//!
//! ```rust
//! use diabetes_risk::api::SVM;
//! use diabetes_risk::core::Sample;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let samples = vec![
//!     Sample::new(vec![2.0], 1.0),
//!     Sample::new(vec![-2.0], -1.0),
//!     Sample::new(vec![1.5], 1.0),
//!     Sample::new(vec![-1.5], -1.0),
//! ];
//!
//! let model = SVM::new()
//!     .with_c(1.0)
//!     .with_epsilon(0.001)
//!     .with_calibration(2, 0)
//!     .train_samples(&samples)?;
//!
//! let p = model.predict_proba(&[1.0]).unwrap_or(0.5);
//! println!("P(+1) = {p:.3}, accuracy = {:.2}", model.evaluate(&samples).accuracy());
//! # Ok(())
//! # }
//! ```

use crate::calibration::{cross_validated_decision_values, PlattScaling};
use crate::core::{OptimizerConfig, Prediction, Result, SVMModel, Sample, WorkingSetStrategy};
use crate::kernel::{Kernel, LinearKernel};
use crate::optimizer::{SVMOptimizer, TrainedSVM};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Cross validation settings for probability calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    pub folds: usize,
    pub seed: u64,
}

/// High-level SVM interface with builder pattern
pub struct SVM<K: Kernel = LinearKernel> {
    kernel: K,
    config: OptimizerConfig,
    calibration: Option<CalibrationConfig>,
}

impl SVM<LinearKernel> {
    /// Create a new SVM with linear kernel and default parameters
    pub fn new() -> Self {
        Self::with_kernel(LinearKernel::new())
    }
}

impl Default for SVM<LinearKernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Kernel> SVM<K> {
    /// Create SVM with custom kernel
    pub fn with_kernel(kernel: K) -> Self {
        Self {
            kernel,
            config: OptimizerConfig::default(),
            calibration: None,
        }
    }

    /// Replace the whole optimizer configuration
    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Set maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set kernel cache size in bytes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.config.cache_size = cache_size;
        self
    }

    pub fn with_working_set_strategy(mut self, strategy: WorkingSetStrategy) -> Self {
        self.config.working_set_strategy = strategy;
        self
    }

    /// Fit a Platt sigmoid after training
    ///
    /// With `folds >= 2` the sigmoid is fit on cross-validated margins,
    /// otherwise on the margins of the final model.
    pub fn with_calibration(mut self, folds: usize, seed: u64) -> Self {
        self.calibration = Some(CalibrationConfig { folds, seed });
        self
    }

    /// Train on samples
    pub fn train_samples(self, samples: &[Sample]) -> Result<TrainedModel<K>> {
        let calibration = self.calibration;
        let optimizer = SVMOptimizer::new(self.kernel, self.config);
        let model = optimizer.train_samples(samples)?;

        let platt = match calibration {
            Some(cal) => Some(calibrate(&optimizer, &model, samples, cal)?),
            None => None,
        };

        Ok(TrainedModel { model, platt })
    }
}

/// Fit the sigmoid on held-out margins, or on the model's own margins when
/// the held-out ones carry no signal
fn calibrate<K: Kernel>(
    optimizer: &SVMOptimizer<K>,
    model: &TrainedSVM<K>,
    samples: &[Sample],
    cal: CalibrationConfig,
) -> Result<PlattScaling> {
    let labels: Vec<bool> = samples.iter().map(Sample::is_positive).collect();
    let in_sample = || -> Vec<f64> {
        samples
            .iter()
            .map(|s| model.decision_function(&s.features))
            .collect()
    };

    if cal.folds < 2 {
        return PlattScaling::fit(&in_sample(), &labels);
    }

    let held_out = cross_validated_decision_values(optimizer, samples, cal.folds, cal.seed)?;
    let platt = PlattScaling::fit(&held_out, &labels)?;
    debug!("Calibrated on {} margins ({} folds)", held_out.len(), cal.folds);
    if !platt.is_flat() {
        return Ok(platt);
    }

    warn!("Cross-validated margins do not rise with the labels; calibrating on training margins");
    PlattScaling::fit(&in_sample(), &labels)
}

/// Trained SVM model with high-level prediction interface
pub struct TrainedModel<K: Kernel> {
    model: TrainedSVM<K>,
    platt: Option<PlattScaling>,
}

impl<K: Kernel> TrainedModel<K> {
    /// Predict a single sample
    pub fn predict(&self, sample: &Sample) -> Prediction {
        self.model.predict(sample)
    }

    /// Predict multiple samples
    pub fn predict_batch(&self, samples: &[Sample]) -> Vec<Prediction> {
        self.model.predict_batch(samples)
    }

    /// Calibrated probability of the positive class, if calibration was requested
    ///
    /// Above 0.5 exactly when [`predict`](Self::predict) returns +1.
    pub fn predict_proba(&self, features: &[f64]) -> Option<f64> {
        self.platt
            .map(|platt| platt.probability(self.model.decision_function(features)))
    }

    /// Confusion counts of the margin sign against the sample labels
    pub fn evaluate(&self, samples: &[Sample]) -> EvaluationMetrics {
        let predicted: Vec<bool> = self
            .predict_batch(samples)
            .iter()
            .map(|p| p.label > 0.0)
            .collect();
        let actual: Vec<bool> = samples.iter().map(Sample::is_positive).collect();
        EvaluationMetrics::from_labels(&predicted, &actual)
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            n_support_vectors: self.model.n_support_vectors(),
            bias: self.model.bias(),
            iterations: self.model.iterations(),
            converged: self.model.converged(),
        }
    }

    pub fn platt(&self) -> Option<PlattScaling> {
        self.platt
    }

    /// Get the underlying trained model
    pub fn inner(&self) -> &TrainedSVM<K> {
        &self.model
    }
}

/// Detailed evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    pub(crate) fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    /// Tally predicted against actual labels (`true` is the positive class)
    pub fn from_labels(predicted: &[bool], actual: &[bool]) -> Self {
        let mut tp = 0;
        let mut tn = 0;
        let mut fp = 0;
        let mut fn_ = 0;

        for (&pred, &truth) in predicted.iter().zip(actual.iter()) {
            match (pred, truth) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }

        Self::new(tp, tn, fp, fn_)
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    /// Calculate accuracy: (TP + TN) / (TP + TN + FP + FN)
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.true_positives + self.true_negatives) as f64 / total as f64
        }
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// Calculate recall (sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denominator = self.true_positives + self.false_negatives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// Calculate F1 score: 2 * (precision * recall) / (precision + recall)
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        let denominator = self.true_negatives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_negatives as f64 / denominator as f64
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub n_support_vectors: usize,
    pub bias: f64,
    pub iterations: usize,
    pub converged: bool,
}
