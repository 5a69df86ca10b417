//! Optimization algorithms for SVM
//!
//! This module provides high-level optimization interfaces that integrate
//! kernels and solvers to provide complete SVM training functionality.

use crate::core::{OptimizationResult, OptimizerConfig, Result, SVMModel, Sample};
use crate::kernel::{dot, Kernel, LinearKernel};
use crate::solver::SMOSolver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// High-level SVM optimizer that integrates kernel functions and solving algorithms
pub struct SVMOptimizer<K: Kernel> {
    kernel: Arc<K>,
    config: OptimizerConfig,
}

impl<K: Kernel> SVMOptimizer<K> {
    /// Create a new SVM optimizer with the given kernel and configuration
    pub fn new(kernel: K, config: OptimizerConfig) -> Self {
        Self {
            kernel: Arc::new(kernel),
            config,
        }
    }

    /// Create a new SVM optimizer with default configuration
    pub fn with_kernel(kernel: K) -> Self {
        Self::new(kernel, OptimizerConfig::default())
    }

    /// Train an SVM model on a slice of samples
    pub fn train_samples(&self, samples: &[Sample]) -> Result<TrainedSVM<K>> {
        let solver = SMOSolver::new(Arc::clone(&self.kernel), self.config.clone());
        let result = solver.solve(samples)?;
        Ok(TrainedSVM::new(Arc::clone(&self.kernel), samples, result))
    }

    /// Get the optimizer configuration
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Get the kernel
    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

/// A trained SVM model that can make predictions
pub struct TrainedSVM<K: Kernel> {
    kernel: Arc<K>,
    support_vectors: Vec<Sample>,
    alpha: Vec<f64>,
    bias: f64,
    support_indices: Vec<usize>,
    iterations: usize,
    converged: bool,
}

impl<K: Kernel> TrainedSVM<K> {
    /// Create a new trained SVM model
    pub(crate) fn new(
        kernel: Arc<K>,
        training_samples: &[Sample],
        optimization_result: OptimizationResult,
    ) -> Self {
        let (support_vectors, alpha) = optimization_result
            .support_vectors
            .iter()
            .map(|&sv_idx| {
                (
                    training_samples[sv_idx].clone(),
                    optimization_result.alpha[sv_idx],
                )
            })
            .unzip();

        Self {
            kernel,
            support_vectors,
            alpha,
            bias: optimization_result.b,
            support_indices: optimization_result.support_vectors,
            iterations: optimization_result.iterations,
            converged: optimization_result.converged,
        }
    }

    /// Get the support vectors
    pub fn support_vectors(&self) -> &[Sample] {
        &self.support_vectors
    }

    /// Get the alpha values for support vectors
    pub fn alpha_values(&self) -> &[f64] {
        &self.alpha
    }

    /// Get the indices of support vectors in the original training set
    pub fn support_vector_indices(&self) -> &[usize] {
        &self.support_indices
    }

    /// Number of solver iterations used to train the model
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the solver met its tolerance
    pub fn converged(&self) -> bool {
        self.converged
    }
}

impl TrainedSVM<LinearKernel> {
    /// Collapse the support vector expansion into `w = sum(alpha_i y_i x_i)`
    pub fn to_linear(&self) -> LinearModel {
        let dim = self
            .support_vectors
            .first()
            .map(|sv| sv.features.len())
            .unwrap_or(0);
        let mut weights = vec![0.0; dim];

        for (sv, &alpha) in self.support_vectors.iter().zip(self.alpha.iter()) {
            let coef = alpha * sv.label;
            for (w, x) in weights.iter_mut().zip(sv.features.iter()) {
                *w += coef * x;
            }
        }

        LinearModel {
            weights,
            bias: self.bias,
            n_support_vectors: self.support_vectors.len(),
        }
    }
}

impl<K: Kernel> SVMModel for TrainedSVM<K> {
    fn decision_function(&self, features: &[f64]) -> f64 {
        let mut result = 0.0;

        for (i, support_vector) in self.support_vectors.iter().enumerate() {
            let kernel_value = self.kernel.compute(features, &support_vector.features);
            result += self.alpha[i] * support_vector.label * kernel_value;
        }

        result + self.bias
    }

    fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    fn bias(&self) -> f64 {
        self.bias
    }
}

/// Linear decision boundary `f(x) = w . x + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub n_support_vectors: usize,
}

impl SVMModel for LinearModel {
    fn decision_function(&self, features: &[f64]) -> f64 {
        dot(&self.weights, features) + self.bias
    }

    fn n_support_vectors(&self) -> usize {
        self.n_support_vectors
    }

    fn bias(&self) -> f64 {
        self.bias
    }
}
