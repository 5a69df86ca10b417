//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the C-SVC dual
//!
//! ```text
//! min_a  0.5 * a^T Q a - e^T a
//! s.t.   y^T a = 0,  0 <= a_i <= C,  Q_ij = y_i y_j K(x_i, x_j)
//! ```
//!
//! two multipliers at a time. The solver keeps the full gradient
//! `G = Q a - e` and selects each pair from it, either as the maximal
//! violating pair or with second order information (Fan, Chen & Lin, 2005).

use crate::cache::{KernelCache, KernelRow};
use crate::core::{
    OptimizationResult, OptimizerConfig, Result, RiskError, Sample, WorkingSetStrategy,
};
use crate::kernel::Kernel;
use log::{debug, warn};
use std::sync::Arc;

/// Replacement for a non-positive curvature along the chosen direction
const TAU: f64 = 1e-12;

/// SMO solver for SVM optimization
pub struct SMOSolver<K: Kernel> {
    kernel: Arc<K>,
    config: OptimizerConfig,
}

impl<K: Kernel> SMOSolver<K> {
    /// Create a new SMO solver with the given kernel and configuration
    pub fn new(kernel: Arc<K>, config: OptimizerConfig) -> Self {
        Self { kernel, config }
    }

    /// Solve the SVM optimization problem
    pub fn solve(&self, samples: &[Sample]) -> Result<OptimizationResult> {
        let mut cache = KernelCache::with_memory_limit(self.config.cache_size, samples.len());
        self.solve_with_cache(samples, &mut cache)
    }

    /// Solve the SVM optimization problem with a caller provided kernel cache
    ///
    /// The cache is keyed by sample index, so it must only be shared between
    /// calls on the same sample slice.
    pub fn solve_with_cache(
        &self,
        samples: &[Sample],
        cache: &mut KernelCache,
    ) -> Result<OptimizationResult> {
        self.validate(samples)?;

        let n = samples.len();
        let y: Vec<f64> = samples.iter().map(|s| s.label).collect();
        let diag: Vec<f64> = samples
            .iter()
            .map(|s| self.kernel.diagonal(&s.features))
            .collect();

        let mut alpha = vec![0.0; n];
        // With all alphas at zero, G = -e
        let mut grad = vec![-1.0; n];

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let Some((i, j)) = self.select_working_set(samples, &y, &alpha, &grad, &diag, cache)
            else {
                converged = true;
                break;
            };

            iterations += 1;
            self.take_step(i, j, samples, &y, &diag, &mut alpha, &mut grad, cache);
        }

        if converged {
            debug!("SMO converged after {iterations} iterations on {n} samples");
        } else {
            warn!(
                "SMO stopped at max_iterations={} without reaching tolerance {}",
                self.config.max_iterations, self.config.epsilon
            );
        }

        let b = -self.calculate_rho(&y, &alpha, &grad);

        let support_vectors: Vec<usize> = alpha
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| if a > 0.0 { Some(i) } else { None })
            .collect();

        // Dual objective: e^T a - 0.5 a^T Q a = -0.5 * sum(a_i * (G_i - 1))
        let objective_value = -0.5
            * alpha
                .iter()
                .zip(grad.iter())
                .map(|(a, g)| a * (g - 1.0))
                .sum::<f64>();

        let stats = cache.stats();
        debug!(
            "kernel cache: {} hits, {} misses, {} rows resident",
            stats.hits, stats.misses, stats.size
        );

        Ok(OptimizationResult {
            alpha,
            b,
            support_vectors,
            iterations,
            objective_value,
            converged,
        })
    }

    fn validate(&self, samples: &[Sample]) -> Result<()> {
        if samples.is_empty() {
            return Err(RiskError::EmptyDataset);
        }
        if !(self.config.c > 0.0 && self.config.c.is_finite()) {
            return Err(RiskError::InvalidParameter(format!(
                "C must be positive and finite, got {}",
                self.config.c
            )));
        }
        if !(self.config.epsilon > 0.0) {
            return Err(RiskError::InvalidParameter(format!(
                "epsilon must be positive, got {}",
                self.config.epsilon
            )));
        }

        let dim = samples[0].dim();
        let mut positives = 0;
        for sample in samples {
            // Labels must be binary (-1 or +1)
            if sample.label != 1.0 && sample.label != -1.0 {
                return Err(RiskError::InvalidLabel(sample.label));
            }
            if sample.dim() != dim {
                return Err(RiskError::DimensionMismatch {
                    expected: dim,
                    actual: sample.dim(),
                });
            }
            if sample.features.iter().any(|v| !v.is_finite()) {
                return Err(RiskError::InvalidDataset(
                    "feature values must be finite".to_string(),
                ));
            }
            if sample.is_positive() {
                positives += 1;
            }
        }

        if positives == 0 || positives == samples.len() {
            return Err(RiskError::InvalidDataset(
                "training samples contain a single class".to_string(),
            ));
        }

        Ok(())
    }

    fn kernel_row(&self, i: usize, samples: &[Sample], cache: &mut KernelCache) -> KernelRow {
        cache.get_or_compute(i, || {
            let x_i = &samples[i].features;
            samples
                .iter()
                .map(|s| self.kernel.compute(x_i, &s.features))
                .collect()
        })
    }

    /// Pick the next pair of multipliers, or `None` once the KKT conditions
    /// hold within `epsilon`
    fn select_working_set(
        &self,
        samples: &[Sample],
        y: &[f64],
        alpha: &[f64],
        grad: &[f64],
        diag: &[f64],
        cache: &mut KernelCache,
    ) -> Option<(usize, usize)> {
        let c = self.config.c;

        // i = argmax { -y_t G_t : t in I_up }
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        for t in 0..y.len() {
            let candidate = if y[t] > 0.0 {
                (alpha[t] < c).then_some(-grad[t])
            } else {
                (alpha[t] > 0.0).then_some(grad[t])
            };
            if let Some(value) = candidate {
                if value >= gmax {
                    gmax = value;
                    gmax_idx = Some(t);
                }
            }
        }
        let i = gmax_idx?;

        match self.config.working_set_strategy {
            WorkingSetStrategy::MaximalViolatingPair => {
                // j = argmin { -y_t G_t : t in I_low }
                let mut gmax2 = f64::NEG_INFINITY;
                let mut gmin_idx = None;
                for t in 0..y.len() {
                    let candidate = if y[t] > 0.0 {
                        (alpha[t] > 0.0).then_some(grad[t])
                    } else {
                        (alpha[t] < c).then_some(-grad[t])
                    };
                    if let Some(value) = candidate {
                        if value >= gmax2 {
                            gmax2 = value;
                            gmin_idx = Some(t);
                        }
                    }
                }
                if gmax + gmax2 < self.config.epsilon {
                    return None;
                }
                gmin_idx.map(|j| (i, j))
            }
            WorkingSetStrategy::SecondOrder => {
                let k_i = self.kernel_row(i, samples, cache);
                let mut gmax2 = f64::NEG_INFINITY;
                let mut gmin_idx = None;
                let mut obj_diff_min = f64::INFINITY;

                for t in 0..y.len() {
                    let (in_low, value) = if y[t] > 0.0 {
                        (alpha[t] > 0.0, grad[t])
                    } else {
                        (alpha[t] < c, -grad[t])
                    };
                    if !in_low {
                        continue;
                    }
                    if value >= gmax2 {
                        gmax2 = value;
                    }

                    let grad_diff = gmax + value;
                    if grad_diff > 0.0 {
                        // ||x_i - x_t||^2 in feature space
                        let quad = diag[i] + diag[t] - 2.0 * k_i[t];
                        let obj_diff = if quad > 0.0 {
                            -(grad_diff * grad_diff) / quad
                        } else {
                            -(grad_diff * grad_diff) / TAU
                        };
                        if obj_diff <= obj_diff_min {
                            obj_diff_min = obj_diff;
                            gmin_idx = Some(t);
                        }
                    }
                }

                if gmax + gmax2 < self.config.epsilon {
                    return None;
                }
                gmin_idx.map(|j| (i, j))
            }
        }
    }

    /// Analytically optimize the pair (i, j) and update the gradient
    #[allow(clippy::too_many_arguments)]
    fn take_step(
        &self,
        i: usize,
        j: usize,
        samples: &[Sample],
        y: &[f64],
        diag: &[f64],
        alpha: &mut [f64],
        grad: &mut [f64],
        cache: &mut KernelCache,
    ) {
        let c = self.config.c;
        let k_i = self.kernel_row(i, samples, cache);
        let k_j = self.kernel_row(j, samples, cache);

        let alpha_i_old = alpha[i];
        let alpha_j_old = alpha[j];

        let mut quad = diag[i] + diag[j] - 2.0 * k_i[j];
        if quad <= 0.0 {
            quad = TAU;
        }

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let delta_alpha_i = alpha[i] - alpha_i_old;
        let delta_alpha_j = alpha[j] - alpha_j_old;

        // G_t += Q_ti * da_i + Q_tj * da_j
        for t in 0..grad.len() {
            grad[t] += y[t] * (y[i] * k_i[t] * delta_alpha_i + y[j] * k_j[t] * delta_alpha_j);
        }
    }

    /// Threshold rho of the decision function `sum(a_i y_i K(x_i, x)) - rho`
    fn calculate_rho(&self, y: &[f64], alpha: &[f64], grad: &[f64]) -> f64 {
        let c = self.config.c;
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut sum_free = 0.0;
        let mut n_free = 0usize;

        for t in 0..y.len() {
            let yg = y[t] * grad[t];
            if alpha[t] >= c {
                if y[t] < 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else if alpha[t] <= 0.0 {
                if y[t] > 0.0 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                n_free += 1;
                sum_free += yg;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (upper + lower) / 2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::LinearKernel;
    use approx::assert_abs_diff_eq;

    fn solver_with(config: OptimizerConfig) -> SMOSolver<LinearKernel> {
        SMOSolver::new(Arc::new(LinearKernel::new()), config)
    }

    fn decision(result: &OptimizationResult, samples: &[Sample], x: &[f64]) -> f64 {
        let kernel = LinearKernel::new();
        samples
            .iter()
            .zip(result.alpha.iter())
            .map(|(s, a)| a * s.label * kernel.compute(&s.features, x))
            .sum::<f64>()
            + result.b
    }

    #[test]
    fn test_smo_solver_empty_dataset() {
        let solver = solver_with(OptimizerConfig::default());
        let result = solver.solve(&[]);
        assert!(matches!(result, Err(RiskError::EmptyDataset)));
    }

    #[test]
    fn test_smo_solver_invalid_labels() {
        let solver = solver_with(OptimizerConfig::default());
        let samples = vec![
            Sample::new(vec![1.0], 1.0),
            Sample::new(vec![-1.0], 0.5), // Invalid label
        ];
        let result = solver.solve(&samples);
        assert!(matches!(result, Err(RiskError::InvalidLabel(l)) if l == 0.5));
    }

    #[test]
    fn test_smo_solver_single_class() {
        let solver = solver_with(OptimizerConfig::default());
        let samples = vec![Sample::new(vec![1.0], 1.0), Sample::new(vec![2.0], 1.0)];
        let result = solver.solve(&samples);
        assert!(matches!(result, Err(RiskError::InvalidDataset(_))));
    }

    #[test]
    fn test_smo_solver_dimension_mismatch() {
        let solver = solver_with(OptimizerConfig::default());
        let samples = vec![
            Sample::new(vec![1.0, 0.0], 1.0),
            Sample::new(vec![-1.0], -1.0),
        ];
        let result = solver.solve(&samples);
        assert!(matches!(
            result,
            Err(RiskError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_smo_solver_rejects_bad_parameters() {
        let samples = vec![Sample::new(vec![1.0], 1.0), Sample::new(vec![-1.0], -1.0)];

        let mut config = OptimizerConfig::default();
        config.c = 0.0;
        assert!(matches!(
            solver_with(config).solve(&samples),
            Err(RiskError::InvalidParameter(_))
        ));

        let mut config = OptimizerConfig::default();
        config.epsilon = 0.0;
        assert!(matches!(
            solver_with(config).solve(&samples),
            Err(RiskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_smo_solver_two_points_exact_solution() {
        let solver = solver_with(OptimizerConfig::default());

        // Positive at 2, negative at -2: w = 0.5, b = 0, alpha = 1/8 each
        let samples = vec![Sample::new(vec![2.0], 1.0), Sample::new(vec![-2.0], -1.0)];
        let result = solver.solve(&samples).expect("Should solve successfully");

        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.support_vectors, vec![0, 1]);
        assert_abs_diff_eq!(result.alpha[0], 0.125, epsilon = 1e-9);
        assert_abs_diff_eq!(result.alpha[1], 0.125, epsilon = 1e-9);
        assert_abs_diff_eq!(result.b, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.objective_value, 0.125, epsilon = 1e-9);
        assert_abs_diff_eq!(decision(&result, &samples, &[2.0]), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_smo_solver_linearly_separable() {
        let solver = solver_with(OptimizerConfig::default());

        let samples = vec![
            Sample::new(vec![2.0, 1.0], 1.0),
            Sample::new(vec![1.8, 1.1], 1.0),
            Sample::new(vec![2.2, 0.9], 1.0),
            Sample::new(vec![-2.0, -1.0], -1.0),
            Sample::new(vec![-1.8, -1.1], -1.0),
            Sample::new(vec![-2.2, -0.9], -1.0),
        ];
        let result = solver.solve(&samples).expect("Should solve");

        assert!(result.converged);
        assert!(!result.support_vectors.is_empty());
        for sample in &samples {
            let f = decision(&result, &samples, &sample.features);
            assert_eq!(f.signum(), sample.label);
        }
    }

    #[test]
    fn test_smo_solver_respects_box_and_equality_constraints() {
        let mut config = OptimizerConfig::default();
        config.c = 0.5;
        let solver = solver_with(config);

        // Overlapping classes force some multipliers to the upper bound
        let samples = vec![
            Sample::new(vec![2.0], 1.0),
            Sample::new(vec![-2.0], -1.0),
            Sample::new(vec![1.0], -1.0),
            Sample::new(vec![-1.0], 1.0),
            Sample::new(vec![0.5], 1.0),
            Sample::new(vec![-0.5], -1.0),
        ];
        let result = solver.solve(&samples).expect("Should solve");

        assert!(result.converged);
        assert!(result.alpha.iter().all(|&a| (0.0..=0.5).contains(&a)));
        let balance: f64 = result
            .alpha
            .iter()
            .zip(samples.iter())
            .map(|(a, s)| a * s.label)
            .sum();
        assert_abs_diff_eq!(balance, 0.0, epsilon = 1e-9);
        assert!(result.b.is_finite());
    }

    #[test]
    fn test_smo_solver_max_iterations() {
        let mut config = OptimizerConfig::default();
        config.max_iterations = 1; // Force early termination
        config.epsilon = 1e-6;
        let solver = solver_with(config);

        let samples = vec![
            Sample::new(vec![2.0], 1.0),
            Sample::new(vec![-2.0], -1.0),
            Sample::new(vec![1.0], -1.0),
            Sample::new(vec![-1.0], 1.0),
            Sample::new(vec![0.5], 1.0),
            Sample::new(vec![-0.5], -1.0),
        ];
        let result = solver.solve(&samples).expect("Should solve");

        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_working_set_strategies_agree() {
        let samples = vec![
            Sample::new(vec![3.0, 0.5], 1.0),
            Sample::new(vec![-3.0, 0.2], -1.0),
            Sample::new(vec![2.5, -0.4], 1.0),
            Sample::new(vec![-2.5, 0.1], -1.0),
            Sample::new(vec![0.3, 0.9], -1.0),
            Sample::new(vec![-0.2, -0.8], 1.0),
        ];

        let objectives: Vec<f64> = [
            WorkingSetStrategy::MaximalViolatingPair,
            WorkingSetStrategy::SecondOrder,
        ]
        .iter()
        .map(|&strategy| {
            let mut config = OptimizerConfig::default();
            config.working_set_strategy = strategy;
            let result = solver_with(config).solve(&samples).expect("Should solve");
            assert!(result.converged, "{strategy:?} did not converge");
            assert!(result.objective_value >= 0.0);
            result.objective_value
        })
        .collect();

        assert_abs_diff_eq!(objectives[0], objectives[1], epsilon = 1e-2);
    }

    #[test]
    fn test_solve_with_shared_cache_is_reused() {
        let solver = solver_with(OptimizerConfig::default());
        let samples = vec![
            Sample::new(vec![1.0], 1.0),
            Sample::new(vec![-1.0], -1.0),
            Sample::new(vec![0.5], 1.0),
            Sample::new(vec![-0.5], -1.0),
        ];
        let mut cache = KernelCache::new(16);

        let first = solver.solve_with_cache(&samples, &mut cache).expect("Should solve");
        let misses_after_first = cache.stats().misses;
        let second = solver.solve_with_cache(&samples, &mut cache).expect("Should solve");

        assert_eq!(first.alpha, second.alpha);
        assert_eq!(cache.stats().misses, misses_after_first);
        assert!(cache.stats().hits > 0);
    }

    #[test]
    fn test_identical_features_different_labels() {
        let solver = solver_with(OptimizerConfig::default());

        let samples = vec![
            Sample::new(vec![1.0], 1.0),
            Sample::new(vec![1.0], -1.0), // Same features, different label
            Sample::new(vec![2.0], 1.0),
            Sample::new(vec![-2.0], -1.0),
        ];
        let result = solver.solve(&samples).expect("Should solve");

        assert_eq!(result.alpha.len(), 4);
        assert!(result.objective_value.is_finite());
    }
}
