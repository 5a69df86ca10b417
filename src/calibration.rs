//! Probability calibration for SVM decision values
//!
//! Platt scaling maps a raw margin `f` to `P(y = +1 | f) = 1 / (1 + exp(A f))`.
//! The sigmoid is anchored at the decision boundary, so `P = 0.5` exactly
//! where the classifier switches label, and `A` is kept strictly negative so
//! the probability rises with the margin. `A` is fit by Newton's method with
//! a backtracking line search on regularized targets (Lin, Lin & Weng, 2007).
//! To avoid fitting the sigmoid on margins the SVM has already overfit, the
//! decision values come from k-fold cross validation over the training
//! partition.

use crate::core::{Result, RiskError, SVMModel, Sample};
use crate::kernel::Kernel;
use crate::optimizer::SVMOptimizer;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
const SIGMA: f64 = 1e-12;
const GRADIENT_TOLERANCE: f64 = 1e-5;

/// Flattest slope a fit may return
pub const MIN_SLOPE: f64 = 1e-3;

/// Platt scaling anchored at the boundary: p = 1 / (1 + exp(a * f)), a < 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
}

impl PlattScaling {
    /// Fit the sigmoid slope to decision values and their true labels
    /// (`true` is the positive class).
    ///
    /// When the margins do not rise with the labels the slope is clamped to
    /// `-MIN_SLOPE`, which keeps probabilities near 0.5 on the label the
    /// margin picks.
    pub fn fit(decision_values: &[f64], labels: &[bool]) -> Result<Self> {
        if decision_values.len() != labels.len() {
            return Err(RiskError::DimensionMismatch {
                expected: decision_values.len(),
                actual: labels.len(),
            });
        }
        if decision_values.is_empty() {
            return Err(RiskError::EmptyDataset);
        }

        let prior1 = labels.iter().filter(|&&l| l).count() as f64;
        let prior0 = labels.len() as f64 - prior1;

        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&l| if l { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut fval = log_loss(decision_values, &targets, a);

        let mut iteration = 0;
        while iteration < MAX_ITERATIONS {
            // First and second derivative (with a small ridge)
            let mut h = SIGMA;
            let mut g = 0.0;
            for (&f, &t) in decision_values.iter().zip(targets.iter()) {
                let (p, q) = split_sigmoid(f * a);
                h += f * f * p * q;
                g += f * (t - p);
            }

            if g.abs() < GRADIENT_TOLERANCE {
                break;
            }

            let da = -g / h;
            let gd = g * da;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * da;
                let new_f = log_loss(decision_values, &targets, new_a);
                if new_f < fval + 0.0001 * step * gd {
                    a = new_a;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                warn!("Platt scaling line search failed at iteration {iteration}");
                break;
            }
            iteration += 1;
        }

        if iteration >= MAX_ITERATIONS {
            warn!("Platt scaling reached the maximum of {MAX_ITERATIONS} iterations");
        }
        debug!("Platt scaling fit: A={a:.6} after {iteration} iterations");

        // The loss is convex in `a`, so clamping gives the constrained optimum
        Ok(Self {
            a: a.min(-MIN_SLOPE),
        })
    }

    /// Whether the fit hit the slope constraint
    pub fn is_flat(&self) -> bool {
        self.a >= -MIN_SLOPE
    }

    /// Probability of the positive class for a decision value
    pub fn probability(&self, decision_value: f64) -> f64 {
        split_sigmoid(decision_value * self.a).0
    }
}

/// Returns (p, 1 - p) for p = 1 / (1 + exp(z)), computed stably
fn split_sigmoid(z: f64) -> (f64, f64) {
    if z >= 0.0 {
        let e = (-z).exp();
        (e / (1.0 + e), 1.0 / (1.0 + e))
    } else {
        let e = z.exp();
        (1.0 / (1.0 + e), e / (1.0 + e))
    }
}

/// Cross entropy of the sigmoid against the regularized targets
fn log_loss(decision_values: &[f64], targets: &[f64], a: f64) -> f64 {
    decision_values
        .iter()
        .zip(targets.iter())
        .map(|(&f, &t)| {
            let z = f * a;
            if z >= 0.0 {
                t * z + (1.0 + (-z).exp()).ln()
            } else {
                (t - 1.0) * z + (1.0 + z.exp()).ln()
            }
        })
        .sum()
}

/// Decision values for every sample, each produced by a model that did not
/// see that sample during training
///
/// Samples are shuffled with `seed` and cut into `folds` contiguous folds. A
/// fold whose complement holds a single class gets a constant +1/-1 margin.
pub fn cross_validated_decision_values<K: Kernel>(
    optimizer: &SVMOptimizer<K>,
    samples: &[Sample],
    folds: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    let n = samples.len();
    if folds < 2 || folds > n {
        return Err(RiskError::InvalidParameter(format!(
            "calibration needs 2 <= folds <= {n}, got {folds}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut decision_values = vec![0.0; n];
    for fold in 0..folds {
        let start = fold * n / folds;
        let end = (fold + 1) * n / folds;
        let held_out = &order[start..end];

        let training: Vec<Sample> = order[..start]
            .iter()
            .chain(order[end..].iter())
            .map(|&i| samples[i].clone())
            .collect();
        let positives = training.iter().filter(|s| s.is_positive()).count();

        let constant = if positives == training.len() {
            Some(1.0)
        } else if positives == 0 {
            Some(-1.0)
        } else {
            None
        };

        if let Some(value) = constant {
            debug!("calibration fold {fold} trains on a single class, using margin {value}");
            for &i in held_out {
                decision_values[i] = value;
            }
            continue;
        }

        let model = optimizer.train_samples(&training)?;
        if !model.converged() {
            return Err(RiskError::OptimizationError(format!(
                "calibration fold {fold} did not converge within {} iterations",
                optimizer.config().max_iterations
            )));
        }
        for &i in held_out {
            decision_values[i] = model.decision_function(&samples[i].features);
        }
    }

    Ok(decision_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptimizerConfig;
    use crate::kernel::LinearKernel;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_probability_is_monotone_for_negative_a() {
        let platt = PlattScaling { a: -2.0 };
        assert_abs_diff_eq!(platt.probability(0.0), 0.5, epsilon = 1e-12);
        assert!(platt.probability(1.0) > platt.probability(0.5));
        assert!(platt.probability(-1.0) < 0.5);
    }

    #[test]
    fn test_probability_extremes_do_not_overflow() {
        let platt = PlattScaling { a: -3.0 };
        let high = platt.probability(1e6);
        let low = platt.probability(-1e6);
        assert!(high.is_finite() && (0.0..=1.0).contains(&high));
        assert!(low.is_finite() && (0.0..=1.0).contains(&low));
        assert!(high > 0.99);
        assert!(low < 0.01);
    }

    #[test]
    fn test_fit_separates_classes() {
        let decision_values = vec![-2.0, -1.5, -1.0, -0.2, 0.3, 1.0, 1.4, 2.2];
        let labels = vec![false, false, false, true, false, true, true, true];

        let platt = PlattScaling::fit(&decision_values, &labels).expect("fit");

        assert!(platt.a < -MIN_SLOPE, "positive margins must map to high probability");
        assert!(!platt.is_flat());
        assert!(platt.probability(2.0) > 0.8);
        assert!(platt.probability(-2.0) < 0.2);
    }

    #[test]
    fn test_fit_uninformative_scores_stay_at_boundary() {
        let decision_values = vec![0.0; 10];
        let labels = vec![true, true, true, false, false, false, false, false, false, false];

        let platt = PlattScaling::fit(&decision_values, &labels).expect("fit");

        assert!(platt.is_flat());
        assert_eq!(platt.a, -MIN_SLOPE);
        assert_abs_diff_eq!(platt.probability(0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_clamps_inverted_scores() {
        // Margins point the wrong way: the slope must not flip sign
        let decision_values = vec![1.5, 1.0, 0.4, -0.3, -1.2, -2.0];
        let labels = vec![false, false, false, true, true, true];

        let platt = PlattScaling::fit(&decision_values, &labels).expect("fit");

        assert!(platt.is_flat());
        assert!(platt.probability(1.5) > 0.5);
        assert!(platt.probability(-2.0) < 0.5);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(matches!(
            PlattScaling::fit(&[], &[]),
            Err(RiskError::EmptyDataset)
        ));
        assert!(matches!(
            PlattScaling::fit(&[1.0, 2.0], &[true]),
            Err(RiskError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_cross_validated_values_are_deterministic() {
        let samples: Vec<Sample> = (0..20)
            .map(|i| {
                let x = i as f64 - 9.5;
                let label = if (x > 0.0) ^ (i % 7 == 0) { 1.0 } else { -1.0 };
                Sample::new(vec![x, (i % 3) as f64], label)
            })
            .collect();
        let optimizer = SVMOptimizer::with_kernel(LinearKernel::new());

        let first = cross_validated_decision_values(&optimizer, &samples, 5, 7).expect("cv");
        let second = cross_validated_decision_values(&optimizer, &samples, 5, 7).expect("cv");

        assert_eq!(first.len(), samples.len());
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cross_validated_values_reject_bad_fold_count() {
        let samples = vec![Sample::new(vec![1.0], 1.0), Sample::new(vec![-1.0], -1.0)];
        let optimizer = SVMOptimizer::with_kernel(LinearKernel::new());

        assert!(cross_validated_decision_values(&optimizer, &samples, 1, 0).is_err());
        assert!(cross_validated_decision_values(&optimizer, &samples, 3, 0).is_err());
    }

    #[test]
    fn test_unconverged_fold_is_an_error() {
        let samples: Vec<Sample> = (0..30)
            .map(|i| {
                let x = i as f64 / 3.0 - 5.0;
                let label = if (x > 0.0) ^ (i % 4 == 0) { 1.0 } else { -1.0 };
                Sample::new(vec![x, (i % 5) as f64 - 2.0], label)
            })
            .collect();
        let config = OptimizerConfig {
            max_iterations: 1,
            ..OptimizerConfig::default()
        };
        let optimizer = SVMOptimizer::new(LinearKernel::new(), config);

        let result = cross_validated_decision_values(&optimizer, &samples, 3, 0);
        assert!(matches!(result, Err(RiskError::OptimizationError(_))));
    }

    #[test]
    fn test_single_class_fold_gets_constant_margin() {
        // Two folds: whichever fold holds the lone negative leaves only positives
        let samples = vec![
            Sample::new(vec![1.0], 1.0),
            Sample::new(vec![2.0], 1.0),
            Sample::new(vec![-1.0], -1.0),
            Sample::new(vec![3.0], 1.0),
        ];
        let optimizer = SVMOptimizer::with_kernel(LinearKernel::new());

        let values = cross_validated_decision_values(&optimizer, &samples, 2, 1).expect("cv");
        assert_eq!(values[2], 1.0);
    }
}
