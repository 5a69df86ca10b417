//! Core type definitions for the SVM solver

/// Prediction result containing label and decision value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class label (+1 or -1)
    pub label: f64,
    /// Raw decision function value
    pub decision_value: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }

    /// Label from the sign of the margin (+1 only for a positive margin)
    pub fn from_decision_value(decision_value: f64) -> Self {
        let label = if decision_value > 0.0 { 1.0 } else { -1.0 };
        Self::new(label, decision_value)
    }
}

/// Training sample with a dense feature vector and a binary label
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Feature values, one per column
    pub features: Vec<f64>,
    /// Class label (+1 or -1 for binary classification)
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: Vec<f64>, label: f64) -> Self {
        Self { features, label }
    }

    /// Number of feature columns
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// Whether the label is the positive class
    pub fn is_positive(&self) -> bool {
        self.label > 0.0
    }
}

/// Result of optimization process
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lagrange multipliers (alpha values)
    pub alpha: Vec<f64>,
    /// Bias term (b), the decision function is `sum(alpha_i y_i K(x_i, x)) + b`
    pub b: f64,
    /// Indices of support vectors (where alpha > 0)
    pub support_vectors: Vec<usize>,
    /// Number of iterations performed
    pub iterations: usize,
    /// Final objective value of the dual
    pub objective_value: f64,
    /// Whether the KKT stopping criterion was met before `max_iterations`
    pub converged: bool,
}

/// Strategy for picking the pair of multipliers optimized in each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkingSetStrategy {
    /// Maximal violating pair, first order information only
    MaximalViolatingPair,
    /// Second order selection: maximize the guaranteed objective decrease
    #[default]
    SecondOrder,
}

/// Configuration for optimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Regularization parameter (upper bound for alpha)
    pub c: f64,
    /// Tolerance for the KKT stopping criterion
    pub epsilon: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Kernel cache size in bytes
    pub cache_size: usize,
    /// Working set selection
    pub working_set_strategy: WorkingSetStrategy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.001,
            max_iterations: 100_000,
            cache_size: 100_000_000, // 100MB
            working_set_strategy: WorkingSetStrategy::SecondOrder,
        }
    }
}
