//! Kernel trait definition

/// Kernel function trait
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid for SVM.
/// Feature vectors are dense and must have equal length.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &[f64], y: &[f64]) -> f64;

    /// Compute K(x, x), used for the solver's diagonal
    fn diagonal(&self, x: &[f64]) -> f64 {
        self.compute(x, x)
    }

    /// Short identifier used in logs and model summaries
    fn name(&self) -> &'static str;
}
