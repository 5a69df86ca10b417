//! Linear kernel implementation

use crate::kernel::Kernel;

/// Linear kernel: K(x, y) = x^T * y
///
/// With a linear kernel the trained model collapses into a single weight
/// vector, see [`crate::optimizer::LinearModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        dot(x, y)
    }

    fn diagonal(&self, x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Dot product of two dense vectors
///
/// Extra trailing entries of the longer vector are ignored.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_kernel_basic() {
        let kernel = LinearKernel::new();

        let x = [1.0, 0.0, 2.0];
        let y = [0.0, 1.0, 2.0];

        // Only the last column overlaps: 2.0 * 2.0 = 4.0
        assert_eq!(kernel.compute(&x, &y), 4.0);
    }

    #[test]
    fn test_linear_kernel_identical() {
        let kernel = LinearKernel::new();
        let x = [1.0, 2.0, 3.0];

        // x^T * x = 1^2 + 2^2 + 3^2 = 14
        assert_eq!(kernel.compute(&x, &x), 14.0);
        assert_eq!(kernel.diagonal(&x), 14.0);
    }

    #[test]
    fn test_linear_kernel_orthogonal() {
        let kernel = LinearKernel::new();
        assert_eq!(kernel.compute(&[1.0, 0.0], &[0.0, 5.0]), 0.0);
    }

    #[test]
    fn test_dot_empty() {
        assert_eq!(dot(&[], &[1.0, 2.0]), 0.0);
        assert_eq!(dot(&[-1.5, 2.0], &[2.0, 0.5]), -2.0);
    }

    #[test]
    fn test_kernel_name() {
        assert_eq!(LinearKernel::new().name(), "linear");
    }
}
