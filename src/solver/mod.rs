//! SVM solver implementations
//!
//! This module implements the Sequential Minimal Optimization (SMO) algorithm
//! with maximal-violating-pair and second order working set selection.

pub mod smo;

pub use self::smo::*;
