//! Kernel functions used by the solver
//!
//! Only the linear kernel is shipped; the trait is the seam the solver and
//! the trained model are generic over.

pub mod linear;
pub mod traits;

pub use self::linear::*;
pub use self::traits::*;
