//! Numeric element type.
//!
//! The engine is generic over its floating point type. `f32` is the default
//! everywhere; `f64` is available when training needs the extra precision
//! (e.g. finite-difference gradients).

use std::fmt;

use num_traits::Float;
use rand::distributions::uniform::SampleUniform;

/// Floating point type usable for weights, activations and gradients.
pub trait Scalar:
    Float + SampleUniform + Default + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Converts an `f64` constant (hyperparameter defaults, persisted values).
    fn lit(v: f64) -> Self;

    /// Widens to `f64` (persistence, reporting).
    fn as_f64(self) -> f64;
}

impl Scalar for f32 {
    #[inline]
    fn lit(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Scalar for f64 {
    #[inline]
    fn lit(v: f64) -> Self {
        v
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
