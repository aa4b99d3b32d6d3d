use rand::Rng;

use crate::config::validate_weight_range;
use crate::{Result, Scalar};

/// A trainable unit: its incoming weights and the optimizer state kept per weight.
///
/// When the owning layer has a bias input, the bias weight is the last entry of
/// `weights`. All four vectors always have the same length (the layer's fan-in).
#[derive(Debug, Clone, PartialEq)]
pub struct Unit<T> {
    pub(crate) weights: Vec<T>,
    pub(crate) momentum: Vec<T>,
    pub(crate) accum_grad: Vec<T>,
    pub(crate) second_moment: Vec<T>,
}

impl<T: Scalar> Unit<T> {
    /// Unit with `fan_in` weights drawn uniformly from `[-range, range]`.
    ///
    /// `range` must be finite and positive.
    pub fn new_with_rng<R: Rng + ?Sized>(fan_in: usize, range: T, rng: &mut R) -> Result<Self> {
        validate_weight_range(range)?;
        let weights = (0..fan_in).map(|_| rng.gen_range(-range..=range)).collect();
        Ok(Self::from_weights(weights))
    }

    /// Unit with the given weights and zeroed optimizer state.
    pub fn from_weights(weights: Vec<T>) -> Self {
        let n = weights.len();
        Self {
            weights,
            momentum: vec![T::zero(); n],
            accum_grad: vec![T::zero(); n],
            second_moment: vec![T::zero(); n],
        }
    }

    #[inline]
    pub fn fan_in(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [T] {
        &mut self.weights
    }

    /// First-moment / velocity buffer (SGD momentum, Adam `m`).
    #[inline]
    pub fn momentum(&self) -> &[T] {
        &self.momentum
    }

    /// Accumulated squared gradient (AdaGrad, RMSProp).
    #[inline]
    pub fn accum_grad(&self) -> &[T] {
        &self.accum_grad
    }

    /// Second-moment estimate (Adam/Nadam `v`).
    #[inline]
    pub fn second_moment(&self) -> &[T] {
        &self.second_moment
    }

    pub(crate) fn reset_state(&mut self) {
        self.momentum.fill(T::zero());
        self.accum_grad.fill(T::zero());
        self.second_moment.fill(T::zero());
    }

    /// Weighted sum of `inputs` plus the bias weight (if any) times 1.
    ///
    /// `inputs.len()` is either `fan_in` (no bias) or `fan_in - 1` (bias is the last weight).
    #[inline]
    pub fn weighted_sum(&self, inputs: &[T]) -> T {
        debug_assert!(inputs.len() == self.weights.len() || inputs.len() + 1 == self.weights.len());

        let mut sum = T::zero();
        for (&w, &x) in self.weights.iter().zip(inputs) {
            sum = sum + w * x;
        }
        if self.weights.len() > inputs.len() {
            sum = sum + self.weights[inputs.len()];
        }
        sum
    }
}
