//! Loss functions.
//!
//! Per-sample losses sum over the output units; dataset losses average the per-sample
//! values over the samples. They only read predictions and never take part in
//! backpropagation, which uses the `target - output` error rule directly.

use crate::network::forward_layers;
use crate::{Dataset, Layer, Network, Result, Scalar, Scratch};

/// Guards `ln(0)` in the cross-entropy losses.
const LOG_EPS: f64 = 1e-10;

/// Clamp applied to predictions for binary cross-entropy.
const BCE_CLAMP: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Supported loss functions.
pub enum Loss {
    /// Sum of squared differences.
    Mse,
    /// Sum of absolute differences.
    Mae,
    /// `-sum t * ln(p + 1e-10)`; expects probabilities (Softmax output) and one-hot targets.
    CrossEntropy,
    /// `-sum t ln p + (1 - t) ln(1 - p)`; expects probabilities in `(0, 1)`.
    BinaryCrossEntropy,
}

impl Loss {
    pub fn name(self) -> &'static str {
        match self {
            Loss::Mse => "mse",
            Loss::Mae => "mae",
            Loss::CrossEntropy => "cross-entropy",
            Loss::BinaryCrossEntropy => "binary cross-entropy",
        }
    }

    /// Loss of a single sample.
    ///
    /// Shape contract: `pred.len() == target.len()`.
    #[inline]
    pub fn sample<T: Scalar>(self, pred: &[T], target: &[T]) -> T {
        match self {
            Loss::Mse => squared_error(pred, target),
            Loss::Mae => absolute_error(pred, target),
            Loss::CrossEntropy => cross_entropy(pred, target),
            Loss::BinaryCrossEntropy => binary_cross_entropy(pred, target),
        }
    }
}

#[inline]
fn check_lens<T>(pred: &[T], target: &[T]) {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
}

/// `sum (target - pred)^2` over the outputs of one sample.
#[inline]
pub fn squared_error<T: Scalar>(pred: &[T], target: &[T]) -> T {
    check_lens(pred, target);
    pred.iter().zip(target).fold(T::zero(), |acc, (&p, &t)| {
        let diff = t - p;
        acc + diff * diff
    })
}

/// `sum |target - pred|` over the outputs of one sample.
#[inline]
pub fn absolute_error<T: Scalar>(pred: &[T], target: &[T]) -> T {
    check_lens(pred, target);
    pred.iter()
        .zip(target)
        .fold(T::zero(), |acc, (&p, &t)| acc + (t - p).abs())
}

#[inline]
pub fn cross_entropy<T: Scalar>(pred: &[T], target: &[T]) -> T {
    check_lens(pred, target);
    let eps = T::lit(LOG_EPS);
    pred.iter()
        .zip(target)
        .fold(T::zero(), |acc, (&p, &t)| acc - t * (p + eps).ln())
}

/// Binary cross-entropy. Predictions are clamped to `[1e-7, 1 - 1e-7]` so saturated
/// outputs stay finite.
#[inline]
pub fn binary_cross_entropy<T: Scalar>(pred: &[T], target: &[T]) -> T {
    check_lens(pred, target);
    let lo = T::lit(BCE_CLAMP);
    let hi = T::one() - lo;
    pred.iter().zip(target).fold(T::zero(), |acc, (&p, &t)| {
        let p = p.max(lo).min(hi);
        acc - (t * p.ln() + (T::one() - t) * (T::one() - p).ln())
    })
}

/// Mean per-sample loss over `data`, reusing `scratch`. No shape checks.
pub(crate) fn dataset_loss<T: Scalar>(
    layers: &[Layer<T>],
    data: &Dataset<T>,
    scratch: &mut Scratch<T>,
    loss: Loss,
) -> T {
    let mut total = T::zero();
    for idx in 0..data.len() {
        forward_layers(layers, data.input(idx), scratch);
        total = total + loss.sample(scratch.output(), data.target(idx));
    }
    total / T::from(data.len()).unwrap_or_else(T::one)
}

impl<T: Scalar> Network<T> {
    /// Mean loss over `data`.
    pub fn loss(&self, data: &Dataset<T>, loss: Loss) -> Result<T> {
        let layers = self.check_dataset(data)?;
        let mut scratch = Scratch::for_layers(layers);
        Ok(dataset_loss(layers, data, &mut scratch, loss))
    }

    /// Cost tracked in the training history: cross-entropy for a Softmax output,
    /// MSE otherwise.
    pub(crate) fn history_loss(&self) -> Loss {
        match self.activations().last() {
            Some(act) if *act == crate::Activation::Softmax => Loss::CrossEntropy,
            _ => Loss::Mse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_error_sums_over_outputs() {
        let pred = [1.0_f32, 3.0];
        let target = [2.0_f32, 1.0];
        assert!((squared_error(&pred, &target) - 5.0).abs() < 1e-6);
        assert_eq!(squared_error(&pred, &pred), 0.0);
    }

    #[test]
    fn absolute_error_sums_over_outputs() {
        let pred = [1.0_f64, 3.0, -1.0];
        let target = [2.0_f64, 1.0, -1.0];
        assert!((absolute_error(&pred, &target) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cross_entropy_prefers_correct_class() {
        let target = [1.0_f64, 0.0, 0.0];
        let good = cross_entropy(&[0.8, 0.1, 0.1], &target);
        let bad = cross_entropy(&[0.1, 0.1, 0.8], &target);
        assert!(good < bad);
        assert!((good - -(0.8_f64 + 1e-10).ln()).abs() < 1e-12);

        // A zero probability on the true class stays finite.
        assert!(cross_entropy(&[0.0, 1.0, 0.0], &target).is_finite());
    }

    #[test]
    fn binary_cross_entropy_is_finite_for_saturated_outputs() {
        let loss = binary_cross_entropy(&[1.0_f32, 0.0], &[1.0, 0.0]);
        assert!(loss.is_finite());
        assert!(loss < 1e-3);

        let half = binary_cross_entropy(&[0.5_f64], &[1.0]);
        assert!((half - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn network_loss_averages_over_samples() {
        let mut net = Network::<f64>::new(&[1, 1, 1]).unwrap();
        net.set_seed(0).unwrap();
        net.set_activations(crate::Activation::Linear).unwrap();
        net.compile().unwrap();
        for layer in net.layers_mut().unwrap() {
            layer.units_mut()[0].weights_mut().copy_from_slice(&[1.0, 0.0]);
        }

        // identity network: pred == input
        let data = Dataset::from_flat(vec![1.0, 2.0], vec![0.0, 0.0], 1, 1).unwrap();
        assert!((net.loss(&data, Loss::Mse).unwrap() - 2.5).abs() < 1e-12);
        assert!((net.loss(&data, Loss::Mae).unwrap() - 1.5).abs() < 1e-12);

        let wrong = Dataset::from_flat(vec![1.0, 2.0], vec![0.0, 0.0, 0.0, 0.0], 1, 2).unwrap();
        assert!(net.loss(&wrong, Loss::Mse).is_err());
    }
}
