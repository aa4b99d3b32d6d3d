//! Network hyperparameters.

use crate::{Error, Init, Result, Scalar};

/// Hyperparameters shared by every training mode.
///
/// `bias`, `weight_init`, `weight_range` and `seed` shape the compiled layers and are
/// locked once the network is compiled. Everything else may change between training runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkConfig<T> {
    pub learning_rate: T,
    pub momentum: T,
    /// Adds a constant-1 input (and one trailing weight per unit) to every layer.
    pub bias: bool,
    /// How `compile` draws the initial weights.
    pub weight_init: Init,
    /// Bound for `Init::Uniform`: weights are drawn from `[-weight_range, weight_range]`.
    pub weight_range: T,
    /// Fisher-Yates shuffle the training rows at the start of every epoch.
    pub shuffle: bool,
    /// Record one cost value per training epoch.
    pub cost_history: bool,
    /// Seed for weight init and shuffling. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl<T: Scalar> Default for NetworkConfig<T> {
    fn default() -> Self {
        Self {
            learning_rate: T::lit(0.01),
            momentum: T::zero(),
            bias: true,
            weight_init: Init::Uniform,
            weight_range: T::one(),
            shuffle: true,
            cost_history: false,
            seed: None,
        }
    }
}

impl<T: Scalar> NetworkConfig<T> {
    pub fn validate(&self) -> Result<()> {
        validate_learning_rate(self.learning_rate)?;
        validate_momentum(self.momentum)?;
        validate_weight_range(self.weight_range)?;
        Ok(())
    }
}

pub(crate) fn validate_learning_rate<T: Scalar>(lr: T) -> Result<()> {
    if !(lr.is_finite() && lr > T::zero()) {
        return Err(Error::InvalidHyperparameter(format!(
            "learning rate must be finite and > 0, got {lr}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_momentum<T: Scalar>(momentum: T) -> Result<()> {
    if !(momentum.is_finite() && momentum >= T::zero()) {
        return Err(Error::InvalidHyperparameter(format!(
            "momentum must be finite and >= 0, got {momentum}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_weight_range<T: Scalar>(range: T) -> Result<()> {
    if !(range.is_finite() && range > T::zero()) {
        return Err(Error::InvalidHyperparameter(format!(
            "weight range must be finite and > 0, got {range}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = NetworkConfig::<f32>::default();
        assert!(cfg.validate().is_ok());
        assert!((cfg.learning_rate - 0.01).abs() < 1e-9);
        assert_eq!(cfg.momentum, 0.0);
        assert!(cfg.bias);
        assert_eq!(cfg.weight_init, Init::Uniform);
        assert!(cfg.shuffle);
        assert!(!cfg.cost_history);
        assert_eq!(cfg.seed, None);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_lr = NetworkConfig::<f64> {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_lr.validate(),
            Err(Error::InvalidHyperparameter(_))
        ));

        let bad_momentum = NetworkConfig::<f64> {
            momentum: -0.1,
            ..Default::default()
        };
        assert!(bad_momentum.validate().is_err());

        let bad_range = NetworkConfig::<f64> {
            weight_range: f64::NAN,
            ..Default::default()
        };
        assert!(bad_range.validate().is_err());
    }
}
