use rand::Rng;

use crate::config::validate_weight_range;
use crate::{Activation, Error, Result, Scalar, Unit};

/// Weight initialization scheme applied at compile time.
///
/// Every scheme draws uniformly from `[-limit, limit]`; they differ in the limit.
/// `fan_in` counts the bias weight when the layer has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Init {
    /// `limit = weight_range`.
    #[default]
    Uniform,
    /// `limit = sqrt(6 / fan_in)`, for ReLU-like activations.
    He,
    /// `limit = sqrt(3 / fan_in)`, unit variance for tanh/sigmoid/SELU-style layers.
    LeCun,
}

impl Init {
    /// Select a scheme by code: 1 uniform, 2 He, 3 LeCun.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Init::Uniform),
            2 => Ok(Init::He),
            3 => Ok(Init::LeCun),
            _ => Err(Error::InvalidHyperparameter(format!(
                "unknown weight init code {code}, expected 1..=3"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Init::Uniform => "Uniform",
            Init::He => "He",
            Init::LeCun => "LeCun",
        }
    }

    /// Bound of the uniform draw for a unit with `fan_in` weights.
    pub fn limit<T: Scalar>(self, fan_in: usize, range: T) -> T {
        let fan_in = fan_in.max(1) as f64;
        match self {
            Init::Uniform => range,
            Init::He => T::lit((6.0 / fan_in).sqrt()),
            Init::LeCun => T::lit((3.0 / fan_in).sqrt()),
        }
    }
}

/// A dense layer: `out_dim` units fed by the `in_dim` outputs of the previous layer.
///
/// With a bias input every unit carries one extra trailing weight that multiplies a
/// constant 1. The bias takes part in the forward sum and gets its own gradient, but it
/// has no error signal of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer<T> {
    in_dim: usize,
    has_bias: bool,
    activation: Activation,
    units: Vec<Unit<T>>,
}

impl<T: Scalar> Layer<T> {
    /// Create a layer with weights drawn by `init`.
    ///
    /// `range` is the bound for `Init::Uniform` and must be finite and positive for
    /// every scheme.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        has_bias: bool,
        activation: Activation,
        init: Init,
        range: T,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidShape(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        activation.validate()?;
        validate_weight_range(range)?;

        let fan_in = in_dim + usize::from(has_bias);
        let limit = init.limit(fan_in, range);
        let units = (0..out_dim)
            .map(|_| Unit::new_with_rng(fan_in, limit, rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            in_dim,
            has_bias,
            activation,
            units,
        })
    }

    /// Assemble a layer from existing units, validating that every unit has the right
    /// fan-in and finite parameters.
    pub fn from_units(
        in_dim: usize,
        has_bias: bool,
        activation: Activation,
        units: Vec<Unit<T>>,
    ) -> Result<Self> {
        if in_dim == 0 || units.is_empty() {
            return Err(Error::InvalidShape(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={}",
                units.len()
            )));
        }
        activation.validate()?;

        let fan_in = in_dim + usize::from(has_bias);
        for (j, unit) in units.iter().enumerate() {
            let lens = [
                unit.weights.len(),
                unit.momentum.len(),
                unit.accum_grad.len(),
                unit.second_moment.len(),
            ];
            if lens.iter().any(|&n| n != fan_in) {
                return Err(Error::InvalidData(format!(
                    "unit {j} buffers have lengths {lens:?}, expected {fan_in}"
                )));
            }
            let finite = unit
                .weights
                .iter()
                .chain(&unit.momentum)
                .chain(&unit.accum_grad)
                .chain(&unit.second_moment)
                .all(|v| v.is_finite());
            if !finite {
                return Err(Error::InvalidData(format!(
                    "unit {j} must contain only finite values"
                )));
            }
        }

        Ok(Self {
            in_dim,
            has_bias,
            activation,
            units,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.units.len()
    }

    /// Weights per unit: `in_dim`, plus one when the layer has a bias input.
    #[inline]
    pub fn fan_in(&self) -> usize {
        self.in_dim + usize::from(self.has_bias)
    }

    #[inline]
    pub fn has_bias(&self) -> bool {
        self.has_bias
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub(crate) fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    #[inline]
    pub fn is_softmax(&self) -> bool {
        self.activation == Activation::Softmax
    }

    #[inline]
    pub fn is_argmax(&self) -> bool {
        self.activation == Activation::Argmax
    }

    #[inline]
    pub fn units(&self) -> &[Unit<T>] {
        &self.units
    }

    #[inline]
    pub fn units_mut(&mut self) -> &mut [Unit<T>] {
        &mut self.units
    }

    #[inline]
    pub fn unit(&self, idx: usize) -> Option<&Unit<T>> {
        self.units.get(idx)
    }

    #[inline]
    pub fn unit_mut(&mut self, idx: usize) -> Option<&mut Unit<T>> {
        self.units.get_mut(idx)
    }

    /// Total number of weights (bias weights included).
    #[inline]
    pub fn num_weights(&self) -> usize {
        self.units.len() * self.fan_in()
    }

    /// Forward pass for a single sample.
    ///
    /// Writes the weighted sums into `pre` and the activated values into `out`.
    ///
    /// Shape contract:
    /// - `inputs.len() == self.in_dim()`
    /// - `pre.len() == out.len() == self.out_dim()`
    #[inline]
    pub fn forward(&self, inputs: &[T], pre: &mut [T], out: &mut [T]) {
        debug_assert_eq!(inputs.len(), self.in_dim);
        debug_assert_eq!(pre.len(), self.units.len());
        debug_assert_eq!(out.len(), self.units.len());

        for (z, unit) in pre.iter_mut().zip(&self.units) {
            *z = unit.weighted_sum(inputs);
        }
        self.activation.apply_joint(pre, out);
    }

    /// Activation derivative at a cached pre-activation.
    #[inline]
    pub fn derivative(&self, pre: T) -> T {
        self.activation.derivative(pre)
    }

    pub(crate) fn reset_optimizer_state(&mut self) {
        for unit in &mut self.units {
            unit.reset_state();
        }
    }
}
