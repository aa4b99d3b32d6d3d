//! Activation functions.
//!
//! A dense layer computes a pre-activation value `z = W x + b` for each unit and then
//! applies its activation. Most activations are element-wise: `y = f(z)`. Two of them,
//! `Softmax` and `Argmax`, are *joint*: they look at the whole pre-activation vector of
//! the layer and may only be used on the output layer.
//!
//! Derivatives are evaluated at the cached pre-activation `z` (not at the output), which
//! keeps every variant expressible, including ones like GELU and Sine whose derivative
//! cannot be recovered from `y` alone.

use crate::{Error, Result, Scalar};

/// Default slope for the negative side of `LeakyReLU` and scale of `ELU`.
pub const DEFAULT_ALPHA: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Activation function of a layer.
pub enum Activation {
    Linear,
    ReLU,
    LeakyReLU { alpha: f64 },
    ELU { alpha: f64 },
    #[default]
    Sigmoid,
    TanH,
    Swish,
    /// Tanh approximation of the Gaussian error linear unit.
    GELU,
    SoftPlus,
    Sine,
    /// One-hot of the largest pre-activation. Inference only: no gradient flows through it.
    Argmax,
    /// `exp(z_i) / sum_k exp(z_k)`, paired with the cross-entropy error rule.
    Softmax,
}

impl Activation {
    /// `LeakyReLU` with the default alpha.
    pub fn leaky_relu() -> Self {
        Activation::LeakyReLU {
            alpha: DEFAULT_ALPHA,
        }
    }

    /// `ELU` with the default alpha.
    pub fn elu() -> Self {
        Activation::ELU {
            alpha: DEFAULT_ALPHA,
        }
    }

    /// Look up an activation by its numeric configuration code.
    ///
    /// | code | activation |
    /// |------|------------|
    /// | 1 | Sigmoid |
    /// | 2 | TanH |
    /// | 3 | ReLU |
    /// | 4 | LeakyReLU (alpha 0.01) |
    /// | 5 | ELU (alpha 0.01) |
    /// | 6 | Swish |
    /// | 7 | GELU |
    /// | 8 | Linear |
    /// | 9 | Sine |
    /// | 10 | SoftPlus |
    /// | 11 | Argmax |
    /// | 12 | Softmax |
    pub fn from_code(code: u8) -> Result<Self> {
        let act = match code {
            1 => Activation::Sigmoid,
            2 => Activation::TanH,
            3 => Activation::ReLU,
            4 => Activation::leaky_relu(),
            5 => Activation::elu(),
            6 => Activation::Swish,
            7 => Activation::GELU,
            8 => Activation::Linear,
            9 => Activation::Sine,
            10 => Activation::SoftPlus,
            11 => Activation::Argmax,
            12 => Activation::Softmax,
            _ => {
                return Err(Error::InvalidHyperparameter(format!(
                    "unknown activation code {code}"
                )));
            }
        };
        Ok(act)
    }

    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyReLU { alpha } | Activation::ELU { alpha } => {
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(Error::InvalidHyperparameter(format!(
                        "{} alpha must be finite and >= 0, got {alpha}",
                        self.name()
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// True for activations that act on the whole layer at once.
    #[inline]
    pub fn is_joint(self) -> bool {
        matches!(self, Activation::Softmax | Activation::Argmax)
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "Linear",
            Activation::ReLU => "ReLU",
            Activation::LeakyReLU { .. } => "LeakyReLU",
            Activation::ELU { .. } => "ELU",
            Activation::Sigmoid => "Sigmoid",
            Activation::TanH => "TanH",
            Activation::Swish => "Swish",
            Activation::GELU => "GELU",
            Activation::SoftPlus => "SoftPlus",
            Activation::Sine => "Sine",
            Activation::Argmax => "Argmax",
            Activation::Softmax => "Softmax",
        }
    }

    /// Element-wise value `f(x)`.
    ///
    /// Joint activations have no element-wise form; they return `x` unchanged here and are
    /// applied by [`Activation::apply_joint`].
    #[inline]
    pub fn forward<T: Scalar>(self, x: T) -> T {
        match self {
            Activation::Linear | Activation::Argmax | Activation::Softmax => x,
            Activation::ReLU => {
                if x > T::zero() {
                    x
                } else {
                    T::zero()
                }
            }
            Activation::LeakyReLU { alpha } => {
                if x > T::zero() {
                    x
                } else {
                    T::lit(alpha) * x
                }
            }
            Activation::ELU { alpha } => {
                if x > T::zero() {
                    x
                } else {
                    T::lit(alpha) * (x.exp() - T::one())
                }
            }
            Activation::Sigmoid => sigmoid(x),
            Activation::TanH => x.tanh(),
            Activation::Swish => x * sigmoid(x),
            Activation::GELU => {
                let half = T::lit(0.5);
                half * x * (T::one() + gelu_inner(x).tanh())
            }
            Activation::SoftPlus => softplus(x),
            Activation::Sine => x.sin(),
        }
    }

    /// Derivative `f'(x)` at the pre-activation `x`.
    ///
    /// `Softmax` reports 1 because its derivative is folded into the `target - output`
    /// error rule. `Argmax` reports 0: nothing propagates through a hard one-hot.
    #[inline]
    pub fn derivative<T: Scalar>(self, x: T) -> T {
        match self {
            Activation::Linear | Activation::Softmax => T::one(),
            Activation::Argmax => T::zero(),
            Activation::ReLU => {
                if x > T::zero() {
                    T::one()
                } else {
                    T::zero()
                }
            }
            Activation::LeakyReLU { alpha } => {
                if x > T::zero() {
                    T::one()
                } else {
                    T::lit(alpha)
                }
            }
            Activation::ELU { alpha } => {
                if x > T::zero() {
                    T::one()
                } else {
                    T::lit(alpha) * x.exp()
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (T::one() - s)
            }
            Activation::TanH => {
                let t = x.tanh();
                T::one() - t * t
            }
            Activation::Swish => {
                let s = sigmoid(x);
                s + x * s * (T::one() - s)
            }
            Activation::GELU => {
                let half = T::lit(0.5);
                let t = gelu_inner(x).tanh();
                let d_inner = T::lit(GELU_SCALE) * (T::one() + T::lit(3.0 * GELU_CUBIC) * x * x);
                half * (T::one() + t) + half * x * (T::one() - t * t) * d_inner
            }
            Activation::SoftPlus => sigmoid(x),
            Activation::Sine => x.cos(),
        }
    }

    /// Apply the activation over a whole layer.
    ///
    /// Element-wise activations map each `pre[i]` to `out[i]`; `Softmax` and `Argmax` use
    /// the whole vector.
    ///
    /// Shape contract: `pre.len() == out.len()`.
    pub fn apply_joint<T: Scalar>(self, pre: &[T], out: &mut [T]) {
        debug_assert_eq!(pre.len(), out.len());

        match self {
            Activation::Softmax => softmax(pre, out),
            Activation::Argmax => {
                let best = argmax(pre);
                for (i, y) in out.iter_mut().enumerate() {
                    *y = if i == best { T::one() } else { T::zero() };
                }
            }
            _ => {
                for (y, &z) in out.iter_mut().zip(pre) {
                    *y = self.forward(z);
                }
            }
        }
    }
}

const GELU_SCALE: f64 = 0.797_884_560_802_865_4; // sqrt(2 / pi)
const GELU_CUBIC: f64 = 0.044_715;

#[inline]
fn gelu_inner<T: Scalar>(x: T) -> T {
    T::lit(GELU_SCALE) * (x + T::lit(GELU_CUBIC) * x * x * x)
}

#[inline]
pub(crate) fn sigmoid<T: Scalar>(x: T) -> T {
    // Numerically stable sigmoid.
    if x >= T::zero() {
        let z = (-x).exp();
        T::one() / (T::one() + z)
    } else {
        let z = x.exp();
        z / (T::one() + z)
    }
}

#[inline]
fn softplus<T: Scalar>(x: T) -> T {
    // ln(1 + e^x) = max(x, 0) + ln(1 + e^-|x|)
    let zero = T::zero();
    let pos = if x > zero { x } else { zero };
    pos + (-x.abs()).exp().ln_1p()
}

/// Index of the largest value; the first one wins on ties.
pub(crate) fn argmax<T: Scalar>(xs: &[T]) -> usize {
    let mut best = 0;
    for i in 1..xs.len() {
        if xs[i] > xs[best] {
            best = i;
        }
    }
    best
}

fn softmax<T: Scalar>(pre: &[T], out: &mut [T]) {
    if pre.is_empty() {
        return;
    }
    // Shift by the max: identical result, no overflow.
    let max = pre[argmax(pre)];
    let mut sum = T::zero();
    for (y, &z) in out.iter_mut().zip(pre) {
        *y = (z - max).exp();
        sum = sum + *y;
    }
    for y in out.iter_mut() {
        *y = *y / sum;
    }
}
