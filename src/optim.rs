//! Optimizers.
//!
//! An optimizer turns the per-weight gradients held in `Gradients` into weight updates.
//! Gradients are already scaled by the learning rate and point in the descent
//! direction (`g = lr * error * input`), so plain gradient descent is `w += g`.
//!
//! Per-weight state (velocity, squared-gradient accumulators, moment estimates) lives
//! on each `Unit`, so it travels with the network when it is cloned or saved. The only
//! state an optimizer object owns is its own step counter (Adam, Nadam).

use std::fmt;

use crate::{Error, Gradients, Layer, Result, Scalar, Unit};

/// Epsilon shared by the adaptive optimizers.
pub const DEFAULT_EPS: f64 = 1e-8;
pub const DEFAULT_BETA1: f64 = 0.9;
pub const DEFAULT_BETA2: f64 = 0.999;
pub const DEFAULT_RHO: f64 = 0.9;

/// Weight update rule.
///
/// `apply` updates every weight of every layer in place from `grads`. It performs no
/// hyperparameter validation; `grads` must have been built for `layers`.
pub trait Optimizer<T: Scalar>: fmt::Debug + Send + Sync {
    fn apply(
        &mut self,
        layers: &mut [Layer<T>],
        grads: &Gradients<T>,
        learning_rate: T,
        momentum: T,
    );

    /// Plain descriptor of this optimizer (variant plus hyperparameters).
    fn kind(&self) -> OptimizerKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>>;

    /// Number of `apply` calls so far, for optimizers that track it.
    fn step_count(&self) -> u64 {
        0
    }

    fn set_step_count(&mut self, _t: u64) {}
}

impl<T: Scalar> Clone for Box<dyn Optimizer<T>> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Optimizer descriptor.
///
/// Used for selection by numeric code, for display and for persistence. `build` turns a
/// descriptor back into a fresh optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerKind {
    GradientDescent,
    Sgd { nesterov: bool },
    AdaGrad { eps: f64 },
    RmsProp { rho: f64, eps: f64 },
    Adam { beta1: f64, beta2: f64, eps: f64 },
    Nadam { beta1: f64, beta2: f64, eps: f64 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Sgd { nesterov: false }
    }
}

impl OptimizerKind {
    /// Select an optimizer by code.
    ///
    /// - 1: gradient descent
    /// - 2: SGD with momentum (`nesterov` honored)
    /// - 3: AdaGrad
    /// - 4: RMSProp
    /// - 5: Adam
    ///
    /// `nesterov` is ignored for every code but 2.
    pub fn from_code(code: u8, nesterov: bool) -> Result<Self> {
        match code {
            1 => Ok(OptimizerKind::GradientDescent),
            2 => Ok(OptimizerKind::Sgd { nesterov }),
            3 => Ok(OptimizerKind::AdaGrad { eps: DEFAULT_EPS }),
            4 => Ok(OptimizerKind::RmsProp {
                rho: DEFAULT_RHO,
                eps: DEFAULT_EPS,
            }),
            5 => Ok(OptimizerKind::Adam {
                beta1: DEFAULT_BETA1,
                beta2: DEFAULT_BETA2,
                eps: DEFAULT_EPS,
            }),
            _ => Err(Error::InvalidHyperparameter(format!(
                "unknown optimizer code {code}, expected 1..=5"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OptimizerKind::GradientDescent => "GradientDescent",
            OptimizerKind::Sgd { nesterov: false } => "SGD",
            OptimizerKind::Sgd { nesterov: true } => "SGD (Nesterov)",
            OptimizerKind::AdaGrad { .. } => "AdaGrad",
            OptimizerKind::RmsProp { .. } => "RMSProp",
            OptimizerKind::Adam { .. } => "Adam",
            OptimizerKind::Nadam { .. } => "Nadam",
        }
    }

    /// Validate descriptor hyperparameters.
    pub fn validate(self) -> Result<()> {
        fn check_eps(eps: f64) -> Result<()> {
            if !(eps.is_finite() && eps > 0.0) {
                return Err(Error::InvalidHyperparameter(format!(
                    "eps must be finite and > 0, got {eps}"
                )));
            }
            Ok(())
        }
        fn check_decay(name: &str, v: f64) -> Result<()> {
            if !(v.is_finite() && (0.0..1.0).contains(&v)) {
                return Err(Error::InvalidHyperparameter(format!(
                    "{name} must be finite and in [0,1), got {v}"
                )));
            }
            Ok(())
        }

        match self {
            OptimizerKind::GradientDescent | OptimizerKind::Sgd { .. } => Ok(()),
            OptimizerKind::AdaGrad { eps } => check_eps(eps),
            OptimizerKind::RmsProp { rho, eps } => {
                check_decay("rho", rho)?;
                check_eps(eps)
            }
            OptimizerKind::Adam { beta1, beta2, eps }
            | OptimizerKind::Nadam { beta1, beta2, eps } => {
                check_decay("beta1", beta1)?;
                check_decay("beta2", beta2)?;
                check_eps(eps)
            }
        }
    }

    /// Build a fresh optimizer (step counter at 0).
    pub fn build<T: Scalar>(self) -> Box<dyn Optimizer<T>> {
        match self {
            OptimizerKind::GradientDescent => Box::new(GradientDescent),
            OptimizerKind::Sgd { nesterov } => Box::new(Sgd { nesterov }),
            OptimizerKind::AdaGrad { eps } => Box::new(AdaGrad { eps }),
            OptimizerKind::RmsProp { rho, eps } => Box::new(RmsProp { rho, eps }),
            OptimizerKind::Adam { beta1, beta2, eps } => Box::new(Adam {
                beta1,
                beta2,
                eps,
                t: 0,
            }),
            OptimizerKind::Nadam { beta1, beta2, eps } => Box::new(Nadam {
                beta1,
                beta2,
                eps,
                t: 0,
            }),
        }
    }
}

/// Visit every (unit, weight index, gradient) triple, layer by layer.
#[inline]
fn for_each_weight<T: Scalar>(
    layers: &mut [Layer<T>],
    grads: &Gradients<T>,
    mut f: impl FnMut(&mut Unit<T>, usize, T),
) {
    assert_eq!(
        layers.len(),
        grads.num_layers(),
        "grads has {} layers, network has {}",
        grads.num_layers(),
        layers.len()
    );

    for (idx, layer) in layers.iter_mut().enumerate() {
        let fan_in = layer.fan_in();
        let g = grads.gradient(idx);
        assert_eq!(
            g.len(),
            layer.num_weights(),
            "grads layer {idx} has {} entries, layer has {} weights",
            g.len(),
            layer.num_weights()
        );

        for (unit, row) in layer.units_mut().iter_mut().zip(g.chunks_exact(fan_in)) {
            for (k, &gk) in row.iter().enumerate() {
                f(unit, k, gk);
            }
        }
    }
}

/// Classic backpropagation update: `w += g`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientDescent;

impl<T: Scalar> Optimizer<T> for GradientDescent {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, _lr: T, _momentum: T) {
        for_each_weight(layers, grads, |unit, k, g| {
            unit.weights[k] = unit.weights[k] + g;
        });
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::GradientDescent
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }
}

/// SGD with momentum, optionally Nesterov.
///
/// - momentum: `m = mu*m + g; w += m`
/// - nesterov: `w += mu*m; m = mu*m + g; w -= lr*m`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sgd {
    pub nesterov: bool,
}

impl<T: Scalar> Optimizer<T> for Sgd {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, lr: T, momentum: T) {
        if self.nesterov {
            for_each_weight(layers, grads, |unit, k, g| {
                let prev = unit.momentum[k];
                unit.weights[k] = unit.weights[k] + momentum * prev;
                unit.momentum[k] = momentum * prev + g;
                unit.weights[k] = unit.weights[k] - lr * unit.momentum[k];
            });
        } else {
            for_each_weight(layers, grads, |unit, k, g| {
                unit.momentum[k] = momentum * unit.momentum[k] + g;
                unit.weights[k] = unit.weights[k] + unit.momentum[k];
            });
        }
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Sgd {
            nesterov: self.nesterov,
        }
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }
}

/// AdaGrad: `a += g^2; w += lr*g/(sqrt(a)+eps)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaGrad {
    pub eps: f64,
}

impl Default for AdaGrad {
    fn default() -> Self {
        Self { eps: DEFAULT_EPS }
    }
}

impl<T: Scalar> Optimizer<T> for AdaGrad {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, lr: T, _momentum: T) {
        let eps = T::lit(self.eps);
        for_each_weight(layers, grads, |unit, k, g| {
            unit.accum_grad[k] = unit.accum_grad[k] + g * g;
            unit.weights[k] = unit.weights[k] + lr * g / (unit.accum_grad[k].sqrt() + eps);
        });
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::AdaGrad { eps: self.eps }
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }
}

/// RMSProp: `a = rho*a + (1-rho)*g^2; w += lr*g/(sqrt(a)+eps)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsProp {
    pub rho: f64,
    pub eps: f64,
}

impl Default for RmsProp {
    fn default() -> Self {
        Self {
            rho: DEFAULT_RHO,
            eps: DEFAULT_EPS,
        }
    }
}

impl<T: Scalar> Optimizer<T> for RmsProp {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, lr: T, _momentum: T) {
        let rho = T::lit(self.rho);
        let one_minus_rho = T::one() - rho;
        let eps = T::lit(self.eps);
        for_each_weight(layers, grads, |unit, k, g| {
            unit.accum_grad[k] = rho * unit.accum_grad[k] + one_minus_rho * g * g;
            unit.weights[k] = unit.weights[k] + lr * g / (unit.accum_grad[k].sqrt() + eps);
        });
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::RmsProp {
            rho: self.rho,
            eps: self.eps,
        }
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }
}

/// Adam (bias-corrected).
///
/// The step counter starts at 0 and is incremented before use, so the first `apply`
/// runs with `t = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adam {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    t: u64,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPS)
    }
}

impl Adam {
    pub fn new(beta1: f64, beta2: f64, eps: f64) -> Self {
        Self {
            beta1,
            beta2,
            eps,
            t: 0,
        }
    }

    #[inline]
    pub fn t(&self) -> u64 {
        self.t
    }
}

/// `(1 - beta1^t, 1 - beta2^t)` for the bias corrections.
fn corrections<T: Scalar>(beta1: f64, beta2: f64, t: u64) -> (T, T) {
    let t = i32::try_from(t).unwrap_or(i32::MAX);
    (
        T::lit(1.0 - beta1.powi(t)),
        T::lit(1.0 - beta2.powi(t)),
    )
}

impl<T: Scalar> Optimizer<T> for Adam {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, lr: T, _momentum: T) {
        self.t += 1;
        let (beta1, beta2, eps) = (T::lit(self.beta1), T::lit(self.beta2), T::lit(self.eps));
        let (corr1, corr2) = corrections::<T>(self.beta1, self.beta2, self.t);

        for_each_weight(layers, grads, |unit, k, g| {
            unit.momentum[k] = beta1 * unit.momentum[k] + (T::one() - beta1) * g;
            unit.second_moment[k] = beta2 * unit.second_moment[k] + (T::one() - beta2) * g * g;

            let m_hat = unit.momentum[k] / corr1;
            let v_hat = unit.second_moment[k] / corr2;
            unit.weights[k] = unit.weights[k] + lr * m_hat / (v_hat.sqrt() + eps);
        });
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Adam {
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
        }
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }

    fn step_count(&self) -> u64 {
        self.t
    }

    fn set_step_count(&mut self, t: u64) {
        self.t = t;
    }
}

/// Nadam: Adam with a Nesterov look-ahead on the first moment,
/// `m_hat = (beta1*m + (1-beta1)*g) / (1-beta1^t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nadam {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    t: u64,
}

impl Default for Nadam {
    fn default() -> Self {
        Self::new(DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_EPS)
    }
}

impl Nadam {
    pub fn new(beta1: f64, beta2: f64, eps: f64) -> Self {
        Self {
            beta1,
            beta2,
            eps,
            t: 0,
        }
    }

    #[inline]
    pub fn t(&self) -> u64 {
        self.t
    }
}

impl<T: Scalar> Optimizer<T> for Nadam {
    fn apply(&mut self, layers: &mut [Layer<T>], grads: &Gradients<T>, lr: T, _momentum: T) {
        self.t += 1;
        let (beta1, beta2, eps) = (T::lit(self.beta1), T::lit(self.beta2), T::lit(self.eps));
        let (corr1, corr2) = corrections::<T>(self.beta1, self.beta2, self.t);

        for_each_weight(layers, grads, |unit, k, g| {
            unit.momentum[k] = beta1 * unit.momentum[k] + (T::one() - beta1) * g;
            unit.second_moment[k] = beta2 * unit.second_moment[k] + (T::one() - beta2) * g * g;

            let m_hat = (beta1 * unit.momentum[k] + (T::one() - beta1) * g) / corr1;
            let v_hat = unit.second_moment[k] / corr2;
            unit.weights[k] = unit.weights[k] + lr * m_hat / (v_hat.sqrt() + eps);
        });
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Nadam {
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
        }
    }

    fn boxed_clone(&self) -> Box<dyn Optimizer<T>> {
        Box::new(*self)
    }

    fn step_count(&self) -> u64 {
        self.t
    }

    fn set_step_count(&mut self, t: u64) {
        self.t = t;
    }
}
