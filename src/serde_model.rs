//! Network serialization/deserialization (feature: `serde`).
//!
//! This module defines a versioned, stable on-disk format for `Network`.
//!
//! Design notes:
//! - Internal `Network`/`Layer`/`Unit` structs are not serialized directly; the DTOs
//!   below are the file format.
//! - Every scalar is stored as `f64`, so `f32` and `f64` networks share one format.
//! - A saved network carries its optimizer (including the Adam/Nadam step counter) and
//!   every per-weight accumulator, so optimizer state resumes where it stopped. The
//!   random generator is not saved: a seeded network restarts it from its seed on load,
//!   so shuffled epochs after a reload differ from an uninterrupted run.
//! - Deserialization validates the version, shape, buffer lengths and finiteness.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    Activation, Error, Init, Layer, Network, NetworkConfig, OptimizerKind, Result, Scalar, Unit,
};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    #[serde(default)]
    pub name: String,
    pub shape: Vec<usize>,
    pub config: SerializedConfig,
    pub optimizer: SerializedOptimizer,
    pub layers: Vec<SerializedLayer>,
    #[serde(default)]
    pub cost_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedConfig {
    pub learning_rate: f64,
    pub momentum: f64,
    pub bias: bool,
    /// Absent in files written before the field existed; those used uniform init.
    #[serde(default)]
    pub weight_init: SerializedInit,
    pub weight_range: f64,
    pub shuffle: bool,
    pub cost_history: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedInit {
    #[default]
    Uniform,
    He,
    LeCun,
}

impl From<Init> for SerializedInit {
    fn from(value: Init) -> Self {
        match value {
            Init::Uniform => SerializedInit::Uniform,
            Init::He => SerializedInit::He,
            Init::LeCun => SerializedInit::LeCun,
        }
    }
}

impl From<SerializedInit> for Init {
    fn from(value: SerializedInit) -> Self {
        match value {
            SerializedInit::Uniform => Init::Uniform,
            SerializedInit::He => Init::He,
            SerializedInit::LeCun => Init::LeCun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SerializedOptimizer {
    pub kind: SerializedOptimizerKind,
    /// Completed `apply` calls (Adam, Nadam); 0 for the others.
    #[serde(default)]
    pub step: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerializedOptimizerKind {
    GradientDescent,
    Sgd { nesterov: bool },
    AdaGrad { eps: f64 },
    RmsProp { rho: f64, eps: f64 },
    Adam { beta1: f64, beta2: f64, eps: f64 },
    Nadam { beta1: f64, beta2: f64, eps: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub in_dim: usize,
    pub out_dim: usize,
    pub activation: SerializedActivation,
    pub units: Vec<SerializedUnit>,
}

/// One unit's incoming weights (bias weight last) and optimizer accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedUnit {
    pub weights: Vec<f64>,
    pub momentum: Vec<f64>,
    pub accum_grad: Vec<f64>,
    pub second_moment: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SerializedActivation {
    Linear,
    Relu,
    LeakyRelu { alpha: f64 },
    Elu { alpha: f64 },
    Sigmoid,
    Tanh,
    Swish,
    Gelu,
    Softplus,
    Sine,
    Argmax,
    Softmax,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Linear => SerializedActivation::Linear,
            Activation::ReLU => SerializedActivation::Relu,
            Activation::LeakyReLU { alpha } => SerializedActivation::LeakyRelu { alpha },
            Activation::ELU { alpha } => SerializedActivation::Elu { alpha },
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::TanH => SerializedActivation::Tanh,
            Activation::Swish => SerializedActivation::Swish,
            Activation::GELU => SerializedActivation::Gelu,
            Activation::SoftPlus => SerializedActivation::Softplus,
            Activation::Sine => SerializedActivation::Sine,
            Activation::Argmax => SerializedActivation::Argmax,
            Activation::Softmax => SerializedActivation::Softmax,
        }
    }
}

impl SerializedActivation {
    fn into_activation(self) -> Activation {
        match self {
            SerializedActivation::Linear => Activation::Linear,
            SerializedActivation::Relu => Activation::ReLU,
            SerializedActivation::LeakyRelu { alpha } => Activation::LeakyReLU { alpha },
            SerializedActivation::Elu { alpha } => Activation::ELU { alpha },
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Tanh => Activation::TanH,
            SerializedActivation::Swish => Activation::Swish,
            SerializedActivation::Gelu => Activation::GELU,
            SerializedActivation::Softplus => Activation::SoftPlus,
            SerializedActivation::Sine => Activation::Sine,
            SerializedActivation::Argmax => Activation::Argmax,
            SerializedActivation::Softmax => Activation::Softmax,
        }
    }
}

impl From<OptimizerKind> for SerializedOptimizerKind {
    fn from(value: OptimizerKind) -> Self {
        match value {
            OptimizerKind::GradientDescent => SerializedOptimizerKind::GradientDescent,
            OptimizerKind::Sgd { nesterov } => SerializedOptimizerKind::Sgd { nesterov },
            OptimizerKind::AdaGrad { eps } => SerializedOptimizerKind::AdaGrad { eps },
            OptimizerKind::RmsProp { rho, eps } => SerializedOptimizerKind::RmsProp { rho, eps },
            OptimizerKind::Adam { beta1, beta2, eps } => {
                SerializedOptimizerKind::Adam { beta1, beta2, eps }
            }
            OptimizerKind::Nadam { beta1, beta2, eps } => {
                SerializedOptimizerKind::Nadam { beta1, beta2, eps }
            }
        }
    }
}

impl SerializedOptimizerKind {
    fn into_kind(self) -> OptimizerKind {
        match self {
            SerializedOptimizerKind::GradientDescent => OptimizerKind::GradientDescent,
            SerializedOptimizerKind::Sgd { nesterov } => OptimizerKind::Sgd { nesterov },
            SerializedOptimizerKind::AdaGrad { eps } => OptimizerKind::AdaGrad { eps },
            SerializedOptimizerKind::RmsProp { rho, eps } => OptimizerKind::RmsProp { rho, eps },
            SerializedOptimizerKind::Adam { beta1, beta2, eps } => {
                OptimizerKind::Adam { beta1, beta2, eps }
            }
            SerializedOptimizerKind::Nadam { beta1, beta2, eps } => {
                OptimizerKind::Nadam { beta1, beta2, eps }
            }
        }
    }
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.shape.len() < 3 || self.shape.contains(&0) {
            return Err(Error::InvalidData(format!(
                "shape must have >= 3 non-zero sizes, got {:?}",
                self.shape
            )));
        }
        if self.layers.len() != self.shape.len() - 1 {
            return Err(Error::InvalidData(format!(
                "expected {} layers for shape {:?}, got {}",
                self.shape.len() - 1,
                self.shape,
                self.layers.len()
            )));
        }

        for (i, (layer, w)) in self.layers.iter().zip(self.shape.windows(2)).enumerate() {
            if layer.in_dim != w[0] || layer.out_dim != w[1] || layer.units.len() != layer.out_dim {
                return Err(Error::InvalidData(format!(
                    "layer {i} has in_dim {} out_dim {} and {} units, shape expects {} -> {}",
                    layer.in_dim,
                    layer.out_dim,
                    layer.units.len(),
                    w[0],
                    w[1]
                )));
            }
        }

        if self.cost_history.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "cost history must contain only finite values".to_owned(),
            ));
        }

        self.optimizer
            .kind
            .into_kind()
            .validate()
            .map_err(|e| Error::InvalidData(format!("invalid optimizer: {e}")))
    }
}

fn widen<T: Scalar>(xs: &[T]) -> Vec<f64> {
    xs.iter().map(|&x| x.as_f64()).collect()
}

fn narrow<T: Scalar>(xs: Vec<f64>) -> Vec<T> {
    xs.into_iter().map(T::lit).collect()
}

impl<T: Scalar> From<&Layer<T>> for SerializedLayer {
    fn from(layer: &Layer<T>) -> Self {
        Self {
            in_dim: layer.in_dim(),
            out_dim: layer.out_dim(),
            activation: SerializedActivation::from(layer.activation()),
            units: layer
                .units()
                .iter()
                .map(|u| SerializedUnit {
                    weights: widen(u.weights()),
                    momentum: widen(u.momentum()),
                    accum_grad: widen(u.accum_grad()),
                    second_moment: widen(u.second_moment()),
                })
                .collect(),
        }
    }
}

impl<T: Scalar> TryFrom<&Network<T>> for SerializedNetwork {
    type Error = Error;

    fn try_from(net: &Network<T>) -> std::result::Result<Self, Self::Error> {
        let layers = net.layers()?;
        let cfg = net.config();
        Ok(Self {
            format_version: MODEL_FORMAT_VERSION,
            name: net.name().to_owned(),
            shape: net.shape().to_vec(),
            config: SerializedConfig {
                learning_rate: cfg.learning_rate.as_f64(),
                momentum: cfg.momentum.as_f64(),
                bias: cfg.bias,
                weight_init: cfg.weight_init.into(),
                weight_range: cfg.weight_range.as_f64(),
                shuffle: cfg.shuffle,
                cost_history: cfg.cost_history,
                seed: cfg.seed,
            },
            optimizer: SerializedOptimizer {
                kind: net.optimizer().kind().into(),
                step: net.optimizer().step_count(),
            },
            layers: layers.iter().map(SerializedLayer::from).collect(),
            cost_history: net.cost_history().map(widen).unwrap_or_default(),
        })
    }
}

impl<T: Scalar> TryFrom<SerializedNetwork> for Network<T> {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let c = value.config;
        let config = NetworkConfig {
            learning_rate: T::lit(c.learning_rate),
            momentum: T::lit(c.momentum),
            bias: c.bias,
            weight_init: c.weight_init.into(),
            weight_range: T::lit(c.weight_range),
            shuffle: c.shuffle,
            cost_history: c.cost_history,
            seed: c.seed,
        };
        config
            .validate()
            .map_err(|e| Error::InvalidData(format!("invalid config: {e}")))?;

        let mut layers = Vec::with_capacity(value.layers.len());
        for (i, layer) in value.layers.into_iter().enumerate() {
            let units = layer
                .units
                .into_iter()
                .map(|u| Unit {
                    weights: narrow(u.weights),
                    momentum: narrow(u.momentum),
                    accum_grad: narrow(u.accum_grad),
                    second_moment: narrow(u.second_moment),
                })
                .collect();

            // Layer::from_units checks buffer lengths and finiteness.
            let l = Layer::from_units(
                layer.in_dim,
                config.bias,
                layer.activation.into_activation(),
                units,
            )
            .map_err(|e| Error::InvalidData(format!("layer {i} invalid: {e}")))?;
            layers.push(l);
        }

        let mut optimizer = value.optimizer.kind.into_kind().build::<T>();
        optimizer.set_step_count(value.optimizer.step);

        Network::from_parts(
            value.name,
            value.shape,
            config,
            layers,
            optimizer,
            narrow(value.cost_history),
        )
    }
}

impl<T: Scalar> Network<T> {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        let ser = SerializedNetwork::try_from(self)?;
        serde_json::to_string_pretty(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Serialize the network to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        let ser = SerializedNetwork::try_from(self)?;
        serde_json::to_string(&ser)
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Parse a network from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse network json: {e}")))?;
        ser.try_into()
    }

    /// Write the network as JSON to any byte stream.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let ser = SerializedNetwork::try_from(self)?;
        serde_json::to_writer(writer, &ser)
            .map_err(|e| Error::InvalidData(format!("failed to write network: {e}")))
    }

    /// Read a network from a JSON byte stream.
    pub fn read_json<R: Read>(reader: R) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_reader(reader)
            .map_err(|e| Error::InvalidData(format!("failed to read network json: {e}")))?;
        ser.try_into()
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::InvalidData(format!("failed to write {}: {e}", p.display())))?;
        Ok(())
    }

    /// Load a network from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::InvalidData(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}
