//! Network builder.
//!
//! `NetworkBuilder` is a fluent front-end over `Network`'s setters: it collects the
//! layer sizes, activations and hyperparameters, then builds and compiles the network
//! in one step.

use crate::{Activation, Error, Init, Network, NetworkConfig, OptimizerKind, Result, Scalar};

#[derive(Debug, Clone, Copy)]
struct LayerSpec {
    units: usize,
    activation: Activation,
}

#[derive(Debug, Clone)]
/// Builder for a compiled `Network`.
///
/// Example:
///
/// ```rust
/// use rna::{Activation, NetworkBuilder, OptimizerKind};
///
/// # fn main() -> rna::Result<()> {
/// let net = NetworkBuilder::<f32>::new(2)?
///     .add_layer(3, Activation::TanH)?
///     .add_layer(1, Activation::Sigmoid)?
///     .learning_rate(0.1)
///     .optimizer(OptimizerKind::from_code(5, false)?)
///     .seed(0)
///     .build()?;
/// assert_eq!(net.shape(), &[2, 3, 1]);
/// # Ok(())
/// # }
/// ```
pub struct NetworkBuilder<T: Scalar = f32> {
    input_dim: usize,
    layers: Vec<LayerSpec>,
    name: String,
    config: NetworkConfig<T>,
    optimizer: OptimizerKind,
}

impl<T: Scalar> NetworkBuilder<T> {
    /// Start building a network that accepts inputs of length `input_dim`.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidShape("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            layers: Vec::new(),
            name: String::new(),
            config: NetworkConfig::default(),
            optimizer: OptimizerKind::default(),
        })
    }

    /// Convenience constructor from a shape + one activation per non-input layer.
    pub fn from_shape(shape: &[usize], activations: &[Activation]) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::InvalidShape("shape must not be empty".to_owned()));
        }
        if activations.len() + 1 != shape.len() {
            return Err(Error::InvalidShape(format!(
                "activations length {} does not match shape.len() - 1 ({})",
                activations.len(),
                shape.len() - 1
            )));
        }

        let mut b = Self::new(shape[0])?;
        for (&units, &act) in shape[1..].iter().zip(activations) {
            b = b.add_layer(units, act)?;
        }
        Ok(b)
    }

    /// Add a dense layer of `units` units.
    pub fn add_layer(mut self, units: usize, activation: Activation) -> Result<Self> {
        if units == 0 {
            return Err(Error::InvalidShape("layer units must be > 0".to_owned()));
        }
        activation.validate()?;

        self.layers.push(LayerSpec { units, activation });
        Ok(self)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn learning_rate(mut self, learning_rate: T) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    pub fn momentum(mut self, momentum: T) -> Self {
        self.config.momentum = momentum;
        self
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.config.bias = bias;
        self
    }

    pub fn weight_init(mut self, init: Init) -> Self {
        self.config.weight_init = init;
        self
    }

    pub fn weight_range(mut self, range: T) -> Self {
        self.config.weight_range = range;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn cost_history(mut self, enabled: bool) -> Self {
        self.config.cost_history = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn optimizer(mut self, kind: OptimizerKind) -> Self {
        self.optimizer = kind;
        self
    }

    /// Build and compile. Validation errors from the setters surface here.
    pub fn build(self) -> Result<Network<T>> {
        let mut shape = Vec::with_capacity(self.layers.len() + 1);
        shape.push(self.input_dim);
        shape.extend(self.layers.iter().map(|l| l.units));

        let mut net = Network::new(&shape)?;
        net.set_name(self.name);
        for (idx, spec) in self.layers.iter().enumerate() {
            net.set_activation(idx, spec.activation)?;
        }

        let cfg = self.config;
        net.set_learning_rate(cfg.learning_rate)?;
        net.set_momentum(cfg.momentum)?;
        net.set_bias(cfg.bias)?;
        net.set_weight_init(cfg.weight_init)?;
        net.set_weight_range(cfg.weight_range)?;
        net.set_shuffle(cfg.shuffle);
        net.set_cost_history(cfg.cost_history);
        if let Some(seed) = cfg.seed {
            net.set_seed(seed)?;
        }
        net.set_optimizer_kind(self.optimizer)?;

        net.compile()?;
        Ok(net)
    }
}
