use std::fmt;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{validate_learning_rate, validate_momentum, validate_weight_range};
use crate::{
    Activation, Dataset, Error, Gradients, Init, Inputs, Layer, NetworkConfig, Optimizer,
    OptimizerKind, Result, Scalar,
};

/// A fully connected feed-forward network.
///
/// A network is described first (shape, hyperparameters, activations, optimizer) and
/// then compiled, which allocates and randomizes the layers. Inference and training
/// require a compiled network and fail with `Error::NotCompiled` otherwise.
///
/// `shape` lists unit counts from the input to the output: `[2, 3, 1]` is two inputs,
/// one hidden layer of three units, and one output. The input "layer" holds no
/// parameters, so a network with `shape.len() == n` has `n - 1` layers; layer `0` is
/// the first hidden layer and layer `n - 2` is the output layer.
#[derive(Debug, Clone)]
pub struct Network<T: Scalar = f32> {
    name: String,
    shape: Vec<usize>,
    pub(crate) config: NetworkConfig<T>,
    activations: Vec<Activation>,
    pub(crate) optimizer: Box<dyn Optimizer<T>>,
    pub(crate) layers: Option<Vec<Layer<T>>>,
    pub(crate) rng: StdRng,
    pub(crate) cost_history: Vec<T>,
}

/// Reusable buffers for `Network::forward`.
///
/// Holds the pre-activation and the output of every layer for the most recent sample;
/// the backward pass reads both.
#[derive(Debug, Clone)]
pub struct Scratch<T> {
    pre: Vec<Vec<T>>,
    outputs: Vec<Vec<T>>,
}

impl<T: Scalar> Network<T> {
    /// Describe a network from its unit counts (input first, output last).
    ///
    /// Needs at least one hidden layer: `shape.len() >= 3`, every entry `>= 1`.
    pub fn new(shape: &[usize]) -> Result<Self> {
        if shape.len() < 3 {
            return Err(Error::InvalidShape(format!(
                "shape needs input, at least one hidden and output sizes, got {shape:?}"
            )));
        }
        if shape.contains(&0) {
            return Err(Error::InvalidShape(format!(
                "all layer sizes must be >= 1, got {shape:?}"
            )));
        }

        Ok(Self {
            name: String::new(),
            shape: shape.to_vec(),
            config: NetworkConfig::default(),
            activations: vec![Activation::default(); shape.len() - 1],
            optimizer: OptimizerKind::default().build(),
            layers: None,
            rng: StdRng::from_entropy(),
            cost_history: Vec::new(),
        })
    }

    /// Describe a network with `hidden_layers` hidden layers of `hidden` units each.
    pub fn with_hidden_layers(
        input: usize,
        hidden: usize,
        output: usize,
        hidden_layers: usize,
    ) -> Result<Self> {
        if input == 0 || hidden == 0 || output == 0 || hidden_layers == 0 {
            return Err(Error::InvalidShape(format!(
                "input, hidden, output and hidden_layers must be >= 1, got \
                 ({input}, {hidden}, {output}, {hidden_layers})"
            )));
        }

        let mut shape = Vec::with_capacity(hidden_layers + 2);
        shape.push(input);
        shape.extend(std::iter::repeat(hidden).take(hidden_layers));
        shape.push(output);
        Self::new(&shape)
    }

    /// Allocate the layers and draw every weight with the configured `Init` scheme
    /// (by default uniformly from `[-weight_range, weight_range]`).
    ///
    /// Compiling again discards the current weights and optimizer state and draws new
    /// weights from the network's random generator.
    pub fn compile(&mut self) -> Result<()> {
        self.config.validate()?;

        let (init, range) = (self.config.weight_init, self.config.weight_range);
        let mut layers = Vec::with_capacity(self.shape.len() - 1);
        for (idx, w) in self.shape.windows(2).enumerate() {
            layers.push(Layer::new_with_rng(
                w[0],
                w[1],
                self.config.bias,
                self.activations[idx],
                init,
                range,
                &mut self.rng,
            )?);
        }

        let num_weights: usize = layers.iter().map(Layer::num_weights).sum();
        self.layers = Some(layers);
        self.cost_history.clear();
        self.optimizer.set_step_count(0);

        info!(
            "compiled network {:?}: shape {:?}, {} weights ({} init), optimizer {}",
            self.name,
            self.shape,
            num_weights,
            init.name(),
            self.optimizer.name()
        );
        Ok(())
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.layers.is_some()
    }

    fn ensure_not_compiled(&self, what: &str) -> Result<()> {
        if self.is_compiled() {
            return Err(Error::AlreadyCompiled(format!(
                "{what} cannot change after compile"
            )));
        }
        Ok(())
    }

    fn check_layer_index(&self, idx: usize) -> Result<()> {
        if idx >= self.num_layers() {
            return Err(Error::InvalidHyperparameter(format!(
                "layer index {idx} out of range, network has {} layers",
                self.num_layers()
            )));
        }
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_weight_range(&mut self, range: T) -> Result<()> {
        self.ensure_not_compiled("weight range")?;
        validate_weight_range(range)?;
        self.config.weight_range = range;
        Ok(())
    }

    pub fn set_weight_init(&mut self, init: Init) -> Result<()> {
        self.ensure_not_compiled("weight init")?;
        self.config.weight_init = init;
        Ok(())
    }

    /// 1 uniform, 2 He, 3 LeCun.
    pub fn set_weight_init_code(&mut self, code: u8) -> Result<()> {
        self.ensure_not_compiled("weight init")?;
        self.set_weight_init(Init::from_code(code)?)
    }

    pub fn set_bias(&mut self, bias: bool) -> Result<()> {
        self.ensure_not_compiled("bias")?;
        self.config.bias = bias;
        Ok(())
    }

    /// Seed weight initialization and shuffling for reproducible runs.
    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.ensure_not_compiled("seed")?;
        self.config.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
        Ok(())
    }

    pub fn set_learning_rate(&mut self, learning_rate: T) -> Result<()> {
        validate_learning_rate(learning_rate)?;
        self.config.learning_rate = learning_rate;
        Ok(())
    }

    pub fn set_momentum(&mut self, momentum: T) -> Result<()> {
        validate_momentum(momentum)?;
        self.config.momentum = momentum;
        Ok(())
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.config.shuffle = shuffle;
    }

    /// Enable or disable per-epoch cost recording. Disabling clears the history.
    pub fn set_cost_history(&mut self, enabled: bool) {
        self.config.cost_history = enabled;
        if !enabled {
            self.cost_history.clear();
        }
    }

    /// Set the activation of one layer (`0` is the first hidden layer).
    ///
    /// Joint activations (`Softmax`, `Argmax`) are only accepted on the output layer.
    pub fn set_activation(&mut self, layer: usize, activation: Activation) -> Result<()> {
        self.check_layer_index(layer)?;
        activation.validate()?;
        if activation.is_joint() && layer + 1 != self.num_layers() {
            return Err(Error::InvalidHyperparameter(format!(
                "{} can only be used on the output layer, not layer {layer}",
                activation.name()
            )));
        }

        self.activations[layer] = activation;
        if let Some(layers) = self.layers.as_mut() {
            layers[layer].set_activation(activation);
        }
        Ok(())
    }

    /// Set the activation of every layer (hidden and output).
    pub fn set_activations(&mut self, activation: Activation) -> Result<()> {
        if activation.is_joint() {
            return Err(Error::InvalidHyperparameter(format!(
                "{} can only be used on the output layer",
                activation.name()
            )));
        }
        for layer in 0..self.num_layers() {
            self.set_activation(layer, activation)?;
        }
        Ok(())
    }

    pub fn set_output_activation(&mut self, activation: Activation) -> Result<()> {
        self.set_activation(self.num_layers() - 1, activation)
    }

    /// Set a layer activation by numeric code (see `Activation::from_code`).
    pub fn set_activation_code(&mut self, layer: usize, code: u8) -> Result<()> {
        self.set_activation(layer, Activation::from_code(code)?)
    }

    /// Replace the optimizer. Per-weight accumulators on the units are kept; call
    /// `reset_optimizer_state` to clear them.
    pub fn set_optimizer<O: Optimizer<T> + 'static>(&mut self, optimizer: O) -> Result<()> {
        optimizer.kind().validate()?;
        self.optimizer = Box::new(optimizer);
        Ok(())
    }

    pub fn set_optimizer_kind(&mut self, kind: OptimizerKind) -> Result<()> {
        kind.validate()?;
        self.optimizer = kind.build();
        Ok(())
    }

    /// Select the optimizer by numeric code (see `OptimizerKind::from_code`).
    pub fn set_optimizer_code(&mut self, code: u8, nesterov: bool) -> Result<()> {
        self.set_optimizer_kind(OptimizerKind::from_code(code, nesterov)?)
    }

    /// One optimizer step from precomputed gradients, using the configured learning
    /// rate and momentum.
    pub fn apply_gradients(&mut self, grads: &Gradients<T>) -> Result<()> {
        let layers = self.layers.as_mut().ok_or(Error::NotCompiled)?;
        if grads.num_layers() != layers.len() {
            return Err(Error::dimension("gradient layers", layers.len(), grads.num_layers()));
        }
        for (idx, layer) in layers.iter().enumerate() {
            if grads.gradient(idx).len() != layer.num_weights() {
                return Err(Error::dimension(
                    "layer gradients",
                    layer.num_weights(),
                    grads.gradient(idx).len(),
                ));
            }
        }

        let (lr, momentum) = (self.config.learning_rate, self.config.momentum);
        self.optimizer.apply(layers, grads, lr, momentum);
        Ok(())
    }

    /// Zero every unit's optimizer accumulators and the optimizer step counter.
    pub fn reset_optimizer_state(&mut self) -> Result<()> {
        let layers = self.layers.as_mut().ok_or(Error::NotCompiled)?;
        for layer in layers {
            layer.reset_optimizer_state();
        }
        self.optimizer.set_step_count(0);
        Ok(())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.shape[0]
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.shape[self.shape.len() - 1]
    }

    /// Number of parameterized layers (hidden layers plus the output layer).
    #[inline]
    pub fn num_layers(&self) -> usize {
        self.shape.len() - 1
    }

    #[inline]
    pub fn config(&self) -> &NetworkConfig<T> {
        &self.config
    }

    #[inline]
    pub fn optimizer(&self) -> &dyn Optimizer<T> {
        self.optimizer.as_ref()
    }

    pub fn activation(&self, layer: usize) -> Result<Activation> {
        self.check_layer_index(layer)?;
        Ok(self.activations[layer])
    }

    #[inline]
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// Per-epoch costs, or `None` when recording is disabled.
    pub fn cost_history(&self) -> Option<&[T]> {
        self.config.cost_history.then_some(self.cost_history.as_slice())
    }

    pub fn layers(&self) -> Result<&[Layer<T>]> {
        self.layers.as_deref().ok_or(Error::NotCompiled)
    }

    pub fn layers_mut(&mut self) -> Result<&mut [Layer<T>]> {
        self.layers.as_deref_mut().ok_or(Error::NotCompiled)
    }

    pub fn layer(&self, idx: usize) -> Result<&Layer<T>> {
        self.check_layer_index(idx)?;
        Ok(&self.layers()?[idx])
    }

    pub fn num_weights(&self) -> Result<usize> {
        Ok(self.layers()?.iter().map(Layer::num_weights).sum())
    }

    /// Check that `data` is non-empty and matches the input and output widths.
    pub(crate) fn check_dataset(&self, data: &Dataset<T>) -> Result<&[Layer<T>]> {
        let layers = self.layers()?;
        if data.is_empty() {
            return Err(Error::InvalidData("dataset must not be empty".to_owned()));
        }
        if data.input_dim() != self.input_dim() {
            return Err(Error::dimension("dataset inputs", self.input_dim(), data.input_dim()));
        }
        if data.target_dim() != self.output_dim() {
            return Err(Error::dimension("dataset targets", self.output_dim(), data.target_dim()));
        }
        Ok(layers)
    }

    /// Allocate forward buffers for this network.
    pub fn scratch(&self) -> Result<Scratch<T>> {
        Ok(Scratch::for_layers(self.layers()?))
    }

    /// Forward pass for a single sample.
    ///
    /// Writes every layer's pre-activation and output into `scratch` and returns the
    /// network output.
    pub fn forward<'a>(&self, input: &[T], scratch: &'a mut Scratch<T>) -> Result<&'a [T]> {
        let layers = self.layers()?;
        if input.len() != self.input_dim() {
            return Err(Error::dimension("input", self.input_dim(), input.len()));
        }
        if !scratch.fits(layers) {
            return Err(Error::InvalidShape(
                "scratch was built for a different network shape".to_owned(),
            ));
        }

        forward_layers(layers, input, scratch);
        Ok(scratch.output())
    }

    /// Run one sample and return a copy of the output.
    pub fn predict(&self, input: &[T]) -> Result<Vec<T>> {
        let mut scratch = self.scratch()?;
        Ok(self.forward(input, &mut scratch)?.to_vec())
    }

    /// Non-allocating `predict`: writes the output into `out`.
    pub fn predict_into(&self, input: &[T], scratch: &mut Scratch<T>, out: &mut [T]) -> Result<()> {
        if out.len() != self.output_dim() {
            return Err(Error::dimension("output buffer", self.output_dim(), out.len()));
        }
        out.copy_from_slice(self.forward(input, scratch)?);
        Ok(())
    }

    /// Predict every row of `inputs`.
    ///
    /// Returns a flat buffer with shape `(len, output_dim)`.
    pub fn predict_inputs(&self, inputs: &Inputs<T>) -> Result<Vec<T>> {
        let mut scratch = self.scratch()?;
        if inputs.input_dim() != self.input_dim() {
            return Err(Error::dimension("inputs", self.input_dim(), inputs.input_dim()));
        }

        let out_dim = self.output_dim();
        let mut preds = vec![T::zero(); inputs.len() * out_dim];
        for (idx, out) in preds.chunks_exact_mut(out_dim).enumerate() {
            out.copy_from_slice(self.forward(inputs.input(idx), &mut scratch)?);
        }
        Ok(preds)
    }

    /// Fully independent copy of a compiled network: weights, optimizer accumulators,
    /// optimizer object and hyperparameters.
    pub fn clone_for_gradient_check(&self) -> Result<Self> {
        self.layers()?;
        Ok(self.clone())
    }

    /// Rebuild a network from persisted parts. Layers must match `shape`.
    ///
    /// The random generator is not persisted: a seeded network restarts it from
    /// `config.seed`, an unseeded one draws fresh entropy.
    #[cfg(feature = "serde")]
    pub(crate) fn from_parts(
        name: String,
        shape: Vec<usize>,
        config: NetworkConfig<T>,
        layers: Vec<Layer<T>>,
        optimizer: Box<dyn Optimizer<T>>,
        cost_history: Vec<T>,
    ) -> Result<Self> {
        let mut net = Self::new(&shape)?;
        config.validate()?;
        if layers.len() != net.num_layers() {
            return Err(Error::InvalidData(format!(
                "expected {} layers for shape {shape:?}, got {}",
                net.num_layers(),
                layers.len()
            )));
        }
        for (idx, (layer, w)) in layers.iter().zip(shape.windows(2)).enumerate() {
            if layer.in_dim() != w[0]
                || layer.out_dim() != w[1]
                || layer.has_bias() != config.bias
            {
                return Err(Error::InvalidData(format!(
                    "layer {idx} does not match shape {shape:?} and bias {}",
                    config.bias
                )));
            }
            if layer.activation().is_joint() && idx + 1 != layers.len() {
                return Err(Error::InvalidData(format!(
                    "{} can only be used on the output layer",
                    layer.activation().name()
                )));
            }
        }

        net.name = name;
        net.activations = layers.iter().map(Layer::activation).collect();
        net.rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        net.config = config;
        net.optimizer = optimizer;
        net.layers = Some(layers);
        net.cost_history = cost_history;
        Ok(net)
    }
}

/// Forward through `layers` without shape checks.
pub(crate) fn forward_layers<T: Scalar>(
    layers: &[Layer<T>],
    input: &[T],
    scratch: &mut Scratch<T>,
) {
    for (idx, layer) in layers.iter().enumerate() {
        let pre = &mut scratch.pre[idx];
        if idx == 0 {
            layer.forward(input, pre, &mut scratch.outputs[0]);
        } else {
            // Borrow the previous output immutably and the current output mutably.
            let (left, right) = scratch.outputs.split_at_mut(idx);
            layer.forward(&left[idx - 1], pre, &mut right[0]);
        }
    }
}

impl<T: Scalar> fmt::Display for Network<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "<unnamed>" } else { &self.name };
        writeln!(f, "Network {name}")?;
        writeln!(f, "  optimizer:     {}", self.optimizer.name())?;
        writeln!(f, "  learning rate: {}", self.config.learning_rate)?;
        writeln!(f, "  momentum:      {}", self.config.momentum)?;
        writeln!(f, "  bias:          {}", self.config.bias)?;
        writeln!(f, "  weight init:   {}", self.config.weight_init.name())?;
        writeln!(f, "  weight range:  {}", self.config.weight_range)?;
        writeln!(f, "  compiled:      {}", self.is_compiled())?;
        writeln!(f, "  input:         {} units", self.input_dim())?;
        for (idx, (units, act)) in self.shape[1..].iter().zip(&self.activations).enumerate() {
            let role = if idx + 1 == self.num_layers() { "output" } else { "hidden" };
            writeln!(f, "  {role} {idx}:      {units} units, {}", act.name())?;
        }
        write!(f, "  shape:         {:?}", self.shape)
    }
}

impl<T: Scalar> Scratch<T> {
    pub fn new(net: &Network<T>) -> Result<Self> {
        net.scratch()
    }

    pub(crate) fn for_layers(layers: &[Layer<T>]) -> Self {
        let pre = layers.iter().map(|l| vec![T::zero(); l.out_dim()]).collect();
        let outputs = layers.iter().map(|l| vec![T::zero(); l.out_dim()]).collect();
        Self { pre, outputs }
    }

    fn fits(&self, layers: &[Layer<T>]) -> bool {
        self.outputs.len() == layers.len()
            && self.pre.len() == layers.len()
            && layers
                .iter()
                .zip(&self.outputs)
                .all(|(layer, out)| out.len() == layer.out_dim())
    }

    /// Output of the last layer for the most recent forward pass.
    #[inline]
    pub fn output(&self) -> &[T] {
        self.outputs.last().map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn layer_output(&self, idx: usize) -> &[T] {
        &self.outputs[idx]
    }

    #[inline]
    pub fn pre_activation(&self, idx: usize) -> &[T] {
        &self.pre[idx]
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Adam, Sgd};

    fn compiled(shape: &[usize], seed: u64) -> Network<f64> {
        let mut net = Network::new(shape).unwrap();
        net.set_seed(seed).unwrap();
        net.compile().unwrap();
        net
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(Network::<f32>::new(&[2, 1]), Err(Error::InvalidShape(_))));
        assert!(Network::<f32>::new(&[2, 0, 1]).is_err());
        assert!(Network::<f32>::with_hidden_layers(2, 3, 1, 0).is_err());

        let net = Network::<f32>::with_hidden_layers(2, 4, 1, 3).unwrap();
        assert_eq!(net.shape(), &[2, 4, 4, 4, 1]);
        assert_eq!(net.num_layers(), 4);
    }

    #[test]
    fn operations_require_compile() {
        let net = Network::<f32>::new(&[2, 3, 1]).unwrap();
        assert_eq!(net.predict(&[0.0, 1.0]), Err(Error::NotCompiled));
        assert!(matches!(net.clone_for_gradient_check(), Err(Error::NotCompiled)));
        assert!(matches!(net.layers(), Err(Error::NotCompiled)));
        assert_eq!(net.num_weights(), Err(Error::NotCompiled));
    }

    #[test]
    fn structural_settings_lock_after_compile() {
        let mut net = compiled(&[2, 3, 1], 0);
        assert!(matches!(net.set_bias(false), Err(Error::AlreadyCompiled(_))));
        assert!(matches!(net.set_weight_range(0.5), Err(Error::AlreadyCompiled(_))));
        assert!(matches!(net.set_seed(1), Err(Error::AlreadyCompiled(_))));
        assert!(matches!(net.set_weight_init(Init::He), Err(Error::AlreadyCompiled(_))));
        assert!(matches!(net.set_weight_init_code(3), Err(Error::AlreadyCompiled(_))));

        // Runtime settings stay open.
        assert!(net.set_learning_rate(0.5).is_ok());
        assert!(net.set_momentum(0.9).is_ok());
        assert!(net.set_activations(Activation::TanH).is_ok());
        assert_eq!(net.layer(0).unwrap().activation(), Activation::TanH);
    }

    #[test]
    fn setters_validate_values() {
        let mut net = Network::<f32>::new(&[2, 3, 1]).unwrap();
        assert!(matches!(net.set_learning_rate(0.0), Err(Error::InvalidHyperparameter(_))));
        assert!(net.set_momentum(-1.0).is_err());
        assert!(net.set_weight_range(0.0).is_err());
        assert!(net.set_activation_code(0, 42).is_err());
        assert!(net.set_optimizer_code(9, false).is_err());
        assert!(net.set_weight_init_code(0).is_err());
        assert!(net.set_weight_init_code(2).is_ok());
        assert_eq!(net.config().weight_init, Init::He);
        assert!(net.set_activation(2, Activation::ReLU).is_err());

        // Joint activations only on the output layer.
        assert!(net.set_activation(0, Activation::Softmax).is_err());
        assert!(net.set_activations(Activation::Argmax).is_err());
        assert!(net.set_output_activation(Activation::Softmax).is_ok());
        assert_eq!(net.activation(1).unwrap(), Activation::Softmax);
    }

    #[test]
    fn uniform_init_is_centered_and_bounded() {
        let net = compiled(&[100, 100, 1], 7);
        let weights: Vec<f64> = net
            .layers()
            .unwrap()
            .iter()
            .flat_map(|l| l.units().iter().flat_map(|u| u.weights().iter().copied()))
            .collect();

        assert!(weights.len() >= 10_000);
        assert!(weights.iter().all(|w| (-1.0..=1.0).contains(w)));
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        assert!(mean.abs() < 0.05, "mean={mean}");
    }

    #[test]
    fn seeded_compile_and_predict_are_deterministic() {
        let a = compiled(&[2, 3, 1], 123);
        let b = compiled(&[2, 3, 1], 123);
        let input = [0.3, -0.7];

        let out_a = a.predict(&input).unwrap();
        assert_eq!(out_a, b.predict(&input).unwrap());
        assert_eq!(out_a, a.predict(&input).unwrap());
    }

    #[test]
    fn recompiling_redraws_weights() {
        let mut net = compiled(&[2, 3, 1], 5);
        let before = net.layers().unwrap().to_vec();
        net.compile().unwrap();
        assert_ne!(net.layers().unwrap(), before.as_slice());
    }

    #[test]
    fn forward_checks_dimensions() {
        let net = compiled(&[2, 3, 1], 0);
        let mut scratch = net.scratch().unwrap();
        assert_eq!(
            net.forward(&[1.0, 2.0, 3.0], &mut scratch),
            Err(Error::DimensionMismatch {
                what: "input",
                expected: 2,
                actual: 3
            })
        );

        let other = compiled(&[2, 4, 1], 0);
        let mut wrong = other.scratch().unwrap();
        assert!(net.forward(&[1.0, 2.0], &mut wrong).is_err());

        let mut out = [0.0; 2];
        assert!(net.predict_into(&[1.0, 2.0], &mut scratch, &mut out).is_err());
    }

    #[test]
    fn softmax_output_is_a_distribution() {
        let mut net = compiled(&[3, 4, 3], 11);
        net.set_output_activation(Activation::Softmax).unwrap();
        let out = net.predict(&[0.5, -1.0, 2.0]).unwrap();
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(out.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn gradient_check_clone_is_independent() {
        let mut net = compiled(&[2, 3, 1], 9);
        net.set_optimizer(Adam::default()).unwrap();
        let mut copy = net.clone_for_gradient_check().unwrap();

        copy.layers_mut().unwrap()[0].units_mut()[0].weights_mut()[0] += 1.0;
        copy.set_learning_rate(0.5).unwrap();

        assert_ne!(net.layers().unwrap(), copy.layers().unwrap());
        assert!((net.config().learning_rate - 0.01).abs() < 1e-12);
        assert_eq!(copy.optimizer().name(), "Adam");
    }

    #[test]
    fn display_lists_layers() {
        let mut net = compiled(&[2, 3, 1], 0);
        net.set_name("xor");
        let text = net.to_string();
        assert!(text.contains("Network xor"));
        assert!(text.contains("optimizer:     SGD"));
        assert!(text.contains("3 units, Sigmoid"));
    }

    fn trained_with_adam() -> Network<f64> {
        let mut net = compiled(&[2, 3, 2], 17);
        net.set_optimizer(Adam::default()).unwrap();
        let data = Dataset::from_rows(
            &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();
        net.train_online(&data, 4).unwrap();
        net
    }

    fn all_state(net: &Network<f64>) -> Vec<f64> {
        net.layers()
            .unwrap()
            .iter()
            .flat_map(|l| l.units())
            .flat_map(|u| {
                u.momentum()
                    .iter()
                    .chain(u.accum_grad())
                    .chain(u.second_moment())
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn swapping_optimizer_keeps_accumulators() {
        let mut net = trained_with_adam();
        assert_eq!(net.optimizer().step_count(), 12);
        let before = net.layers().unwrap().to_vec();
        assert!(all_state(&net).iter().any(|&v| v != 0.0));

        net.set_optimizer(Sgd::default()).unwrap();
        assert_eq!(net.optimizer().name(), "SGD");
        for (a, b) in before.iter().zip(net.layers().unwrap()) {
            for (ua, ub) in a.units().iter().zip(b.units()) {
                assert_eq!(ua.momentum(), ub.momentum());
                assert_eq!(ua.second_moment(), ub.second_moment());
                assert_eq!(ua.weights(), ub.weights());
            }
        }
    }

    #[test]
    fn reset_optimizer_state_zeroes_buffers_and_steps() {
        let mut net = trained_with_adam();
        let weights: Vec<Vec<f64>> = net
            .layers()
            .unwrap()
            .iter()
            .flat_map(|l| l.units().iter().map(|u| u.weights().to_vec()))
            .collect();

        net.reset_optimizer_state().unwrap();
        assert_eq!(net.optimizer().step_count(), 0);
        assert!(all_state(&net).iter().all(|&v| v == 0.0));

        let after: Vec<Vec<f64>> = net
            .layers()
            .unwrap()
            .iter()
            .flat_map(|l| l.units().iter().map(|u| u.weights().to_vec()))
            .collect();
        assert_eq!(weights, after);

        let mut uncompiled = Network::<f32>::new(&[2, 3, 1]).unwrap();
        assert_eq!(uncompiled.reset_optimizer_state(), Err(Error::NotCompiled));
    }

    #[test]
    fn predict_inputs_matches_row_by_row_predict() {
        let net = compiled(&[3, 4, 2], 29);
        let rows = vec![vec![0.1, 0.2, 0.3], vec![-1.0, 0.5, 2.0], vec![0.0, 0.0, 0.0]];
        let inputs = Inputs::from_rows(&rows).unwrap();

        let flat = net.predict_inputs(&inputs).unwrap();
        assert_eq!(flat.len(), rows.len() * net.output_dim());
        for (row, chunk) in rows.iter().zip(flat.chunks_exact(net.output_dim())) {
            assert_eq!(net.predict(row).unwrap(), chunk);
        }

        let narrow = Inputs::from_rows(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(net.predict_inputs(&narrow), Err(Error::DimensionMismatch { .. })));
    }
}
