//! A from-scratch multilayer perceptron.
//!
//! `rna` builds fully connected feed-forward networks, trains them with
//! backpropagation (online or mini-batch) or finite differences, and updates weights
//! through interchangeable optimizers: gradient descent, SGD with (Nesterov) momentum,
//! AdaGrad, RMSProp, Adam and Nadam.
//!
//! # Lifecycle
//!
//! A [`Network`] is first *described* (shape, hyperparameters, activations, optimizer)
//! and then *compiled*, which allocates the layers and draws every weight with the
//! configured [`Init`] scheme: uniform in `[-weight_range, weight_range]` by default, or
//! He / LeCun bounds derived from each unit's fan-in. Anything that needs weights fails
//! with [`Error::NotCompiled`] before that; settings that shape the layers (bias, weight
//! init, weight range, seed) fail with [`Error::AlreadyCompiled`] after it.
//!
//! # Panics vs `Result`
//!
//! - High-level APIs ([`Network::train_online`], [`Network::train_batched`],
//!   [`Network::predict`], the setters, persistence) validate their inputs up front and
//!   return [`Result`]; a failed call leaves the network untouched.
//! - The low-level hot path ([`Trainer::backpropagate`], [`Trainer::compute_gradients`],
//!   [`Optimizer::apply`]) treats shape mismatches as programmer error and panics.
//!
//! # Data layout
//!
//! - Scalars are generic over [`Scalar`] (`f32` by default, or `f64`).
//! - [`Dataset`] and [`Inputs`] store samples contiguously in row-major layout.
//! - Each [`Unit`] stores its *incoming* weights; with bias enabled the bias weight is
//!   the last entry and multiplies a constant input of 1.
//! - Gradients are pre-scaled by the learning rate and point downhill, so gradient
//!   descent is `w += g`.
//!
//! # Quick start
//!
//! ```rust
//! use rna::{Activation, Dataset, Network, OptimizerKind};
//!
//! # fn main() -> rna::Result<()> {
//! let xs = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
//! let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
//! let train = Dataset::from_rows(&xs, &ys)?;
//!
//! let mut net = Network::<f32>::new(&[2, 3, 1])?;
//! net.set_seed(0)?;
//! net.set_learning_rate(0.1)?;
//! net.set_optimizer_kind(OptimizerKind::from_code(5, false)?)?;
//! net.set_activations(Activation::Sigmoid)?;
//! net.compile()?;
//!
//! net.train_online(&train, 100)?;
//! let y = net.predict(&[0.0, 1.0])?;
//! assert_eq!(y.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving training yourself
//!
//! ```rust
//! use rna::{Network, Trainer};
//!
//! # fn main() -> rna::Result<()> {
//! let mut net = Network::<f64>::new(&[3, 4, 2])?;
//! net.compile()?;
//!
//! let mut trainer = Trainer::new(&net)?;
//! let x = [0.1, -0.2, 0.3];
//! let t = [0.0, 1.0];
//!
//! net.forward(&x, &mut trainer.scratch)?;
//! trainer.backpropagate(net.layers()?, &t);
//! trainer.compute_gradients(net.layers()?, &x, 0.01);
//! net.apply_gradients(&trainer.grads)?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod backprop;
pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optim;
pub mod scalar;
pub mod train;
pub mod unit;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use backprop::{Gradients, Trainer};
pub use builder::NetworkBuilder;
pub use config::NetworkConfig;
pub use data::{Dataset, Inputs};
pub use error::{Error, Result};
pub use layer::{Init, Layer};
pub use loss::Loss;
pub use metrics::Metric;
pub use network::{Network, Scratch};
pub use optim::{AdaGrad, Adam, GradientDescent, Nadam, Optimizer, OptimizerKind, RmsProp, Sgd};
pub use scalar::Scalar;
pub use unit::Unit;
