//! Backpropagation buffers.
//!
//! `Trainer` owns every per-step buffer (pre-activations, outputs, errors, gradients),
//! so the network itself only stores parameters. Allocate one trainer per network and
//! reuse it: none of the methods here allocate.
//!
//! Typical online step:
//! - `net.forward(input, &mut trainer.scratch)`
//! - `trainer.backpropagate(layers, target)`
//! - `trainer.compute_gradients(layers, input, lr)`
//! - `optimizer.apply(layers, &trainer.grads, lr, momentum)`

use crate::{Layer, Network, Result, Scalar, Scratch};

/// Per-layer error signals and weight gradients.
///
/// `gradient(l)` and `accumulated(l)` are row-major `(out_dim, fan_in)`: the entry for
/// unit `j`, input `k` sits at `j * fan_in + k`, with the bias weight last in each row.
#[derive(Debug, Clone)]
pub struct Gradients<T> {
    errors: Vec<Vec<T>>,
    gradient: Vec<Vec<T>>,
    accumulated: Vec<Vec<T>>,
}

impl<T: Scalar> Gradients<T> {
    pub fn new(net: &Network<T>) -> Result<Self> {
        Ok(Self::for_layers(net.layers()?))
    }

    pub(crate) fn for_layers(layers: &[Layer<T>]) -> Self {
        let errors = layers.iter().map(|l| vec![T::zero(); l.out_dim()]).collect();
        let gradient: Vec<Vec<T>> = layers
            .iter()
            .map(|l| vec![T::zero(); l.num_weights()])
            .collect();
        let accumulated = gradient.clone();
        Self {
            errors,
            gradient,
            accumulated,
        }
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.errors.len()
    }

    /// Error signal of each unit of layer `idx`.
    #[inline]
    pub fn errors(&self, idx: usize) -> &[T] {
        &self.errors[idx]
    }

    #[inline]
    pub fn gradient(&self, idx: usize) -> &[T] {
        &self.gradient[idx]
    }

    #[inline]
    pub fn gradient_mut(&mut self, idx: usize) -> &mut [T] {
        &mut self.gradient[idx]
    }

    #[inline]
    pub fn accumulated(&self, idx: usize) -> &[T] {
        &self.accumulated[idx]
    }
}

/// Reusable buffers for training a specific network.
#[derive(Debug, Clone)]
pub struct Trainer<T> {
    pub scratch: Scratch<T>,
    pub grads: Gradients<T>,
}

impl<T: Scalar> Trainer<T> {
    pub fn new(net: &Network<T>) -> Result<Self> {
        let layers = net.layers()?;
        Ok(Self {
            scratch: Scratch::for_layers(layers),
            grads: Gradients::for_layers(layers),
        })
    }

    /// Compute every unit's error signal for the sample last run through `scratch`.
    ///
    /// - output, Softmax: `e = t - y`
    /// - output, otherwise: `e = (t - y) * f'(z)`
    /// - hidden: `e_j = f'(z_j) * sum_k next.w[k][j] * next.e_k` (bias weights excluded)
    ///
    /// Shape contract: `target.len()` equals the output width and the buffers were built
    /// for `layers`.
    pub fn backpropagate(&mut self, layers: &[Layer<T>], target: &[T]) {
        let last = layers.len() - 1;
        let out_layer = &layers[last];
        assert_eq!(
            target.len(),
            out_layer.out_dim(),
            "target len {} does not match output dim {}",
            target.len(),
            out_layer.out_dim()
        );
        assert_eq!(
            self.grads.errors.len(),
            layers.len(),
            "trainer has {} error buffers, network has {} layers",
            self.grads.errors.len(),
            layers.len()
        );

        let y = self.scratch.layer_output(last);
        let z = self.scratch.pre_activation(last);
        let e = &mut self.grads.errors[last];
        if out_layer.is_softmax() {
            for i in 0..e.len() {
                e[i] = target[i] - y[i];
            }
        } else {
            for i in 0..e.len() {
                e[i] = (target[i] - y[i]) * out_layer.derivative(z[i]);
            }
        }

        for idx in (0..last).rev() {
            let layer = &layers[idx];
            let next = &layers[idx + 1];
            let z = self.scratch.pre_activation(idx);

            // `next` reads errors[idx + 1] while errors[idx] is written.
            let (left, right) = self.grads.errors.split_at_mut(idx + 1);
            let e = &mut left[idx];
            let next_e = &right[0];

            for (j, ej) in e.iter_mut().enumerate() {
                let mut sum = T::zero();
                for (unit, &ek) in next.units().iter().zip(next_e) {
                    sum = sum + unit.weights()[j] * ek;
                }
                *ej = sum * layer.derivative(z[j]);
            }
        }
    }

    /// Overwrite the gradients with `lr * e_j * x_k` for the current sample.
    ///
    /// `input` must be the sample passed to the forward pass.
    pub fn compute_gradients(&mut self, layers: &[Layer<T>], input: &[T], lr: T) {
        for idx in 0..layers.len() {
            let x = if idx == 0 {
                input
            } else {
                self.scratch.layer_output(idx - 1)
            };
            write_gradients(
                &layers[idx],
                x,
                &self.grads.errors[idx],
                lr,
                &mut self.grads.gradient[idx],
                |g, v| *g = v,
            );
        }
    }

    /// Add `lr * e_j * x_k` for the current sample into the accumulated gradients.
    pub fn accumulate_gradients(&mut self, layers: &[Layer<T>], input: &[T], lr: T) {
        for idx in 0..layers.len() {
            let x = if idx == 0 {
                input
            } else {
                self.scratch.layer_output(idx - 1)
            };
            write_gradients(
                &layers[idx],
                x,
                &self.grads.errors[idx],
                lr,
                &mut self.grads.accumulated[idx],
                |g, v| *g = *g + v,
            );
        }
    }

    pub fn zero_accumulated(&mut self) {
        for acc in &mut self.grads.accumulated {
            acc.fill(T::zero());
        }
    }

    /// Set the gradients to the accumulated sum divided by `batch_len`.
    pub fn average_accumulated(&mut self, batch_len: usize) {
        assert!(batch_len > 0, "batch_len must be > 0");
        let n = T::from(batch_len).unwrap_or_else(T::one);
        for (g, acc) in self.grads.gradient.iter_mut().zip(&self.grads.accumulated) {
            for (gi, &ai) in g.iter_mut().zip(acc) {
                *gi = ai / n;
            }
        }
    }
}

#[inline]
fn write_gradients<T: Scalar>(
    layer: &Layer<T>,
    x: &[T],
    errors: &[T],
    lr: T,
    out: &mut [T],
    mut store: impl FnMut(&mut T, T),
) {
    let fan_in = layer.fan_in();
    let in_dim = layer.in_dim();
    debug_assert_eq!(x.len(), in_dim);
    debug_assert_eq!(out.len(), layer.num_weights());

    for (row, &e) in out.chunks_exact_mut(fan_in).zip(errors) {
        let scaled = lr * e;
        for (g, &xk) in row[..in_dim].iter_mut().zip(x) {
            store(g, scaled * xk);
        }
        if layer.has_bias() {
            store(&mut row[in_dim], scaled);
        }
    }
}
