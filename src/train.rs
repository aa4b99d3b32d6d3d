//! Training loops.
//!
//! All entry points validate their inputs before touching any state, then run a fixed
//! number of epochs over a private copy of the dataset (so shuffling never reorders the
//! caller's rows). Per-step work reuses one `Trainer` and does not allocate.

use log::{debug, info, trace};

use crate::loss::dataset_loss;
use crate::network::forward_layers;
use crate::{Dataset, Error, Loss, Network, Result, Scalar, Scratch, Trainer};

impl<T: Scalar> Network<T> {
    fn check_training(&self, data: &Dataset<T>, epochs: usize) -> Result<()> {
        let layers = self.check_dataset(data)?;
        if epochs == 0 {
            return Err(Error::InvalidEpochs(epochs));
        }
        if layers.last().is_some_and(|l| l.is_argmax()) {
            return Err(Error::UnsupportedOutput(
                "an Argmax output layer has no gradient; use it for inference only".to_owned(),
            ));
        }
        Ok(())
    }

    /// Online training: one weight update per sample.
    ///
    /// Per sample: forward, backpropagate, `gradient = lr * error * input`, optimizer step.
    pub fn train_online(&mut self, data: &Dataset<T>, epochs: usize) -> Result<()> {
        self.check_training(data, epochs)?;
        self.run_epochs(data, epochs, None)
    }

    /// Mini-batch training: one weight update per batch of `batch_size` samples (the
    /// last batch may be shorter), using the gradient averaged over the batch.
    pub fn train_batched(
        &mut self,
        data: &Dataset<T>,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()> {
        self.check_training(data, epochs)?;
        if batch_size == 0 || batch_size > data.len() {
            return Err(Error::InvalidBatchSize {
                batch_size,
                len: data.len(),
            });
        }
        self.run_epochs(data, epochs, Some(batch_size))
    }

    fn run_epochs(
        &mut self,
        data: &Dataset<T>,
        epochs: usize,
        batch_size: Option<usize>,
    ) -> Result<()> {
        let mut trainer = Trainer::new(self)?;
        let mut rows = data.clone();
        let lr = self.config.learning_rate;
        let momentum = self.config.momentum;
        let history_loss = self.history_loss();

        info!(
            "training {:?} for {epochs} epochs on {} samples: optimizer {}, batch size {}",
            self.name(),
            data.len(),
            self.optimizer.name(),
            batch_size.unwrap_or(1)
        );

        for epoch in 0..epochs {
            if self.config.shuffle {
                rows.shuffle(&mut self.rng);
            }

            let layers = self.layers.as_mut().ok_or(Error::NotCompiled)?;
            match batch_size {
                None => {
                    for idx in 0..rows.len() {
                        let (input, target) = (rows.input(idx), rows.target(idx));
                        forward_layers(layers, input, &mut trainer.scratch);
                        trainer.backpropagate(layers, target);
                        trainer.compute_gradients(layers, input, lr);
                        self.optimizer.apply(layers, &trainer.grads, lr, momentum);
                    }
                }
                Some(batch_size) => {
                    for (batch, start) in (0..rows.len()).step_by(batch_size).enumerate() {
                        let end = (start + batch_size).min(rows.len());
                        trainer.zero_accumulated();
                        for idx in start..end {
                            let (input, target) = (rows.input(idx), rows.target(idx));
                            forward_layers(layers, input, &mut trainer.scratch);
                            trainer.backpropagate(layers, target);
                            trainer.accumulate_gradients(layers, input, lr);
                        }
                        trainer.average_accumulated(end - start);
                        self.optimizer.apply(layers, &trainer.grads, lr, momentum);
                        trace!("epoch {epoch} batch {batch}: {} samples", end - start);
                    }
                }
            }

            if self.config.cost_history {
                let cost = dataset_loss(layers, data, &mut trainer.scratch, history_loss);
                self.cost_history.push(cost);
                debug!("epoch {epoch}: {} {cost}", history_loss.name());
            } else {
                debug!("epoch {epoch} done");
            }
        }

        info!("training {:?} finished after {epochs} epochs", self.name());
        Ok(())
    }

    /// Train with forward-difference gradients instead of backpropagation.
    ///
    /// Each epoch measures the dataset MSE and stops early once it falls below
    /// `min_cost`. Otherwise every weight is nudged by `eps` in turn to estimate
    /// `dMSE/dw = (MSE' - MSE) / eps`, and all weights then move by `-lr * dMSE/dw`.
    ///
    /// Returns the number of epochs that updated the weights.
    pub fn train_finite_difference(
        &mut self,
        data: &Dataset<T>,
        eps: T,
        epochs: usize,
        min_cost: T,
    ) -> Result<usize> {
        self.check_training(data, epochs)?;
        if !(eps.is_finite() && eps != T::zero()) {
            return Err(Error::InvalidHyperparameter(format!(
                "finite-difference eps must be finite and non-zero, got {eps}"
            )));
        }
        if !(min_cost.is_finite() && min_cost >= T::zero()) {
            return Err(Error::InvalidHyperparameter(format!(
                "min_cost must be finite and >= 0, got {min_cost}"
            )));
        }

        // The clone's weights hold the gradient estimates.
        let mut grad_net = self.clone_for_gradient_check()?;
        let lr = self.config.learning_rate;
        let history_loss = self.history_loss();

        info!(
            "finite-difference training {:?} for up to {epochs} epochs \
             (eps {eps}, min cost {min_cost})",
            self.name()
        );

        let layers = self.layers.as_mut().ok_or(Error::NotCompiled)?;
        let grad_layers = grad_net.layers_mut()?;
        let mut scratch = Scratch::for_layers(layers);

        let mut updated = 0;
        for epoch in 0..epochs {
            let cost = dataset_loss(layers, data, &mut scratch, Loss::Mse);
            if self.config.cost_history {
                let recorded = match history_loss {
                    Loss::Mse => cost,
                    other => dataset_loss(layers, data, &mut scratch, other),
                };
                self.cost_history.push(recorded);
            }
            debug!("epoch {epoch}: mse {cost}");
            if cost < min_cost {
                debug!("cost {cost} below {min_cost}, stopping");
                break;
            }

            for l in 0..layers.len() {
                for j in 0..layers[l].out_dim() {
                    for k in 0..layers[l].fan_in() {
                        let orig = layers[l].units()[j].weights()[k];
                        layers[l].units_mut()[j].weights_mut()[k] = orig + eps;
                        let nudged = dataset_loss(layers, data, &mut scratch, Loss::Mse);
                        layers[l].units_mut()[j].weights_mut()[k] = orig;
                        grad_layers[l].units_mut()[j].weights_mut()[k] = (nudged - cost) / eps;
                    }
                }
            }

            for (layer, grad_layer) in layers.iter_mut().zip(grad_layers.iter()) {
                for (unit, grad_unit) in layer.units_mut().iter_mut().zip(grad_layer.units()) {
                    for (w, &g) in unit.weights_mut().iter_mut().zip(grad_unit.weights()) {
                        *w = *w - lr * g;
                    }
                }
            }
            updated += 1;
        }

        info!(
            "finite-difference training {:?} finished after {updated} updates",
            self.name()
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Activation, GradientDescent};

    fn xor() -> Dataset<f64> {
        Dataset::from_rows(
            &[vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            &[vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        )
        .unwrap()
    }

    fn net(seed: u64) -> Network<f64> {
        let mut net = Network::new(&[2, 3, 1]).unwrap();
        net.set_seed(seed).unwrap();
        net.compile().unwrap();
        net
    }

    #[test]
    fn training_validates_before_mutating() {
        let mut n = net(0);
        let before = n.layers().unwrap().to_vec();
        let data = xor();

        assert_eq!(n.train_online(&data, 0), Err(Error::InvalidEpochs(0)));
        assert_eq!(
            n.train_batched(&data, 1, 0),
            Err(Error::InvalidBatchSize { batch_size: 0, len: 4 })
        );
        assert_eq!(
            n.train_batched(&data, 1, 5),
            Err(Error::InvalidBatchSize { batch_size: 5, len: 4 })
        );
        assert!(matches!(
            n.train_finite_difference(&data, 0.0, 1, 0.0),
            Err(Error::InvalidHyperparameter(_))
        ));
        assert!(n.train_finite_difference(&data, 1e-4, 1, -1.0).is_err());

        let wide = Dataset::from_rows(&[vec![0.0, 0.0, 0.0]], &[vec![0.0]]).unwrap();
        assert_eq!(
            n.train_online(&wide, 1),
            Err(Error::DimensionMismatch {
                what: "dataset inputs",
                expected: 2,
                actual: 3
            })
        );

        assert_eq!(n.layers().unwrap(), before.as_slice());
    }

    #[test]
    fn argmax_output_cannot_be_trained() {
        let mut n = Network::<f64>::new(&[2, 3, 2]).unwrap();
        n.set_output_activation(Activation::Argmax).unwrap();
        n.compile().unwrap();
        let data = Dataset::from_rows(&[vec![0.0, 1.0]], &[vec![1.0, 0.0]]).unwrap();
        assert!(matches!(n.train_online(&data, 1), Err(Error::UnsupportedOutput(_))));
        assert!(matches!(n.train_batched(&data, 1, 1), Err(Error::UnsupportedOutput(_))));

        // Inference still works.
        let out = n.predict(&[0.0, 1.0]).unwrap();
        assert_eq!(out.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn untrained_network_requires_compile() {
        let mut n = Network::<f64>::new(&[2, 3, 1]).unwrap();
        assert_eq!(n.train_online(&xor(), 1), Err(Error::NotCompiled));
    }

    #[test]
    fn full_batch_step_equals_mean_of_online_gradients() {
        // With gradient descent and no shuffling, one full-batch epoch moves each weight
        // by the mean of the per-sample gradients computed at the starting weights.
        let data = xor();
        let mut batched = net(4);
        batched.set_optimizer(GradientDescent).unwrap();
        batched.set_shuffle(false);
        batched.set_learning_rate(0.5).unwrap();
        let start = batched.clone();

        let mut expected = start.layers().unwrap().to_vec();
        let layers = start.layers().unwrap();
        let mut trainer = Trainer::new(&start).unwrap();
        for idx in 0..data.len() {
            forward_layers(layers, data.input(idx), &mut trainer.scratch);
            trainer.backpropagate(layers, data.target(idx));
            trainer.compute_gradients(layers, data.input(idx), 0.5);
            for (l, layer) in expected.iter_mut().enumerate() {
                let fan_in = layer.fan_in();
                for (j, unit) in layer.units_mut().iter_mut().enumerate() {
                    for (k, w) in unit.weights_mut().iter_mut().enumerate() {
                        *w += trainer.grads.gradient(l)[j * fan_in + k] / data.len() as f64;
                    }
                }
            }
        }

        batched.train_batched(&data, 1, data.len()).unwrap();
        for (a, b) in batched.layers().unwrap().iter().zip(&expected) {
            for (ua, ub) in a.units().iter().zip(b.units()) {
                for (wa, wb) in ua.weights().iter().zip(ub.weights()) {
                    assert!((wa - wb).abs() < 1e-12, "{wa} vs {wb}");
                }
            }
        }
    }

    #[test]
    fn cost_history_records_one_value_per_epoch() {
        let mut n = net(1);
        n.set_cost_history(true);
        n.train_online(&xor(), 5).unwrap();
        assert_eq!(n.cost_history().unwrap().len(), 5);

        n.set_output_activation(Activation::Softmax).unwrap();
        n.train_batched(&xor(), 2, 2).unwrap();
        assert_eq!(n.cost_history().unwrap().len(), 7);

        n.set_cost_history(false);
        assert!(n.cost_history().is_none());
    }

    #[test]
    fn finite_difference_lowers_cost_and_stops_at_min_cost() {
        let data = xor();
        let mut n = net(2);
        n.set_learning_rate(0.5).unwrap();

        let before = n.loss(&data, Loss::Mse).unwrap();
        let updates = n.train_finite_difference(&data, 1e-6, 20, 0.0).unwrap();
        assert_eq!(updates, 20);
        assert!(n.loss(&data, Loss::Mse).unwrap() < before);

        // Already below the threshold: no update at all.
        let weights = n.layers().unwrap().to_vec();
        let updates = n.train_finite_difference(&data, 1e-6, 20, 1e9).unwrap();
        assert_eq!(updates, 0);
        assert_eq!(n.layers().unwrap(), weights.as_slice());
    }
}
