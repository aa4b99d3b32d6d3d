use rna::{
    Activation, Dataset, Error, Loss, Network, NetworkBuilder, OptimizerKind, Trainer, Unit,
};

const TANH_LINEAR: [Activation; 2] = [Activation::TanH, Activation::Linear];

fn xor() -> Dataset {
    let xs = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    Dataset::from_rows(&xs, &ys).unwrap()
}

fn xor_network(seed: u64, optimizer: OptimizerKind) -> Network {
    let mut net = Network::<f32>::new(&[2, 3, 1]).unwrap();
    net.set_seed(seed).unwrap();
    net.set_learning_rate(0.1).unwrap();
    net.set_optimizer_kind(optimizer).unwrap();
    net.compile().unwrap();
    net
}

fn solves_xor(net: &Network, data: &Dataset) -> bool {
    (0..data.len()).all(|idx| {
        let y = net.predict(data.input(idx)).unwrap()[0];
        (y > 0.5) == (data.target(idx)[0] > 0.5)
    })
}

/// `y = 0.5 * a - 0.25 * b + 0.1` sampled on a small grid.
fn linear_regression() -> Dataset<f64> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..5 {
        for j in 0..5 {
            let (a, b) = (i as f64 / 4.0, j as f64 / 4.0);
            xs.push(vec![a, b]);
            ys.push(vec![0.5 * a - 0.25 * b + 0.1]);
        }
    }
    Dataset::from_rows(&xs, &ys).unwrap()
}

#[test]
fn adam_learns_xor() {
    let data = xor();
    // Three hidden units can stall in a local minimum for an unlucky draw.
    let solved = (0..8).any(|seed| {
        let mut net = xor_network(seed, OptimizerKind::from_code(5, false).unwrap());
        net.train_online(&data, 2000).unwrap();
        solves_xor(&net, &data)
    });
    assert!(solved, "no seed in 0..8 learned XOR");
}

#[test]
fn sgd_moves_xor_output_for_0_1_toward_one() {
    // Sigmoid 2-3-1, lr 0.1, 500 online epochs with the default optimizer (SGD,
    // momentum 0). Seed 0 only drives the shuffle: the starting weights are pinned
    // so the run does not hinge on a lucky draw. Hidden unit 0 is roughly OR,
    // unit 1 roughly AND, unit 2 is constant; the output starts as a weak OR - AND.
    let xs = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let data = Dataset::<f64>::from_rows(&xs, &ys).unwrap();
    let mut net = Network::<f64>::new(&[2, 3, 1]).unwrap();
    net.set_seed(0).unwrap();
    net.set_learning_rate(0.1).unwrap();
    net.set_activations(Activation::Sigmoid).unwrap();
    net.compile().unwrap();
    assert_eq!(net.optimizer().name(), "SGD");

    let layers = net.layers_mut().unwrap();
    let hidden = layers[0].units_mut();
    hidden[0] = Unit::from_weights(vec![6.0, 6.0, -3.0]);
    hidden[1] = Unit::from_weights(vec![6.0, 6.0, -9.0]);
    hidden[2] = Unit::from_weights(vec![0.0, 0.0, 0.0]);
    layers[1].units_mut()[0] = Unit::from_weights(vec![1.0, -1.0, 0.0, -0.5]);

    let before = net.predict(&[0.0, 1.0]).unwrap()[0];
    assert!((before - 0.6).abs() < 0.01, "before={before}");

    net.train_online(&data, 500).unwrap();
    let after = net.predict(&[0.0, 1.0]).unwrap()[0];
    assert!((1.0 - after).abs() < (1.0 - before).abs(), "{before} -> {after}");
}

#[test]
fn adam_lowers_xor_mse() {
    let data = xor();
    let mut net = xor_network(3, OptimizerKind::from_code(5, false).unwrap());
    let before = net.loss(&data, Loss::Mse).unwrap();
    net.train_online(&data, 500).unwrap();
    let after = net.loss(&data, Loss::Mse).unwrap();
    assert!(after < before, "mse went from {before} to {after}");
}

#[test]
fn every_optimizer_reduces_regression_loss() {
    let data = linear_regression();
    let kinds = [
        OptimizerKind::GradientDescent,
        OptimizerKind::Sgd { nesterov: false },
        OptimizerKind::Sgd { nesterov: true },
        OptimizerKind::from_code(3, false).unwrap(),
        OptimizerKind::from_code(4, false).unwrap(),
        OptimizerKind::from_code(5, false).unwrap(),
        OptimizerKind::Nadam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        },
    ];

    for kind in kinds {
        let mut net = NetworkBuilder::<f64>::from_shape(&[2, 4, 1], &TANH_LINEAR)
            .unwrap()
            .learning_rate(0.01)
            .momentum(0.5)
            .weight_range(0.5)
            .optimizer(kind)
            .seed(5)
            .build()
            .unwrap();

        let before = net.loss(&data, Loss::Mse).unwrap();
        net.train_online(&data, 50).unwrap();
        let after = net.loss(&data, Loss::Mse).unwrap();
        assert!(after < before, "{}: mse went from {before} to {after}", kind.name());
    }
}

#[test]
fn batched_training_reduces_loss_and_records_history() {
    let data = linear_regression();
    let mut net = NetworkBuilder::<f64>::from_shape(&[2, 4, 1], &TANH_LINEAR)
        .unwrap()
        .learning_rate(0.05)
        .weight_range(0.5)
        .cost_history(true)
        .seed(9)
        .build()
        .unwrap();

    let before = net.loss(&data, Loss::Mse).unwrap();
    net.train_batched(&data, 200, 5).unwrap();
    let after = net.loss(&data, Loss::Mse).unwrap();
    assert!(after < before, "mse went from {before} to {after}");

    let history = net.cost_history().unwrap();
    assert_eq!(history.len(), 200);
    assert!((history[199] - after).abs() < 1e-12);
}

#[test]
fn softmax_classifier_improves_accuracy() {
    // Two well-separated clusters.
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for i in 0..10 {
        let d = i as f32 * 0.02;
        xs.push(vec![0.1 + d, 0.2 - d]);
        ys.push(vec![1.0, 0.0]);
        xs.push(vec![0.9 - d, 0.8 + d]);
        ys.push(vec![0.0, 1.0]);
    }
    let data = Dataset::from_rows(&xs, &ys).unwrap();

    let mut net = Network::<f32>::new(&[2, 4, 2]).unwrap();
    net.set_seed(2).unwrap();
    net.set_learning_rate(0.05).unwrap();
    net.set_output_activation(Activation::Softmax).unwrap();
    net.set_optimizer_kind(OptimizerKind::from_code(5, false).unwrap()).unwrap();
    net.compile().unwrap();

    let before = net.loss(&data, Loss::CrossEntropy).unwrap();
    net.train_online(&data, 100).unwrap();
    assert!(net.loss(&data, Loss::CrossEntropy).unwrap() < before);
    assert_eq!(net.accuracy(&data).unwrap(), 1.0);
    assert_eq!(net.f1_score(&data).unwrap(), 1.0);
}

#[test]
fn manual_training_step_matches_train_online() {
    let data = xor();
    let mut auto = xor_network(4, OptimizerKind::GradientDescent);
    auto.set_shuffle(false);
    let mut manual = auto.clone();

    auto.train_online(&data, 1).unwrap();

    let mut trainer = Trainer::new(&manual).unwrap();
    let lr = manual.config().learning_rate;
    for idx in 0..data.len() {
        let (x, t) = (data.input(idx), data.target(idx));
        manual.forward(x, &mut trainer.scratch).unwrap();
        trainer.backpropagate(manual.layers().unwrap(), t);
        trainer.compute_gradients(manual.layers().unwrap(), x, lr);
        manual.apply_gradients(&trainer.grads).unwrap();
    }

    for (a, m) in auto.layers().unwrap().iter().zip(manual.layers().unwrap()) {
        for (ua, um) in a.units().iter().zip(m.units()) {
            for (wa, wm) in ua.weights().iter().zip(um.weights()) {
                assert!((wa - wm).abs() < 1e-6, "{wa} vs {wm}");
            }
        }
    }
}

#[test]
fn finite_difference_training_lowers_cost() {
    let data = xor();
    let mut net = xor_network(1, OptimizerKind::GradientDescent);
    net.set_learning_rate(0.5).unwrap();
    let before = net.loss(&data, Loss::Mse).unwrap();
    let updates = net.train_finite_difference(&data, 1e-3, 50, 0.0).unwrap();
    assert_eq!(updates, 50);
    assert!(net.loss(&data, Loss::Mse).unwrap() < before);
}

#[test]
fn invalid_calls_leave_the_network_untouched() {
    let data = xor();

    let mut uncompiled = Network::<f32>::new(&[2, 3, 1]).unwrap();
    assert_eq!(uncompiled.train_online(&data, 1), Err(Error::NotCompiled));
    assert_eq!(uncompiled.predict(&[0.0, 1.0]), Err(Error::NotCompiled));

    let mut net = xor_network(0, OptimizerKind::default());
    let snapshot = net.layers().unwrap().to_vec();

    assert_eq!(net.train_online(&data, 0), Err(Error::InvalidEpochs(0)));
    assert!(matches!(
        net.train_batched(&data, 1, 5),
        Err(Error::InvalidBatchSize { batch_size: 5, len: 4 })
    ));
    assert!(matches!(net.train_batched(&data, 1, 0), Err(Error::InvalidBatchSize { .. })));

    let wide = Dataset::from_rows(&[vec![0.0, 0.0, 0.0]], &[vec![0.0]]).unwrap();
    assert!(matches!(net.train_online(&wide, 1), Err(Error::DimensionMismatch { .. })));
    assert!(matches!(net.predict(&[0.0]), Err(Error::DimensionMismatch { .. })));

    assert!(matches!(net.set_bias(false), Err(Error::AlreadyCompiled(_))));
    assert!(matches!(net.set_learning_rate(-0.1), Err(Error::InvalidHyperparameter(_))));
    assert!(net.set_activation(0, Activation::Softmax).is_err());

    net.set_output_activation(Activation::Argmax).unwrap();
    assert!(matches!(net.train_online(&data, 1), Err(Error::UnsupportedOutput(_))));
    assert!(matches!(
        net.train_finite_difference(&data, 1e-3, 1, 0.0),
        Err(Error::UnsupportedOutput(_))
    ));

    assert_eq!(net.layers().unwrap()[0], snapshot[0]);
    assert_eq!(net.layers().unwrap()[1].units(), snapshot[1].units());
}

#[cfg(feature = "serde")]
#[test]
fn save_and_load_resumes_training_identically() {
    let data = xor();
    let mut net = xor_network(6, OptimizerKind::from_code(5, false).unwrap());
    net.set_name("xor-persist");
    net.set_shuffle(false);
    net.train_online(&data, 10).unwrap();

    let path = std::env::temp_dir().join(format!("rna-training-{}.json", std::process::id()));
    net.save_json(&path).unwrap();
    let mut loaded = Network::<f32>::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.name(), "xor-persist");
    assert_eq!(loaded.optimizer().step_count(), net.optimizer().step_count());
    for idx in 0..data.len() {
        assert_eq!(loaded.predict(data.input(idx)).unwrap(), net.predict(data.input(idx)).unwrap());
    }

    net.train_online(&data, 5).unwrap();
    loaded.train_online(&data, 5).unwrap();
    for (a, b) in net.layers().unwrap().iter().zip(loaded.layers().unwrap()) {
        for (ua, ub) in a.units().iter().zip(b.units()) {
            for (wa, wb) in ua.weights().iter().zip(ub.weights()) {
                assert!((wa - wb).abs() < 1e-6, "{wa} vs {wb}");
            }
        }
    }
}
