//! XOR demo: a 2-3-1 sigmoid network trained online with Adam.
//!
//! Run with `RUST_LOG=debug` to see per-epoch progress.

use rna::{Activation, Dataset, Loss, Network, OptimizerKind};

const EPOCHS: usize = 500;

fn print_predictions(net: &Network<f32>, data: &Dataset<f32>) -> rna::Result<()> {
    for idx in 0..data.len() {
        let input = data.input(idx);
        let output = net.predict(input)?;
        println!("  {input:?} -> {:.4} (target {})", output[0], data.target(idx)[0]);
    }
    Ok(())
}

fn main() -> rna::Result<()> {
    env_logger::init();

    let xs = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
    let ys = vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]];
    let train = Dataset::from_rows(&xs, &ys)?;

    let mut net = Network::<f32>::new(&[2, 3, 1])?;
    net.set_name("xor");
    net.set_seed(0)?;
    net.set_learning_rate(0.1)?;
    net.set_activations(Activation::Sigmoid)?;
    net.set_optimizer_kind(OptimizerKind::from_code(5, false)?)?;
    net.set_cost_history(true);
    net.compile()?;

    println!("{net}");
    println!("before training (mse {:.5}):", net.loss(&train, Loss::Mse)?);
    print_predictions(&net, &train)?;

    net.train_online(&train, EPOCHS)?;

    println!("after {EPOCHS} epochs (mse {:.5}):", net.loss(&train, Loss::Mse)?);
    print_predictions(&net, &train)?;

    if let Some(history) = net.cost_history() {
        if let (Some(first), Some(last)) = (history.first(), history.last()) {
            println!("cost history: {first:.5} -> {last:.5} over {} epochs", history.len());
        }
    }
    Ok(())
}
