//! Metrics.
//!
//! Metrics are evaluation helpers (they do not participate in backprop). Classification
//! metrics compare the index of the largest predicted output with the index of the
//! largest target value, so one-hot targets work with any output activation.

use crate::activation::argmax;
use crate::network::forward_layers;
use crate::{Dataset, Error, Network, Result, Scalar, Scratch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Supported evaluation metrics.
pub enum Metric {
    /// Fraction of samples whose predicted class matches the target class.
    Accuracy,
    /// Unweighted mean of the per-class F1 scores.
    F1Score,
    /// Mean over samples of the summed absolute output error.
    Mae,
}

impl<T: Scalar> Network<T> {
    /// Evaluate one metric over `data`.
    pub fn evaluate(&self, data: &Dataset<T>, metric: Metric) -> Result<f64> {
        match metric {
            Metric::Accuracy => self.accuracy(data),
            Metric::F1Score => self.f1_score(data),
            Metric::Mae => self.mean_absolute_error(data),
        }
    }

    pub fn accuracy(&self, data: &Dataset<T>) -> Result<f64> {
        let matrix = self.confusion_matrix(data)?;
        let correct: usize = (0..matrix.len()).map(|i| matrix[i][i]).sum();
        Ok(correct as f64 / data.len() as f64)
    }

    /// Confusion matrix indexed `[actual][predicted]`.
    ///
    /// Needs at least two output units.
    pub fn confusion_matrix(&self, data: &Dataset<T>) -> Result<Vec<Vec<usize>>> {
        let layers = self.check_dataset(data)?;
        let classes = self.output_dim();
        if classes < 2 {
            return Err(Error::UnsupportedOutput(format!(
                "classification metrics need at least 2 output units, got {classes}"
            )));
        }

        let mut scratch = Scratch::for_layers(layers);
        let mut matrix = vec![vec![0_usize; classes]; classes];
        for idx in 0..data.len() {
            forward_layers(layers, data.input(idx), &mut scratch);
            let actual = argmax(data.target(idx));
            let predicted = argmax(scratch.output());
            matrix[actual][predicted] += 1;
        }
        Ok(matrix)
    }

    /// Macro-averaged F1 score. Classes with no true or predicted samples count as 0.
    pub fn f1_score(&self, data: &Dataset<T>) -> Result<f64> {
        Ok(macro_f1(&self.confusion_matrix(data)?))
    }

    pub fn mean_absolute_error(&self, data: &Dataset<T>) -> Result<f64> {
        Ok(self.loss(data, crate::Loss::Mae)?.as_f64())
    }
}

/// Macro-averaged F1 from a `[actual][predicted]` confusion matrix.
pub fn macro_f1(matrix: &[Vec<usize>]) -> f64 {
    let classes = matrix.len();
    if classes == 0 {
        return 0.0;
    }

    let mut sum = 0.0;
    for c in 0..classes {
        let tp = matrix[c][c] as f64;
        let fp: usize = (0..classes).filter(|&r| r != c).map(|r| matrix[r][c]).sum();
        let fn_: usize = (0..classes).filter(|&p| p != c).map(|p| matrix[c][p]).sum();

        let precision = if tp + fp as f64 > 0.0 { tp / (tp + fp as f64) } else { 0.0 };
        let recall = if tp + fn_ as f64 > 0.0 { tp / (tp + fn_ as f64) } else { 0.0 };
        if precision + recall > 0.0 {
            sum += 2.0 * precision * recall / (precision + recall);
        }
    }
    sum / classes as f64
}
