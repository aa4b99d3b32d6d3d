//! Feature and label matrices.
//!
//! `Inputs` (X) and `Dataset` (X with targets Y) keep every sample in one row-major
//! buffer, so the training loop only ever hands out slices. Construction rejects ragged
//! rows and non-finite values.

use rand::Rng;

use crate::{Error, Result, Scalar};

/// A collection of input samples (X).
///
/// Stored as a contiguous buffer with row-major layout:
/// - `inputs.len() == len * input_dim`
#[derive(Debug, Clone)]
pub struct Inputs<T = f32> {
    inputs: Vec<T>,
    len: usize,
    input_dim: usize,
}

impl<T: Scalar> Inputs<T> {
    /// Build inputs from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(inputs: Vec<T>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if inputs.len() % input_dim != 0 {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {}",
                inputs.len(),
                input_dim
            )));
        }

        check_finite("inputs", &inputs)?;
        let len = inputs.len() / input_dim;

        Ok(Self {
            inputs,
            len,
            input_dim,
        })
    }

    /// Build inputs from per-sample rows (copied into contiguous storage).
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let (inputs, input_dim) = flatten_rows("input", rows)?;
        Ok(Self {
            len: rows.len(),
            inputs,
            input_dim,
        })
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[T] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        swap_rows(&mut self.inputs, self.input_dim, a, b);
    }
}

/// A supervised dataset: inputs (X) and targets (Y).
///
/// Stored as contiguous buffers with row-major layout:
/// - `inputs.len() == len * input_dim`
/// - `targets.len() == len * target_dim`
#[derive(Debug, Clone)]
pub struct Dataset<T = f32> {
    inputs: Inputs<T>,
    targets: Vec<T>,
    target_dim: usize,
}

impl<T: Scalar> Dataset<T> {
    /// Build a dataset from flat buffers.
    ///
    /// `inputs` is `(len, input_dim)` and `targets` is `(len, target_dim)`.
    pub fn from_flat(
        inputs: Vec<T>,
        targets: Vec<T>,
        input_dim: usize,
        target_dim: usize,
    ) -> Result<Self> {
        let inputs = Inputs::from_flat(inputs, input_dim)?;
        if target_dim == 0 {
            return Err(Error::InvalidData("target_dim must be > 0".to_owned()));
        }

        if targets.len() != inputs.len() * target_dim {
            return Err(Error::InvalidData(format!(
                "targets length {} does not match len * target_dim ({} * {})",
                targets.len(),
                inputs.len(),
                target_dim
            )));
        }

        check_finite("targets", &targets)?;
        Ok(Self {
            inputs,
            targets,
            target_dim,
        })
    }

    /// Build a dataset from paired per-sample rows.
    pub fn from_rows(inputs: &[Vec<T>], targets: &[Vec<T>]) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "{} input rows but {} target rows",
                inputs.len(),
                targets.len()
            )));
        }

        let inputs = Inputs::from_rows(inputs)?;
        let (targets, target_dim) = flatten_rows("target", targets)?;
        Ok(Self {
            inputs,
            targets,
            target_dim,
        })
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.inputs.input_dim()
    }

    #[inline]
    /// Returns the per-sample target dimension.
    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    #[inline]
    /// Returns a view of the inputs (X).
    pub fn inputs(&self) -> &Inputs<T> {
        &self.inputs
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn input(&self, idx: usize) -> &[T] {
        self.inputs.input(idx)
    }

    #[inline]
    /// Returns the `idx`-th target row (shape: `(target_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn target(&self, idx: usize) -> &[T] {
        let start = idx * self.target_dim;
        &self.targets[start..start + self.target_dim]
    }

    /// Swap two samples, keeping every input paired with its target.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.inputs.swap_rows(a, b);
        swap_rows(&mut self.targets, self.target_dim, a, b);
    }

    /// Fisher-Yates shuffle of the samples, in place.
    ///
    /// For `i` from `len - 1` down to 1, swaps sample `i` with a uniformly chosen sample
    /// in `0..=i`. Inputs and targets move in lockstep.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.swap(i, j);
        }
    }
}

fn swap_rows<T>(buf: &mut [T], dim: usize, a: usize, b: usize) {
    if a == b {
        return;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let (left, right) = buf.split_at_mut(hi * dim);
    left[lo * dim..(lo + 1) * dim].swap_with_slice(&mut right[..dim]);
}

/// Copy equally long, non-empty rows into one row-major buffer.
fn flatten_rows<T: Scalar>(what: &str, rows: &[Vec<T>]) -> Result<(Vec<T>, usize)> {
    let dim = match rows.first() {
        Some(row) if !row.is_empty() => row.len(),
        Some(_) => return Err(Error::InvalidData(format!("{what} rows must not be empty"))),
        None => return Err(Error::InvalidData(format!("no {what} rows given"))),
    };

    let mut flat = Vec::with_capacity(rows.len() * dim);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != dim {
            return Err(Error::InvalidData(format!(
                "{what} row {i} has {} values, expected {dim}",
                row.len()
            )));
        }
        flat.extend_from_slice(row);
    }

    check_finite(what, &flat)?;
    Ok((flat, dim))
}

fn check_finite<T: Scalar>(what: &str, values: &[T]) -> Result<()> {
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::InvalidData(format!(
            "{what} must be finite, found {} at flat index {pos}",
            values[pos]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn dataset_from_flat_validates_shapes() {
        let ok = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0], 2, 1);
        assert!(ok.is_ok());

        let err = Dataset::from_flat(vec![0.0, 1.0, 2.0], vec![0.0], 2, 1);
        assert!(err.is_err());
    }

    #[test]
    fn from_rows_rejects_ragged_and_non_finite() {
        let ragged =
            Dataset::<f32>::from_rows(&[vec![0.0, 1.0], vec![1.0]], &[vec![0.0], vec![1.0]]);
        assert!(matches!(ragged, Err(Error::InvalidData(_))));

        let nan = Dataset::<f32>::from_rows(&[vec![f32::NAN]], &[vec![0.0]]);
        assert!(nan.is_err());

        let count = Dataset::<f32>::from_rows(&[vec![0.0]], &[vec![0.0], vec![1.0]]);
        assert!(count.is_err());
    }

    #[test]
    fn shuffle_is_a_permutation_that_keeps_pairs() {
        let n = 50;
        let inputs: Vec<f64> = (0..n).flat_map(|i| [i as f64, -(i as f64)]).collect();
        let targets: Vec<f64> = (0..n).map(|i| 10.0 * i as f64).collect();
        let mut data = Dataset::from_flat(inputs, targets, 2, 1).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        data.shuffle(&mut rng);

        let mut seen: Vec<usize> = (0..n)
            .map(|idx| {
                let x = data.input(idx);
                assert_eq!(x[1], -x[0]);
                assert_eq!(data.target(idx)[0], 10.0 * x[0]);
                x[0] as usize
            })
            .collect();
        let moved = seen.iter().enumerate().filter(|&(i, &v)| i != v).count();
        assert!(moved > 0);

        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }
}
