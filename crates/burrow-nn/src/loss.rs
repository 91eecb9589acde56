// Loss functions attached to output units
//
// The graph engine's backward pass starts from a gradient with respect to
// each declared output. When the caller supplies labels instead, an output
// unit's loss function turns (activation, labels) into that gradient and a
// scalar score:
//
//   Mse:     score = Σ (a - y)² / (batch · width)
//            grad  = 2 (a - y) / (batch · width)
//
//   McXent:  score = -Σ y · ln(a) / batch
//            grad  = -y / a / batch
//
// `a` is clamped away from zero before the log / division.

use burrow_core::error::{Error, Result};
use burrow_core::tensor::Tensor;

const PROB_FLOOR: f64 = 1e-10;

/// Loss function of an output unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossFunction {
    /// Mean squared error, averaged over batch and features.
    Mse,
    /// Multi-class cross entropy, expects probabilities (softmax output).
    McXent,
}

impl LossFunction {
    fn check(output: &Tensor, labels: &Tensor) -> Result<usize> {
        if output.shape() != labels.shape() {
            return Err(Error::ShapeMismatch {
                expected: output.shape().clone(),
                got: labels.shape().clone(),
            });
        }
        let batch = output.dim(0)?;
        if batch == 0 {
            return Err(Error::EmptyBatch);
        }
        Ok(batch)
    }

    /// Scalar loss averaged over the minibatch.
    pub fn score(&self, output: &Tensor, labels: &Tensor) -> Result<f64> {
        let batch = Self::check(output, labels)? as f64;
        let pairs = output.data().iter().zip(labels.data());
        Ok(match self {
            LossFunction::Mse => {
                let width = (output.elem_count() as f64 / batch).max(1.0);
                pairs.map(|(a, y)| (a - y) * (a - y)).sum::<f64>() / (batch * width)
            }
            LossFunction::McXent => {
                -pairs.map(|(a, y)| y * a.max(PROB_FLOOR).ln()).sum::<f64>() / batch
            }
        })
    }

    /// Gradient of [`score`](Self::score) with respect to the output activation.
    pub fn gradient(&self, output: &Tensor, labels: &Tensor) -> Result<Tensor> {
        let batch = Self::check(output, labels)? as f64;
        match self {
            LossFunction::Mse => {
                let width = (output.elem_count() as f64 / batch).max(1.0);
                let norm = 2.0 / (batch * width);
                output.zip_map(labels, |a, y| norm * (a - y))
            }
            LossFunction::McXent => output.zip_map(labels, |a, y| -y / a.max(PROB_FLOOR) / batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_score_and_gradient() {
        let out = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2)).unwrap();
        let y = Tensor::from_slice(&[1.0, 0.0, 3.0, 2.0], (2, 2)).unwrap();
        let score = LossFunction::Mse.score(&out, &y).unwrap();
        assert!((score - 2.0).abs() < 1e-12);
        let g = LossFunction::Mse.gradient(&out, &y).unwrap();
        assert_eq!(g.to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_mcxent_score() {
        let out = Tensor::from_slice(&[0.5, 0.5, 0.25, 0.75], (2, 2)).unwrap();
        let y = Tensor::from_slice(&[1.0, 0.0, 0.0, 1.0], (2, 2)).unwrap();
        let score = LossFunction::McXent.score(&out, &y).unwrap();
        let expected = -(0.5f64.ln() + 0.75f64.ln()) / 2.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_mismatched_labels() {
        let out = Tensor::zeros((2, 2));
        let y = Tensor::zeros((2, 3));
        assert!(LossFunction::Mse.score(&out, &y).is_err());
    }
}
