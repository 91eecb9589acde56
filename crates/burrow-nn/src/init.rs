// Weight initialization for parameter views
//
// Units own no storage; at build time the graph hands each unit a mutable
// view into its flat parameter buffer and asks it to fill the view. This
// module provides the fill strategies:
//
//   Zero                 — all zeros
//   Uniform(low, high)   — U(low, high)
//   Normal(mean, std)    — N(mean, std)
//   Xavier               — N(0, sqrt(2 / (fan_in + fan_out)))
//   Relu                 — He normal, N(0, sqrt(2 / fan_in))
//
// Biases are always zero-initialized by the units themselves.

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Weight initialization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WeightInit {
    Zero,
    Uniform {
        low: f64,
        high: f64,
    },
    Normal {
        mean: f64,
        std: f64,
    },
    #[default]
    Xavier,
    Relu,
}

impl WeightInit {
    /// Fill `view` for a weight matrix with the given fans.
    pub fn fill(&self, view: &mut [f64], fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Result<()> {
        match *self {
            WeightInit::Zero => view.iter_mut().for_each(|v| *v = 0.0),
            WeightInit::Uniform { low, high } => {
                if high <= low {
                    bail!("uniform init requires low < high, got [{low}, {high})");
                }
                view.iter_mut().for_each(|v| *v = rng.gen_range(low..high));
            }
            WeightInit::Normal { mean, std } => fill_normal(view, mean, std, rng)?,
            WeightInit::Xavier => {
                let std = (2.0 / (fan_in + fan_out).max(1) as f64).sqrt();
                fill_normal(view, 0.0, std, rng)?;
            }
            WeightInit::Relu => {
                let std = (2.0 / fan_in.max(1) as f64).sqrt();
                fill_normal(view, 0.0, std, rng)?;
            }
        }
        Ok(())
    }
}

fn fill_normal(view: &mut [f64], mean: f64, std: f64, rng: &mut StdRng) -> Result<()> {
    let dist = Normal::new(mean, std)
        .map_err(|e| Error::msg(format!("invalid normal init N({mean}, {std}): {e}")))?;
    view.iter_mut().for_each(|v| *v = dist.sample(rng));
    Ok(())
}
