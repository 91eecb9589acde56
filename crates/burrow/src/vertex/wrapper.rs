// Wrappers around recurrent units
//
// BIDIRECTIONAL:
//   Two independent copies of the same recurrent configuration. The forward
//   copy reads the sequence as given; the backward copy reads it (and its
//   mask) reversed along time, and its output is reversed back so both are
//   time-aligned before combining:
//
//     Add      y = f + b
//     Mul      y = f * b
//     Average  y = (f + b) / 2
//     Concat   y = [f, b] along features (width 2 * n_out)
//
//   Parameters: forward copy first ("fwd.*"), backward copy second ("bwd.*").
//
// LAST TIME STEP:
//   Runs a recurrent unit and keeps one timestep per example: the last (or
//   first) step the mask marks present, else the last (or first) step.
//   The chosen indices are kept for the backward pass. The output carries
//   no mask.

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;
use burrow_nn::{ComputeUnit, LayerConf, ParamSpec};
use rand::rngs::StdRng;

use super::VertexCache;
use crate::mask::reverse_time;

/// How the two directions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BidirectionalMode {
    Add,
    Mul,
    Average,
    #[default]
    Concat,
}

#[derive(Debug, Clone)]
pub struct BidirectionalVertex {
    fwd: Box<dyn ComputeUnit>,
    bwd: Box<dyn ComputeUnit>,
    mode: BidirectionalMode,
}

impl BidirectionalVertex {
    pub fn new(conf: &LayerConf, mode: BidirectionalMode) -> Result<Self> {
        if !conf.is_recurrent() {
            return Err(Error::msg("Bidirectional wraps recurrent layers only"));
        }
        Ok(BidirectionalVertex {
            fwd: conf.build()?,
            bwd: conf.build()?,
            mode,
        })
    }

    pub fn mode(&self) -> BidirectionalMode {
        self.mode
    }

    pub fn forward_unit(&self) -> &dyn ComputeUnit {
        self.fwd.as_ref()
    }

    pub fn backward_unit(&self) -> &dyn ComputeUnit {
        self.bwd.as_ref()
    }

    pub fn param_specs(&self) -> Vec<ParamSpec> {
        let prefixed = |prefix: &str, unit: &dyn ComputeUnit| {
            unit.param_specs()
                .into_iter()
                .map(move |p| ParamSpec::new(format!("{prefix}.{}", p.name), p.shape))
                .collect::<Vec<_>>()
        };
        let mut specs = prefixed("fwd", self.fwd.as_ref());
        specs.extend(prefixed("bwd", self.bwd.as_ref()));
        specs
    }

    pub fn param_count(&self) -> usize {
        self.fwd.param_count() + self.bwd.param_count()
    }

    fn split<'a>(&self, params: &'a [f64]) -> Result<(&'a [f64], &'a [f64])> {
        if params.len() != self.param_count() {
            bail!(
                "Bidirectional view has {} values, expected {}",
                params.len(),
                self.param_count()
            );
        }
        Ok(params.split_at(self.fwd.param_count()))
    }

    fn split_mut<'a>(&self, view: &'a mut [f64]) -> Result<(&'a mut [f64], &'a mut [f64])> {
        if view.len() != self.param_count() {
            bail!("Bidirectional view has {} values, expected {}", view.len(), self.param_count());
        }
        Ok(view.split_at_mut(self.fwd.param_count()))
    }

    pub fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        let (f, b) = self.split_mut(view)?;
        self.fwd.init_params(f, rng)?;
        self.bwd.init_params(b, rng)
    }

    pub fn forward(
        &self,
        params: &[f64],
        x: &Tensor,
        mask: Option<&Tensor>,
        training: bool,
    ) -> Result<(Tensor, VertexCache)> {
        let (pf, pb) = self.split(params)?;
        let (fwd_out, fwd_cache) = self.fwd.forward(pf, x, mask, training)?;

        let reversed = x.flip(1)?;
        let reversed_mask = mask.map(reverse_time).transpose()?;
        let (bwd_rev, bwd_cache) = self
            .bwd
            .forward(pb, &reversed, reversed_mask.as_ref(), training)?;
        let bwd_out = bwd_rev.flip(1)?;

        let y = match self.mode {
            BidirectionalMode::Add => fwd_out.add(&bwd_out)?,
            BidirectionalMode::Mul => fwd_out.mul(&bwd_out)?,
            BidirectionalMode::Average => fwd_out.add(&bwd_out)?.scale(0.5),
            BidirectionalMode::Concat => Tensor::cat(&[fwd_out.clone(), bwd_out.clone()], 2)?,
        };
        let cache = VertexCache::Bidirectional {
            fwd: fwd_cache,
            bwd: bwd_cache,
            fwd_out,
            bwd_out,
        };
        Ok((y, cache))
    }

    pub fn backward(
        &self,
        params: &[f64],
        cache: &VertexCache,
        grad: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        let VertexCache::Bidirectional {
            fwd,
            bwd,
            fwd_out,
            bwd_out,
        } = cache
        else {
            return Err(super::cache_mismatch("Bidirectional"));
        };
        let (pf, pb) = self.split(params)?;
        let (gf, gb) = self.split_mut(grads)?;

        let (grad_fwd, grad_bwd) = match self.mode {
            BidirectionalMode::Add => (grad.clone(), grad.clone()),
            BidirectionalMode::Mul => (grad.mul(bwd_out)?, grad.mul(fwd_out)?),
            BidirectionalMode::Average => (grad.scale(0.5), grad.scale(0.5)),
            BidirectionalMode::Concat => {
                let n = self.fwd.n_out();
                (grad.narrow(2, 0, n)?, grad.narrow(2, n, n)?)
            }
        };

        let dx_fwd = self.fwd.backward(pf, fwd, &grad_fwd, gf)?;
        let dx_bwd_rev = self.bwd.backward(pb, bwd, &grad_bwd.flip(1)?, gb)?;
        dx_fwd.add(&dx_bwd_rev.flip(1)?)
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        if !input.is_recurrent() {
            bail!("Bidirectional needs a sequence, got {input}");
        }
        let single = self.fwd.output_type(input)?;
        Ok(match self.mode {
            BidirectionalMode::Concat => single.with_size(2 * single.size()),
            _ => single,
        })
    }
}

/// Which timestep a `LastTimeStepVertex` keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeStep {
    #[default]
    Last,
    First,
}

#[derive(Debug, Clone)]
pub struct LastTimeStepVertex {
    unit: Box<dyn ComputeUnit>,
    step: TimeStep,
}

impl LastTimeStepVertex {
    pub fn new(unit: Box<dyn ComputeUnit>, step: TimeStep) -> Self {
        LastTimeStepVertex { unit, step }
    }

    pub fn unit(&self) -> &dyn ComputeUnit {
        self.unit.as_ref()
    }

    pub fn step(&self) -> TimeStep {
        self.step
    }

    /// Per-example timestep index to keep.
    fn indices(&self, batch: usize, steps: usize, mask: Option<&Tensor>) -> Result<Vec<usize>> {
        let fallback = match self.step {
            TimeStep::Last => steps - 1,
            TimeStep::First => 0,
        };
        let Some(m) = mask else {
            return Ok(vec![fallback; batch]);
        };
        if m.dims() != [batch, steps].as_slice() {
            return Err(Error::ShapeMismatch {
                expected: (batch, steps).into(),
                got: m.shape().clone(),
            });
        }
        let rows = m.data().chunks(steps);
        Ok(rows
            .map(|row| {
                let present = |&(_, v): &(usize, &f64)| *v != 0.0;
                let hit = match self.step {
                    TimeStep::Last => row.iter().enumerate().rev().find(present),
                    TimeStep::First => row.iter().enumerate().find(present),
                };
                hit.map_or(fallback, |(t, _)| t)
            })
            .collect())
    }

    pub fn forward(
        &self,
        params: &[f64],
        x: &Tensor,
        mask: Option<&Tensor>,
        training: bool,
    ) -> Result<(Tensor, VertexCache)> {
        let (seq, unit) = self.unit.forward(params, x, mask, training)?;
        let (batch, steps, width) = match *seq.dims() {
            [b, t, n] => (b, t, n),
            _ => {
                return Err(Error::RankMismatch {
                    expected: 3,
                    got: seq.rank(),
                })
            }
        };
        if steps == 0 {
            return Err(Error::msg("LastTimeStep: empty time axis"));
        }
        let indices = self.indices(batch, steps, mask)?;
        let data = seq.data();
        let mut out = Vec::with_capacity(batch * width);
        for (e, &t) in indices.iter().enumerate() {
            let base = (e * steps + t) * width;
            out.extend_from_slice(&data[base..base + width]);
        }
        let y = Tensor::new(out, (batch, width))?;
        Ok((y, VertexCache::LastTimeStep { unit, indices, steps }))
    }

    pub fn backward(
        &self,
        params: &[f64],
        cache: &VertexCache,
        grad: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        let VertexCache::LastTimeStep {
            unit,
            indices,
            steps,
        } = cache
        else {
            return Err(super::cache_mismatch("LastTimeStep"));
        };
        let (batch, width) = match *grad.dims() {
            [b, n] if b == indices.len() => (b, n),
            _ => {
                return Err(Error::ShapeMismatch {
                    expected: (indices.len(), self.unit.n_out()).into(),
                    got: grad.shape().clone(),
                })
            }
        };
        let mut seq_grad = vec![0.0; batch * steps * width];
        for (e, (&t, row)) in indices.iter().zip(grad.data().chunks(width)).enumerate() {
            let base = (e * steps + t) * width;
            seq_grad[base..base + width].copy_from_slice(row);
        }
        let seq_grad = Tensor::new(seq_grad, (batch, *steps, width))?;
        self.unit.backward(params, unit, &seq_grad, grads)
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        let seq = self.unit.output_type(input)?;
        Ok(InputType::feed_forward(seq.size()))
    }
}
