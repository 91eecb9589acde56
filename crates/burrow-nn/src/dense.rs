// Dense — fully-connected unit: a = f(x @ W + b)
//
// PARAMETER LAYOUT (inside the unit's view, in this order):
//
//   W: [n_in, n_out]   — row-major, so x @ W needs no transpose
//   b: [1, n_out]
//
// COMPUTATION:
//
//   forward:   z = x @ W + b,  a = f(z)              x: [batch, n_in]
//   backward:  dz = f'(z) ⊙ g
//              dW = xᵀ @ dz,  db = Σ_rows dz,  dx = dz @ Wᵀ
//
// The cache holds (x, z, a).

use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::init::WeightInit;
use crate::unit::{accumulate, check_view, ComputeUnit, ParamSpec, UnitCache};

/// A fully-connected unit.
#[derive(Debug, Clone)]
pub struct Dense {
    n_in: usize,
    n_out: usize,
    activation: Activation,
    weight_init: WeightInit,
}

impl Dense {
    pub fn new(n_in: usize, n_out: usize, activation: Activation, weight_init: WeightInit) -> Self {
        Dense {
            n_in,
            n_out,
            activation,
            weight_init,
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn weights(&self, params: &[f64]) -> Result<(Tensor, Tensor)> {
        check_view(self.kind(), params.len(), self.param_count())?;
        let split = self.n_in * self.n_out;
        let w = Tensor::from_slice(&params[..split], (self.n_in, self.n_out))?;
        let b = Tensor::from_slice(&params[split..], (1, self.n_out))?;
        Ok((w, b))
    }
}

impl ComputeUnit for Dense {
    fn kind(&self) -> &'static str {
        "Dense"
    }

    fn n_in(&self) -> usize {
        self.n_in
    }

    fn n_out(&self) -> usize {
        self.n_out
    }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("W", (self.n_in, self.n_out)),
            ParamSpec::new("b", (1, self.n_out)),
        ]
    }

    fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        check_view(self.kind(), view.len(), self.param_count())?;
        let (w, b) = view.split_at_mut(self.n_in * self.n_out);
        self.weight_init.fill(w, self.n_in, self.n_out, rng)?;
        b.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }

    fn forward(
        &self,
        params: &[f64],
        input: &Tensor,
        _mask: Option<&Tensor>,
        _training: bool,
    ) -> Result<(Tensor, UnitCache)> {
        if input.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: input.rank(),
            });
        }
        let (w, b) = self.weights(params)?;
        let z = input.matmul(&w)?.add_row(&b)?;
        let a = self.activation.forward(&z)?;
        Ok((a.clone(), UnitCache::new(vec![input.clone(), z, a])))
    }

    fn backward(
        &self,
        params: &[f64],
        cache: &UnitCache,
        grad_output: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        check_view(self.kind(), grads.len(), self.param_count())?;
        let (w, _) = self.weights(params)?;
        let (x, z, a) = (cache.get(0)?, cache.get(1)?, cache.get(2)?);

        let dz = self.activation.backward(z, a, grad_output)?;
        let dw = x.t()?.matmul(&dz)?;
        let db = dz.sum_rows()?;

        let (gw, gb) = grads.split_at_mut(self.n_in * self.n_out);
        accumulate(gw, &dw)?;
        accumulate(gb, &db)?;

        dz.matmul(&w.t()?)
    }

    fn output_type(&self, input: &InputType) -> Result<InputType> {
        match input {
            InputType::FeedForward { size } if *size == self.n_in => {
                Ok(InputType::feed_forward(self.n_out))
            }
            other => Err(Error::msg(format!(
                "{} expects FeedForward({}), got {}",
                self.kind(),
                self.n_in,
                other
            ))),
        }
    }

    fn box_clone(&self) -> Box<dyn ComputeUnit> {
        Box::new(self.clone())
    }
}
