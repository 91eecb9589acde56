// SimpleRnn — Elman recurrent unit unrolled over the time axis
//
//   h_t = f(x_t @ W + h_{t-1} @ RW + b) · m_t
//
// SHAPES (batch first):
//   input:  [batch, time, n_in]
//   mask:   [batch, time]            (optional, 1 = real step, 0 = padding)
//   output: [batch, time, n_out]     (every hidden state)
//
// PARAMETER LAYOUT:
//   W:  [n_in, n_out]
//   RW: [n_out, n_out]
//   b:  [1, n_out]
//
// MASKING:
//   A masked step outputs zeros, and because the carried state is the
//   (masked) output, the state is reset to zero for the next step.
//
// BACKWARD (full back-propagation through time):
//   da_t = g_t + dz_{t+1} @ RWᵀ,  masked by m_t
//   dz_t = f'(z_t) ⊙ da_t
//   dW  += x_tᵀ @ dz_t,  dRW += h_{t-1}ᵀ @ dz_t,  db += Σ_rows dz_t
//   dx_t = dz_t @ Wᵀ

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::init::WeightInit;
use crate::unit::{accumulate, check_view, ComputeUnit, ParamSpec, UnitCache};

/// A simple (Elman) recurrent unit.
#[derive(Debug, Clone)]
pub struct SimpleRnn {
    n_in: usize,
    n_out: usize,
    activation: Activation,
    weight_init: WeightInit,
}

struct RnnParams {
    w: Tensor,
    rw: Tensor,
    b: Tensor,
}

impl SimpleRnn {
    pub fn new(n_in: usize, n_out: usize, activation: Activation, weight_init: WeightInit) -> Self {
        SimpleRnn {
            n_in,
            n_out,
            activation,
            weight_init,
        }
    }

    fn split(&self) -> (usize, usize) {
        let w = self.n_in * self.n_out;
        (w, w + self.n_out * self.n_out)
    }

    fn params(&self, params: &[f64]) -> Result<RnnParams> {
        check_view(self.kind(), params.len(), self.param_count())?;
        let (w_end, rw_end) = self.split();
        Ok(RnnParams {
            w: Tensor::from_slice(&params[..w_end], (self.n_in, self.n_out))?,
            rw: Tensor::from_slice(&params[w_end..rw_end], (self.n_out, self.n_out))?,
            b: Tensor::from_slice(&params[rw_end..], (1, self.n_out))?,
        })
    }

    fn check_input(&self, input: &Tensor, mask: Option<&Tensor>) -> Result<(usize, usize)> {
        let dims = input.dims();
        if dims.len() != 3 {
            return Err(Error::RankMismatch {
                expected: 3,
                got: dims.len(),
            });
        }
        if dims[2] != self.n_in {
            bail!("{} expects {} input features, got {}", self.kind(), self.n_in, dims[2]);
        }
        if let Some(m) = mask {
            if m.dims() != [dims[0], dims[1]] {
                return Err(Error::ShapeMismatch {
                    expected: (dims[0], dims[1]).into(),
                    got: m.shape().clone(),
                });
            }
        }
        Ok((dims[0], dims[1]))
    }
}

/// Multiply row `i` of a `[batch, n]` tensor by `factors[i]`.
fn scale_rows(t: &Tensor, factors: &Tensor) -> Result<Tensor> {
    let n = t.shape().last_dim().max(1);
    let mut out = t.to_vec();
    for (row, &f) in out.chunks_mut(n).zip(factors.data()) {
        row.iter_mut().for_each(|v| *v *= f);
    }
    Tensor::new(out, t.shape().clone())
}

/// Stack `[batch, n]` steps into `[batch, time, n]`.
fn stack_steps(steps: &[Tensor]) -> Result<Tensor> {
    let expanded = steps
        .iter()
        .map(|s| {
            let d = s.dims();
            s.reshape((d[0], 1, d[1]))
        })
        .collect::<Result<Vec<_>>>()?;
    Tensor::cat(&expanded, 1)
}

impl ComputeUnit for SimpleRnn {
    fn kind(&self) -> &'static str {
        "SimpleRnn"
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
            ParamSpec::new("RW", (self.n_out, self.n_out)),
            ParamSpec::new("b", (1, self.n_out)),
        ]
    }

    fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        check_view(self.kind(), view.len(), self.param_count())?;
        let (w_end, rw_end) = self.split();
        let (w, rest) = view.split_at_mut(w_end);
        let (rw, b) = rest.split_at_mut(rw_end - w_end);
        self.weight_init.fill(w, self.n_in, self.n_out, rng)?;
        self.weight_init.fill(rw, self.n_out, self.n_out, rng)?;
        b.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }

    fn forward(
        &self,
        params: &[f64],
        input: &Tensor,
        mask: Option<&Tensor>,
        _training: bool,
    ) -> Result<(Tensor, UnitCache)> {
        let (batch, steps) = self.check_input(input, mask)?;
        if steps == 0 {
            bail!("{}: empty time axis", self.kind());
        }
        let p = self.params(params)?;

        let mut h = Tensor::zeros((batch, self.n_out));
        let mut zs = Vec::with_capacity(steps);
        let mut outs = Vec::with_capacity(steps);
        for t in 0..steps {
            let x_t = input.select(1, t)?;
            let z = x_t.matmul(&p.w)?.add(&h.matmul(&p.rw)?)?.add_row(&p.b)?;
            let mut a = self.activation.forward(&z)?;
            if let Some(m) = mask {
                a = scale_rows(&a, &m.select(1, t)?)?;
            }
            zs.push(z);
            outs.push(a.clone());
            h = a;
        }

        let output = stack_steps(&outs)?;
        let mut saved = vec![input.clone(), stack_steps(&zs)?, output.clone()];
        if let Some(m) = mask {
            saved.push(m.clone());
        }
        Ok((output, UnitCache::new(saved)))
    }

    fn backward(
        &self,
        params: &[f64],
        cache: &UnitCache,
        grad_output: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        check_view(self.kind(), grads.len(), self.param_count())?;
        let p = self.params(params)?;
        let (x, z_all, a_all) = (cache.get(0)?, cache.get(1)?, cache.get(2)?);
        let mask = cache.get_opt(3);
        if grad_output.shape() != a_all.shape() {
            return Err(Error::ShapeMismatch {
                expected: a_all.shape().clone(),
                got: grad_output.shape().clone(),
            });
        }
        let (batch, steps) = (x.dims()[0], x.dims()[1]);

        let w_t = p.w.t()?;
        let rw_t = p.rw.t()?;
        let mut dw = Tensor::zeros((self.n_in, self.n_out));
        let mut drw = Tensor::zeros((self.n_out, self.n_out));
        let mut db = Tensor::zeros((1, self.n_out));
        let mut dh_next = Tensor::zeros((batch, self.n_out));
        let mut dxs = vec![Tensor::zeros((batch, self.n_in)); steps];

        for t in (0..steps).rev() {
            let mut da = grad_output.select(1, t)?.add(&dh_next)?;
            if let Some(m) = mask {
                da = scale_rows(&da, &m.select(1, t)?)?;
            }
            let z = z_all.select(1, t)?;
            let a = a_all.select(1, t)?;
            let dz = self.activation.backward(&z, &a, &da)?;

            let h_prev = if t > 0 {
                a_all.select(1, t - 1)?
            } else {
                Tensor::zeros((batch, self.n_out))
            };
            dw = dw.add(&x.select(1, t)?.t()?.matmul(&dz)?)?;
            drw = drw.add(&h_prev.t()?.matmul(&dz)?)?;
            db = db.add(&dz.sum_rows()?)?;

            dxs[t] = dz.matmul(&w_t)?;
            dh_next = dz.matmul(&rw_t)?;
        }

        let (w_end, rw_end) = self.split();
        accumulate(&mut grads[..w_end], &dw)?;
        accumulate(&mut grads[w_end..rw_end], &drw)?;
        accumulate(&mut grads[rw_end..], &db)?;

        stack_steps(&dxs)
    }

    fn output_type(&self, input: &InputType) -> Result<InputType> {
        match input {
            InputType::Recurrent { size, length } if *size == self.n_in => Ok(InputType::Recurrent {
                size: self.n_out,
                length: *length,
            }),
            other => Err(Error::msg(format!(
                "{} expects Recurrent({}), got {}",
                self.kind(),
                self.n_in,
                other
            ))),
        }
    }

    fn is_recurrent(&self) -> bool {
        true
    }

    fn box_clone(&self) -> Box<dyn ComputeUnit> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn unit_and_params() -> (SimpleRnn, Vec<f64>) {
        let rnn = SimpleRnn::new(2, 3, Activation::Tanh, WeightInit::Xavier);
        let mut params = vec![0.0; rnn.param_count()];
        rnn.init_params(&mut params, &mut StdRng::seed_from_u64(42))
            .unwrap();
        // Non-zero bias so its gradient is exercised too.
        let n = params.len();
        params[n - 3..].copy_from_slice(&[0.1, -0.2, 0.05]);
        (rnn, params)
    }

    fn loss(rnn: &SimpleRnn, params: &[f64], x: &Tensor, mask: Option<&Tensor>) -> f64 {
        let (y, _) = rnn.forward(params, x, mask, true).unwrap();
        // Weighted sum so every output position contributes differently.
        y.data()
            .iter()
            .enumerate()
            .map(|(i, v)| v * (1.0 + i as f64 * 0.1))
            .sum()
    }

    fn upstream(shape: &burrow_core::Shape) -> Tensor {
        let n = shape.elem_count();
        Tensor::new((0..n).map(|i| 1.0 + i as f64 * 0.1).collect(), shape.clone()).unwrap()
    }

    #[test]
    fn test_output_shape() {
        let (rnn, params) = unit_and_params();
        let x = Tensor::zeros((4, 5, 2));
        let (y, _) = rnn.forward(&params, &x, None, false).unwrap();
        assert_eq!(y.dims(), &[4, 5, 3]);
    }

    #[test]
    fn test_masked_step_outputs_zero() {
        let (rnn, params) = unit_and_params();
        let x = Tensor::ones((1, 3, 2));
        let mask = Tensor::from_slice(&[1.0, 1.0, 0.0], (1, 3)).unwrap();
        let (y, _) = rnn.forward(&params, &x, Some(&mask), false).unwrap();
        let last = y.select(1, 2).unwrap();
        assert!(last.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let (rnn, params) = unit_and_params();
        let x = Tensor::from_slice(
            &[0.5, -0.3, 0.8, 0.1, -0.6, 0.9, 0.2, 0.4, -0.1, 0.7, 0.3, -0.5],
            (2, 3, 2),
        )
        .unwrap();
        let mask = Tensor::from_slice(&[1.0, 1.0, 1.0, 1.0, 1.0, 0.0], (2, 3)).unwrap();

        let (y, cache) = rnn.forward(&params, &x, Some(&mask), true).unwrap();
        let mut grads = vec![0.0; params.len()];
        let dx = rnn
            .backward(&params, &cache, &upstream(y.shape()), &mut grads)
            .unwrap();

        let eps = 1e-6;
        for i in 0..params.len() {
            let mut plus = params.clone();
            let mut minus = params.clone();
            plus[i] += eps;
            minus[i] -= eps;
            let numeric = (loss(&rnn, &plus, &x, Some(&mask)) - loss(&rnn, &minus, &x, Some(&mask)))
                / (2.0 * eps);
            assert!(
                (numeric - grads[i]).abs() < 1e-5,
                "param {i}: numeric {numeric} vs analytic {}",
                grads[i]
            );
        }

        let xs = x.to_vec();
        for i in 0..xs.len() {
            let mut plus = xs.clone();
            let mut minus = xs.clone();
            plus[i] += eps;
            minus[i] -= eps;
            let xp = Tensor::new(plus, x.shape().clone()).unwrap();
            let xm = Tensor::new(minus, x.shape().clone()).unwrap();
            let numeric =
                (loss(&rnn, &params, &xp, Some(&mask)) - loss(&rnn, &params, &xm, Some(&mask)))
                    / (2.0 * eps);
            assert!((numeric - dx.data()[i]).abs() < 1e-5, "input {i}");
        }
    }
}
