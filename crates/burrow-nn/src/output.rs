// Output — a dense unit that terminates a graph and carries a loss function
//
// Numerically identical to Dense; the loss function lets the graph turn
// labels into the output gradient that seeds the backward pass.

use burrow_core::error::Result;
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::dense::Dense;
use crate::init::WeightInit;
use crate::loss::LossFunction;
use crate::unit::{ComputeUnit, ParamSpec, UnitCache};

/// Dense output unit with a loss function.
#[derive(Debug, Clone)]
pub struct Output {
    dense: Dense,
    loss: LossFunction,
}

impl Output {
    pub fn new(
        n_in: usize,
        n_out: usize,
        activation: Activation,
        loss: LossFunction,
        weight_init: WeightInit,
    ) -> Self {
        Output {
            dense: Dense::new(n_in, n_out, activation, weight_init),
            loss,
        }
    }
}

impl ComputeUnit for Output {
    fn kind(&self) -> &'static str {
        "Output"
    }

    fn n_in(&self) -> usize {
        self.dense.n_in()
    }

    fn n_out(&self) -> usize {
        self.dense.n_out()
    }

    fn param_specs(&self) -> Vec<ParamSpec> {
        self.dense.param_specs()
    }

    fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        self.dense.init_params(view, rng)
    }

    fn forward(
        &self,
        params: &[f64],
        input: &Tensor,
        mask: Option<&Tensor>,
        training: bool,
    ) -> Result<(Tensor, UnitCache)> {
        self.dense.forward(params, input, mask, training)
    }

    fn backward(
        &self,
        params: &[f64],
        cache: &UnitCache,
        grad_output: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        self.dense.backward(params, cache, grad_output, grads)
    }

    fn output_type(&self, input: &InputType) -> Result<InputType> {
        self.dense.output_type(input)
    }

    fn loss_function(&self) -> Option<LossFunction> {
        Some(self.loss)
    }

    fn box_clone(&self) -> Box<dyn ComputeUnit> {
        Box::new(self.clone())
    }
}
