// LayerVertex — adapts one compute unit to the vertex contract
//
// The unit reads the vertex's slice of the flat parameter buffer and
// accumulates into the matching slice of the gradient buffer. Parameter
// keys are "<vertex name>/<param name>".

use burrow_core::error::Result;
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;
use burrow_nn::{ComputeUnit, LayerConf, LossFunction, ParamSpec};
use rand::rngs::StdRng;

use super::VertexCache;

#[derive(Debug, Clone)]
pub struct LayerVertex {
    unit: Box<dyn ComputeUnit>,
}

impl LayerVertex {
    pub fn new(conf: &LayerConf) -> Result<Self> {
        Ok(LayerVertex { unit: conf.build()? })
    }

    pub fn unit(&self) -> &dyn ComputeUnit {
        self.unit.as_ref()
    }

    pub fn param_specs(&self) -> Vec<ParamSpec> {
        self.unit.param_specs()
    }

    pub fn param_count(&self) -> usize {
        self.unit.param_count()
    }

    pub fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        self.unit.init_params(view, rng)
    }

    pub fn loss_function(&self) -> Option<LossFunction> {
        self.unit.loss_function()
    }

    /// Type the unit expects from its producer.
    pub fn expected_input(&self) -> InputType {
        if self.unit.is_recurrent() {
            InputType::recurrent(self.unit.n_in())
        } else {
            InputType::feed_forward(self.unit.n_in())
        }
    }

    pub fn forward(
        &self,
        params: &[f64],
        x: &Tensor,
        mask: Option<&Tensor>,
        training: bool,
    ) -> Result<(Tensor, VertexCache)> {
        let (y, cache) = self.unit.forward(params, x, mask, training)?;
        Ok((y, VertexCache::Unit(cache)))
    }

    pub fn backward(
        &self,
        params: &[f64],
        cache: &VertexCache,
        grad: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor> {
        let VertexCache::Unit(cache) = cache else {
            return Err(super::cache_mismatch(self.unit.kind()));
        };
        self.unit.backward(params, cache, grad, grads)
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        self.unit.output_type(input)
    }
}
