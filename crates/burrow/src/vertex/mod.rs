// Vertex — the closed set of graph vertex kinds
//
// Every vertex consumes an ordered list of input tensors (one per incoming
// edge) and produces one tensor per output slot. Per-call state lives in a
// `VertexCache` returned by `forward` and handed back to `backward`, so a
// vertex itself is immutable once built and a graph can be shared across
// threads.
//
// PARAMETERS:
//   Layer-like vertices (Layer, Bidirectional, LastTimeStep) read their
//   parameters from a slice of the graph's flat buffer and accumulate their
//   gradients into the matching slice of the flat gradient buffer. All other
//   vertices have no parameters and are handed empty slices.
//
// MASKS:
//   `feed_forward_masks` maps input masks to output masks:
//     ElementWise, Merge   OR-combine (absent if any input has none)
//     Stack                stack along batch (absent if any input has none)
//     Unstack              take the same batch block
//     ReverseTime          reverse along time
//     LastTimeStep         none
//     everything else      pass the single input mask through

pub mod combine;
pub mod conf;
pub mod elementwise;
pub mod layer;
pub mod structural;
pub mod wrapper;

use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::shape::Shape;
use burrow_core::tensor::Tensor;
use burrow_nn::{LossFunction, ParamSpec, UnitCache};
use rand::rngs::StdRng;

pub use combine::{MergeVertex, SplitVertex, StackVertex, UnstackVertex};
pub use conf::{Arity, VertexConf};
pub use elementwise::{ElementWiseOp, ElementWiseVertex};
pub use layer::LayerVertex;
pub use structural::{ReshapeVertex, ReverseTimeVertex, ScaleVertex, ShiftVertex, SubsetVertex};
pub use wrapper::{BidirectionalMode, BidirectionalVertex, LastTimeStepVertex, TimeStep};

use crate::mask;

/// State saved by one vertex forward call.
#[derive(Debug, Clone)]
pub enum VertexCache {
    /// Nothing needed (shift, scale, reverse, split).
    Empty,
    /// Number of inputs (add, subtract, average).
    Count(usize),
    /// The inputs themselves (product).
    Inputs(Vec<Tensor>),
    /// Winning input per element (max).
    ArgMax { winners: Vec<usize>, inputs: usize },
    /// Per-input extent along the joined axis (merge, stack).
    Sizes(Vec<usize>),
    /// Shape of the single input (subset, reshape, unstack).
    InputShape(Shape),
    Unit(UnitCache),
    Bidirectional {
        fwd: UnitCache,
        bwd: UnitCache,
        fwd_out: Tensor,
        bwd_out: Tensor,
    },
    LastTimeStep {
        unit: UnitCache,
        indices: Vec<usize>,
        steps: usize,
    },
}

pub(crate) fn cache_mismatch(kind: &str) -> Error {
    Error::msg(format!("{kind}: backward received a cache from another vertex kind"))
}

/// A runtime graph vertex.
#[derive(Debug, Clone)]
pub enum Vertex {
    ElementWise(ElementWiseVertex),
    Shift(ShiftVertex),
    Scale(ScaleVertex),
    Subset(SubsetVertex),
    Reshape(ReshapeVertex),
    ReverseTime(ReverseTimeVertex),
    Merge(MergeVertex),
    Split(SplitVertex),
    Stack(StackVertex),
    Unstack(UnstackVertex),
    Layer(LayerVertex),
    Bidirectional(BidirectionalVertex),
    LastTimeStep(LastTimeStepVertex),
}

impl Vertex {
    pub fn kind(&self) -> &'static str {
        match self {
            Vertex::ElementWise(_) => "ElementWise",
            Vertex::Shift(_) => "Shift",
            Vertex::Scale(_) => "Scale",
            Vertex::Subset(_) => "Subset",
            Vertex::Reshape(_) => "Reshape",
            Vertex::ReverseTime(_) => "ReverseTime",
            Vertex::Merge(_) => "Merge",
            Vertex::Split(_) => "Split",
            Vertex::Stack(_) => "Stack",
            Vertex::Unstack(_) => "Unstack",
            Vertex::Layer(l) => l.unit().kind(),
            Vertex::Bidirectional(_) => "Bidirectional",
            Vertex::LastTimeStep(_) => "LastTimeStep",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Vertex::ElementWise(e) if e.op() == ElementWiseOp::Subtract => Arity::Exactly(2),
            Vertex::ElementWise(_) | Vertex::Merge(_) | Vertex::Stack(_) => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            Vertex::Split(s) => s.sizes().len(),
            _ => 1,
        }
    }

    /// Whether the vertex owns a trainable unit.
    pub fn is_layer(&self) -> bool {
        matches!(
            self,
            Vertex::Layer(_) | Vertex::Bidirectional(_) | Vertex::LastTimeStep(_)
        )
    }

    /// Parameter layout inside the vertex's view, in view order.
    pub fn param_specs(&self) -> Vec<ParamSpec> {
        match self {
            Vertex::Layer(l) => l.param_specs(),
            Vertex::Bidirectional(b) => b.param_specs(),
            Vertex::LastTimeStep(l) => l.unit().param_specs(),
            _ => Vec::new(),
        }
    }

    pub fn param_count(&self) -> usize {
        match self {
            Vertex::Layer(l) => l.param_count(),
            Vertex::Bidirectional(b) => b.param_count(),
            Vertex::LastTimeStep(l) => l.unit().param_count(),
            _ => 0,
        }
    }

    pub fn is_pretrain_capable(&self) -> bool {
        match self {
            Vertex::Layer(l) => l.unit().is_pretrain_capable(),
            _ => false,
        }
    }

    pub fn loss_function(&self) -> Option<LossFunction> {
        match self {
            Vertex::Layer(l) => l.loss_function(),
            _ => None,
        }
    }

    /// Type a layer-like vertex expects from its producer.
    pub fn expected_input(&self) -> Option<InputType> {
        match self {
            Vertex::Layer(l) => Some(l.expected_input()),
            Vertex::Bidirectional(b) => Some(InputType::recurrent(b.forward_unit().n_in())),
            Vertex::LastTimeStep(l) => Some(InputType::recurrent(l.unit().n_in())),
            _ => None,
        }
    }

    /// Fill a freshly allocated parameter view.
    pub fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()> {
        match self {
            Vertex::Layer(l) => l.init_params(view, rng),
            Vertex::Bidirectional(b) => b.init_params(view, rng),
            Vertex::LastTimeStep(l) => l.unit().init_params(view, rng),
            _ => Ok(()),
        }
    }

    /// Fail with `ArityMismatch` naming `vertex` unless `got` inputs are accepted.
    pub fn ensure_arity(&self, vertex: &str, got: usize) -> Result<()> {
        let arity = self.arity();
        if arity.accepts(got) {
            Ok(())
        } else {
            Err(Error::ArityMismatch {
                vertex: vertex.to_string(),
                expected: arity.to_string(),
                got,
            })
        }
    }

    /// Static output types, one per output slot.
    pub fn output_types(&self, inputs: &[InputType]) -> Result<Vec<InputType>> {
        self.ensure_arity(self.kind(), inputs.len())?;
        let first = &inputs[0];
        let single = match self {
            Vertex::ElementWise(e) => e.output_type(inputs)?,
            Vertex::Shift(_) | Vertex::Scale(_) | Vertex::Unstack(_) => first.clone(),
            Vertex::Subset(s) => s.output_type(first)?,
            Vertex::Reshape(r) => r.output_type(first)?,
            Vertex::ReverseTime(r) => r.output_type(first)?,
            Vertex::Merge(m) => m.output_type(inputs)?,
            Vertex::Split(s) => return s.output_types(first),
            Vertex::Stack(s) => s.output_type(inputs)?,
            Vertex::Layer(l) => l.output_type(first)?,
            Vertex::Bidirectional(b) => b.output_type(first)?,
            Vertex::LastTimeStep(l) => l.output_type(first)?,
        };
        Ok(vec![single])
    }

    /// Compute one tensor per output slot.
    ///
    /// `masks` holds one entry per input (`None` = all present) and is only
    /// read by recurrent layer-like vertices.
    pub fn forward(
        &self,
        inputs: &[Tensor],
        masks: &[Option<Tensor>],
        params: &[f64],
        training: bool,
    ) -> Result<(Vec<Tensor>, VertexCache)> {
        self.ensure_arity(self.kind(), inputs.len())?;
        let x = &inputs[0];
        let mask = masks.first().and_then(Option::as_ref);
        let (y, cache) = match self {
            Vertex::ElementWise(e) => e.forward(inputs)?,
            Vertex::Shift(s) => (s.forward(x), VertexCache::Empty),
            Vertex::Scale(s) => (s.forward(x), VertexCache::Empty),
            Vertex::Subset(s) => s.forward(x)?,
            Vertex::Reshape(r) => r.forward(x)?,
            Vertex::ReverseTime(r) => (r.forward(x)?, VertexCache::Empty),
            Vertex::Merge(m) => m.forward(inputs)?,
            Vertex::Split(s) => return Ok((s.forward(x)?, VertexCache::Empty)),
            Vertex::Stack(s) => s.forward(inputs)?,
            Vertex::Unstack(u) => u.forward(x)?,
            Vertex::Layer(l) => l.forward(params, x, mask, training)?,
            Vertex::Bidirectional(b) => b.forward(params, x, mask, training)?,
            Vertex::LastTimeStep(l) => l.forward(params, x, mask, training)?,
        };
        Ok((vec![y], cache))
    }

    /// Back-propagate one gradient per output slot into one gradient per
    /// input, accumulating parameter gradients into `grads`.
    pub fn backward(
        &self,
        cache: &VertexCache,
        grad_outputs: &[Tensor],
        params: &[f64],
        grads: &mut [f64],
    ) -> Result<Vec<Tensor>> {
        if grad_outputs.len() != self.num_outputs() {
            return Err(Error::ArityMismatch {
                vertex: self.kind().to_string(),
                expected: format!("{} output gradients", self.num_outputs()),
                got: grad_outputs.len(),
            });
        }
        let g = &grad_outputs[0];
        let single = match self {
            Vertex::ElementWise(e) => return e.backward(cache, g),
            Vertex::Merge(m) => return m.backward(cache, g),
            Vertex::Stack(s) => return s.backward(cache, g),
            Vertex::Shift(s) => s.backward(g),
            Vertex::Scale(s) => s.backward(g),
            Vertex::Subset(s) => s.backward(cache, g)?,
            Vertex::Reshape(r) => r.backward(cache, g)?,
            Vertex::ReverseTime(r) => r.backward(g)?,
            Vertex::Split(s) => s.backward(grad_outputs)?,
            Vertex::Unstack(u) => u.backward(cache, g)?,
            Vertex::Layer(l) => l.backward(params, cache, g, grads)?,
            Vertex::Bidirectional(b) => b.backward(params, cache, g, grads)?,
            Vertex::LastTimeStep(l) => l.backward(params, cache, g, grads)?,
        };
        Ok(vec![single])
    }

    /// Output masks, one per output slot, from the masks of the inputs.
    pub fn feed_forward_masks(&self, masks: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>> {
        let first = masks.first().cloned().flatten();
        let single = match self {
            Vertex::ElementWise(_) | Vertex::Merge(_) => mask::combine_or(masks)?,
            Vertex::Stack(s) => s.stack_masks(masks)?,
            Vertex::Unstack(u) => first.map(|m| u.take(&m)).transpose()?,
            Vertex::ReverseTime(_) => first.map(|m| mask::reverse_time(&m)).transpose()?,
            Vertex::LastTimeStep(_) => None,
            Vertex::Split(s) => return Ok(vec![first; s.sizes().len()]),
            _ => first,
        };
        Ok(vec![single])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_nn::LayerConf;

    #[test]
    fn test_forward_checks_arity() {
        let v = VertexConf::ElementWise(ElementWiseOp::Subtract).build().unwrap();
        let x = Tensor::ones((1, 2));
        let err = v.forward(&[x.clone()], &[None], &[], false).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { got: 1, .. }));
        let (out, _) = v.forward(&[x.clone(), x], &[None, None], &[], false).unwrap();
        assert_eq!(out[0].to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_single_input_vertex_rejects_two() {
        let v = VertexConf::Scale(2.0).build().unwrap();
        let x = Tensor::ones((1, 2));
        assert!(v.forward(&[x.clone(), x], &[None, None], &[], false).is_err());
    }

    #[test]
    fn test_backward_checks_slot_count() {
        let v = VertexConf::Split { sizes: vec![1, 1] }.build().unwrap();
        let x = Tensor::ones((1, 2));
        let (outs, cache) = v.forward(&[x], &[None], &[], false).unwrap();
        assert_eq!(outs.len(), 2);
        assert!(v.backward(&cache, &outs[..1], &[], &mut []).is_err());
        let dx = v.backward(&cache, &outs, &[], &mut []).unwrap();
        assert_eq!(dx[0].dims(), &[1, 2]);
    }

    #[test]
    fn test_output_types() {
        let merge = VertexConf::Merge.build().unwrap();
        let types = merge
            .output_types(&[InputType::feed_forward(2), InputType::feed_forward(3)])
            .unwrap();
        assert_eq!(types, vec![InputType::feed_forward(5)]);

        let layer = VertexConf::Layer(LayerConf::dense(4, 2)).build().unwrap();
        assert_eq!(layer.expected_input(), Some(InputType::feed_forward(4)));
        assert_eq!(
            layer.output_types(&[InputType::feed_forward(4)]).unwrap(),
            vec![InputType::feed_forward(2)]
        );
        assert_eq!(layer.param_count(), 4 * 2 + 2);
        assert!(layer.is_layer());
        assert!(!merge.is_layer());
    }

    #[test]
    fn test_mask_rules() {
        let m = Tensor::new(vec![1.0, 1.0, 0.0], (1, 3)).unwrap();
        let n = Tensor::new(vec![1.0, 0.0, 0.0], (1, 3)).unwrap();

        let merge = VertexConf::Merge.build().unwrap();
        let out = merge.feed_forward_masks(&[Some(m.clone()), Some(n)]).unwrap();
        assert_eq!(out[0].as_ref().unwrap().to_vec(), vec![1.0, 1.0, 0.0]);
        let out = merge.feed_forward_masks(&[Some(m.clone()), None]).unwrap();
        assert!(out[0].is_none());

        let reverse = VertexConf::ReverseTime.build().unwrap();
        let out = reverse.feed_forward_masks(&[Some(m.clone())]).unwrap();
        assert_eq!(out[0].as_ref().unwrap().to_vec(), vec![0.0, 1.0, 1.0]);

        let lts = VertexConf::LastTimeStep {
            layer: LayerConf::simple_rnn(2, 2),
            step: TimeStep::Last,
        }
        .build()
        .unwrap();
        assert!(lts.feed_forward_masks(&[Some(m.clone())]).unwrap()[0].is_none());

        let scale = VertexConf::Scale(1.0).build().unwrap();
        assert_eq!(scale.feed_forward_masks(&[Some(m.clone())]).unwrap()[0], Some(m));
    }
}
