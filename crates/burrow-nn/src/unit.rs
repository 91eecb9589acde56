// ComputeUnit — the contract every trainable unit satisfies
//
// A compute unit is the trainable half of a layer vertex: it knows how to
// turn an input activation into an output activation given a parameter
// slice, and how to push a gradient back through itself.
//
// WHY SLICES INSTEAD OF OWNED TENSORS?
//
// The graph keeps all parameters of all units in ONE flat buffer and all
// gradients in ONE flat gradient buffer. At build time every unit is given a
// fixed (offset, len) range of both. The unit never owns or resizes its
// storage; on every call it receives `&[f64]` for its parameters and, during
// backward, `&mut [f64]` for its gradients, and writes its parameter
// gradients straight into that view.
//
// PER-CALL STATE:
//
// Anything backward needs from the forward call (inputs, pre-activations,
// masks) is returned from forward as a `UnitCache` and handed back to
// backward by the caller. Units hold no mutable state between calls, so one
// unit can serve several graph replicas at once.

use std::fmt;

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::shape::Shape;
use burrow_core::tensor::Tensor;
use rand::rngs::StdRng;

use crate::loss::LossFunction;

/// Name and shape of one parameter inside a unit's view.
///
/// Parameters are laid out back to back in the order [`ComputeUnit::param_specs`]
/// returns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Shape,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        ParamSpec {
            name: name.into(),
            shape: shape.into(),
        }
    }

    /// Number of scalars this parameter occupies.
    pub fn len(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State saved by a forward call for the matching backward call.
#[derive(Debug, Clone, Default)]
pub struct UnitCache {
    tensors: Vec<Tensor>,
}

impl UnitCache {
    pub fn new(tensors: Vec<Tensor>) -> Self {
        UnitCache { tensors }
    }

    /// Saved tensor at `index`; a missing entry means backward was handed a
    /// cache from a different unit.
    pub fn get(&self, index: usize) -> Result<&Tensor> {
        self.tensors.get(index).ok_or_else(|| {
            Error::msg(format!(
                "unit cache has {} entries, tensor {} requested",
                self.tensors.len(),
                index
            ))
        })
    }

    /// Optional trailing entry (e.g. a mask that may not have been supplied).
    pub fn get_opt(&self, index: usize) -> Option<&Tensor> {
        self.tensors.get(index)
    }
}

/// A trainable compute unit addressed through parameter views.
pub trait ComputeUnit: Send + Sync + fmt::Debug {
    /// Short human-readable kind, used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Input feature width.
    fn n_in(&self) -> usize;

    /// Output feature width.
    fn n_out(&self) -> usize;

    /// Ordered parameter layout inside the unit's view.
    fn param_specs(&self) -> Vec<ParamSpec>;

    /// Total number of scalar parameters (the length of the unit's view).
    fn param_count(&self) -> usize {
        self.param_specs().iter().map(ParamSpec::len).sum()
    }

    /// Fill a freshly allocated parameter view.
    fn init_params(&self, view: &mut [f64], rng: &mut StdRng) -> Result<()>;

    /// Compute the output activation. `mask` is `[batch, time]` for
    /// sequence input and may be ignored by non-recurrent units.
    fn forward(
        &self,
        params: &[f64],
        input: &Tensor,
        mask: Option<&Tensor>,
        training: bool,
    ) -> Result<(Tensor, UnitCache)>;

    /// Back-propagate `grad_output`, accumulating parameter gradients into
    /// `grads` (same layout as `params`) and returning the input gradient.
    fn backward(
        &self,
        params: &[f64],
        cache: &UnitCache,
        grad_output: &Tensor,
        grads: &mut [f64],
    ) -> Result<Tensor>;

    /// Static output type for a given input type.
    fn output_type(&self, input: &InputType) -> Result<InputType>;

    /// Whether the unit consumes `[batch, time, features]` sequences.
    fn is_recurrent(&self) -> bool {
        false
    }

    /// Whether an outer training loop may run layer-wise pretraining on it.
    fn is_pretrain_capable(&self) -> bool {
        false
    }

    /// Loss function, for units that terminate a graph.
    fn loss_function(&self) -> Option<LossFunction> {
        None
    }

    /// Clone into a new box (units live behind `dyn ComputeUnit`).
    fn box_clone(&self) -> Box<dyn ComputeUnit>;
}

impl Clone for Box<dyn ComputeUnit> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Check that a parameter or gradient view has the length the unit expects.
pub(crate) fn check_view(kind: &str, view_len: usize, expected: usize) -> Result<()> {
    if view_len != expected {
        bail!("{kind}: parameter view has {view_len} values, expected {expected}");
    }
    Ok(())
}

/// Add a gradient tensor into a slice of a gradient view.
pub(crate) fn accumulate(view: &mut [f64], grad: &Tensor) -> Result<()> {
    if view.len() != grad.elem_count() {
        bail!("gradient view holds {} values, gradient has {}", view.len(), grad.elem_count());
    }
    for (v, g) in view.iter_mut().zip(grad.data()) {
        *v += g;
    }
    Ok(())
}
