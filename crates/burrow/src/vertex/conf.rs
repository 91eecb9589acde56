// VertexConf — declarative vertex kinds stored in graph descriptors
//
// A descriptor only holds configurations. `resolve` fills in layer input
// widths from inferred input types and `build` produces the runtime
// `Vertex` that the executor drives.

use std::fmt;

use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_nn::LayerConf;

use super::combine::{MergeVertex, SplitVertex, StackVertex, UnstackVertex};
use super::elementwise::{ElementWiseOp, ElementWiseVertex};
use super::layer::LayerVertex;
use super::structural::{ReshapeVertex, ReverseTimeVertex, ScaleVertex, ShiftVertex, SubsetVertex};
use super::wrapper::{BidirectionalMode, BidirectionalVertex, LastTimeStepVertex, TimeStep};
use super::Vertex;

/// How many inputs a vertex kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }

    /// Whether more than one input can ever be accepted.
    pub fn is_multi_input(&self) -> bool {
        match *self {
            Arity::Exactly(k) => k > 1,
            Arity::AtLeast(_) => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "exactly {k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

/// Configuration of one graph vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexConf {
    /// Element-wise combination of equally shaped inputs.
    ElementWise(ElementWiseOp),
    /// Add a constant to every element.
    Shift(f64),
    /// Multiply every element by a constant.
    Scale(f64),
    /// Keep feature indices `from..=to` along the last axis.
    Subset { from: usize, to: usize },
    /// Reshape each example to `shape` (batch axis excluded).
    Reshape { shape: Vec<usize> },
    /// Concatenate inputs along the feature axis.
    Merge,
    /// Cut the feature axis into consecutive pieces, one output per piece.
    Split { sizes: Vec<usize> },
    /// Concatenate inputs along the batch axis.
    Stack,
    /// Take block `from` of `stack_size` equal batch blocks.
    Unstack { from: usize, stack_size: usize },
    /// Reverse sequences along time.
    ReverseTime,
    /// A single trainable unit.
    Layer(LayerConf),
    /// Two copies of a recurrent unit, one reading the sequence backwards.
    Bidirectional {
        layer: LayerConf,
        mode: BidirectionalMode,
    },
    /// A recurrent unit reduced to one timestep per example.
    LastTimeStep { layer: LayerConf, step: TimeStep },
}

impl VertexConf {
    pub fn kind(&self) -> &'static str {
        match self {
            VertexConf::ElementWise(_) => "ElementWise",
            VertexConf::Shift(_) => "Shift",
            VertexConf::Scale(_) => "Scale",
            VertexConf::Subset { .. } => "Subset",
            VertexConf::Reshape { .. } => "Reshape",
            VertexConf::Merge => "Merge",
            VertexConf::Split { .. } => "Split",
            VertexConf::Stack => "Stack",
            VertexConf::Unstack { .. } => "Unstack",
            VertexConf::ReverseTime => "ReverseTime",
            VertexConf::Layer(_) => "Layer",
            VertexConf::Bidirectional { .. } => "Bidirectional",
            VertexConf::LastTimeStep { .. } => "LastTimeStep",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            VertexConf::ElementWise(ElementWiseOp::Subtract) => Arity::Exactly(2),
            VertexConf::ElementWise(_) | VertexConf::Merge | VertexConf::Stack => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            VertexConf::Split { sizes } => sizes.len(),
            _ => 1,
        }
    }

    /// Whether the vertex owns a trainable unit.
    pub fn is_layer(&self) -> bool {
        self.layer_conf().is_some()
    }

    pub fn layer_conf(&self) -> Option<&LayerConf> {
        match self {
            VertexConf::Layer(layer)
            | VertexConf::Bidirectional { layer, .. }
            | VertexConf::LastTimeStep { layer, .. } => Some(layer),
            _ => None,
        }
    }

    /// Copy with the layer input width taken from `input_types` when the
    /// configuration left it at 0.
    pub fn resolve(&self, input_types: Option<&[InputType]>) -> VertexConf {
        let width = match input_types {
            Some([only]) => only.size(),
            _ => return self.clone(),
        };
        let fill = |layer: &LayerConf| {
            if layer.n_in() == 0 {
                layer.with_n_in(width)
            } else {
                layer.clone()
            }
        };
        match self {
            VertexConf::Layer(layer) => VertexConf::Layer(fill(layer)),
            VertexConf::Bidirectional { layer, mode } => VertexConf::Bidirectional {
                layer: fill(layer),
                mode: *mode,
            },
            VertexConf::LastTimeStep { layer, step } => VertexConf::LastTimeStep {
                layer: fill(layer),
                step: *step,
            },
            other => other.clone(),
        }
    }

    /// Instantiate the runtime vertex.
    pub fn build(&self) -> Result<Vertex> {
        Ok(match self {
            VertexConf::ElementWise(op) => Vertex::ElementWise(ElementWiseVertex::new(*op)),
            VertexConf::Shift(shift) => Vertex::Shift(ShiftVertex::new(*shift)),
            VertexConf::Scale(factor) => Vertex::Scale(ScaleVertex::new(*factor)),
            VertexConf::Subset { from, to } => Vertex::Subset(SubsetVertex::new(*from, *to)?),
            VertexConf::Reshape { shape } => Vertex::Reshape(ReshapeVertex::new(shape.clone())?),
            VertexConf::Merge => Vertex::Merge(MergeVertex),
            VertexConf::Split { sizes } => Vertex::Split(SplitVertex::new(sizes.clone())?),
            VertexConf::Stack => Vertex::Stack(StackVertex),
            VertexConf::Unstack { from, stack_size } => {
                Vertex::Unstack(UnstackVertex::new(*from, *stack_size)?)
            }
            VertexConf::ReverseTime => Vertex::ReverseTime(ReverseTimeVertex),
            VertexConf::Layer(layer) => Vertex::Layer(LayerVertex::new(layer)?),
            VertexConf::Bidirectional { layer, mode } => {
                Vertex::Bidirectional(BidirectionalVertex::new(layer, *mode)?)
            }
            VertexConf::LastTimeStep { layer, step } => {
                if !layer.is_recurrent() {
                    return Err(Error::msg("LastTimeStep wraps recurrent layers only"));
                }
                Vertex::LastTimeStep(LastTimeStepVertex::new(layer.build()?, *step))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert_eq!(
            VertexConf::ElementWise(ElementWiseOp::Subtract).arity(),
            Arity::Exactly(2)
        );
        assert!(VertexConf::Merge.arity().accepts(3));
        assert!(!VertexConf::ReverseTime.arity().accepts(2));
        assert!(!VertexConf::Layer(LayerConf::dense(2, 2)).arity().is_multi_input());
        assert_eq!(VertexConf::Merge.arity().to_string(), "at least 1");
    }

    #[test]
    fn test_resolve_fills_missing_width() {
        let conf = VertexConf::Layer(LayerConf::dense(0, 3));
        let resolved = conf.resolve(Some(&[InputType::feed_forward(7)]));
        assert_eq!(resolved.layer_conf().unwrap().n_in(), 7);

        let explicit = VertexConf::Layer(LayerConf::dense(2, 3));
        let kept = explicit.resolve(Some(&[InputType::feed_forward(7)]));
        assert_eq!(kept.layer_conf().unwrap().n_in(), 2);
    }

    #[test]
    fn test_split_outputs() {
        let conf = VertexConf::Split { sizes: vec![1, 2, 3] };
        assert_eq!(conf.num_outputs(), 3);
        assert_eq!(VertexConf::Merge.num_outputs(), 1);
    }

    #[test]
    fn test_last_time_step_requires_recurrent_layer() {
        let conf = VertexConf::LastTimeStep {
            layer: LayerConf::dense(2, 2),
            step: TimeStep::Last,
        };
        assert!(conf.build().is_err());
    }
}
