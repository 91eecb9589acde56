// InputType — per-example activation type used for static shape checks
//
// A graph descriptor may declare the type of each external input. The
// builder then walks the graph in execution order, asking every vertex for
// its output type, which both validates wiring (feature widths must agree)
// and lets layers configured with n_in = 0 pick up their input width.
//
// The batch dimension is never part of an InputType.

use std::fmt;

use crate::shape::Shape;

/// The type of one activation, excluding the batch axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    /// `[batch, size]`
    FeedForward { size: usize },
    /// `[batch, time, size]`; `length` is `None` when variable.
    Recurrent { size: usize, length: Option<usize> },
}

impl InputType {
    pub fn feed_forward(size: usize) -> Self {
        InputType::FeedForward { size }
    }

    pub fn recurrent(size: usize) -> Self {
        InputType::Recurrent { size, length: None }
    }

    pub fn recurrent_with_length(size: usize, length: usize) -> Self {
        InputType::Recurrent {
            size,
            length: Some(length),
        }
    }

    /// Feature width.
    pub fn size(&self) -> usize {
        match self {
            InputType::FeedForward { size } | InputType::Recurrent { size, .. } => *size,
        }
    }

    pub fn is_recurrent(&self) -> bool {
        matches!(self, InputType::Recurrent { .. })
    }

    /// Same kind of type with a different feature width.
    pub fn with_size(&self, size: usize) -> Self {
        match self {
            InputType::FeedForward { .. } => InputType::FeedForward { size },
            InputType::Recurrent { length, .. } => InputType::Recurrent {
                size,
                length: *length,
            },
        }
    }

    /// Two types are compatible when kind and width agree; an unknown
    /// sequence length is compatible with any length.
    pub fn compatible_with(&self, other: &InputType) -> bool {
        match (self, other) {
            (InputType::FeedForward { size: a }, InputType::FeedForward { size: b }) => a == b,
            (
                InputType::Recurrent {
                    size: a,
                    length: la,
                },
                InputType::Recurrent {
                    size: b,
                    length: lb,
                },
            ) => a == b && (la.is_none() || lb.is_none() || la == lb),
            _ => false,
        }
    }

    /// Whether a concrete tensor shape (batch axis included) fits this type.
    pub fn matches_shape(&self, shape: &Shape) -> bool {
        match (self, shape.dims()) {
            (InputType::FeedForward { size }, [_, f]) => f == size,
            (InputType::Recurrent { size, length }, [_, t, f]) => {
                f == size && length.map_or(true, |l| l == *t)
            }
            _ => false,
        }
    }

    /// Derive the type of a concrete activation.
    pub fn from_shape(shape: &Shape) -> crate::Result<Self> {
        match shape.dims() {
            [_, f] => Ok(InputType::FeedForward { size: *f }),
            [_, t, f] => Ok(InputType::Recurrent {
                size: *f,
                length: Some(*t),
            }),
            _ => Err(crate::Error::msg(format!(
                "no input type for activation of shape {shape}"
            ))),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::FeedForward { size } => write!(f, "FeedForward({size})"),
            InputType::Recurrent {
                size,
                length: Some(l),
            } => write!(f, "Recurrent({size}, length={l})"),
            InputType::Recurrent { size, length: None } => write!(f, "Recurrent({size})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_shape() {
        assert!(InputType::feed_forward(4).matches_shape(&Shape::from((10, 4))));
        assert!(!InputType::feed_forward(4).matches_shape(&Shape::from((10, 5))));
        assert!(InputType::recurrent(3).matches_shape(&Shape::from((2, 7, 3))));
        assert!(!InputType::recurrent_with_length(3, 5).matches_shape(&Shape::from((2, 7, 3))));
    }

    #[test]
    fn test_compatible_with_unknown_length() {
        let a = InputType::recurrent(3);
        let b = InputType::recurrent_with_length(3, 9);
        assert!(a.compatible_with(&b));
        assert!(!a.compatible_with(&InputType::feed_forward(3)));
    }
}
