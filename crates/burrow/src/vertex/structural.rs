// Structural vertices with a single input and no parameters
//
//   Shift        y = x + c
//   Scale        y = x * c
//   Subset       y = x[..., from..=to]
//   Reshape      y = reshape(x, [batch, shape...])
//   ReverseTime  y[:, t, :] = x[:, T-1-t, :]

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::shape::Shape;
use burrow_core::tensor::Tensor;

use super::VertexCache;

fn last_axis(x: &Tensor) -> Result<usize> {
    x.rank()
        .checked_sub(1)
        .ok_or(Error::RankMismatch { expected: 2, got: 0 })
}

/// Adds a constant.
#[derive(Debug, Clone)]
pub struct ShiftVertex {
    shift: f64,
}

impl ShiftVertex {
    pub fn new(shift: f64) -> Self {
        ShiftVertex { shift }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        x.add_scalar(self.shift)
    }

    pub fn backward(&self, grad: &Tensor) -> Tensor {
        grad.clone()
    }
}

/// Multiplies by a constant.
#[derive(Debug, Clone)]
pub struct ScaleVertex {
    factor: f64,
}

impl ScaleVertex {
    pub fn new(factor: f64) -> Self {
        ScaleVertex { factor }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        x.scale(self.factor)
    }

    pub fn backward(&self, grad: &Tensor) -> Tensor {
        grad.scale(self.factor)
    }
}

/// Inclusive feature range along the last axis.
#[derive(Debug, Clone)]
pub struct SubsetVertex {
    from: usize,
    to: usize,
}

impl SubsetVertex {
    pub fn new(from: usize, to: usize) -> Result<Self> {
        if from > to {
            bail!("subset range {from}..={to} is empty");
        }
        Ok(SubsetVertex { from, to })
    }

    pub fn width(&self) -> usize {
        self.to - self.from + 1
    }

    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, VertexCache)> {
        let y = x.narrow(last_axis(x)?, self.from, self.width())?;
        Ok((y, VertexCache::InputShape(x.shape().clone())))
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Tensor> {
        let VertexCache::InputShape(shape) = cache else {
            return Err(super::cache_mismatch("Subset"));
        };
        let size = shape.last_dim();
        grad.pad_zeros(last_axis(grad)?, self.from, size - self.to - 1)
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        if self.to >= input.size() {
            bail!("subset {}..={} out of range for {input}", self.from, self.to);
        }
        Ok(input.with_size(self.width()))
    }
}

/// Reshapes every example; the batch axis is kept.
#[derive(Debug, Clone)]
pub struct ReshapeVertex {
    shape: Vec<usize>,
}

impl ReshapeVertex {
    pub fn new(shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() || shape.contains(&0) {
            bail!("invalid reshape target {shape:?}");
        }
        Ok(ReshapeVertex { shape })
    }

    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, VertexCache)> {
        let mut dims = Vec::with_capacity(self.shape.len() + 1);
        dims.push(x.dim(0)?);
        dims.extend_from_slice(&self.shape);
        let y = x.reshape(Shape::new(dims))?;
        Ok((y, VertexCache::InputShape(x.shape().clone())))
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Tensor> {
        let VertexCache::InputShape(shape) = cache else {
            return Err(super::cache_mismatch("Reshape"));
        };
        grad.reshape(shape.clone())
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        let per_example: usize = self.shape.iter().product();
        let known = match input {
            InputType::FeedForward { size } => Some(*size),
            InputType::Recurrent {
                size,
                length: Some(length),
            } => Some(size * length),
            InputType::Recurrent { length: None, .. } => None,
        };
        if let Some(count) = known {
            if count != per_example {
                bail!("cannot reshape {input} ({count} values per example) to {:?}", self.shape);
            }
        }
        match self.shape.as_slice() {
            [size] => Ok(InputType::feed_forward(*size)),
            [length, size] => Ok(InputType::recurrent_with_length(*size, *length)),
            other => Err(Error::msg(format!(
                "reshape target {other:?} has no static input type"
            ))),
        }
    }
}

/// Reverses sequences along the time axis.
#[derive(Debug, Clone)]
pub struct ReverseTimeVertex;

impl ReverseTimeVertex {
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if x.rank() != 3 {
            return Err(Error::RankMismatch {
                expected: 3,
                got: x.rank(),
            });
        }
        x.flip(1)
    }

    pub fn backward(&self, grad: &Tensor) -> Result<Tensor> {
        grad.flip(1)
    }

    pub fn output_type(&self, input: &InputType) -> Result<InputType> {
        if !input.is_recurrent() {
            bail!("ReverseTime needs a sequence, got {input}");
        }
        Ok(input.clone())
    }
}
