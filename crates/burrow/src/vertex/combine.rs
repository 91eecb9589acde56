// Vertices that join or cut tensors
//
//   Merge    concat inputs along the feature (last) axis
//   Split    cut the feature axis into pieces, one output slot per piece
//   Stack    concat inputs along the batch axis
//   Unstack  take one of `stack_size` equal blocks along the batch axis
//
// Merge/Stack remember the per-input sizes so the backward pass can cut the
// incoming gradient back into per-input pieces.

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;

use super::VertexCache;

fn feature_axis(x: &Tensor) -> usize {
    x.rank().saturating_sub(1)
}

fn cut(grad: &Tensor, dim: usize, sizes: &[usize]) -> Result<Vec<Tensor>> {
    let mut pieces = Vec::with_capacity(sizes.len());
    let mut start = 0;
    for &size in sizes {
        pieces.push(grad.narrow(dim, start, size)?);
        start += size;
    }
    Ok(pieces)
}

#[derive(Debug, Clone)]
pub struct MergeVertex;

impl MergeVertex {
    pub fn forward(&self, inputs: &[Tensor]) -> Result<(Tensor, VertexCache)> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::msg("merge vertex needs at least one input"))?;
        let axis = feature_axis(first);
        let widths = inputs
            .iter()
            .map(|x| x.dim(axis))
            .collect::<Result<Vec<_>>>()?;
        let y = Tensor::cat(inputs, axis)?;
        Ok((y, VertexCache::Sizes(widths)))
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Vec<Tensor>> {
        let VertexCache::Sizes(widths) = cache else {
            return Err(super::cache_mismatch("Merge"));
        };
        cut(grad, feature_axis(grad), widths)
    }

    pub fn output_type(&self, inputs: &[InputType]) -> Result<InputType> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::msg("merge vertex needs at least one input"))?;
        if let Some(other) = inputs
            .iter()
            .find(|t| t.is_recurrent() != first.is_recurrent())
        {
            bail!("cannot merge {first} with {other}");
        }
        let total = inputs.iter().map(InputType::size).sum();
        Ok(first.with_size(total))
    }
}

#[derive(Debug, Clone)]
pub struct SplitVertex {
    sizes: Vec<usize>,
}

impl SplitVertex {
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        if sizes.is_empty() || sizes.contains(&0) {
            bail!("invalid split sizes {sizes:?}");
        }
        Ok(SplitVertex { sizes })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    fn total(&self) -> usize {
        self.sizes.iter().sum()
    }

    pub fn forward(&self, x: &Tensor) -> Result<Vec<Tensor>> {
        let axis = feature_axis(x);
        let width = x.dim(axis)?;
        if width != self.total() {
            bail!("split sizes {:?} do not add up to feature width {width}", self.sizes);
        }
        cut(x, axis, &self.sizes)
    }

    pub fn backward(&self, grads: &[Tensor]) -> Result<Tensor> {
        let first = grads
            .first()
            .ok_or_else(|| Error::msg("split backward needs slot gradients"))?;
        Tensor::cat(grads, feature_axis(first))
    }

    pub fn output_types(&self, input: &InputType) -> Result<Vec<InputType>> {
        if input.size() != self.total() {
            bail!("split sizes {:?} do not add up to {input}", self.sizes);
        }
        Ok(self.sizes.iter().map(|&s| input.with_size(s)).collect())
    }
}

#[derive(Debug, Clone)]
pub struct StackVertex;

impl StackVertex {
    pub fn forward(&self, inputs: &[Tensor]) -> Result<(Tensor, VertexCache)> {
        let batches = inputs
            .iter()
            .map(|x| x.dim(0))
            .collect::<Result<Vec<_>>>()?;
        let y = Tensor::cat(inputs, 0)?;
        Ok((y, VertexCache::Sizes(batches)))
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Vec<Tensor>> {
        let VertexCache::Sizes(batches) = cache else {
            return Err(super::cache_mismatch("Stack"));
        };
        cut(grad, 0, batches)
    }

    /// Masks are stacked like activations; absent if any input has none.
    pub fn stack_masks(&self, masks: &[Option<Tensor>]) -> Result<Option<Tensor>> {
        let mut present = Vec::with_capacity(masks.len());
        for mask in masks {
            match mask {
                Some(m) => present.push(m.clone()),
                None => return Ok(None),
            }
        }
        if present.is_empty() {
            return Ok(None);
        }
        Tensor::cat(&present, 0).map(Some)
    }

    pub fn output_type(&self, inputs: &[InputType]) -> Result<InputType> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::msg("stack vertex needs at least one input"))?;
        if let Some(other) = inputs.iter().find(|t| !t.compatible_with(first)) {
            bail!("cannot stack {first} with {other}");
        }
        Ok(first.clone())
    }
}

#[derive(Debug, Clone)]
pub struct UnstackVertex {
    from: usize,
    stack_size: usize,
}

impl UnstackVertex {
    pub fn new(from: usize, stack_size: usize) -> Result<Self> {
        if from >= stack_size {
            bail!("unstack block {from} out of range for stack size {stack_size}");
        }
        Ok(UnstackVertex { from, stack_size })
    }

    fn block(&self, batch: usize) -> Result<usize> {
        if batch % self.stack_size != 0 {
            bail!("batch of {batch} cannot be unstacked into {} blocks", self.stack_size);
        }
        Ok(batch / self.stack_size)
    }

    /// Rows `[from * block, (from + 1) * block)` of any batch-major tensor.
    pub fn take(&self, x: &Tensor) -> Result<Tensor> {
        let block = self.block(x.dim(0)?)?;
        x.narrow(0, self.from * block, block)
    }

    pub fn forward(&self, x: &Tensor) -> Result<(Tensor, VertexCache)> {
        let y = self.take(x)?;
        Ok((y, VertexCache::InputShape(x.shape().clone())))
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Tensor> {
        let VertexCache::InputShape(shape) = cache else {
            return Err(super::cache_mismatch("Unstack"));
        };
        let block = self.block(shape.dim(0)?)?;
        let after = (self.stack_size - self.from - 1) * block;
        grad.pad_zeros(0, self.from * block, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_cut_back() {
        let a = Tensor::new(vec![1.0, 2.0], (1, 2)).unwrap();
        let b = Tensor::new(vec![3.0, 4.0, 5.0], (1, 3)).unwrap();
        let (y, cache) = MergeVertex.forward(&[a, b]).unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let grads = MergeVertex
            .backward(&cache, &Tensor::new(vec![0.1, 0.2, 0.3, 0.4, 0.5], (1, 5)).unwrap())
            .unwrap();
        assert_eq!(grads[0].to_vec(), vec![0.1, 0.2]);
        assert_eq!(grads[1].to_vec(), vec![0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_merge_sequences_on_feature_axis() {
        let a = Tensor::ones((2, 4, 3));
        let b = Tensor::zeros((2, 4, 1));
        let (y, _) = MergeVertex.forward(&[a, b]).unwrap();
        assert_eq!(y.dims(), &[2, 4, 4]);
        let ty = MergeVertex
            .output_type(&[InputType::recurrent(3), InputType::recurrent(1)])
            .unwrap();
        assert_eq!(ty, InputType::recurrent(4));
        assert!(MergeVertex
            .output_type(&[InputType::recurrent(3), InputType::feed_forward(1)])
            .is_err());
    }

    #[test]
    fn test_split_slots() {
        let split = SplitVertex::new(vec![1, 2]).unwrap();
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3)).unwrap();
        let outs = split.forward(&x).unwrap();
        assert_eq!(outs[0].to_vec(), vec![1.0, 4.0]);
        assert_eq!(outs[1].to_vec(), vec![2.0, 3.0, 5.0, 6.0]);
        assert_eq!(split.backward(&outs).unwrap(), x);
        assert!(split.forward(&Tensor::zeros((2, 4))).is_err());
    }

    #[test]
    fn test_stack_unstack() {
        let a = Tensor::new(vec![1.0, 2.0], (1, 2)).unwrap();
        let b = Tensor::new(vec![3.0, 4.0, 5.0, 6.0], (2, 2)).unwrap();
        let (y, cache) = StackVertex.forward(&[a, b]).unwrap();
        assert_eq!(y.dims(), &[3, 2]);
        let grads = StackVertex.backward(&cache, &y).unwrap();
        assert_eq!(grads[1].dims(), &[2, 2]);

        let unstack = UnstackVertex::new(1, 2).unwrap();
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], (4, 1)).unwrap();
        let (y, cache) = unstack.forward(&x).unwrap();
        assert_eq!(y.to_vec(), vec![3.0, 4.0]);
        let g = unstack.backward(&cache, &Tensor::ones((2, 1))).unwrap();
        assert_eq!(g.to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        assert!(unstack.forward(&Tensor::zeros((3, 1))).is_err());
    }
}
