use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::shape::Shape;

// Tensor — dense row-major f64 array
//
// The graph engine only needs a small, predictable tensor: elementwise
// arithmetic, 2-D matmul, and axis-wise copies (narrow / cat / flip / select)
// for merging, splitting and reversing activations. Heavy kernels are out of
// scope; everything here is a straightforward loop over contiguous memory.
//
// MEMORY MODEL:
//
//   Storage is an Arc<Vec<f64>>, so cloning a Tensor is O(1). Every
//   operation allocates a fresh output; a tensor is never mutated once it has
//   been handed out, which is what lets the activation cache hand borrowed
//   tensors to vertices without copying.

/// An n-dimensional array of `f64` values.
#[derive(Clone)]
pub struct Tensor {
    shape: Shape,
    data: Arc<Vec<f64>>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={}, data=", self.shape)?;
        if self.data.len() <= 16 {
            write!(f, "{:?})", self.data)
        } else {
            write!(f, "{:?}..)", &self.data[..16])
        }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.data == other.data
    }
}

impl Tensor {
    // Constructors

    /// Create a tensor from owned data. Fails if the element count does not
    /// match the shape.
    pub fn new(data: Vec<f64>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        Ok(Tensor {
            shape,
            data: Arc::new(data),
        })
    }

    /// Create a tensor by copying a slice.
    pub fn from_slice(data: &[f64], shape: impl Into<Shape>) -> Result<Self> {
        Self::new(data.to_vec(), shape)
    }

    /// A tensor with every element set to `value`.
    pub fn full(shape: impl Into<Shape>, value: f64) -> Self {
        let shape = shape.into();
        let n = shape.elem_count();
        Tensor {
            shape,
            data: Arc::new(vec![value; n]),
        }
    }

    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.data.len()
    }

    pub fn dim(&self, d: usize) -> Result<usize> {
        self.shape.dim(d)
    }

    /// Raw row-major data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.as_ref().clone()
    }

    /// Read a single element by multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Result<f64> {
        if index.len() != self.rank() {
            return Err(Error::RankMismatch {
                expected: self.rank(),
                got: index.len(),
            });
        }
        let mut offset = 0;
        for (d, (&i, &size)) in index.iter().zip(self.dims()).enumerate() {
            if i >= size {
                return Err(Error::NarrowOutOfBounds {
                    dim: d,
                    start: i,
                    len: 1,
                    dim_size: size,
                });
            }
            offset = offset * size + i;
        }
        Ok(self.data[offset])
    }

    /// Sum of all elements.
    pub fn sum_all(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Element-wise comparison within an absolute tolerance.
    pub fn all_close(&self, other: &Tensor, tol: f64) -> bool {
        self.shape == other.shape
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= tol)
    }

    // Element-wise operations

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: Arc::new(self.data.iter().map(|&v| f(v)).collect()),
        }
    }

    /// Combine two same-shaped tensors element by element.
    pub fn zip_map(&self, rhs: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
        self.ensure_same_shape(rhs)?;
        Ok(Tensor {
            shape: self.shape.clone(),
            data: Arc::new(
                self.data
                    .iter()
                    .zip(rhs.data.iter())
                    .map(|(&a, &b)| f(a, b))
                    .collect(),
            ),
        })
    }

    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_map(rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_map(rhs, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Tensor) -> Result<Tensor> {
        self.zip_map(rhs, |a, b| a * b)
    }

    pub fn neg(&self) -> Tensor {
        self.map(|v| -v)
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|v| v * factor)
    }

    pub fn add_scalar(&self, value: f64) -> Tensor {
        self.map(|v| v + value)
    }

    fn ensure_same_shape(&self, rhs: &Tensor) -> Result<()> {
        if self.shape != rhs.shape {
            return Err(Error::ShapeMismatch {
                expected: self.shape.clone(),
                got: rhs.shape.clone(),
            });
        }
        Ok(())
    }

    fn ensure_rank(&self, rank: usize) -> Result<()> {
        if self.rank() != rank {
            return Err(Error::RankMismatch {
                expected: rank,
                got: self.rank(),
            });
        }
        Ok(())
    }

    // Linear algebra

    /// Matrix product of two 2-D tensors: `[m, k] @ [k, n] -> [m, n]`.
    pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
        self.ensure_rank(2)?;
        rhs.ensure_rank(2)?;
        let (m, k1) = (self.dims()[0], self.dims()[1]);
        let (k2, n) = (rhs.dims()[0], rhs.dims()[1]);
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }
        let a = self.data();
        let b = rhs.data();
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            let row = &mut out[i * n..(i + 1) * n];
            for p in 0..k1 {
                let av = a[i * k1 + p];
                if av == 0.0 {
                    continue;
                }
                let brow = &b[p * n..(p + 1) * n];
                for (o, &bv) in row.iter_mut().zip(brow) {
                    *o += av * bv;
                }
            }
        }
        Tensor::new(out, (m, n))
    }

    /// Transpose of a 2-D tensor.
    pub fn t(&self) -> Result<Tensor> {
        self.ensure_rank(2)?;
        let (m, n) = (self.dims()[0], self.dims()[1]);
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                out[j * m + i] = self.data[i * n + j];
            }
        }
        Tensor::new(out, (n, m))
    }

    /// Add a row vector (`[1, n]` or `[n]`) to every row of a `[m, n]` tensor.
    pub fn add_row(&self, row: &Tensor) -> Result<Tensor> {
        self.ensure_rank(2)?;
        let n = self.dims()[1];
        if row.elem_count() != n {
            return Err(Error::ShapeMismatch {
                expected: Shape::from((1, n)),
                got: row.shape.clone(),
            });
        }
        let mut out = self.to_vec();
        for chunk in out.chunks_mut(n) {
            for (o, &r) in chunk.iter_mut().zip(row.data()) {
                *o += r;
            }
        }
        Tensor::new(out, self.shape.clone())
    }

    /// Column sums of a `[m, n]` tensor, as `[1, n]`.
    pub fn sum_rows(&self) -> Result<Tensor> {
        self.ensure_rank(2)?;
        let n = self.dims()[1];
        let mut out = vec![0.0; n];
        for chunk in self.data.chunks(n.max(1)) {
            for (o, &v) in out.iter_mut().zip(chunk) {
                *o += v;
            }
        }
        Tensor::new(out, (1, n))
    }

    // Shape operations

    /// Same data, different shape.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        let shape = shape.into();
        if shape.elem_count() != self.elem_count() {
            return Err(Error::ReshapeElementMismatch {
                src: self.elem_count(),
                dst: shape.elem_count(),
                dst_shape: shape,
            });
        }
        Ok(Tensor {
            shape,
            data: Arc::clone(&self.data),
        })
    }

    /// Take `len` entries starting at `start` along `dim`.
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Tensor> {
        let (outer, size, inner) = self.shape.split_at(dim)?;
        if start + len > size {
            return Err(Error::NarrowOutOfBounds {
                dim,
                start,
                len,
                dim_size: size,
            });
        }
        let mut out = Vec::with_capacity(outer * len * inner);
        for o in 0..outer {
            let base = (o * size + start) * inner;
            out.extend_from_slice(&self.data[base..base + len * inner]);
        }
        Tensor::new(out, self.shape.with_dim(dim, len)?)
    }

    /// Concatenate tensors along `dim`. All other dimensions must agree.
    pub fn cat(tensors: &[Tensor], dim: usize) -> Result<Tensor> {
        let first = tensors
            .first()
            .ok_or_else(|| Error::msg("cat requires at least one tensor"))?;
        let (outer, _, inner) = first.shape.split_at(dim)?;
        let mut total = 0;
        for t in tensors {
            if t.rank() != first.rank() {
                return Err(Error::RankMismatch {
                    expected: first.rank(),
                    got: t.rank(),
                });
            }
            let aligned = t.shape.with_dim(dim, first.dims()[dim])?;
            if aligned != first.shape {
                return Err(Error::ShapeMismatch {
                    expected: first.shape.clone(),
                    got: t.shape.clone(),
                });
            }
            total += t.dims()[dim];
        }
        let mut out = Vec::with_capacity(outer * total * inner);
        for o in 0..outer {
            for t in tensors {
                let block = t.dims()[dim] * inner;
                out.extend_from_slice(&t.data[o * block..(o + 1) * block]);
            }
        }
        Tensor::new(out, first.shape.with_dim(dim, total)?)
    }

    /// Zero-pad along `dim`: `before` zero entries ahead, `after` behind.
    pub fn pad_zeros(&self, dim: usize, before: usize, after: usize) -> Result<Tensor> {
        let mut parts = Vec::with_capacity(3);
        if before > 0 {
            parts.push(Tensor::zeros(self.shape.with_dim(dim, before)?));
        }
        parts.push(self.clone());
        if after > 0 {
            parts.push(Tensor::zeros(self.shape.with_dim(dim, after)?));
        }
        Tensor::cat(&parts, dim)
    }

    /// Reverse the order of entries along `dim`.
    pub fn flip(&self, dim: usize) -> Result<Tensor> {
        let (outer, size, inner) = self.shape.split_at(dim)?;
        let mut out = Vec::with_capacity(self.elem_count());
        for o in 0..outer {
            for i in (0..size).rev() {
                let base = (o * size + i) * inner;
                out.extend_from_slice(&self.data[base..base + inner]);
            }
        }
        Tensor::new(out, self.shape.clone())
    }

    /// Pick entry `index` along `dim`, removing that axis.
    pub fn select(&self, dim: usize, index: usize) -> Result<Tensor> {
        let picked = self.narrow(dim, index, 1)?;
        let mut dims = self.dims().to_vec();
        dims.remove(dim);
        picked.reshape(dims)
    }
}
