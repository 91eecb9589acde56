use std::fmt;

// Shape — N-dimensional shape of a dense tensor
//
// Conventions used across burrow:
//   - Feed-forward activations: [batch, features]
//   - Time series:              [batch, time, features]
//   - Masks:                    [batch, time] or [batch, 1]
//
// The feature axis is always the last axis; the batch axis is always axis 0.

/// N-dimensional shape of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (product of all dimensions).
    /// A scalar shape [] has 1 element.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product::<usize>()
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or(crate::Error::DimOutOfRange {
            dim: d,
            rank: self.rank(),
        })
    }

    /// Size of the last (feature) axis, 0 for a scalar shape.
    pub fn last_dim(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    /// A copy of this shape with dimension `d` replaced by `size`.
    pub fn with_dim(&self, d: usize, size: usize) -> crate::Result<Shape> {
        if d >= self.rank() {
            return Err(crate::Error::DimOutOfRange {
                dim: d,
                rank: self.rank(),
            });
        }
        let mut dims = self.0.clone();
        dims[d] = size;
        Ok(Shape(dims))
    }

    /// Split the shape around `dim` into (outer, size, inner) element counts,
    /// the building block for every axis-wise copy in the tensor.
    pub fn split_at(&self, dim: usize) -> crate::Result<(usize, usize, usize)> {
        let size = self.dim(dim)?;
        let outer = self.0[..dim].iter().product::<usize>();
        let inner = self.0[dim + 1..].iter().product::<usize>();
        Ok((outer, size, inner))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

// Convenient From implementations
// These let you write: Shape::from((3, 4)) instead of Shape::new(vec![3, 4])

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::from(());
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elem_count(), 1);
        assert_eq!(s.last_dim(), 0);
    }

    #[test]
    fn test_split_at() {
        let s = Shape::from((2, 3, 4));
        assert_eq!(s.split_at(0).unwrap(), (1, 2, 12));
        assert_eq!(s.split_at(1).unwrap(), (2, 3, 4));
        assert_eq!(s.split_at(2).unwrap(), (6, 4, 1));
        assert!(s.split_at(3).is_err());
    }

    #[test]
    fn test_with_dim() {
        let s = Shape::from((2, 3));
        assert_eq!(s.with_dim(1, 7).unwrap(), Shape::from((2, 7)));
        assert!(s.with_dim(2, 1).is_err());
    }

    #[test]
    fn test_display() {
        let s = Shape::from((3, 4));
        assert_eq!(format!("{}", s), "[3, 4]");
    }
}
