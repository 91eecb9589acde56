// Mask — per-example, per-timestep presence flags
//
// A mask is a tensor of 0/1 values, `[batch, time]` for sequences or
// `[batch, 1]` for per-example masks. `None` means "everything present".
//
// COMBINING:
//   Vertices that join several inputs OR their masks together: a timestep is
//   present if it is present in any input. If any input carries no mask the
//   result carries no mask either.

use burrow_core::error::{Error, Result};
use burrow_core::tensor::Tensor;

/// OR-combine the masks of several inputs.
///
/// ```text
///   [1, 1, 0] | [1, 0, 0]  ->  [1, 1, 0]
///   [1, 1, 0] | None       ->  None
/// ```
pub fn combine_or(masks: &[Option<Tensor>]) -> Result<Option<Tensor>> {
    let mut present = Vec::with_capacity(masks.len());
    for mask in masks {
        match mask {
            Some(m) => present.push(m),
            None => return Ok(None),
        }
    }
    let Some((first, rest)) = present.split_first() else {
        return Ok(None);
    };
    let mut combined = (*first).clone();
    for m in rest {
        if m.shape() != combined.shape() {
            return Err(Error::ShapeMismatch {
                expected: combined.shape().clone(),
                got: m.shape().clone(),
            });
        }
        combined = combined.zip_map(m, |a, b| {
            if a != 0.0 || b != 0.0 {
                1.0
            } else {
                0.0
            }
        })?;
    }
    Ok(Some(combined))
}

/// Reverse a `[batch, time]` mask along time. Per-example masks are unchanged.
pub fn reverse_time(mask: &Tensor) -> Result<Tensor> {
    if mask.rank() != 2 {
        return Err(Error::RankMismatch {
            expected: 2,
            got: mask.rank(),
        });
    }
    mask.flip(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_combination() {
        let a = Tensor::new(vec![1.0, 1.0, 0.0], (1, 3)).unwrap();
        let b = Tensor::new(vec![1.0, 0.0, 0.0], (1, 3)).unwrap();
        let c = combine_or(&[Some(a), Some(b)]).unwrap().unwrap();
        assert_eq!(c.to_vec(), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_absent_if_any_absent() {
        let a = Tensor::new(vec![1.0, 0.0], (1, 2)).unwrap();
        assert!(combine_or(&[Some(a), None]).unwrap().is_none());
        assert!(combine_or(&[]).unwrap().is_none());
    }

    #[test]
    fn test_single_mask_passes_through() {
        let a = Tensor::new(vec![0.0, 1.0], (2, 1)).unwrap();
        let c = combine_or(&[Some(a.clone())]).unwrap().unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let a = Tensor::ones((1, 3));
        let b = Tensor::ones((1, 2));
        assert!(combine_or(&[Some(a), Some(b)]).is_err());
    }

    #[test]
    fn test_reverse_time() {
        let m = Tensor::new(vec![1.0, 1.0, 0.0, 1.0, 0.0, 0.0], (2, 3)).unwrap();
        let r = reverse_time(&m).unwrap();
        assert_eq!(r.to_vec(), vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }
}
