// ElementWiseVertex — combine equally shaped inputs element by element
//
//   Add       y = x1 + x2 + ... + xn        dx_i = g
//   Subtract  y = x1 - x2                  dx_1 = g, dx_2 = -g
//   Product   y = x1 * x2 * ... * xn        dx_i = g * prod_{j != i} x_j
//   Average   y = (x1 + ... + xn) / n       dx_i = g / n
//   Max       y = max_i x_i                 dx_i = g where i won, else 0
//
// Max ties go to the lowest input index.

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::tensor::Tensor;

use super::VertexCache;

/// Element-wise operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementWiseOp {
    Add,
    Subtract,
    Product,
    Average,
    Max,
}

#[derive(Debug, Clone)]
pub struct ElementWiseVertex {
    op: ElementWiseOp,
}

impl ElementWiseVertex {
    pub fn new(op: ElementWiseOp) -> Self {
        ElementWiseVertex { op }
    }

    pub fn op(&self) -> ElementWiseOp {
        self.op
    }

    pub fn forward(&self, inputs: &[Tensor]) -> Result<(Tensor, VertexCache)> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::msg("element-wise vertex needs at least one input"))?;
        for x in &inputs[1..] {
            if x.shape() != first.shape() {
                return Err(Error::ShapeMismatch {
                    expected: first.shape().clone(),
                    got: x.shape().clone(),
                });
            }
        }
        let n = inputs.len();
        match self.op {
            ElementWiseOp::Add => {
                let mut acc = first.clone();
                for x in &inputs[1..] {
                    acc = acc.add(x)?;
                }
                Ok((acc, VertexCache::Count(n)))
            }
            ElementWiseOp::Subtract => {
                if n != 2 {
                    return Err(Error::ArityMismatch {
                        vertex: "ElementWise(Subtract)".to_string(),
                        expected: "exactly 2".to_string(),
                        got: n,
                    });
                }
                Ok((inputs[0].sub(&inputs[1])?, VertexCache::Count(n)))
            }
            ElementWiseOp::Product => {
                let mut acc = first.clone();
                for x in &inputs[1..] {
                    acc = acc.mul(x)?;
                }
                Ok((acc, VertexCache::Inputs(inputs.to_vec())))
            }
            ElementWiseOp::Average => {
                let mut acc = first.clone();
                for x in &inputs[1..] {
                    acc = acc.add(x)?;
                }
                Ok((acc.scale(1.0 / n as f64), VertexCache::Count(n)))
            }
            ElementWiseOp::Max => {
                let len = first.elem_count();
                let mut out = first.to_vec();
                let mut winners = vec![0usize; len];
                for (i, x) in inputs.iter().enumerate().skip(1) {
                    for (e, &v) in x.data().iter().enumerate() {
                        // strict comparison keeps the earlier input on ties
                        if v > out[e] {
                            out[e] = v;
                            winners[e] = i;
                        }
                    }
                }
                let y = Tensor::new(out, first.shape().clone())?;
                Ok((y, VertexCache::ArgMax { winners, inputs: n }))
            }
        }
    }

    pub fn backward(&self, cache: &VertexCache, grad: &Tensor) -> Result<Vec<Tensor>> {
        match (self.op, cache) {
            (ElementWiseOp::Add, VertexCache::Count(n)) => Ok(vec![grad.clone(); *n]),
            (ElementWiseOp::Subtract, VertexCache::Count(_)) => {
                Ok(vec![grad.clone(), grad.neg()])
            }
            (ElementWiseOp::Average, VertexCache::Count(n)) => {
                Ok(vec![grad.scale(1.0 / *n as f64); *n])
            }
            (ElementWiseOp::Product, VertexCache::Inputs(inputs)) => {
                let mut grads = Vec::with_capacity(inputs.len());
                for i in 0..inputs.len() {
                    let mut g = grad.clone();
                    for (j, x) in inputs.iter().enumerate() {
                        if j != i {
                            g = g.mul(x)?;
                        }
                    }
                    grads.push(g);
                }
                Ok(grads)
            }
            (ElementWiseOp::Max, VertexCache::ArgMax { winners, inputs }) => {
                if winners.len() != grad.elem_count() {
                    bail!(
                        "max vertex cached {} elements, gradient has {}",
                        winners.len(),
                        grad.elem_count()
                    );
                }
                let mut grads = vec![vec![0.0; grad.elem_count()]; *inputs];
                for (e, (&w, &g)) in winners.iter().zip(grad.data()).enumerate() {
                    grads[w][e] = g;
                }
                grads
                    .into_iter()
                    .map(|g| Tensor::new(g, grad.shape().clone()))
                    .collect()
            }
            _ => Err(super::cache_mismatch("ElementWise")),
        }
    }

    pub fn output_type(&self, inputs: &[InputType]) -> Result<InputType> {
        let first = inputs
            .first()
            .ok_or_else(|| Error::msg("element-wise vertex needs at least one input"))?;
        if let Some(other) = inputs.iter().find(|t| !t.compatible_with(first)) {
            bail!("element-wise inputs must share a type: {first} vs {other}");
        }
        Ok(first.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(data: &[f64]) -> Tensor {
        Tensor::from_slice(data, (1, data.len())).unwrap()
    }

    #[test]
    fn test_add_and_average() {
        let add = ElementWiseVertex::new(ElementWiseOp::Add);
        let (y, cache) = add.forward(&[t(&[1.0, 2.0]), t(&[3.0, 4.0])]).unwrap();
        assert_eq!(y.to_vec(), vec![4.0, 6.0]);
        let grads = add.backward(&cache, &t(&[1.0, -1.0])).unwrap();
        assert_eq!(grads.len(), 2);
        assert_eq!(grads[1].to_vec(), vec![1.0, -1.0]);

        let avg = ElementWiseVertex::new(ElementWiseOp::Average);
        let (y, cache) = avg.forward(&[t(&[1.0, 2.0]), t(&[3.0, 4.0])]).unwrap();
        assert_eq!(y.to_vec(), vec![2.0, 3.0]);
        let grads = avg.backward(&cache, &t(&[2.0, 4.0])).unwrap();
        assert_eq!(grads[0].to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_subtract_requires_two_inputs() {
        let sub = ElementWiseVertex::new(ElementWiseOp::Subtract);
        assert!(sub.forward(&[t(&[1.0]), t(&[1.0]), t(&[1.0])]).is_err());
        let (y, cache) = sub.forward(&[t(&[5.0]), t(&[2.0])]).unwrap();
        assert_eq!(y.to_vec(), vec![3.0]);
        let grads = sub.backward(&cache, &t(&[1.5])).unwrap();
        assert_eq!(grads[0].to_vec(), vec![1.5]);
        assert_eq!(grads[1].to_vec(), vec![-1.5]);
    }

    #[test]
    fn test_product_gradient_handles_zeros() {
        let prod = ElementWiseVertex::new(ElementWiseOp::Product);
        let (y, cache) = prod
            .forward(&[t(&[2.0, 0.0]), t(&[3.0, 5.0]), t(&[4.0, 7.0])])
            .unwrap();
        assert_eq!(y.to_vec(), vec![24.0, 0.0]);
        let grads = prod.backward(&cache, &t(&[1.0, 1.0])).unwrap();
        assert_eq!(grads[0].to_vec(), vec![12.0, 35.0]);
        assert_eq!(grads[1].to_vec(), vec![8.0, 0.0]);
        assert_eq!(grads[2].to_vec(), vec![6.0, 0.0]);
    }

    #[test]
    fn test_max_routes_gradient_to_first_winner() {
        let max = ElementWiseVertex::new(ElementWiseOp::Max);
        let (y, cache) = max
            .forward(&[t(&[1.0, 5.0, 2.0]), t(&[3.0, 5.0, 1.0])])
            .unwrap();
        assert_eq!(y.to_vec(), vec![3.0, 5.0, 2.0]);
        let grads = max.backward(&cache, &t(&[10.0, 20.0, 30.0])).unwrap();
        assert_eq!(grads[0].to_vec(), vec![0.0, 20.0, 30.0]);
        assert_eq!(grads[1].to_vec(), vec![10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let add = ElementWiseVertex::new(ElementWiseOp::Add);
        assert!(add.forward(&[t(&[1.0, 2.0]), t(&[1.0])]).is_err());
    }
}
