// Activation functions — applied element-wise (softmax: per row)
//
// Compute units keep the pre-activation `z` and the output `a = f(z)` in
// their per-call cache, so backward can use whichever form gives the cheaper
// derivative:
//
//   Identity:  f'(z) = 1
//   ReLU:      f'(z) = 1 if z > 0 else 0
//   Sigmoid:   f'(z) = a * (1 - a)
//   Tanh:      f'(z) = 1 - a²
//   Softmax:   dz_i  = a_i * (g_i - Σ_j g_j a_j)   (over the last axis)

use burrow_core::error::Result;
use burrow_core::tensor::Tensor;

/// Activation applied by a compute unit after its affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Sigmoid,
    Tanh,
    /// Softmax over the last (feature) axis.
    Softmax,
}

impl Activation {
    /// Apply the activation to a pre-activation tensor.
    pub fn forward(&self, z: &Tensor) -> Result<Tensor> {
        Ok(match self {
            Activation::Identity => z.clone(),
            Activation::Relu => z.map(|v| v.max(0.0)),
            Activation::Sigmoid => z.map(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.map(f64::tanh),
            Activation::Softmax => softmax_last_axis(z)?,
        })
    }

    /// Gradient with respect to the pre-activation `z`, given the forward
    /// output `a` and the gradient `grad` with respect to `a`.
    pub fn backward(&self, z: &Tensor, a: &Tensor, grad: &Tensor) -> Result<Tensor> {
        match self {
            Activation::Identity => Ok(grad.clone()),
            Activation::Relu => z.zip_map(grad, |zv, g| if zv > 0.0 { g } else { 0.0 }),
            Activation::Sigmoid => a.zip_map(grad, |av, g| g * av * (1.0 - av)),
            Activation::Tanh => a.zip_map(grad, |av, g| g * (1.0 - av * av)),
            Activation::Softmax => softmax_backward(a, grad),
        }
    }
}

fn softmax_last_axis(z: &Tensor) -> Result<Tensor> {
    let width = z.shape().last_dim().max(1);
    let mut out = Vec::with_capacity(z.elem_count());
    for row in z.data().chunks(width) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = row.iter().map(|v| (v - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        out.extend(exps.into_iter().map(|e| e / sum));
    }
    Tensor::new(out, z.shape().clone())
}

fn softmax_backward(a: &Tensor, grad: &Tensor) -> Result<Tensor> {
    let width = a.shape().last_dim().max(1);
    let mut out = Vec::with_capacity(a.elem_count());
    for (arow, grow) in a.data().chunks(width).zip(grad.data().chunks(width)) {
        let dot: f64 = arow.iter().zip(grow).map(|(av, g)| av * g).sum();
        out.extend(arow.iter().zip(grow).map(|(av, g)| av * (g - dot)));
    }
    Tensor::new(out, a.shape().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let z = Tensor::from_slice(&[1.0, 2.0, 3.0, -1.0, 0.0, 1.0], (2, 3)).unwrap();
        let a = Activation::Softmax.forward(&z).unwrap();
        for row in a.data().chunks(3) {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tanh_backward_matches_finite_difference() {
        let z = Tensor::from_slice(&[0.3, -0.7], (1, 2)).unwrap();
        let a = Activation::Tanh.forward(&z).unwrap();
        let g = Tensor::ones((1, 2));
        let dz = Activation::Tanh.backward(&z, &a, &g).unwrap();
        let eps = 1e-6;
        for (i, &zv) in z.data().iter().enumerate() {
            let numeric = ((zv + eps).tanh() - (zv - eps).tanh()) / (2.0 * eps);
            assert!((numeric - dz.data()[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn test_relu_backward_uses_preactivation() {
        let z = Tensor::from_slice(&[-1.0, 2.0], (1, 2)).unwrap();
        let a = Activation::Relu.forward(&z).unwrap();
        let dz = Activation::Relu
            .backward(&z, &a, &Tensor::full((1, 2), 5.0))
            .unwrap();
        assert_eq!(dz.to_vec(), vec![0.0, 5.0]);
    }
}
