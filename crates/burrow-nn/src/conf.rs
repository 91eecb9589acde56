// LayerConf — declarative description of a compute unit
//
// Graph descriptors hold configurations, not live units. The graph builder
// resolves `n_in` (0 means "infer from the declared input type"), then calls
// `build()` to get a boxed unit.
//
//   LayerConf::dense(4, 5).activation(Activation::Relu)
//   LayerConf::output(5, 3, LossFunction::McXent)
//   LayerConf::simple_rnn(0, 8)            // n_in inferred

use burrow_core::bail;
use burrow_core::error::Result;

use crate::activation::Activation;
use crate::dense::Dense;
use crate::init::WeightInit;
use crate::loss::LossFunction;
use crate::output::Output;
use crate::rnn::SimpleRnn;
use crate::unit::ComputeUnit;

/// Configuration of one compute unit.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerConf {
    Dense {
        n_in: usize,
        n_out: usize,
        activation: Activation,
        weight_init: WeightInit,
    },
    Output {
        n_in: usize,
        n_out: usize,
        activation: Activation,
        loss: LossFunction,
        weight_init: WeightInit,
    },
    SimpleRnn {
        n_in: usize,
        n_out: usize,
        activation: Activation,
        weight_init: WeightInit,
    },
}

impl LayerConf {
    /// Dense unit with identity activation and Xavier init.
    pub fn dense(n_in: usize, n_out: usize) -> Self {
        LayerConf::Dense {
            n_in,
            n_out,
            activation: Activation::Identity,
            weight_init: WeightInit::default(),
        }
    }

    /// Output unit; softmax for cross entropy, identity otherwise.
    pub fn output(n_in: usize, n_out: usize, loss: LossFunction) -> Self {
        let activation = match loss {
            LossFunction::McXent => Activation::Softmax,
            LossFunction::Mse => Activation::Identity,
        };
        LayerConf::Output {
            n_in,
            n_out,
            activation,
            loss,
            weight_init: WeightInit::default(),
        }
    }

    /// Simple recurrent unit with tanh activation.
    pub fn simple_rnn(n_in: usize, n_out: usize) -> Self {
        LayerConf::SimpleRnn {
            n_in,
            n_out,
            activation: Activation::Tanh,
            weight_init: WeightInit::default(),
        }
    }

    /// Replace the activation.
    pub fn activation(mut self, act: Activation) -> Self {
        match &mut self {
            LayerConf::Dense { activation, .. }
            | LayerConf::Output { activation, .. }
            | LayerConf::SimpleRnn { activation, .. } => *activation = act,
        }
        self
    }

    /// Replace the weight initialization.
    pub fn weight_init(mut self, init: WeightInit) -> Self {
        match &mut self {
            LayerConf::Dense { weight_init, .. }
            | LayerConf::Output { weight_init, .. }
            | LayerConf::SimpleRnn { weight_init, .. } => *weight_init = init,
        }
        self
    }

    pub fn n_in(&self) -> usize {
        match self {
            LayerConf::Dense { n_in, .. }
            | LayerConf::Output { n_in, .. }
            | LayerConf::SimpleRnn { n_in, .. } => *n_in,
        }
    }

    pub fn n_out(&self) -> usize {
        match self {
            LayerConf::Dense { n_out, .. }
            | LayerConf::Output { n_out, .. }
            | LayerConf::SimpleRnn { n_out, .. } => *n_out,
        }
    }

    /// Copy with `n_in` set (used for input-width inference).
    pub fn with_n_in(&self, width: usize) -> Self {
        let mut conf = self.clone();
        match &mut conf {
            LayerConf::Dense { n_in, .. }
            | LayerConf::Output { n_in, .. }
            | LayerConf::SimpleRnn { n_in, .. } => *n_in = width,
        }
        conf
    }

    pub fn is_recurrent(&self) -> bool {
        matches!(self, LayerConf::SimpleRnn { .. })
    }

    /// Instantiate the unit. Fails if `n_in` has not been resolved.
    pub fn build(&self) -> Result<Box<dyn ComputeUnit>> {
        if self.n_in() == 0 || self.n_out() == 0 {
            bail!(
                "layer has n_in={} n_out={}; set n_in explicitly or declare graph input types",
                self.n_in(),
                self.n_out()
            );
        }
        Ok(match *self {
            LayerConf::Dense {
                n_in,
                n_out,
                activation,
                weight_init,
            } => Box::new(Dense::new(n_in, n_out, activation, weight_init)),
            LayerConf::Output {
                n_in,
                n_out,
                activation,
                loss,
                weight_init,
            } => Box::new(Output::new(n_in, n_out, activation, loss, weight_init)),
            LayerConf::SimpleRnn {
                n_in,
                n_out,
                activation,
                weight_init,
            } => Box::new(SimpleRnn::new(n_in, n_out, activation, weight_init)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_n_in() {
        assert!(LayerConf::dense(0, 3).build().is_err());
        let unit = LayerConf::dense(0, 3).with_n_in(4).build().unwrap();
        assert_eq!(unit.param_count(), 4 * 3 + 3);
    }

    #[test]
    fn test_output_defaults_to_softmax_for_xent() {
        match LayerConf::output(2, 2, LossFunction::McXent) {
            LayerConf::Output { activation, .. } => assert_eq!(activation, Activation::Softmax),
            other => panic!("unexpected conf {other:?}"),
        }
    }
}
