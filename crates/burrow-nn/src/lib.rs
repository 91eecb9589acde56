//! # burrow-nn
//!
//! Trainable compute units for burrow graphs.
//!
//! Every unit implements [`ComputeUnit`]: it reads its parameters from a
//! slice of the graph's flat parameter buffer, writes parameter gradients into
//! the matching slice of the flat gradient buffer, and returns per-call state
//! as a [`UnitCache`] instead of keeping it in fields.
//!
//! 1. **ComputeUnit** — forward / backward / shape / parameter layout
//! 2. **Dense** — `a = f(xW + b)`
//! 3. **Output** — Dense plus a [`LossFunction`]
//! 4. **SimpleRnn** — Elman recurrent unit with masking and full BPTT
//! 5. **LayerConf** — declarative unit configuration used by graph descriptors

pub mod activation;
pub mod conf;
pub mod dense;
pub mod init;
pub mod loss;
pub mod output;
pub mod rnn;
pub mod unit;

pub use activation::Activation;
pub use conf::LayerConf;
pub use dense::Dense;
pub use init::WeightInit;
pub use loss::LossFunction;
pub use output::Output;
pub use rnn::SimpleRnn;
pub use unit::{ComputeUnit, ParamSpec, UnitCache};
