//! # Burrow
//!
//! Scheduling and forward/backward execution of computation graphs made of
//! trainable units and structural vertices.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use burrow::prelude::*;
//!
//! let desc = GraphDescriptor::builder()
//!     .add_inputs(["in"])
//!     .set_input_types([InputType::feed_forward(4)])
//!     .add_layer("hidden", LayerConf::dense(0, 5), ["in"])
//!     .add_layer("out", LayerConf::output(5, 3, LossFunction::Mse), ["hidden"])
//!     .set_outputs(["out"])
//!     .build();
//! let mut graph = Graph::build(desc).unwrap();
//! let x = Tensor::ones((2, 4));
//! let y = Tensor::zeros((2, 3));
//! let (score, grads) = graph.compute_gradient_and_score(&[x], &[y]).unwrap();
//! assert!(score >= 0.0);
//! assert_eq!(grads.get("hidden/W").unwrap().len(), 4 * 5);
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `burrow-core` | Tensor, Shape, InputType, Error |
//! | `burrow-nn` | Compute units (Dense, Output, SimpleRnn), activations, losses, init |
//! | `burrow` | Graph descriptors, validation, scheduling, vertices, execution |
//!
//! ## Modules
//!
//! - [`graph`] — descriptors, builder, validation, topological order, surgery
//! - [`vertex`] — element-wise, structural, layer and wrapper vertices
//! - [`params`] — flat parameter/gradient buffers with per-vertex views
//! - [`mask`] — mask combination rules
//! - [`exec`] — the executable [`Graph`](exec::Graph)

/// Re-export core types.
pub use burrow_core::{Error, InputType, Result, Shape, Tensor};

/// Re-export compute units.
pub mod nn {
    pub use burrow_nn::*;
}

/// Graph build and execution policy.
pub mod config;

/// Graph descriptors and pre-execution passes.
pub mod graph;

/// Mask combination rules.
pub mod mask;

/// Flat parameter and gradient buffers.
pub mod params;

/// Vertex kinds.
pub mod vertex;

/// Graph execution.
pub mod exec;

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::config::GraphConfig;
    pub use crate::exec::Graph;
    pub use crate::graph::{GraphBuilder, GraphDescriptor, GraphEdit, InputRef};
    pub use crate::nn::{Activation, ComputeUnit, LayerConf, LossFunction, WeightInit};
    pub use crate::params::{GradientTable, ParamView, ParamViewManager};
    pub use crate::vertex::{BidirectionalMode, ElementWiseOp, TimeStep, Vertex, VertexConf};
    pub use crate::{Error, InputType, Result, Shape, Tensor};
}
