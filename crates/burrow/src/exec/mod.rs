//! Graph execution: building an executable [`Graph`] from a descriptor and
//! running forward and backward passes over it.

pub mod engine;
mod plan;

pub use engine::Graph;
