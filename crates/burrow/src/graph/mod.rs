//! Graph descriptors and the passes that run on them before execution:
//! validation (with automatic merge insertion), topological scheduling and
//! descriptor surgery.

pub mod descriptor;
pub mod edit;
pub mod schedule;
pub mod validate;

pub use descriptor::{Edge, GraphBuilder, GraphDescriptor, InputRef, VertexSpec};
pub use edit::GraphEdit;
pub use schedule::topological_sort;
pub use validate::validate;
