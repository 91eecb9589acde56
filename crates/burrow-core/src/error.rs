use crate::input_type::InputType;
use crate::shape::Shape;

/// All errors that can occur within burrow.
///
/// One enum covers the tensor layer and the graph engine: shape problems
/// inside a single operation, structural problems found while validating a
/// graph descriptor, and contract violations while executing it. Using a
/// single error type across the workspace keeps `?` propagation trivial.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape mismatch between two tensors (e.g. adding [2,3] to [4,5]).
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// Dimension index out of range for the tensor's rank.
    #[error("dimension out of range: dim {dim} for tensor with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Narrow/slice operation out of bounds.
    #[error("narrow out of bounds: dim {dim}, start {start}, len {len}, dim_size {dim_size}")]
    NarrowOutOfBounds {
        dim: usize,
        start: usize,
        len: usize,
        dim_size: usize,
    },

    /// Element count mismatch when creating a tensor from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Matrix multiplication dimension mismatch.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}], inner dims must match")]
    MatmulShapeMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    /// Cannot reshape because element counts differ.
    #[error(
        "cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements"
    )]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// A vertex is (transitively) its own input.
    #[error("graph contains a cycle through vertex '{vertex}'")]
    CyclicGraph { vertex: String },

    /// A vertex cannot be reached from any graph input, or its output is
    /// never consumed and it is not a graph output.
    #[error("vertex '{vertex}' is disconnected from the graph (set allow_disconnected to permit)")]
    DisconnectedVertex { vertex: String },

    /// A single-input vertex is wired to several inputs and automatic merge
    /// insertion is disabled.
    #[error("vertex '{vertex}' accepts a single input but is wired to {inputs} inputs")]
    UnsupportedMultiInput { vertex: String, inputs: usize },

    /// The descriptor declares no outputs.
    #[error("graph declares no outputs")]
    NoDeclaredOutputs,

    /// A declared output is not backed by a unit with a loss function.
    #[error("output vertex '{vertex}' is not an output layer (no loss function)")]
    NoOutputLayer { vertex: String },

    /// An edge or output refers to a name that is neither a vertex nor an input.
    #[error("unknown vertex '{name}' referenced by '{referenced_by}'")]
    UnknownVertex { name: String, referenced_by: String },

    /// Two vertices (or a vertex and an input) share a name.
    #[error("duplicate vertex name '{name}'")]
    DuplicateVertex { name: String },

    /// Producer output type does not fit what the consumer expects.
    #[error("shape mismatch between '{producer}' and '{consumer}': expected {expected}, got {got}")]
    VertexShapeMismatch {
        producer: String,
        consumer: String,
        expected: InputType,
        got: InputType,
    },

    /// A graph input tensor does not match its declared input type.
    #[error("graph input '{input}' expects {expected}, got tensor of shape {got}")]
    InputShapeMismatch {
        input: String,
        expected: InputType,
        got: Shape,
    },

    /// A vertex was handed the wrong number of tensors.
    #[error("vertex '{vertex}' expects {expected} tensors, got {got}")]
    ArityMismatch {
        vertex: String,
        expected: String,
        got: usize,
    },

    /// Backward invoked without a matching forward pass.
    #[error("backward called before forward (or twice for the same forward pass)")]
    BackwardBeforeForward,

    /// A minibatch with zero examples was supplied.
    #[error("zero-size minibatch")]
    EmptyBatch,

    /// A required graph input or label was not supplied.
    #[error("missing value for '{name}'")]
    MissingInput { name: String },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout burrow.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
