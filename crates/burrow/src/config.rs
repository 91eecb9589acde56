// GraphConfig — build and execution policy for one graph
//
// Carried inside the GraphDescriptor so a descriptor fully determines the
// graph it builds (including parameter initialization, via the seed).

/// Build/execution policy for a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Accept vertices that are unreachable from any input or whose output is
    /// never consumed. Such vertices are never executed when unreachable.
    pub allow_disconnected: bool,
    /// Insert a Merge vertex in front of single-input vertices wired to
    /// several inputs, instead of failing with `UnsupportedMultiInput`.
    pub auto_merge: bool,
    /// Keep activations of structural vertices after their last consumer has
    /// read them. Layer activations are always kept.
    pub retain_activations: bool,
    /// Seed for parameter initialization.
    pub seed: u64,
    /// Run static shape inference when input types are declared.
    pub validate_shapes: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            allow_disconnected: false,
            auto_merge: true,
            retain_activations: false,
            seed: 12345,
            validate_shapes: true,
        }
    }
}

impl GraphConfig {
    pub fn with_allow_disconnected(mut self, allow: bool) -> Self {
        self.allow_disconnected = allow;
        self
    }

    pub fn with_auto_merge(mut self, auto_merge: bool) -> Self {
        self.auto_merge = auto_merge;
        self
    }

    pub fn with_retain_activations(mut self, retain: bool) -> Self {
        self.retain_activations = retain;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_validate_shapes(mut self, validate: bool) -> Self {
        self.validate_shapes = validate;
        self
    }
}
