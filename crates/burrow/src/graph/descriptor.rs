// GraphDescriptor — declarative, immutable description of a graph
//
// A descriptor lists graph input names, vertices in declaration order (each
// with its configuration and ordered input references), graph outputs and
// the build policy. It holds no tensors and no parameters; `Graph::build`
// turns it into something executable.
//
//   let desc = GraphDescriptor::builder()
//       .add_inputs(["in"])
//       .set_input_types([InputType::feed_forward(4)])
//       .add_layer("dense", LayerConf::dense(4, 5), ["in"])
//       .add_layer("out", LayerConf::output(5, 3, LossFunction::Mse), ["dense"])
//       .set_outputs(["out"])
//       .build();
//
// INPUT REFERENCES:
//   "name" reads slot 0 of vertex (or graph input) `name`; "name:k" reads
//   slot k of a multi-output vertex.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use burrow_core::error::Result;
use burrow_core::input_type::InputType;
use burrow_nn::LayerConf;

use super::schedule;
use crate::config::GraphConfig;
use crate::vertex::VertexConf;

/// Reference to one output slot of a vertex or graph input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub vertex: String,
    pub slot: usize,
}

impl InputRef {
    pub fn new(vertex: impl Into<String>, slot: usize) -> Self {
        InputRef {
            vertex: vertex.into(),
            slot,
        }
    }

    /// Parse "name" or "name:slot". A suffix that is not a number is part
    /// of the name.
    pub fn parse(s: &str) -> Self {
        if let Some((name, slot)) = s.rsplit_once(':') {
            if let Ok(slot) = slot.parse() {
                return InputRef::new(name, slot);
            }
        }
        InputRef::new(s, 0)
    }
}

impl From<&str> for InputRef {
    fn from(s: &str) -> Self {
        InputRef::parse(s)
    }
}

impl From<String> for InputRef {
    fn from(s: String) -> Self {
        InputRef::parse(&s)
    }
}

impl From<&String> for InputRef {
    fn from(s: &String) -> Self {
        InputRef::parse(s)
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slot == 0 {
            write!(f, "{}", self.vertex)
        } else {
            write!(f, "{}:{}", self.vertex, self.slot)
        }
    }
}

/// One declared vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSpec {
    pub name: String,
    pub conf: VertexConf,
    pub inputs: Vec<InputRef>,
}

/// A directed edge `source:source_slot -> dest[dest_slot]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub source_slot: usize,
    pub dest: String,
    /// Position in the destination's input list.
    pub dest_slot: usize,
}

/// Immutable graph description. Cheap to clone; the topological order is
/// computed once and cached.
#[derive(Debug, Clone)]
pub struct GraphDescriptor {
    pub(crate) inputs: Vec<String>,
    pub(crate) input_types: Option<Vec<InputType>>,
    pub(crate) vertices: Vec<VertexSpec>,
    pub(crate) outputs: Vec<String>,
    pub(crate) config: GraphConfig,
    order: OnceLock<Vec<String>>,
}

impl PartialEq for GraphDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.inputs == other.inputs
            && self.input_types == other.input_types
            && self.vertices == other.vertices
            && self.outputs == other.outputs
            && self.config == other.config
    }
}

impl GraphDescriptor {
    pub fn new(
        inputs: Vec<String>,
        input_types: Option<Vec<InputType>>,
        vertices: Vec<VertexSpec>,
        outputs: Vec<String>,
        config: GraphConfig,
    ) -> Self {
        GraphDescriptor {
            inputs,
            input_types,
            vertices,
            outputs,
            config,
            order: OnceLock::new(),
        }
    }

    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn input_types(&self) -> Option<&[InputType]> {
        self.input_types.as_deref()
    }

    /// Vertices in declaration order.
    pub fn vertices(&self) -> &[VertexSpec] {
        &self.vertices
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn vertex(&self, name: &str) -> Option<&VertexSpec> {
        self.vertices.iter().find(|v| v.name == name)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_input(name) || self.vertex(name).is_some()
    }

    /// Graph inputs followed by vertices, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .map(String::as_str)
            .chain(self.vertices.iter().map(|v| v.name.as_str()))
    }

    /// Every edge, grouped by destination in declaration order.
    pub fn edges(&self) -> Vec<Edge> {
        self.vertices
            .iter()
            .flat_map(|v| {
                v.inputs.iter().enumerate().map(move |(dest_slot, r)| Edge {
                    source: r.vertex.clone(),
                    source_slot: r.slot,
                    dest: v.name.clone(),
                    dest_slot,
                })
            })
            .collect()
    }

    /// Names of the vertices that read `name`, without duplicates, in
    /// declaration order.
    pub fn consumers(&self, name: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.vertices
            .iter()
            .filter(|v| v.inputs.iter().any(|r| r.vertex == name))
            .map(|v| v.name.as_str())
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Topological order over inputs and vertices, computed on first use.
    pub fn topological_order(&self) -> Result<&[String]> {
        if let Some(order) = self.order.get() {
            return Ok(order);
        }
        let order = schedule::topological_sort(self)?;
        Ok(self.order.get_or_init(|| order))
    }
}

/// Fluent construction of a [`GraphDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    inputs: Vec<String>,
    input_types: Option<Vec<InputType>>,
    vertices: Vec<VertexSpec>,
    outputs: Vec<String>,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn add_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare the type of every graph input (enables width inference and
    /// static shape checks).
    pub fn set_input_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = InputType>,
    {
        self.input_types = Some(types.into_iter().collect());
        self
    }

    pub fn add_vertex<I, R>(mut self, name: impl Into<String>, conf: VertexConf, inputs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<InputRef>,
    {
        self.vertices.push(VertexSpec {
            name: name.into(),
            conf,
            inputs: inputs.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn add_layer<I, R>(self, name: impl Into<String>, layer: LayerConf, inputs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<InputRef>,
    {
        self.add_vertex(name, VertexConf::Layer(layer), inputs)
    }

    pub fn set_outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    pub fn allow_disconnected(mut self, allow: bool) -> Self {
        self.config.allow_disconnected = allow;
        self
    }

    pub fn auto_merge(mut self, auto_merge: bool) -> Self {
        self.config.auto_merge = auto_merge;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Finish without validating; `Graph::build` validates.
    pub fn build(self) -> GraphDescriptor {
        GraphDescriptor::new(
            self.inputs,
            self.input_types,
            self.vertices,
            self.outputs,
            self.config,
        )
    }
}
