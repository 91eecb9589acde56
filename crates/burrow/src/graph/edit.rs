// Graph surgery on descriptors
//
// Edits are applied in order to a copy of the descriptor; the original is
// never modified. The result is not validated here: `Graph::edit` rebuilds
// (and so validates) the edited descriptor and carries parameters over.

use burrow_core::error::{Error, Result};

use super::descriptor::{GraphDescriptor, InputRef, VertexSpec};
use crate::vertex::VertexConf;

/// One structural change to a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEdit {
    /// Append a vertex.
    AddVertex {
        name: String,
        conf: VertexConf,
        inputs: Vec<InputRef>,
    },
    /// Remove a vertex and drop it from the graph outputs. Edges from it
    /// must be rewired by later edits.
    RemoveVertex(String),
    /// Swap a vertex's configuration, keeping its name and inputs.
    ReplaceVertex { name: String, conf: VertexConf },
    /// Rewire a vertex's inputs.
    SetInputs { name: String, inputs: Vec<InputRef> },
    /// Replace the graph outputs.
    SetOutputs(Vec<String>),
}

impl GraphEdit {
    pub fn add_vertex<I, R>(name: impl Into<String>, conf: VertexConf, inputs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<InputRef>,
    {
        GraphEdit::AddVertex {
            name: name.into(),
            conf,
            inputs: inputs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn set_inputs<I, R>(name: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<InputRef>,
    {
        GraphEdit::SetInputs {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
        }
    }
}

fn position(vertices: &[VertexSpec], name: &str) -> Result<usize> {
    vertices
        .iter()
        .position(|v| v.name == name)
        .ok_or_else(|| Error::UnknownVertex {
            name: name.to_string(),
            referenced_by: "graph edit".to_string(),
        })
}

impl GraphDescriptor {
    /// New descriptor with `edits` applied in order.
    pub fn apply_edits(&self, edits: &[GraphEdit]) -> Result<GraphDescriptor> {
        let mut vertices = self.vertices.clone();
        let mut outputs = self.outputs.clone();
        for edit in edits {
            match edit {
                GraphEdit::AddVertex { name, conf, inputs } => {
                    if self.is_input(name) || vertices.iter().any(|v| &v.name == name) {
                        return Err(Error::DuplicateVertex { name: name.clone() });
                    }
                    vertices.push(VertexSpec {
                        name: name.clone(),
                        conf: conf.clone(),
                        inputs: inputs.clone(),
                    });
                }
                GraphEdit::RemoveVertex(name) => {
                    let at = position(&vertices, name)?;
                    vertices.remove(at);
                    outputs.retain(|o| o != name);
                }
                GraphEdit::ReplaceVertex { name, conf } => {
                    let at = position(&vertices, name)?;
                    vertices[at].conf = conf.clone();
                }
                GraphEdit::SetInputs { name, inputs } => {
                    let at = position(&vertices, name)?;
                    vertices[at].inputs = inputs.clone();
                }
                GraphEdit::SetOutputs(names) => outputs = names.clone(),
            }
        }
        Ok(GraphDescriptor::new(
            self.inputs.clone(),
            self.input_types.clone(),
            vertices,
            outputs,
            self.config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> GraphDescriptor {
        GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", VertexConf::Shift(1.0), ["in"])
            .add_vertex("b", VertexConf::Scale(2.0), ["a"])
            .set_outputs(["b"])
            .build()
    }

    #[test]
    fn test_edits_apply_in_order() {
        let desc = base();
        let edited = desc
            .apply_edits(&[
                GraphEdit::add_vertex("c", VertexConf::Scale(3.0), ["a"]),
                GraphEdit::RemoveVertex("b".into()),
                GraphEdit::SetOutputs(vec!["c".into()]),
            ])
            .unwrap();
        let names: Vec<_> = edited.vertices().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(edited.outputs(), &["c"]);
        // source descriptor is untouched
        assert_eq!(desc.vertices().len(), 2);
        assert_eq!(desc.outputs(), &["b"]);
    }

    #[test]
    fn test_replace_and_rewire() {
        let edited = base()
            .apply_edits(&[
                GraphEdit::ReplaceVertex {
                    name: "a".into(),
                    conf: VertexConf::Scale(5.0),
                },
                GraphEdit::set_inputs("b", ["in"]),
            ])
            .unwrap();
        assert_eq!(edited.vertex("a").unwrap().conf, VertexConf::Scale(5.0));
        assert_eq!(edited.vertex("b").unwrap().inputs, vec![InputRef::new("in", 0)]);
    }

    #[test]
    fn test_bad_edits() {
        assert!(base()
            .apply_edits(&[GraphEdit::RemoveVertex("zzz".into())])
            .is_err());
        assert!(base()
            .apply_edits(&[GraphEdit::add_vertex("a", VertexConf::Shift(0.0), ["in"])])
            .is_err());
    }
}
