// Graph validation
//
// Runs before a graph is built, in this order:
//
//   1. references   outputs declared, names unique, every input reference
//                   and output names something that exists, slots in range
//   2. cycles       depth-first colouring over producer edges
//   3. connectivity every vertex reachable from a graph input, every input
//                   and vertex consumed or declared as an output
//                   (skipped when `allow_disconnected` is set)
//   4. arity        single-input vertices wired to several inputs get a
//                   Merge vertex "<name>-merge" inserted in front of them
//                   (or fail when `auto_merge` is off); fixed-arity vertices
//                   must match exactly
//
// Validation is pure: it returns a new descriptor (possibly with inserted
// merge vertices) and never touches the one it was given.

use std::collections::{HashMap, HashSet, VecDeque};

use burrow_core::bail;
use burrow_core::error::{Error, Result};

use super::descriptor::{GraphDescriptor, InputRef, VertexSpec};
use crate::vertex::VertexConf;

/// Check `desc` and return the repaired descriptor to build from.
pub fn validate(desc: &GraphDescriptor) -> Result<GraphDescriptor> {
    check_references(desc)?;
    if let Some(vertex) = find_cycle(desc) {
        return Err(Error::CyclicGraph { vertex });
    }
    if !desc.config().allow_disconnected {
        check_connected(desc)?;
    }
    let vertices = repair_arity(desc)?;
    Ok(GraphDescriptor::new(
        desc.inputs().to_vec(),
        desc.input_types().map(<[_]>::to_vec),
        vertices,
        desc.outputs().to_vec(),
        desc.config().clone(),
    ))
}

fn check_references(desc: &GraphDescriptor) -> Result<()> {
    if desc.outputs().is_empty() {
        return Err(Error::NoDeclaredOutputs);
    }
    let mut seen = HashSet::new();
    for name in desc.names() {
        if !seen.insert(name) {
            return Err(Error::DuplicateVertex {
                name: name.to_string(),
            });
        }
    }
    if let Some(types) = desc.input_types() {
        if types.len() != desc.inputs().len() {
            bail!("{} input types declared for {} graph inputs", types.len(), desc.inputs().len());
        }
    }
    for spec in desc.vertices() {
        for r in &spec.inputs {
            check_slot(desc, r, &spec.name)?;
        }
    }
    for out in desc.outputs() {
        if desc.is_input(out) {
            bail!("graph output '{out}' must be a vertex, not a graph input");
        }
        if desc.vertex(out).is_none() {
            return Err(Error::UnknownVertex {
                name: out.clone(),
                referenced_by: "graph outputs".to_string(),
            });
        }
    }
    Ok(())
}

fn check_slot(desc: &GraphDescriptor, r: &InputRef, referenced_by: &str) -> Result<()> {
    let slots = if desc.is_input(&r.vertex) {
        1
    } else if let Some(source) = desc.vertex(&r.vertex) {
        source.conf.num_outputs()
    } else {
        return Err(Error::UnknownVertex {
            name: r.vertex.clone(),
            referenced_by: referenced_by.to_string(),
        });
    };
    if r.slot >= slots {
        bail!(
            "'{referenced_by}' reads slot {} of '{}', which has {slots} output(s)",
            r.slot, r.vertex
        );
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// First vertex found on a cycle, if any.
fn find_cycle(desc: &GraphDescriptor) -> Option<String> {
    fn visit<'a>(
        desc: &'a GraphDescriptor,
        name: &'a str,
        colour: &mut HashMap<&'a str, Colour>,
    ) -> Option<String> {
        colour.insert(name, Colour::Grey);
        if let Some(spec) = desc.vertex(name) {
            for r in &spec.inputs {
                match colour.get(r.vertex.as_str()).copied().unwrap_or(Colour::White) {
                    Colour::Grey => return Some(r.vertex.clone()),
                    Colour::White => {
                        if let Some(found) = visit(desc, &r.vertex, colour) {
                            return Some(found);
                        }
                    }
                    Colour::Black => {}
                }
            }
        }
        colour.insert(name, Colour::Black);
        None
    }

    let mut colour = HashMap::new();
    for spec in desc.vertices() {
        if colour.get(spec.name.as_str()).is_none() {
            if let Some(found) = visit(desc, &spec.name, &mut colour) {
                return Some(found);
            }
        }
    }
    None
}

fn check_connected(desc: &GraphDescriptor) -> Result<()> {
    let mut reachable: HashSet<&str> = desc.inputs().iter().map(String::as_str).collect();
    let mut queue: VecDeque<&str> = reachable.iter().copied().collect();
    while let Some(name) = queue.pop_front() {
        for consumer in desc.consumers(name) {
            if reachable.insert(consumer) {
                queue.push_back(consumer);
            }
        }
    }

    for spec in desc.vertices() {
        if !reachable.contains(spec.name.as_str()) {
            return Err(Error::DisconnectedVertex {
                vertex: spec.name.clone(),
            });
        }
    }
    let outputs: HashSet<&str> = desc.outputs().iter().map(String::as_str).collect();
    for name in desc.names() {
        if !outputs.contains(name) && desc.consumers(name).is_empty() {
            return Err(Error::DisconnectedVertex {
                vertex: name.to_string(),
            });
        }
    }
    Ok(())
}

fn unique_name(base: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    (1..)
        .map(|i| format!("{base}-{i}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

fn repair_arity(desc: &GraphDescriptor) -> Result<Vec<VertexSpec>> {
    let config = desc.config();
    let mut taken: HashSet<String> = desc.names().map(str::to_string).collect();
    let mut vertices = Vec::with_capacity(desc.vertices().len());

    for spec in desc.vertices() {
        let arity = spec.conf.arity();
        let n = spec.inputs.len();
        if n > 1 && !arity.is_multi_input() {
            if !config.auto_merge {
                return Err(Error::UnsupportedMultiInput {
                    vertex: spec.name.clone(),
                    inputs: n,
                });
            }
            let merge = unique_name(format!("{}-merge", spec.name), &taken);
            log::debug!(
                "inserting merge vertex '{merge}' in front of '{}' ({n} inputs)",
                spec.name
            );
            taken.insert(merge.clone());
            vertices.push(VertexSpec {
                name: merge.clone(),
                conf: VertexConf::Merge,
                inputs: spec.inputs.clone(),
            });
            vertices.push(VertexSpec {
                name: spec.name.clone(),
                conf: spec.conf.clone(),
                inputs: vec![InputRef::new(merge, 0)],
            });
            continue;
        }
        let isolated = n == 0 && config.allow_disconnected;
        if !isolated && !arity.accepts(n) {
            return Err(Error::ArityMismatch {
                vertex: spec.name.clone(),
                expected: arity.to_string(),
                got: n,
            });
        }
        vertices.push(spec.clone());
    }
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::vertex::ElementWiseOp;
    use burrow_nn::LayerConf;

    fn shift() -> VertexConf {
        VertexConf::Shift(0.0)
    }

    #[test]
    fn test_valid_graph_passes_unchanged() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", shift(), ["in"])
            .set_outputs(["a"])
            .build();
        assert_eq!(validate(&desc).unwrap(), desc);
    }

    #[test]
    fn test_no_outputs() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", shift(), ["in"])
            .build();
        assert!(matches!(validate(&desc), Err(Error::NoDeclaredOutputs)));
    }

    #[test]
    fn test_duplicate_names() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("in", shift(), ["in"])
            .set_outputs(["in"])
            .build();
        assert!(matches!(validate(&desc), Err(Error::DuplicateVertex { .. })));
    }

    #[test]
    fn test_unknown_output() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", shift(), ["in"])
            .set_outputs(["b"])
            .build();
        assert!(matches!(validate(&desc), Err(Error::UnknownVertex { .. })));
    }

    #[test]
    fn test_slot_out_of_range() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("split", VertexConf::Split { sizes: vec![1, 1] }, ["in"])
            .add_vertex("a", shift(), ["split:2"])
            .set_outputs(["a", "split"])
            .build();
        assert!(validate(&desc).is_err());
    }

    #[test]
    fn test_cycle() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", VertexConf::ElementWise(ElementWiseOp::Add), ["in", "c"])
            .add_vertex("b", shift(), ["a"])
            .add_vertex("c", shift(), ["b"])
            .set_outputs(["c"])
            .build();
        assert!(matches!(validate(&desc), Err(Error::CyclicGraph { .. })));
    }

    #[test]
    fn test_unconsumed_vertex_is_disconnected() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", shift(), ["in"])
            .add_vertex("dangling", shift(), ["in"])
            .set_outputs(["a"])
            .build();
        match validate(&desc) {
            Err(Error::DisconnectedVertex { vertex }) => assert_eq!(vertex, "dangling"),
            other => panic!("expected DisconnectedVertex, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_vertex_allowed_when_configured() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", shift(), ["in"])
            .add_vertex("island", shift(), Vec::<&str>::new())
            .set_outputs(["a"])
            .build();
        assert!(matches!(
            validate(&desc),
            Err(Error::DisconnectedVertex { .. })
        ));
        let relaxed = GraphDescriptor::new(
            desc.inputs().to_vec(),
            None,
            desc.vertices().to_vec(),
            desc.outputs().to_vec(),
            GraphConfig::default().with_allow_disconnected(true),
        );
        assert!(validate(&relaxed).is_ok());
    }

    #[test]
    fn test_merge_inserted_for_multi_input_layer() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["a", "b"])
            .add_layer("dense", LayerConf::dense(5, 2), ["a", "b"])
            .set_outputs(["dense"])
            .build();
        let fixed = validate(&desc).unwrap();
        let names: Vec<_> = fixed.vertices().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["dense-merge", "dense"]);
        assert_eq!(fixed.vertices()[0].conf, VertexConf::Merge);
        assert_eq!(fixed.vertices()[1].inputs, vec![InputRef::new("dense-merge", 0)]);
        // the caller's descriptor is untouched
        assert_eq!(desc.vertices().len(), 1);
    }

    #[test]
    fn test_merge_name_is_uniquified() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["a", "b"])
            .add_vertex("x-merge", shift(), ["a"])
            .add_vertex("x", shift(), ["x-merge", "b"])
            .set_outputs(["x"])
            .build();
        let fixed = validate(&desc).unwrap();
        assert!(fixed.vertex("x-merge-1").is_some());
    }

    #[test]
    fn test_multi_input_without_auto_merge() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["a", "b"])
            .add_vertex("s", shift(), ["a", "b"])
            .set_outputs(["s"])
            .auto_merge(false)
            .build();
        assert!(matches!(
            validate(&desc),
            Err(Error::UnsupportedMultiInput { inputs: 2, .. })
        ));
    }

    #[test]
    fn test_subtract_arity() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["a", "b", "c"])
            .add_vertex(
                "diff",
                VertexConf::ElementWise(ElementWiseOp::Subtract),
                ["a", "b", "c"],
            )
            .set_outputs(["diff"])
            .build();
        match validate(&desc) {
            Err(Error::ArityMismatch { vertex, got, .. }) => {
                assert_eq!(vertex, "diff");
                assert_eq!(got, 3);
            }
            other => panic!("expected ArityMismatch, got {other:?}"),
        }
    }
}
