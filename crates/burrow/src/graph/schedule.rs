// Topological scheduling (Kahn's algorithm)
//
// Every graph input and vertex gets an index in declaration order (inputs
// first). Vertices whose producers have all been scheduled are "ready"; the
// ready vertex with the smallest declaration index is scheduled next, so the
// order is deterministic and, for a chain declared in order, identical to
// declaration order.
//
// If some vertices are never ready the graph has a cycle, reported through
// the first such vertex in declaration order.

use std::collections::{BTreeSet, HashMap};

use burrow_core::error::{Error, Result};

use super::descriptor::GraphDescriptor;

/// Order every input and vertex so producers come before consumers.
pub fn topological_sort(desc: &GraphDescriptor) -> Result<Vec<String>> {
    let names: Vec<&str> = desc.names().collect();
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let offset = desc.inputs().len();

    let mut in_degree = vec![0usize; names.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
    for (v, spec) in desc.vertices().iter().enumerate() {
        let dest = offset + v;
        for r in &spec.inputs {
            let src = *index
                .get(r.vertex.as_str())
                .ok_or_else(|| Error::UnknownVertex {
                    name: r.vertex.clone(),
                    referenced_by: spec.name.clone(),
                })?;
            in_degree[dest] += 1;
            consumers[src].push(dest);
        }
    }

    let mut ready: BTreeSet<usize> = (0..names.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(names.len());
    while let Some(i) = ready.pop_first() {
        order.push(names[i].to_string());
        for &c in &consumers[i] {
            in_degree[c] -= 1;
            if in_degree[c] == 0 {
                ready.insert(c);
            }
        }
    }

    if order.len() < names.len() {
        let stuck = (0..names.len())
            .find(|&i| in_degree[i] > 0)
            .map(|i| names[i].to_string())
            .unwrap_or_default();
        return Err(Error::CyclicGraph { vertex: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{ElementWiseOp, VertexConf};

    #[test]
    fn test_chain_keeps_declaration_order() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", VertexConf::Shift(1.0), ["in"])
            .add_vertex("b", VertexConf::Shift(1.0), ["a"])
            .add_vertex("c", VertexConf::Shift(1.0), ["b"])
            .set_outputs(["c"])
            .build();
        assert_eq!(topological_sort(&desc).unwrap(), vec!["in", "a", "b", "c"]);
    }

    #[test]
    fn test_out_of_order_declaration() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("late", VertexConf::Scale(2.0), ["early"])
            .add_vertex("early", VertexConf::Shift(1.0), ["in"])
            .set_outputs(["late"])
            .build();
        assert_eq!(topological_sort(&desc).unwrap(), vec!["in", "early", "late"]);
    }

    #[test]
    fn test_ready_ties_break_on_declaration_index() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["x", "y"])
            .add_vertex("from_y", VertexConf::Shift(1.0), ["y"])
            .add_vertex("from_x", VertexConf::Shift(1.0), ["x"])
            .add_vertex(
                "sum",
                VertexConf::ElementWise(ElementWiseOp::Add),
                ["from_x", "from_y"],
            )
            .set_outputs(["sum"])
            .build();
        assert_eq!(
            topological_sort(&desc).unwrap(),
            vec!["x", "y", "from_y", "from_x", "sum"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", VertexConf::ElementWise(ElementWiseOp::Add), ["in", "b"])
            .add_vertex("b", VertexConf::Shift(1.0), ["a"])
            .set_outputs(["b"])
            .build();
        let err = topological_sort(&desc).unwrap_err();
        assert!(matches!(err, Error::CyclicGraph { ref vertex } if vertex == "a"));
    }

    #[test]
    fn test_unknown_reference() {
        let desc = GraphDescriptor::builder()
            .add_inputs(["in"])
            .add_vertex("a", VertexConf::Shift(1.0), ["nope"])
            .set_outputs(["a"])
            .build();
        assert!(matches!(
            topological_sort(&desc),
            Err(Error::UnknownVertex { .. })
        ));
    }
}
