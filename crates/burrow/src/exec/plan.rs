// ExecPlan — executable layout of a validated graph
//
// Vertices are stored in execution order, so a node index is also its
// position in the schedule. Each node knows where its inputs come from
// (a graph input or a slot of an earlier node), its parameter view and
// whether it is reachable from the graph inputs at all.
//
// LIFETIMES:
//   A structural vertex's activations are only needed until the last node
//   that reads them has run. `free_points[pos]` lists the nodes whose
//   activations can be dropped right after position `pos` executes. Layer
//   activations and graph outputs are never freed.

use burrow_core::input_type::InputType;

use crate::params::ParamView;
use crate::vertex::Vertex;

/// Where a node input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Input(usize),
    Vertex { node: usize, slot: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub name: String,
    pub vertex: Vertex,
    pub inputs: Vec<Source>,
    pub view: ParamView,
    /// Reachable from the graph inputs; unreachable nodes never execute.
    pub active: bool,
    /// Statically inferred output types, when input types were declared.
    pub output_types: Option<Vec<InputType>>,
}

/// Position of the last node that reads each node's activations (its own
/// position when nothing reads it).
pub(crate) fn last_uses(nodes: &[Node]) -> Vec<usize> {
    let mut last: Vec<usize> = (0..nodes.len()).collect();
    for (pos, node) in nodes.iter().enumerate().filter(|(_, n)| n.active) {
        for src in &node.inputs {
            if let Source::Vertex { node: producer, .. } = *src {
                last[producer] = last[producer].max(pos);
            }
        }
    }
    last
}

/// Nodes whose activations can be dropped after each position.
pub(crate) fn free_points(nodes: &[Node], outputs: &[usize]) -> Vec<Vec<usize>> {
    let mut frees = vec![Vec::new(); nodes.len()];
    for (id, last) in last_uses(nodes).into_iter().enumerate() {
        if nodes[id].vertex.is_layer() || outputs.contains(&id) {
            continue;
        }
        frees[last].push(id);
    }
    frees
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexConf;

    fn node(name: &str, conf: VertexConf, inputs: Vec<Source>) -> Node {
        Node {
            name: name.to_string(),
            vertex: conf.build().unwrap(),
            inputs,
            view: ParamView::default(),
            active: true,
            output_types: None,
        }
    }

    #[test]
    fn test_structural_values_freed_after_last_reader() {
        use burrow_nn::LayerConf;
        let nodes = vec![
            node("shift", VertexConf::Shift(1.0), vec![Source::Input(0)]),
            node(
                "dense",
                VertexConf::Layer(LayerConf::dense(2, 2)),
                vec![Source::Vertex { node: 0, slot: 0 }],
            ),
            node(
                "scale",
                VertexConf::Scale(2.0),
                vec![Source::Vertex { node: 0, slot: 0 }],
            ),
            node(
                "out",
                VertexConf::Merge,
                vec![
                    Source::Vertex { node: 1, slot: 0 },
                    Source::Vertex { node: 2, slot: 0 },
                ],
            ),
        ];
        assert_eq!(last_uses(&nodes), vec![2, 3, 3, 3]);

        let frees = free_points(&nodes, &[3]);
        assert_eq!(frees[2], vec![0]);
        assert_eq!(frees[3], vec![2]);
        // layer (1) and output (3) are never freed
        assert!(frees.iter().flatten().all(|&id| id != 1 && id != 3));
    }
}
