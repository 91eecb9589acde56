// Graph tests — building, validation and scheduling through the public API

use burrow::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scale(s: f64) -> VertexConf {
    VertexConf::Scale(s)
}

// Scheduling

#[test]
fn test_diamond_order_follows_declaration() {
    init_logging();
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("right", scale(2.0), ["in"])
        .add_vertex("left", scale(3.0), ["in"])
        .add_vertex("join", VertexConf::ElementWise(ElementWiseOp::Add), ["left", "right"])
        .set_outputs(["join"])
        .build();
    let graph = Graph::build(desc).unwrap();
    assert_eq!(graph.execution_order(), &["in", "right", "left", "join"]);
    assert_eq!(graph.output_names(), vec!["join"]);
}

#[test]
fn test_vertices_declared_before_their_inputs() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("out", scale(1.0), ["mid"])
        .add_vertex("mid", scale(1.0), ["in"])
        .set_outputs(["out"])
        .build();
    let graph = Graph::build(desc).unwrap();
    assert_eq!(graph.execution_order(), &["in", "mid", "out"]);
}

#[test]
fn test_schedule_is_deterministic() {
    let make = || {
        GraphDescriptor::builder()
            .add_inputs(["x", "y"])
            .add_vertex("from_y", scale(1.0), ["y"])
            .add_vertex("from_x", scale(1.0), ["x"])
            .add_vertex("sum", VertexConf::ElementWise(ElementWiseOp::Add), ["from_x", "from_y"])
            .set_outputs(["sum"])
            .build()
    };
    let a = topological_order(make());
    let b = topological_order(make());
    assert_eq!(a, b);
    assert_eq!(a, vec!["x", "y", "from_y", "from_x", "sum"]);
}

fn topological_order(desc: GraphDescriptor) -> Vec<String> {
    burrow::graph::topological_sort(&desc).unwrap()
}

// Validation failures

#[test]
fn test_cycle_rejected() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("a", VertexConf::ElementWise(ElementWiseOp::Add), ["in", "c"])
        .add_vertex("b", scale(1.0), ["a"])
        .add_vertex("c", scale(1.0), ["b"])
        .set_outputs(["b"])
        .build();
    assert!(matches!(Graph::build(desc), Err(Error::CyclicGraph { .. })));
}

#[test]
fn test_disconnected_vertex_rejected_by_default() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("used", scale(1.0), ["in"])
        .add_vertex("dangling", scale(1.0), ["in"])
        .set_outputs(["used"])
        .build();
    match Graph::build(desc) {
        Err(Error::DisconnectedVertex { vertex }) => assert_eq!(vertex, "dangling"),
        other => panic!("expected DisconnectedVertex, got {other:?}"),
    }
}

#[test]
fn test_multi_input_layer_without_auto_merge() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["a", "b"])
        .add_layer("dense", LayerConf::dense(4, 2), ["a", "b"])
        .set_outputs(["dense"])
        .auto_merge(false)
        .build();
    match Graph::build(desc) {
        Err(Error::UnsupportedMultiInput { vertex, inputs }) => {
            assert_eq!(vertex, "dense");
            assert_eq!(inputs, 2);
        }
        other => panic!("expected UnsupportedMultiInput, got {other:?}"),
    }
}

#[test]
fn test_subtract_needs_two_inputs() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["a", "b", "c"])
        .add_vertex("diff", VertexConf::ElementWise(ElementWiseOp::Subtract), ["a", "b", "c"])
        .set_outputs(["diff"])
        .build();
    assert!(matches!(
        Graph::build(desc),
        Err(Error::ArityMismatch { got: 3, .. })
    ));
}

#[test]
fn test_unknown_and_duplicate_names() {
    let unknown = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("a", scale(1.0), ["nowhere"])
        .set_outputs(["a"])
        .build();
    match Graph::build(unknown) {
        Err(Error::UnknownVertex { name, referenced_by }) => {
            assert_eq!(name, "nowhere");
            assert_eq!(referenced_by, "a");
        }
        other => panic!("expected UnknownVertex, got {other:?}"),
    }

    let duplicate = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("a", scale(1.0), ["in"])
        .add_vertex("a", scale(2.0), ["in"])
        .set_outputs(["a"])
        .build();
    assert!(matches!(
        Graph::build(duplicate),
        Err(Error::DuplicateVertex { .. })
    ));

    let no_outputs = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("a", scale(1.0), ["in"])
        .build();
    assert!(matches!(
        Graph::build(no_outputs),
        Err(Error::NoDeclaredOutputs)
    ));
}

#[test]
fn test_shape_mismatch_names_both_vertices() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .set_input_types([InputType::feed_forward(4)])
        .add_layer("a", LayerConf::dense(4, 5), ["in"])
        .add_layer("b", LayerConf::dense(6, 2), ["a"])
        .set_outputs(["b"])
        .build();
    match Graph::build(desc) {
        Err(Error::VertexShapeMismatch {
            producer,
            consumer,
            expected,
            got,
        }) => {
            assert_eq!(producer, "a");
            assert_eq!(consumer, "b");
            assert_eq!(expected, InputType::feed_forward(6));
            assert_eq!(got, InputType::feed_forward(5));
        }
        other => panic!("expected VertexShapeMismatch, got {other:?}"),
    }
}

#[test]
fn test_shape_checks_can_be_disabled() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .set_input_types([InputType::feed_forward(4)])
        .add_layer("a", LayerConf::dense(4, 5), ["in"])
        .add_layer("b", LayerConf::dense(6, 2), ["a"])
        .set_outputs(["b"])
        .config(GraphConfig::default().with_validate_shapes(false))
        .build();
    let mut graph = Graph::build(desc).unwrap();
    // the mismatch surfaces at run time instead
    assert!(matches!(
        graph.forward(&[Tensor::ones((1, 4))], false),
        Err(Error::VertexShapeMismatch { .. })
    ));
}

#[test]
fn test_width_mismatch_without_input_types_names_both_vertices() {
    init_logging();
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_layer("hidden", LayerConf::dense(4, 5), ["in"])
        .add_layer("out", LayerConf::output(3, 2, LossFunction::Mse), ["hidden"])
        .set_outputs(["out"])
        .build();
    let mut graph = Graph::build(desc).unwrap();
    match graph.forward(&[Tensor::ones((2, 4))], false) {
        Err(Error::VertexShapeMismatch {
            producer,
            consumer,
            expected,
            got,
        }) => {
            assert_eq!(producer, "hidden");
            assert_eq!(consumer, "out");
            assert_eq!(expected, InputType::feed_forward(3));
            assert_eq!(got, InputType::feed_forward(5));
        }
        other => panic!("expected VertexShapeMismatch, got {other:?}"),
    }

    // a graph input of the wrong width names the input
    match graph.forward(&[Tensor::ones((2, 6))], false) {
        Err(Error::VertexShapeMismatch {
            producer, consumer, ..
        }) => {
            assert_eq!(producer, "in");
            assert_eq!(consumer, "hidden");
        }
        other => panic!("expected VertexShapeMismatch, got {other:?}"),
    }
}

#[test]
fn test_recurrent_into_dense_rejected() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .set_input_types([InputType::recurrent(3)])
        .add_layer("dense", LayerConf::dense(3, 2), ["in"])
        .set_outputs(["dense"])
        .build();
    assert!(matches!(
        Graph::build(desc),
        Err(Error::VertexShapeMismatch { .. })
    ));
}

// Inference

#[test]
fn test_widths_inferred_through_structural_vertices() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["a", "b"])
        .set_input_types([InputType::recurrent(3), InputType::recurrent(2)])
        .add_vertex("merge", VertexConf::Merge, ["a", "b"])
        .add_vertex("sub", VertexConf::Subset { from: 1, to: 3 }, ["merge"])
        .add_layer("rnn", LayerConf::simple_rnn(0, 4), ["sub"])
        .set_outputs(["rnn"])
        .build();
    let graph = Graph::build(desc).unwrap();
    assert_eq!(graph.output_types("merge").unwrap(), &[InputType::recurrent(5)]);
    assert_eq!(graph.output_types("sub").unwrap(), &[InputType::recurrent(3)]);
    assert_eq!(graph.output_types("rnn").unwrap(), &[InputType::recurrent(4)]);
    assert_eq!(graph.param_view("rnn").unwrap().len(), 3 * 4 + 4 * 4 + 4);
}

#[test]
fn test_merge_insertion_leaves_descriptor_unchanged() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["a", "b"])
        .set_input_types([InputType::feed_forward(1), InputType::feed_forward(1)])
        .add_layer("dense", LayerConf::dense(0, 1), ["a", "b"])
        .set_outputs(["dense"])
        .build();
    let graph = Graph::build(desc.clone()).unwrap();
    assert_eq!(graph.descriptor(), &desc);
    assert!(graph.vertex("dense-merge").is_some());
    assert_eq!(desc.vertices().len(), 1);
}

#[test]
fn test_merge_name_avoids_collisions() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["a", "b"])
        .add_vertex("dense-merge", scale(1.0), ["a"])
        .add_layer("dense", LayerConf::dense(2, 1), ["dense-merge", "b"])
        .set_outputs(["dense"])
        .build();
    let graph = Graph::build(desc).unwrap();
    assert_eq!(graph.vertex_names(), vec!["dense-merge", "dense-merge-1", "dense"]);
}

// Descriptor queries

#[test]
fn test_edges_and_consumers() {
    let desc = GraphDescriptor::builder()
        .add_inputs(["in"])
        .add_vertex("split", VertexConf::Split { sizes: vec![1, 1] }, ["in"])
        .add_vertex("l", scale(1.0), ["split:0"])
        .add_vertex("r", scale(1.0), ["split:1"])
        .add_vertex("out", VertexConf::Merge, ["l", "r"])
        .set_outputs(["out"])
        .build();
    let mut consumers = desc.consumers("split");
    consumers.sort_unstable();
    assert_eq!(consumers, vec!["l", "r"]);

    let edges = desc.edges();
    assert_eq!(edges.len(), 5);
    assert!(edges
        .iter()
        .any(|e| e.source == "split" && e.source_slot == 1 && e.dest == "r" && e.dest_slot == 0));
    assert!(edges
        .iter()
        .any(|e| e.source == "r" && e.dest == "out" && e.dest_slot == 1));
}

#[test]
fn test_input_ref_parsing() {
    assert_eq!(InputRef::parse("split:2"), InputRef::new("split", 2));
    assert_eq!(InputRef::parse("plain"), InputRef::new("plain", 0));
    assert_eq!(InputRef::parse("odd:name").vertex, "odd:name");
    assert_eq!(InputRef::new("split", 1).to_string(), "split:1");
    assert_eq!(InputRef::new("plain", 0).to_string(), "plain");
}
