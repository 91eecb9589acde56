// Graph — executable computation graph
//
// Built from a GraphDescriptor: the descriptor is validated (merge vertices
// inserted where needed), scheduled, its vertices instantiated in execution
// order with input widths inferred from declared input types, and one flat
// parameter buffer is laid out across all layer-like vertices.
//
// FORWARD:
//   Masks are propagated first, in execution order. Then every reachable
//   vertex runs once, reading its producers' activations. Per-call state is
//   recorded on a tape for the matching backward pass; activations of
//   structural vertices are dropped after their last reader unless
//   retention is requested.
//
// BACKWARD:
//   Consumes the tape. Errors for the graph outputs seed the walk in reverse
//   execution order; gradients arriving at the same output slot from several
//   consumers are summed before the producer runs. Parameter gradients land
//   in the flat gradient buffer, which is zeroed at the start of every
//   backward pass.
//
//   let mut graph = Graph::build(descriptor)?;
//   let (score, grads) = graph.compute_gradient_and_score(&[x], &[y])?;
//   let dw = grads.get("dense/W");

use std::collections::HashMap;

use burrow_core::bail;
use burrow_core::error::{Error, Result};
use burrow_core::input_type::InputType;
use burrow_core::shape::Shape;
use burrow_core::tensor::Tensor;
use burrow_nn::LossFunction;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::plan::{self, Node, Source};
use crate::config::GraphConfig;
use crate::graph::{validate, GraphDescriptor, GraphEdit, InputRef, VertexSpec};
use crate::params::{GradientTable, ParamView, ParamViewManager, ViewTable};
use crate::vertex::{Vertex, VertexCache};

/// Values kept from the last forward pass for inspection.
#[derive(Debug, Clone, Default)]
struct Activations {
    inputs: Vec<Tensor>,
    input_masks: Vec<Option<Tensor>>,
    values: Vec<Option<Vec<Tensor>>>,
    masks: Vec<Vec<Option<Tensor>>>,
}

/// State one forward pass leaves for the matching backward pass.
#[derive(Debug, Clone)]
struct Tape {
    caches: Vec<Option<VertexCache>>,
    output_shapes: Vec<Vec<Shape>>,
    input_shapes: Vec<Shape>,
}

/// An executable graph. Cloning produces an independent replica with
/// identical parameters.
#[derive(Debug, Clone)]
pub struct Graph {
    descriptor: GraphDescriptor,
    order: Vec<String>,
    input_names: Vec<String>,
    input_types: Option<Vec<InputType>>,
    nodes: Vec<Node>,
    outputs: Vec<usize>,
    free_points: Vec<Vec<usize>>,
    params: ParamViewManager,
    activations: Activations,
    tape: Option<Tape>,
    input_grads: Vec<Option<Tensor>>,
}

/// Attach the vertex name to messages that lack it.
fn in_vertex(name: &str, err: Error) -> Error {
    match err {
        Error::Msg(m) => Error::msg(format!("vertex '{name}': {m}")),
        other => other,
    }
}

fn accumulate(slot: &mut Option<Tensor>, grad: Tensor) -> Result<()> {
    *slot = Some(match slot.take() {
        Some(acc) => acc.add(&grad)?,
        None => grad,
    });
    Ok(())
}

impl Graph {
    /// Validate, schedule and instantiate a descriptor.
    pub fn build(descriptor: GraphDescriptor) -> Result<Graph> {
        let desc = validate(&descriptor)?;
        let order = desc.topological_order()?.to_vec();
        let config = desc.config().clone();

        let input_index: HashMap<&str, usize> = desc
            .inputs()
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut node_index: HashMap<String, usize> = HashMap::new();
        let mut types: HashMap<String, Vec<InputType>> = HashMap::new();
        if let Some(input_types) = desc.input_types() {
            for (name, ty) in desc.inputs().iter().zip(input_types) {
                types.insert(name.clone(), vec![ty.clone()]);
            }
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(desc.vertices().len());
        for name in &order {
            let Some(spec) = desc.vertex(name) else {
                continue;
            };
            let inputs = spec
                .inputs
                .iter()
                .map(|r| match input_index.get(r.vertex.as_str()) {
                    Some(&i) => Ok(Source::Input(i)),
                    None => node_index
                        .get(&r.vertex)
                        .map(|&node| Source::Vertex { node, slot: r.slot })
                        .ok_or_else(|| Error::UnknownVertex {
                            name: r.vertex.clone(),
                            referenced_by: spec.name.clone(),
                        }),
                })
                .collect::<Result<Vec<_>>>()?;
            let active = !inputs.is_empty()
                && inputs.iter().all(|s| match *s {
                    Source::Input(_) => true,
                    Source::Vertex { node, .. } => nodes[node].active,
                });

            let in_types = spec
                .inputs
                .iter()
                .map(|r| types.get(&r.vertex).and_then(|t| t.get(r.slot)).cloned())
                .collect::<Option<Vec<_>>>()
                .filter(|t| !t.is_empty());
            let vertex = spec
                .conf
                .resolve(in_types.as_deref())
                .build()
                .map_err(|e| in_vertex(name, e))?;

            let output_types = match &in_types {
                Some(in_types) if config.validate_shapes => {
                    check_input_types(spec, &vertex, in_types)?;
                    Some(vertex.output_types(in_types).map_err(|e| in_vertex(name, e))?)
                }
                Some(in_types) => vertex.output_types(in_types).ok(),
                None => None,
            };
            if let Some(out) = &output_types {
                types.insert(name.clone(), out.clone());
            }
            if !active {
                log::warn!("vertex '{name}' is unreachable from the graph inputs and will not run");
            }

            node_index.insert(name.clone(), nodes.len());
            nodes.push(Node {
                name: name.clone(),
                vertex,
                inputs,
                view: ParamView::default(),
                active,
                output_types,
            });
        }

        let (mut params, views) = ParamViewManager::allocate(
            nodes
                .iter()
                .filter(|n| n.vertex.param_count() > 0)
                .map(|n| (n.name.as_str(), n.vertex.param_specs())),
        );
        let mut rng = StdRng::seed_from_u64(config.seed);
        let trainable = nodes.iter_mut().filter(|n| n.vertex.param_count() > 0);
        for (node, view) in trainable.zip(views) {
            node.view = view;
            node.vertex
                .init_params(params.view_params_mut(view), &mut rng)
                .map_err(|e| in_vertex(&node.name, e))?;
        }

        let outputs = desc
            .outputs()
            .iter()
            .map(|o| {
                node_index.get(o).copied().ok_or_else(|| Error::UnknownVertex {
                    name: o.clone(),
                    referenced_by: "graph outputs".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let free_points = plan::free_points(&nodes, &outputs);

        log::debug!(
            "built graph: {} inputs, {} vertices, {} parameters, order {:?}",
            desc.inputs().len(),
            nodes.len(),
            params.num_params(),
            order
        );

        Ok(Graph {
            input_names: desc.inputs().to_vec(),
            input_types: desc.input_types().map(<[_]>::to_vec),
            descriptor,
            order,
            nodes,
            outputs,
            free_points,
            params,
            activations: Activations::default(),
            tape: None,
            input_grads: Vec::new(),
        })
    }

    // Accessors

    /// The descriptor this graph was built from (before merge insertion).
    pub fn descriptor(&self) -> &GraphDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &GraphConfig {
        self.descriptor.config()
    }

    /// Graph inputs and vertices in execution order.
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .map(|&o| self.nodes[o].name.as_str())
            .collect()
    }

    fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn node_position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn vertex(&self, name: &str) -> Option<&Vertex> {
        self.node(name).map(|n| &n.vertex)
    }

    /// Names of the vertices actually built (including inserted merges).
    pub fn vertex_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Statically inferred output types of a vertex.
    pub fn output_types(&self, name: &str) -> Option<&[InputType]> {
        self.node(name).and_then(|n| n.output_types.as_deref())
    }

    pub fn num_params(&self) -> usize {
        self.params.num_params()
    }

    /// The flat parameter buffer.
    pub fn params(&self) -> &[f64] {
        self.params.params()
    }

    /// The flat parameter buffer, for in-place updates.
    pub fn params_mut(&mut self) -> &mut [f64] {
        self.params.params_mut()
    }

    pub fn set_params(&mut self, values: &[f64]) -> Result<()> {
        self.params.set_params(values)
    }

    /// The flat gradient buffer from the last backward pass.
    pub fn gradients(&self) -> &[f64] {
        self.params.gradients()
    }

    pub fn param_table(&self) -> ViewTable<'_> {
        self.params.param_table()
    }

    pub fn gradient_table(&self) -> GradientTable<'_> {
        self.params.gradient_table()
    }

    /// View of a vertex inside the flat buffers.
    pub fn param_view(&self, name: &str) -> Option<ParamView> {
        self.node(name).map(|n| n.view)
    }

    /// Activation of `name` (slot 0) from the last forward pass, if kept.
    pub fn activation(&self, name: &str) -> Option<&Tensor> {
        self.activation_slot(name, 0)
    }

    pub fn activation_slot(&self, name: &str, slot: usize) -> Option<&Tensor> {
        if let Some(i) = self.input_names.iter().position(|n| n == name) {
            return self.activations.inputs.get(i).filter(|_| slot == 0);
        }
        let pos = self.node_position(name)?;
        self.activations
            .values
            .get(pos)?
            .as_ref()
            .and_then(|v| v.get(slot))
    }

    /// Output mask of `name` (slot 0) from the last forward pass.
    pub fn mask(&self, name: &str) -> Option<&Tensor> {
        if let Some(i) = self.input_names.iter().position(|n| n == name) {
            return self.activations.input_masks.get(i)?.as_ref();
        }
        let pos = self.node_position(name)?;
        self.activations.masks.get(pos)?.first()?.as_ref()
    }

    /// Gradients with respect to each graph input from the last backward
    /// pass (`None` when no gradient reached the input).
    pub fn input_gradients(&self) -> &[Option<Tensor>] {
        &self.input_grads
    }

    // Forward

    /// Run every vertex and return the graph outputs in declared order.
    pub fn forward(&mut self, inputs: &[Tensor], training: bool) -> Result<Vec<Tensor>> {
        self.run_forward(inputs, &[], training, self.config().retain_activations)
    }

    /// Forward with one optional mask per graph input.
    pub fn forward_with_masks(
        &mut self,
        inputs: &[Tensor],
        masks: &[Option<Tensor>],
        training: bool,
    ) -> Result<Vec<Tensor>> {
        self.run_forward(inputs, masks, training, self.config().retain_activations)
    }

    /// Forward keeping every activation; returns them by name. Outputs of
    /// slot `k > 0` are keyed "name:k".
    pub fn feed_forward(
        &mut self,
        inputs: &[Tensor],
        training: bool,
    ) -> Result<HashMap<String, Tensor>> {
        self.run_forward(inputs, &[], training, true)?;
        let mut all: HashMap<String, Tensor> = self
            .input_names
            .iter()
            .cloned()
            .zip(self.activations.inputs.iter().cloned())
            .collect();
        for (node, values) in self.nodes.iter().zip(&self.activations.values) {
            let Some(values) = values else { continue };
            for (slot, value) in values.iter().enumerate() {
                let key = InputRef::new(node.name.clone(), slot).to_string();
                all.insert(key, value.clone());
            }
        }
        Ok(all)
    }

    fn check_inputs(&self, inputs: &[Tensor], masks: &[Option<Tensor>]) -> Result<()> {
        let n = self.input_names.len();
        if inputs.len() != n {
            return Err(Error::ArityMismatch {
                vertex: "graph inputs".to_string(),
                expected: n.to_string(),
                got: inputs.len(),
            });
        }
        if !masks.is_empty() && masks.len() != n {
            return Err(Error::ArityMismatch {
                vertex: "graph input masks".to_string(),
                expected: n.to_string(),
                got: masks.len(),
            });
        }
        for (i, x) in inputs.iter().enumerate() {
            if x.rank() == 0 || x.dim(0)? == 0 {
                return Err(Error::EmptyBatch);
            }
            if let Some(types) = &self.input_types {
                if self.config().validate_shapes && !types[i].matches_shape(x.shape()) {
                    return Err(Error::InputShapeMismatch {
                        input: self.input_names[i].clone(),
                        expected: types[i].clone(),
                        got: x.shape().clone(),
                    });
                }
            }
            if let Some(Some(m)) = masks.get(i) {
                if m.rank() != 2 || m.dim(0)? != x.dim(0)? {
                    bail!(
                        "mask of shape {} does not fit input '{}' of shape {}",
                        m.shape(),
                        self.input_names[i],
                        x.shape()
                    );
                }
            }
        }
        Ok(())
    }

    /// Output masks of every node, in execution order.
    fn propagate_masks(&self, input_masks: &[Option<Tensor>]) -> Result<Vec<Vec<Option<Tensor>>>> {
        let mut masks: Vec<Vec<Option<Tensor>>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !node.active {
                masks.push(Vec::new());
                continue;
            }
            let in_masks: Vec<Option<Tensor>> = node
                .inputs
                .iter()
                .map(|s| match *s {
                    Source::Input(i) => input_masks[i].clone(),
                    Source::Vertex { node, slot } => masks[node].get(slot).cloned().flatten(),
                })
                .collect();
            let out = node
                .vertex
                .feed_forward_masks(&in_masks)
                .map_err(|e| in_vertex(&node.name, e))?;
            masks.push(out);
        }
        Ok(masks)
    }

    fn source_name(&self, source: Source) -> &str {
        match source {
            Source::Input(i) => &self.input_names[i],
            Source::Vertex { node, .. } => &self.nodes[node].name,
        }
    }

    /// Layer-like vertices reject activations of the wrong width before
    /// running, naming both ends of the edge.
    fn check_activation(&self, node: &Node, xs: &[Tensor]) -> Result<()> {
        let (Some(expected), Some(x)) = (node.vertex.expected_input(), xs.first()) else {
            return Ok(());
        };
        if expected.matches_shape(x.shape()) {
            return Ok(());
        }
        let got = InputType::from_shape(x.shape()).map_err(|e| in_vertex(&node.name, e))?;
        Err(Error::VertexShapeMismatch {
            producer: self.source_name(node.inputs[0]).to_string(),
            consumer: node.name.clone(),
            expected,
            got,
        })
    }

    fn run_forward(
        &mut self,
        inputs: &[Tensor],
        masks: &[Option<Tensor>],
        training: bool,
        retain_all: bool,
    ) -> Result<Vec<Tensor>> {
        self.tape = None;
        self.check_inputs(inputs, masks)?;
        let input_masks: Vec<Option<Tensor>> = if masks.is_empty() {
            vec![None; inputs.len()]
        } else {
            masks.to_vec()
        };
        let node_masks = self.propagate_masks(&input_masks)?;

        let n = self.nodes.len();
        let mut values: Vec<Option<Vec<Tensor>>> = vec![None; n];
        let mut caches: Vec<Option<VertexCache>> = vec![None; n];
        let mut output_shapes: Vec<Vec<Shape>> = vec![Vec::new(); n];

        for (pos, node) in self.nodes.iter().enumerate() {
            if !node.active {
                continue;
            }
            let xs = node
                .inputs
                .iter()
                .map(|s| match *s {
                    Source::Input(i) => Ok(inputs[i].clone()),
                    Source::Vertex { node: p, slot } => values[p]
                        .as_ref()
                        .and_then(|v| v.get(slot))
                        .cloned()
                        .ok_or_else(|| {
                            Error::msg(format!(
                                "value of '{}' slot {slot} is not available to '{}'",
                                self.nodes[p].name, node.name
                            ))
                        }),
                })
                .collect::<Result<Vec<_>>>()?;
            let in_masks: Vec<Option<Tensor>> = node
                .inputs
                .iter()
                .map(|s| match *s {
                    Source::Input(i) => input_masks[i].clone(),
                    Source::Vertex { node: p, slot } => node_masks[p].get(slot).cloned().flatten(),
                })
                .collect();

            node.vertex.ensure_arity(&node.name, xs.len())?;
            self.check_activation(node, &xs)?;
            let (ys, cache) = node
                .vertex
                .forward(&xs, &in_masks, self.params.view_params(node.view), training)
                .map_err(|e| in_vertex(&node.name, e))?;
            if ys.len() != node.vertex.num_outputs() {
                bail!(
                    "vertex '{}' produced {} outputs, expected {}",
                    node.name,
                    ys.len(),
                    node.vertex.num_outputs()
                );
            }
            log::trace!(
                "forward '{}' ({}): {:?}",
                node.name,
                node.vertex.kind(),
                ys.iter().map(|y| y.shape().to_string()).collect::<Vec<_>>()
            );

            output_shapes[pos] = ys.iter().map(|y| y.shape().clone()).collect();
            values[pos] = Some(ys);
            caches[pos] = Some(cache);
            if !retain_all {
                for &dead in &self.free_points[pos] {
                    values[dead] = None;
                }
            }
        }

        let outputs = self
            .outputs
            .iter()
            .map(|&o| {
                values[o]
                    .as_ref()
                    .and_then(|v| v.first())
                    .cloned()
                    .ok_or_else(|| Error::MissingInput {
                        name: self.nodes[o].name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.activations = Activations {
            inputs: inputs.to_vec(),
            input_masks,
            values,
            masks: node_masks,
        };
        self.tape = Some(Tape {
            caches,
            output_shapes,
            input_shapes: inputs.iter().map(|x| x.shape().clone()).collect(),
        });
        Ok(outputs)
    }

    // Backward

    /// Back-propagate one error per graph output (same shapes as the
    /// outputs). Consumes the last forward pass.
    pub fn backward(&mut self, errors: &[Tensor]) -> Result<GradientTable<'_>> {
        let tape = self.tape.take().ok_or(Error::BackwardBeforeForward)?;
        if errors.len() != self.outputs.len() {
            return Err(Error::ArityMismatch {
                vertex: "graph outputs".to_string(),
                expected: self.outputs.len().to_string(),
                got: errors.len(),
            });
        }
        self.params.zero_gradients();

        let mut pending: Vec<Vec<Option<Tensor>>> = self
            .nodes
            .iter()
            .map(|n| vec![None; n.vertex.num_outputs()])
            .collect();
        for (&o, err) in self.outputs.iter().zip(errors) {
            let expected = &tape.output_shapes[o][0];
            if err.shape() != expected {
                return Err(Error::ShapeMismatch {
                    expected: expected.clone(),
                    got: err.shape().clone(),
                });
            }
            accumulate(&mut pending[o][0], err.clone())?;
        }

        let mut input_grads: Vec<Option<Tensor>> = vec![None; self.input_names.len()];
        let mut visited = 0usize;
        for pos in (0..self.nodes.len()).rev() {
            let node = &self.nodes[pos];
            if !node.active {
                continue;
            }
            let slots = std::mem::take(&mut pending[pos]);
            if slots.iter().all(Option::is_none) {
                log::trace!("no gradient reaches '{}'", node.name);
                continue;
            }
            let grad_outputs: Vec<Tensor> = slots
                .into_iter()
                .zip(&tape.output_shapes[pos])
                .map(|(g, shape)| g.unwrap_or_else(|| Tensor::zeros(shape.clone())))
                .collect();
            let cache = tape.caches[pos].as_ref().ok_or_else(|| {
                Error::msg(format!("no forward state recorded for '{}'", node.name))
            })?;

            let (params, grads) = self.params.view_pair(node.view);
            let dx = node
                .vertex
                .backward(cache, &grad_outputs, params, grads)
                .map_err(|e| in_vertex(&node.name, e))?;
            if dx.len() != node.inputs.len() {
                bail!(
                    "vertex '{}' returned {} input gradients for {} inputs",
                    node.name,
                    dx.len(),
                    node.inputs.len()
                );
            }
            for (src, g) in node.inputs.iter().zip(dx) {
                match *src {
                    Source::Input(i) => accumulate(&mut input_grads[i], g)?,
                    Source::Vertex { node: p, slot } => accumulate(&mut pending[p][slot], g)?,
                }
            }
            visited += 1;
        }

        for (i, g) in input_grads.iter().enumerate() {
            if let Some(g) = g {
                debug_assert_eq!(g.shape(), &tape.input_shapes[i]);
            }
        }
        log::debug!(
            "backward: {visited} vertices, {} parameter gradients",
            self.params.num_params()
        );
        self.input_grads = input_grads;
        Ok(self.params.gradient_table())
    }

    // Loss

    fn loss_functions(&self) -> Result<Vec<LossFunction>> {
        self.outputs
            .iter()
            .map(|&o| {
                let node = &self.nodes[o];
                node.vertex.loss_function().ok_or_else(|| Error::NoOutputLayer {
                    vertex: node.name.clone(),
                })
            })
            .collect()
    }

    fn check_labels(&self, labels: &[Tensor]) -> Result<()> {
        if let Some(&missing) = self.outputs.get(labels.len()) {
            return Err(Error::MissingInput {
                name: self.nodes[missing].name.clone(),
            });
        }
        if labels.len() > self.outputs.len() {
            return Err(Error::ArityMismatch {
                vertex: "graph labels".to_string(),
                expected: self.outputs.len().to_string(),
                got: labels.len(),
            });
        }
        Ok(())
    }

    /// Summed loss over all outputs for a non-training forward pass.
    pub fn score(&mut self, inputs: &[Tensor], labels: &[Tensor]) -> Result<f64> {
        let losses = self.loss_functions()?;
        self.check_labels(labels)?;
        let outputs = self.forward(inputs, false)?;
        let mut score = 0.0;
        for ((loss, out), y) in losses.iter().zip(&outputs).zip(labels) {
            score += loss.score(out, y)?;
        }
        Ok(score)
    }

    /// Training forward pass, loss, and backward pass in one call.
    pub fn compute_gradient_and_score(
        &mut self,
        inputs: &[Tensor],
        labels: &[Tensor],
    ) -> Result<(f64, GradientTable<'_>)> {
        let losses = self.loss_functions()?;
        self.check_labels(labels)?;
        let outputs = self.forward(inputs, true)?;
        let mut score = 0.0;
        let mut errors = Vec::with_capacity(outputs.len());
        for ((loss, out), y) in losses.iter().zip(&outputs).zip(labels) {
            score += loss.score(out, y)?;
            errors.push(loss.gradient(out, y)?);
        }
        log::debug!("score {score:.6}");
        let grads = self.backward(&errors)?;
        Ok((score, grads))
    }

    // Surgery

    /// Build a new graph from this one's descriptor with `edits` applied.
    /// Vertices that keep their name and parameter layout keep their
    /// parameter values; everything else is freshly initialized.
    pub fn edit(&self, edits: &[GraphEdit]) -> Result<Graph> {
        let desc = self.descriptor.apply_edits(edits)?;
        let mut graph = Graph::build(desc)?;
        let mut carried = Vec::new();
        for node in graph.nodes.iter().filter(|n| n.vertex.param_count() > 0) {
            match self.node(&node.name) {
                Some(old) if old.vertex.param_specs() == node.vertex.param_specs() => {
                    carried.push((old.view, node.view));
                }
                Some(_) => log::warn!(
                    "vertex '{}' changed its parameter layout; parameters re-initialized",
                    node.name
                ),
                None => {}
            }
        }
        log::debug!(
            "applied {} edits; carried parameters of {} vertices",
            edits.len(),
            carried.len()
        );
        for (old, new) in carried {
            graph
                .params
                .view_params_mut(new)
                .copy_from_slice(self.params.view_params(old));
        }
        Ok(graph)
    }
}

/// Producer and consumer types must agree before a graph is built.
fn check_input_types(spec: &VertexSpec, vertex: &Vertex, types: &[InputType]) -> Result<()> {
    let mismatch = |i: usize, expected: InputType| Error::VertexShapeMismatch {
        producer: spec.inputs[i].vertex.clone(),
        consumer: spec.name.clone(),
        expected,
        got: types[i].clone(),
    };
    let Some(first) = types.first() else {
        return Ok(());
    };
    if let Some(expected) = vertex.expected_input() {
        if !expected.compatible_with(first) {
            return Err(mismatch(0, expected));
        }
    }
    match vertex {
        Vertex::ElementWise(_) | Vertex::Stack(_) => {
            if let Some(i) = (1..types.len()).find(|&i| !types[i].compatible_with(first)) {
                return Err(mismatch(i, first.clone()));
            }
        }
        Vertex::Merge(_) => {
            if let Some(i) =
                (1..types.len()).find(|&i| types[i].is_recurrent() != first.is_recurrent())
            {
                return Err(mismatch(i, first.with_size(types[i].size())));
            }
        }
        _ => {}
    }
    Ok(())
}
