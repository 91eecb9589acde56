// ParamViewManager — flat parameter and gradient buffers with per-vertex views
//
// All trainable values of a graph live in one contiguous `Vec<f64>`, and all
// gradients in a second buffer of the same length. Each layer-like vertex is
// assigned a `ParamView` (offset + length) into both buffers, in execution
// order, so an optimizer can update the whole graph with one pass over the
// flat buffers while each unit sees only its own slice.
//
// LAYOUT:
//
//   params:  [ dense/W ........ | dense/b .. | out/W ...... | out/b . ]
//   grads:   [ same offsets, same lengths                             ]
//            ^ view("dense")                ^ view("out")
//
// Keys are "<vertex name>/<param name>". The gradient table hands out
// borrowed slices of the gradient buffer, never copies.

use std::ops::Range;

use burrow_core::error::{Error, Result};
use burrow_core::shape::Shape;
use burrow_core::tensor::Tensor;
use burrow_nn::ParamSpec;

/// A contiguous range inside the flat parameter and gradient buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamView {
    offset: usize,
    len: usize,
}

impl ParamView {
    pub fn new(offset: usize, len: usize) -> Self {
        ParamView { offset, len }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// One named parameter inside the flat buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub key: String,
    pub shape: Shape,
    pub view: ParamView,
}

/// Owner of the flat parameter and gradient buffers.
#[derive(Debug, Clone, Default)]
pub struct ParamViewManager {
    params: Vec<f64>,
    grads: Vec<f64>,
    entries: Vec<ParamEntry>,
}

impl ParamViewManager {
    /// Lay out one view per request, back to back, in the given order.
    /// Returns the manager and the whole-vertex view of each request.
    pub fn allocate<'a, I>(requests: I) -> (Self, Vec<ParamView>)
    where
        I: IntoIterator<Item = (&'a str, Vec<ParamSpec>)>,
    {
        let mut entries = Vec::new();
        let mut views = Vec::new();
        let mut offset = 0;
        for (prefix, specs) in requests {
            let start = offset;
            for spec in specs {
                let view = ParamView::new(offset, spec.len());
                offset += spec.len();
                entries.push(ParamEntry {
                    key: format!("{prefix}/{}", spec.name),
                    shape: spec.shape,
                    view,
                });
            }
            views.push(ParamView::new(start, offset - start));
        }
        let manager = ParamViewManager {
            params: vec![0.0; offset],
            grads: vec![0.0; offset],
            entries,
        };
        (manager, views)
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Mutable flat parameters; writes are visible to every unit.
    pub fn params_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    pub fn gradients(&self) -> &[f64] {
        &self.grads
    }

    /// Overwrite all parameters. The length must match exactly.
    pub fn set_params(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(Error::ElementCountMismatch {
                shape: Shape::from(self.params.len()),
                expected: self.params.len(),
                got: values.len(),
            });
        }
        self.params.copy_from_slice(values);
        Ok(())
    }

    pub fn zero_gradients(&mut self) {
        self.grads.iter_mut().for_each(|g| *g = 0.0);
    }

    pub fn view_params(&self, view: ParamView) -> &[f64] {
        &self.params[view.range()]
    }

    pub fn view_params_mut(&mut self, view: ParamView) -> &mut [f64] {
        &mut self.params[view.range()]
    }

    /// Parameters and gradients of one view, borrowed together.
    pub fn view_pair(&mut self, view: ParamView) -> (&[f64], &mut [f64]) {
        (&self.params[view.range()], &mut self.grads[view.range()])
    }

    /// Parameter values keyed by "<vertex>/<param>".
    pub fn param_table(&self) -> ViewTable<'_> {
        ViewTable {
            entries: &self.entries,
            buffer: &self.params,
        }
    }

    /// Gradients keyed by "<vertex>/<param>".
    pub fn gradient_table(&self) -> GradientTable<'_> {
        ViewTable {
            entries: &self.entries,
            buffer: &self.grads,
        }
    }
}

/// Named, borrowed views into one flat buffer.
#[derive(Debug, Clone, Copy)]
pub struct ViewTable<'a> {
    entries: &'a [ParamEntry],
    buffer: &'a [f64],
}

/// Gradients of one backward pass.
pub type GradientTable<'a> = ViewTable<'a>;

impl<'a> ViewTable<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slice for `key`, borrowed from the flat buffer.
    pub fn get(&self, key: &str) -> Option<&'a [f64]> {
        let (entries, buffer) = (self.entries, self.buffer);
        entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &buffer[e.view.range()])
    }

    /// Copy of the values for `key`, shaped as declared by the unit.
    pub fn tensor(&self, key: &str) -> Result<Tensor> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| Error::MissingInput {
                name: key.to_string(),
            })?;
        Tensor::from_slice(&self.buffer[entry.view.range()], entry.shape.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + 'a {
        let entries = self.entries;
        entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [f64])> + 'a {
        let (entries, buffer) = (self.entries, self.buffer);
        entries
            .iter()
            .map(move |e| (e.key.as_str(), &buffer[e.view.range()]))
    }

    /// The whole flat buffer.
    pub fn flat(&self) -> &'a [f64] {
        self.buffer
    }
}
