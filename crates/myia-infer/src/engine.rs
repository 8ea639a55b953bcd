//! The shape-inference scheduler.
//!
//! Each query is an `async fn` call; recursion through nested queries is the
//! suspension point a cooperative scheduler would otherwise model with an
//! explicit waiter queue. This engine is single-threaded and driven to
//! completion with `futures::executor::block_on`, so the queue never needs
//! more than one pending computation at a time -- true concurrent inferrers
//! are out of scope, but the memoization and step-bounded termination the
//! spec asks for are both real.

use crate::error::InferenceError;
use crate::shape::{Dim, Shape};
use futures::future::{BoxFuture, FutureExt};
use myia_core::{ANFNodeData, ConstValue, GraphId, GraphManager, NodeId, Primitive};
use std::cell::RefCell;
use std::collections::HashMap;

/// Bounds on a single top-level inference call, mirroring an
/// `InterpreterConfig`-style knob.
#[derive(Debug, Clone, Copy)]
pub struct InferenceConfig {
    pub max_inference_steps: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig { max_inference_steps: 10_000 }
    }
}

/// Marks a graph whose shape call is on the current call stack, so a
/// self-recursive graph widens to `Shape::Anything` instead of looping
/// forever. `max_inference_steps` is the backstop for every other kind of
/// non-termination.
#[derive(Clone, Copy, PartialEq)]
enum GraphMemo {
    InProgress,
    Done(usize),
}

pub struct Engine<'a> {
    core: &'a GraphManager,
    config: InferenceConfig,
    steps: RefCell<usize>,
    node_memo: RefCell<HashMap<NodeId, Shape>>,
    graph_memo: RefCell<HashMap<GraphId, GraphMemo>>,
    graph_results: RefCell<Vec<Shape>>,
    params: RefCell<HashMap<NodeId, Shape>>,
}

impl<'a> Engine<'a> {
    pub fn new(core: &'a GraphManager, config: InferenceConfig) -> Self {
        Engine {
            core,
            config,
            steps: RefCell::new(0),
            node_memo: RefCell::new(HashMap::new()),
            graph_memo: RefCell::new(HashMap::new()),
            graph_results: RefCell::new(Vec::new()),
            params: RefCell::new(HashMap::new()),
        }
    }

    fn tick(&self) -> Result<(), InferenceError> {
        let mut steps = self.steps.borrow_mut();
        *steps += 1;
        if *steps > self.config.max_inference_steps {
            return Err(InferenceError::InferenceTimeout);
        }
        Ok(())
    }

    /// Runs [`Engine::infer_graph`] to completion on the current thread, for
    /// callers (e.g. the CLI) that don't want to pull in an executor of
    /// their own.
    pub fn infer_graph_blocking(&self, graph: GraphId, arg_shapes: &[Shape]) -> Result<Shape, InferenceError> {
        futures::executor::block_on(self.infer_graph(graph, arg_shapes))
    }

    /// Infer the shape of `graph`'s return value given its parameters bound
    /// to `arg_shapes`.
    pub async fn infer_graph(&self, graph: GraphId, arg_shapes: &[Shape]) -> Result<Shape, InferenceError> {
        self.tick()?;
        let params = self.core.graph(graph)?.parameters.clone();
        if params.len() != arg_shapes.len() {
            return Err(InferenceError::Unsatisfiable(format!(
                "graph {graph} expects {} argument(s), got {}",
                params.len(),
                arg_shapes.len()
            )));
        }

        match self.graph_memo.borrow().get(&graph) {
            Some(GraphMemo::Done(idx)) => return Ok(self.graph_results.borrow()[*idx].clone()),
            Some(GraphMemo::InProgress) => return Ok(Shape::Anything),
            None => {}
        }
        self.graph_memo.borrow_mut().insert(graph, GraphMemo::InProgress);

        for (p, s) in params.iter().zip(arg_shapes.iter()) {
            self.params.borrow_mut().insert(*p, s.clone());
        }
        let return_node = self
            .core
            .graph(graph)?
            .return_
            .ok_or_else(|| InferenceError::Unsatisfiable(format!("graph {graph} has no return node")))?;
        let result = self.infer_shape(return_node).await?;

        let idx = self.graph_results.borrow().len();
        self.graph_results.borrow_mut().push(result.clone());
        self.graph_memo.borrow_mut().insert(graph, GraphMemo::Done(idx));
        Ok(result)
    }

    fn infer_shape(&self, node: NodeId) -> BoxFuture<'_, Result<Shape, InferenceError>> {
        async move {
            self.tick()?;
            if let Some(s) = self.node_memo.borrow().get(&node) {
                return Ok(s.clone());
            }
            let shape = self.infer_shape_uncached(node).await?;
            self.node_memo.borrow_mut().insert(node, shape.clone());
            Ok(shape)
        }
        .boxed()
    }

    async fn infer_shape_uncached(&self, node: NodeId) -> Result<Shape, InferenceError> {
        match self.core.node(node)?.clone() {
            ANFNodeData::Constant { .. } => Ok(Shape::SCALAR),
            ANFNodeData::Parameter { .. } => Ok(self.params.borrow().get(&node).cloned().unwrap_or(Shape::Anything)),
            ANFNodeData::Special { .. } => Err(InferenceError::Unsatisfiable("special nodes have no shape".to_string())),
            ANFNodeData::Apply { inputs, .. } => {
                if let Some(prim) = self.core.node(inputs[0])?.as_const().and_then(as_primitive) {
                    self.infer_primitive(prim, &inputs).await
                } else if let Some(g) = self.core.is_constant_graph(inputs[0]) {
                    let mut arg_shapes = Vec::with_capacity(inputs.len() - 1);
                    for &a in &inputs[1..] {
                        arg_shapes.push(self.infer_shape(a).await?);
                    }
                    self.infer_graph(g, &arg_shapes).await
                } else {
                    Ok(Shape::Anything)
                }
            }
        }
    }

    async fn infer_primitive(&self, prim: Primitive, inputs: &[NodeId]) -> Result<Shape, InferenceError> {
        use Primitive::*;
        match prim {
            Return => self.infer_shape(inputs[1]).await,
            If => self.infer_if(inputs).await,
            MapArray | ScanArray => self.infer_shape(inputs[2]).await,
            ReduceArray => {
                let a_shape = self.infer_shape(inputs[3]).await?;
                let axis = self.infer_known_dim(inputs[4]).await;
                Ok(a_shape.drop_axis(axis))
            }
            Distribute => {
                let v_shape = self.infer_shape(inputs[1]).await?;
                let target = self.infer_literal_shape(inputs[2]);
                Shape::broadcastable_to(&v_shape, &target)?;
                Ok(target)
            }
            Reshape => {
                let v_shape = self.infer_shape(inputs[1]).await?;
                let target = self.infer_literal_shape(inputs[2]);
                if let (Some(from), Some(to)) = (v_shape.element_count(), target.element_count()) {
                    if from != to {
                        return Err(InferenceError::ShapeMismatch {
                            expected: target.to_string(),
                            got: v_shape.to_string(),
                        });
                    }
                }
                Ok(target)
            }
            Dot => self.infer_dot(inputs).await,
            // Everything else (control already handled above, arithmetic,
            // comparison, and structural primitives) defaults to a scalar
            // inferrer per the spec's "unknown primitives" fallback.
            _ => Ok(Shape::SCALAR),
        }
    }

    async fn infer_if(&self, inputs: &[NodeId]) -> Result<Shape, InferenceError> {
        let cond = inputs[1];
        let true_graph = self
            .core
            .is_constant_graph(inputs[2])
            .ok_or_else(|| InferenceError::Unsatisfiable("if_ true branch is not a graph constant".to_string()))?;
        let false_graph = self
            .core
            .is_constant_graph(inputs[3])
            .ok_or_else(|| InferenceError::Unsatisfiable("if_ false branch is not a graph constant".to_string()))?;

        match self.known_bool(cond)? {
            Some(true) => self.infer_graph(true_graph, &[]).await,
            Some(false) => self.infer_graph(false_graph, &[]).await,
            None => {
                let t = self.infer_graph(true_graph, &[]).await?;
                let f = self.infer_graph(false_graph, &[]).await?;
                Shape::assert_same(&t, &f)
            }
        }
    }

    async fn infer_dot(&self, inputs: &[NodeId]) -> Result<Shape, InferenceError> {
        let a = self.infer_shape(inputs[1]).await?;
        let b = self.infer_shape(inputs[2]).await?;
        let (Shape::Known(ad), Shape::Known(bd)) = (&a, &b) else {
            return Ok(Shape::Anything);
        };
        if ad.len() != 2 || bd.len() != 2 {
            return Err(InferenceError::ShapeMismatch {
                expected: "rank-2 operands".to_string(),
                got: format!("{a} and {b}"),
            });
        }
        if let (Dim::Known(inner_a), Dim::Known(inner_b)) = (ad[1], bd[0]) {
            if inner_a != inner_b {
                return Err(InferenceError::ShapeMismatch {
                    expected: format!("inner dimension {inner_a}"),
                    got: format!("inner dimension {inner_b}"),
                });
            }
        }
        Ok(Shape::Known(vec![ad[0], bd[1]]))
    }

    /// Looks through a `Constant(Bool)` to decide a known condition;
    /// anything else (an unresolved computation, a parameter) is treated as
    /// ANYTHING, matching the spec's conservative default.
    fn known_bool(&self, node: NodeId) -> Result<Option<bool>, InferenceError> {
        match self.core.node(node)?.as_const() {
            Some(ConstValue::Bool(b)) => Ok(Some(*b)),
            _ => Ok(None),
        }
    }

    /// Folds a `cons_tuple`/`getitem`-free literal tuple of int constants
    /// into dims, one element at a time; any non-literal-int element
    /// degrades that dimension to ANYTHING rather than failing the whole
    /// shape.
    async fn infer_known_dim(&self, node: NodeId) -> Dim {
        match self.core.node(node).ok().and_then(|n| n.as_const()) {
            Some(ConstValue::Int(i)) if *i >= 0 => Dim::Known(*i as u64),
            _ => Dim::Anything,
        }
    }

    fn infer_literal_shape(&self, node: NodeId) -> Shape {
        fn fold(core: &GraphManager, node: NodeId) -> Shape {
            match core.node(node) {
                Ok(ANFNodeData::Constant { value: ConstValue::EmptyTuple, .. }) => Shape::Known(Vec::new()),
                Ok(ANFNodeData::Apply { inputs, .. }) => {
                    let Some(Primitive::ConsTuple) = core.node(inputs[0]).ok().and_then(|n| n.as_const()).and_then(as_primitive) else {
                        return Shape::Anything;
                    };
                    let head = match core.node(inputs[1]).ok().and_then(|n| n.as_const()) {
                        Some(ConstValue::Int(i)) if *i >= 0 => Dim::Known(*i as u64),
                        _ => Dim::Anything,
                    };
                    match fold(core, inputs[2]) {
                        Shape::Known(mut rest) => {
                            rest.insert(0, head);
                            Shape::Known(rest)
                        }
                        Shape::Anything => Shape::Anything,
                    }
                }
                _ => Shape::Anything,
            }
        }
        fold(self.core, node)
    }
}

fn as_primitive(v: &ConstValue) -> Option<Primitive> {
    match v {
        ConstValue::Primitive(p) => Some(*p),
        _ => None,
    }
}
