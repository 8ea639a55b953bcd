//! One graph activation's worth of VM state.

use crate::error::VMError;
use crate::value::Value;
use myia_core::{ANFNodeData, GraphId, GraphManager, NodeId};
use std::collections::HashMap;

/// Holds the state for one application of a graph.
///
/// `todo` must list every free variable of a graph encountered *before* the
/// graph-constant node itself, since closure materialization reads those
/// free variables out of this same frame. Built from a topological order
/// with dependencies first and the graph's `return_` last, then reversed so
/// that `Vec::pop` drains it in dependency order.
#[derive(Debug)]
pub struct Frame {
    pub graph: GraphId,
    pub values: HashMap<NodeId, Value>,
    pub todo: Vec<NodeId>,
    pub closure: Option<HashMap<NodeId, Value>>,
}

impl Frame {
    pub fn new(graph: GraphId, mut nodes: Vec<NodeId>, closure: Option<HashMap<NodeId, Value>>) -> Self {
        nodes.reverse();
        Frame {
            graph,
            values: HashMap::new(),
            todo: nodes,
            closure,
        }
    }

    /// Resolve `node` to a value: a computed value, a closure binding, or
    /// (for a Constant) the constant's own value.
    pub fn get(&self, core: &GraphManager, node: NodeId) -> Result<Value, VMError> {
        if let Some(v) = self.values.get(&node) {
            return Ok(v.clone());
        }
        if let Some(closure) = &self.closure {
            if let Some(v) = closure.get(&node) {
                return Ok(v.clone());
            }
        }
        match core.node(node)? {
            ANFNodeData::Constant { value, .. } => Ok(crate::vm::const_to_value(value)),
            _ => Err(VMError::UnknownNode(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myia_core::ConstValue;

    #[test]
    fn todo_drains_dependencies_before_root() {
        let mut core = GraphManager::new();
        let g = core.new_graph();
        let c = core.constant(ConstValue::Int(1));
        let ret_prim = core.constant(ConstValue::Primitive(myia_core::Primitive::Return));
        let ret = core.apply(g, vec![ret_prim, c]);
        core.set_return(g, ret).unwrap();

        let toposorted = myia_core::graph_utils::toposort(&core, ret, myia_core::graph_utils::succ_incoming).unwrap();
        let mut frame = Frame::new(g, toposorted, None);
        let first = frame.todo.pop().unwrap();
        assert_ne!(first, ret, "dependencies must drain before the return node");
    }
}
