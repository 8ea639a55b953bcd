//! The Graph entity and the arena-backed Graph Manager that owns all nodes
//! and graphs reachable from a parsed program.

use crate::error::CoreError;
use crate::id::{GraphId, NodeId};
use crate::node::{ANFNodeData, ConstValue, DebugInfo, SpecialTag};
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use serde::{Deserialize, Serialize};

/// A function-like unit: an ordered parameter list and a single return node.
///
/// Two `GraphData` are equal only by identity (their [`GraphId`] in the
/// owning manager); structural equality is isomorphism, computed separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub debug: DebugInfo,
    pub parameters: Vec<NodeId>,
    pub return_: Option<NodeId>,
}

impl GraphData {
    pub fn named(name: impl Into<String>) -> Self {
        GraphData {
            debug: DebugInfo::named(name),
            ..Default::default()
        }
    }
}

/// Owns every node and graph reachable from one or more parsed programs.
///
/// Nodes live in a `StableGraph` used purely as a typed, index-stable arena
/// (its edge set is unused; an Apply's inputs are an explicit ordered `Vec`,
/// since input order is semantically load-bearing and petgraph edges don't
/// model "nth input" directly). Graphs live in a plain `Vec` arena addressed
/// by [`GraphId`]. This is the "central Graph Manager arena" the design
/// calls for: node references are indices, never owning handles, so cyclic
/// graph-constant references (a block's function referring back to an
/// ancestor block) are trivially representable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphManager {
    nodes: StableGraph<ANFNodeData, (), Directed, u32>,
    graphs: Vec<GraphData>,
}

impl GraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Graph lifecycle -----------------------------------------------

    pub fn new_graph(&mut self) -> GraphId {
        self.graphs.push(GraphData::default());
        GraphId((self.graphs.len() - 1) as u32)
    }

    pub fn graph(&self, id: GraphId) -> Result<&GraphData, CoreError> {
        self.graphs
            .get(id.0 as usize)
            .ok_or(CoreError::NoSuchGraph(id))
    }

    pub fn graph_mut(&mut self, id: GraphId) -> Result<&mut GraphData, CoreError> {
        self.graphs
            .get_mut(id.0 as usize)
            .ok_or(CoreError::NoSuchGraph(id))
    }

    pub fn set_graph_name(&mut self, id: GraphId, name: impl Into<String>) -> Result<(), CoreError> {
        self.graph_mut(id)?.debug.name = Some(name.into());
        Ok(())
    }

    pub fn set_return(&mut self, graph: GraphId, node: NodeId) -> Result<(), CoreError> {
        let g = self.graph_mut(graph)?;
        if g.return_.is_some() {
            return Err(CoreError::ReturnAlreadySet { graph });
        }
        g.return_ = Some(node);
        Ok(())
    }

    pub fn add_parameter(&mut self, graph: GraphId, node: NodeId) -> Result<(), CoreError> {
        self.graph_mut(graph)?.parameters.push(node);
        Ok(())
    }

    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        (0..self.graphs.len()).map(|i| GraphId(i as u32))
    }

    // -- Node constructors ------------------------------------------------

    /// `apply(callee, ...args) -> Apply`.
    pub fn apply(&mut self, graph: GraphId, inputs: Vec<NodeId>) -> NodeId {
        let idx = self.nodes.add_node(ANFNodeData::Apply {
            inputs,
            graph,
            debug: DebugInfo::default(),
        });
        idx.into()
    }

    /// `constant(value) -> Constant`.
    pub fn constant(&mut self, value: ConstValue) -> NodeId {
        let idx = self.nodes.add_node(ANFNodeData::Constant {
            value,
            debug: DebugInfo::default(),
        });
        idx.into()
    }

    /// `parameter(graph) -> Parameter`. Does not append to the graph's
    /// parameter list; callers append explicitly (mirroring the source,
    /// where parameter order is a parsing decision, not a constructor one).
    pub fn parameter(&mut self, graph: GraphId) -> NodeId {
        let idx = self.nodes.add_node(ANFNodeData::Parameter {
            graph,
            debug: DebugInfo::default(),
        });
        idx.into()
    }

    pub fn special(&mut self, tag: impl Into<String>) -> NodeId {
        let idx = self.nodes.add_node(ANFNodeData::Special {
            tag: SpecialTag(tag.into()),
            debug: DebugInfo::default(),
        });
        idx.into()
    }

    // -- Node accessors ----------------------------------------------------

    pub fn node(&self, id: NodeId) -> Result<&ANFNodeData, CoreError> {
        self.nodes.node_weight(id.into()).ok_or(CoreError::NoSuchNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut ANFNodeData, CoreError> {
        self.nodes
            .node_weight_mut(id.into())
            .ok_or(CoreError::NoSuchNode(id))
    }

    pub fn incoming(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).map(|n| n.incoming().to_vec()).unwrap_or_default()
    }

    pub fn owner(&self, id: NodeId) -> Option<GraphId> {
        self.node(id).ok().and_then(|n| n.owner())
    }

    pub fn is_constant_graph(&self, id: NodeId) -> Option<GraphId> {
        self.node(id).ok().and_then(|n| n.is_constant_graph())
    }

    /// The set of nodes reachable from `graph.return_` whose owning graph is
    /// not `graph`. Recomputed on demand rather than cached, per the design:
    /// the manager keeps no incremental free-variable index.
    pub fn free_variables_total(&self, graph: GraphId) -> Result<Vec<NodeId>, CoreError> {
        use crate::graph_utils::{dfs, freevars_boundary, succ_deep};
        let Some(root) = self.graph(graph)?.return_ else {
            return Ok(Vec::new());
        };
        let include = freevars_boundary(self, graph, true);
        let mut out = Vec::new();
        for n in dfs(self, root, succ_deep, include)? {
            if let Some(g) = self.owner(n) {
                if g == graph {
                    continue;
                }
                // A graph's own return node never holds a storable value (the VM
                // delivers it via a control transfer, not a frame slot), so it can
                // never be satisfied as a captured free variable. succ_deep still
                // walks through it via self-referential graph constants to reach
                // whatever real free variables a recursive function's branches use;
                // only the return node itself must not be reported as one.
                if self.graph(g)?.return_ == Some(n) {
                    continue;
                }
                out.push(n);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_straight_line_graph() {
        let mut m = GraphManager::new();
        let g = m.new_graph();
        let x = m.parameter(g);
        let y = m.parameter(g);
        m.add_parameter(g, x).unwrap();
        m.add_parameter(g, y).unwrap();
        let add = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Add));
        let call = m.apply(g, vec![add, x, y]);
        let ret_prim = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Return));
        let ret = m.apply(g, vec![ret_prim, call]);
        m.set_return(g, ret).unwrap();

        assert_eq!(m.graph(g).unwrap().parameters, vec![x, y]);
        assert_eq!(m.graph(g).unwrap().return_, Some(ret));
        assert_eq!(m.incoming(call), vec![add, x, y]);
    }

    #[test]
    fn return_already_set_is_rejected() {
        let mut m = GraphManager::new();
        let g = m.new_graph();
        let c = m.constant(ConstValue::Int(1));
        m.set_return(g, c).unwrap();
        let err = m.set_return(g, c).unwrap_err();
        assert!(matches!(err, CoreError::ReturnAlreadySet { .. }));
    }

    #[test]
    fn free_variables_total_finds_outer_param() {
        let mut m = GraphManager::new();
        let outer = m.new_graph();
        let x = m.parameter(outer);
        m.add_parameter(outer, x).unwrap();

        let inner = m.new_graph();
        let y = m.parameter(inner);
        m.add_parameter(inner, y).unwrap();
        let add = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Add));
        let sum = m.apply(inner, vec![add, x, y]);
        let ret_prim = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Return));
        let ret = m.apply(inner, vec![ret_prim, sum]);
        m.set_return(inner, ret).unwrap();

        let fvs = m.free_variables_total(inner).unwrap();
        assert_eq!(fvs, vec![x]);
    }

    #[test]
    fn free_variables_total_excludes_self_referential_return_node() {
        let mut m = GraphManager::new();
        let entry = m.new_graph();
        let n = m.parameter(entry);
        m.add_parameter(entry, n).unwrap();
        let entry_const = m.constant(ConstValue::Graph(entry));
        let ret_prim = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Return));
        let entry_ret = m.apply(entry, vec![ret_prim, n]);
        m.set_return(entry, entry_ret).unwrap();

        let branch = m.new_graph();
        let zero = m.constant(ConstValue::Int(0));
        let sub = m.constant(ConstValue::Primitive(crate::primitives::Primitive::Sub));
        let dec = m.apply(branch, vec![sub, n, zero]);
        let call = m.apply(branch, vec![entry_const, dec]);
        let ret = m.apply(branch, vec![ret_prim, call]);
        m.set_return(branch, ret).unwrap();

        let fvs = m.free_variables_total(branch).unwrap();
        assert!(!fvs.contains(&entry_ret));
        assert!(fvs.contains(&n));
    }

    #[test]
    fn serde_roundtrip() {
        let mut m = GraphManager::new();
        let g = m.new_graph();
        let c = m.constant(ConstValue::Int(42));
        m.set_return(g, c).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: GraphManager = serde_json::from_str(&json).unwrap();
        assert_eq!(back.graph(g).unwrap().return_, Some(c));
    }
}
