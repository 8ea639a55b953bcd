//! Generic graph search: depth-first search and topological sort,
//! parameterized by a successor function and a per-node inclusion decision,
//! plus the graph isomorphism check built on top of them.
//!
//! Grounded in `myia/ir/utils.py` (successor functions, isomorphism) and in
//! the generic `graph_utils.dfs`/`graph_utils.toposort` it imports but that
//! were not retained in the source pack; those two are re-derived here from
//! their documented contract (§4.2).

use crate::error::CoreError;
use crate::graph::GraphManager;
use crate::id::{GraphId, NodeId};
use std::collections::{HashMap, HashSet};

/// What to do with a node encountered during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// Yield this node and visit its successors.
    Follow,
    /// Yield this node but do not visit its successors.
    NoFollow,
    /// Skip this node entirely; do not yield, do not visit successors.
    Exclude,
}

/// A successor function: given a node, the nodes it points to.
pub type SuccFn = fn(&GraphManager, NodeId) -> Result<Vec<NodeId>, CoreError>;

/// Just `incoming`: a node's direct inputs.
pub fn succ_incoming(m: &GraphManager, n: NodeId) -> Result<Vec<NodeId>, CoreError> {
    Ok(m.incoming(n))
}

/// `incoming`, plus for a graph constant, the referred graph's `return_`.
pub fn succ_deep(m: &GraphManager, n: NodeId) -> Result<Vec<NodeId>, CoreError> {
    if let Some(g) = m.is_constant_graph(n) {
        return Ok(m.graph(g)?.return_.into_iter().collect());
    }
    Ok(m.incoming(n))
}

/// Like `succ_deep`, but also follows into the owning graph's `return_`
/// whenever the node has an owner, visiting every graph reachable through
/// free variables as well as through graph constants.
pub fn succ_deeper(m: &GraphManager, n: NodeId) -> Result<Vec<NodeId>, CoreError> {
    if let Some(g) = m.is_constant_graph(n) {
        return Ok(m.graph(g)?.return_.into_iter().collect());
    }
    let mut out = m.incoming(n);
    if let Some(g) = m.owner(n) {
        if let Some(r) = m.graph(g)?.return_ {
            out.push(r);
        }
    }
    Ok(out)
}

/// An inclusion predicate: returns EXCLUDE for anything in `stops`.
pub fn exclude_from_set(stops: HashSet<NodeId>) -> impl Fn(NodeId) -> Inclusion {
    move |n| if stops.contains(&n) { Inclusion::Exclude } else { Inclusion::Follow }
}

/// An inclusion predicate that stops descending once a node's owning graph
/// differs from `graph` -- used by the VM to cut its topological sort at
/// free-variable boundaries, and by the manager to enumerate a graph's
/// total free variables.
pub fn freevars_boundary(
    m: &GraphManager,
    graph: GraphId,
    include_boundary: bool,
) -> impl Fn(NodeId) -> Inclusion + '_ {
    move |n| match m.owner(n) {
        None => Inclusion::Follow,
        Some(g) if g == graph => Inclusion::Follow,
        Some(_) => {
            if include_boundary {
                Inclusion::NoFollow
            } else {
                Inclusion::Exclude
            }
        }
    }
}

/// Depth-first search from `root`, honoring `include`'s FOLLOW/NOFOLLOW/EXCLUDE
/// decision at each node. Each node is yielded at most once. Returns
/// `InvalidGraph` if a cycle is found among FOLLOW-ed edges.
pub fn dfs(
    m: &GraphManager,
    root: NodeId,
    succ: SuccFn,
    include: impl Fn(NodeId) -> Inclusion,
) -> Result<Vec<NodeId>, CoreError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        OnStack,
        Done,
    }

    let mut marks: HashMap<NodeId, Mark> = HashMap::new();
    let mut order = Vec::new();

    // Explicit stack of (node, successors-remaining-to-push) to avoid
    // recursion and to let us distinguish "entering" from "leaving" a node.
    let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> = Vec::new();

    match include(root) {
        Inclusion::Exclude => return Ok(order),
        Inclusion::Follow => {
            marks.insert(root, Mark::OnStack);
            order.push(root);
            stack.push((root, succ(m, root)?.into_iter()));
        }
        Inclusion::NoFollow => {
            order.push(root);
            return Ok(order);
        }
    }

    while let Some((node, iter)) = stack.last_mut() {
        let node = *node;
        match iter.next() {
            Some(next) => {
                match marks.get(&next) {
                    Some(Mark::Done) => continue,
                    Some(Mark::OnStack) => {
                        return Err(CoreError::InvalidGraph { node });
                    }
                    None => {}
                }
                match include(next) {
                    Inclusion::Exclude => continue,
                    Inclusion::NoFollow => {
                        marks.insert(next, Mark::Done);
                        order.push(next);
                    }
                    Inclusion::Follow => {
                        marks.insert(next, Mark::OnStack);
                        order.push(next);
                        stack.push((next, succ(m, next)?.into_iter()));
                    }
                }
            }
            None => {
                marks.insert(node, Mark::Done);
                stack.pop();
            }
        }
    }

    Ok(order)
}

/// A deterministic topological ordering of all nodes reachable from `root`
/// via `succ`: every node appears after all of its followed successors.
pub fn toposort(m: &GraphManager, root: NodeId, succ: SuccFn) -> Result<Vec<NodeId>, CoreError> {
    toposort_included(m, root, succ, |_| Inclusion::Follow)
}

/// Like [`toposort`], but honoring an inclusion predicate the way [`dfs`] does.
pub fn toposort_included(
    m: &GraphManager,
    root: NodeId,
    succ: SuccFn,
    include: impl Fn(NodeId) -> Inclusion,
) -> Result<Vec<NodeId>, CoreError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        OnStack,
        Done,
    }

    let mut marks: HashMap<NodeId, Mark> = HashMap::new();
    let mut out = Vec::new();
    let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> = Vec::new();

    let push = |node: NodeId,
                marks: &mut HashMap<NodeId, Mark>,
                stack: &mut Vec<(NodeId, std::vec::IntoIter<NodeId>)>,
                m: &GraphManager|
     -> Result<(), CoreError> {
        marks.insert(node, Mark::OnStack);
        stack.push((node, succ(m, node)?.into_iter()));
        Ok(())
    };

    match include(root) {
        Inclusion::Exclude => return Ok(out),
        Inclusion::NoFollow => {
            out.push(root);
            return Ok(out);
        }
        Inclusion::Follow => push(root, &mut marks, &mut stack, m)?,
    }

    while let Some((node, iter)) = stack.last_mut() {
        let node = *node;
        match iter.next() {
            Some(next) => match marks.get(&next) {
                Some(Mark::Done) => continue,
                Some(Mark::OnStack) => return Err(CoreError::InvalidGraph { node }),
                None => match include(next) {
                    Inclusion::Exclude => continue,
                    Inclusion::NoFollow => {
                        marks.insert(next, Mark::Done);
                        out.push(next);
                    }
                    Inclusion::Follow => push(next, &mut marks, &mut stack, m)?,
                },
            },
            None => {
                marks.insert(node, Mark::Done);
                out.push(node);
                stack.pop();
            }
        }
    }

    Ok(out)
}

// --------------------------------------------------------------------
// Isomorphism
// --------------------------------------------------------------------

/// Tri-state equivalence result for a graph pair, replacing Python's
/// `'PENDING'` string sentinel used to guard recursive isomorphism queries.
#[derive(Clone, Copy, PartialEq, Eq)]
enum PairState {
    Pending,
    Equal,
    NotEqual,
}

struct Equiv {
    nodes: HashMap<NodeId, NodeId>,
    pairs: HashMap<(GraphId, GraphId), PairState>,
}

fn same_node_shallow(m: &GraphManager, n1: NodeId, n2: NodeId, equiv: &mut Equiv) -> Result<bool, CoreError> {
    if equiv.nodes.get(&n1) == Some(&n2) {
        return Ok(true);
    }
    let (g1, g2) = (m.is_constant_graph(n1), m.is_constant_graph(n2));
    if let (Some(g1), Some(g2)) = (g1, g2) {
        return isomorphic_with(m, g1, g2, equiv);
    }
    let node1 = m.node(n1)?;
    if let Some(v1) = node1.as_const() {
        let v2 = m.node(n2)?.as_const();
        return Ok(v2.map(|v2| v1 == v2).unwrap_or(false));
    }
    if node1.is_parameter() {
        // Parameters are paired up-front when comparing the enclosing
        // graphs; reaching here means a free-variable parameter that was
        // never paired, which cannot match.
        return Ok(false);
    }
    Ok(false)
}

fn same_node(m: &GraphManager, n1: NodeId, n2: NodeId, equiv: &mut Equiv) -> Result<bool, CoreError> {
    if m.node(n1)?.is_apply() {
        let i1 = m.incoming(n1);
        let i2 = m.incoming(n2);
        if i1.len() != i2.len() {
            return Ok(false);
        }
        for (a, b) in i1.into_iter().zip(i2) {
            if !same_node_shallow(m, a, b, equiv)? {
                return Ok(false);
            }
        }
        Ok(true)
    } else {
        same_node_shallow(m, n1, n2, equiv)
    }
}

fn same_subgraph(m: &GraphManager, root1: NodeId, root2: NodeId, equiv: &mut Equiv) -> Result<bool, CoreError> {
    let mut done: HashSet<NodeId> = HashSet::new();
    let mut todo: Vec<(NodeId, NodeId)> = vec![(root1, root2)];

    while let Some(&(n1, n2)) = todo.last() {
        if done.contains(&n1) {
            todo.pop();
            continue;
        }
        let s1 = m.incoming(n1);
        let s2 = m.incoming(n2);
        if s1.len() != s2.len() {
            return Ok(false);
        }
        let mut descended = false;
        for (i, j) in s1.iter().zip(s2.iter()) {
            if !done.contains(i) {
                todo.push((*i, *j));
                descended = true;
            }
        }
        if descended {
            continue;
        }
        done.insert(n1);
        if same_node(m, n1, n2, equiv)? {
            equiv.nodes.insert(n1, n2);
        } else {
            return Ok(false);
        }
        todo.pop();
    }
    Ok(true)
}

/// Whether `g1` and `g2` are structurally equivalent: same parameter count,
/// and their return-subgraphs match under an equivalence map seeded by
/// pairing parameters in order.
pub fn isomorphic(m: &GraphManager, g1: GraphId, g2: GraphId) -> Result<bool, CoreError> {
    let mut equiv = Equiv {
        nodes: HashMap::new(),
        pairs: HashMap::new(),
    };
    isomorphic_with(m, g1, g2, &mut equiv)
}

fn isomorphic_with(m: &GraphManager, g1: GraphId, g2: GraphId, equiv: &mut Equiv) -> Result<bool, CoreError> {
    if let Some(state) = equiv.pairs.get(&(g1, g2)) {
        return Ok(*state != PairState::NotEqual);
    }

    let p1 = &m.graph(g1)?.parameters;
    let p2 = &m.graph(g2)?.parameters;
    if p1.len() != p2.len() {
        return Ok(false);
    }
    let new_pairs: Vec<(NodeId, NodeId)> = p1.iter().copied().zip(p2.iter().copied()).collect();
    for (a, b) in new_pairs {
        equiv.nodes.entry(a).or_insert(b);
    }

    equiv.pairs.insert((g1, g2), PairState::Pending);

    let (r1, r2) = (m.graph(g1)?.return_, m.graph(g2)?.return_);
    let result = match (r1, r2) {
        (Some(r1), Some(r2)) => same_subgraph(m, r1, r2, equiv)?,
        (None, None) => true,
        _ => false,
    };

    equiv
        .pairs
        .insert((g1, g2), if result { PairState::Equal } else { PairState::NotEqual });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConstValue;
    use crate::primitives::Primitive;

    fn build_add_fn(m: &mut GraphManager) -> GraphId {
        let g = m.new_graph();
        let x = m.parameter(g);
        let y = m.parameter(g);
        m.add_parameter(g, x).unwrap();
        m.add_parameter(g, y).unwrap();
        let add = m.constant(ConstValue::Primitive(Primitive::Add));
        let call = m.apply(g, vec![add, x, y]);
        let ret_prim = m.constant(ConstValue::Primitive(Primitive::Return));
        let ret = m.apply(g, vec![ret_prim, call]);
        m.set_return(g, ret).unwrap();
        g
    }

    #[test]
    fn toposort_orders_dependencies_first() {
        let mut m = GraphManager::new();
        let g = build_add_fn(&mut m);
        let root = m.graph(g).unwrap().return_.unwrap();
        let order = toposort(&m, root, succ_incoming).unwrap();
        assert_eq!(*order.last().unwrap(), root);
        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        let params = m.graph(g).unwrap().parameters.clone();
        for p in params {
            assert!(pos(p) < order.len() - 1);
        }
    }

    #[test]
    fn dfs_detects_cycle() {
        let mut m = GraphManager::new();
        let g = m.new_graph();
        let a = m.apply(g, vec![]);
        // Force a self-referential input list after construction to
        // simulate a malformed cyclic graph.
        if let Ok(node) = m.node_mut(a) {
            if let crate::node::ANFNodeData::Apply { inputs, .. } = node {
                inputs.push(a);
            }
        }
        let err = dfs(&m, a, succ_incoming, |_| Inclusion::Follow).unwrap_err();
        assert!(matches!(err, CoreError::InvalidGraph { .. }));
    }

    #[test]
    fn isomorphic_functions_match() {
        let mut m = GraphManager::new();
        let g1 = build_add_fn(&mut m);
        let g2 = build_add_fn(&mut m);
        assert!(isomorphic(&m, g1, g2).unwrap());
        assert!(isomorphic(&m, g2, g1).unwrap());
    }

    #[test]
    fn isomorphism_is_reflexive_and_not_fooled_by_different_arity() {
        let mut m = GraphManager::new();
        let g1 = build_add_fn(&mut m);
        assert!(isomorphic(&m, g1, g1).unwrap());

        let g3 = m.new_graph();
        let z = m.parameter(g3);
        m.add_parameter(g3, z).unwrap();
        let ret_prim = m.constant(ConstValue::Primitive(Primitive::Return));
        let ret = m.apply(g3, vec![ret_prim, z]);
        m.set_return(g3, ret).unwrap();

        assert!(!isomorphic(&m, g1, g3).unwrap());
    }

    #[test]
    fn isomorphism_distinguishes_different_constants() {
        let mut m = GraphManager::new();
        let g1 = m.new_graph();
        let c1 = m.constant(ConstValue::Int(1));
        let ret_prim1 = m.constant(ConstValue::Primitive(Primitive::Return));
        let r1 = m.apply(g1, vec![ret_prim1, c1]);
        m.set_return(g1, r1).unwrap();

        let g2 = m.new_graph();
        let c2 = m.constant(ConstValue::Int(2));
        let ret_prim2 = m.constant(ConstValue::Primitive(Primitive::Return));
        let r2 = m.apply(g2, vec![ret_prim2, c2]);
        m.set_return(g2, r2).unwrap();

        assert!(!isomorphic(&m, g1, g2).unwrap());
    }
}
