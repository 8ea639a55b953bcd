//! The four-variant ANF node sum type and the values a Constant can carry.

use crate::id::GraphId;
use crate::namespace::Namespace;
use crate::primitives::Primitive;
use serde::{Deserialize, Serialize};

/// A source location, attached to debug info when a node was derived from
/// parsed source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Debug metadata carried by every node. Never affects evaluation or
/// isomorphism; purely for diagnostics and tracing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub name: Option<String>,
    pub location: Option<Location>,
}

impl DebugInfo {
    pub fn named(name: impl Into<String>) -> Self {
        DebugInfo {
            name: Some(name.into()),
            location: None,
        }
    }
}

/// The immutable value carried by a Constant node.
///
/// `EmptyTuple` is the base case `cons_tuple` folds onto (mirrors the
/// original parser's `Constant(())`); `Graph` makes this a *graph constant*,
/// the callee used for every tail call and closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    None_,
    EmptyTuple,
    Graph(GraphId),
    Primitive(Primitive),
    Namespace(Namespace),
}

impl ConstValue {
    pub fn is_graph(&self) -> bool {
        matches!(self, ConstValue::Graph(_))
    }

    pub fn as_graph(&self) -> Option<GraphId> {
        match self {
            ConstValue::Graph(g) => Some(*g),
            _ => None,
        }
    }
}

/// An opaque tag carried by a [`ANFNodeData::Special`] node. Special nodes
/// are markers used by collaborating passes; the core IR never interprets
/// the tag and such nodes are never evaluable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialTag(pub String);

/// The four ANF node variants, stored in the [`crate::graph::GraphManager`] arena.
///
/// Node identity is by arena index (see [`crate::id::NodeId`]), never by
/// structural content; `ConstValue`'s `PartialEq` is only consulted
/// explicitly, by isomorphism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ANFNodeData {
    /// Ordered inputs, first being the callee. Owned by `graph`.
    Apply {
        inputs: Vec<crate::id::NodeId>,
        graph: GraphId,
        debug: DebugInfo,
    },
    /// An immutable value; not owned by any single graph.
    Constant { value: ConstValue, debug: DebugInfo },
    /// Owned by `graph`; position within `graph.parameters` determines
    /// argument binding order.
    Parameter { graph: GraphId, debug: DebugInfo },
    /// An opaque, non-evaluable marker.
    Special { tag: SpecialTag, debug: DebugInfo },
}

impl ANFNodeData {
    pub fn debug(&self) -> &DebugInfo {
        match self {
            ANFNodeData::Apply { debug, .. }
            | ANFNodeData::Constant { debug, .. }
            | ANFNodeData::Parameter { debug, .. }
            | ANFNodeData::Special { debug, .. } => debug,
        }
    }

    pub fn debug_mut(&mut self) -> &mut DebugInfo {
        match self {
            ANFNodeData::Apply { debug, .. }
            | ANFNodeData::Constant { debug, .. }
            | ANFNodeData::Parameter { debug, .. }
            | ANFNodeData::Special { debug, .. } => debug,
        }
    }

    /// The graph that owns this node, if any. Constants and Special markers
    /// are not owned by a single graph.
    pub fn owner(&self) -> Option<GraphId> {
        match self {
            ANFNodeData::Apply { graph, .. } | ANFNodeData::Parameter { graph, .. } => Some(*graph),
            ANFNodeData::Constant { .. } | ANFNodeData::Special { .. } => None,
        }
    }

    /// This node's `incoming` set: its inputs, or empty for everything but Apply.
    pub fn incoming(&self) -> &[crate::id::NodeId] {
        match self {
            ANFNodeData::Apply { inputs, .. } => inputs,
            _ => &[],
        }
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, ANFNodeData::Apply { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, ANFNodeData::Parameter { .. })
    }

    pub fn as_const(&self) -> Option<&ConstValue> {
        match self {
            ANFNodeData::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_constant_graph(&self) -> Option<GraphId> {
        self.as_const().and_then(ConstValue::as_graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    #[test]
    fn incoming_empty_for_non_apply() {
        let p = ANFNodeData::Parameter {
            graph: GraphId(0),
            debug: DebugInfo::default(),
        };
        assert!(p.incoming().is_empty());
        assert!(p.is_parameter());
        assert!(!p.is_apply());
    }

    #[test]
    fn apply_incoming_is_inputs() {
        let a = ANFNodeData::Apply {
            inputs: vec![NodeId(1), NodeId(2)],
            graph: GraphId(0),
            debug: DebugInfo::default(),
        };
        assert_eq!(a.incoming(), &[NodeId(1), NodeId(2)]);
        assert_eq!(a.owner(), Some(GraphId(0)));
    }

    #[test]
    fn constant_owner_is_none() {
        let c = ANFNodeData::Constant {
            value: ConstValue::Int(3),
            debug: DebugInfo::default(),
        };
        assert_eq!(c.owner(), None);
        assert!(!c.is_constant_graph().is_some());
    }

    #[test]
    fn graph_constant_detection() {
        let c = ANFNodeData::Constant {
            value: ConstValue::Graph(GraphId(4)),
            debug: DebugInfo::default(),
        };
        assert_eq!(c.is_constant_graph(), Some(GraphId(4)));
    }
}
