//! Newtype identifiers for arena-allocated IR entities.

use petgraph::graph::NodeIndex;
use std::fmt;

/// Identifies an [`crate::node::ANFNodeData`] inside a [`crate::graph::GraphManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

/// Identifies a [`crate::graph::GraphData`] inside a [`crate::graph::GraphManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct GraphId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_roundtrips_through_node_index() {
        let idx: NodeIndex<u32> = NodeIndex::new(7);
        let id: NodeId = idx.into();
        assert_eq!(id, NodeId(7));
        let back: NodeIndex<u32> = id.into();
        assert_eq!(back, idx);
    }

    #[test]
    fn display_formats() {
        assert_eq!(NodeId(3).to_string(), "node#3");
        assert_eq!(GraphId(3).to_string(), "graph#3");
    }
}
