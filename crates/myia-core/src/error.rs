//! Structural errors raised by the IR, graph utilities, and manager.

use crate::id::{GraphId, NodeId};
use thiserror::Error;

/// Errors that indicate the IR itself is malformed, as opposed to errors in
/// code built on top of it (parsing, evaluation, inference).
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// A graph's `return_` was set a second time.
    #[error("graph {graph} already has a return node set")]
    ReturnAlreadySet { graph: GraphId },

    /// A traversal following non-graph edges found a cycle.
    #[error("cycle detected while traversing the graph at {node}")]
    InvalidGraph { node: NodeId },

    /// A node id did not resolve to any node in the manager.
    #[error("no such node: {0}")]
    NoSuchNode(NodeId),

    /// A graph id did not resolve to any graph in the manager.
    #[error("no such graph: {0}")]
    NoSuchGraph(GraphId),
}
