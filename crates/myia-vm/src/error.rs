//! VM error taxonomy.

use myia_core::{GraphId, NodeId};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VMError {
    #[error("wrong arity calling graph {graph}: expected {expected} argument(s), got {got}")]
    WrongArity {
        graph: GraphId,
        expected: usize,
        got: usize,
    },

    /// A frame was indexed by a node with no computed value, closure binding,
    /// or constant value to fall back on.
    #[error("no value bound for {0} in this frame")]
    UnknownNode(NodeId),

    /// Something was used where a Primitive/Graph/Closure/Partial was required.
    #[error("value is not callable: {0}")]
    UncallableValue(String),

    #[error(transparent)]
    Core(#[from] myia_core::CoreError),
}
