//! The ANF intermediate representation: node and graph types, the arena
//! that owns them, generic graph search/isomorphism, the primitive catalog,
//! and the abstract namespace used to resolve non-local names.

pub mod error;
pub mod graph;
pub mod graph_utils;
pub mod id;
pub mod namespace;
pub mod node;
pub mod primitives;

pub use error::CoreError;
pub use graph::{GraphData, GraphManager};
pub use id::{GraphId, NodeId};
pub use namespace::{MapResolver, Namespace, NamespaceValue, Resolver};
pub use node::{ANFNodeData, ConstValue, DebugInfo, Location, SpecialTag};
pub use primitives::Primitive;
