//! `Block`: parser-only bookkeeping for one basic block under construction.
//!
//! Blocks reference each other (`preds`, `jumps`) and outlive the borrow of
//! any single recursive call, so they are arena-allocated by [`BlockId`]
//! rather than held through Rust references -- the same arena-of-indices
//! treatment the core IR gives nodes and graphs.

use myia_core::{GraphId, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone)]
pub struct BlockData {
    pub graph: GraphId,
    pub matured: bool,
    pub variables: HashMap<String, NodeId>,
    pub preds: Vec<BlockId>,
    /// parameter node -> the variable name it resolves, in the order phi
    /// parameters were first read (matching `graph.parameters` order).
    pub phi_nodes: HashMap<NodeId, String>,
    /// target block -> this block's tail-call Apply into that target.
    pub jumps: HashMap<BlockId, NodeId>,
}

impl BlockData {
    pub fn new(graph: GraphId) -> Self {
        BlockData {
            graph,
            matured: false,
            variables: HashMap::new(),
            preds: Vec::new(),
            phi_nodes: HashMap::new(),
            jumps: HashMap::new(),
        }
    }
}

/// Owns every `Block` created while lowering one module.
#[derive(Debug, Default)]
pub struct BlockArena {
    blocks: Vec<BlockData>,
}

impl BlockArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, graph: GraphId) -> BlockId {
        self.blocks.push(BlockData::new(graph));
        BlockId(self.blocks.len() - 1)
    }

    pub fn get(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.0]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut BlockData {
        &mut self.blocks[id.0]
    }
}
