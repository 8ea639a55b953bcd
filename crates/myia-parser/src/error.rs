//! Parser error taxonomy.

use myia_core::CoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// An unrecognized token, or a construct outside the accepted surface
    /// grammar (§6 of the source surface).
    #[error("unsupported construct at line {line}: {what}")]
    NotSupported { line: u32, what: String },

    /// A graph's `return_` would be overwritten (an early-return branch was
    /// jumped from, or a function body writes `return` twice on one path).
    #[error("return already set for this block (line {line})")]
    ReturnAlreadySet { line: u32 },

    /// A `Compare` AST node carried more than one comparator.
    #[error("only a single comparator is supported in a compare expression (line {line})")]
    MultipleComparators { line: u32 },

    /// A name could not be found in any namespace, with the block matured
    /// and lacking predecessors (i.e. truly free at the top of a function).
    #[error("unresolved name '{name}' (line {line})")]
    UnresolvedName { name: String, line: u32 },

    /// Propagated from the IR when lowering violates an arena invariant.
    #[error(transparent)]
    Core(#[from] CoreError),
}
