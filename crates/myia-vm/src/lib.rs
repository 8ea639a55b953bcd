//! A reference evaluator for graphs produced by `myia-parser`.
//!
//! Executes ANF graphs directly: no bytecode, no JIT. Intended as a
//! correctness oracle and for driving the example programs from the
//! command line, not as a fast runtime.

pub mod error;
pub mod frame;
pub mod value;
pub mod vm;

pub use error::VMError;
pub use frame::Frame;
pub use value::{Closure, Partial, Value};
pub use vm::Vm;
