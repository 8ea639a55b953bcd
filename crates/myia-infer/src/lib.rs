//! Abstract-interpretation shape inference over ANF graphs.
//!
//! A single concrete track (shape) over a cooperative, single-threaded
//! scheduler. See [`engine::Engine`] for the entry point.

pub mod engine;
pub mod error;
pub mod shape;

pub use engine::{Engine, InferenceConfig};
pub use error::InferenceError;
pub use shape::{Dim, Shape};
