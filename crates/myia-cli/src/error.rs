//! The CLI's top-level error, wrapping each crate's own error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid --args JSON: {0}")]
    Args(#[from] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] myia_parser::ParseError),

    #[error(transparent)]
    Vm(#[from] myia_vm::VMError),

    #[error(transparent)]
    Infer(#[from] myia_infer::InferenceError),

    #[error("no such entry function '{0}'")]
    NoSuchEntry(String),

    #[error("program has no top-level function definitions")]
    EmptyProgram,

    #[error("unsupported JSON argument: {0}")]
    UnsupportedArg(String),
}
