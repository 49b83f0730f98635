//! Error types for the GridKernel CLI.

use thiserror::Error;

use gridkernel_core::error::{ErrorKind, GridKernelError};

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// Error raised by the runtime or a workload.
    #[error(transparent)]
    Runtime(#[from] GridKernelError),

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl CliError {
    /// Short label printed before the message.
    pub fn label(&self) -> &'static str {
        match self {
            CliError::Argument(_) => "Configuration error:",
            CliError::Runtime(e) => match e.kind() {
                ErrorKind::Configuration => "Configuration error:",
                ErrorKind::Compile => "Build error:",
                ErrorKind::Execution => "Device error:",
            },
        }
    }
}
