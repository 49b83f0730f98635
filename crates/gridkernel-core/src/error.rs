//! Error types for GridKernel.
//!
//! Every device-runtime boundary returns an explicit [`Result`]. Errors are
//! grouped into three kinds (see [`ErrorKind`]) which decide how the caller
//! reports them. Failing to converge is not an error: it is reported as
//! [`Termination::Exhausted`](crate::controller::Termination::Exhausted).

use thiserror::Error;

use crate::program::BuildLog;

/// Result type alias for GridKernel operations.
pub type Result<T> = std::result::Result<T, GridKernelError>;

/// Coarse classification of a [`GridKernelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad arguments, shapes or configuration. Detected before device work.
    Configuration,
    /// The device program failed to build.
    Compile,
    /// A dispatch or transfer failed at the device-runtime layer.
    Execution,
}

/// GridKernel error type.
#[derive(Error, Debug)]
pub enum GridKernelError {
    /// Invalid configuration, shape or argument.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested entry point does not exist in the compiled program.
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    /// Operation not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Program compilation failed. Carries the full build diagnostics.
    #[error("Program '{}' failed to build ({})", .0.program, .0.status)]
    CompilationFailed(Box<BuildLog>),

    /// Kernel launch or execution failed.
    #[error("Kernel launch failed: {0}")]
    LaunchFailed(String),

    /// Host/device transfer failed.
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Device allocation failed.
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// No device of the requested class is available.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Other device-runtime failure.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// I/O error (kernel source or configuration file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridKernelError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GridKernelError::InvalidConfig(_)
            | GridKernelError::KernelNotFound(_)
            | GridKernelError::InvalidState(_) => ErrorKind::Configuration,
            GridKernelError::CompilationFailed(_) => ErrorKind::Compile,
            GridKernelError::LaunchFailed(_)
            | GridKernelError::TransferFailed(_)
            | GridKernelError::AllocationFailed(_)
            | GridKernelError::BackendUnavailable(_)
            | GridKernelError::BackendError(_)
            | GridKernelError::Io(_) => ErrorKind::Execution,
        }
    }

    /// Build diagnostics, if this is a compilation failure.
    pub fn build_log(&self) -> Option<&BuildLog> {
        match self {
            GridKernelError::CompilationFailed(log) => Some(&**log),
            _ => None,
        }
    }

    /// Shorthand for an [`GridKernelError::InvalidConfig`] error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GridKernelError::InvalidConfig(msg.into())
    }
}

impl From<BuildLog> for GridKernelError {
    fn from(log: BuildLog) -> Self {
        GridKernelError::CompilationFailed(Box::new(log))
    }
}

impl From<toml::de::Error> for GridKernelError {
    fn from(e: toml::de::Error) -> Self {
        GridKernelError::InvalidConfig(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::BuildStatus;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GridKernelError::config("bad shape").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            GridKernelError::KernelNotFound("jacobi_step".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            GridKernelError::TransferFailed("map failed".into()).kind(),
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_compilation_error_carries_log() {
        let log = BuildLog {
            program: "kernels.wgsl".to_string(),
            status: BuildStatus::Error,
            options: "WG_X=16u".to_string(),
            log: "error: expected ';'".to_string(),
        };
        let err = GridKernelError::from(log);

        assert_eq!(err.kind(), ErrorKind::Compile);
        assert!(err.to_string().contains("kernels.wgsl"));
        assert_eq!(err.build_log().unwrap().log, "error: expected ';'");
    }
}
