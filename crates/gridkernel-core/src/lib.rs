//! # GridKernel Core
//!
//! Host-side orchestration for offloading grid workloads to a compute device.
//!
//! This crate is backend-agnostic. It compiles one program per session,
//! manages a pair of ping-pong buffers, validates and issues blocking kernel
//! dispatches, measures convergence and drives the iterate / evaluate / swap
//! loop of a stencil solver.
//!
//! ## Core Abstractions
//!
//! - [`ComputeDevice`] - Device-runtime seam implemented by each backend
//! - [`DeviceSession`] - Program lifecycle and the single in-order queue
//! - [`BufferPair`] - Two buffers with swappable `current` / `next` roles
//! - [`Dispatcher`] - Validated, blocking kernel launches
//! - [`ConvergenceEvaluator`] - Residual normalised by the boundary norm
//! - [`IterationController`] - Running / Converged / Exhausted state machine
//!
//! ## Example
//!
//! ```ignore
//! use gridkernel_core::prelude::*;
//!
//! let session = DeviceSession::open(device, ProgramSource::new("k.wgsl", text))?;
//! let mut controller = IterationController::new(
//!     &session,
//!     &initial,
//!     StencilKernel::new("jacobi_step", m, n),
//!     &SolverConfig::default().with_max_iterations(1000),
//! )?;
//! let report = controller.run()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod controller;
pub mod convergence;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod program;
pub mod session;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::{BufferPair, Role, Slot};
    pub use crate::config::SolverConfig;
    pub use crate::controller::{
        ControllerState, EvaluationMode, IterationController, IterationState, ProgressReport,
        RunReport, StencilKernel, Termination,
    };
    pub use crate::convergence::{residual, ConvergenceEvaluator};
    pub use crate::device::{
        Backend, ComputeDevice, DeviceClass, DeviceInfo, KernelArg, WorkShape,
    };
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{ErrorKind, GridKernelError, Result};
    pub use crate::grid::{Grid, GridShape};
    pub use crate::program::{
        BuildLog, BuildStatus, ConstValue, EntryPointInfo, ProgramSource,
    };
    pub use crate::session::DeviceSession;
}

pub use buffer::BufferPair;
pub use controller::IterationController;
pub use convergence::ConvergenceEvaluator;
pub use device::ComputeDevice;
pub use dispatch::Dispatcher;
pub use error::{GridKernelError, Result};
pub use session::DeviceSession;
