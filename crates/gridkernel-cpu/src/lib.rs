//! # GridKernel CPU Backend
//!
//! A reference [`ComputeDevice`](gridkernel_core::ComputeDevice) that runs on
//! the host. WGSL programs are validated with the same front end the GPU
//! backend uses, and each entry point is executed by a native Rust kernel
//! registered under the same name. Useful for testing and as a fallback when
//! no GPU adapter is present.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod buffer;
mod device;
mod kernel;

pub use buffer::CpuBuffer;
pub use device::{CpuDevice, CpuProgram, CpuStats};
pub use kernel::{Invocation, KernelRegistry, NativeKernel};
