//! # GridKernel Workloads
//!
//! The three workloads that ship with GridKernel, each written against the
//! backend-agnostic [`ComputeDevice`](gridkernel_core::ComputeDevice) seam:
//!
//! - [`primes`] - count the primes in `0..N`
//! - [`pi`] - Monte-Carlo estimate of π
//! - [`cfd`] - Jacobi iteration for the stream function of flow in a box
//!
//! The device program lives in `kernels/kernels.wgsl` and is embedded at
//! compile time. [`native::registry`] provides matching CPU kernels so every
//! workload also runs on [`CpuDevice`](gridkernel_cpu::CpuDevice).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boundary;
pub mod cfd;
pub mod launch;
pub mod native;
pub mod pi;
pub mod primes;

/// Prime-counting entry point.
pub const COUNT_PRIMES: &str = "count_primes";
/// Monte-Carlo π entry point.
pub const ESTIMATE_PI: &str = "estimate_pi";
/// Jacobi stencil entry point.
pub const JACOBI_STEP: &str = "jacobi_step";
/// Per-row residual reduction entry point.
pub const RESIDUAL_ROWS: &str = "residual_rows";

pub use boundary::StreamFunctionBoundary;
pub use cfd::{CfdOutcome, CfdProblem};
pub use launch::{LaunchConfig, KERNELS_NAME, KERNELS_WGSL};
pub use pi::{estimate_pi, PiConfig, PiReport};
pub use primes::{count_primes, PrimeConfig, PrimeReport};

/// A CPU device with every workload kernel registered.
pub fn cpu_device() -> gridkernel_core::Result<gridkernel_cpu::CpuDevice> {
    gridkernel_cpu::CpuDevice::new(native::registry())
}
