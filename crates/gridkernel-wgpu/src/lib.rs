//! # GridKernel WebGPU Backend
//!
//! [`WgpuDevice`] implements [`ComputeDevice`](gridkernel_core::ComputeDevice)
//! on top of `wgpu`, so kernels run on Vulkan, Metal, DX12 or GL adapters.
//!
//! - Adapter selection by [`DeviceClass`](gridkernel_core::device::DeviceClass)
//! - One compute pipeline per WGSL entry point, built under a validation error scope
//! - Storage buffers with staging-buffer readback
//! - Scalar arguments packed into a uniform block at binding 0

#![warn(missing_docs)]
#![warn(clippy::all)]

mod adapter;
mod device;
mod memory;
mod shader;

pub use adapter::{device_class, enumerate_adapters, is_available, WgpuAdapter, WgpuAdapterInfo};
pub use device::WgpuDevice;
pub use memory::WgpuBuffer;
pub use shader::WgpuProgram;
