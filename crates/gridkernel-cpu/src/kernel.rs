//! Native kernels and their launch context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};

use gridkernel_core::device::WorkShape;
use gridkernel_core::error::{GridKernelError, Result};

use crate::buffer::CpuBuffer;

/// A native implementation of one WGSL entry point.
pub type NativeKernel = Arc<dyn Fn(&Invocation<'_>) -> Result<()> + Send + Sync>;

/// Arguments and launch geometry seen by a native kernel.
///
/// Buffers are addressed by their position among the buffer arguments, the
/// same order the WGSL bindings `1..` use. Scalars are the packed uniform
/// words, in declaration order.
pub struct Invocation<'a> {
    pub(crate) entry: &'a str,
    pub(crate) buffers: Vec<&'a CpuBuffer>,
    pub(crate) scalars: Vec<u32>,
    pub(crate) global: WorkShape,
    pub(crate) local: WorkShape,
}

impl<'a> Invocation<'a> {
    /// Entry point being executed.
    pub fn entry(&self) -> &str {
        self.entry
    }

    /// Global index space.
    pub fn global(&self) -> WorkShape {
        self.global
    }

    /// Work-group shape.
    pub fn local(&self) -> WorkShape {
        self.local
    }

    fn buffer(&self, index: usize) -> Result<&'a CpuBuffer> {
        self.buffers.get(index).copied().ok_or_else(|| {
            GridKernelError::LaunchFailed(format!(
                "'{}' expects a buffer argument at position {}, got {}",
                self.entry,
                index,
                self.buffers.len()
            ))
        })
    }

    /// Read-only typed view of buffer argument `index`.
    pub fn read<T: bytemuck::Pod>(&self, index: usize) -> Result<MappedRwLockReadGuard<'a, [T]>> {
        self.buffer(index)?.view()
    }

    /// Writable typed view of buffer argument `index`.
    pub fn write<T: bytemuck::Pod>(&self, index: usize) -> Result<MappedRwLockWriteGuard<'a, [T]>> {
        self.buffer(index)?.view_mut()
    }

    /// Scalar argument `index` as `u32`.
    pub fn u32(&self, index: usize) -> Result<u32> {
        self.scalars.get(index).copied().ok_or_else(|| {
            GridKernelError::LaunchFailed(format!(
                "'{}' expects a scalar argument at position {}",
                self.entry, index
            ))
        })
    }

    /// Scalar argument `index` as `i32`.
    pub fn i32(&self, index: usize) -> Result<i32> {
        self.u32(index).map(|w| w as i32)
    }

    /// Scalar argument `index` as `f32`.
    pub fn f32(&self, index: usize) -> Result<f32> {
        self.u32(index).map(f32::from_bits)
    }
}

/// Native kernels keyed by entry-point name.
#[derive(Clone, Default)]
pub struct KernelRegistry {
    kernels: HashMap<String, NativeKernel>,
}

impl KernelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the native implementation of `entry`.
    pub fn register<F>(mut self, entry: impl Into<String>, kernel: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.kernels.insert(entry.into(), Arc::new(kernel));
        self
    }

    /// Look up a kernel.
    pub fn get(&self, entry: &str) -> Option<&NativeKernel> {
        self.kernels.get(entry)
    }

    /// Registered entry-point names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// True if no kernels are registered.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("KernelRegistry")
            .field("kernels", &names)
            .finish()
    }
}
