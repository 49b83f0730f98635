//! Device-runtime abstraction.
//!
//! [`ComputeDevice`] is the seam between the orchestration code in this crate
//! and a concrete backend (WebGPU, CPU reference). A backend accepts a single
//! program, allocates fixed-size buffers, copies between host and device,
//! executes a named entry point over a 2-D index space and drains its queue.
//!
//! All operations are blocking from the caller's point of view except
//! [`ComputeDevice::enqueue_kernel`], which may return before the device has
//! finished; [`ComputeDevice::finish`] waits for completion.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GridKernelError, Result};
use crate::program::{EntryPointInfo, ProgramSource};

/// Backend implementation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// CPU reference backend.
    Cpu,
    /// WebGPU backend (Vulkan, Metal, DX12, GL).
    Wgpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Wgpu => write!(f, "wgpu"),
        }
    }
}

/// Class of compute device requested at session open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Parallel compute-capable GPU (discrete, integrated or virtual).
    #[default]
    Gpu,
    /// Host processor.
    Cpu,
    /// Whatever is available first.
    Any,
}

impl DeviceClass {
    /// Whether a device of class `actual` satisfies a request for `self`.
    pub fn accepts(self, actual: DeviceClass) -> bool {
        match self {
            DeviceClass::Any => true,
            requested => requested == actual,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Gpu => write!(f, "gpu"),
            DeviceClass::Cpu => write!(f, "cpu"),
            DeviceClass::Any => write!(f, "any"),
        }
    }
}

/// Description of an opened device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Adapter or host name.
    pub name: String,
    /// Backend serving the device.
    pub backend: Backend,
    /// Device class.
    pub class: DeviceClass,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.backend, self.class)
    }
}

/// A 2-D index-space shape, used for both global and local (work-group) sizes.
///
/// One-dimensional launches use `y == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkShape {
    /// Extent along the fastest-varying dimension.
    pub x: u32,
    /// Extent along the second dimension.
    pub y: u32,
}

impl WorkShape {
    /// Create a 2-D shape.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Create a 1-D shape.
    pub const fn linear(x: u32) -> Self {
        Self { x, y: 1 }
    }

    /// Total number of work items.
    pub fn volume(&self) -> u64 {
        self.x as u64 * self.y as u64
    }

    /// True if any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }

    /// Number of work groups needed to cover `self` with tiles of `local`.
    ///
    /// Fails unless every dimension of `self` is an exact multiple of the
    /// corresponding dimension of `local`.
    pub fn groups(&self, local: WorkShape) -> Result<WorkShape> {
        if self.is_empty() {
            return Err(GridKernelError::config(format!(
                "global shape {} must be non-empty",
                self
            )));
        }
        if local.is_empty() {
            return Err(GridKernelError::config(format!(
                "local shape {} must be non-empty",
                local
            )));
        }
        if self.x % local.x != 0 || self.y % local.y != 0 {
            return Err(GridKernelError::config(format!(
                "global shape {} is not evenly divisible by local shape {}",
                self, local
            )));
        }
        Ok(WorkShape::new(self.x / local.x, self.y / local.y))
    }
}

impl fmt::Display for WorkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for WorkShape {
    type Err = GridKernelError;

    /// Parse `"16x16"`, `"64x1"` or `"256"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| GridKernelError::config(format!("invalid work shape '{}'", s)))
        };

        let shape = match s.split_once(['x', 'X']) {
            Some((x, y)) => WorkShape::new(parse(x)?, parse(y)?),
            None => WorkShape::linear(parse(s)?),
        };

        if shape.is_empty() {
            return Err(GridKernelError::config(format!(
                "work shape '{}' must be non-zero",
                s
            )));
        }
        Ok(shape)
    }
}

/// A positional kernel argument.
///
/// Scalars are bound, in argument order, into a uniform block at binding 0;
/// buffers are bound at bindings 1, 2, ... in argument order.
#[derive(Debug)]
pub enum KernelArg<'a, B> {
    /// A device buffer.
    Buffer(&'a B),
    /// 32-bit unsigned scalar.
    U32(u32),
    /// 32-bit signed scalar.
    I32(i32),
    /// 32-bit float scalar.
    F32(f32),
}

impl<B> Clone for KernelArg<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for KernelArg<'_, B> {}

impl<'a, B> KernelArg<'a, B> {
    /// The raw 32-bit word for a scalar argument.
    pub fn scalar_word(&self) -> Option<u32> {
        match *self {
            KernelArg::Buffer(_) => None,
            KernelArg::U32(v) => Some(v),
            KernelArg::I32(v) => Some(v as u32),
            KernelArg::F32(v) => Some(v.to_bits()),
        }
    }

    /// The buffer for a buffer argument.
    pub fn as_buffer(&self) -> Option<&'a B> {
        match *self {
            KernelArg::Buffer(b) => Some(b),
            _ => None,
        }
    }
}

/// Pack scalar arguments into 32-bit words for a uniform block.
///
/// The result is padded to a multiple of four words (16 bytes), which is the
/// minimum uniform-buffer granularity. Returns an empty vector when there are
/// no scalar arguments.
pub fn pack_scalars<B>(args: &[KernelArg<'_, B>]) -> Vec<u32> {
    let mut words: Vec<u32> = args.iter().filter_map(KernelArg::scalar_word).collect();
    if !words.is_empty() {
        let padded = words.len().div_ceil(4) * 4;
        words.resize(padded, 0);
    }
    words
}

/// Collect the buffer arguments in binding order.
pub fn buffer_args<'a, B>(args: &[KernelArg<'a, B>]) -> Vec<&'a B> {
    args.iter().filter_map(KernelArg::as_buffer).collect()
}

/// A compute device capable of running one compiled program.
///
/// Buffers are opaque, fixed-size allocations whose size in bytes is a
/// multiple of four. Implementations must never resize a buffer once created.
pub trait ComputeDevice: Send + Sync {
    /// Device buffer handle.
    type Buffer: Send + Sync;

    /// Compiled program handle.
    type Program: Send + Sync;

    /// Information about the selected device.
    fn info(&self) -> &DeviceInfo;

    /// Compile a program.
    ///
    /// On failure returns [`GridKernelError::CompilationFailed`] carrying the
    /// build status, options and full log.
    fn build_program(&self, source: &ProgramSource) -> Result<Self::Program>;

    /// Compute entry points available in a compiled program.
    fn entry_points<'p>(&self, program: &'p Self::Program) -> &'p [EntryPointInfo];

    /// Allocate a buffer of `size` bytes, optionally seeded from host memory.
    fn create_buffer(&self, label: &str, size: usize, contents: Option<&[u8]>)
        -> Result<Self::Buffer>;

    /// Size of a buffer in bytes.
    fn buffer_size(&self, buffer: &Self::Buffer) -> usize;

    /// Blocking host-to-device copy into the start of `buffer`.
    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> Result<()>;

    /// Blocking device-to-host copy from the start of `buffer`.
    fn read_buffer(&self, buffer: &Self::Buffer, data: &mut [u8]) -> Result<()>;

    /// Enqueue one execution of `entry` over `global`, tiled by `local`.
    fn enqueue_kernel(
        &self,
        program: &Self::Program,
        entry: &str,
        args: &[KernelArg<'_, Self::Buffer>],
        global: WorkShape,
        local: WorkShape,
    ) -> Result<()>;

    /// Wait until every enqueued command has completed.
    fn finish(&self) -> Result<()>;
}

impl<D: ComputeDevice> ComputeDevice for Arc<D> {
    type Buffer = D::Buffer;
    type Program = D::Program;

    fn info(&self) -> &DeviceInfo {
        (**self).info()
    }

    fn build_program(&self, source: &ProgramSource) -> Result<Self::Program> {
        (**self).build_program(source)
    }

    fn entry_points<'p>(&self, program: &'p Self::Program) -> &'p [EntryPointInfo] {
        (**self).entry_points(program)
    }

    fn create_buffer(
        &self,
        label: &str,
        size: usize,
        contents: Option<&[u8]>,
    ) -> Result<Self::Buffer> {
        (**self).create_buffer(label, size, contents)
    }

    fn buffer_size(&self, buffer: &Self::Buffer) -> usize {
        (**self).buffer_size(buffer)
    }

    fn write_buffer(&self, buffer: &Self::Buffer, data: &[u8]) -> Result<()> {
        (**self).write_buffer(buffer, data)
    }

    fn read_buffer(&self, buffer: &Self::Buffer, data: &mut [u8]) -> Result<()> {
        (**self).read_buffer(buffer, data)
    }

    fn enqueue_kernel(
        &self,
        program: &Self::Program,
        entry: &str,
        args: &[KernelArg<'_, Self::Buffer>],
        global: WorkShape,
        local: WorkShape,
    ) -> Result<()> {
        (**self).enqueue_kernel(program, entry, args, global, local)
    }

    fn finish(&self) -> Result<()> {
        (**self).finish()
    }
}
