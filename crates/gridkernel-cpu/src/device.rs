//! CPU reference implementation of [`ComputeDevice`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use gridkernel_core::device::{
    buffer_args, pack_scalars, Backend, ComputeDevice, DeviceClass, DeviceInfo, KernelArg,
    WorkShape,
};
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::program::{compile_front_end, EntryPointInfo, ProgramSource};

use crate::buffer::CpuBuffer;
use crate::kernel::{Invocation, KernelRegistry, NativeKernel};

/// A program "compiled" for the CPU: the validated entry points bound to
/// their native implementations.
pub struct CpuProgram {
    name: String,
    entry_points: Vec<EntryPointInfo>,
    kernels: HashMap<String, NativeKernel>,
}

impl CpuProgram {
    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Operation counters, mainly for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStats {
    /// Buffers allocated.
    pub allocations: u64,
    /// Kernels executed.
    pub dispatches: u64,
    /// Device-to-host copies.
    pub reads: u64,
    /// Host-to-device copies.
    pub writes: u64,
}

/// Host processor exposed through the device-runtime interface.
///
/// Programs are validated with the WGSL front end, then each entry point is
/// bound to a native kernel from the [`KernelRegistry`]. Kernels run on a
/// dedicated rayon pool. Launches execute synchronously in submission order,
/// so the queue is always drained when `enqueue_kernel` returns.
pub struct CpuDevice {
    info: DeviceInfo,
    registry: KernelRegistry,
    pool: rayon::ThreadPool,
    allocations: AtomicU64,
    dispatches: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl CpuDevice {
    /// Create a CPU device using all available cores.
    pub fn new(registry: KernelRegistry) -> Result<Self> {
        Self::with_threads(registry, 0)
    }

    /// Create a CPU device with `threads` workers (0 = one per core).
    pub fn with_threads(registry: KernelRegistry, threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gridkernel-cpu-{}", i))
            .build()
            .map_err(|e| GridKernelError::BackendError(format!("thread pool: {}", e)))?;

        let info = DeviceInfo {
            name: format!("Host CPU ({} threads)", pool.current_num_threads()),
            backend: Backend::Cpu,
            class: DeviceClass::Cpu,
        };

        info!(
            "Initialized CPU device: {} with {} native kernels",
            info.name,
            registry.len()
        );

        Ok(Self {
            info,
            registry,
            pool,
            allocations: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    /// Create a CPU device if `class` accepts one.
    pub fn select(class: DeviceClass, registry: KernelRegistry) -> Result<Self> {
        if !class.accepts(DeviceClass::Cpu) {
            return Err(GridKernelError::BackendUnavailable(format!(
                "CPU backend cannot serve a '{}' device request",
                class
            )));
        }
        Self::new(registry)
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> CpuStats {
        CpuStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

impl ComputeDevice for CpuDevice {
    type Buffer = CpuBuffer;
    type Program = CpuProgram;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_program(&self, source: &ProgramSource) -> Result<CpuProgram> {
        let reflected = compile_front_end(source)?;

        let mut entry_points = Vec::with_capacity(reflected.entry_points.len());
        let mut kernels = HashMap::new();
        for ep in reflected.entry_points {
            match self.registry.get(&ep.name) {
                Some(kernel) => {
                    kernels.insert(ep.name.clone(), kernel.clone());
                    entry_points.push(ep);
                }
                None => warn!(
                    "Entry point '{}' in '{}' has no native implementation; skipping",
                    ep.name,
                    source.name()
                ),
            }
        }

        debug!(
            "Bound {} entry point(s) of '{}' to native kernels",
            entry_points.len(),
            source.name()
        );

        Ok(CpuProgram {
            name: source.name().to_string(),
            entry_points,
            kernels,
        })
    }

    fn entry_points<'p>(&self, program: &'p CpuProgram) -> &'p [EntryPointInfo] {
        &program.entry_points
    }

    fn create_buffer(
        &self,
        label: &str,
        size: usize,
        contents: Option<&[u8]>,
    ) -> Result<CpuBuffer> {
        let buffer = CpuBuffer::new(label, size)?;
        if let Some(data) = contents {
            buffer.write_bytes(data)?;
        }
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(buffer)
    }

    fn buffer_size(&self, buffer: &CpuBuffer) -> usize {
        buffer.size()
    }

    fn write_buffer(&self, buffer: &CpuBuffer, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        buffer.write_bytes(data)
    }

    fn read_buffer(&self, buffer: &CpuBuffer, data: &mut [u8]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        buffer.read_bytes(data)
    }

    fn enqueue_kernel(
        &self,
        program: &CpuProgram,
        entry: &str,
        args: &[KernelArg<'_, CpuBuffer>],
        global: WorkShape,
        local: WorkShape,
    ) -> Result<()> {
        let kernel = program
            .kernels
            .get(entry)
            .ok_or_else(|| GridKernelError::KernelNotFound(entry.to_string()))?;

        let invocation = Invocation {
            entry,
            buffers: buffer_args(args),
            scalars: pack_scalars(args),
            global,
            local,
        };

        self.dispatches.fetch_add(1, Ordering::Relaxed);
        self.pool.install(|| kernel(&invocation))
    }

    fn finish(&self) -> Result<()> {
        // Launches complete before `enqueue_kernel` returns.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkernel_core::program::ProgramSource;
    use gridkernel_core::DeviceSession;
    use rayon::prelude::*;

    const DOUBLE: &str = r#"
@group(0) @binding(0) var<uniform> factor: f32;
@group(0) @binding(1) var<storage, read> src: array<f32>;
@group(0) @binding(2) var<storage, read_write> dst: array<f32>;

@compute @workgroup_size(4)
fn scale(@builtin(global_invocation_id) id: vec3<u32>) {
    dst[id.x] = src[id.x] * factor;
}

@compute @workgroup_size(4)
fn unsupported(@builtin(global_invocation_id) id: vec3<u32>) {
    dst[id.x] = 0.0;
}
"#;

    fn registry() -> KernelRegistry {
        KernelRegistry::new().register("scale", |inv: &Invocation<'_>| {
            let factor = inv.f32(0)?;
            let input = inv.read::<f32>(0)?;
            let mut output = inv.write::<f32>(1)?;
            output
                .par_iter_mut()
                .zip(input.par_iter())
                .for_each(|(o, &i)| *o = i * factor);
            Ok(())
        })
    }

    fn session() -> DeviceSession<CpuDevice> {
        let device = CpuDevice::with_threads(registry(), 2).unwrap();
        DeviceSession::open(device, ProgramSource::new("double.wgsl", DOUBLE)).unwrap()
    }

    #[test]
    fn test_unbound_entry_points_are_hidden() {
        let session = session();
        let names: Vec<_> = session
            .entry_points()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["scale"]);
        assert!(matches!(
            session.entry_point("unsupported"),
            Err(GridKernelError::KernelNotFound(_))
        ));
    }

    #[test]
    fn test_dispatch_runs_native_kernel() {
        let session = session();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let input = session.create_buffer("in", 8, Some(&data[..])).unwrap();
        let output = session.create_buffer::<f32>("out", 8, None).unwrap();

        session
            .dispatcher()
            .dispatch(
                "scale",
                &[
                    KernelArg::F32(0.5),
                    KernelArg::Buffer(&input),
                    KernelArg::Buffer(&output),
                ],
                WorkShape::linear(8),
                WorkShape::linear(4),
            )
            .unwrap();

        let result: Vec<f32> = session.read_buffer(&output, 8).unwrap();
        assert_eq!(result, vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0]);

        let stats = session.device().stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.dispatches, 1);
        assert_eq!(stats.reads, 1);
    }

    #[test]
    fn test_aliased_buffer_rejected() {
        let session = session();
        let buffer = session.create_buffer::<f32>("both", 4, None).unwrap();

        let err = session
            .dispatcher()
            .dispatch(
                "scale",
                &[
                    KernelArg::F32(2.0),
                    KernelArg::Buffer(&buffer),
                    KernelArg::Buffer(&buffer),
                ],
                WorkShape::linear(4),
                WorkShape::linear(4),
            )
            .unwrap_err();
        assert!(matches!(err, GridKernelError::LaunchFailed(_)));
    }

    #[test]
    fn test_compile_failure_carries_log() {
        let device = CpuDevice::with_threads(registry(), 1).unwrap();
        let err = DeviceSession::open(device, ProgramSource::new("bad.wgsl", "fn scale( {"))
            .err()
            .unwrap();

        let log = err.build_log().unwrap();
        assert_eq!(log.program, "bad.wgsl");
        assert!(!log.log.is_empty());
    }

    #[test]
    fn test_select_respects_class() {
        assert!(CpuDevice::select(DeviceClass::Any, registry()).is_ok());
        assert!(matches!(
            CpuDevice::select(DeviceClass::Gpu, registry()),
            Err(GridKernelError::BackendUnavailable(_))
        ));
    }
}
