//! In-memory device used by the unit tests of this crate.

use parking_lot::{Mutex, RwLock};

use crate::device::{
    buffer_args, pack_scalars, Backend, ComputeDevice, DeviceClass, DeviceInfo, KernelArg,
    WorkShape,
};
use crate::error::{GridKernelError, Result};
use crate::program::{compile_front_end, ConstValue, EntryPointInfo, ProgramSource};

const MOCK_WGSL: &str = r#"
struct Params {
    m: u32,
    n: u32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> psi: array<f32>;
@group(0) @binding(2) var<storage, read_write> psi_new: array<f32>;
@group(0) @binding(3) var<storage, read_write> partials: array<f32>;

@compute @workgroup_size(WG_X, WG_Y)
fn jacobi_step(@builtin(global_invocation_id) id: vec3<u32>) {
    let stride = params.n + 2u;
    let idx = (id.y + 1u) * stride + id.x + 1u;
    psi_new[idx] = 0.25 * (psi[idx - 1u] + psi[idx + 1u] + psi[idx - stride] + psi[idx + stride]);
}

@compute @workgroup_size(WG_ROWS)
fn residual_rows(@builtin(global_invocation_id) id: vec3<u32>) {
    let stride = params.n + 2u;
    var acc: f32 = 0.0;
    for (var j = 1u; j <= params.n; j = j + 1u) {
        let idx = (id.x + 1u) * stride + j;
        let d = psi_new[idx] - psi[idx];
        acc = acc + d * d;
    }
    partials[id.x] = acc;
}
"#;

/// Mock program: 2x2 stencil work-groups, 2-row reduction work-groups.
pub fn mock_source() -> ProgramSource {
    ProgramSource::new("mock.wgsl", MOCK_WGSL)
        .with_workgroup(WorkShape::new(2, 2))
        .define("WG_ROWS", ConstValue::U32(2))
}

/// A recorded device interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Alloc { id: usize, size: usize },
    Write { id: usize },
    Read { id: usize },
    Enqueue { entry: String, buffers: Vec<usize> },
    Finish,
}

pub struct MockBuffer {
    id: usize,
    bytes: RwLock<Vec<u8>>,
}

pub struct MockDevice {
    info: DeviceInfo,
    events: Mutex<Vec<Event>>,
    next_id: Mutex<usize>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "mock".to_string(),
                backend: Backend::Cpu,
                class: DeviceClass::Cpu,
            },
            events: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Buffer ids of every enqueue of `entry`, in order.
    pub fn launches(&self, entry: &str) -> Vec<Vec<usize>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Enqueue { entry: name, buffers } if name == entry => Some(buffers.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Event::Read { .. }))
            .count()
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn floats(buffer: &MockBuffer) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(&buffer.bytes.read()[..])
}

fn store(buffer: &MockBuffer, values: &[f32]) {
    buffer
        .bytes
        .write()
        .copy_from_slice(bytemuck::cast_slice(values));
}

impl ComputeDevice for MockDevice {
    type Buffer = MockBuffer;
    type Program = Vec<EntryPointInfo>;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_program(&self, source: &ProgramSource) -> Result<Self::Program> {
        Ok(compile_front_end(source)?.entry_points)
    }

    fn entry_points<'p>(&self, program: &'p Self::Program) -> &'p [EntryPointInfo] {
        program
    }

    fn create_buffer(
        &self,
        _label: &str,
        size: usize,
        contents: Option<&[u8]>,
    ) -> Result<MockBuffer> {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next - 1
        };
        self.record(Event::Alloc { id, size });
        let bytes = match contents {
            Some(data) => data.to_vec(),
            None => vec![0; size],
        };
        Ok(MockBuffer {
            id,
            bytes: RwLock::new(bytes),
        })
    }

    fn buffer_size(&self, buffer: &MockBuffer) -> usize {
        buffer.bytes.read().len()
    }

    fn write_buffer(&self, buffer: &MockBuffer, data: &[u8]) -> Result<()> {
        self.record(Event::Write { id: buffer.id });
        buffer.bytes.write()[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &MockBuffer, data: &mut [u8]) -> Result<()> {
        self.record(Event::Read { id: buffer.id });
        let len = data.len();
        data.copy_from_slice(&buffer.bytes.read()[..len]);
        Ok(())
    }

    fn enqueue_kernel(
        &self,
        _program: &Self::Program,
        entry: &str,
        args: &[KernelArg<'_, MockBuffer>],
        global: WorkShape,
        _local: WorkShape,
    ) -> Result<()> {
        let buffers = buffer_args(args);
        let scalars = pack_scalars(args);
        self.record(Event::Enqueue {
            entry: entry.to_string(),
            buffers: buffers.iter().map(|b| b.id).collect(),
        });

        let (m, n) = (scalars[0] as usize, scalars[1] as usize);
        let stride = n + 2;
        match entry {
            "jacobi_step" => {
                let psi = floats(buffers[0]);
                let mut out = floats(buffers[1]);
                for i in 1..=global.y as usize {
                    for j in 1..=global.x as usize {
                        let idx = i * stride + j;
                        out[idx] = 0.25
                            * (psi[idx - 1] + psi[idx + 1] + psi[idx - stride] + psi[idx + stride]);
                    }
                }
                store(buffers[1], &out);
            }
            "residual_rows" => {
                let psi = floats(buffers[0]);
                let psi_new = floats(buffers[1]);
                let mut partials = floats(buffers[2]);
                for (row, slot) in partials.iter_mut().enumerate().take(m) {
                    let base = (row + 1) * stride;
                    *slot = (1..=n)
                        .map(|j| {
                            let d = psi_new[base + j] - psi[base + j];
                            d * d
                        })
                        .sum();
                }
                store(buffers[2], &partials);
            }
            other => return Err(GridKernelError::LaunchFailed(format!("no mock for {}", other))),
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.record(Event::Finish);
        Ok(())
    }
}
