//! WebGPU implementation of [`ComputeDevice`].

use gridkernel_core::device::{
    buffer_args, pack_scalars, Backend, ComputeDevice, DeviceClass, DeviceInfo, KernelArg,
    WorkShape,
};
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::program::{EntryPointInfo, ProgramSource};

use crate::adapter::{device_class, WgpuAdapter};
use crate::memory::{uniform_buffer, WgpuBuffer};
use crate::shader::{create_bind_group, WgpuProgram};

/// A WebGPU adapter exposed through the device-runtime interface.
pub struct WgpuDevice {
    adapter: WgpuAdapter,
    info: DeviceInfo,
}

impl WgpuDevice {
    /// Open the first adapter of `class`.
    pub async fn new(class: DeviceClass) -> Result<Self> {
        let adapter = WgpuAdapter::new(class).await?;
        let info = DeviceInfo {
            name: adapter.name().to_string(),
            backend: Backend::Wgpu,
            class: device_class(adapter.info().device_type),
        };
        Ok(Self { adapter, info })
    }

    /// The underlying adapter.
    pub fn adapter(&self) -> &WgpuAdapter {
        &self.adapter
    }
}

impl ComputeDevice for WgpuDevice {
    type Buffer = WgpuBuffer;
    type Program = WgpuProgram;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_program(&self, source: &ProgramSource) -> Result<WgpuProgram> {
        WgpuProgram::build(&self.adapter, source)
    }

    fn entry_points<'p>(&self, program: &'p WgpuProgram) -> &'p [EntryPointInfo] {
        program.entry_points()
    }

    fn create_buffer(
        &self,
        label: &str,
        size: usize,
        contents: Option<&[u8]>,
    ) -> Result<WgpuBuffer> {
        match contents {
            Some(data) if data.len() == size => {
                WgpuBuffer::new_init(&self.adapter, data, Some(label))
            }
            Some(data) => {
                let buffer = WgpuBuffer::new(&self.adapter, size, Some(label))?;
                buffer.copy_from_host(data)?;
                Ok(buffer)
            }
            None => WgpuBuffer::new(&self.adapter, size, Some(label)),
        }
    }

    fn buffer_size(&self, buffer: &WgpuBuffer) -> usize {
        buffer.size()
    }

    fn write_buffer(&self, buffer: &WgpuBuffer, data: &[u8]) -> Result<()> {
        buffer.copy_from_host(data)
    }

    fn read_buffer(&self, buffer: &WgpuBuffer, data: &mut [u8]) -> Result<()> {
        buffer.copy_to_host(data)
    }

    fn enqueue_kernel(
        &self,
        program: &WgpuProgram,
        entry: &str,
        args: &[KernelArg<'_, WgpuBuffer>],
        global: WorkShape,
        local: WorkShape,
    ) -> Result<()> {
        let pipeline = program
            .pipeline(entry)
            .ok_or_else(|| GridKernelError::KernelNotFound(entry.to_string()))?;

        let groups = global.groups(local)?;
        let max_groups = self.adapter.limits().max_compute_workgroups_per_dimension;
        if groups.x > max_groups || groups.y > max_groups {
            return Err(GridKernelError::LaunchFailed(format!(
                "'{}' needs {} work groups, device allows {} per dimension",
                entry, groups, max_groups
            )));
        }

        let device = self.adapter.device();
        let words = pack_scalars(args);
        let scalars = (!words.is_empty()).then(|| uniform_buffer(&self.adapter, &words));
        let buffers: Vec<&wgpu::Buffer> = buffer_args(args)
            .into_iter()
            .map(WgpuBuffer::inner)
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layout = pipeline.get_bind_group_layout(0);
        let bind_group = create_bind_group(device, &layout, scalars.as_ref(), &buffers);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(entry),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(entry),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.x, groups.y, 1);
        }
        self.adapter.queue().submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GridKernelError::LaunchFailed(format!("'{}': {}", entry, error)));
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.adapter.wait_idle();
        Ok(())
    }
}
