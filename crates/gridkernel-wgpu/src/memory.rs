//! WebGPU buffers and host transfers.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use gridkernel_core::error::{GridKernelError, Result};

use crate::adapter::WgpuAdapter;

/// A storage buffer that can be copied to and from the host.
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    size: usize,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuBuffer {
    const USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
        .union(wgpu::BufferUsages::COPY_DST)
        .union(wgpu::BufferUsages::COPY_SRC);

    /// Create a zero-initialised storage buffer.
    pub fn new(adapter: &WgpuAdapter, size: usize, label: Option<&str>) -> Result<Self> {
        Self::check_size(adapter, size, label)?;

        let buffer = adapter.device().create_buffer(&wgpu::BufferDescriptor {
            label,
            size: size as u64,
            usage: Self::USAGE,
            mapped_at_creation: false,
        });

        Ok(Self::wrap(adapter, buffer, size))
    }

    /// Create a storage buffer holding `data`.
    pub fn new_init(adapter: &WgpuAdapter, data: &[u8], label: Option<&str>) -> Result<Self> {
        Self::check_size(adapter, data.len(), label)?;

        let buffer = adapter
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label,
                contents: data,
                usage: Self::USAGE,
            });

        Ok(Self::wrap(adapter, buffer, data.len()))
    }

    fn wrap(adapter: &WgpuAdapter, buffer: wgpu::Buffer, size: usize) -> Self {
        Self {
            buffer,
            size,
            device: Arc::clone(adapter.device()),
            queue: Arc::clone(adapter.queue()),
        }
    }

    fn check_size(adapter: &WgpuAdapter, size: usize, label: Option<&str>) -> Result<()> {
        let max = adapter.limits().max_storage_buffer_binding_size as usize;
        if size == 0 || size % wgpu::COPY_BUFFER_ALIGNMENT as usize != 0 || size > max {
            return Err(GridKernelError::AllocationFailed(format!(
                "buffer '{}' of {} bytes (must be a non-zero multiple of {} up to {})",
                label.unwrap_or("unnamed"),
                size,
                wgpu::COPY_BUFFER_ALIGNMENT,
                max
            )));
        }
        Ok(())
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The wgpu buffer.
    pub fn inner(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    fn check_transfer(&self, len: usize) -> Result<()> {
        if len > self.size {
            return Err(GridKernelError::TransferFailed(format!(
                "transfer of {} bytes exceeds buffer size {}",
                len, self.size
            )));
        }
        if len % wgpu::COPY_BUFFER_ALIGNMENT as usize != 0 {
            return Err(GridKernelError::TransferFailed(format!(
                "transfer of {} bytes is not a multiple of {}",
                len,
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }
        Ok(())
    }

    /// Copy host data into the start of the buffer and wait for the write.
    pub fn copy_from_host(&self, data: &[u8]) -> Result<()> {
        self.check_transfer(data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        self.queue.write_buffer(&self.buffer, 0, data);
        self.queue.submit(std::iter::empty());
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Copy the start of the buffer into `data`, blocking until complete.
    pub fn copy_to_host(&self, data: &mut [u8]) -> Result<()> {
        self.check_transfer(data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as u64;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below.
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GridKernelError::TransferFailed(format!("Channel error: {}", e)))?
            .map_err(|e| GridKernelError::TransferFailed(format!("Map error: {}", e)))?;

        {
            let mapped = slice.get_mapped_range();
            data.copy_from_slice(&mapped);
        }
        staging.unmap();

        Ok(())
    }
}

/// Pack scalar words into a uniform buffer.
pub fn uniform_buffer(adapter: &WgpuAdapter, words: &[u32]) -> wgpu::Buffer {
    adapter
        .device()
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Scalars"),
            contents: bytemuck::cast_slice(words),
            usage: wgpu::BufferUsages::UNIFORM,
        })
}
