//! WebGPU adapter selection.

use std::sync::Arc;

use gridkernel_core::device::DeviceClass;
use gridkernel_core::error::{GridKernelError, Result};

/// Map a wgpu device type onto a [`DeviceClass`].
pub fn device_class(device_type: wgpu::DeviceType) -> DeviceClass {
    match device_type {
        wgpu::DeviceType::Cpu => DeviceClass::Cpu,
        wgpu::DeviceType::DiscreteGpu
        | wgpu::DeviceType::IntegratedGpu
        | wgpu::DeviceType::VirtualGpu
        | wgpu::DeviceType::Other => DeviceClass::Gpu,
    }
}

/// The selected adapter with its device and single queue.
pub struct WgpuAdapter {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl WgpuAdapter {
    /// Open the first adapter of the requested class.
    pub async fn new(class: DeviceClass) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|a| class.accepts(device_class(a.get_info().device_type)))
            .ok_or_else(|| {
                GridKernelError::BackendUnavailable(format!(
                    "No WebGPU adapter of class '{}' found",
                    class
                ))
            })?;

        let info = adapter.get_info();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("GridKernel Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(|e| {
                GridKernelError::BackendError(format!("Failed to create device: {}", e))
            })?;

        tracing::info!(
            "Selected WebGPU adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            info,
            limits,
        })
    }

    /// Adapter name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Adapter information.
    pub fn info(&self) -> &wgpu::AdapterInfo {
        &self.info
    }

    /// Device limits in effect.
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// The wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// The command queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Block until all submitted work has completed.
    pub fn wait_idle(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Information about an available adapter.
#[derive(Debug, Clone)]
pub struct WgpuAdapterInfo {
    /// Adapter name.
    pub name: String,
    /// Graphics API backend (Vulkan, Metal, DX12, GL).
    pub backend: wgpu::Backend,
    /// Device type (discrete GPU, integrated, ...).
    pub device_type: wgpu::DeviceType,
    /// Device class the adapter satisfies.
    pub class: DeviceClass,
}

/// List the adapters visible to every wgpu backend.
pub fn enumerate_adapters() -> Vec<WgpuAdapterInfo> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            WgpuAdapterInfo {
                class: device_class(info.device_type),
                name: info.name,
                backend: info.backend,
                device_type: info.device_type,
            }
        })
        .collect()
}

/// True if at least one adapter of `class` is present.
pub fn is_available(class: DeviceClass) -> bool {
    enumerate_adapters()
        .iter()
        .any(|a| class.accepts(a.class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class_mapping() {
        assert_eq!(
            device_class(wgpu::DeviceType::DiscreteGpu),
            DeviceClass::Gpu
        );
        assert_eq!(
            device_class(wgpu::DeviceType::IntegratedGpu),
            DeviceClass::Gpu
        );
        assert_eq!(device_class(wgpu::DeviceType::Cpu), DeviceClass::Cpu);
    }

    #[tokio::test]
    #[ignore] // May not have GPU in CI
    async fn test_adapter_creation() {
        let adapter = WgpuAdapter::new(DeviceClass::Any).await.unwrap();
        println!("Adapter: {} ({:?})", adapter.name(), adapter.info().backend);
        assert!(adapter.limits().max_compute_workgroups_per_dimension > 0);
    }
}
