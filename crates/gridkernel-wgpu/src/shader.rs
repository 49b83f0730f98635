//! Shader compilation and pipeline management.

use std::collections::HashMap;

use gridkernel_core::error::Result;
use gridkernel_core::program::{compile_front_end, BuildLog, EntryPointInfo, ProgramSource};

use crate::adapter::WgpuAdapter;

/// A compiled program: one compute pipeline per entry point.
pub struct WgpuProgram {
    name: String,
    entry_points: Vec<EntryPointInfo>,
    pipelines: HashMap<String, wgpu::ComputePipeline>,
}

impl WgpuProgram {
    /// Compile `source` for `adapter`.
    ///
    /// The WGSL front end runs first so syntax and validation problems are
    /// reported with source spans. Shader-module and pipeline creation run
    /// inside a validation error scope; anything the driver rejects there is
    /// also returned as a build log.
    pub fn build(adapter: &WgpuAdapter, source: &ProgramSource) -> Result<Self> {
        let reflected = compile_front_end(source)?;
        let device = adapter.device();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.name()),
            source: wgpu::ShaderSource::Wgsl(reflected.source.as_str().into()),
        });

        let pipelines: HashMap<String, wgpu::ComputePipeline> = reflected
            .entry_points
            .iter()
            .map(|ep| {
                let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&ep.name),
                    layout: None,
                    module: &module,
                    entry_point: &ep.name,
                });
                (ep.name.clone(), pipeline)
            })
            .collect();

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(BuildLog::failed(source, error.to_string()).into());
        }

        tracing::debug!(
            "Compiled '{}' into {} compute pipeline(s)",
            source.name(),
            pipelines.len()
        );

        Ok(Self {
            name: source.name().to_string(),
            entry_points: reflected.entry_points,
            pipelines,
        })
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compute entry points.
    pub fn entry_points(&self) -> &[EntryPointInfo] {
        &self.entry_points
    }

    /// Pipeline for an entry point.
    pub fn pipeline(&self, entry: &str) -> Option<&wgpu::ComputePipeline> {
        self.pipelines.get(entry)
    }
}

/// Create a bind group: scalars (if any) at binding 0, buffers from binding 1.
pub fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    scalars: Option<&wgpu::Buffer>,
    buffers: &[&wgpu::Buffer],
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(buffers.len() + 1);
    if let Some(uniform) = scalars {
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        });
    }
    for (i, buffer) in buffers.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: buffer.as_entire_binding(),
        });
    }

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("GridKernel Bind Group"),
        layout,
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkernel_core::device::{DeviceClass, WorkShape};

    const FILL: &str = r#"
@group(0) @binding(1) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(WG_X)
fn fill(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = id.x;
}
"#;

    #[tokio::test]
    #[ignore] // May not have GPU in CI
    async fn test_pipeline_creation() {
        let adapter = WgpuAdapter::new(DeviceClass::Any).await.unwrap();
        let source = ProgramSource::new("fill.wgsl", FILL).with_workgroup(WorkShape::linear(64));
        let program = WgpuProgram::build(&adapter, &source).unwrap();

        assert!(program.pipeline("fill").is_some());
        assert_eq!(program.entry_points()[0].workgroup_size, [64, 1, 1]);
    }
}
