//! Work-group configuration shared by every workload.

use std::path::Path;

use serde::{Deserialize, Serialize};

use gridkernel_core::config::DEFAULT_LOCAL;
use gridkernel_core::device::WorkShape;
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::program::{ConstValue, ProgramSource};

/// The device program shipped with the crate.
pub const KERNELS_WGSL: &str = include_str!("../kernels/kernels.wgsl");

/// Name reported for the embedded program.
pub const KERNELS_NAME: &str = "kernels.wgsl";

/// Work-group shapes compiled into the program.
///
/// WGSL fixes work-group sizes at compile time, so every launch shape is a
/// build option. One program serves all workloads, so all shapes are
/// defined even when a workload only uses one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchConfig {
    /// Stencil tile (`WG_X`, `WG_Y`).
    pub stencil: WorkShape,
    /// Rows per group in the residual reduction (`WG_ROWS`).
    pub rows: u32,
    /// Group size of 1-D kernels (`WG_LINEAR`).
    pub linear: u32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            stencil: DEFAULT_LOCAL,
            rows: 32,
            linear: 256,
        }
    }
}

impl LaunchConfig {
    /// Set the stencil tile.
    pub fn with_stencil(mut self, stencil: WorkShape) -> Self {
        self.stencil = stencil;
        self
    }

    /// Set the reduction group size.
    pub fn with_rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    /// Set the 1-D group size.
    pub fn with_linear(mut self, linear: u32) -> Self {
        self.linear = linear;
        self
    }

    /// Reduction work-group shape.
    pub fn rows_shape(&self) -> WorkShape {
        WorkShape::linear(self.rows)
    }

    /// 1-D work-group shape.
    pub fn linear_shape(&self) -> WorkShape {
        WorkShape::linear(self.linear)
    }

    /// Reject zero-sized groups.
    pub fn validate(&self) -> Result<()> {
        if self.stencil.is_empty() || self.rows == 0 || self.linear == 0 {
            return Err(GridKernelError::config(format!(
                "work-group sizes must be non-zero (stencil {}, rows {}, linear {})",
                self.stencil, self.rows, self.linear
            )));
        }
        Ok(())
    }

    /// Attach the work-group constants to a program.
    pub fn apply(&self, source: ProgramSource) -> ProgramSource {
        source
            .with_workgroup(self.stencil)
            .define("WG_ROWS", ConstValue::U32(self.rows))
            .define("WG_LINEAR", ConstValue::U32(self.linear))
    }

    /// The embedded program, or the file at `path` when given.
    pub fn program(&self, path: Option<&Path>) -> Result<ProgramSource> {
        self.validate()?;
        let source = match path {
            Some(path) => ProgramSource::from_file(path)?,
            None => ProgramSource::new(KERNELS_NAME, KERNELS_WGSL),
        };
        Ok(self.apply(source))
    }
}
