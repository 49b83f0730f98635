//! Solver configuration.
//!
//! [`SolverConfig`] is passed to the iteration controller at construction. It
//! can be built in code with the `with_*` methods or loaded from TOML:
//!
//! ```toml
//! scale = 2
//! max_iterations = 5000
//! tolerance = 1e-4
//! report_every = 500
//! local = { x = 32, y = 1 }
//! device_reduction = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::WorkShape;
use crate::error::{GridKernelError, Result};

/// Base interior size multiplied by the scale factor.
pub const BASE_INTERIOR: u32 = 32;

/// Default progress-report cadence, in iterations.
pub const DEFAULT_REPORT_EVERY: u64 = 1000;

/// Default stencil work-group shape.
pub const DEFAULT_LOCAL: WorkShape = WorkShape::new(32, 1);

/// Iterative solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    /// Problem scale factor (interior is `32 * scale` square).
    #[serde(default = "default_scale")]
    pub scale: u32,

    /// Maximum number of iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Convergence tolerance on the relative error. Zero disables checking.
    #[serde(default)]
    pub tolerance: f64,

    /// Report progress every this many iterations.
    #[serde(default = "default_report_every")]
    pub report_every: u64,

    /// Stencil work-group shape.
    #[serde(default = "default_local")]
    pub local: WorkShape,

    /// Reduce the residual on the device instead of reading both grids back.
    #[serde(default)]
    pub device_reduction: bool,
}

fn default_scale() -> u32 {
    1
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_report_every() -> u64 {
    DEFAULT_REPORT_EVERY
}

fn default_local() -> WorkShape {
    DEFAULT_LOCAL
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            max_iterations: default_max_iterations(),
            tolerance: 0.0,
            report_every: default_report_every(),
            local: default_local(),
            device_reduction: false,
        }
    }
}

impl SolverConfig {
    /// Set the scale factor.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance (0 disables checking).
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the progress-report cadence.
    pub fn with_report_every(mut self, report_every: u64) -> Self {
        self.report_every = report_every;
        self
    }

    /// Set the stencil work-group shape.
    pub fn with_local(mut self, local: WorkShape) -> Self {
        self.local = local;
        self
    }

    /// Enable or disable device-side residual reduction.
    pub fn with_device_reduction(mut self, enable: bool) -> Self {
        self.device_reduction = enable;
        self
    }

    /// Whether convergence checking is enabled.
    pub fn checks_convergence(&self) -> bool {
        self.tolerance > 0.0
    }

    /// Interior grid edge (`m == n`) for the configured scale.
    pub fn interior(&self) -> u32 {
        BASE_INTERIOR * self.scale
    }

    /// Check every field. Called before any device work.
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(GridKernelError::config("scale must be a positive integer"));
        }
        if self.scale.checked_mul(BASE_INTERIOR).is_none() {
            return Err(GridKernelError::config(format!(
                "scale {} is too large",
                self.scale
            )));
        }
        if self.max_iterations == 0 {
            return Err(GridKernelError::config(
                "number of iterations must be a positive integer",
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(GridKernelError::config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.report_every == 0 {
            return Err(GridKernelError::config("report cadence must be positive"));
        }
        if self.local.is_empty() {
            return Err(GridKernelError::config(format!(
                "local shape {} must be non-zero",
                self.local
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SolverConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(
            "Loaded solver configuration from {}",
            path.as_ref().display()
        );
        Self::from_toml_str(&text)
    }
}
