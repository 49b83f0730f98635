//! Monte-Carlo estimate of π.
//!
//! Each work item draws `samples` points in the unit square from a
//! counter-based hash and records how many fall inside the quarter circle.
//! The host sums the per-item counts.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use gridkernel_core::device::{ComputeDevice, KernelArg, WorkShape};
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::session::DeviceSession;

use crate::launch::LaunchConfig;
use crate::ESTIMATE_PI;

/// Monte-Carlo workload settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PiConfig {
    /// Work items, a multiple of the 1-D group size.
    pub items: u32,
    /// Points drawn per work item.
    pub samples: u32,
    /// Stream seed.
    pub seed: u32,
}

impl Default for PiConfig {
    fn default() -> Self {
        Self {
            items: 1 << 16,
            samples: 1 << 10,
            seed: 0x5eed,
        }
    }
}

impl PiConfig {
    /// Set the number of work items.
    pub fn with_items(mut self, items: u32) -> Self {
        self.items = items;
        self
    }

    /// Set the samples per item.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Total number of points drawn.
    pub fn total_samples(&self) -> u64 {
        u64::from(self.items) * u64::from(self.samples)
    }

    /// Reject empty runs.
    pub fn validate(&self) -> Result<()> {
        if self.items == 0 || self.samples == 0 {
            return Err(GridKernelError::config(format!(
                "items ({}) and samples ({}) must be positive",
                self.items, self.samples
            )));
        }
        Ok(())
    }
}

/// Result of a π estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiReport {
    /// The estimate, `4 * hits / samples`.
    pub estimate: f64,
    /// Points inside the quarter circle.
    pub hits: u64,
    /// Points drawn.
    pub samples: u64,
    /// Wall time including transfers.
    pub elapsed: Duration,
}

impl PiReport {
    /// Absolute distance from π.
    pub fn abs_error(&self) -> f64 {
        (self.estimate - std::f64::consts::PI).abs()
    }
}

/// Estimate π on `session`.
pub fn estimate_pi<D: ComputeDevice>(
    session: &DeviceSession<D>,
    config: &PiConfig,
    launch: &LaunchConfig,
) -> Result<PiReport> {
    config.validate()?;
    let local = launch.linear_shape();
    let global = WorkShape::linear(config.items);
    session.dispatcher().validate(ESTIMATE_PI, global, local)?;

    let started = Instant::now();
    let hits_buf = session.create_buffer::<u32>("pi_hits", config.items as usize, None)?;

    session.dispatcher().dispatch(
        ESTIMATE_PI,
        &[
            KernelArg::U32(config.samples),
            KernelArg::U32(config.seed),
            KernelArg::Buffer(&hits_buf),
        ],
        global,
        local,
    )?;

    let per_item: Vec<u32> = session.read_buffer(&hits_buf, config.items as usize)?;
    let hits: u64 = per_item.iter().map(|&h| u64::from(h)).sum();
    let samples = config.total_samples();
    let estimate = 4.0 * hits as f64 / samples as f64;

    tracing::debug!("{} of {} points inside the quarter circle", hits, samples);

    Ok(PiReport {
        estimate,
        hits,
        samples,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_samples_does_not_overflow() {
        let config = PiConfig::default()
            .with_items(1 << 20)
            .with_samples(1 << 16);
        assert_eq!(config.total_samples(), 1u64 << 36);
    }

    #[test]
    fn test_abs_error() {
        let report = PiReport {
            estimate: 3.0,
            hits: 3,
            samples: 4,
            elapsed: Duration::ZERO,
        };
        assert!((report.abs_error() - 0.141_592_653_589_793).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(PiConfig::default().with_items(0).validate().is_err());
        assert!(PiConfig::default().validate().is_ok());
    }
}
