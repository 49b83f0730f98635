//! Counting primes in a sequence of integers on the device.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use gridkernel_core::device::{ComputeDevice, KernelArg, WorkShape};
use gridkernel_core::error::{GridKernelError, Result};
use gridkernel_core::session::DeviceSession;

use crate::launch::LaunchConfig;
use crate::COUNT_PRIMES;

/// Prime-counting workload settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrimeConfig {
    /// Length of the sequence `0..count`.
    pub count: u32,
    /// Numbers tested by each work item.
    pub per_item: u32,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        Self {
            count: 1 << 24,
            per_item: 16,
        }
    }
}

impl PrimeConfig {
    /// Set the sequence length.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Set the numbers per work item.
    pub fn with_per_item(mut self, per_item: u32) -> Self {
        self.per_item = per_item;
        self
    }

    /// Reject empty sequences and zero batch sizes.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(GridKernelError::config("prime count must be positive"));
        }
        if self.per_item == 0 {
            return Err(GridKernelError::config("numbers per item must be positive"));
        }
        Ok(())
    }

    /// Global shape: enough items to cover the sequence, padded to whole groups.
    pub fn global(&self, local: WorkShape) -> Result<WorkShape> {
        self.validate()?;
        let items = self.count.div_ceil(self.per_item);
        let padded = items.div_ceil(local.x).checked_mul(local.x).ok_or_else(|| {
            GridKernelError::config(format!("{} items overflow the launch range", items))
        })?;
        Ok(WorkShape::linear(padded))
    }
}

/// Result of a prime count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimeReport {
    /// Primes found in `0..count`.
    pub primes: u32,
    /// Numbers tested.
    pub count: u32,
    /// Wall time including transfers.
    pub elapsed: Duration,
}

/// Count the primes in `0..config.count` on `session`.
pub fn count_primes<D: ComputeDevice>(
    session: &DeviceSession<D>,
    config: &PrimeConfig,
    launch: &LaunchConfig,
) -> Result<PrimeReport> {
    let local = launch.linear_shape();
    let global = config.global(local)?;
    let started = Instant::now();

    let sequence: Vec<u32> = (0..config.count).collect();
    let sequence_buf =
        session.create_buffer("prime_sequence", sequence.len(), Some(&sequence[..]))?;
    let total_buf = session.create_buffer("prime_total", 1, Some(&[0u32][..]))?;

    tracing::info!(
        "Counting primes below {} with {} work items",
        config.count,
        global.volume()
    );

    session.dispatcher().dispatch(
        COUNT_PRIMES,
        &[
            KernelArg::U32(config.count),
            KernelArg::U32(config.per_item),
            KernelArg::Buffer(&sequence_buf),
            KernelArg::Buffer(&total_buf),
        ],
        global,
        local,
    )?;

    let total: Vec<u32> = session.read_buffer(&total_buf, 1)?;
    let primes = total.first().copied().ok_or_else(|| {
        GridKernelError::TransferFailed("prime total came back empty".to_string())
    })?;

    Ok(PrimeReport {
        primes,
        count: config.count,
        elapsed: started.elapsed(),
    })
}
