//! CLI command implementations.

pub mod cfd;
pub mod devices;
pub mod pi;
pub mod primes;

use std::path::Path;

use clap::ValueEnum;
use colored::Colorize;

use gridkernel_core::device::{ComputeDevice, DeviceClass};
use gridkernel_core::program::{BuildLog, ProgramSource};
use gridkernel_core::session::DeviceSession;
use gridkernel_cpu::CpuDevice;
use gridkernel_wgpu::WgpuDevice;
use gridkernel_workloads::{cpu_device, LaunchConfig};

use crate::error::CliResult;

/// Which device to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendChoice {
    /// First GPU adapter, falling back to the host CPU.
    #[default]
    Auto,
    /// A GPU adapter; fail when none is present.
    Gpu,
    /// The host CPU.
    Cpu,
}

/// A device from either backend.
pub enum AnyDevice {
    /// WebGPU adapter.
    Wgpu(WgpuDevice),
    /// Host CPU.
    Cpu(CpuDevice),
}

/// Open a device for `choice`.
pub async fn select_device(choice: BackendChoice) -> CliResult<AnyDevice> {
    match choice {
        BackendChoice::Gpu => Ok(AnyDevice::Wgpu(WgpuDevice::new(DeviceClass::Gpu).await?)),
        BackendChoice::Cpu => Ok(AnyDevice::Cpu(cpu_device()?)),
        BackendChoice::Auto => match WgpuDevice::new(DeviceClass::Gpu).await {
            Ok(device) => Ok(AnyDevice::Wgpu(device)),
            Err(e) => {
                tracing::warn!("No GPU adapter ({}); falling back to the host CPU", e);
                Ok(AnyDevice::Cpu(cpu_device()?))
            }
        },
    }
}

/// Build the program for `launch` and open a session on `device`.
pub fn open_session<D: ComputeDevice>(
    device: D,
    source: ProgramSource,
) -> CliResult<DeviceSession<D>> {
    let session = DeviceSession::open(device, source)?;
    tracing::info!(
        "Using {} with program '{}' [{}]",
        session.info(),
        session.program_name(),
        session.build_options()
    );
    Ok(session)
}

/// Program for workloads that only need the launch configuration.
pub fn launch_program(launch: &LaunchConfig, kernels: Option<&Path>) -> CliResult<ProgramSource> {
    Ok(launch.program(kernels)?)
}

/// Print a build failure the way a driver build log reads.
pub fn print_build_log(log: &BuildLog) {
    eprintln!("{} {}", "Build Status:".red().bold(), log.status);
    eprintln!("{}\t{}", "Build Options:".bold(), log.options);
    eprintln!("{}\t {}", "Build Log:".bold(), log.log);
}

/// Format a float like C's `%g`: six significant digits, exponent form for
/// very small or large magnitudes, trailing zeros removed.
pub fn general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }

    // The exponent is taken after rounding to six significant digits.
    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs());
    }

    let decimals = (5 - exponent).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
