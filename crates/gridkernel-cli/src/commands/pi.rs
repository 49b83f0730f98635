//! `gridkernel pi` command - Monte-Carlo estimate of π.

use std::path::PathBuf;

use clap::Args;

use gridkernel_core::device::ComputeDevice;
use gridkernel_core::program::ProgramSource;
use gridkernel_workloads::{estimate_pi, LaunchConfig, PiConfig};

use super::{general, launch_program, open_session, select_device, AnyDevice, BackendChoice};
use crate::error::CliResult;

/// Arguments of the `pi` command.
#[derive(Args, Debug, Clone)]
pub struct PiArgs {
    /// Work items (a multiple of the work-group size)
    #[arg(long, default_value_t = PiConfig::default().items)]
    pub items: u32,

    /// Points drawn per work item
    #[arg(long, default_value_t = PiConfig::default().samples)]
    pub samples: u32,

    /// Random stream seed
    #[arg(long, default_value_t = PiConfig::default().seed)]
    pub seed: u32,

    /// Work-group size
    #[arg(long, default_value_t = LaunchConfig::default().linear)]
    pub local: u32,

    /// Device to run on
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,

    /// Load kernels from this WGSL file instead of the built-in program
    #[arg(long)]
    pub kernels: Option<PathBuf>,
}

/// Execute the `pi` command.
pub async fn execute(args: &PiArgs) -> CliResult<()> {
    let config = PiConfig::default()
        .with_items(args.items)
        .with_samples(args.samples)
        .with_seed(args.seed);
    config.validate()?;
    let launch = LaunchConfig::default().with_linear(args.local);
    let source = launch_program(&launch, args.kernels.as_deref())?;

    match select_device(args.backend).await? {
        AnyDevice::Wgpu(device) => run(device, source, &config, &launch),
        AnyDevice::Cpu(device) => run(device, source, &config, &launch),
    }
}

fn run<D: ComputeDevice>(
    device: D,
    source: ProgramSource,
    config: &PiConfig,
    launch: &LaunchConfig,
) -> CliResult<()> {
    let session = open_session(device, source)?;
    println!(
        "Drawing {} points on {}",
        config.total_samples(),
        session.info()
    );

    let report = estimate_pi(&session, config, launch)?;
    println!("Time: {} s", general(report.elapsed.as_secs_f64()));
    println!(
        "Pi = {:.8} (error {})",
        report.estimate,
        general(report.abs_error())
    );
    Ok(())
}
