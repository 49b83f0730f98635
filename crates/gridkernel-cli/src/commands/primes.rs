//! `gridkernel primes` command - count primes below N.

use std::path::PathBuf;

use clap::Args;

use gridkernel_core::device::ComputeDevice;
use gridkernel_core::program::ProgramSource;
use gridkernel_workloads::{count_primes, LaunchConfig, PrimeConfig};

use super::{general, launch_program, open_session, select_device, AnyDevice, BackendChoice};
use crate::error::CliResult;

/// Arguments of the `primes` command.
#[derive(Args, Debug, Clone)]
pub struct PrimesArgs {
    /// Test the integers 0..COUNT
    #[arg(long, default_value_t = PrimeConfig::default().count)]
    pub count: u32,

    /// Integers tested by each work item
    #[arg(long, default_value_t = PrimeConfig::default().per_item)]
    pub per_item: u32,

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

/// Execute the `primes` command.
pub async fn execute(args: &PrimesArgs) -> CliResult<()> {
    let config = PrimeConfig::default()
        .with_count(args.count)
        .with_per_item(args.per_item);
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
    config: &PrimeConfig,
    launch: &LaunchConfig,
) -> CliResult<()> {
    let session = open_session(device, source)?;
    println!(
        "Counting primes below {} on {}",
        config.count,
        session.info()
    );

    let report = count_primes(&session, config, launch)?;
    println!("Time: {} s", general(report.elapsed.as_secs_f64()));
    println!("Primes found: {}", report.primes);
    Ok(())
}
