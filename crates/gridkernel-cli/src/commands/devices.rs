//! `gridkernel devices` command - list available compute devices.

use colored::Colorize;

use gridkernel_core::device::ComputeDevice;
use gridkernel_wgpu::enumerate_adapters;
use gridkernel_workloads::cpu_device;

use crate::error::CliResult;

/// Execute the `devices` command.
pub async fn execute() -> CliResult<()> {
    let adapters = enumerate_adapters();

    println!("{}:", "WebGPU adapters".bright_white().underline());
    if adapters.is_empty() {
        println!("  {} none found", "•".dimmed());
    }
    for adapter in &adapters {
        println!(
            "  {} {} ({:?}, {:?}) [{}]",
            "•".dimmed(),
            adapter.name.bright_white(),
            adapter.backend,
            adapter.device_type,
            adapter.class.to_string().bright_yellow()
        );
    }

    let cpu = cpu_device()?;
    println!();
    println!("{}:", "Host".bright_white().underline());
    println!("  {} {}", "•".dimmed(), cpu.info());
    Ok(())
}
