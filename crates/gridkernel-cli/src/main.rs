//! GridKernel CLI - run the bundled workloads on a GPU or the host CPU.
//!
//! # Commands
//!
//! - `gridkernel cfd <scale> <numiter> [tolerance]` - Jacobi flow solver
//! - `gridkernel primes` - Count primes below N
//! - `gridkernel pi` - Monte-Carlo estimate of π
//! - `gridkernel devices` - List compute devices
//!
//! # Examples
//!
//! ```bash
//! # 64 x 64 grid, 5000 iterations, stop once the error is below 1e-4
//! gridkernel cfd 2 5000 1e-4
//!
//! # Same run on the CPU with the residual reduced on the device
//! gridkernel cfd 2 5000 1e-4 --backend cpu --device-reduction
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::{cfd, devices, pi, primes, print_build_log};
use error::CliError;

/// GridKernel - host orchestration for grid workloads on compute devices
#[derive(Parser)]
#[command(name = "gridkernel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve for the stream function of flow in a box
    Cfd(cfd::CfdArgs),

    /// Count the primes in 0..N
    Primes(primes::PrimesArgs),

    /// Estimate π by Monte-Carlo sampling
    Pi(pi::PiArgs),

    /// List compute devices
    Devices,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Cfd(args) => cfd::execute(args, cli.quiet).await,
        Commands::Primes(args) => primes::execute(args).await,
        Commands::Pi(args) => pi::execute(args).await,
        Commands::Devices => devices::execute().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let CliError::Runtime(runtime) = &e {
                if let Some(log) = runtime.build_log() {
                    print_build_log(log);
                }
            }
            eprintln!("{} {}", e.label().red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
