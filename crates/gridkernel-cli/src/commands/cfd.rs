//! `gridkernel cfd` command - Jacobi solver for flow in a box.

use std::path::PathBuf;

use clap::Args;

use gridkernel_core::config::SolverConfig;
use gridkernel_core::controller::{ProgressReport, Termination};
use gridkernel_core::device::{ComputeDevice, WorkShape};
use gridkernel_core::program::ProgramSource;
use gridkernel_workloads::CfdProblem;

use super::{general, open_session, select_device, AnyDevice, BackendChoice};
use crate::error::{CliError, CliResult};

/// Printed when the positional arguments are missing or surplus.
pub const USAGE: &str = "Usage: gridkernel cfd <scale> <numiter> [tolerance]";

/// Arguments of the `cfd` command.
#[derive(Args, Debug, Clone)]
pub struct CfdArgs {
    /// <SCALE> <NUMITER> [TOLERANCE]; a tolerance of 0 disables checking
    #[arg(value_name = "ARGS", num_args = 0.., allow_negative_numbers = true)]
    pub values: Vec<String>,

    /// Device to run on
    #[arg(long, value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,

    /// Print progress every this many iterations
    #[arg(long)]
    pub report_every: Option<u64>,

    /// Stencil work-group shape, e.g. 32x1 or 16x16
    #[arg(long)]
    pub local: Option<WorkShape>,

    /// Load kernels from this WGSL file instead of the built-in program
    #[arg(long)]
    pub kernels: Option<PathBuf>,

    /// Solver configuration file (TOML); command-line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reduce the residual on the device
    #[arg(long)]
    pub device_reduction: bool,
}

impl CfdArgs {
    /// Merge the file configuration and the command line.
    ///
    /// Returns `None` when the positional argument count is wrong.
    pub fn solver_config(&self) -> CliResult<Option<SolverConfig>> {
        if !(2..=3).contains(&self.values.len()) {
            return Ok(None);
        }

        let mut config = match &self.config {
            Some(path) => SolverConfig::from_file(path)?,
            None => SolverConfig::default(),
        };

        config.scale = parse(&self.values[0], "scale factor")?;
        config.max_iterations = parse(&self.values[1], "number of iterations")?;
        if let Some(text) = self.values.get(2) {
            config.tolerance = parse(text, "tolerance")?;
        }
        if let Some(every) = self.report_every {
            config.report_every = every;
        }
        if let Some(local) = self.local {
            config.local = local;
        }
        if self.device_reduction {
            config.device_reduction = true;
        }

        config.validate()?;
        Ok(Some(config))
    }
}

fn parse<T: std::str::FromStr>(text: &str, what: &str) -> CliResult<T> {
    text.parse()
        .map_err(|_| CliError::Argument(format!("{} '{}' is not a valid number", what, text)))
}

/// Execute the `cfd` command.
pub async fn execute(args: &CfdArgs, quiet: bool) -> CliResult<()> {
    let Some(config) = args.solver_config()? else {
        println!("{}", USAGE);
        return Ok(());
    };

    let problem = CfdProblem::new(config);
    let source = problem.program(args.kernels.as_deref())?;

    if problem.solver.checks_convergence() {
        println!(
            "Scale Factor = {}, iterations = {}, tolerance= {}",
            problem.solver.scale,
            problem.solver.max_iterations,
            general(problem.solver.tolerance)
        );
    } else {
        println!(
            "Scale Factor = {}, iterations = {}",
            problem.solver.scale, problem.solver.max_iterations
        );
    }
    println!("Irrotational flow");

    match select_device(args.backend).await? {
        AnyDevice::Wgpu(device) => run(device, &problem, source, quiet),
        AnyDevice::Cpu(device) => run(device, &problem, source, quiet),
    }
}

fn run<D: ComputeDevice>(
    device: D,
    problem: &CfdProblem,
    source: ProgramSource,
    quiet: bool,
) -> CliResult<()> {
    let session = open_session(device, source)?;
    let boundary = problem.boundary()?;

    println!(
        "Running CFD on {} x {} grid on {}",
        boundary.m,
        boundary.n,
        session.info()
    );
    println!("\nStarting main loop...\n");

    let outcome = problem.solve(&session, |report| {
        if !quiet {
            println!("{}", progress_line(report));
        }
    })?;
    let report = outcome.report;

    if report.termination == Termination::Converged {
        println!("Converged on iteration {}", report.iterations);
    }

    println!("\n... finished");
    println!(
        "After {} iterations, the error is {}",
        report.iterations,
        general(report.relative_error)
    );
    println!(
        "Time for {} iterations was {} seconds",
        report.iterations,
        general(report.elapsed.as_secs_f64())
    );
    println!(
        "Each iteration took {} seconds",
        general(report.per_iteration.as_secs_f64())
    );
    Ok(())
}

fn progress_line(report: &ProgressReport) -> String {
    match report.relative_error {
        Some(error) => format!(
            "Completed iteration {}, error = {}",
            report.iteration,
            general(error)
        ),
        None => format!("Completed iteration {}", report.iteration),
    }
}
