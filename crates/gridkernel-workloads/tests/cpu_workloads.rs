//! End-to-end tests of the workloads on the CPU backend.

use std::sync::Arc;

use gridkernel_core::prelude::*;
use gridkernel_cpu::CpuDevice;
use gridkernel_workloads::native;
use gridkernel_workloads::{
    count_primes, estimate_pi, CfdProblem, LaunchConfig, PiConfig, PrimeConfig,
    StreamFunctionBoundary, JACOBI_STEP, KERNELS_WGSL,
};

fn device() -> Arc<CpuDevice> {
    let device = CpuDevice::with_threads(native::registry(), 2)
        .expect("Failed to create CPU device");
    Arc::new(device)
}

fn open(device: Arc<CpuDevice>, launch: &LaunchConfig) -> DeviceSession<Arc<CpuDevice>> {
    let source = launch.program(None).expect("Failed to load program");
    DeviceSession::open(device, source).expect("Failed to build program")
}

/// Host reference for one Jacobi sweep over the interior.
fn jacobi_reference(grid: &[f32], m: usize, n: usize) -> Vec<f32> {
    let stride = n + 2;
    let mut out = grid.to_vec();
    for i in 1..=m {
        for j in 1..=n {
            let idx = i * stride + j;
            out[idx] =
                0.25 * (grid[idx - 1] + grid[idx + 1] + grid[idx - stride] + grid[idx + stride]);
        }
    }
    out
}

fn small_grid() -> Grid {
    let shape = GridShape::from_interior(4, 4);
    let mut grid = Grid::zeros(shape);
    for col in 0..shape.cols {
        grid.set(0, col, 1.0);
    }
    for row in 0..shape.rows {
        grid.set(row, 0, 2.0);
    }
    grid
}

#[test]
fn test_four_by_four_five_iterations() {
    let device = device();
    let launch = LaunchConfig::default()
        .with_stencil(WorkShape::new(2, 2))
        .with_rows(2);
    let session = open(device.clone(), &launch);

    let initial = small_grid();
    let config = SolverConfig::default()
        .with_max_iterations(5)
        .with_local(WorkShape::new(2, 2));
    let mut controller = IterationController::new(
        &session,
        &initial,
        StencilKernel::new(JACOBI_STEP, 4, 4),
        &config,
    )
    .unwrap();

    let before = device.stats();
    let report = controller.run().unwrap();
    let after = device.stats();

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.iterations, 5);
    assert_eq!(controller.state().swaps, 5);
    assert_eq!(controller.state().evaluations, 1);
    assert_eq!(controller.buffers().slot(Role::Current), Slot::B);

    // Five stencil launches, one evaluation reading both buffers.
    assert_eq!(after.dispatches - before.dispatches, 5);
    assert_eq!(after.reads - before.reads, 2);

    let mut expected = initial.as_slice().to_vec();
    for _ in 0..5 {
        expected = jacobi_reference(&expected, 4, 4);
    }
    assert_eq!(controller.current_grid().unwrap().as_slice(), &expected[..]);
    assert_eq!(controller.host_grid().as_slice(), &expected[..]);
}

#[test]
fn test_compile_failure_reports_log_and_allocates_nothing() {
    let device = device();
    let source = ProgramSource::new("broken.wgsl", "@compute @workgroup_size(1) fn broken(");

    let err = DeviceSession::open(device.clone(), source)
        .err()
        .expect("build should fail");

    assert_eq!(err.kind(), ErrorKind::Compile);
    let log = err.build_log().expect("build log");
    assert_eq!(log.status, BuildStatus::Error);
    assert!(!log.log.is_empty());
    assert_eq!(device.stats().allocations, 0);
}

#[test]
fn test_unknown_stencil_kernel() {
    let session = open(device(), &LaunchConfig::default());
    let grid = Grid::zeros(GridShape::from_interior(32, 32));
    let result = IterationController::new(
        &session,
        &grid,
        StencilKernel::new("no_such_kernel", 32, 32),
        &SolverConfig::default(),
    );
    assert!(matches!(result, Err(GridKernelError::KernelNotFound(_))));
}

#[test]
fn test_prime_count_matches_sieve() {
    let launch = LaunchConfig::default().with_linear(64);
    let session = open(device(), &launch);
    let config = PrimeConfig::default().with_count(10_000).with_per_item(16);

    let report = count_primes(&session, &config, &launch).unwrap();

    let mut sieve = vec![true; 10_000];
    sieve[0] = false;
    sieve[1] = false;
    let mut p = 2;
    while p * p < sieve.len() {
        if sieve[p] {
            for q in (p * p..sieve.len()).step_by(p) {
                sieve[q] = false;
            }
        }
        p += 1;
    }
    let expected = sieve.iter().filter(|&&is| is).count() as u32;

    assert_eq!(expected, 1229);
    assert_eq!(report.primes, expected);
    assert_eq!(report.count, 10_000);
}

#[test]
fn test_pi_estimate_within_tolerance() {
    let launch = LaunchConfig::default();
    let session = open(device(), &launch);
    let config = PiConfig::default().with_items(1024).with_samples(4096);

    let report = estimate_pi(&session, &config, &launch).unwrap();

    assert_eq!(report.samples, 1024 * 4096);
    assert!(report.abs_error() < 0.01, "estimate {}", report.estimate);
}

#[test]
fn test_pi_is_reproducible_for_a_seed() {
    let launch = LaunchConfig::default();
    let session = open(device(), &launch);
    let config = PiConfig::default()
        .with_items(256)
        .with_samples(64)
        .with_seed(7);

    let first = estimate_pi(&session, &config, &launch).unwrap();
    let second = estimate_pi(&session, &config, &launch).unwrap();
    assert_eq!(first.hits, second.hits);
}

#[test]
fn test_pi_rejects_partial_group() {
    let launch = LaunchConfig::default();
    let session = open(device(), &launch);
    let config = PiConfig::default().with_items(100);

    let err = estimate_pi(&session, &config, &launch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_device_reduction_matches_host_readback() {
    let solver = SolverConfig::default()
        .with_max_iterations(50)
        .with_tolerance(1e-12);

    let host = CfdProblem::new(solver.clone());
    let session = open(device(), &host.launch);
    let host_run = host.solve(&session, |_| {}).unwrap();

    let reduced = CfdProblem::new(solver.with_device_reduction(true));
    let reduced_run = reduced.solve(&session, |_| {}).unwrap();

    assert_eq!(host_run.report.iterations, reduced_run.report.iterations);
    assert_eq!(host_run.grid.as_slice(), reduced_run.grid.as_slice());

    let a = host_run.report.relative_error;
    let b = reduced_run.report.relative_error;
    assert!((a - b).abs() <= 1e-4 * a.abs(), "host {} device {}", a, b);
}

#[test]
fn test_cfd_converges_and_error_decreases() {
    let solver = SolverConfig::default()
        .with_max_iterations(20_000)
        .with_tolerance(1e-3)
        .with_report_every(10);
    let problem = CfdProblem::new(solver);
    let session = open(device(), &problem.launch);

    let mut errors = Vec::new();
    let outcome = problem
        .solve(&session, |report| {
            if let Some(error) = report.relative_error {
                errors.push(error);
            }
        })
        .unwrap();

    assert_eq!(outcome.report.termination, Termination::Converged);
    assert!(outcome.report.relative_error < 1e-3);
    assert!(errors.len() >= 2);
    assert!(errors.windows(2).all(|w| w[1] <= w[0]));

    // The halo ring is never written.
    let boundary = StreamFunctionBoundary::for_scale(1).unwrap();
    assert_eq!(outcome.grid.get(33, 1), boundary.value(33, 1));
    assert_eq!(outcome.grid.get(20, 0), boundary.value(20, 0));
}

#[test]
fn test_tolerance_zero_runs_every_iteration() {
    let problem = CfdProblem::new(SolverConfig::default().with_max_iterations(7));
    let session = open(device(), &problem.launch);
    let outcome = problem.solve(&session, |_| {}).unwrap();

    assert_eq!(outcome.report.termination, Termination::Exhausted);
    assert_eq!(outcome.report.iterations, 7);
    assert!(outcome.report.relative_error.is_finite());
}

#[test]
fn test_config_and_kernels_from_files() {
    let dir = tempfile::tempdir().unwrap();

    let config_path = dir.path().join("cfd.toml");
    std::fs::write(
        &config_path,
        "scale = 1\nmax_iterations = 3\nlocal = { x = 16, y = 2 }\n",
    )
    .unwrap();
    let kernels_path = dir.path().join("custom.wgsl");
    std::fs::write(&kernels_path, KERNELS_WGSL).unwrap();

    let solver = SolverConfig::from_file(&config_path).unwrap();
    assert_eq!(solver.local, WorkShape::new(16, 2));

    let problem = CfdProblem::new(solver);
    let source = problem.program(Some(kernels_path.as_path())).unwrap();
    assert_eq!(source.name(), "custom.wgsl");

    let session = DeviceSession::open(device(), source).unwrap();
    assert_eq!(session.program_name(), "custom.wgsl");
    let outcome = problem.solve(&session, |_| {}).unwrap();
    assert_eq!(outcome.report.iterations, 3);
}

#[test]
fn test_unknown_config_key_rejected() {
    let err = SolverConfig::from_toml_str("scale = 1\nunknown = true\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
