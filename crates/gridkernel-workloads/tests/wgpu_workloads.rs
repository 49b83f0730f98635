//! Workloads on a WebGPU adapter, checked against the CPU backend.
//!
//! These tests require GPU hardware.
//! Run with: cargo test -p gridkernel-workloads -- --ignored

use gridkernel_core::prelude::*;
use gridkernel_wgpu::WgpuDevice;
use gridkernel_workloads::{
    count_primes, cpu_device, estimate_pi, CfdProblem, LaunchConfig, PiConfig, PrimeConfig,
};

fn gpu_available() -> bool {
    gridkernel_wgpu::is_available(DeviceClass::Any)
}

#[tokio::test]
#[ignore] // May not have GPU in CI
async fn test_primes_match_cpu() {
    if !gpu_available() {
        eprintln!("Skipping test: WebGPU not available");
        return;
    }

    let launch = LaunchConfig::default();
    let config = PrimeConfig::default().with_count(1 << 20);

    let gpu = WgpuDevice::new(DeviceClass::Any).await.unwrap();
    let gpu_session = DeviceSession::open(gpu, launch.program(None).unwrap()).unwrap();
    let cpu_session =
        DeviceSession::open(cpu_device().unwrap(), launch.program(None).unwrap()).unwrap();

    let on_gpu = count_primes(&gpu_session, &config, &launch).unwrap();
    let on_cpu = count_primes(&cpu_session, &config, &launch).unwrap();
    assert_eq!(on_gpu.primes, on_cpu.primes);
    assert_eq!(on_gpu.primes, 82_025);
}

#[tokio::test]
#[ignore] // May not have GPU in CI
async fn test_pi_hits_match_cpu() {
    if !gpu_available() {
        eprintln!("Skipping test: WebGPU not available");
        return;
    }

    let launch = LaunchConfig::default();
    let config = PiConfig::default().with_items(4096).with_samples(256);

    let gpu = WgpuDevice::new(DeviceClass::Any).await.unwrap();
    let gpu_session = DeviceSession::open(gpu, launch.program(None).unwrap()).unwrap();
    let cpu_session =
        DeviceSession::open(cpu_device().unwrap(), launch.program(None).unwrap()).unwrap();

    let on_gpu = estimate_pi(&gpu_session, &config, &launch).unwrap();
    let on_cpu = estimate_pi(&cpu_session, &config, &launch).unwrap();
    assert_eq!(on_gpu.hits, on_cpu.hits);
}

#[tokio::test]
#[ignore] // May not have GPU in CI
async fn test_cfd_matches_cpu() {
    if !gpu_available() {
        eprintln!("Skipping test: WebGPU not available");
        return;
    }

    let problem = CfdProblem::new(
        SolverConfig::default()
            .with_scale(2)
            .with_max_iterations(200)
            .with_device_reduction(true),
    );

    let gpu = WgpuDevice::new(DeviceClass::Any).await.unwrap();
    let gpu_session = DeviceSession::open(gpu, problem.program(None).unwrap()).unwrap();
    let cpu_session =
        DeviceSession::open(cpu_device().unwrap(), problem.program(None).unwrap()).unwrap();

    let on_gpu = problem.solve(&gpu_session, |_| {}).unwrap();
    let on_cpu = problem.solve(&cpu_session, |_| {}).unwrap();

    assert_eq!(on_gpu.report.iterations, 200);
    for (g, c) in on_gpu.grid.as_slice().iter().zip(on_cpu.grid.as_slice()) {
        assert!((g - c).abs() <= 1e-5 * c.abs().max(1.0));
    }
}
