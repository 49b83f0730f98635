//! Jacobi solver for the stream function of irrotational flow in a box.

use std::path::Path;

use gridkernel_core::config::SolverConfig;
use gridkernel_core::controller::{
    EvaluationMode, IterationController, ProgressReport, RunReport, StencilKernel,
};
use gridkernel_core::device::ComputeDevice;
use gridkernel_core::error::Result;
use gridkernel_core::grid::Grid;
use gridkernel_core::program::ProgramSource;
use gridkernel_core::session::DeviceSession;

use crate::boundary::StreamFunctionBoundary;
use crate::launch::LaunchConfig;
use crate::{JACOBI_STEP, RESIDUAL_ROWS};

/// Result of a CFD run.
#[derive(Debug, Clone)]
pub struct CfdOutcome {
    /// Termination, counts and timings.
    pub report: RunReport,
    /// The final stream function, halo included.
    pub grid: Grid,
}

/// Everything needed to set up a CFD run.
#[derive(Debug, Clone, Default)]
pub struct CfdProblem {
    /// Solver settings.
    pub solver: SolverConfig,
    /// Work-group shapes compiled into the program.
    pub launch: LaunchConfig,
}

impl CfdProblem {
    /// Problem for `solver`, with the stencil tile taken from `solver.local`.
    pub fn new(solver: SolverConfig) -> Self {
        let launch = LaunchConfig::default().with_stencil(solver.local);
        Self { solver, launch }
    }

    /// Override the launch configuration. The stencil tile still follows
    /// `solver.local`.
    pub fn with_launch(mut self, launch: LaunchConfig) -> Self {
        self.launch = launch.with_stencil(self.solver.local);
        self
    }

    /// Validate the solver and launch settings.
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.launch.validate()
    }

    /// Boundary geometry for the configured scale.
    pub fn boundary(&self) -> Result<StreamFunctionBoundary> {
        StreamFunctionBoundary::for_scale(self.solver.scale)
    }

    /// Program source with this problem's work-group sizes.
    pub fn program(&self, kernels: Option<&Path>) -> Result<ProgramSource> {
        self.validate()?;
        self.launch.program(kernels)
    }

    /// Build a controller over `session`.
    pub fn controller<'s, D: ComputeDevice>(
        &self,
        session: &'s DeviceSession<D>,
    ) -> Result<IterationController<'s, D>> {
        let boundary = self.boundary()?;
        let stencil = StencilKernel::new(JACOBI_STEP, boundary.m, boundary.n);
        let mode = if self.solver.device_reduction {
            EvaluationMode::DeviceReduction {
                kernel: RESIDUAL_ROWS.to_string(),
                local: self.launch.rows_shape(),
            }
        } else {
            EvaluationMode::HostReadback
        };
        IterationController::with_evaluation(
            session,
            &boundary.initial_grid(),
            stencil,
            &self.solver,
            mode,
        )
    }

    /// Run to convergence or exhaustion, reporting progress to `progress`.
    pub fn solve<'s, D, F>(&self, session: &'s DeviceSession<D>, progress: F) -> Result<CfdOutcome>
    where
        D: ComputeDevice,
        F: FnMut(&ProgressReport) + 's,
    {
        let boundary = self.boundary()?;
        tracing::debug!(
            "Running CFD on {} x {} grid on {}",
            boundary.m,
            boundary.n,
            session.info()
        );

        let mut controller = self.controller(session)?.on_progress(progress);
        let report = controller.run()?;
        let grid = controller.current_grid()?;
        Ok(CfdOutcome { report, grid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkernel_core::device::WorkShape;

    #[test]
    fn test_stencil_tile_follows_solver_local() {
        let solver = SolverConfig::default().with_local(WorkShape::new(16, 2));
        let problem = CfdProblem::new(solver).with_launch(LaunchConfig::default().with_rows(8));
        assert_eq!(problem.launch.stencil, WorkShape::new(16, 2));
        assert_eq!(problem.launch.rows, 8);

        let options = problem.program(None).unwrap().build_options();
        assert!(options.starts_with("WG_X=16u WG_Y=2u"));
    }

    #[test]
    fn test_invalid_solver_rejected_before_program() {
        let problem = CfdProblem::new(SolverConfig::default().with_max_iterations(0));
        assert!(problem.program(None).is_err());
    }
}
