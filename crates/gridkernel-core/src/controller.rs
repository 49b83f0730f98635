//! Iteration controller.
//!
//! Drives an iterated stencil over a [`BufferPair`]: one dispatch per
//! iteration reading `current` and writing `next`, a convergence evaluation
//! when the policy asks for one, then a role swap. The controller is a small
//! state machine:
//!
//! ```text
//!            step()                 error < tolerance
//! Running ─────────────► Running ───────────────────► Converged
//!                           │
//!                           │ iteration == max_iterations
//!                           ▼
//!                        Exhausted
//! ```
//!
//! Evaluation happens on every iteration when the tolerance is positive,
//! otherwise only on the final one. Roles are swapped exactly once per
//! executed iteration, including the converging one, so `current` always
//! holds the newest grid once the loop stops.

use std::fmt;
use std::time::{Duration, Instant};

use crate::buffer::{BufferPair, Role};
use crate::config::SolverConfig;
use crate::convergence::ConvergenceEvaluator;
use crate::device::{ComputeDevice, KernelArg, WorkShape};
use crate::error::{GridKernelError, Result};
use crate::grid::{Grid, GridShape};
use crate::session::DeviceSession;

/// The stencil entry point and the interior it updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StencilKernel {
    /// Entry point name.
    pub name: String,
    /// Interior rows (`m`).
    pub rows: u32,
    /// Interior columns (`n`).
    pub cols: u32,
}

impl StencilKernel {
    /// Describe a stencil over an `m x n` interior.
    pub fn new(name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            name: name.into(),
            rows,
            cols,
        }
    }

    /// Global index space: one work item per interior cell, `x` along columns.
    pub fn global(&self) -> WorkShape {
        WorkShape::new(self.cols, self.rows)
    }

    /// Full grid shape including the halo.
    pub fn grid_shape(&self) -> GridShape {
        GridShape::from_interior(self.rows as usize, self.cols as usize)
    }
}

/// How the residual is obtained on evaluation iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Read both buffers back and compute the residual on the host.
    #[default]
    HostReadback,
    /// Run a per-row partial reduction on the device and finish it on the host.
    ///
    /// The kernel receives `(current, next, partials, m, n)` over a global
    /// shape of `m x 1`.
    DeviceReduction {
        /// Entry point name.
        kernel: String,
        /// Work-group shape of the reduction kernel.
        local: WorkShape,
    },
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// More iterations may run.
    Running,
    /// The relative error fell below the tolerance.
    Converged,
    /// The iteration limit was reached.
    Exhausted,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The relative error fell below the tolerance.
    Converged,
    /// The iteration limit was reached without converging.
    Exhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "converged"),
            Termination::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Counters and latest results of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationState {
    /// Executed iterations. Zero before the first step.
    pub iteration: u64,
    /// Relative error from the latest evaluation.
    pub last_error: Option<f64>,
    /// Number of evaluations performed.
    pub evaluations: u64,
    /// Number of role swaps performed.
    pub swaps: u64,
    /// Set once the run has stopped.
    pub termination: Option<Termination>,
}

/// Periodic progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Iteration just completed.
    pub iteration: u64,
    /// Relative error, when convergence checking is enabled.
    pub relative_error: Option<f64>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relative_error {
            Some(err) => write!(f, "Completed iteration {}, error = {}", self.iteration, err),
            None => write!(f, "Completed iteration {}", self.iteration),
        }
    }
}

/// Final result of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// How the run ended.
    pub termination: Termination,
    /// Executed iterations.
    pub iterations: u64,
    /// Relative error from the last evaluation.
    pub relative_error: f64,
    /// Wall time spent stepping.
    pub elapsed: Duration,
    /// Mean wall time per iteration.
    pub per_iteration: Duration,
}

struct Reduction<B> {
    kernel: String,
    local: WorkShape,
    partials: B,
}

type Observer<'s> = Box<dyn FnMut(&ProgressReport) + 's>;

/// Runs the stencil loop on a session.
pub struct IterationController<'s, D: ComputeDevice> {
    session: &'s DeviceSession<D>,
    pair: BufferPair<D, f32>,
    stencil: StencilKernel,
    config: SolverConfig,
    evaluator: ConvergenceEvaluator,
    reduction: Option<Reduction<D::Buffer>>,
    state: IterationState,
    host_grid: Grid,
    observer: Option<Observer<'s>>,
    elapsed: Duration,
}

impl<'s, D: ComputeDevice> IterationController<'s, D> {
    /// Prepare a run from an initial grid, evaluating by host readback.
    ///
    /// The configuration, grid shape and launch shape are all checked before
    /// any device memory is allocated. Both ping-pong buffers are seeded with
    /// `initial`, whose norm becomes the error normaliser.
    pub fn new(
        session: &'s DeviceSession<D>,
        initial: &Grid,
        stencil: StencilKernel,
        config: &SolverConfig,
    ) -> Result<Self> {
        Self::with_evaluation(
            session,
            initial,
            stencil,
            config,
            EvaluationMode::HostReadback,
        )
    }

    /// Prepare a run that computes residuals according to `mode`.
    ///
    /// The reduction kernel and its launch shape are validated together with
    /// the stencil, before any device memory is allocated.
    pub fn with_evaluation(
        session: &'s DeviceSession<D>,
        initial: &Grid,
        stencil: StencilKernel,
        config: &SolverConfig,
        mode: EvaluationMode,
    ) -> Result<Self> {
        config.validate()?;

        if initial.shape() != stencil.grid_shape() {
            return Err(GridKernelError::config(format!(
                "initial grid is {}x{}, stencil '{}' expects {}x{}",
                initial.shape().rows,
                initial.shape().cols,
                stencil.name,
                stencil.grid_shape().rows,
                stencil.grid_shape().cols
            )));
        }

        let dispatcher = session.dispatcher();
        dispatcher.validate(&stencil.name, stencil.global(), config.local)?;
        if let EvaluationMode::DeviceReduction { kernel, local } = &mode {
            dispatcher.validate(kernel, WorkShape::linear(stencil.rows), *local)?;
        }

        let evaluator = ConvergenceEvaluator::new(initial.norm())?;
        let pair = session.buffer_pair(initial.shape().len(), Some(initial.as_slice()))?;
        let reduction = match mode {
            EvaluationMode::HostReadback => None,
            EvaluationMode::DeviceReduction { kernel, local } => {
                let partials = session.create_buffer::<f32>(
                    "residual_partials",
                    stencil.rows as usize,
                    None,
                )?;
                Some(Reduction {
                    kernel,
                    local,
                    partials,
                })
            }
        };

        tracing::debug!(
            "Controller ready: {}x{} interior, local {}, tolerance {}, max {} iterations",
            stencil.rows,
            stencil.cols,
            config.local,
            config.tolerance,
            config.max_iterations
        );

        Ok(Self {
            session,
            pair,
            stencil,
            config: config.clone(),
            evaluator,
            reduction,
            state: IterationState::default(),
            host_grid: initial.clone(),
            observer: None,
            elapsed: Duration::ZERO,
        })
    }

    /// Register a progress observer, called every `report_every` iterations.
    pub fn on_progress<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ProgressReport) + 's,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Current state of the state machine.
    pub fn status(&self) -> ControllerState {
        match self.state.termination {
            None => ControllerState::Running,
            Some(Termination::Converged) => ControllerState::Converged,
            Some(Termination::Exhausted) => ControllerState::Exhausted,
        }
    }

    /// Counters and latest error.
    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// The ping-pong buffers.
    pub fn buffers(&self) -> &BufferPair<D, f32> {
        &self.pair
    }

    /// The evaluator, including the boundary norm.
    pub fn evaluator(&self) -> &ConvergenceEvaluator {
        &self.evaluator
    }

    /// Latest grid copied to the host. Refreshed on evaluation iterations.
    pub fn host_grid(&self) -> &Grid {
        &self.host_grid
    }

    /// Read the grid in the `current` role back from the device.
    pub fn current_grid(&self) -> Result<Grid> {
        let data = self.pair.readback(self.session, Role::Current)?;
        Grid::from_vec(self.stencil.grid_shape(), data)
    }

    /// Execute exactly one iteration.
    pub fn step(&mut self) -> Result<ControllerState> {
        if self.state.termination.is_some() {
            return Err(GridKernelError::InvalidState(format!(
                "run already {} after {} iterations",
                self.status_label(),
                self.state.iteration
            )));
        }

        let started = Instant::now();
        let iteration = self.state.iteration + 1;
        let last = iteration == self.config.max_iterations;
        let checking = self.config.checks_convergence();

        self.session.dispatcher().dispatch(
            &self.stencil.name,
            &[
                KernelArg::Buffer(self.pair.buffer(Role::Current)),
                KernelArg::Buffer(self.pair.buffer(Role::Next)),
                KernelArg::U32(self.stencil.rows),
                KernelArg::U32(self.stencil.cols),
            ],
            self.stencil.global(),
            self.config.local,
        )?;

        if checking || last {
            let error = self.evaluate()?;
            self.state.last_error = Some(error);
            self.state.evaluations += 1;
        }

        self.pair.swap();
        self.state.swaps = self.pair.swaps();
        self.state.iteration = iteration;

        let converged = checking
            && self
                .state
                .last_error
                .is_some_and(|error| error < self.config.tolerance);

        if converged {
            tracing::info!("Converged on iteration {}", iteration);
            self.state.termination = Some(Termination::Converged);
        } else if last {
            self.state.termination = Some(Termination::Exhausted);
        }

        if self.state.termination.is_some() && self.reduction.is_some() {
            self.host_grid = self.current_grid()?;
        }

        if !converged && iteration % self.config.report_every == 0 {
            self.report(iteration);
        }

        self.elapsed += started.elapsed();
        Ok(self.status())
    }

    /// Step until the run converges or exhausts its iteration budget.
    pub fn run(&mut self) -> Result<RunReport> {
        while self.status() == ControllerState::Running {
            self.step()?;
        }

        let report = self.summary().ok_or_else(|| {
            GridKernelError::InvalidState("run stopped without a termination".to_string())
        })?;

        tracing::info!(
            "Run {} after {} iterations, error {}, {:?} total",
            report.termination,
            report.iterations,
            report.relative_error,
            report.elapsed
        );
        Ok(report)
    }

    /// Final report, once the run has stopped.
    pub fn summary(&self) -> Option<RunReport> {
        let termination = self.state.termination?;
        let iterations = self.state.iteration;
        let per_iteration = match u32::try_from(iterations) {
            Ok(n) if n > 0 => self.elapsed / n,
            _ => Duration::from_secs_f64(self.elapsed.as_secs_f64() / iterations.max(1) as f64),
        };

        Some(RunReport {
            termination,
            iterations,
            relative_error: self.state.last_error.unwrap_or(f64::NAN),
            elapsed: self.elapsed,
            per_iteration,
        })
    }

    fn evaluate(&mut self) -> Result<f64> {
        match &self.reduction {
            None => {
                let next = self.pair.readback(self.session, Role::Next)?;
                let current = self.pair.readback(self.session, Role::Current)?;
                let error = self.evaluator.relative_error(&next, &current)?;
                self.host_grid = Grid::from_vec(self.stencil.grid_shape(), next)?;
                Ok(error)
            }
            Some(reduction) => {
                self.session.dispatcher().dispatch(
                    &reduction.kernel,
                    &[
                        KernelArg::Buffer(self.pair.buffer(Role::Current)),
                        KernelArg::Buffer(self.pair.buffer(Role::Next)),
                        KernelArg::Buffer(&reduction.partials),
                        KernelArg::U32(self.stencil.rows),
                        KernelArg::U32(self.stencil.cols),
                    ],
                    WorkShape::linear(self.stencil.rows),
                    reduction.local,
                )?;
                let partials: Vec<f32> = self
                    .session
                    .read_buffer(&reduction.partials, self.stencil.rows as usize)?;
                Ok(self.evaluator.relative_from_partials(&partials))
            }
        }
    }

    fn report(&mut self, iteration: u64) {
        let report = ProgressReport {
            iteration,
            relative_error: if self.config.checks_convergence() {
                self.state.last_error
            } else {
                None
            },
        };

        tracing::debug!("{}", report);
        if let Some(observer) = self.observer.as_mut() {
            observer(&report);
        }
    }

    fn status_label(&self) -> &'static str {
        match self.status() {
            ControllerState::Running => "running",
            ControllerState::Converged => "converged",
            ControllerState::Exhausted => "exhausted",
        }
    }
}
