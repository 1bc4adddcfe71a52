//! # Solver Adapter
//!
//! Hands an [`NlpProblem`] to a [`SolverEngine`] and translates what comes
//! back:
//!
//! ```text
//! ProblemInstance ──► ScopfNlp ──► SolverEngine::solve ──► EngineOutput
//!        │                                                      │
//!        └─ default start point / warm start                    ▼
//!                                                          ScopfOutcome
//!                                              (success, x, iterations,
//!                                               raw status, wall time)
//! ```
//!
//! Success means the engine reported an optimal or acceptable point. Any
//! other status still returns the final point, iteration count and raw code
//! so the run can be diagnosed.
//!
//! The IPOPT engine lives behind the `solver-ipopt` feature.

#[cfg(feature = "solver-ipopt")]
mod ipopt;

#[cfg(feature = "solver-ipopt")]
pub use self::ipopt::IpoptEngine;

use crate::instance::ProblemInstance;
use crate::nlp::{NlpProblem, ScopfNlp};
use crate::ScopfError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use web_time::Instant;

/// Engine termination, reduced to what the adapter acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Optimal,
    Acceptable,
    Infeasible,
    MaxIterations,
    Failed,
}

impl EngineStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Optimal | EngineStatus::Acceptable)
    }
}

/// What an engine reports after one run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub status: EngineStatus,
    /// Engine-specific status code
    pub raw_status: i32,
    pub constraint_multipliers: Vec<f64>,
}

pub trait SolverEngine {
    fn name(&self) -> &'static str;

    /// Solve from `x0`. `warm_start` tells the engine that `x0` came from the
    /// caller rather than the default heuristic.
    fn solve(
        &mut self,
        problem: &dyn NlpProblem,
        x0: &[f64],
        warm_start: bool,
    ) -> Result<EngineOutput, ScopfError>;
}

/// IPOPT settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpoptOptions {
    pub max_iter: usize,
    pub tol: f64,
    pub acceptable_tol: f64,
    /// 0 = quiet, 5 = verbose
    pub print_level: i32,
    /// e.g. "mumps" or "ma57"; IPOPT's default when unset
    pub linear_solver: Option<String>,
    pub warm_start_bound_push: f64,
    pub warm_start_bound_frac: f64,
    pub warm_start_slack_bound_push: f64,
}

impl Default for IpoptOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-6,
            acceptable_tol: 1e-4,
            print_level: 0,
            linear_solver: None,
            warm_start_bound_push: 1e-6,
            warm_start_bound_frac: 1e-6,
            warm_start_slack_bound_push: 1e-6,
        }
    }
}

impl IpoptOptions {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_print_level(mut self, level: i32) -> Self {
        self.print_level = level;
        self
    }

    pub fn with_linear_solver(mut self, solver: impl Into<String>) -> Self {
        self.linear_solver = Some(solver.into());
        self
    }
}

/// Result of one SCOPF solve.
#[derive(Debug, Clone)]
pub struct ScopfOutcome {
    pub success: bool,
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub status: EngineStatus,
    pub raw_status: i32,
    pub solve_time: Duration,
    pub constraint_multipliers: Vec<f64>,
}

pub struct ScopfSolver<E> {
    engine: E,
}

impl<E: SolverEngine> ScopfSolver<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Solve `instance`, from `warm_start` when given and from the default
    /// interior point otherwise.
    pub fn solve(
        &mut self,
        instance: &ProblemInstance,
        warm_start: Option<&[f64]>,
    ) -> Result<ScopfOutcome, ScopfError> {
        let nlp = ScopfNlp::new(instance);
        let x0 = match warm_start {
            Some(x) => {
                ScopfError::check_len("warm start", nlp.num_variables(), x.len())?;
                x.to_vec()
            }
            None => nlp.initial_point(),
        };

        info!(
            engine = self.engine.name(),
            n_variables = nlp.num_variables(),
            n_constraints = nlp.num_constraints(),
            warm_start = warm_start.is_some(),
            "starting SCOPF solve"
        );

        let start = Instant::now();
        let out = self.engine.solve(&nlp, &x0, warm_start.is_some())?;
        let solve_time = start.elapsed();

        ScopfError::check_len("engine solution", nlp.num_variables(), out.x.len())?;
        let success = out.status.is_success();
        if success {
            info!(
                status = ?out.status,
                objective = out.objective,
                iterations = out.iterations,
                solve_time_ms = solve_time.as_millis() as u64,
                "SCOPF solve converged"
            );
        } else {
            warn!(
                status = ?out.status,
                raw_status = out.raw_status,
                iterations = out.iterations,
                "SCOPF solve did not converge"
            );
        }

        Ok(ScopfOutcome {
            success,
            x: out.x,
            objective: out.objective,
            iterations: out.iterations,
            status: out.status,
            raw_status: out.raw_status,
            solve_time,
            constraint_multipliers: out.constraint_multipliers,
        })
    }
}
