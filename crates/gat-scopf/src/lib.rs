//! # gat-scopf: Security-Constrained AC Optimal Power Flow
//!
//! This crate formulates a preventive N-1 security-constrained AC-OPF as one
//! large nonlinear program and hands it to an interior-point engine.
//!
//! ## Problem Structure
//!
//! Every scenario (the nominal topology plus one per contingency) has its own
//! copy of the network state. Decisions that must hold across all scenarios
//! are shared:
//!
//! ```text
//! ┌──────────── scenario 0 ────────────┐   ┌──── scenario ns-1 ────┐ ┌─────── global ───────┐
//! │ Va (all) │ Vm (non-PV) │ Qg │ Pg_ref│ … │ Va │ Vm │ Qg │ Pg_ref │ │ Vm (PV) │ Pg (non-ref)│
//! └────────────────────────────────────┘   └───────────────────────┘ └──────────────────────┘
//! ```
//!
//! PV voltage setpoints and non-reference active dispatch are preventive: the
//! same values must be feasible with and without each outage. The reference
//! generator picks up whatever imbalance the outage causes.
//!
//! ## Constraints
//!
//! Per scenario, in row order:
//!
//! | Rows | Expression | Bounds |
//! |------|------------|--------|
//! | `nb` | active power balance | `[0, 0]` |
//! | `nb` | reactive power balance | `[0, 0]` |
//! | `nc` | `\|Sf\|² - Smax²` | `[-offset, 0]` |
//! | `nc` | `\|St\|² - Smax²` | `[-offset, 0]` |
//!
//! Optional [`LinearConstraints`] rows follow the last scenario.
//!
//! ## Pipeline
//!
//! ```text
//! Network ─► ProblemInstance ─► ScopfNlp (NlpProblem) ─► SolverEngine ─► ScopfOutcome ─► ScopfSolution
//!               │
//!               ├─ VariableLayout      flat index arithmetic
//!               ├─ BoundVector         replicated box bounds
//!               ├─ SparsityPattern     Jacobian / lower-triangular Hessian
//!               └─ Admittances         per-scenario Ybus, Yf, Yt
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use gat_scopf::{Contingency, IpoptEngine, IpoptOptions, ProblemInstance, ScopfConfig, ScopfSolver};
//!
//! let network = gat_core::Network::from_json_file("case.json")?;
//! let contingencies = [Contingency::BranchOutage(3), Contingency::BranchOutage(7)];
//! let instance = ProblemInstance::new(&network, &contingencies, ScopfConfig::default())?;
//!
//! let mut solver = ScopfSolver::new(IpoptEngine::new(IpoptOptions::default()));
//! let outcome = solver.solve(&instance, None)?;
//! println!("success: {}, cost: ${:.2}/hr", outcome.success, outcome.objective);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): evaluate scenarios on the rayon pool
//! - `solver-ipopt`: the [`IpoptEngine`] (needs libipopt at build time)

pub mod bounds;
pub mod config;
pub mod connectivity;
pub mod contingency;
pub mod diagnostics;
pub mod error;
pub mod evaluator;
pub mod grid;
pub mod instance;
pub mod layout;
pub mod linear;
pub mod model;
pub mod nlp;
pub mod solution;
pub mod solver;
pub mod sparsity;
// Fixtures shared with integration tests and downstream crates' tests
#[doc(hidden)]
pub mod test_cases;

pub use bounds::{assemble_bounds, BoundVector, PhysicalBounds};
pub use config::ScopfConfig;
pub use connectivity::Connectivity;
pub use contingency::{Contingency, Scenario, ScenarioSet};
pub use diagnostics::{constraint_violations, verify_gradient, verify_jacobian, DerivativeCheck};
pub use error::ScopfError;
pub use evaluator::ScenarioEvaluator;
pub use grid::GridModel;
pub use instance::{InstanceBuilder, ProblemInstance};
pub use layout::{PhysicalIndex, ScenarioIndexMap, VariableLayout};
pub use linear::LinearConstraints;
pub use model::{AcPolarModel, Admittances, PowerFlowModel, ScenarioResiduals};
pub use nlp::{NlpProblem, ScopfNlp};
pub use solution::ScopfSolution;
pub use solver::{EngineOutput, EngineStatus, IpoptOptions, ScopfOutcome, ScopfSolver, SolverEngine};
pub use sparsity::SparsityPattern;

#[cfg(feature = "solver-ipopt")]
pub use solver::IpoptEngine;
