//! # SCOPF Diagnostics
//!
//! Tools for tracking down convergence problems:
//!
//! - **Derivative verification**: compare the analytical gradient and
//!   Jacobian against central finite differences
//! - **Constraint violation analysis**: the worst violated row per scenario
//!
//! The finite-difference checks evaluate the full constraint vector twice per
//! variable. Use them on small cases.

use crate::instance::ProblemInstance;
use crate::nlp::{NlpProblem, ScopfNlp};
use crate::ScopfError;
use serde::{Deserialize, Serialize};

/// Relative error above which an entry counts as wrong.
const LARGE_ERROR: f64 = 1e-4;

/// Result of comparing analytical derivatives against finite differences.
#[derive(Debug, Clone)]
pub struct DerivativeCheck {
    /// Maximum absolute error across all entries
    pub max_abs_error: f64,
    /// Maximum relative error across all entries
    pub max_rel_error: f64,
    /// `(row, col)` of the entry with the largest relative error
    pub max_error_location: (usize, usize),
    /// Entries with relative error above 1e-4
    pub large_error_count: usize,
    /// Entries where either derivative was nonzero
    pub total_entries: usize,
    /// Finite-difference nonzeros at positions the pattern does not declare
    pub undeclared_entries: usize,
}

impl DerivativeCheck {
    fn new() -> Self {
        Self {
            max_abs_error: 0.0,
            max_rel_error: 0.0,
            max_error_location: (0, 0),
            large_error_count: 0,
            total_entries: 0,
            undeclared_entries: 0,
        }
    }

    fn record(&mut self, row: usize, col: usize, analytic: f64, numeric: f64) {
        if analytic == 0.0 && numeric == 0.0 {
            return;
        }
        self.total_entries += 1;
        let abs = (analytic - numeric).abs();
        let rel = abs / (1.0 + analytic.abs().max(numeric.abs()));
        self.max_abs_error = self.max_abs_error.max(abs);
        if rel > self.max_rel_error {
            self.max_rel_error = rel;
            self.max_error_location = (row, col);
        }
        if rel > LARGE_ERROR {
            self.large_error_count += 1;
        }
    }

    pub fn passed(&self) -> bool {
        self.large_error_count == 0
    }
}

fn perturbed(x: &[f64], j: usize, delta: f64) -> Vec<f64> {
    let mut xp = x.to_vec();
    xp[j] += delta;
    xp
}

/// Compare the objective gradient against central differences with step `h`.
/// Rows of the result are always 0.
pub fn verify_gradient(problem: &dyn NlpProblem, x: &[f64], h: f64) -> Result<DerivativeCheck, ScopfError> {
    ScopfError::check_len("point", problem.num_variables(), x.len())?;
    let grad = problem.gradient(x)?;
    let mut check = DerivativeCheck::new();
    for j in 0..x.len() {
        let fp = problem.objective(&perturbed(x, j, h))?;
        let fm = problem.objective(&perturbed(x, j, -h))?;
        check.record(0, j, grad[j], (fp - fm) / (2.0 * h));
    }
    Ok(check)
}

/// Compare the constraint Jacobian against central differences with step `h`.
///
/// Entries outside the declared pattern are compared against zero and, when
/// the numerical value exceeds `1e-6`, also counted in `undeclared_entries`.
pub fn verify_jacobian(problem: &dyn NlpProblem, x: &[f64], h: f64) -> Result<DerivativeCheck, ScopfError> {
    ScopfError::check_len("point", problem.num_variables(), x.len())?;
    let pattern = problem.jacobian_structure();
    let analytic = pattern.to_csr(&problem.jacobian_values(x)?)?;
    let mut check = DerivativeCheck::new();

    for j in 0..x.len() {
        let gp = problem.constraints(&perturbed(x, j, h))?;
        let gm = problem.constraints(&perturbed(x, j, -h))?;
        for (i, (p, m)) in gp.iter().zip(&gm).enumerate() {
            let numeric = (p - m) / (2.0 * h);
            let value = analytic.get(i, j).copied().unwrap_or(0.0);
            if !pattern.contains(i, j) && numeric.abs() > 1e-6 {
                check.undeclared_entries += 1;
            }
            check.record(i, j, value, numeric);
        }
    }
    Ok(check)
}

/// Worst violations in one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioViolation {
    pub scenario: usize,
    pub label: String,
    /// Largest power-balance residual magnitude
    pub max_balance: f64,
    /// Largest flow-limit excess `|S|² - Smax²`, zero when all limits hold
    pub max_flow: f64,
    /// Largest excursion of the scenario's variables outside their bounds
    pub max_bound: f64,
}

impl ScenarioViolation {
    pub fn max(&self) -> f64 {
        self.max_balance.max(self.max_flow).max(self.max_bound)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    pub scenarios: Vec<ScenarioViolation>,
    /// Largest violation among the linear rows
    pub linear: f64,
}

impl ViolationReport {
    pub fn max(&self) -> f64 {
        self.scenarios
            .iter()
            .map(ScenarioViolation::max)
            .fold(self.linear, f64::max)
    }
}

fn excess(value: f64, lower: f64, upper: f64) -> f64 {
    (lower - value).max(value - upper).max(0.0)
}

/// Constraint and bound violations of `x`, grouped by scenario.
pub fn constraint_violations(instance: &ProblemInstance, x: &[f64]) -> Result<ViolationReport, ScopfError> {
    let nlp = ScopfNlp::new(instance);
    let g = nlp.constraints(x)?;
    let cb = instance.constraint_bounds();
    let vb = instance.variable_bounds();
    let layout = instance.layout();
    let per = layout.rows_per_scenario();

    let scenarios = instance
        .scenarios()
        .iter()
        .map(|scenario| {
            let s = scenario.index;
            let row0 = layout.scenario_row_offset(s);
            let mut max_balance = 0.0_f64;
            let mut max_flow = 0.0_f64;
            for r in 0..per {
                let k = row0 + r;
                let v = excess(g[k], cb.lower[k], cb.upper[k]);
                if layout.is_inequality_row(r) {
                    max_flow = max_flow.max(v);
                } else {
                    max_balance = max_balance.max(v);
                }
            }
            let max_bound = layout
                .scenario_map(s)
                .columns()
                .iter()
                .map(|&k| excess(x[k], vb.lower[k], vb.upper[k]))
                .fold(0.0, f64::max);
            ScenarioViolation {
                scenario: s,
                label: scenario.label(),
                max_balance,
                max_flow,
                max_bound,
            }
        })
        .collect();

    let row0 = layout.nonlinear_rows();
    let linear = (row0..g.len())
        .map(|k| excess(g[k], cb.lower[k], cb.upper[k]))
        .fold(0.0, f64::max);

    Ok(ViolationReport { scenarios, linear })
}
