//! Engine-facing NLP interface.
//!
//! A solver engine sees nothing but this trait: sizes, bounds, constant
//! structures and the five callbacks. One implementation exists per
//! formulation; [`ScopfNlp`] is the security-constrained one.

use crate::evaluator::ScenarioEvaluator;
use crate::instance::ProblemInstance;
use crate::sparsity::SparsityPattern;
use crate::ScopfError;

pub trait NlpProblem: Send + Sync {
    fn num_variables(&self) -> usize;
    fn num_constraints(&self) -> usize;

    /// `(lower, upper)` for the variables.
    fn variable_bounds(&self) -> (&[f64], &[f64]);
    /// `(lower, upper)` for the constraint rows.
    fn constraint_bounds(&self) -> (&[f64], &[f64]);

    /// Default start point when no warm start is given.
    fn initial_point(&self) -> Vec<f64>;

    fn jacobian_structure(&self) -> &SparsityPattern;
    /// Lower triangle only.
    fn hessian_structure(&self) -> &SparsityPattern;

    fn objective(&self, x: &[f64]) -> Result<f64, ScopfError>;
    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError>;
    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError>;
    fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError>;
    /// `σ∇²f + Σ λ_i ∇²g_i`, lower triangle in structure order.
    fn hessian_values(&self, x: &[f64], sigma: f64, lambda: &[f64]) -> Result<Vec<f64>, ScopfError>;
}

/// Interior start point from box bounds.
///
/// Finite on both sides: the midpoint. Finite on one side: one unit inside
/// it. Unbounded sides are replaced by `±infinity_proxy` before taking the
/// midpoint, which puts fully free variables at zero. Every scenario's
/// reference angle is pinned to the nominal reference angle.
pub fn default_initial_point(instance: &ProblemInstance) -> Vec<f64> {
    let bounds = instance.variable_bounds();
    let proxy = instance.config().infinity_proxy;
    let mut x: Vec<f64> = bounds
        .lower
        .iter()
        .zip(&bounds.upper)
        .map(|(&lo, &up)| match (lo.is_finite(), up.is_finite()) {
            (true, true) => 0.5 * (lo + up),
            (true, false) => lo + 1.0,
            (false, true) => up - 1.0,
            (false, false) => 0.5 * (lo.max(-proxy) + up.min(proxy)),
        })
        .collect();

    let layout = instance.layout();
    let nominal_ref = bounds.lower[layout.ref_angle_index(0)];
    for s in 0..layout.n_scenarios() {
        x[layout.ref_angle_index(s)] = nominal_ref;
    }
    x
}

/// The SCOPF formulation over a borrowed instance.
#[derive(Debug, Clone, Copy)]
pub struct ScopfNlp<'a> {
    instance: &'a ProblemInstance,
    evaluator: ScenarioEvaluator<'a>,
}

impl<'a> ScopfNlp<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Self {
        Self {
            instance,
            evaluator: ScenarioEvaluator::new(instance),
        }
    }

    pub fn instance(&self) -> &'a ProblemInstance {
        self.instance
    }
}

impl NlpProblem for ScopfNlp<'_> {
    fn num_variables(&self) -> usize {
        self.instance.n_variables()
    }

    fn num_constraints(&self) -> usize {
        self.instance.n_constraints()
    }

    fn variable_bounds(&self) -> (&[f64], &[f64]) {
        let b = self.instance.variable_bounds();
        (&b.lower, &b.upper)
    }

    fn constraint_bounds(&self) -> (&[f64], &[f64]) {
        let b = self.instance.constraint_bounds();
        (&b.lower, &b.upper)
    }

    fn initial_point(&self) -> Vec<f64> {
        default_initial_point(self.instance)
    }

    fn jacobian_structure(&self) -> &SparsityPattern {
        self.instance.jacobian_pattern()
    }

    fn hessian_structure(&self) -> &SparsityPattern {
        self.instance.hessian_pattern()
    }

    fn objective(&self, x: &[f64]) -> Result<f64, ScopfError> {
        self.evaluator.objective(x)
    }

    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.evaluator.gradient(x)
    }

    fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.evaluator.constraints(x)
    }

    fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.evaluator.jacobian_values(x)
    }

    fn hessian_values(&self, x: &[f64], sigma: f64, lambda: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.evaluator.hessian_values(x, sigma, lambda)
    }
}
