//! Power-flow model consumed by the scenario evaluator.
//!
//! The evaluator only needs three things from a model: admittances for a
//! topology, residuals with first derivatives, and the multiplier-weighted sum
//! of constraint second derivatives. Everything is expressed in the physical
//! column space `[Va | Vm | Pg | Qg]` of one scenario; mapping into the flat
//! SCOPF vector is the evaluator's job.
//!
//! ## Residuals
//!
//! ```text
//! eq   = [ P(V) + Pd - Cg·Pg ]   (nb rows)
//!        [ Q(V) + Qd - Cg·Qg ]   (nb rows)
//! ineq = [ |Sf|² - Smax² ]       (nc rows, from end)
//!        [ |St|² - Smax² ]       (nc rows, to end)
//! ```
//!
//! A branch removed by the contingency keeps its flow rows; they evaluate to
//! `-Smax²` with no derivative entries.

mod admittance;
mod polar;

pub use admittance::{build_admittances, Admittances};
pub use polar::AcPolarModel;

use crate::grid::GridModel;
use crate::ScopfError;
use sprs::CsMat;
use std::fmt::Debug;

/// Residuals and Jacobians of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResiduals {
    /// Power balance residuals, P rows then Q rows
    pub eq: Vec<f64>,
    /// Flow limit residuals, from rows then to rows
    pub ineq: Vec<f64>,
    /// `2nb × n_phys`
    pub jac_eq: CsMat<f64>,
    /// `2nc × n_phys`
    pub jac_ineq: CsMat<f64>,
}

pub trait PowerFlowModel: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn build_admittance(
        &self,
        grid: &GridModel,
        outage: Option<usize>,
    ) -> Result<Admittances, ScopfError>;

    fn residuals_and_derivatives(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
    ) -> Result<ScenarioResiduals, ScopfError>;

    /// Residuals only. Defaults to dropping the Jacobians.
    fn residuals(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
    ) -> Result<(Vec<f64>, Vec<f64>), ScopfError> {
        let res = self.residuals_and_derivatives(grid, point, adm)?;
        Ok((res.eq, res.ineq))
    }

    /// `Σ λ_eq,i ∇²eq_i + Σ λ_ineq,j ∇²ineq_j`, full symmetric, `n_phys × n_phys`.
    fn constraint_hessian(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
        lambda_eq: &[f64],
        lambda_ineq: &[f64],
    ) -> Result<CsMat<f64>, ScopfError>;
}
