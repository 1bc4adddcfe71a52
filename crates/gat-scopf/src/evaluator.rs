//! # Scenario Evaluator
//!
//! Evaluates the SCOPF callbacks at a flat point by looping over scenarios:
//!
//! 1. gather the scenario's physical point `[Va | Vm | Pg | Qg]` through its
//!    [`ScenarioIndexMap`](crate::layout::ScenarioIndexMap);
//! 2. ask the power-flow model for residuals and derivatives with the cached
//!    contingency admittances;
//! 3. scatter them into the scenario's rows and the flat columns of the
//!    declared patterns.
//!
//! Per-scenario work is independent. With the `parallel` feature the model
//! calls run on the rayon pool; the scatter into the shared buffers always
//! happens afterwards in scenario order, so results do not depend on thread
//! scheduling.
//!
//! ## Objective
//!
//! ```text
//! f(x) = Σ_g cost_g(Pg_g · baseMVA)         (nominal scenario only)
//! ∂f/∂Pg_g  = cost'_g · baseMVA
//! ∂²f/∂Pg_g² = cost''_g · baseMVA²
//! ```

use crate::instance::ProblemInstance;
use crate::ScopfError;
use sprs::{CsMat, TriMat};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Callback evaluation over a borrowed [`ProblemInstance`].
#[derive(Debug, Clone, Copy)]
pub struct ScenarioEvaluator<'a> {
    instance: &'a ProblemInstance,
}

impl<'a> ScenarioEvaluator<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> &'a ProblemInstance {
        self.instance
    }

    fn check_point(&self, x: &[f64]) -> Result<(), ScopfError> {
        ScopfError::check_len("point", self.instance.n_variables(), x.len())
    }

    /// Run `f` for every scenario, on the rayon pool when enabled.
    fn map_scenarios<T, F>(&self, f: F) -> Result<Vec<T>, ScopfError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, ScopfError> + Send + Sync,
    {
        let ns = self.instance.n_scenarios();

        #[cfg(feature = "parallel")]
        {
            if self.instance.config().parallel_scenarios && ns > 1 {
                return (0..ns).into_par_iter().map(f).collect();
            }
        }

        (0..ns).map(f).collect()
    }

    /// Nominal active power per generator, in pu.
    fn nominal_pg(&self, x: &[f64]) -> Vec<(usize, f64)> {
        let map = self.instance.layout().scenario_map(0);
        (0..self.instance.grid().n_gen())
            .map(|g| (map.pg(g), x[map.pg(g)]))
            .collect()
    }

    pub fn objective(&self, x: &[f64]) -> Result<f64, ScopfError> {
        self.check_point(x)?;
        let grid = self.instance.grid();
        Ok(self
            .nominal_pg(x)
            .into_iter()
            .zip(&grid.gens)
            .map(|((_, pg), gen)| gen.cost.evaluate(pg * grid.base_mva))
            .sum())
    }

    pub fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.check_point(x)?;
        let grid = self.instance.grid();
        let mut grad = vec![0.0; x.len()];
        for ((k, pg), gen) in self.nominal_pg(x).into_iter().zip(&grid.gens) {
            grad[k] = gen.cost.marginal_cost(pg * grid.base_mva) * grid.base_mva;
        }
        Ok(grad)
    }

    pub fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.check_point(x)?;
        let inst = self.instance;
        let layout = inst.layout();
        let per_scenario = self.map_scenarios(|s| {
            let point = layout.scenario_map(s).gather(x);
            inst.model().residuals(inst.grid(), &point, inst.admittances(s))
        })?;

        let mut g = Vec::with_capacity(inst.n_constraints());
        for (eq, ineq) in per_scenario {
            g.extend(eq);
            g.extend(ineq);
        }
        if let Some(linear) = inst.linear_constraints() {
            g.extend(linear.evaluate(x));
        }
        debug_assert_eq!(g.len(), inst.n_constraints());
        Ok(g)
    }

    /// Jacobian values in the order of the declared pattern.
    pub fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, ScopfError> {
        self.check_point(x)?;
        let inst = self.instance;
        let layout = inst.layout();
        let pattern = inst.jacobian_pattern();
        let nb = layout.n_bus();

        let per_scenario = self.map_scenarios(|s| {
            let point = layout.scenario_map(s).gather(x);
            inst.model()
                .residuals_and_derivatives(inst.grid(), &point, inst.admittances(s))
        })?;

        let mut values = vec![0.0; pattern.nnz()];
        for (s, res) in per_scenario.iter().enumerate() {
            let map = layout.scenario_map(s);
            let row0 = layout.scenario_row_offset(s);
            for (&v, (r, c)) in res.jac_eq.iter() {
                pattern.scatter(&mut values, row0 + r, map.flat(c), v)?;
            }
            for (&v, (r, c)) in res.jac_ineq.iter() {
                pattern.scatter(&mut values, row0 + 2 * nb + r, map.flat(c), v)?;
            }
        }
        if let Some(linear) = inst.linear_constraints() {
            let row0 = layout.nonlinear_rows();
            for &(r, c, v) in &linear.entries {
                pattern.scatter(&mut values, row0 + r, c, v)?;
            }
        }
        Ok(values)
    }

    /// Per-scenario constraint Hessians in flat coordinates, plus the
    /// objective term, as `(row, col, value)` triplets over the full matrix.
    fn lagrangian_triplets(
        &self,
        x: &[f64],
        sigma: f64,
        lambda: &[f64],
    ) -> Result<Vec<(usize, usize, f64)>, ScopfError> {
        self.check_point(x)?;
        let inst = self.instance;
        ScopfError::check_len("constraint multipliers", inst.n_constraints(), lambda.len())?;
        let layout = inst.layout();
        let nb = layout.n_bus();

        let per_scenario = self.map_scenarios(|s| {
            let map = layout.scenario_map(s);
            let point = map.gather(x);
            let rows = layout.scenario_row_offset(s);
            let lambda_eq = &lambda[rows..rows + 2 * nb];
            let lambda_ineq = &lambda[rows + 2 * nb..rows + layout.rows_per_scenario()];
            let hess = inst.model().constraint_hessian(
                inst.grid(),
                &point,
                inst.admittances(s),
                lambda_eq,
                lambda_ineq,
            )?;
            Ok(hess
                .iter()
                .map(|(&v, (r, c))| (map.flat(r), map.flat(c), v))
                .collect::<Vec<_>>())
        })?;

        let mut triplets: Vec<(usize, usize, f64)> = per_scenario.into_iter().flatten().collect();

        if sigma != 0.0 {
            let grid = inst.grid();
            let base = grid.base_mva;
            for ((k, pg), gen) in self.nominal_pg(x).into_iter().zip(&grid.gens) {
                let curv = gen.cost.curvature(pg * base) * base * base;
                triplets.push((k, k, sigma * curv));
            }
        }
        Ok(triplets)
    }

    /// Lower-triangular Lagrangian Hessian values in the order of the
    /// declared pattern.
    pub fn hessian_values(
        &self,
        x: &[f64],
        sigma: f64,
        lambda: &[f64],
    ) -> Result<Vec<f64>, ScopfError> {
        let pattern = self.instance.hessian_pattern();
        let mut values = vec![0.0; pattern.nnz()];
        for (r, c, v) in self.lagrangian_triplets(x, sigma, lambda)? {
            if r >= c {
                pattern.scatter(&mut values, r, c, v)?;
            }
        }
        Ok(values)
    }

    /// Full symmetric Lagrangian Hessian, before the lower-triangular fold.
    pub fn hessian_full(
        &self,
        x: &[f64],
        sigma: f64,
        lambda: &[f64],
    ) -> Result<CsMat<f64>, ScopfError> {
        let n = self.instance.n_variables();
        let mut tri = TriMat::new((n, n));
        for (r, c, v) in self.lagrangian_triplets(x, sigma, lambda)? {
            tri.add_triplet(r, c, v);
        }
        Ok(tri.to_csr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopfConfig;
    use crate::contingency::Contingency;
    use crate::test_cases::{five_bus, three_bus};

    fn instance(parallel: bool) -> ProblemInstance {
        ProblemInstance::new(
            &five_bus(),
            &[Contingency::BranchOutage(0), Contingency::BranchOutage(5)],
            ScopfConfig::default().with_parallel_scenarios(parallel),
        )
        .unwrap()
    }

    #[test]
    fn test_objective_uses_nominal_dispatch() {
        let inst = ProblemInstance::new(&three_bus(), &[Contingency::BranchOutage(2)], ScopfConfig::default())
            .unwrap();
        let eval = ScenarioEvaluator::new(&inst);
        let mut x = inst.warm_start_from_network();
        let pg0 = inst.layout().scenario_map(0).pg(0);
        let pg1 = inst.layout().scenario_map(1).pg(0);
        x[pg0] = 1.5;
        x[pg1] = 2.0;
        // 50 + 20·150 + 0.02·150²
        let expected = 50.0 + 20.0 * 150.0 + 0.02 * 150.0 * 150.0;
        assert!((eval.objective(&x).unwrap() - expected).abs() < 1e-9);

        let grad = eval.gradient(&x).unwrap();
        assert!((grad[pg0] - (20.0 + 0.04 * 150.0) * 100.0).abs() < 1e-9);
        assert_eq!(grad[pg1], 0.0);
    }

    #[test]
    fn test_constraint_length() {
        let inst = instance(false);
        let eval = ScenarioEvaluator::new(&inst);
        let x = inst.warm_start_from_network();
        assert_eq!(eval.constraints(&x).unwrap().len(), inst.n_constraints());
        assert_eq!(
            eval.jacobian_values(&x).unwrap().len(),
            inst.jacobian_pattern().nnz()
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let seq = instance(false);
        let par = instance(true);
        let x = seq.warm_start_from_network();
        let lambda: Vec<f64> = (0..seq.n_constraints()).map(|i| (i as f64 * 0.37).sin()).collect();

        let (es, ep) = (ScenarioEvaluator::new(&seq), ScenarioEvaluator::new(&par));
        assert_eq!(es.constraints(&x).unwrap(), ep.constraints(&x).unwrap());
        assert_eq!(es.jacobian_values(&x).unwrap(), ep.jacobian_values(&x).unwrap());
        assert_eq!(
            es.hessian_values(&x, 0.5, &lambda).unwrap(),
            ep.hessian_values(&x, 0.5, &lambda).unwrap()
        );
    }

    #[test]
    fn test_wrong_lengths_rejected() {
        let inst = instance(false);
        let eval = ScenarioEvaluator::new(&inst);
        assert!(eval.objective(&[0.0; 3]).is_err());
        let x = inst.warm_start_from_network();
        assert!(matches!(
            eval.hessian_values(&x, 1.0, &[0.0; 2]),
            Err(ScopfError::DimensionMismatch { .. })
        ));
    }
}
