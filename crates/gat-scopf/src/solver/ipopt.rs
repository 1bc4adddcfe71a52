//! IPOPT engine.
//!
//! Wraps an [`NlpProblem`] in the `ipopt` crate's `BasicProblem` /
//! `ConstrainedProblem` traits. Callback errors are logged and reported to
//! IPOPT as evaluation failures.

use super::{EngineOutput, EngineStatus, IpoptOptions, SolverEngine};
use crate::nlp::NlpProblem;
use crate::ScopfError;
use ipopt::{
    BasicProblem, ConstrainedProblem, Index, IntermediateCallbackData, Ipopt, Number, SolveStatus,
};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Default)]
pub struct IpoptEngine {
    options: IpoptOptions,
}

impl IpoptEngine {
    pub fn new(options: IpoptOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IpoptOptions {
        &self.options
    }
}

struct IpoptAdapter<'a> {
    problem: &'a dyn NlpProblem,
    x0: Vec<f64>,
    iterations: usize,
}

fn copy_slice(what: &str, src: &[f64], dst: &mut [Number]) -> bool {
    if src.len() != dst.len() {
        error!(what, expected = dst.len(), actual = src.len(), "callback length mismatch");
        return false;
    }
    dst.copy_from_slice(src);
    true
}

fn copy_into(what: &str, src: Result<Vec<f64>, ScopfError>, dst: &mut [Number]) -> bool {
    match src {
        Ok(v) => copy_slice(what, &v, dst),
        Err(e) => {
            error!(what, error = %e, "callback failed");
            false
        }
    }
}

fn fill_indices(rows_src: &[usize], cols_src: &[usize], rows: &mut [Index], cols: &mut [Index]) -> bool {
    if rows.len() != rows_src.len() || cols.len() != cols_src.len() {
        return false;
    }
    for (dst, &src) in rows.iter_mut().zip(rows_src) {
        *dst = src as Index;
    }
    for (dst, &src) in cols.iter_mut().zip(cols_src) {
        *dst = src as Index;
    }
    true
}

impl BasicProblem for IpoptAdapter<'_> {
    fn num_variables(&self) -> usize {
        self.problem.num_variables()
    }

    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
        let (lo, up) = self.problem.variable_bounds();
        copy_slice("variable lower bounds", lo, x_l) && copy_slice("variable upper bounds", up, x_u)
    }

    fn initial_point(&self, x: &mut [Number]) -> bool {
        copy_slice("initial point", &self.x0, x)
    }

    fn objective(&self, x: &[Number], obj: &mut Number) -> bool {
        match self.problem.objective(x) {
            Ok(v) => {
                *obj = v;
                true
            }
            Err(e) => {
                error!(error = %e, "objective callback failed");
                false
            }
        }
    }

    fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool {
        copy_into("gradient", self.problem.gradient(x), grad_f)
    }
}

impl ConstrainedProblem for IpoptAdapter<'_> {
    fn num_constraints(&self) -> usize {
        self.problem.num_constraints()
    }

    fn num_constraint_jacobian_non_zeros(&self) -> usize {
        self.problem.jacobian_structure().nnz()
    }

    fn constraint(&self, x: &[Number], g: &mut [Number]) -> bool {
        copy_into("constraints", self.problem.constraints(x), g)
    }

    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool {
        let (lo, up) = self.problem.constraint_bounds();
        copy_slice("constraint lower bounds", lo, g_l)
            && copy_slice("constraint upper bounds", up, g_u)
    }

    fn constraint_jacobian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
        let pattern = self.problem.jacobian_structure();
        fill_indices(pattern.rows(), pattern.cols(), rows, cols)
    }

    fn constraint_jacobian_values(&self, x: &[Number], vals: &mut [Number]) -> bool {
        copy_into("jacobian", self.problem.jacobian_values(x), vals)
    }

    fn num_hessian_non_zeros(&self) -> usize {
        self.problem.hessian_structure().nnz()
    }

    fn hessian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
        let pattern = self.problem.hessian_structure();
        fill_indices(pattern.rows(), pattern.cols(), rows, cols)
    }

    fn hessian_values(
        &self,
        x: &[Number],
        obj_factor: Number,
        lambda: &[Number],
        vals: &mut [Number],
    ) -> bool {
        copy_into(
            "hessian",
            self.problem.hessian_values(x, obj_factor, lambda),
            vals,
        )
    }
}

fn record_iteration(adapter: &mut IpoptAdapter<'_>, data: IntermediateCallbackData) -> bool {
    adapter.iterations = data.iter_count.max(0) as usize;
    true
}

/// IPOPT `ApplicationReturnStatus` code and the adapter's reading of it.
fn translate_status(status: SolveStatus) -> (EngineStatus, i32) {
    use SolveStatus::*;
    match status {
        SolveSucceeded => (EngineStatus::Optimal, 0),
        SolvedToAcceptableLevel => (EngineStatus::Acceptable, 1),
        InfeasibleProblemDetected => (EngineStatus::Infeasible, 2),
        SearchDirectionBecomesTooSmall => (EngineStatus::Failed, 3),
        DivergingIterates => (EngineStatus::Failed, 4),
        UserRequestedStop => (EngineStatus::Failed, 5),
        FeasiblePointFound => (EngineStatus::Failed, 6),
        MaximumIterationsExceeded => (EngineStatus::MaxIterations, -1),
        RestorationFailed => (EngineStatus::Failed, -2),
        ErrorInStepComputation => (EngineStatus::Failed, -3),
        MaximumCpuTimeExceeded => (EngineStatus::MaxIterations, -4),
        NotEnoughDegreesOfFreedom => (EngineStatus::Failed, -10),
        InvalidProblemDefinition => (EngineStatus::Failed, -11),
        InvalidOption => (EngineStatus::Failed, -12),
        InvalidNumberDetected => (EngineStatus::Failed, -13),
        UnrecoverableException => (EngineStatus::Failed, -100),
        NonIpoptExceptionThrown => (EngineStatus::Failed, -101),
        InsufficientMemory => (EngineStatus::Failed, -102),
        InternalError => (EngineStatus::Failed, -199),
        UnknownError => (EngineStatus::Failed, -200),
    }
}

impl SolverEngine for IpoptEngine {
    fn name(&self) -> &'static str {
        "ipopt"
    }

    fn solve(
        &mut self,
        problem: &dyn NlpProblem,
        x0: &[f64],
        warm_start: bool,
    ) -> Result<EngineOutput, ScopfError> {
        let adapter = IpoptAdapter {
            problem,
            x0: x0.to_vec(),
            iterations: 0,
        };
        let mut solver = Ipopt::new(adapter)
            .map_err(|e| ScopfError::Solver(format!("IPOPT init failed: {e:?}")))?;

        let opts = &self.options;
        let mut rejected = Vec::new();
        let max_iter = i32::try_from(opts.max_iter).unwrap_or(i32::MAX);
        if solver.set_option("max_iter", max_iter).is_none() {
            rejected.push("max_iter");
        }
        if solver.set_option("tol", opts.tol).is_none() {
            rejected.push("tol");
        }
        if solver.set_option("acceptable_tol", opts.acceptable_tol).is_none() {
            rejected.push("acceptable_tol");
        }
        if solver.set_option("print_level", opts.print_level).is_none() {
            rejected.push("print_level");
        }
        if solver.set_option("sb", "yes").is_none() {
            rejected.push("sb");
        }
        if solver.set_option("hessian_approximation", "exact").is_none() {
            rejected.push("hessian_approximation");
        }
        if let Some(linear_solver) = &opts.linear_solver {
            if solver.set_option("linear_solver", linear_solver.as_str()).is_none() {
                rejected.push("linear_solver");
            }
        }
        if warm_start {
            solver.set_option("warm_start_init_point", "yes");
            solver.set_option("warm_start_bound_push", opts.warm_start_bound_push);
            solver.set_option("warm_start_bound_frac", opts.warm_start_bound_frac);
            solver.set_option("warm_start_slack_bound_push", opts.warm_start_slack_bound_push);
        }
        if !rejected.is_empty() {
            warn!(?rejected, "IPOPT rejected options");
        }
        solver.set_intermediate_callback(Some(record_iteration));

        debug!("calling IPOPT");
        let result = solver.solve();
        let (status, raw_status) = translate_status(result.status);
        let solution = &result.solver_data.solution;

        Ok(EngineOutput {
            x: solution.primal_variables.to_vec(),
            objective: result.objective_value,
            iterations: result.solver_data.problem.iterations,
            status,
            raw_status,
            constraint_multipliers: solution.constraint_multipliers.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopfConfig;
    use crate::contingency::Contingency;
    use crate::instance::ProblemInstance;
    use crate::nlp::{default_initial_point, ScopfNlp};
    use crate::test_cases::three_bus;

    fn instance() -> ProblemInstance {
        ProblemInstance::new(
            &three_bus(),
            &[Contingency::BranchOutage(1)],
            ScopfConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_translate_status() {
        assert_eq!(translate_status(SolveStatus::SolveSucceeded), (EngineStatus::Optimal, 0));
        assert_eq!(
            translate_status(SolveStatus::SolvedToAcceptableLevel),
            (EngineStatus::Acceptable, 1)
        );
        assert_eq!(
            translate_status(SolveStatus::InfeasibleProblemDetected),
            (EngineStatus::Infeasible, 2)
        );
        assert_eq!(
            translate_status(SolveStatus::MaximumIterationsExceeded),
            (EngineStatus::MaxIterations, -1)
        );
        assert_eq!(
            translate_status(SolveStatus::MaximumCpuTimeExceeded),
            (EngineStatus::MaxIterations, -4)
        );
        assert_eq!(translate_status(SolveStatus::FeasiblePointFound), (EngineStatus::Failed, 6));
        assert_eq!(translate_status(SolveStatus::UnknownError), (EngineStatus::Failed, -200));

        // Only optimal and acceptable terminations count as converged
        for status in [
            SolveStatus::SearchDirectionBecomesTooSmall,
            SolveStatus::RestorationFailed,
            SolveStatus::InvalidNumberDetected,
            SolveStatus::InternalError,
        ] {
            assert!(!translate_status(status).0.is_success());
        }
        assert!(translate_status(SolveStatus::SolvedToAcceptableLevel).0.is_success());
    }

    #[test]
    fn test_adapter_rejects_wrong_length_start() {
        let inst = instance();
        let nlp = ScopfNlp::new(&inst);
        let n = nlp.num_variables();
        let m = nlp.num_constraints();

        let mut short = default_initial_point(&inst);
        short.pop();
        let adapter = IpoptAdapter {
            problem: &nlp,
            x0: short,
            iterations: 0,
        };
        let mut x = vec![0.0; n];
        assert!(!adapter.initial_point(&mut x));

        let (mut x_l, mut x_u) = (vec![0.0; n], vec![0.0; n]);
        assert!(adapter.bounds(&mut x_l, &mut x_u));
        let (mut g_l, mut g_u) = (vec![0.0; m], vec![0.0; m]);
        assert!(ConstrainedProblem::constraint_bounds(&adapter, &mut g_l, &mut g_u));

        // IPOPT-sized buffers that disagree with the problem
        let (mut x_l, mut x_u) = (vec![0.0; n + 1], vec![0.0; n + 1]);
        assert!(!adapter.bounds(&mut x_l, &mut x_u));
        let (mut g_l, mut g_u) = (vec![0.0; m - 1], vec![0.0; m - 1]);
        assert!(!ConstrainedProblem::constraint_bounds(&adapter, &mut g_l, &mut g_u));
    }
}
