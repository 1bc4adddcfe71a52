//! Translation of a flat SCOPF point back into engineering units.
//!
//! The nominal scenario carries the dispatch that is actually committed.
//! Contingency scenarios report how the network would look after the outage:
//! voltages, the reference generator's pickup, and how close the worst
//! constraint is to its limit.

use crate::evaluator::ScenarioEvaluator;
use crate::instance::ProblemInstance;
use crate::solver::{EngineStatus, ScopfOutcome};
use crate::ScopfError;
use gat_core::{BusId, GenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDispatch {
    pub id: GenId,
    pub bus: BusId,
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusVoltage {
    pub id: BusId,
    pub vm_pu: f64,
    pub va_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub index: usize,
    /// Outaged branch position, `None` for the intact topology
    pub outage: Option<usize>,
    pub label: String,
    pub voltages: Vec<BusVoltage>,
    pub ref_gen_p_mw: f64,
    pub ref_gen_q_mvar: f64,
    /// Largest |P| or |Q| balance residual, pu
    pub max_mismatch: f64,
    /// Largest |S| / Smax over the flow-limited branches
    pub max_flow_loading: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopfSolution {
    pub success: bool,
    pub status: Option<EngineStatus>,
    pub raw_status: Option<i32>,
    pub iterations: usize,
    pub solve_time_ms: u128,
    /// Nominal generation cost, $/h
    pub objective: f64,
    /// Nominal dispatch
    pub dispatch: Vec<GeneratorDispatch>,
    pub scenarios: Vec<ScenarioReport>,
}

impl ScopfSolution {
    /// Report for an arbitrary point, with no solver status attached.
    pub fn from_point(instance: &ProblemInstance, x: &[f64]) -> Result<Self, ScopfError> {
        ScopfError::check_len("point", instance.n_variables(), x.len())?;
        let grid = instance.grid();
        let layout = instance.layout();
        let base = grid.base_mva;
        let limits_sq = grid.flow_limits_sq();
        let ref_gen = layout.ref_gen();

        let nominal = layout.scenario_map(0);
        let dispatch = grid
            .gens
            .iter()
            .enumerate()
            .map(|(g, gen)| GeneratorDispatch {
                id: gen.id,
                bus: grid.buses[gen.bus].id,
                p_mw: x[nominal.pg(g)] * base,
                q_mvar: x[nominal.qg(g)] * base,
            })
            .collect();

        let objective = ScenarioEvaluator::new(instance).objective(x)?;

        let mut scenarios = Vec::with_capacity(instance.n_scenarios());
        for scenario in instance.scenarios().iter() {
            let s = scenario.index;
            let map = layout.scenario_map(s);
            let point = map.gather(x);
            let (eq, ineq) = instance
                .model()
                .residuals(grid, &point, instance.admittances(s))?;

            let max_mismatch = eq.iter().fold(0.0_f64, |m, r| m.max(r.abs()));
            let nc = limits_sq.len();
            let mut max_flow_loading = 0.0_f64;
            for (k, &smax_sq) in limits_sq.iter().enumerate() {
                for h in [ineq[k], ineq[nc + k]] {
                    let s_sq = (h + smax_sq).max(0.0);
                    max_flow_loading = max_flow_loading.max((s_sq / smax_sq).sqrt());
                }
            }

            let voltages = grid
                .buses
                .iter()
                .enumerate()
                .map(|(i, bus)| BusVoltage {
                    id: bus.id,
                    vm_pu: x[map.vm(i)],
                    va_deg: x[map.va(i)].to_degrees(),
                })
                .collect();

            scenarios.push(ScenarioReport {
                index: s,
                outage: scenario.outage,
                label: scenario.label(),
                voltages,
                ref_gen_p_mw: x[map.pg(ref_gen)] * base,
                ref_gen_q_mvar: x[map.qg(ref_gen)] * base,
                max_mismatch,
                max_flow_loading,
            });
        }

        Ok(Self {
            success: false,
            status: None,
            raw_status: None,
            iterations: 0,
            solve_time_ms: 0,
            objective,
            dispatch,
            scenarios,
        })
    }

    pub fn from_outcome(instance: &ProblemInstance, outcome: &ScopfOutcome) -> Result<Self, ScopfError> {
        let mut solution = Self::from_point(instance, &outcome.x)?;
        solution.success = outcome.success;
        solution.status = Some(outcome.status);
        solution.raw_status = Some(outcome.raw_status);
        solution.iterations = outcome.iterations;
        solution.solve_time_ms = outcome.solve_time.as_millis();
        Ok(solution)
    }

    pub fn nominal(&self) -> Option<&ScenarioReport> {
        self.scenarios.first()
    }

    /// Worst flow loading across all scenarios.
    pub fn max_flow_loading(&self) -> f64 {
        self.scenarios
            .iter()
            .fold(0.0, |m, s| m.max(s.max_flow_loading))
    }
}
