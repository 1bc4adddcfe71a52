//! # Problem Instance
//!
//! Everything the callbacks need, built once and read-only afterwards:
//!
//! ```text
//! Network ──► GridModel ──► ScenarioSet ──► VariableLayout
//!                                               │
//!               ┌───────────────┬───────────────┼───────────────┐
//!               ▼               ▼               ▼               ▼
//!          BoundVector   constraint bounds   patterns    admittances/scenario
//! ```
//!
//! The solver engine owns the iterate; callbacks only ever borrow the
//! instance immutably, so it can be shared across the scenario workers.

use crate::bounds::{assemble_bounds, BoundVector, PhysicalBounds};
use crate::config::ScopfConfig;
use crate::connectivity::Connectivity;
use crate::contingency::{Contingency, ScenarioSet};
use crate::grid::GridModel;
use crate::layout::VariableLayout;
use crate::linear::LinearConstraints;
use crate::model::{AcPolarModel, Admittances, PowerFlowModel};
use crate::sparsity::{hessian_pattern, jacobian_pattern, SparsityPattern};
use crate::ScopfError;
use gat_core::Network;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct ProblemInstance {
    network: Network,
    grid: GridModel,
    scenarios: ScenarioSet,
    layout: VariableLayout,
    bounds: BoundVector,
    constraint_bounds: BoundVector,
    jacobian: SparsityPattern,
    hessian: SparsityPattern,
    admittances: Vec<Admittances>,
    linear: Option<LinearConstraints>,
    config: ScopfConfig,
    model: Arc<dyn PowerFlowModel>,
}

/// Builder for [`ProblemInstance`].
#[derive(Debug, Clone)]
pub struct InstanceBuilder<'a> {
    network: &'a Network,
    contingencies: Vec<Contingency>,
    config: ScopfConfig,
    linear: Option<LinearConstraints>,
    model: Arc<dyn PowerFlowModel>,
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self {
            network,
            contingencies: Vec::new(),
            config: ScopfConfig::default(),
            linear: None,
            model: Arc::new(AcPolarModel),
        }
    }

    pub fn with_contingencies(mut self, contingencies: &[Contingency]) -> Self {
        self.contingencies = contingencies.to_vec();
        self
    }

    pub fn with_config(mut self, config: ScopfConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_linear_constraints(mut self, linear: LinearConstraints) -> Self {
        self.linear = (!linear.is_empty()).then_some(linear);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn PowerFlowModel>) -> Self {
        self.model = model;
        self
    }

    pub fn build(self) -> Result<ProblemInstance, ScopfError> {
        let Self {
            network,
            contingencies,
            config,
            linear,
            model,
        } = self;

        let grid = GridModel::from_network(network)?;
        let scenarios = ScenarioSet::build(
            network,
            &grid,
            &contingencies,
            config.reject_islanding_contingencies,
        )?;
        let layout = VariableLayout::from_grid(&grid, scenarios.len())?;
        let bounds = assemble_bounds(
            &PhysicalBounds::from_grid(&grid),
            &layout,
            config.bound_epsilon,
        )?;

        if let Some(linear) = &linear {
            linear.validate(layout.total_variables())?;
        }

        let views: Vec<Connectivity> = scenarios
            .iter()
            .map(|s| Connectivity::for_outage(&grid, s.outage))
            .collect();
        let jacobian = jacobian_pattern(&layout, &views, linear.as_ref())?;
        let hessian = hessian_pattern(&layout, &views)?;

        let admittances = scenarios
            .iter()
            .map(|s| model.build_admittance(&grid, s.outage))
            .collect::<Result<Vec<_>, _>>()?;

        let constraint_bounds = constraint_bounds(&layout, linear.as_ref(), config.inequality_offset);

        info!(
            model = model.name(),
            n_scenarios = layout.n_scenarios(),
            n_variables = layout.total_variables(),
            n_constraints = constraint_bounds.len(),
            jacobian_nnz = jacobian.nnz(),
            hessian_nnz = hessian.nnz(),
            "SCOPF instance built"
        );

        Ok(ProblemInstance {
            network: network.clone(),
            grid,
            scenarios,
            layout,
            bounds,
            constraint_bounds,
            jacobian,
            hessian,
            admittances,
            linear,
            config,
            model,
        })
    }
}

/// `[0, 0]` for balance rows, `[-offset, 0]` for flow rows, then the linear rows.
fn constraint_bounds(
    layout: &VariableLayout,
    linear: Option<&LinearConstraints>,
    offset: f64,
) -> BoundVector {
    let per = layout.rows_per_scenario();
    let mut lower = Vec::with_capacity(layout.nonlinear_rows());
    let mut upper = Vec::with_capacity(layout.nonlinear_rows());
    for _ in 0..layout.n_scenarios() {
        for row in 0..per {
            lower.push(if layout.is_inequality_row(row) { -offset } else { 0.0 });
            upper.push(0.0);
        }
    }
    if let Some(linear) = linear {
        lower.extend_from_slice(&linear.lower);
        upper.extend_from_slice(&linear.upper);
    }
    BoundVector { lower, upper }
}

impl ProblemInstance {
    pub fn builder(network: &Network) -> InstanceBuilder<'_> {
        InstanceBuilder::new(network)
    }

    /// Instance with the default polar model and no linear rows.
    pub fn new(
        network: &Network,
        contingencies: &[Contingency],
        config: ScopfConfig,
    ) -> Result<Self, ScopfError> {
        InstanceBuilder::new(network)
            .with_contingencies(contingencies)
            .with_config(config)
            .build()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn variable_bounds(&self) -> &BoundVector {
        &self.bounds
    }

    pub fn constraint_bounds(&self) -> &BoundVector {
        &self.constraint_bounds
    }

    pub fn jacobian_pattern(&self) -> &SparsityPattern {
        &self.jacobian
    }

    pub fn hessian_pattern(&self) -> &SparsityPattern {
        &self.hessian
    }

    pub fn admittances(&self, scenario: usize) -> &Admittances {
        &self.admittances[scenario]
    }

    pub fn linear_constraints(&self) -> Option<&LinearConstraints> {
        self.linear.as_ref()
    }

    pub fn config(&self) -> &ScopfConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn PowerFlowModel {
        self.model.as_ref()
    }

    pub fn n_scenarios(&self) -> usize {
        self.layout.n_scenarios()
    }

    pub fn n_variables(&self) -> usize {
        self.layout.total_variables()
    }

    pub fn n_linear(&self) -> usize {
        self.linear.as_ref().map_or(0, |l| l.n_rows())
    }

    pub fn n_constraints(&self) -> usize {
        self.layout.nonlinear_rows() + self.n_linear()
    }

    /// Start point from the voltages and dispatch stored in the case,
    /// replicated to every scenario and clamped into the variable bounds.
    pub fn warm_start_from_network(&self) -> Vec<f64> {
        let phys = self.layout.physical();
        let mut point = vec![0.0; phys.len()];
        for (i, bus) in self.grid.buses.iter().enumerate() {
            point[phys.va(i)] = bus.va0;
            point[phys.vm(i)] = bus.vm0;
        }
        for (g, gen) in self.grid.gens.iter().enumerate() {
            point[phys.pg(g)] = gen.pg0;
            point[phys.qg(g)] = gen.qg0;
        }

        let mut x = vec![0.0; self.n_variables()];
        for s in 0..self.n_scenarios() {
            let map = self.layout.scenario_map(s);
            for (col, &flat) in map.columns().iter().enumerate() {
                x[flat] = point[col];
            }
        }
        for (k, v) in x.iter_mut().enumerate() {
            *v = v.max(self.bounds.lower[k]).min(self.bounds.upper[k]);
        }
        x
    }
}
