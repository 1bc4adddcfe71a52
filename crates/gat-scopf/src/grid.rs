//! Per-unit, index-based view of a [`Network`].
//!
//! Built once from the case tables. All powers are divided by the system MVA
//! base, angles are in radians, and every element is addressed by position.
//! This is the "model accessor" layer the rest of the crate consumes:
//! reference bus and generator candidates, PV buses, and the branches that
//! carry an enforced flow limit.

use crate::ScopfError;
use gat_core::{BusId, BusType, CostModel, FlowRating, GenId, Network};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GridBus {
    pub id: BusId,
    /// Position in `Network::buses`
    pub source: usize,
    pub bus_type: BusType,
    pub pd: f64,
    pub qd: f64,
    pub gs: f64,
    pub bs: f64,
    pub vmin: f64,
    pub vmax: f64,
    pub vm0: f64,
    pub va0: f64,
}

#[derive(Debug, Clone)]
pub struct GridBranch {
    pub from: usize,
    pub to: usize,
    pub r: f64,
    pub x: f64,
    pub b: f64,
    pub tap: f64,
    pub shift: f64,
    /// Flow limit in pu; `None` for an unlimited branch
    pub rate: Option<f64>,
    pub in_service: bool,
}

#[derive(Debug, Clone)]
pub struct GridGen {
    pub id: GenId,
    /// Position in `Network::generators`
    pub source: usize,
    pub bus: usize,
    pub pmin: f64,
    pub pmax: f64,
    pub qmin: f64,
    pub qmax: f64,
    pub pg0: f64,
    pub qg0: f64,
    pub cost: CostModel,
}

/// Per-unit grid model. Branch positions match `Network::branches`.
#[derive(Debug, Clone)]
pub struct GridModel {
    pub base_mva: f64,
    pub buses: Vec<GridBus>,
    pub branches: Vec<GridBranch>,
    pub gens: Vec<GridGen>,
    pub ref_bus: usize,
    /// In-service generators on the reference bus
    pub ref_gens: Vec<usize>,
    /// Buses of type PV with at least one in-service generator
    pub pv_buses: Vec<usize>,
    /// In-service branches with a finite flow limit, in branch order
    pub constrained: Vec<usize>,
}

impl GridModel {
    pub fn from_network(network: &Network) -> Result<Self, ScopfError> {
        network.validate()?;
        let base = network.base_mva;
        let demand = network.bus_demand()?;

        // Isolated buses are dropped; everything else keeps its relative order.
        let mut bus_pos = vec![None; network.buses.len()];
        let mut buses = Vec::with_capacity(network.buses.len());
        for (src, bus) in network.buses.iter().enumerate() {
            if bus.bus_type == BusType::Isolated {
                continue;
            }
            bus_pos[src] = Some(buses.len());
            buses.push(GridBus {
                id: bus.id,
                source: src,
                bus_type: bus.bus_type,
                pd: demand[src].0.to_pu(base),
                qd: demand[src].1.to_pu(base),
                gs: bus.gs.to_pu(base),
                bs: bus.bs.to_pu(base),
                vmin: bus.vmin.value(),
                vmax: bus.vmax.value(),
                vm0: bus.vm.value(),
                va0: bus.va.to_radians().value(),
            });
        }

        let index = network.bus_index_map();
        let resolve = |id: BusId| -> Option<usize> { index.get(&id).and_then(|src| bus_pos[*src]) };

        let mut branches = Vec::with_capacity(network.branches.len());
        for branch in &network.branches {
            let rate = match branch.rating {
                None => {
                    return Err(ScopfError::FlowLimit(format!(
                        "branch {} has no rating; use an explicit limit or `unlimited`",
                        branch.id.value()
                    )))
                }
                Some(FlowRating::Unlimited) => None,
                Some(FlowRating::Limited(s)) => {
                    if !s.is_finite() || s.value() <= 0.0 {
                        return Err(ScopfError::FlowLimit(format!(
                            "branch {} has inconsistent rating {} MVA",
                            branch.id.value(),
                            s.value()
                        )));
                    }
                    Some(s.to_pu(base))
                }
            };

            let (from, to) = match (resolve(branch.from_bus), resolve(branch.to_bus)) {
                (Some(f), Some(t)) => (f, t),
                _ if !branch.status => (0, 0),
                _ => {
                    return Err(ScopfError::DataValidation(format!(
                        "in-service branch {} touches an isolated bus",
                        branch.id.value()
                    )))
                }
            };

            branches.push(GridBranch {
                from,
                to,
                r: branch.resistance,
                x: branch.reactance,
                b: branch.charging_b,
                tap: branch.effective_tap(),
                shift: branch.phase_shift.to_radians().value(),
                rate,
                in_service: branch.status,
            });
        }

        let mut gens = Vec::with_capacity(network.generators.len());
        for (src, gen) in network.generators.iter().enumerate() {
            if !gen.status {
                continue;
            }
            let bus = resolve(gen.bus).ok_or_else(|| {
                ScopfError::DataValidation(format!(
                    "in-service generator {} sits on an isolated bus",
                    gen.id.value()
                ))
            })?;
            gens.push(GridGen {
                id: gen.id,
                source: src,
                bus,
                pmin: gen.pmin.to_pu(base),
                pmax: gen.pmax.to_pu(base),
                qmin: gen.qmin.to_pu(base),
                qmax: gen.qmax.to_pu(base),
                pg0: gen.active_power.to_pu(base),
                qg0: gen.reactive_power.to_pu(base),
                cost: gen.cost_model.clone(),
            });
        }

        let ref_buses: Vec<usize> = buses
            .iter()
            .enumerate()
            .filter(|(_, b)| b.bus_type == BusType::Ref)
            .map(|(i, _)| i)
            .collect();
        let ref_bus = match ref_buses.as_slice() {
            [] => {
                return Err(ScopfError::DataValidation(
                    "network has no reference bus".to_string(),
                ))
            }
            [single] => *single,
            _ => {
                return Err(ScopfError::DataValidation(format!(
                    "network has {} reference buses, expected one",
                    ref_buses.len()
                )))
            }
        };

        let ref_gens: Vec<usize> = gens
            .iter()
            .enumerate()
            .filter(|(_, g)| g.bus == ref_bus)
            .map(|(k, _)| k)
            .collect();

        let pv_buses: Vec<usize> = buses
            .iter()
            .enumerate()
            .filter(|(i, b)| b.bus_type == BusType::Pv && gens.iter().any(|g| g.bus == *i))
            .map(|(i, _)| i)
            .collect();

        let constrained: Vec<usize> = branches
            .iter()
            .enumerate()
            .filter(|(_, br)| br.in_service && br.rate.is_some())
            .map(|(l, _)| l)
            .collect();

        debug!(
            n_bus = buses.len(),
            n_branch = branches.len(),
            n_gen = gens.len(),
            n_pv = pv_buses.len(),
            n_constrained = constrained.len(),
            "built per-unit grid model"
        );

        Ok(Self {
            base_mva: base.value(),
            buses,
            branches,
            gens,
            ref_bus,
            ref_gens,
            pv_buses,
            constrained,
        })
    }

    pub fn n_bus(&self) -> usize {
        self.buses.len()
    }

    pub fn n_gen(&self) -> usize {
        self.gens.len()
    }

    pub fn n_branch(&self) -> usize {
        self.branches.len()
    }

    /// Generators connected to each bus.
    pub fn gens_at_bus(&self) -> Vec<Vec<usize>> {
        let mut at = vec![Vec::new(); self.buses.len()];
        for (k, gen) in self.gens.iter().enumerate() {
            at[gen.bus].push(k);
        }
        at
    }

    /// Flow limit squared (pu²) for each constrained branch, in `constrained` order.
    pub fn flow_limits_sq(&self) -> Vec<f64> {
        self.constrained
            .iter()
            .map(|&l| self.branches[l].rate.map_or(f64::INFINITY, |s| s * s))
            .collect()
    }
}
