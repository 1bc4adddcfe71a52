//! # gat-core: Case Data for Security-Constrained OPF
//!
//! Provides the bus, branch, generator and load tables that the SCOPF
//! formulation in `gat-scopf` consumes, together with validation, JSON I/O and
//! topology helpers.
//!
//! ## Design Philosophy
//!
//! Case data is kept in **engineering units** exactly as it appears in
//! MATPOWER-style tables (MW, Mvar, MVA, degrees). Conversion to per-unit and
//! radians happens once, when a formulation builds its internal model. The
//! unit newtypes in [`units`] make the boundary explicit.
//!
//! Every branch must carry an explicit thermal rating: either
//! [`FlowRating::Limited`] with a positive MVA value or
//! [`FlowRating::Unlimited`]. A missing rating (`None`) is representable so that
//! incomplete data can be loaded and reported, but formulations reject it.
//!
//! ## Quick Start
//!
//! ```rust
//! use gat_core::*;
//!
//! let mut network = Network::new(MegavoltAmperes(100.0));
//! network.buses.push(Bus {
//!     id: BusId::new(1),
//!     name: "Bus 1".to_string(),
//!     bus_type: BusType::Ref,
//!     ..Bus::default()
//! });
//! network.buses.push(Bus {
//!     id: BusId::new(2),
//!     name: "Bus 2".to_string(),
//!     ..Bus::default()
//! });
//! network.branches.push(Branch {
//!     id: BranchId::new(1),
//!     from_bus: BusId::new(1),
//!     to_bus: BusId::new(2),
//!     resistance: 0.01,
//!     reactance: 0.1,
//!     rating: Some(FlowRating::Limited(MegavoltAmperes(150.0))),
//!     ..Branch::default()
//! });
//! network.generators.push(
//!     Gen::new(GenId::new(1), "G1".to_string(), BusId::new(1))
//!         .with_p_limits(0.0, 200.0)
//!         .with_cost(CostModel::quadratic(0.0, 20.0, 0.01)),
//! );
//! network.loads.push(Load {
//!     id: LoadId::new(1),
//!     name: "L2".to_string(),
//!     bus: BusId::new(2),
//!     active_power: Megawatts(80.0),
//!     reactive_power: Megavars(20.0),
//! });
//!
//! network.validate().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit newtypes and per-unit conversion
//! - [`error`] - [`GatError`] and [`GatResult`]
//! - [`graph_utils`] - Island counting and outage screening (petgraph)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub mod error;
pub mod graph_utils;
pub mod units;

pub use error::{GatError, GatResult};
pub use graph_utils::{island_count, outage_islands, radial_branches};
pub use units::{Degrees, Kilovolts, Megavars, MegavoltAmperes, Megawatts, PerUnit, Radians};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

macro_rules! impl_id {
    ($type:ident) => {
        impl $type {
            #[inline]
            pub fn new(value: usize) -> Self {
                $type(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }
    };
}

impl_id!(BusId);
impl_id!(BranchId);
impl_id!(GenId);
impl_id!(LoadId);

/// MATPOWER bus classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Load bus: fixed P and Q demand
    #[default]
    Pq,
    /// Voltage-controlled generator bus
    Pv,
    /// Reference (slack) bus: angle reference, absorbs losses
    Ref,
    /// Isolated bus, not part of the formulation
    Isolated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub bus_type: BusType,
    pub base_kv: Kilovolts,
    /// Shunt conductance, MW consumed at 1.0 pu voltage
    pub gs: Megawatts,
    /// Shunt susceptance, Mvar injected at 1.0 pu voltage
    pub bs: Megavars,
    /// Stored voltage magnitude (initial guess or previous solution)
    pub vm: PerUnit,
    /// Stored voltage angle. For the reference bus this is the angle reference.
    pub va: Degrees,
    pub vmin: PerUnit,
    pub vmax: PerUnit,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            bus_type: BusType::Pq,
            base_kv: Kilovolts(138.0),
            gs: Megawatts(0.0),
            bs: Megavars(0.0),
            vm: PerUnit(1.0),
            va: Degrees(0.0),
            vmin: PerUnit(0.9),
            vmax: PerUnit(1.1),
        }
    }
}

/// Thermal rating of a branch.
///
/// Serialized as `{"limited": 250.0}` or `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRating {
    /// Apparent-power limit enforced at both branch ends
    Limited(MegavoltAmperes),
    /// No flow limit; the branch is left out of the constrained set
    Unlimited,
}

impl FlowRating {
    /// The MVA limit, or `None` for an unlimited branch.
    pub fn limit(&self) -> Option<MegavoltAmperes> {
        match self {
            FlowRating::Limited(s) => Some(*s),
            FlowRating::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (pu)
    pub resistance: f64,
    /// Series reactance (pu)
    pub reactance: f64,
    /// Total line charging susceptance (pu)
    pub charging_b: f64,
    /// Off-nominal tap ratio on the from side; 0.0 means nominal (1.0)
    pub tap_ratio: f64,
    pub phase_shift: Degrees,
    /// Explicit thermal rating; `None` means the data is missing
    pub rating: Option<FlowRating>,
    /// In-service status
    pub status: bool,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId(0),
            name: String::new(),
            from_bus: BusId(0),
            to_bus: BusId(0),
            resistance: 0.0,
            reactance: 0.0,
            charging_b: 0.0,
            tap_ratio: 1.0,
            phase_shift: Degrees(0.0),
            rating: None,
            status: true,
        }
    }
}

impl Branch {
    /// Effective tap ratio, mapping the MATPOWER `0` convention to 1.0.
    pub fn effective_tap(&self) -> f64 {
        if self.tap_ratio == 0.0 {
            1.0
        } else {
            self.tap_ratio
        }
    }
}

/// Generator cost curve in $/h as a function of MW output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// No cost function specified
    #[default]
    NoCost,
    /// Polynomial cost: `cost = sum(coeffs[i] * P^i)` where `coeffs[0]` is constant term.
    /// For quadratic: `coeffs = [c0, c1, c2]` means `cost = c0 + c1*P + c2*P^2`.
    Polynomial(Vec<f64>),
}

impl CostModel {
    /// Create quadratic cost: c0 + c1*P + c2*P^2
    pub fn quadratic(c0: f64, c1: f64, c2: f64) -> Self {
        CostModel::Polynomial(vec![c0, c1, c2])
    }

    /// Create linear cost: c0 + c1*P (marginal cost c1 in $/MWh)
    pub fn linear(c0: f64, c1: f64) -> Self {
        CostModel::Polynomial(vec![c0, c1])
    }

    /// Evaluate cost at given power output ($/hr)
    pub fn evaluate(&self, p_mw: f64) -> f64 {
        match self {
            CostModel::NoCost => 0.0,
            CostModel::Polynomial(coeffs) => coeffs.iter().rev().fold(0.0, |acc, c| acc * p_mw + c),
        }
    }

    /// Marginal cost at given power ($/MWh)
    pub fn marginal_cost(&self, p_mw: f64) -> f64 {
        match self {
            CostModel::NoCost => 0.0,
            CostModel::Polynomial(coeffs) => coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, c)| (i as f64) * c * p_mw.powi(i as i32 - 1))
                .sum(),
        }
    }

    /// Second derivative of the cost curve ($/MW²h)
    pub fn curvature(&self, p_mw: f64) -> f64 {
        match self {
            CostModel::NoCost => 0.0,
            CostModel::Polynomial(coeffs) => coeffs
                .iter()
                .enumerate()
                .skip(2)
                .map(|(i, c)| (i * (i - 1)) as f64 * c * p_mw.powi(i as i32 - 2))
                .sum(),
        }
    }

    /// Check if this cost model has actual cost data
    pub fn has_cost(&self) -> bool {
        !matches!(self, CostModel::NoCost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Stored active power output (MW)
    pub active_power: Megawatts,
    /// Stored reactive power output (Mvar)
    pub reactive_power: Megavars,
    pub pmin: Megawatts,
    /// Omitted from JSON when unbounded; JSON has no infinity
    #[serde(skip_serializing_if = "is_unbounded_above_mw")]
    pub pmax: Megawatts,
    #[serde(skip_serializing_if = "is_unbounded_below_mvar")]
    pub qmin: Megavars,
    #[serde(skip_serializing_if = "is_unbounded_above_mvar")]
    pub qmax: Megavars,
    /// Voltage setpoint (pu)
    pub voltage_setpoint: PerUnit,
    /// In-service status
    pub status: bool,
    pub cost_model: CostModel,
}

fn is_unbounded_above_mw(value: &Megawatts) -> bool {
    value.0 == f64::INFINITY
}

fn is_unbounded_below_mvar(value: &Megavars) -> bool {
    value.0 == f64::NEG_INFINITY
}

fn is_unbounded_above_mvar(value: &Megavars) -> bool {
    value.0 == f64::INFINITY
}

impl Default for Gen {
    fn default() -> Self {
        Self {
            id: GenId(0),
            name: String::new(),
            bus: BusId(0),
            active_power: Megawatts(0.0),
            reactive_power: Megavars(0.0),
            pmin: Megawatts(0.0),
            pmax: Megawatts(f64::INFINITY),
            qmin: Megavars(f64::NEG_INFINITY),
            qmax: Megavars(f64::INFINITY),
            voltage_setpoint: PerUnit(1.0),
            status: true,
            cost_model: CostModel::NoCost,
        }
    }
}

impl Gen {
    pub fn new(id: GenId, name: String, bus: BusId) -> Self {
        Self {
            id,
            name,
            bus,
            ..Self::default()
        }
    }

    pub fn with_p_limits(mut self, pmin_mw: f64, pmax_mw: f64) -> Self {
        self.pmin = Megawatts(pmin_mw);
        self.pmax = Megawatts(pmax_mw);
        self
    }

    pub fn with_q_limits(mut self, qmin_mvar: f64, qmax_mvar: f64) -> Self {
        self.qmin = Megavars(qmin_mvar);
        self.qmax = Megavars(qmax_mvar);
        self
    }

    pub fn with_cost(mut self, cost: CostModel) -> Self {
        self.cost_model = cost;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub active_power: Megawatts,
    pub reactive_power: Megavars,
}

/// Case tables plus the system MVA base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,
    pub base_mva: MegavoltAmperes,
    #[serde(default)]
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub generators: Vec<Gen>,
    #[serde(default)]
    pub loads: Vec<Load>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(MegavoltAmperes(100.0))
    }
}

impl Network {
    pub fn new(base_mva: MegavoltAmperes) -> Self {
        Self {
            name: String::new(),
            base_mva,
            buses: Vec::new(),
            branches: Vec::new(),
            generators: Vec::new(),
            loads: Vec::new(),
        }
    }

    /// Map from bus ID to its position in [`Network::buses`].
    pub fn bus_index_map(&self) -> HashMap<BusId, usize> {
        self.buses
            .iter()
            .enumerate()
            .map(|(idx, bus)| (bus.id, idx))
            .collect()
    }

    /// Position of a bus in [`Network::buses`].
    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.buses.iter().position(|b| b.id == id)
    }

    /// Total demand per bus position, summing every load attached to the bus.
    pub fn bus_demand(&self) -> GatResult<Vec<(Megawatts, Megavars)>> {
        let index = self.bus_index_map();
        let mut demand = vec![(Megawatts(0.0), Megavars(0.0)); self.buses.len()];
        for load in &self.loads {
            let idx = *index.get(&load.bus).ok_or_else(|| {
                GatError::Network(format!(
                    "load {} references unknown bus {}",
                    load.id.value(),
                    load.bus.value()
                ))
            })?;
            demand[idx].0 = demand[idx].0 + load.active_power;
            demand[idx].1 = demand[idx].1 + load.reactive_power;
        }
        Ok(demand)
    }

    /// Structural and range checks on the tables.
    ///
    /// Ratings are not checked here; a missing rating is a formulation
    /// concern, so incomplete cases can still be loaded and inspected.
    pub fn validate(&self) -> GatResult<()> {
        if !(self.base_mva.value() > 0.0) || !self.base_mva.is_finite() {
            return Err(GatError::Validation(format!(
                "base MVA must be positive and finite, got {}",
                self.base_mva.value()
            )));
        }
        if self.buses.is_empty() {
            return Err(GatError::Validation("network has no buses".to_string()));
        }

        let mut seen = HashSet::new();
        for bus in &self.buses {
            if !seen.insert(bus.id) {
                return Err(GatError::Validation(format!(
                    "duplicate bus id {}",
                    bus.id.value()
                )));
            }
            if bus.vmin.value() > bus.vmax.value() {
                return Err(GatError::Validation(format!(
                    "bus {} has vmin {} > vmax {}",
                    bus.id.value(),
                    bus.vmin.value(),
                    bus.vmax.value()
                )));
            }
        }

        let known = |id: BusId| seen.contains(&id);
        for branch in &self.branches {
            if !known(branch.from_bus) || !known(branch.to_bus) {
                return Err(GatError::Network(format!(
                    "branch {} connects unknown bus ({} -> {})",
                    branch.id.value(),
                    branch.from_bus.value(),
                    branch.to_bus.value()
                )));
            }
            if branch.status && branch.resistance == 0.0 && branch.reactance == 0.0 {
                return Err(GatError::Validation(format!(
                    "branch {} has zero impedance",
                    branch.id.value()
                )));
            }
        }

        for gen in &self.generators {
            if !known(gen.bus) {
                return Err(GatError::Network(format!(
                    "generator {} references unknown bus {}",
                    gen.id.value(),
                    gen.bus.value()
                )));
            }
            if gen.pmin.value() > gen.pmax.value() || gen.qmin.value() > gen.qmax.value() {
                return Err(GatError::Validation(format!(
                    "generator {} has inverted limits",
                    gen.id.value()
                )));
            }
        }

        for load in &self.loads {
            if !known(load.bus) {
                return Err(GatError::Network(format!(
                    "load {} references unknown bus {}",
                    load.id.value(),
                    load.bus.value()
                )));
            }
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> GatResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> GatResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> GatResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
