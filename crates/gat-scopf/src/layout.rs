//! # Variable Layout
//!
//! Maps every decision variable of every scenario onto one flat vector.
//!
//! ## Flat Vector Structure
//!
//! ```text
//! ┌──────────────── scenario 0 ───────────────┐      ┌──── scenario ns-1 ───┐ ┌──── global ────┐
//! │ Va (all) │ Vm (non-PV) │ Qg (all) │ Pg_ref │ .... │ Va │ Vm │ Qg │ Pg_ref │ │ Vm (PV) │ Pg  │
//! └───────────────────────────────────────────┘      └──────────────────────┘ └────────────────┘
//!   n_local = n_bus + n_nonpv + n_gen + 1                                  n_global = n_pv + n_gen - 1
//! ```
//!
//! Local variables are replicated per scenario: each contingency re-solves the
//! power flow with its own angles, non-PV voltages, reactive outputs and
//! reference-generator output (which picks up the changed losses). Global
//! variables are decided once and shared: PV voltage setpoints and the active
//! dispatch of every other generator.
//!
//! ## Physical Column Space
//!
//! The power-flow model works on a per-scenario vector ordered
//! `[Va (n_bus) | Vm (n_bus) | Pg (n_gen) | Qg (n_gen)]`. A
//! [`ScenarioIndexMap`] translates each physical column to its flat position
//! for one scenario, so the evaluator never needs to know which role a
//! column plays.

use crate::grid::GridModel;
use crate::ScopfError;
use std::ops::Range;

/// Per-scenario variable roles, in block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalRole {
    VoltageAngle,
    VoltageMagnitude,
    ReactivePower,
    ReferenceActivePower,
}

/// Shared variable roles, in block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalRole {
    PvVoltageMagnitude,
    ActivePower,
}

/// Offsets of the physical `[Va | Vm | Pg | Qg]` column space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalIndex {
    pub n_bus: usize,
    pub n_gen: usize,
}

impl PhysicalIndex {
    #[inline]
    pub fn va(&self, bus: usize) -> usize {
        bus
    }
    #[inline]
    pub fn vm(&self, bus: usize) -> usize {
        self.n_bus + bus
    }
    #[inline]
    pub fn pg(&self, gen: usize) -> usize {
        2 * self.n_bus + gen
    }
    #[inline]
    pub fn qg(&self, gen: usize) -> usize {
        2 * self.n_bus + self.n_gen + gen
    }
    #[inline]
    pub fn len(&self) -> usize {
        2 * (self.n_bus + self.n_gen)
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flat positions of every physical column for one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioIndexMap {
    pub scenario: usize,
    phys: PhysicalIndex,
    to_flat: Vec<usize>,
}

impl ScenarioIndexMap {
    pub fn va(&self, bus: usize) -> usize {
        self.to_flat[self.phys.va(bus)]
    }
    pub fn vm(&self, bus: usize) -> usize {
        self.to_flat[self.phys.vm(bus)]
    }
    pub fn pg(&self, gen: usize) -> usize {
        self.to_flat[self.phys.pg(gen)]
    }
    pub fn qg(&self, gen: usize) -> usize {
        self.to_flat[self.phys.qg(gen)]
    }

    /// Flat position of a physical column.
    #[inline]
    pub fn flat(&self, physical_col: usize) -> usize {
        self.to_flat[physical_col]
    }

    /// The full physical-to-flat table.
    pub fn columns(&self) -> &[usize] {
        &self.to_flat
    }

    /// Gather this scenario's physical vector out of a flat point.
    pub fn gather(&self, x: &[f64]) -> Vec<f64> {
        self.to_flat.iter().map(|&k| x[k]).collect()
    }
}

#[derive(Debug, Clone)]
pub struct VariableLayout {
    n_bus: usize,
    n_gen: usize,
    n_constrained: usize,
    n_scenarios: usize,
    ref_bus: usize,
    ref_gen: usize,
    pv_buses: Vec<usize>,
    non_pv_buses: Vec<usize>,
    non_ref_gens: Vec<usize>,
    n_local: usize,
    n_global: usize,
}

impl VariableLayout {
    /// Build the layout.
    ///
    /// `ref_gens` lists every in-service generator on the reference bus; the
    /// formulation supports exactly one.
    pub fn new(
        n_bus: usize,
        n_gen: usize,
        n_constrained: usize,
        n_scenarios: usize,
        ref_bus: usize,
        ref_gens: &[usize],
        pv_buses: &[usize],
    ) -> Result<Self, ScopfError> {
        if n_scenarios == 0 {
            return Err(ScopfError::DataValidation(
                "at least the nominal scenario is required".to_string(),
            ));
        }
        if ref_bus >= n_bus {
            return Err(ScopfError::DataValidation(format!(
                "reference bus {ref_bus} out of range ({n_bus} buses)"
            )));
        }
        let ref_gen = match ref_gens {
            [] => return Err(ScopfError::NoReferenceGenerator(ref_bus)),
            [g] => *g,
            many => return Err(ScopfError::MultipleReferenceGenerators(many.to_vec())),
        };
        if ref_gen >= n_gen {
            return Err(ScopfError::DataValidation(format!(
                "reference generator {ref_gen} out of range ({n_gen} generators)"
            )));
        }

        let mut is_pv = vec![false; n_bus];
        for &b in pv_buses {
            if b >= n_bus || b == ref_bus || is_pv[b] {
                return Err(ScopfError::DataValidation(format!(
                    "invalid PV bus index {b}"
                )));
            }
            is_pv[b] = true;
        }
        let pv_buses: Vec<usize> = (0..n_bus).filter(|&b| is_pv[b]).collect();
        let non_pv_buses: Vec<usize> = (0..n_bus).filter(|&b| !is_pv[b]).collect();
        let non_ref_gens: Vec<usize> = (0..n_gen).filter(|&g| g != ref_gen).collect();

        let n_local = n_bus + non_pv_buses.len() + n_gen + 1;
        let n_global = pv_buses.len() + non_ref_gens.len();

        Ok(Self {
            n_bus,
            n_gen,
            n_constrained,
            n_scenarios,
            ref_bus,
            ref_gen,
            pv_buses,
            non_pv_buses,
            non_ref_gens,
            n_local,
            n_global,
        })
    }

    pub fn from_grid(grid: &GridModel, n_scenarios: usize) -> Result<Self, ScopfError> {
        Self::new(
            grid.n_bus(),
            grid.n_gen(),
            grid.constrained.len(),
            n_scenarios,
            grid.ref_bus,
            &grid.ref_gens,
            &grid.pv_buses,
        )
    }

    pub fn n_bus(&self) -> usize {
        self.n_bus
    }
    pub fn n_gen(&self) -> usize {
        self.n_gen
    }
    pub fn n_constrained(&self) -> usize {
        self.n_constrained
    }
    pub fn n_scenarios(&self) -> usize {
        self.n_scenarios
    }
    pub fn n_local(&self) -> usize {
        self.n_local
    }
    pub fn n_global(&self) -> usize {
        self.n_global
    }
    pub fn ref_bus(&self) -> usize {
        self.ref_bus
    }
    pub fn ref_gen(&self) -> usize {
        self.ref_gen
    }
    pub fn pv_buses(&self) -> &[usize] {
        &self.pv_buses
    }
    pub fn non_pv_buses(&self) -> &[usize] {
        &self.non_pv_buses
    }
    pub fn non_ref_gens(&self) -> &[usize] {
        &self.non_ref_gens
    }

    /// `ns * n_local + n_global`
    pub fn total_variables(&self) -> usize {
        self.n_scenarios * self.n_local + self.n_global
    }

    pub fn physical(&self) -> PhysicalIndex {
        PhysicalIndex {
            n_bus: self.n_bus,
            n_gen: self.n_gen,
        }
    }

    /// Flat range of scenario `s`'s local block.
    pub fn local_indices(&self, s: usize) -> Range<usize> {
        let start = s * self.n_local;
        start..start + self.n_local
    }

    /// Flat range of the shared block.
    pub fn global_indices(&self) -> Range<usize> {
        let start = self.n_scenarios * self.n_local;
        start..start + self.n_global
    }

    /// Range of a role inside any local block.
    pub fn local_role_slice(&self, role: LocalRole) -> Range<usize> {
        let n_vm = self.non_pv_buses.len();
        match role {
            LocalRole::VoltageAngle => 0..self.n_bus,
            LocalRole::VoltageMagnitude => self.n_bus..self.n_bus + n_vm,
            LocalRole::ReactivePower => self.n_bus + n_vm..self.n_bus + n_vm + self.n_gen,
            LocalRole::ReferenceActivePower => self.n_local - 1..self.n_local,
        }
    }

    /// Absolute flat range of a global role.
    pub fn global_role_slice(&self, role: GlobalRole) -> Range<usize> {
        let start = self.global_indices().start;
        let n_pv = self.pv_buses.len();
        match role {
            GlobalRole::PvVoltageMagnitude => start..start + n_pv,
            GlobalRole::ActivePower => start + n_pv..start + self.n_global,
        }
    }

    /// Flat position of scenario `s`'s reference-bus angle.
    pub fn ref_angle_index(&self, s: usize) -> usize {
        self.local_indices(s).start + self.ref_bus
    }

    /// Physical-to-flat table for scenario `s`.
    pub fn scenario_map(&self, s: usize) -> ScenarioIndexMap {
        let phys = self.physical();
        let local = self.local_indices(s).start;
        let mut to_flat = vec![usize::MAX; phys.len()];

        let va = local + self.local_role_slice(LocalRole::VoltageAngle).start;
        for bus in 0..self.n_bus {
            to_flat[phys.va(bus)] = va + bus;
        }

        let vm_local = local + self.local_role_slice(LocalRole::VoltageMagnitude).start;
        for (k, &bus) in self.non_pv_buses.iter().enumerate() {
            to_flat[phys.vm(bus)] = vm_local + k;
        }
        let vm_global = self.global_role_slice(GlobalRole::PvVoltageMagnitude).start;
        for (k, &bus) in self.pv_buses.iter().enumerate() {
            to_flat[phys.vm(bus)] = vm_global + k;
        }

        let qg = local + self.local_role_slice(LocalRole::ReactivePower).start;
        for gen in 0..self.n_gen {
            to_flat[phys.qg(gen)] = qg + gen;
        }

        to_flat[phys.pg(self.ref_gen)] =
            local + self.local_role_slice(LocalRole::ReferenceActivePower).start;
        let pg_global = self.global_role_slice(GlobalRole::ActivePower).start;
        for (k, &gen) in self.non_ref_gens.iter().enumerate() {
            to_flat[phys.pg(gen)] = pg_global + k;
        }

        ScenarioIndexMap {
            scenario: s,
            phys,
            to_flat,
        }
    }

    /// Whether a flat position belongs to the shared block.
    pub fn is_global(&self, flat: usize) -> bool {
        self.global_indices().contains(&flat)
    }

    /// Constraint rows per scenario: P and Q balance, then from/to flow limits.
    pub fn rows_per_scenario(&self) -> usize {
        2 * self.n_bus + 2 * self.n_constrained
    }

    pub fn scenario_row_offset(&self, s: usize) -> usize {
        s * self.rows_per_scenario()
    }

    /// Number of nonlinear constraint rows across all scenarios.
    pub fn nonlinear_rows(&self) -> usize {
        self.n_scenarios * self.rows_per_scenario()
    }

    /// Whether a row (within a scenario block) is a flow-limit inequality.
    pub fn is_inequality_row(&self, row_in_scenario: usize) -> bool {
        row_in_scenario >= 2 * self.n_bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_bus_like(ns: usize) -> VariableLayout {
        // 5 buses, bus 0 reference, PV buses 1 and 3, 3 generators
        VariableLayout::new(5, 3, 6, ns, 0, &[0], &[1, 3]).unwrap()
    }

    #[test]
    fn test_block_sizes() {
        let layout = five_bus_like(3);
        assert_eq!(layout.n_local(), 5 + 3 + 3 + 1);
        assert_eq!(layout.n_global(), 2 + 2);
        assert_eq!(layout.total_variables(), 3 * 12 + 4);
        assert_eq!(layout.global_indices(), 36..40);
        assert_eq!(layout.rows_per_scenario(), 2 * 5 + 2 * 6);
    }

    #[test]
    fn test_role_slices() {
        let layout = five_bus_like(2);
        assert_eq!(layout.local_role_slice(LocalRole::VoltageAngle), 0..5);
        assert_eq!(layout.local_role_slice(LocalRole::VoltageMagnitude), 5..8);
        assert_eq!(layout.local_role_slice(LocalRole::ReactivePower), 8..11);
        assert_eq!(layout.local_role_slice(LocalRole::ReferenceActivePower), 11..12);
        assert_eq!(layout.global_role_slice(GlobalRole::PvVoltageMagnitude), 24..26);
        assert_eq!(layout.global_role_slice(GlobalRole::ActivePower), 26..28);
    }

    #[test]
    fn test_scenario_map_shares_globals() {
        let layout = five_bus_like(3);
        let m0 = layout.scenario_map(0);
        let m2 = layout.scenario_map(2);

        // PV magnitudes and non-reference Pg are the same flat positions
        assert_eq!(m0.vm(1), m2.vm(1));
        assert_eq!(m0.vm(3), m2.vm(3));
        assert_eq!(m0.pg(1), m2.pg(1));
        assert_eq!(m0.pg(2), m2.pg(2));

        // Everything else is per scenario
        assert_eq!(m2.va(0), 24);
        assert_eq!(m2.vm(0), 24 + 5);
        assert_eq!(m2.vm(2), 24 + 6);
        assert_eq!(m2.qg(0), 24 + 8);
        assert_eq!(m2.pg(0), 24 + 11);
        assert_eq!(layout.ref_angle_index(2), 24);
    }

    #[test]
    fn test_no_unmapped_columns() {
        let layout = five_bus_like(2);
        for s in 0..2 {
            let map = layout.scenario_map(s);
            assert!(map.columns().iter().all(|&k| k < layout.total_variables()));
        }
    }

    #[test]
    fn test_gather() {
        let layout = VariableLayout::new(2, 1, 1, 1, 0, &[0], &[]).unwrap();
        // [va0 va1 vm0 vm1 qg0 pg0]
        let x = [0.0, -0.1, 1.02, 0.98, 0.3, 0.7];
        let phys = layout.scenario_map(0).gather(&x);
        assert_eq!(phys, vec![0.0, -0.1, 1.02, 0.98, 0.7, 0.3]);
    }

    #[test]
    fn test_multiple_reference_generators_rejected() {
        let err = VariableLayout::new(3, 2, 3, 1, 0, &[0, 1], &[]).unwrap_err();
        assert!(matches!(err, ScopfError::MultipleReferenceGenerators(ref g) if g == &vec![0, 1]));
    }

    #[test]
    fn test_missing_reference_generator_rejected() {
        let err = VariableLayout::new(3, 2, 3, 1, 0, &[], &[]).unwrap_err();
        assert!(matches!(err, ScopfError::NoReferenceGenerator(0)));
    }

    #[test]
    fn test_zero_scenarios_rejected() {
        assert!(VariableLayout::new(3, 1, 3, 0, 0, &[0], &[]).is_err());
    }

    #[test]
    fn test_reference_bus_cannot_be_pv() {
        assert!(VariableLayout::new(3, 2, 3, 1, 0, &[0], &[0]).is_err());
    }
}
