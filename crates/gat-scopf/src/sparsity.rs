//! # Constant Sparsity Patterns
//!
//! Both patterns are built once, before the first callback, and never change.
//! Numeric values are written into a flat buffer whose `k`-th slot belongs to
//! the `k`-th declared entry, so the engine sees the same structure at every
//! iteration.
//!
//! ## Jacobian
//!
//! ```text
//!                   scenario 0 local   scenario 1 local   ...   global (PV Vm, Pg)
//!                  ┌────────────────┬────────────────┬─────┬───────────────────┐
//!  scenario 0 rows │      J0_L      │                │     │       J0_G        │
//!                  ├────────────────┼────────────────┼─────┼───────────────────┤
//!  scenario 1 rows │                │      J1_L      │     │       J1_G        │
//!                  ├────────────────┴────────────────┴─────┼───────────────────┤
//!  ...             │                  ...                  │        ...        │
//!                  ├───────────────────────────────────────┴───────────────────┤
//!  linear rows     │                       A (constant)                        │
//!                  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Row columns are taken from the union of the nominal and the scenario's
//! connectivity, so a pattern built once covers every topology.
//!
//! ## Hessian
//!
//! Voltage pairs of adjacent buses per scenario (local-local, local-global and
//! the shared PV-voltage block), plus the diagonal of every nominal active
//! power column. Stored lower triangular (`row >= col`).

use crate::connectivity::Connectivity;
use crate::layout::VariableLayout;
use crate::linear::LinearConstraints;
use crate::ScopfError;
use hashbrown::HashMap;
use sprs::{CsMat, TriMat};

/// Fixed set of `(row, col)` positions, sorted row-major.
#[derive(Debug, Clone)]
pub struct SparsityPattern {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    lookup: HashMap<(usize, usize), usize>,
}

impl SparsityPattern {
    pub fn from_entries(
        n_rows: usize,
        n_cols: usize,
        entries: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self, ScopfError> {
        let mut entries: Vec<(usize, usize)> = entries.into_iter().collect();
        if let Some(&(row, col)) = entries.iter().find(|(r, c)| *r >= n_rows || *c >= n_cols) {
            return Err(ScopfError::StructureViolation { row, col });
        }
        entries.sort_unstable();
        entries.dedup();

        let lookup = entries
            .iter()
            .enumerate()
            .map(|(k, &rc)| (rc, k))
            .collect();
        let (rows, cols) = entries.into_iter().unzip();
        Ok(Self {
            n_rows,
            n_cols,
            rows,
            cols,
            lookup,
        })
    }

    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }

    /// Slot of `(row, col)` in the value buffer.
    #[inline]
    pub fn position(&self, row: usize, col: usize) -> Option<usize> {
        self.lookup.get(&(row, col)).copied()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.lookup.contains_key(&(row, col))
    }

    /// Accumulate `value` into the slot of `(row, col)`.
    ///
    /// Writing a nonzero outside the declared structure is a defect: it trips
    /// a debug assertion, and in release builds is reported as
    /// [`ScopfError::StructureViolation`].
    pub fn scatter(
        &self,
        values: &mut [f64],
        row: usize,
        col: usize,
        value: f64,
    ) -> Result<(), ScopfError> {
        match self.position(row, col) {
            Some(k) => {
                values[k] += value;
                Ok(())
            }
            None => {
                debug_assert!(
                    value == 0.0,
                    "nonzero {value} at ({row}, {col}) outside the declared pattern"
                );
                if value == 0.0 {
                    Ok(())
                } else {
                    Err(ScopfError::StructureViolation { row, col })
                }
            }
        }
    }

    pub fn is_lower_triangular(&self) -> bool {
        self.entries().all(|(r, c)| r >= c)
    }

    /// Compressed form of a value buffer laid out in pattern order.
    pub fn to_csr(&self, values: &[f64]) -> Result<CsMat<f64>, ScopfError> {
        ScopfError::check_len("pattern values", self.nnz(), values.len())?;
        let mut tri = TriMat::with_capacity((self.n_rows, self.n_cols), self.nnz());
        for ((r, c), &v) in self.entries().zip(values) {
            tri.add_triplet(r, c, v);
        }
        Ok(tri.to_csr())
    }
}

/// Adjacent buses of `bus` in either view, ascending.
fn union_neighbors(nominal: &Connectivity, view: &Connectivity, bus: usize) -> Vec<usize> {
    let mut buses = nominal.bus_neighbors(bus);
    buses.extend(view.bus_neighbors(bus));
    buses.sort_unstable();
    buses.dedup();
    buses
}

/// Jacobian structure over all scenarios plus the linear rows.
///
/// `views[s]` is scenario `s`'s connectivity; `views[0]` is nominal.
pub fn jacobian_pattern(
    layout: &VariableLayout,
    views: &[Connectivity],
    linear: Option<&LinearConstraints>,
) -> Result<SparsityPattern, ScopfError> {
    ScopfError::check_len("connectivity views", layout.n_scenarios(), views.len())?;
    let nb = layout.n_bus();
    let nc = layout.n_constrained();
    let nominal = &views[0];
    let n_linear = linear.map_or(0, |l| l.n_rows());

    let mut entries = Vec::new();
    for (s, view) in views.iter().enumerate() {
        let map = layout.scenario_map(s);
        let row0 = layout.scenario_row_offset(s);

        for i in 0..nb {
            let (p_row, q_row) = (row0 + i, row0 + nb + i);
            for k in union_neighbors(nominal, view, i) {
                for row in [p_row, q_row] {
                    entries.push((row, map.va(k)));
                    entries.push((row, map.vm(k)));
                }
            }
            for g in nominal.gens_at(i) {
                entries.push((p_row, map.pg(g)));
                entries.push((q_row, map.qg(g)));
            }
        }

        for j in 0..nc {
            let Some((f, t)) = nominal
                .limited_branch_ends(j)
                .or_else(|| view.limited_branch_ends(j))
            else {
                continue;
            };
            for row in [row0 + 2 * nb + j, row0 + 2 * nb + nc + j] {
                entries.extend([
                    (row, map.va(f)),
                    (row, map.va(t)),
                    (row, map.vm(f)),
                    (row, map.vm(t)),
                ]);
            }
        }
    }

    if let Some(linear) = linear {
        let row0 = layout.nonlinear_rows();
        entries.extend(linear.entries.iter().map(|&(r, c, _)| (row0 + r, c)));
    }

    SparsityPattern::from_entries(
        layout.nonlinear_rows() + n_linear,
        layout.total_variables(),
        entries,
    )
}

/// Lower-triangular Lagrangian Hessian structure.
pub fn hessian_pattern(
    layout: &VariableLayout,
    views: &[Connectivity],
) -> Result<SparsityPattern, ScopfError> {
    ScopfError::check_len("connectivity views", layout.n_scenarios(), views.len())?;
    let nb = layout.n_bus();
    let nominal = &views[0];
    let fold = |a: usize, b: usize| (a.max(b), a.min(b));

    let mut entries = Vec::new();
    for (s, view) in views.iter().enumerate() {
        let map = layout.scenario_map(s);
        for i in 0..nb {
            for k in union_neighbors(nominal, view, i) {
                for a in [map.va(i), map.vm(i)] {
                    for b in [map.va(k), map.vm(k)] {
                        entries.push(fold(a, b));
                    }
                }
            }
        }
    }

    // Objective curvature: nominal active power only
    let map = layout.scenario_map(0);
    for g in 0..layout.n_gen() {
        let k = map.pg(g);
        entries.push((k, k));
    }

    let n = layout.total_variables();
    SparsityPattern::from_entries(n, n, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridModel;
    use crate::test_cases::three_bus;

    fn views(grid: &GridModel, outages: &[Option<usize>]) -> Vec<Connectivity> {
        outages
            .iter()
            .map(|&o| Connectivity::for_outage(grid, o))
            .collect()
    }

    #[test]
    fn test_from_entries_sorts_and_dedups() {
        let p = SparsityPattern::from_entries(3, 3, [(2, 0), (0, 1), (2, 0), (1, 1)]).unwrap();
        assert_eq!(p.nnz(), 3);
        assert_eq!(p.rows(), &[0, 1, 2]);
        assert_eq!(p.cols(), &[1, 1, 0]);
        assert_eq!(p.position(2, 0), Some(2));
        assert!(!p.contains(0, 0));
    }

    #[test]
    fn test_out_of_range_entry_rejected() {
        assert!(matches!(
            SparsityPattern::from_entries(2, 2, [(0, 2)]),
            Err(ScopfError::StructureViolation { row: 0, col: 2 })
        ));
    }

    #[test]
    fn test_scatter_accumulates() {
        let p = SparsityPattern::from_entries(2, 2, [(0, 0), (1, 1)]).unwrap();
        let mut vals = vec![0.0; 2];
        p.scatter(&mut vals, 1, 1, 2.0).unwrap();
        p.scatter(&mut vals, 1, 1, 0.5).unwrap();
        // Structural zero outside the pattern is tolerated
        p.scatter(&mut vals, 0, 1, 0.0).unwrap();
        assert_eq!(vals, vec![0.0, 2.5]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside the declared pattern")]
    fn test_scatter_outside_pattern_asserts() {
        let p = SparsityPattern::from_entries(2, 2, [(0, 0)]).unwrap();
        let mut vals = vec![0.0; 1];
        let _ = p.scatter(&mut vals, 1, 0, 1.0);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_scatter_outside_pattern_errors() {
        let p = SparsityPattern::from_entries(2, 2, [(0, 0)]).unwrap();
        let mut vals = vec![0.0; 1];
        assert!(matches!(
            p.scatter(&mut vals, 1, 0, 1.0),
            Err(ScopfError::StructureViolation { row: 1, col: 0 })
        ));
    }

    #[test]
    fn test_jacobian_dimensions() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let layout = VariableLayout::from_grid(&grid, 2).unwrap();
        let conn = views(&grid, &[None, Some(1)]);
        let jac = jacobian_pattern(&layout, &conn, None).unwrap();
        assert_eq!(jac.shape(), (2 * (6 + 6), layout.total_variables()));
    }

    #[test]
    fn test_jacobian_keeps_outaged_flow_rows() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let layout = VariableLayout::from_grid(&grid, 2).unwrap();
        let conn = views(&grid, &[None, Some(1)]);
        let jac = jacobian_pattern(&layout, &conn, None).unwrap();

        // Branch 1 (bus indices 1 and 2) flow row in scenario 1 is still declared
        let row = layout.scenario_row_offset(1) + 2 * 3 + 1;
        let map = layout.scenario_map(1);
        assert!(jac.contains(row, map.va(1)));
        assert!(jac.contains(row, map.vm(2)));
        // P row at bus 1 still covers bus 2 through the nominal topology
        assert!(jac.contains(layout.scenario_row_offset(1) + 1, map.va(2)));
    }

    #[test]
    fn test_jacobian_with_linear_rows() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let layout = VariableLayout::from_grid(&grid, 1).unwrap();
        let conn = views(&grid, &[None]);
        let mut lin = LinearConstraints::new();
        lin.add_row(&[(0, 1.0), (4, 1.0)], 0.0, 1.0);
        let jac = jacobian_pattern(&layout, &conn, Some(&lin)).unwrap();
        let row = layout.nonlinear_rows();
        assert_eq!(jac.shape().0, row + 1);
        assert!(jac.contains(row, 0));
        assert!(jac.contains(row, 4));
    }

    #[test]
    fn test_hessian_lower_triangular() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let layout = VariableLayout::from_grid(&grid, 2).unwrap();
        let conn = views(&grid, &[None, Some(0)]);
        let hess = hessian_pattern(&layout, &conn).unwrap();
        assert!(hess.is_lower_triangular());

        // Nominal reference Pg carries the objective diagonal; scenario 1's does not
        let pg0 = layout.scenario_map(0).pg(0);
        let pg1 = layout.scenario_map(1).pg(0);
        assert!(hess.contains(pg0, pg0));
        assert!(!hess.contains(pg1, pg1));
    }

    #[test]
    fn test_to_csr_roundtrip_values() {
        let p = SparsityPattern::from_entries(2, 3, [(0, 2), (1, 0)]).unwrap();
        let m = p.to_csr(&[4.0, -1.0]).unwrap();
        assert_eq!(m.get(0, 2).copied(), Some(4.0));
        assert_eq!(m.get(1, 0).copied(), Some(-1.0));
        assert!(p.to_csr(&[1.0]).is_err());
    }
}
