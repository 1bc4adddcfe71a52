//! Incidence and adjacency matrices.
//!
//! | Matrix | Shape | Meaning |
//! |--------|-------|---------|
//! | `Cf`  | nl × nb | branch → from bus |
//! | `Ct`  | nl × nb | branch → to bus |
//! | `Cl`  | nl × nb | `Cf + Ct` |
//! | `Cb`  | nb × nb | `Cl'Cl + I`, bus adjacency including self |
//! | `Cg`  | nb × ng | generator → bus |
//! | `Cl2` | nc × nl | selector of flow-limited branches |
//!
//! A contingency view is built the same way with the outaged branch left out,
//! which empties its rows in `Cf`, `Ct`, `Cl` and its selector row in `Cl2`
//! while keeping every dimension. Only the structure matters downstream;
//! values are 1.0 (or sums of 1.0 where entries coincide).

use crate::grid::GridModel;
use sprs::{CsMat, TriMat};

#[derive(Debug, Clone)]
pub struct Connectivity {
    pub cf: CsMat<f64>,
    pub ct: CsMat<f64>,
    pub cl: CsMat<f64>,
    pub cb: CsMat<f64>,
    pub cg: CsMat<f64>,
    pub cl2: CsMat<f64>,
    /// Branch removed in this view, if any
    pub outage: Option<usize>,
}

impl Connectivity {
    pub fn nominal(grid: &GridModel) -> Self {
        Self::build(grid, None)
    }

    pub fn contingency(grid: &GridModel, branch: usize) -> Self {
        Self::build(grid, Some(branch))
    }

    /// View for an optional outage.
    pub fn for_outage(grid: &GridModel, outage: Option<usize>) -> Self {
        Self::build(grid, outage)
    }

    fn build(grid: &GridModel, outage: Option<usize>) -> Self {
        let nb = grid.n_bus();
        let nl = grid.n_branch();
        let ng = grid.n_gen();
        let nc = grid.constrained.len();

        let mut cf = TriMat::new((nl, nb));
        let mut ct = TriMat::new((nl, nb));
        let mut cl = TriMat::new((nl, nb));
        for (l, br) in grid.branches.iter().enumerate() {
            if !br.in_service || Some(l) == outage {
                continue;
            }
            cf.add_triplet(l, br.from, 1.0);
            ct.add_triplet(l, br.to, 1.0);
            cl.add_triplet(l, br.from, 1.0);
            cl.add_triplet(l, br.to, 1.0);
        }
        let cl: CsMat<f64> = cl.to_csr();

        // Cl'Cl accumulated row by row, plus the identity
        let mut cb = TriMat::new((nb, nb));
        for row in cl.outer_iterator() {
            for (a, &va) in row.iter() {
                for (b, &vb) in row.iter() {
                    cb.add_triplet(a, b, va * vb);
                }
            }
        }
        for i in 0..nb {
            cb.add_triplet(i, i, 1.0);
        }

        let mut cg = TriMat::new((nb, ng));
        for (k, gen) in grid.gens.iter().enumerate() {
            cg.add_triplet(gen.bus, k, 1.0);
        }

        let mut cl2 = TriMat::new((nc, nl));
        for (j, &l) in grid.constrained.iter().enumerate() {
            if Some(l) != outage {
                cl2.add_triplet(j, l, 1.0);
            }
        }

        Self {
            cf: cf.to_csr(),
            ct: ct.to_csr(),
            cl,
            cb: cb.to_csr(),
            cg: cg.to_csr(),
            cl2: cl2.to_csr(),
            outage,
        }
    }

    /// Buses adjacent to `bus`, including `bus` itself, in ascending order.
    pub fn bus_neighbors(&self, bus: usize) -> Vec<usize> {
        self.cb
            .outer_view(bus)
            .map(|row| row.indices().to_vec())
            .unwrap_or_default()
    }

    /// Generators connected at `bus`.
    pub fn gens_at(&self, bus: usize) -> Vec<usize> {
        self.cg
            .outer_view(bus)
            .map(|row| row.indices().to_vec())
            .unwrap_or_default()
    }

    /// `(from, to)` buses of the branch selected by `Cl2` row `j`, or `None`
    /// when the row is empty in this view.
    pub fn limited_branch_ends(&self, j: usize) -> Option<(usize, usize)> {
        let l = self.cl2.outer_view(j)?.indices().first().copied()?;
        let from = self.cf.outer_view(l)?.indices().first().copied()?;
        let to = self.ct.outer_view(l)?.indices().first().copied()?;
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_cases::{five_bus, three_bus};

    fn grid3() -> GridModel {
        GridModel::from_network(&three_bus()).unwrap()
    }

    #[test]
    fn test_nominal_shapes() {
        let conn = Connectivity::nominal(&grid3());
        assert_eq!(conn.cf.shape(), (3, 3));
        assert_eq!(conn.cb.shape(), (3, 3));
        assert_eq!(conn.cg.shape(), (3, 1));
        assert_eq!(conn.cl2.shape(), (3, 3));
        assert_eq!(conn.cl.nnz(), 6);
    }

    #[test]
    fn test_bus_adjacency_includes_self() {
        let conn = Connectivity::nominal(&grid3());
        // Triangle: every bus sees every bus
        for i in 0..3 {
            assert_eq!(conn.bus_neighbors(i), vec![0, 1, 2]);
        }
        // Cb diagonal = degree + 1
        assert_eq!(conn.cb.get(0, 0).copied(), Some(3.0));
    }

    #[test]
    fn test_contingency_zeroes_branch() {
        let grid = grid3();
        // Branch 0 connects buses 0 and 1
        let conn = Connectivity::contingency(&grid, 0);
        assert!(conn.cf.outer_view(0).map_or(true, |r| r.nnz() == 0));
        assert_eq!(conn.bus_neighbors(0), vec![0, 2]);
        assert_eq!(conn.bus_neighbors(1), vec![1, 2]);
        assert_eq!(conn.limited_branch_ends(0), None);
        assert_eq!(conn.limited_branch_ends(1), Some((1, 2)));
        // Dimensions are unchanged
        assert_eq!(conn.cf.shape(), (3, 3));
        assert_eq!(conn.cl2.shape(), (3, 3));
    }

    #[test]
    fn test_generator_incidence() {
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let conn = Connectivity::nominal(&grid);
        assert_eq!(conn.gens_at(0), vec![0]);
        assert_eq!(conn.gens_at(1), vec![1]);
        assert_eq!(conn.gens_at(2), Vec::<usize>::new());
        assert_eq!(conn.gens_at(3), vec![2]);
    }

    #[test]
    fn test_unlimited_branch_not_selected() {
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let conn = Connectivity::nominal(&grid);
        // Branch 4 (3-4) is unlimited, so Cl2 has 6 rows over 7 branches
        assert_eq!(conn.cl2.shape(), (6, 7));
        assert_eq!(conn.limited_branch_ends(4), Some((3, 4)));
    }
}
