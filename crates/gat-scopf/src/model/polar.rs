//! AC power flow in polar coordinates with analytic first and second
//! derivatives.
//!
//! Every admittance entry `y = g + jb` in a row anchored at bus `i` and
//! column `k` contributes
//!
//! ```text
//! P = vi·vk·(g·cos θik + b·sin θik)
//! Q = vi·vk·(g·sin θik - b·cos θik)
//! ```
//!
//! which collapses to `vi²·g` and `-vi²·b` on the diagonal. Bus injections
//! sum these over a `Ybus` row; branch flows sum them over a `Yf`/`Yt` row.
//! Derivatives are formed per entry over the four local variables
//! `[θi, θk, vi, vk]` and scattered through triplets, so coinciding columns
//! simply add.

use super::{build_admittances, Admittances, PowerFlowModel, ScenarioResiduals};
use crate::grid::GridModel;
use crate::layout::PhysicalIndex;
use crate::ScopfError;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

/// Polar-coordinate AC model over `[Va | Vm | Pg | Qg]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcPolarModel;

/// Value, gradient and Hessian over `[θi, θk, vi, vk]`.
#[derive(Debug, Clone, Copy, Default)]
struct Term4 {
    val: f64,
    grad: [f64; 4],
    hess: [[f64; 4]; 4],
}

impl Term4 {
    fn off_diagonal(a: f64, bq: f64, vi: f64, vk: f64) -> Self {
        let vv = vi * vk;
        Self {
            val: vv * a,
            grad: [-vv * bq, vv * bq, vk * a, vi * a],
            hess: [
                [-vv * a, vv * a, -vk * bq, -vi * bq],
                [vv * a, -vv * a, vk * bq, vi * bq],
                [-vk * bq, vk * bq, 0.0, a],
                [-vi * bq, vi * bq, a, 0.0],
            ],
        }
    }

    fn diagonal(coef: f64, vi: f64) -> Self {
        let mut term = Self {
            val: vi * vi * coef,
            ..Self::default()
        };
        term.grad[2] = 2.0 * vi * coef;
        term.hess[2][2] = 2.0 * coef;
        term
    }

    fn add(&mut self, other: &Self) {
        self.val += other.val;
        for a in 0..4 {
            self.grad[a] += other.grad[a];
            for b in 0..4 {
                self.hess[a][b] += other.hess[a][b];
            }
        }
    }
}

/// `(P, Q)` terms of admittance entry `y` at column `k` for a row anchored at `i`.
fn entry_terms(i: usize, k: usize, y: Complex64, va: &[f64], vm: &[f64]) -> (Term4, Term4) {
    if i == k {
        return (Term4::diagonal(y.re, vm[i]), Term4::diagonal(-y.im, vm[i]));
    }
    let (s, c) = (va[i] - va[k]).sin_cos();
    let a = y.re * c + y.im * s;
    let bq = y.re * s - y.im * c;
    (
        Term4::off_diagonal(a, bq, vm[i], vm[k]),
        Term4::off_diagonal(bq, -a, vm[i], vm[k]),
    )
}

/// Summed `(P, Q)` of a branch-end row, anchored at `anchor` with far end `other`.
fn branch_end(
    row: &[(usize, Complex64)],
    anchor: usize,
    other: usize,
    va: &[f64],
    vm: &[f64],
) -> (Term4, Term4) {
    let mut p = Term4::default();
    let mut q = Term4::default();
    for &(k, y) in row {
        let (tp, tq) = if k == anchor {
            entry_terms(anchor, anchor, y, va, vm)
        } else {
            debug_assert_eq!(k, other);
            entry_terms(anchor, other, y, va, vm)
        };
        p.add(&tp);
        q.add(&tq);
    }
    (p, q)
}

/// `|S|² - Smax²` with its gradient and Hessian.
fn flow_limit(p: &Term4, q: &Term4, smax_sq: f64) -> Term4 {
    let mut h = Term4 {
        val: p.val * p.val + q.val * q.val - smax_sq,
        ..Term4::default()
    };
    for a in 0..4 {
        h.grad[a] = 2.0 * (p.val * p.grad[a] + q.val * q.grad[a]);
        for b in 0..4 {
            h.hess[a][b] = 2.0
                * (p.grad[a] * p.grad[b]
                    + p.val * p.hess[a][b]
                    + q.grad[a] * q.grad[b]
                    + q.val * q.hess[a][b]);
        }
    }
    h
}

fn voltage_cols(phys: &PhysicalIndex, i: usize, k: usize) -> [usize; 4] {
    [phys.va(i), phys.va(k), phys.vm(i), phys.vm(k)]
}

/// Flow-limited branch `l` viewed from one end.
struct BranchEnd {
    row: usize,
    anchor: usize,
    other: usize,
    smax_sq: f64,
    entries: Vec<(usize, Complex64)>,
}

impl AcPolarModel {
    fn split<'a>(
        grid: &GridModel,
        point: &'a [f64],
    ) -> Result<(PhysicalIndex, &'a [f64], &'a [f64]), ScopfError> {
        let phys = PhysicalIndex {
            n_bus: grid.n_bus(),
            n_gen: grid.n_gen(),
        };
        ScopfError::check_len("scenario point", phys.len(), point.len())?;
        let nb = phys.n_bus;
        Ok((phys, &point[..nb], &point[nb..2 * nb]))
    }

    fn branch_ends(grid: &GridModel, adm: &Admittances) -> Vec<BranchEnd> {
        let nc = grid.constrained.len();
        let limits = grid.flow_limits_sq();
        let mut ends = Vec::with_capacity(2 * nc);
        for (j, &l) in grid.constrained.iter().enumerate() {
            let br = &grid.branches[l];
            ends.push(BranchEnd {
                row: j,
                anchor: br.from,
                other: br.to,
                smax_sq: limits[j],
                entries: Admittances::row(&adm.yf, l),
            });
        }
        for (j, &l) in grid.constrained.iter().enumerate() {
            let br = &grid.branches[l];
            ends.push(BranchEnd {
                row: nc + j,
                anchor: br.to,
                other: br.from,
                smax_sq: limits[j],
                entries: Admittances::row(&adm.yt, l),
            });
        }
        ends
    }

    fn evaluate(
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
        with_jacobian: bool,
    ) -> Result<ScenarioResiduals, ScopfError> {
        let (phys, va, vm) = Self::split(grid, point)?;
        let nb = phys.n_bus;
        let nc = grid.constrained.len();
        let n_phys = phys.len();

        let mut eq = vec![0.0; 2 * nb];
        let mut jac_eq = TriMat::new((2 * nb, n_phys));

        for i in 0..nb {
            for (k, y) in Admittances::row(&adm.ybus, i) {
                let (p, q) = entry_terms(i, k, y, va, vm);
                eq[i] += p.val;
                eq[nb + i] += q.val;
                if with_jacobian {
                    for (slot, &col) in voltage_cols(&phys, i, k).iter().enumerate() {
                        jac_eq.add_triplet(i, col, p.grad[slot]);
                        jac_eq.add_triplet(nb + i, col, q.grad[slot]);
                    }
                }
            }
            eq[i] += grid.buses[i].pd;
            eq[nb + i] += grid.buses[i].qd;
        }

        for (g, gen) in grid.gens.iter().enumerate() {
            eq[gen.bus] -= point[phys.pg(g)];
            eq[nb + gen.bus] -= point[phys.qg(g)];
            if with_jacobian {
                jac_eq.add_triplet(gen.bus, phys.pg(g), -1.0);
                jac_eq.add_triplet(nb + gen.bus, phys.qg(g), -1.0);
            }
        }

        let mut ineq = vec![0.0; 2 * nc];
        let mut jac_ineq = TriMat::new((2 * nc, n_phys));
        for end in Self::branch_ends(grid, adm) {
            let (p, q) = branch_end(&end.entries, end.anchor, end.other, va, vm);
            let h = flow_limit(&p, &q, end.smax_sq);
            ineq[end.row] = h.val;
            if with_jacobian && !end.entries.is_empty() {
                for (slot, &col) in voltage_cols(&phys, end.anchor, end.other).iter().enumerate() {
                    jac_ineq.add_triplet(end.row, col, h.grad[slot]);
                }
            }
        }

        Ok(ScenarioResiduals {
            eq,
            ineq,
            jac_eq: jac_eq.to_csr(),
            jac_ineq: jac_ineq.to_csr(),
        })
    }
}

fn add_hessian(tri: &mut TriMat<f64>, cols: &[usize; 4], term: &Term4, weight: f64) {
    for a in 0..4 {
        for b in 0..4 {
            let v = term.hess[a][b];
            if v != 0.0 {
                tri.add_triplet(cols[a], cols[b], weight * v);
            }
        }
    }
}

impl PowerFlowModel for AcPolarModel {
    fn name(&self) -> &'static str {
        "ac-polar"
    }

    fn build_admittance(
        &self,
        grid: &GridModel,
        outage: Option<usize>,
    ) -> Result<Admittances, ScopfError> {
        build_admittances(grid, outage)
    }

    fn residuals_and_derivatives(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
    ) -> Result<ScenarioResiduals, ScopfError> {
        Self::evaluate(grid, point, adm, true)
    }

    fn residuals(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
    ) -> Result<(Vec<f64>, Vec<f64>), ScopfError> {
        let res = Self::evaluate(grid, point, adm, false)?;
        Ok((res.eq, res.ineq))
    }

    fn constraint_hessian(
        &self,
        grid: &GridModel,
        point: &[f64],
        adm: &Admittances,
        lambda_eq: &[f64],
        lambda_ineq: &[f64],
    ) -> Result<CsMat<f64>, ScopfError> {
        let (phys, va, vm) = Self::split(grid, point)?;
        let nb = phys.n_bus;
        ScopfError::check_len("equality multipliers", 2 * nb, lambda_eq.len())?;
        ScopfError::check_len(
            "inequality multipliers",
            2 * grid.constrained.len(),
            lambda_ineq.len(),
        )?;

        let mut tri = TriMat::new((phys.len(), phys.len()));
        for i in 0..nb {
            let (lp, lq) = (lambda_eq[i], lambda_eq[nb + i]);
            if lp == 0.0 && lq == 0.0 {
                continue;
            }
            for (k, y) in Admittances::row(&adm.ybus, i) {
                let (p, q) = entry_terms(i, k, y, va, vm);
                let cols = voltage_cols(&phys, i, k);
                add_hessian(&mut tri, &cols, &p, lp);
                add_hessian(&mut tri, &cols, &q, lq);
            }
        }

        for end in Self::branch_ends(grid, adm) {
            let mu = lambda_ineq[end.row];
            if mu == 0.0 || end.entries.is_empty() {
                continue;
            }
            let (p, q) = branch_end(&end.entries, end.anchor, end.other, va, vm);
            let h = flow_limit(&p, &q, end.smax_sq);
            add_hessian(&mut tri, &voltage_cols(&phys, end.anchor, end.other), &h, mu);
        }

        Ok(tri.to_csr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_cases::{five_bus, three_bus};

    fn flat_start(grid: &GridModel) -> Vec<f64> {
        let phys = PhysicalIndex {
            n_bus: grid.n_bus(),
            n_gen: grid.n_gen(),
        };
        let mut x = vec![0.0; phys.len()];
        for i in 0..grid.n_bus() {
            x[phys.va(i)] = -0.02 * i as f64;
            x[phys.vm(i)] = 1.0 + 0.01 * i as f64;
        }
        for g in 0..grid.n_gen() {
            x[phys.pg(g)] = 0.5 + 0.1 * g as f64;
            x[phys.qg(g)] = 0.1;
        }
        x
    }

    fn dense(mat: &CsMat<f64>) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; mat.cols()]; mat.rows()];
        for (&v, (r, c)) in mat.iter() {
            out[r][c] += v;
        }
        out
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let model = AcPolarModel;
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let adm = model.build_admittance(&grid, None).unwrap();
        let x = flat_start(&grid);
        let res = model.residuals_and_derivatives(&grid, &x, &adm).unwrap();
        let jeq = dense(&res.jac_eq);
        let jin = dense(&res.jac_ineq);

        let h = 1e-6;
        for col in 0..x.len() {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[col] += h;
            xm[col] -= h;
            let (ep, ip) = model.residuals(&grid, &xp, &adm).unwrap();
            let (em, im) = model.residuals(&grid, &xm, &adm).unwrap();
            for r in 0..ep.len() {
                let fd = (ep[r] - em[r]) / (2.0 * h);
                assert!(
                    (fd - jeq[r][col]).abs() < 1e-5,
                    "eq ({r},{col}): analytic {} vs fd {fd}",
                    jeq[r][col]
                );
            }
            for r in 0..ip.len() {
                let fd = (ip[r] - im[r]) / (2.0 * h);
                assert!(
                    (fd - jin[r][col]).abs() < 1e-4,
                    "ineq ({r},{col}): analytic {} vs fd {fd}",
                    jin[r][col]
                );
            }
        }
    }

    #[test]
    fn test_hessian_matches_finite_differences() {
        let model = AcPolarModel;
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let adm = model.build_admittance(&grid, Some(1)).unwrap();
        let x = flat_start(&grid);
        let lam_eq: Vec<f64> = (0..2 * grid.n_bus()).map(|i| 0.3 - 0.05 * i as f64).collect();
        let lam_in: Vec<f64> = (0..2 * grid.constrained.len())
            .map(|j| 0.1 + 0.02 * j as f64)
            .collect();
        let hess = dense(
            &model
                .constraint_hessian(&grid, &x, &adm, &lam_eq, &lam_in)
                .unwrap(),
        );

        // Gradient of the weighted sum, by rows of the analytic Jacobian
        let weighted_grad = |pt: &[f64]| -> Vec<f64> {
            let res = model.residuals_and_derivatives(&grid, pt, &adm).unwrap();
            let mut g = vec![0.0; pt.len()];
            for (&v, (r, c)) in res.jac_eq.iter() {
                g[c] += lam_eq[r] * v;
            }
            for (&v, (r, c)) in res.jac_ineq.iter() {
                g[c] += lam_in[r] * v;
            }
            g
        };

        let h = 1e-6;
        for col in 0..x.len() {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[col] += h;
            xm[col] -= h;
            let gp = weighted_grad(&xp);
            let gm = weighted_grad(&xm);
            for row in 0..x.len() {
                let fd = (gp[row] - gm[row]) / (2.0 * h);
                assert!(
                    (fd - hess[row][col]).abs() < 1e-4,
                    "H({row},{col}): analytic {} vs fd {fd}",
                    hess[row][col]
                );
            }
        }
    }

    #[test]
    fn test_hessian_symmetric() {
        let model = AcPolarModel;
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let adm = model.build_admittance(&grid, None).unwrap();
        let x = flat_start(&grid);
        let hess = dense(
            &model
                .constraint_hessian(&grid, &x, &adm, &[1.0, -0.5, 0.2, 0.3, 0.1, -0.7], &[0.4; 6])
                .unwrap(),
        );
        for r in 0..hess.len() {
            for c in 0..r {
                assert!((hess[r][c] - hess[c][r]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_outaged_branch_flow_rows() {
        let model = AcPolarModel;
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let adm = model.build_admittance(&grid, Some(1)).unwrap();
        let x = flat_start(&grid);
        let res = model.residuals_and_derivatives(&grid, &x, &adm).unwrap();
        let smax_sq = grid.flow_limits_sq()[1];
        assert_eq!(res.ineq[1], -smax_sq);
        assert_eq!(res.ineq[3 + 1], -smax_sq);
        assert!(res.jac_ineq.outer_view(1).map_or(true, |r| r.nnz() == 0));
    }

    #[test]
    fn test_lossless_flat_start_balances_to_load() {
        // Flat voltages, no charging: injections vanish and residuals equal net load
        let mut network = three_bus();
        for br in &mut network.branches {
            br.charging_b = 0.0;
        }
        let grid = GridModel::from_network(&network).unwrap();
        let model = AcPolarModel;
        let adm = model.build_admittance(&grid, None).unwrap();
        let mut x = vec![0.0; 2 * 3 + 2];
        x[3..6].fill(1.0);
        let (eq, _) = model.residuals(&grid, &x, &adm).unwrap();
        assert!((eq[1] - 0.6).abs() < 1e-12);
        assert!((eq[2] - 0.9).abs() < 1e-12);
        assert!((eq[3 + 2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_point_length() {
        let model = AcPolarModel;
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let adm = model.build_admittance(&grid, None).unwrap();
        assert!(matches!(
            model.residuals(&grid, &[1.0; 3], &adm),
            Err(ScopfError::DimensionMismatch { .. })
        ));
    }
}
