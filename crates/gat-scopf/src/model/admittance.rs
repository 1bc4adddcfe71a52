//! Sparse complex admittance matrices.
//!
//! `Ybus` (nb × nb) gives bus injections `S = V · conj(Ybus V)`; `Yf` and `Yt`
//! (nl × nb) give branch-end flows `Sf = Vf · conj(Yf V)`, `St = Vt · conj(Yt V)`.
//!
//! For a branch with series admittance `ys = 1/(r + jx)`, charging `b`, tap
//! `τ` and shift `φ`:
//!
//! ```text
//! y_ff = ys/τ² + jb/2        y_ft = -ys/τ · e^{+jφ}
//! y_tf = -ys/τ · e^{-jφ}     y_tt = ys + jb/2
//! ```
//!
//! Bus shunts `gs + j·bs` (pu) land on the `Ybus` diagonal.

use crate::grid::GridModel;
use crate::ScopfError;
use num_complex::Complex64;
use sprs::{CsMat, TriMat};

/// Admittances of one topology (nominal or with one branch out).
#[derive(Debug, Clone)]
pub struct Admittances {
    pub ybus: CsMat<Complex64>,
    pub yf: CsMat<Complex64>,
    pub yt: CsMat<Complex64>,
    pub outage: Option<usize>,
}

impl Admittances {
    /// Non-zero entries of row `i` of a complex matrix.
    pub(crate) fn row(mat: &CsMat<Complex64>, i: usize) -> Vec<(usize, Complex64)> {
        mat.outer_view(i)
            .map(|row| row.iter().map(|(j, &y)| (j, y)).collect())
            .unwrap_or_default()
    }
}

pub fn build_admittances(grid: &GridModel, outage: Option<usize>) -> Result<Admittances, ScopfError> {
    let nb = grid.n_bus();
    let nl = grid.n_branch();
    if let Some(l) = outage {
        if l >= nl {
            return Err(ScopfError::InvalidContingency(format!(
                "outage branch {l} out of range ({nl} branches)"
            )));
        }
    }

    let mut ybus = TriMat::new((nb, nb));
    let mut yf = TriMat::new((nl, nb));
    let mut yt = TriMat::new((nl, nb));

    for (i, bus) in grid.buses.iter().enumerate() {
        if bus.gs != 0.0 || bus.bs != 0.0 {
            ybus.add_triplet(i, i, Complex64::new(bus.gs, bus.bs));
        }
    }

    for (l, br) in grid.branches.iter().enumerate() {
        if !br.in_service || Some(l) == outage {
            continue;
        }

        let z = Complex64::new(br.r, br.x);
        if z.norm() < 1e-12 {
            return Err(ScopfError::DataValidation(format!(
                "branch {l} has zero impedance"
            )));
        }
        let y_series = z.inv();

        let tau = br.tap;
        let tau2 = tau * tau;
        let shift = Complex64::from_polar(1.0, -br.shift);
        let y_shunt_half = Complex64::new(0.0, br.b / 2.0);

        let y_ff = y_series / tau2 + y_shunt_half;
        let y_tt = y_series + y_shunt_half;
        let y_ft = -y_series / tau * shift.conj();
        let y_tf = -y_series / tau * shift;

        let (f, t) = (br.from, br.to);
        ybus.add_triplet(f, f, y_ff);
        ybus.add_triplet(t, t, y_tt);
        ybus.add_triplet(f, t, y_ft);
        ybus.add_triplet(t, f, y_tf);

        yf.add_triplet(l, f, y_ff);
        yf.add_triplet(l, t, y_ft);
        yt.add_triplet(l, f, y_tf);
        yt.add_triplet(l, t, y_tt);
    }

    Ok(Admittances {
        ybus: ybus.to_csr(),
        yf: yf.to_csr(),
        yt: yt.to_csr(),
        outage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_cases::{five_bus, three_bus};

    #[test]
    fn test_row_sums_vanish_without_shunts() {
        // No charging, no taps, no shunts: each Ybus row sums to zero
        let mut network = three_bus();
        for br in &mut network.branches {
            br.charging_b = 0.0;
        }
        let grid = GridModel::from_network(&network).unwrap();
        let adm = build_admittances(&grid, None).unwrap();
        for i in 0..3 {
            let sum: Complex64 = Admittances::row(&adm.ybus, i).iter().map(|(_, y)| *y).sum();
            assert!(sum.norm() < 1e-10, "row {i} sums to {sum}");
        }
    }

    #[test]
    fn test_outage_removes_entries() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        let nominal = build_admittances(&grid, None).unwrap();
        let out = build_admittances(&grid, Some(0)).unwrap();
        assert!(nominal.ybus.get(0, 1).is_some());
        assert!(out.ybus.get(0, 1).is_none());
        assert!(Admittances::row(&out.yf, 0).is_empty());
        assert_eq!(out.ybus.nnz(), nominal.ybus.nnz() - 2);
    }

    #[test]
    fn test_shunt_on_diagonal() {
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let adm = build_admittances(&grid, None).unwrap();
        let line_only: Complex64 = Admittances::row(&adm.ybus, 2)
            .iter()
            .map(|(_, y)| *y)
            .sum();
        // Row sum leaves shunt (0.1j) plus half charging of each incident line
        let charging = (0.05 + 0.04 + 0.04 + 0.03) / 2.0;
        assert!((line_only.im - (0.1 + charging)).abs() < 1e-10);
    }

    #[test]
    fn test_phase_shifter_is_asymmetric() {
        let grid = GridModel::from_network(&five_bus()).unwrap();
        let adm = build_admittances(&grid, None).unwrap();
        // Branch 3 connects buses 1 and 3 with a shift
        let ft = adm.ybus.get(1, 3).copied().unwrap();
        let tf = adm.ybus.get(3, 1).copied().unwrap();
        assert!((ft - tf).norm() > 1e-6);
    }

    #[test]
    fn test_bad_outage_index() {
        let grid = GridModel::from_network(&three_bus()).unwrap();
        assert!(matches!(
            build_admittances(&grid, Some(9)),
            Err(ScopfError::InvalidContingency(_))
        ));
    }
}
