//! Variable bound assembly.
//!
//! Box bounds are first expressed once in the physical `[Va | Vm | Pg | Qg]`
//! column space of a single OPF, then spread over the flat vector: local
//! positions receive a copy per scenario, global positions are written once.
//!
//! Two adjustments are applied on the way:
//!
//! - the reference-bus angle keeps `lower == upper == nominal angle` in every
//!   scenario, anchoring each scenario's angles;
//! - every other upper bound is raised by `epsilon`, so a variable with equal
//!   bounds still has a (tiny) interior instead of being eliminated as fixed.

use crate::grid::GridModel;
use crate::layout::VariableLayout;
use crate::ScopfError;

/// Bounds in the physical column space of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl PhysicalBounds {
    /// Standard OPF bounds: free angles except the fixed reference angle,
    /// voltage magnitude limits, and generator capability limits.
    pub fn from_grid(grid: &GridModel) -> Self {
        let nb = grid.n_bus();
        let ng = grid.n_gen();
        let mut lower = Vec::with_capacity(2 * (nb + ng));
        let mut upper = Vec::with_capacity(2 * (nb + ng));

        for (i, bus) in grid.buses.iter().enumerate() {
            if i == grid.ref_bus {
                lower.push(bus.va0);
                upper.push(bus.va0);
            } else {
                lower.push(f64::NEG_INFINITY);
                upper.push(f64::INFINITY);
            }
        }
        for bus in &grid.buses {
            lower.push(bus.vmin);
            upper.push(bus.vmax);
        }
        for gen in &grid.gens {
            lower.push(gen.pmin);
            upper.push(gen.pmax);
        }
        for gen in &grid.gens {
            lower.push(gen.qmin);
            upper.push(gen.qmax);
        }

        Self { lower, upper }
    }
}

/// Full-length lower/upper bound vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundVector {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoundVector {
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// Spread physical bounds over the flat layout.
pub fn assemble_bounds(
    base: &PhysicalBounds,
    layout: &VariableLayout,
    epsilon: f64,
) -> Result<BoundVector, ScopfError> {
    let n_phys = layout.physical().len();
    ScopfError::check_len("physical lower bounds", n_phys, base.lower.len())?;
    ScopfError::check_len("physical upper bounds", n_phys, base.upper.len())?;

    let total = layout.total_variables();
    let mut lower = vec![f64::NAN; total];
    let mut upper = vec![f64::NAN; total];

    for s in 0..layout.n_scenarios() {
        let map = layout.scenario_map(s);
        let ref_angle = layout.ref_angle_index(s);
        for (col, &flat) in map.columns().iter().enumerate() {
            // Shared positions come from the nominal pass only
            if s > 0 && layout.is_global(flat) {
                continue;
            }
            lower[flat] = base.lower[col];
            upper[flat] = if flat == ref_angle {
                base.upper[col]
            } else {
                base.upper[col] + epsilon
            };
        }
    }

    debug_assert!(lower.iter().chain(upper.iter()).all(|v| !v.is_nan()));
    Ok(BoundVector { lower, upper })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LocalRole;

    fn toy_layout(ns: usize) -> VariableLayout {
        // 3 buses, reference bus 0, PV bus 2; generators 0 (ref) and 1
        VariableLayout::new(3, 2, 2, ns, 0, &[0], &[2]).unwrap()
    }

    fn toy_bounds() -> PhysicalBounds {
        let inf = f64::INFINITY;
        PhysicalBounds {
            // Va(3) | Vm(3) | Pg(2) | Qg(2)
            lower: vec![0.1, -inf, -inf, 0.95, 0.9, 1.0, 0.0, 0.5, -1.0, -0.5],
            upper: vec![0.1, inf, inf, 1.05, 1.1, 1.0, 2.0, 0.5, 1.0, 0.5],
        }
    }

    #[test]
    fn test_length_matches_layout() {
        let layout = toy_layout(4);
        let bv = assemble_bounds(&toy_bounds(), &layout, 1e-10).unwrap();
        assert_eq!(bv.len(), layout.total_variables());
        assert_eq!(bv.upper.len(), layout.total_variables());
    }

    #[test]
    fn test_reference_angle_not_perturbed() {
        let layout = toy_layout(3);
        let bv = assemble_bounds(&toy_bounds(), &layout, 1e-6).unwrap();
        for s in 0..3 {
            let k = layout.ref_angle_index(s);
            assert_eq!(bv.lower[k], 0.1);
            assert_eq!(bv.upper[k], 0.1);
        }
    }

    #[test]
    fn test_degenerate_bounds_get_exact_epsilon() {
        let layout = toy_layout(2);
        let eps = 1e-10;
        let bv = assemble_bounds(&toy_bounds(), &layout, eps).unwrap();

        // PV voltage magnitude (bus 2) has lower == upper == 1.0
        let map = layout.scenario_map(0);
        let k = map.vm(2);
        assert_eq!(bv.upper[k], 1.0 + eps);
        assert_eq!(bv.upper[k] - bv.lower[k], (1.0 + eps) - 1.0);
        assert!(bv.upper[k] > bv.lower[k]);

        // Non-reference Pg has lower == upper == 0.5
        let k = map.pg(1);
        assert_eq!(bv.upper[k], 0.5 + eps);
    }

    #[test]
    fn test_local_blocks_bit_identical() {
        let layout = toy_layout(3);
        let bv = assemble_bounds(&toy_bounds(), &layout, 1e-10).unwrap();
        let block0 = layout.local_indices(0);
        for s in 1..3 {
            let block = layout.local_indices(s);
            for (a, b) in block0.clone().zip(block) {
                assert_eq!(bv.lower[a].to_bits(), bv.lower[b].to_bits());
                assert_eq!(bv.upper[a].to_bits(), bv.upper[b].to_bits());
            }
        }
    }

    #[test]
    fn test_infinite_bounds_stay_infinite() {
        let layout = toy_layout(1);
        let bv = assemble_bounds(&toy_bounds(), &layout, 1e-10).unwrap();
        let va = layout.local_role_slice(LocalRole::VoltageAngle);
        assert_eq!(bv.upper[va.start + 1], f64::INFINITY);
        assert_eq!(bv.lower[va.start + 2], f64::NEG_INFINITY);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let layout = toy_layout(1);
        let mut bounds = toy_bounds();
        bounds.lower.pop();
        assert!(matches!(
            assemble_bounds(&bounds, &layout, 0.0),
            Err(ScopfError::DimensionMismatch { .. })
        ));
    }
}
