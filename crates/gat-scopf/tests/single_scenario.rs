//! With no contingencies the SCOPF is a plain single-scenario AC-OPF under a
//! permutation of the variables.

use gat_core::Network;
use gat_scopf::test_cases::{five_bus, three_bus};
use gat_scopf::{
    AcPolarModel, Contingency, GridModel, PowerFlowModel, ProblemInstance, ScenarioEvaluator,
    ScopfConfig,
};

fn physical_point(grid: &GridModel) -> Vec<f64> {
    let nb = grid.n_bus();
    let ng = grid.n_gen();
    let mut point = Vec::with_capacity(2 * (nb + ng));
    point.extend((0..nb).map(|i| if i == grid.ref_bus { 0.0 } else { -0.03 * i as f64 }));
    point.extend((0..nb).map(|i| 1.0 + 0.01 * i as f64));
    point.extend(grid.gens.iter().map(|g| 0.5 * (g.pmin + g.pmax)));
    point.extend(grid.gens.iter().map(|_| 0.1));
    point
}

fn check_reduction(network: &Network) {
    let inst = ProblemInstance::new(network, &[], ScopfConfig::default()).unwrap();
    assert_eq!(inst.n_scenarios(), 1);

    let grid = inst.grid();
    let model = AcPolarModel;
    let adm = model.build_admittance(grid, None).unwrap();
    let point = physical_point(grid);

    let map = inst.layout().scenario_map(0);
    let mut x = vec![0.0; inst.n_variables()];
    for (col, &flat) in map.columns().iter().enumerate() {
        x[flat] = point[col];
    }
    let eval = ScenarioEvaluator::new(&inst);

    // Objective
    let direct: f64 = grid
        .gens
        .iter()
        .enumerate()
        .map(|(g, gen)| gen.cost.evaluate(point[2 * grid.n_bus() + g] * grid.base_mva))
        .sum();
    assert!((eval.objective(&x).unwrap() - direct).abs() < 1e-9);

    // Residuals, in the same row order
    let res = model.residuals_and_derivatives(grid, &point, &adm).unwrap();
    let mut expected = res.eq.clone();
    expected.extend(&res.ineq);
    let g = eval.constraints(&x).unwrap();
    assert_eq!(g.len(), expected.len());
    for (k, (a, b)) in g.iter().zip(&expected).enumerate() {
        assert!((a - b).abs() <= 1e-12 * (1.0 + b.abs()), "row {k}: {a} vs {b}");
    }

    // Jacobian under the column permutation
    let pattern = inst.jacobian_pattern();
    let jac = pattern.to_csr(&eval.jacobian_values(&x).unwrap()).unwrap();
    let nb = grid.n_bus();
    let mut checked = 0;
    for (&v, (r, c)) in res.jac_eq.iter() {
        let got = jac.get(r, map.flat(c)).copied().unwrap_or(0.0);
        assert!((got - v).abs() <= 1e-12 * (1.0 + v.abs()), "eq ({r}, {c})");
        checked += 1;
    }
    for (&v, (r, c)) in res.jac_ineq.iter() {
        let got = jac.get(2 * nb + r, map.flat(c)).copied().unwrap_or(0.0);
        assert!((got - v).abs() <= 1e-12 * (1.0 + v.abs()), "ineq ({r}, {c})");
        checked += 1;
    }
    assert!(checked > 0);

    // Lagrangian Hessian under the same permutation
    let lambda: Vec<f64> = (0..inst.n_constraints()).map(|i| 0.1 * (i % 5) as f64).collect();
    let (l_eq, l_ineq) = lambda.split_at(2 * nb);
    let hess = model
        .constraint_hessian(grid, &point, &adm, l_eq, l_ineq)
        .unwrap();
    let full = eval.hessian_full(&x, 0.0, &lambda).unwrap();
    for (&v, (r, c)) in hess.iter() {
        let got = full.get(map.flat(r), map.flat(c)).copied().unwrap_or(0.0);
        assert!((got - v).abs() <= 1e-12 * (1.0 + v.abs()), "({r}, {c})");
    }
}

#[test]
fn three_bus_reduces_to_single_opf() {
    check_reduction(&three_bus());
}

#[test]
fn five_bus_reduces_to_single_opf() {
    check_reduction(&five_bus());
}

#[test]
fn base_contingency_repeats_nominal() {
    let inst = ProblemInstance::new(&five_bus(), &[Contingency::Base], ScopfConfig::default())
        .unwrap();
    let eval = ScenarioEvaluator::new(&inst);
    let x = inst.warm_start_from_network();
    let g = eval.constraints(&x).unwrap();
    let per = inst.layout().rows_per_scenario();
    assert_eq!(&g[..per], &g[per..2 * per]);
}
