//! Flat index partition and bound replication

use gat_scopf::layout::{GlobalRole, LocalRole};
use gat_scopf::test_cases::five_bus;
use gat_scopf::{Contingency, ProblemInstance, ScopfConfig, VariableLayout};

fn assert_partition(layout: &VariableLayout) {
    let total = layout.total_variables();
    let mut owner = vec![None; total];
    for s in 0..layout.n_scenarios() {
        for k in layout.local_indices(s) {
            assert!(owner[k].is_none(), "index {k} claimed twice");
            owner[k] = Some(s);
        }
    }
    for k in layout.global_indices() {
        assert!(owner[k].is_none(), "index {k} claimed twice");
        owner[k] = Some(usize::MAX);
    }
    assert!(owner.iter().all(Option::is_some), "gap in flat vector");
}

#[test]
fn partition_for_many_sizes() {
    for n_bus in [1, 2, 5, 17] {
        for n_gen in [1, 2, 4] {
            for ns in [1, 2, 7] {
                // Reference bus 0 with generator 0; every second bus is PV
                let pv: Vec<usize> = (1..n_bus).step_by(2).collect();
                let layout = VariableLayout::new(n_bus, n_gen, 3, ns, 0, &[0], &pv).unwrap();
                assert_partition(&layout);

                let n_pv = pv.len();
                let expected = ns * (n_bus + (n_bus - n_pv) + n_gen + 1) + n_pv + (n_gen - 1);
                assert_eq!(layout.total_variables(), expected);

                let global = layout.global_indices();
                assert_eq!(
                    layout.global_role_slice(GlobalRole::PvVoltageMagnitude).start,
                    global.start
                );
                assert_eq!(layout.global_role_slice(GlobalRole::ActivePower).end, global.end);
                assert_eq!(
                    layout.local_role_slice(LocalRole::ReferenceActivePower).end,
                    layout.local_indices(0).len()
                );
            }
        }
    }
}

#[test]
fn scenario_maps_cover_own_block_and_globals() {
    let layout = VariableLayout::new(6, 3, 4, 3, 2, &[1], &[0, 4]).unwrap();
    for s in 0..3 {
        let map = layout.scenario_map(s);
        let mut seen = map.columns().to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), map.columns().len(), "duplicate flat column");

        let local = layout.local_indices(s);
        for &k in map.columns() {
            assert!(local.contains(&k) || layout.is_global(k));
        }
        // Every local slot of this scenario and every global slot is reached
        let own = map.columns().iter().filter(|&&k| local.contains(&k)).count();
        assert_eq!(own, local.len());
        let shared = map.columns().iter().filter(|&&k| layout.is_global(k)).count();
        assert_eq!(shared, layout.global_indices().len());
    }
}

#[test]
fn bounds_replicated_bit_identical() {
    let network = five_bus();
    let inst = ProblemInstance::new(
        &network,
        &[Contingency::BranchOutage(1), Contingency::BranchOutage(5)],
        ScopfConfig::default(),
    )
    .unwrap();
    let layout = inst.layout();
    let b = inst.variable_bounds();
    let nominal = layout.local_indices(0);

    for s in 1..layout.n_scenarios() {
        let block = layout.local_indices(s);
        for (k0, ks) in nominal.clone().zip(block) {
            assert_eq!(b.lower[k0].to_bits(), b.lower[ks].to_bits());
            assert_eq!(b.upper[k0].to_bits(), b.upper[ks].to_bits());
        }
        let r = layout.ref_angle_index(s);
        assert_eq!(b.lower[r], b.upper[r], "reference angle must stay fixed");
    }
}

#[test]
fn degenerate_bound_widened_by_epsilon() {
    // G3 in the five-bus case has pmin == pmax == 20 MW
    let eps = 1e-10;
    let inst = ProblemInstance::new(&five_bus(), &[], ScopfConfig::default().with_bound_epsilon(eps))
        .unwrap();
    let k = inst.layout().scenario_map(0).pg(2);
    let b = inst.variable_bounds();
    let width = b.upper[k] - b.lower[k];
    assert!((width - eps).abs() < 1e-15, "width {width}");
}
