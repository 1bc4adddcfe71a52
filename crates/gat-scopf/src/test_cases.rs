//! Small reference cases used by unit tests, integration tests and docs.

use gat_core::{
    Branch, BranchId, Bus, BusId, BusType, CostModel, Degrees, FlowRating, Gen, GenId, Kilovolts,
    Load, LoadId, Megavars, MegavoltAmperes, Megawatts, Network, PerUnit,
};

fn bus(id: usize, bus_type: BusType) -> Bus {
    Bus {
        id: BusId::new(id),
        name: format!("Bus {id}"),
        bus_type,
        base_kv: Kilovolts(230.0),
        vmin: PerUnit(0.95),
        vmax: PerUnit(1.05),
        ..Bus::default()
    }
}

fn line(id: usize, from: usize, to: usize, r: f64, x: f64, b: f64, rating: FlowRating) -> Branch {
    Branch {
        id: BranchId::new(id),
        name: format!("Line {from}-{to}"),
        from_bus: BusId::new(from),
        to_bus: BusId::new(to),
        resistance: r,
        reactance: x,
        charging_b: b,
        rating: Some(rating),
        ..Branch::default()
    }
}

fn load(id: usize, bus: usize, p: f64, q: f64) -> Load {
    Load {
        id: LoadId::new(id),
        name: format!("Load {id}"),
        bus: BusId::new(bus),
        active_power: Megawatts(p),
        reactive_power: Megavars(q),
    }
}

/// Triangle network with a single generator on the reference bus.
///
/// ```text
///   (1) REF, G1 ───── (2) 60 MW
///     \               /
///      \             /
///       (3) 90 MW ──
/// ```
pub fn three_bus() -> Network {
    let mut network = Network::new(MegavoltAmperes(100.0));
    network.name = "three_bus".to_string();
    network.buses.push(bus(1, BusType::Ref));
    network.buses.push(bus(2, BusType::Pq));
    network.buses.push(bus(3, BusType::Pq));

    let limit = FlowRating::Limited(MegavoltAmperes(200.0));
    network.branches.push(line(1, 1, 2, 0.01, 0.10, 0.02, limit));
    network.branches.push(line(2, 2, 3, 0.02, 0.15, 0.02, limit));
    network.branches.push(line(3, 1, 3, 0.01, 0.12, 0.02, limit));

    network.generators.push(
        Gen::new(GenId::new(1), "G1".to_string(), BusId::new(1))
            .with_p_limits(0.0, 250.0)
            .with_q_limits(-150.0, 150.0)
            .with_cost(CostModel::quadratic(50.0, 20.0, 0.02)),
    );

    network.loads.push(load(1, 2, 60.0, 20.0));
    network.loads.push(load(2, 3, 90.0, 30.0));
    network
}

/// Five-bus meshed network with two PV buses, a tap-changing phase shifter
/// and one unlimited branch.
///
/// Generators: G1 on the reference bus 1, G2 on PV bus 2, G3 on PV bus 4.
pub fn five_bus() -> Network {
    let mut network = Network::new(MegavoltAmperes(100.0));
    network.name = "five_bus".to_string();
    network.buses.push(bus(1, BusType::Ref));
    network.buses.push(bus(2, BusType::Pv));
    network.buses.push(Bus {
        bs: Megavars(10.0),
        ..bus(3, BusType::Pq)
    });
    network.buses.push(bus(4, BusType::Pv));
    network.buses.push(Bus {
        gs: Megawatts(2.0),
        ..bus(5, BusType::Pq)
    });
    network.buses[0].va = Degrees(0.0);

    let limit = |mva| FlowRating::Limited(MegavoltAmperes(mva));
    network.branches.push(line(1, 1, 2, 0.0042, 0.050, 0.06, limit(250.0)));
    network.branches.push(line(2, 1, 3, 0.0060, 0.065, 0.05, limit(200.0)));
    network.branches.push(line(3, 2, 3, 0.0080, 0.080, 0.04, limit(150.0)));
    network.branches.push(Branch {
        tap_ratio: 0.98,
        phase_shift: Degrees(-2.0),
        ..line(4, 2, 4, 0.0010, 0.030, 0.0, limit(300.0))
    });
    network.branches.push(line(5, 3, 4, 0.0070, 0.070, 0.04, FlowRating::Unlimited));
    network.branches.push(line(6, 4, 5, 0.0050, 0.060, 0.03, limit(200.0)));
    network.branches.push(line(7, 3, 5, 0.0090, 0.090, 0.03, limit(120.0)));

    network.generators.push(
        Gen::new(GenId::new(1), "G1".to_string(), BusId::new(1))
            .with_p_limits(10.0, 300.0)
            .with_q_limits(-100.0, 150.0)
            .with_cost(CostModel::quadratic(100.0, 18.0, 0.015)),
    );
    network.generators.push(
        Gen::new(GenId::new(2), "G2".to_string(), BusId::new(2))
            .with_p_limits(0.0, 200.0)
            .with_q_limits(-80.0, 100.0)
            .with_cost(CostModel::quadratic(80.0, 22.0, 0.03)),
    );
    network.generators.push(
        Gen::new(GenId::new(3), "G3".to_string(), BusId::new(4))
            .with_p_limits(20.0, 20.0)
            .with_q_limits(-60.0, 60.0)
            .with_cost(CostModel::linear(0.0, 35.0)),
    );

    network.loads.push(load(1, 2, 40.0, 10.0));
    network.loads.push(load(2, 3, 120.0, 40.0));
    network.loads.push(load(3, 5, 150.0, 50.0));
    network
}
