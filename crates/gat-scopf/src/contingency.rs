//! Contingency list and scenario set.
//!
//! Scenario 0 is always the nominal topology. Every contingency adds one
//! scenario, in list order, that shares the global variables with the nominal
//! case.

use crate::grid::GridModel;
use crate::ScopfError;
use gat_core::{island_count, outage_islands, Network};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A postulated N-1 event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contingency {
    /// No outage; repeats the nominal topology
    Base,
    /// Outage of the branch at this position in `Network::branches`
    BranchOutage(usize),
}

impl Contingency {
    pub fn outage(&self) -> Option<usize> {
        match self {
            Contingency::Base => None,
            Contingency::BranchOutage(l) => Some(*l),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub index: usize,
    pub outage: Option<usize>,
}

impl Scenario {
    pub fn is_nominal(&self) -> bool {
        self.index == 0
    }

    pub fn label(&self) -> String {
        match self.outage {
            None if self.index == 0 => "nominal".to_string(),
            None => format!("scenario {} (no outage)", self.index),
            Some(l) => format!("scenario {} (branch {l} out)", self.index),
        }
    }
}

/// Immutable, validated scenario list.
#[derive(Debug, Clone)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    /// Nominal scenario only.
    pub fn nominal() -> Self {
        Self {
            scenarios: vec![Scenario {
                index: 0,
                outage: None,
            }],
        }
    }

    /// Validate `contingencies` against the case and number them from 1.
    ///
    /// Out-of-range and already out-of-service branches are rejected. An
    /// outage that splits the network is rejected when `reject_islanding` is
    /// set and logged otherwise.
    pub fn build(
        network: &Network,
        grid: &GridModel,
        contingencies: &[Contingency],
        reject_islanding: bool,
    ) -> Result<Self, ScopfError> {
        let mut set = Self::nominal();
        let base_islands = island_count(network)?;
        let mut seen = HashSet::new();

        for contingency in contingencies {
            let index = set.scenarios.len();
            if let Some(l) = contingency.outage() {
                let branch = grid.branches.get(l).ok_or_else(|| {
                    ScopfError::InvalidContingency(format!(
                        "contingency {index} references branch {l}, but the case has {} branches",
                        grid.n_branch()
                    ))
                })?;
                if !branch.in_service {
                    return Err(ScopfError::InvalidContingency(format!(
                        "contingency {index} outages branch {l}, which is already out of service"
                    )));
                }
                let islands = outage_islands(network, l)?;
                if islands > base_islands {
                    if reject_islanding {
                        return Err(ScopfError::InvalidContingency(format!(
                            "outage of branch {l} splits the network into {islands} islands"
                        )));
                    }
                    warn!(
                        branch = l,
                        islands, "contingency islands part of the network; scenario may be infeasible"
                    );
                }
            }
            if !seen.insert(*contingency) {
                warn!(?contingency, "duplicate contingency");
            }
            set.scenarios.push(Scenario {
                index,
                outage: contingency.outage(),
            });
        }

        debug!(n_scenarios = set.len(), "scenario set built");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, s: usize) -> Option<&Scenario> {
        self.scenarios.get(s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn outages(&self) -> Vec<Option<usize>> {
        self.scenarios.iter().map(|s| s.outage).collect()
    }
}
