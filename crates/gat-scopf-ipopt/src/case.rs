//! JSON case format read from stdin.

use anyhow::{Context, Result};
use gat_core::Network;
use gat_scopf::{Contingency, IpoptOptions, ScopfConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopfCase {
    pub network: Network,
    #[serde(default)]
    pub contingencies: Vec<Contingency>,
    #[serde(default)]
    pub config: ScopfConfig,
    #[serde(default)]
    pub solver: IpoptOptions,
    /// Start from the voltages and dispatch stored in `network`
    #[serde(default)]
    pub warm_start: bool,
}

impl ScopfCase {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let case: ScopfCase =
            serde_json::from_slice(bytes).context("Failed to parse SCOPF case JSON")?;
        case.network
            .validate()
            .context("Case network failed validation")?;
        Ok(case)
    }
}
