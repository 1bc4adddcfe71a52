//! Formulation settings.
//!
//! Solver-engine settings live with the engine (`solver::IpoptOptions`); the
//! values here shape the NLP itself and are fixed once a
//! [`ProblemInstance`](crate::ProblemInstance) is built.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopfConfig {
    /// Added to every upper variable bound except the reference angle so that
    /// equal bounds are never treated as fixed and removed by the engine
    pub bound_epsilon: f64,
    /// Flow-limit rows get the constraint bounds `[-inequality_offset, 0]`
    pub inequality_offset: f64,
    /// Stand-in for an infinite bound when computing the default start point
    pub infinity_proxy: f64,
    /// Evaluate scenarios on the rayon pool (needs the `parallel` feature)
    pub parallel_scenarios: bool,
    /// Refuse contingencies whose outage splits the network into islands
    /// instead of logging a warning
    pub reject_islanding_contingencies: bool,
}

impl Default for ScopfConfig {
    fn default() -> Self {
        Self {
            bound_epsilon: 1e-10,
            inequality_offset: 1e10,
            infinity_proxy: 1e10,
            parallel_scenarios: true,
            reject_islanding_contingencies: false,
        }
    }
}

impl ScopfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound_epsilon(mut self, eps: f64) -> Self {
        self.bound_epsilon = eps;
        self
    }

    pub fn with_inequality_offset(mut self, offset: f64) -> Self {
        self.inequality_offset = offset;
        self
    }

    pub fn with_infinity_proxy(mut self, proxy: f64) -> Self {
        self.infinity_proxy = proxy;
        self
    }

    pub fn with_parallel_scenarios(mut self, parallel: bool) -> Self {
        self.parallel_scenarios = parallel;
        self
    }

    pub fn with_reject_islanding(mut self, reject: bool) -> Self {
        self.reject_islanding_contingencies = reject;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScopfConfig::default();
        assert_eq!(config.bound_epsilon, 1e-10);
        assert_eq!(config.inequality_offset, 1e10);
        assert_eq!(config.infinity_proxy, 1e10);
        assert!(config.parallel_scenarios);
        assert!(!config.reject_islanding_contingencies);
    }

    #[test]
    fn test_builder() {
        let config = ScopfConfig::new()
            .with_bound_epsilon(1e-8)
            .with_parallel_scenarios(false)
            .with_reject_islanding(true);
        assert_eq!(config.bound_epsilon, 1e-8);
        assert!(!config.parallel_scenarios);
        assert!(config.reject_islanding_contingencies);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScopfConfig = serde_json::from_str(r#"{"bound_epsilon": 1e-9}"#).unwrap();
        assert_eq!(config.bound_epsilon, 1e-9);
        assert_eq!(config.inequality_offset, 1e10);
    }
}
