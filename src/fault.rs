//! FaultInjector - Probabilistic Fault Injection
//!
//! TigerStyle: Explicit fault injection for the simulated backend clients.
//!
//! Every simulated client call names its operation (`get_item`, `fetch_value`,
//! ...) and asks [`FaultInjector::should_inject`] first. Seeded, so a failing
//! run replays exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Kinds of backend failure a simulated client can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Read fails
    ReadFail,
    /// Write fails
    WriteFail,
    /// Delete fails
    DeleteFail,
    /// Request rejected for exceeding provisioned throughput
    Throttle,
    /// Connection lost mid-request
    NetworkReset,
}

impl FaultType {
    /// Name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadFail => "read_fail",
            Self::WriteFail => "write_fail",
            Self::DeleteFail => "delete_fail",
            Self::Throttle => "throttle",
            Self::NetworkReset => "network_reset",
        }
    }
}

impl std::fmt::Display for FaultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for one fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// The type of fault
    pub fault_type: FaultType,
    /// Probability of injection (0.0 to 1.0)
    pub probability: f64,
    /// Only operations containing this substring are affected
    pub operation_filter: Option<String>,
    /// Stop after this many injections
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a fault configuration.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1], got {probability}"
        );
        Self {
            fault_type,
            probability,
            operation_filter: None,
            max_injections: None,
        }
    }

    /// Restrict to matching operations.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Cap the number of injections.
    ///
    /// # Panics
    /// Panics if `max` is zero.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }
}

/// Seeded fault injector. Shareable via `Arc`; registration happens before sharing.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<StdRng>,
    configs: Vec<FaultConfig>,
    injection_counts: Mutex<HashMap<usize, u64>>,
    total: AtomicU64,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FaultInjector {
    /// Create an injector with no faults registered.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            configs: Vec::new(),
            injection_counts: Mutex::new(HashMap::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Register a fault.
    pub fn register(&mut self, config: FaultConfig) {
        self.configs.push(config);
    }

    /// Builder form of [`FaultInjector::register`].
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.register(config);
        self
    }

    /// Roll for a fault on `operation`.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        for (index, config) in self.configs.iter().enumerate() {
            if let Some(ref filter) = config.operation_filter {
                if !operation.contains(filter.as_str()) {
                    continue;
                }
            }

            let mut counts = self
                .injection_counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = counts.entry(index).or_insert(0);
            if config.max_injections.is_some_and(|max| *count >= max) {
                continue;
            }

            let roll = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_bool(config.probability);
            if roll {
                *count += 1;
                self.total.fetch_add(1, Ordering::Relaxed);
                return Some(config.fault_type);
            }
        }
        None
    }

    /// Total faults injected so far.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults_by_default() {
        let injector = FaultInjector::new(42);
        for _ in 0..100 {
            assert!(injector.should_inject("get_item").is_none());
        }
    }

    #[test]
    fn test_filter_and_cap() {
        let injector = FaultInjector::new(42).with_fault(
            FaultConfig::new(FaultType::ReadFail, 1.0)
                .with_filter("get")
                .with_max_injections(2),
        );

        assert!(injector.should_inject("put_item").is_none());
        assert_eq!(injector.should_inject("get_item"), Some(FaultType::ReadFail));
        assert_eq!(injector.should_inject("get_item"), Some(FaultType::ReadFail));
        assert!(injector.should_inject("get_item").is_none());
        assert_eq!(injector.total_injections(), 2);
    }

    #[test]
    fn test_same_seed_same_faults() {
        let run = |seed| {
            let injector =
                FaultInjector::new(seed).with_fault(FaultConfig::new(FaultType::Throttle, 0.5));
            (0..64)
                .map(|_| injector.should_inject("scan").is_some())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    #[should_panic(expected = "probability")]
    fn test_probability_out_of_range() {
        let _ = FaultConfig::new(FaultType::ReadFail, 1.5);
    }
}
