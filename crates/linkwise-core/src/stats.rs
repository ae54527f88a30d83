//! Per-service linking statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sources::FallbackStage;

/// Counters owned by one resolver instance and merged at batch end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatistics {
    pub successful: u64,
    pub partial: u64,
    pub failed: u64,
    pub cache_hits: u64,
    /// Outgoing requests per call type (e.g. `query`, `opensearch`, `sparql`).
    pub api_calls: BTreeMap<String, u64>,
    /// Successful fallback resolutions per stage.
    pub fallback_usage: BTreeMap<String, u64>,
}

impl ServiceStatistics {
    pub fn record_api_call(&mut self, call_type: &str) {
        *self.api_calls.entry(call_type.to_string()).or_insert(0) += 1;
    }

    pub fn record_fallback(&mut self, stage: FallbackStage) {
        *self
            .fallback_usage
            .entry(stage.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn total_api_calls(&self) -> u64 {
        self.api_calls.values().sum()
    }

    /// Entities with a terminal outcome.
    pub fn processed(&self) -> u64 {
        self.successful + self.partial + self.failed
    }

    pub fn merge(&mut self, other: &ServiceStatistics) {
        self.successful += other.successful;
        self.partial += other.partial;
        self.failed += other.failed;
        self.cache_hits += other.cache_hits;
        for (k, v) in &other.api_calls {
            *self.api_calls.entry(k.clone()).or_insert(0) += v;
        }
        for (k, v) in &other.fallback_usage {
            *self.fallback_usage.entry(k.clone()).or_insert(0) += v;
        }
    }
}
