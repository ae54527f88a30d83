//! Statistics owned by one resolver instance.

use linkwise_core::{DbpediaStatus, FallbackStage, LinkStatus, ServiceStatistics};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<ServiceStatistics>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_call(&self, call_type: &str) {
        self.inner.lock().record_api_call(call_type);
    }

    pub fn cache_hit(&self) {
        self.inner.lock().cache_hits += 1;
    }

    pub fn fallback(&self, stage: FallbackStage) {
        self.inner.lock().record_fallback(stage);
    }

    pub fn link_outcome(&self, status: LinkStatus) {
        let mut stats = self.inner.lock();
        match status {
            LinkStatus::Found => stats.successful += 1,
            LinkStatus::Partial => stats.partial += 1,
            LinkStatus::NotFound | LinkStatus::Error => stats.failed += 1,
        }
    }

    pub fn dbpedia_outcome(&self, status: DbpediaStatus) {
        let mut stats = self.inner.lock();
        match status {
            DbpediaStatus::Linked => stats.successful += 1,
            DbpediaStatus::NotLinked | DbpediaStatus::Error => stats.failed += 1,
        }
    }

    pub fn snapshot(&self) -> ServiceStatistics {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes() {
        let stats = StatsRecorder::new();
        stats.link_outcome(LinkStatus::Found);
        stats.link_outcome(LinkStatus::Partial);
        stats.link_outcome(LinkStatus::Error);
        stats.dbpedia_outcome(DbpediaStatus::NotLinked);
        stats.fallback(FallbackStage::LookupApi);
        stats.api_call("sparql");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.successful, 1);
        assert_eq!(snapshot.partial, 1);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.fallback_usage["lookup_api"], 1);
        assert_eq!(snapshot.api_calls["sparql"], 1);
    }
}
