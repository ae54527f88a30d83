//! Orchestrator: runs the enabled resolvers over a batch in pipeline order.

use std::sync::Arc;

use linkwise_core::{
    CacheStore, EntityProcessingContext, LinkerConfig, Result, ServiceKind, ServiceStatistics,
    TermGenerator,
};
use linkwise_resolve::{DbpediaResolver, Resolver, WikidataResolver, WikipediaResolver};
use tracing::{debug, info};

use crate::types::{PipelineOutput, PipelineStatistics};

/// Top-level pipeline: Wikipedia, then Wikidata, then DBpedia.
pub struct Orchestrator {
    language: String,
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl Orchestrator {
    /// Validate the configuration and build one resolver per enabled service.
    pub fn from_config(
        config: &LinkerConfig,
        cache: Arc<dyn CacheStore>,
        terms: Arc<dyn TermGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        let mut resolvers: Vec<Arc<dyn Resolver>> = Vec::new();
        if config.wikipedia.enabled {
            resolvers.push(Arc::new(WikipediaResolver::new(
                config,
                cache.clone(),
                terms.clone(),
            )?));
        }
        if config.wikidata.enabled {
            resolvers.push(Arc::new(WikidataResolver::new(
                config,
                cache.clone(),
                terms.clone(),
            )?));
        }
        if config.dbpedia.enabled {
            resolvers.push(Arc::new(DbpediaResolver::new(config, cache, terms)?));
        }

        let orchestrator = Self::with_resolvers(config.language.clone(), resolvers);
        info!(
            "Orchestrator initialized: language={}, services={:?}",
            orchestrator.language,
            orchestrator.services()
        );
        Ok(orchestrator)
    }

    /// Create with explicit resolvers. They are put into pipeline order.
    pub fn with_resolvers(language: impl Into<String>, mut resolvers: Vec<Arc<dyn Resolver>>) -> Self {
        resolvers.sort_by_key(|r| r.service());
        Self {
            language: language.into(),
            resolvers,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Enabled services in the order they run.
    pub fn services(&self) -> Vec<ServiceKind> {
        self.resolvers.iter().map(|r| r.service()).collect()
    }

    /// Resolve every context in place. Each service sees the whole batch
    /// before the next one starts, so later services can read what earlier
    /// ones wrote.
    pub async fn process_batch(&self, contexts: &mut [EntityProcessingContext]) {
        if contexts.is_empty() {
            return;
        }
        for resolver in &self.resolvers {
            debug!(
                "Running service={} entities={}",
                resolver.service(),
                contexts.len()
            );
            resolver.process_batch(contexts).await;
        }
        info!("Pipeline batch complete entities={}", contexts.len());
    }

    pub async fn process_entity(&self, context: &mut EntityProcessingContext) {
        self.process_batch(std::slice::from_mut(context)).await
    }

    /// Per-service statistics plus their sum.
    pub fn get_statistics(&self) -> PipelineStatistics {
        let mut statistics = PipelineStatistics::default();
        let mut total = ServiceStatistics::default();
        for resolver in &self.resolvers {
            let stats = resolver.get_statistics();
            total.merge(&stats);
            statistics
                .services
                .insert(resolver.service().as_str().to_string(), stats);
        }
        statistics.total = total;
        statistics
    }

    /// Process the contexts and package them with statistics and graph.
    pub async fn run(&self, mut contexts: Vec<EntityProcessingContext>) -> PipelineOutput {
        self.process_batch(&mut contexts).await;
        PipelineOutput::new(self.language.clone(), contexts, self.get_statistics())
    }
}
