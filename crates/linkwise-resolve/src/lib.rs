//! Resolvers: link entity contexts against one knowledge source each.
//!
//! Every resolver runs a primary batch lookup, then an ordered fallback
//! chain for the entities the primary path could not settle. Per-entity
//! failures are recorded in the entity's source record and never returned
//! to the caller.

pub mod dbpedia;
pub mod fallback;
mod html;
mod mediawiki;
pub mod recorder;
pub mod wikidata;
pub mod wikipedia;

use async_trait::async_trait;
use linkwise_core::{EntityProcessingContext, ServiceKind, ServiceStatistics};

pub use dbpedia::DbpediaResolver;
pub use fallback::{run_chain, ChainOutcome, FallbackPlan, StageExecutor, StageFailure};
pub use recorder::StatsRecorder;
pub use wikidata::WikidataResolver;
pub use wikipedia::WikipediaResolver;

/// One knowledge-source resolver.
#[async_trait]
pub trait Resolver: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Resolve every context in place. Contexts already processed by this
    /// service are left untouched; order is preserved.
    async fn process_batch(&self, contexts: &mut [EntityProcessingContext]);

    /// Resolve a single context in place.
    async fn process_entity(&self, context: &mut EntityProcessingContext) {
        self.process_batch(std::slice::from_mut(context)).await
    }

    fn get_statistics(&self) -> ServiceStatistics;
}
