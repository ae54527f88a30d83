//! Linkwise Core: entity context, source records, configuration, collaborators.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod sources;
pub mod stats;
pub mod terms;

pub use cache::{cache_key, CacheStore, FileCache, MemoryCache, NoopCache};
pub use config::{
    CacheConfig, DbpediaConfig, LinkerConfig, RateLimitConfig, WikidataConfig, WikipediaConfig,
};
pub use context::{keys, EntityProcessingContext, Relationship, ServiceKind};
pub use error::{Error, Result};
pub use sources::{
    Coordinates, DbpediaRecord, DbpediaStatus, EntityRef, FallbackStage, LinkStatus,
    ResultSource, Sources, WikidataRecord, WikipediaRecord,
};
pub use stats::ServiceStatistics;
pub use terms::{DictionaryTermGenerator, NoopTermGenerator, TermGenerator};
