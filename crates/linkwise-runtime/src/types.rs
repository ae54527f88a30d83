//! Runtime types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use linkwise_core::{EntityProcessingContext, ServiceStatistics};
use serde::Serialize;

use crate::graph::{GraphExport, KnowledgeGraph};

/// Statistics of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatistics {
    /// Per-service counters keyed by service name, sorted by name.
    pub services: BTreeMap<String, ServiceStatistics>,
    /// Sum over every service.
    pub total: ServiceStatistics,
}

impl PipelineStatistics {
    pub fn service(&self, name: &str) -> Option<&ServiceStatistics> {
        self.services.get(name)
    }
}

/// Final document written by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
    pub language: String,
    pub entities: Vec<EntityProcessingContext>,
    pub statistics: PipelineStatistics,
    pub graph: GraphExport,
}

impl PipelineOutput {
    /// Build the output for a finished run. The graph is derived from the
    /// contexts.
    pub fn new(
        language: impl Into<String>,
        entities: Vec<EntityProcessingContext>,
        statistics: PipelineStatistics,
    ) -> Self {
        let graph = KnowledgeGraph::from_contexts(&entities).export();
        Self {
            generated_at: Utc::now(),
            language: language.into(),
            entities,
            statistics,
            graph,
        }
    }
}
