//! Runtime: runs the resolvers in pipeline order, merges their statistics
//! and assembles the knowledge graph for the final output.

pub mod graph;
pub mod orchestrator;
pub mod types;

pub use graph::{GraphEdge, GraphExport, GraphNode, GraphStats, KnowledgeGraph};
pub use orchestrator::Orchestrator;
pub use types::*;
