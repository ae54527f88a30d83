//! Knowledge graph built from linked entity contexts using petgraph.

use std::collections::{BTreeMap, HashMap};

use linkwise_core::{EntityProcessingContext, ServiceKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// True for relationship endpoints that are not among the entities.
    pub inferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikipedia_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikidata_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbpedia_uri: Option<String>,
}

impl GraphNode {
    fn from_context(id: String, ctx: &EntityProcessingContext) -> Self {
        let sources = ctx.sources();
        let linked = |service: ServiceKind| sources.is_linked(service);
        Self {
            id,
            label: ctx.entity_name().to_string(),
            node_type: ctx.entity_type.clone(),
            inferred: false,
            wikipedia_url: sources
                .wikipedia
                .as_ref()
                .filter(|_| linked(ServiceKind::Wikipedia))
                .and_then(|r| r.url.clone()),
            wikidata_uri: sources
                .wikidata
                .as_ref()
                .filter(|_| linked(ServiceKind::Wikidata))
                .and_then(|r| r.uri.clone()),
            dbpedia_uri: sources
                .dbpedia
                .as_ref()
                .filter(|_| linked(ServiceKind::Dbpedia))
                .and_then(|r| r.uri.clone()),
        }
    }

    fn inferred(label: &str, node_type: Option<String>) -> Self {
        Self {
            id: format!("inferred:{}", normalize(label)),
            label: label.to_string(),
            node_type,
            inferred: true,
            wikipedia_url: None,
            wikidata_uri: None,
            dbpedia_uri: None,
        }
    }

    fn is_linked(&self) -> bool {
        self.wikipedia_url.is_some() || self.wikidata_uri.is_some() || self.dbpedia_uri.is_some()
    }
}

/// An edge in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub predicate: String,
    pub inferred: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub entity_count: usize,
    pub inferred_node_count: usize,
    /// Entities with a validated link, per source.
    pub linked: BTreeMap<String, usize>,
    /// Share of entities linked to at least one source.
    pub coverage: f64,
}

/// Serialisable form of the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

/// Directed graph of entities and their relationships.
pub struct KnowledgeGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    node_index: HashMap<String, NodeIndex>,
    linked: BTreeMap<String, usize>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            linked: BTreeMap::new(),
        }
    }

    /// One node per context, one edge per relationship. Relationship
    /// endpoints match entities by id or by name, case-insensitively.
    pub fn from_contexts(contexts: &[EntityProcessingContext]) -> Self {
        let mut graph = Self::new();
        for service in ServiceKind::all() {
            graph.linked.insert(service.as_str().to_string(), 0);
        }

        for ctx in contexts {
            let id = ctx
                .entity_id
                .clone()
                .unwrap_or_else(|| normalize(ctx.entity_name()));
            if graph.node_index.contains_key(&id) {
                continue;
            }
            for service in ServiceKind::all() {
                if ctx.sources().is_linked(*service) {
                    *graph.linked.entry(service.as_str().to_string()).or_insert(0) += 1;
                }
            }
            let node = GraphNode::from_context(id.clone(), ctx);
            let index = graph.graph.add_node(node);
            graph.node_index.insert(id.clone(), index);
            graph.node_index.entry(normalize(ctx.entity_name())).or_insert(index);
        }

        for ctx in contexts {
            for rel in &ctx.relationships {
                let source = graph.endpoint(&rel.subject, rel.subject_type.clone());
                let target = graph.endpoint(&rel.object, rel.object_type.clone());
                let edge = GraphEdge {
                    source: graph.graph[source].id.clone(),
                    target: graph.graph[target].id.clone(),
                    predicate: rel.predicate.clone(),
                    inferred: rel.inferred,
                };
                graph.graph.add_edge(source, target, edge);
            }
        }

        debug!(
            "Knowledge graph built nodes={} edges={}",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    /// Node for a relationship endpoint, adding an inferred node when the
    /// name is unknown.
    fn endpoint(&mut self, name: &str, node_type: Option<String>) -> NodeIndex {
        if let Some(index) = self.node_index.get(name.trim()) {
            return *index;
        }
        let key = normalize(name);
        if let Some(index) = self.node_index.get(&key) {
            return *index;
        }
        let node = GraphNode::inferred(name.trim(), node_type);
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index.insert(id, index);
        self.node_index.insert(key, index);
        index
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|i| &self.graph[*i])
    }

    /// Edges leaving the node with the given id.
    pub fn outgoing(&self, id: &str) -> Vec<&GraphEdge> {
        match self.node_index.get(id) {
            Some(index) => self.graph.edges(*index).map(|e| e.weight()).collect(),
            None => Vec::new(),
        }
    }

    /// Get graph statistics.
    pub fn stats(&self) -> GraphStats {
        let inferred_node_count = self.graph.node_weights().filter(|n| n.inferred).count();
        let entities: Vec<&GraphNode> = self.graph.node_weights().filter(|n| !n.inferred).collect();
        let linked_entities = entities.iter().filter(|n| n.is_linked()).count();
        let coverage = if entities.is_empty() {
            0.0
        } else {
            linked_entities as f64 / entities.len() as f64
        };
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            entity_count: entities.len(),
            inferred_node_count,
            linked: self.linked.clone(),
            coverage,
        }
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.graph.edge_weights().cloned().collect(),
            stats: self.stats(),
        }
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}
