use indexcore_chunker::CodeChunk;
use petgraph::graph::{Graph, NodeIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolType {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Variable,
    Constant,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    Calls,
    Uses,
    Contains,
    Extends,
    Imports,
    TestedBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub qualified_name: Option<String>,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub symbol_type: SymbolType,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub symbol: Symbol,
    pub chunk_id: String,
    pub chunk: Option<CodeChunk>,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphEdge {
    pub relationship: RelationshipType,
    pub weight: f32,
}

/// In-memory code graph: nodes are symbols (functions, types, ...), edges are relationships
/// (calls, uses, ...) extracted from the AST. This is the core's local `GraphExtractor` —
/// distinct from the durable `GraphStore` backend adapter that persists nodes/edges per project.
#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    pub(crate) graph: Graph<GraphNode, GraphEdge>,
}

impl CodeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: GraphEdge) {
        self.graph.add_edge(from, to, edge);
    }

    #[must_use]
    pub fn find_node(&self, symbol_name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx].symbol.name == symbol_name)
    }

    #[must_use]
    pub fn get_node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(idx)
    }

    #[must_use]
    pub fn find_nodes_by_chunk(&self, chunk_id: &str) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].chunk_id == chunk_id)
            .collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &GraphEdge)> {
        use petgraph::visit::EdgeRef;
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target(), edge.weight()))
    }
}
