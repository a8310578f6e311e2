//! Column-level lineage graph and impact analysis

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::{safe_id, LineageResult};

/// Which side of an edge a node was last added as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeLayer {
    Source,
    Target,
}

/// Traversal direction for [`LineageGraph::impact`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    /// Everything this column feeds
    Forward,
    /// Everything this column was produced from
    Backward,
}

impl ImpactDirection {
    fn petgraph(self) -> Direction {
        match self {
            ImpactDirection::Forward => Direction::Outgoing,
            ImpactDirection::Backward => Direction::Incoming,
        }
    }
}

/// A `TABLE.COLUMN` node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub table: String,
    pub column: String,
    pub layer: NodeLayer,
}

/// Directed graph of column lineage; edge weights are transform texts
#[derive(Debug, Default)]
pub struct LineageGraph {
    graph: DiGraph<LineageNode, String>,
    node_map: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for one extraction result
    pub fn from_lineage(lineage: &LineageResult) -> Self {
        let mut graph = Self::new();
        graph.extend(lineage);
        graph
    }

    /// Add the column edges of another extraction result
    ///
    /// Nodes shared between results join their lineage into one chain.
    pub fn extend(&mut self, lineage: &LineageResult) {
        let target_table = lineage.target_or_output().to_uppercase();

        for edge in &lineage.column_lineage {
            let source_table = lineage.source_table_of(edge);
            let source_col = edge.source_col.to_uppercase();
            let target_col = edge.target_col.to_uppercase();

            let source_id = if source_col.is_empty() {
                source_table.clone()
            } else {
                format!("{source_table}.{source_col}")
            };
            let target_id = format!("{target_table}.{target_col}");

            let from = self.upsert_node(LineageNode {
                id: source_id,
                table: source_table,
                column: source_col,
                layer: NodeLayer::Source,
            });
            let to = self.upsert_node(LineageNode {
                id: target_id,
                table: target_table.clone(),
                column: target_col,
                layer: NodeLayer::Target,
            });
            self.graph.update_edge(from, to, edge.transform.clone());
        }

        tracing::debug!(
            nodes = self.node_count(),
            edges = self.edge_count(),
            "lineage graph updated"
        );
    }

    /// Insert a node, or overwrite the attributes of an existing one
    fn upsert_node(&mut self, node: LineageNode) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&node.id) {
            self.graph[idx] = node;
            idx
        } else {
            let id = node.id.clone();
            let idx = self.graph.add_node(node);
            self.node_map.insert(id, idx);
            idx
        }
    }

    /// All nodes reachable from `node` in `direction`, sorted
    ///
    /// An unknown node has no impact.
    pub fn impact(&self, node: &str, direction: ImpactDirection) -> Vec<String> {
        let Some(&start) = self.node_map.get(&node.to_uppercase()) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            for next in self.graph.neighbors_directed(current, direction.petgraph()) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited.remove(&start);
        let mut reached: Vec<String> = visited
            .into_iter()
            .map(|idx| self.graph[idx].id.clone())
            .collect();
        reached.sort();
        reached
    }

    pub fn contains(&self, node: &str) -> bool {
        self.node_map.contains_key(&node.to_uppercase())
    }

    pub fn node(&self, node: &str) -> Option<&LineageNode> {
        self.node_map
            .get(&node.to_uppercase())
            .map(|&idx| &self.graph[idx])
    }

    pub fn layer(&self, node: &str) -> Option<NodeLayer> {
        self.node(node).map(|n| n.layer)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.graph.node_weights()
    }

    /// `(source, target, transform)` triples in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
                e.weight().as_str(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Plain node and edge lists with rendering-safe ids
    pub fn export(&self) -> GraphExport {
        let nodes = self
            .nodes()
            .map(|n| ExportNode {
                id: safe_id(&n.id),
                label: n.id.clone(),
                table: n.table.clone(),
                column: n.column.clone(),
                layer: n.layer,
            })
            .collect();
        let edges = self
            .edges()
            .map(|(source, target, transform)| ExportEdge {
                source: safe_id(source),
                target: safe_id(target),
                transform: transform.to_string(),
            })
            .collect();
        GraphExport { nodes, edges }
    }
}

/// Build the lineage graph for `lineage`
pub fn build_graph(lineage: &LineageResult) -> LineageGraph {
    LineageGraph::from_lineage(lineage)
}

/// Serializable form of a [`LineageGraph`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: String,
    pub label: String,
    pub table: String,
    pub column: String,
    pub layer: NodeLayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub source: String,
    pub target: String,
    pub transform: String,
}
