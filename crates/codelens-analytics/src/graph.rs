//! Dependency graph between indexed documents.
//!
//! Edges are keyed by value (`source`, `target`, `kind`) so the same
//! relationship observed twice strengthens one edge instead of adding a
//! duplicate. Imports that name a project file not yet seen are parked as
//! pending and bound once that file arrives.
//!
//! Weights only grow: an edge dropped because its source stopped importing
//! the target, or because the target was deleted, keeps its accumulated
//! weight and resumes from it when observed again. Only [`DependencyGraph::clear`]
//! resets weights.

use codelens_indexer::Language;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// From an import statement
    Import,
    /// From a dependency list without a matching import statement
    Dependency,
}

/// Identity of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub path: String,
    pub language: Language,
    pub size: u64,
    pub line_count: usize,
    pub complexity: u32,
    /// Degree centrality as of the last report
    pub centrality: f64,
}

/// An edge as reported, with its circularity evaluated against the
/// current graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: u32,
    pub is_circular: bool,
}

/// An import naming project files that are not in the graph yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingImport {
    candidates: Vec<String>,
    kind: EdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
    /// Edges currently present
    edges: BTreeSet<EdgeKey>,
    /// Observation counts, kept across edge removal
    weights: BTreeMap<EdgeKey, u32>,
    /// Forward adjacency: file -> files it depends on
    outgoing: BTreeMap<String, BTreeSet<String>>,
    /// Reverse adjacency: file -> files that depend on it
    incoming: BTreeMap<String, BTreeSet<String>>,
    pending: BTreeMap<String, Vec<PendingImport>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn node(&self, path: &str) -> Option<&GraphNode> {
        self.nodes.get(path)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add or refresh a node. Any pending imports naming it become edges.
    pub fn upsert_node(&mut self, node: GraphNode) {
        let path = node.path.clone();
        let centrality = self.nodes.get(&path).map(|n| n.centrality).unwrap_or(0.0);
        self.nodes.insert(path.clone(), GraphNode { centrality, ..node });
        self.bind_pending(&path);
    }

    /// Replace the outgoing edges of `source` with `targets`.
    ///
    /// Targets already linked are strengthened, new ones are added, and
    /// edges of `source` that are no longer observed are dropped.
    pub fn set_edges(&mut self, source: &str, targets: &[(String, EdgeKind)]) {
        let observed: HashSet<EdgeKey> = targets
            .iter()
            .filter(|(target, _)| target != source)
            .map(|(target, kind)| EdgeKey {
                source: source.to_string(),
                target: target.clone(),
                kind: *kind,
            })
            .collect();

        let stale: Vec<EdgeKey> = self
            .edges
            .iter()
            .filter(|key| key.source == source && !observed.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            self.remove_edge(&key);
        }

        for key in observed {
            self.add_edge(key);
        }
    }

    /// Add an edge or strengthen an existing one.
    pub fn add_edge(&mut self, key: EdgeKey) {
        self.outgoing
            .entry(key.source.clone())
            .or_default()
            .insert(key.target.clone());
        self.incoming
            .entry(key.target.clone())
            .or_default()
            .insert(key.source.clone());
        *self.weights.entry(key.clone()).or_insert(0) += 1;
        self.edges.insert(key);
    }

    fn remove_edge(&mut self, key: &EdgeKey) {
        if !self.edges.remove(key) {
            return;
        }
        // Another edge kind may still link the same pair
        let still_linked = self
            .edges
            .iter()
            .any(|k| k.source == key.source && k.target == key.target);
        if still_linked {
            return;
        }
        if let Some(set) = self.outgoing.get_mut(&key.source) {
            set.remove(&key.target);
            if set.is_empty() {
                self.outgoing.remove(&key.source);
            }
        }
        if let Some(set) = self.incoming.get_mut(&key.target) {
            set.remove(&key.source);
            if set.is_empty() {
                self.incoming.remove(&key.target);
            }
        }
    }

    pub fn has_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains(key)
    }

    /// Times `key` has been observed since the last [`DependencyGraph::clear`],
    /// whether or not the edge is currently present.
    pub fn weight(&self, key: &EdgeKey) -> Option<u32> {
        self.weights.get(key).copied()
    }

    /// Replace the pending imports of `source`.
    pub fn set_pending(&mut self, source: &str, pending: Vec<(Vec<String>, EdgeKind)>) {
        let pending: Vec<PendingImport> = pending
            .into_iter()
            .filter(|(candidates, _)| !candidates.is_empty())
            .map(|(candidates, kind)| PendingImport { candidates, kind })
            .collect();
        if pending.is_empty() {
            self.pending.remove(source);
        } else {
            self.pending.insert(source.to_string(), pending);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    fn bind_pending(&mut self, path: &str) {
        let mut bound = Vec::new();
        for (source, imports) in self.pending.iter_mut() {
            imports.retain(|import| {
                if import.candidates.iter().any(|c| c == path) {
                    bound.push(EdgeKey {
                        source: source.clone(),
                        target: path.to_string(),
                        kind: import.kind,
                    });
                    false
                } else {
                    true
                }
            });
        }
        self.pending.retain(|_, imports| !imports.is_empty());

        for key in bound {
            if key.source != key.target {
                self.add_edge(key);
            }
        }
    }

    /// Remove a node and its outgoing edges. Edges pointing at it revert to
    /// pending so the file rebinds if it comes back.
    pub fn remove_node(&mut self, path: &str) -> bool {
        let existed = self.nodes.remove(path).is_some();
        self.pending.remove(path);

        let touching: Vec<EdgeKey> = self
            .edges
            .iter()
            .filter(|key| key.source == path || key.target == path)
            .cloned()
            .collect();
        for key in touching {
            if key.target == path && key.source != path {
                self.pending
                    .entry(key.source.clone())
                    .or_default()
                    .push(PendingImport {
                        candidates: vec![path.to_string()],
                        kind: key.kind,
                    });
            }
            self.remove_edge(&key);
        }
        existed
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn dependencies(&self, path: &str) -> impl Iterator<Item = &str> + '_ {
        self.outgoing
            .get(path)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn dependents(&self, path: &str) -> impl Iterator<Item = &str> + '_ {
        self.incoming
            .get(path)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Number of distinct files depending on `path`.
    pub fn dependent_count(&self, path: &str) -> usize {
        self.incoming.get(path).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether `to` is reachable from `from` along dependency edges.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            stack.extend(self.dependencies(node).filter(|n| !visited.contains(n)));
        }
        false
    }

    /// An edge is circular when its target can reach its source.
    pub fn is_circular(&self, key: &EdgeKey) -> bool {
        self.has_path(&key.target, &key.source)
    }

    /// All edges in key order.
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.edges
            .iter()
            .map(|key| GraphEdge {
                source: key.source.clone(),
                target: key.target.clone(),
                kind: key.kind,
                weight: self.weights.get(key).copied().unwrap_or(0),
                is_circular: self.is_circular(key),
            })
            .collect()
    }

    /// Distinct cycles, each listed from its smallest path.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for node in self.outgoing.keys() {
            if !visited.contains(node.as_str()) {
                let mut path = Vec::new();
                self.find_cycles_dfs(node, &mut visited, &mut path, &mut cycles);
            }
        }

        cycles.into_iter().collect()
    }

    fn find_cycles_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut BTreeSet<Vec<String>>,
    ) {
        if let Some(pos) = path.iter().position(|n| *n == node) {
            cycles.insert(rotate_to_min(&path[pos..]));
            return;
        }
        if visited.contains(node) {
            return;
        }

        path.push(node);
        for dep in self.dependencies(node) {
            self.find_cycles_dfs(dep, visited, path, cycles);
        }
        path.pop();
        visited.insert(node);
    }

    /// Recompute degree centrality for every node: distinct neighbors over
    /// the maximum possible.
    pub fn update_centrality(&mut self) {
        let n = self.nodes.len();
        let denominator = n.saturating_sub(1).max(1) as f64;
        let degrees: Vec<(String, f64)> = self
            .nodes
            .keys()
            .map(|path| {
                let mut neighbors: HashSet<&str> = self.dependencies(path).collect();
                neighbors.extend(self.dependents(path));
                (path.clone(), neighbors.len() as f64 / denominator)
            })
            .collect();
        for (path, centrality) in degrees {
            if let Some(node) = self.nodes.get_mut(&path) {
                node.centrality = centrality;
            }
        }
    }
}

fn rotate_to_min(cycle: &[&str]) -> Vec<String> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| **p)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..]
        .iter()
        .chain(cycle[..start].iter())
        .map(|p| p.to_string())
        .collect()
}
