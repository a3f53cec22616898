//! The analytics engine: consumes analyses, answers report requests.

use crate::error::AnalyticsError;
use crate::graph::{DependencyGraph, EdgeKind, GraphNode};
use crate::history::{ComplexityHistory, Trend};
use crate::report::{self, AnalyticsReport, CentralNode, ComplexityTrend, HotspotInput};
use crate::resolve;
use chrono::{DateTime, Utc};
use codelens_indexer::store::normalize_path;
use codelens_indexer::{ChangeEventKind, FileAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Nodes listed in the report's centrality ranking.
const MOST_CENTRAL_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsOptions {
    /// File complexity above which the complexity factor applies
    pub complexity_threshold: u32,
    /// Minimum total score for a hotspot
    pub hotspot_threshold: f64,
    /// Trailing window for complexity history
    pub history_window_days: u32,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            complexity_threshold: 10,
            hotspot_threshold: 5.0,
            history_window_days: 30,
        }
    }
}

/// Everything recorded about one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetrics {
    pub path: String,
    pub complexity: u32,
    pub line_count: usize,
    pub change_count: u32,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub centrality: f64,
    pub trend: Trend,
}

pub struct AnalyticsEngine {
    options: AnalyticsOptions,
    analyses: BTreeMap<String, FileAnalysis>,
    graph: DependencyGraph,
    history: ComplexityHistory,
    change_counts: HashMap<String, u32>,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(AnalyticsOptions::default())
    }
}

impl AnalyticsEngine {
    pub fn new(options: AnalyticsOptions) -> Self {
        Self {
            options,
            analyses: BTreeMap::new(),
            graph: DependencyGraph::new(),
            history: ComplexityHistory::new(options.history_window_days),
            change_counts: HashMap::new(),
        }
    }

    pub fn options(&self) -> &AnalyticsOptions {
        &self.options
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn file_count(&self) -> usize {
        self.analyses.len()
    }

    /// Fold one analysis into the graph, history and change counters.
    ///
    /// Imports that resolve to a known file become edges; project-local
    /// imports naming files not seen yet wait as pending; external imports
    /// are skipped.
    pub fn process_file_analysis(&mut self, analysis: &FileAnalysis, change: Option<ChangeEventKind>) {
        let path = normalize_path(&analysis.path);
        let complexity = analysis.complexity.unwrap_or(0);

        self.graph.upsert_node(GraphNode {
            path: path.clone(),
            language: analysis.language,
            size: analysis.size,
            line_count: analysis.line_count,
            complexity,
            centrality: 0.0,
        });

        let mut edges = Vec::new();
        let mut pending = Vec::new();
        for (module, kind) in referenced_modules(analysis) {
            let candidates = resolve::candidates(&path, &module, analysis.language);
            match candidates.iter().find(|c| self.graph.contains(c.as_str())) {
                Some(target) => edges.push((target.clone(), kind)),
                None if !candidates.is_empty() => pending.push((candidates, kind)),
                None => {}
            }
        }
        let edge_count = edges.len();
        self.graph.set_edges(&path, &edges);
        self.graph.set_pending(&path, pending);

        self.history.record(&path, complexity, sample_time(analysis));

        if change.is_some_and(|kind| kind.is_content_change()) {
            self.record_change(&path);
        }

        debug!(path = %path, complexity, edges = edge_count, "Processed analysis");
        self.analyses.insert(path, analysis.clone());
    }

    /// Drop a deleted file. Returns false when it was never recorded.
    pub fn forget_file(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        let existed = self.analyses.remove(&path).is_some();
        self.graph.remove_node(&path);
        self.history.remove(&path);
        self.change_counts.remove(&path);
        existed
    }

    /// Drop every file under `dir`. Returns the forgotten paths.
    pub fn forget_prefix(&mut self, dir: &str) -> Vec<String> {
        let dir = normalize_path(dir);
        let prefix = format!("{}/", dir);
        let doomed: Vec<String> = self
            .analyses
            .keys()
            .filter(|p| **p == dir || p.starts_with(&prefix))
            .cloned()
            .collect();
        for path in &doomed {
            self.forget_file(path);
        }
        doomed
    }

    pub fn reset(&mut self) {
        self.analyses.clear();
        self.graph.clear();
        self.history.clear();
        self.change_counts.clear();
    }

    /// Count a create or modify event whose content needed no re-analysis.
    /// Returns the new count.
    pub fn record_change(&mut self, path: &str) -> u32 {
        let count = self.change_counts.entry(normalize_path(path)).or_insert(0);
        *count += 1;
        *count
    }

    pub fn change_count(&self, path: &str) -> u32 {
        self.change_counts.get(&normalize_path(path)).copied().unwrap_or(0)
    }

    pub fn file_metrics(&self, path: &str) -> Result<FileMetrics, AnalyticsError> {
        let path = normalize_path(path);
        let analysis = self
            .analyses
            .get(&path)
            .ok_or_else(|| AnalyticsError::UnknownFile(path.clone()))?;
        Ok(FileMetrics {
            complexity: analysis.complexity.unwrap_or(0),
            line_count: analysis.line_count,
            change_count: self.change_count(&path),
            dependencies: self.graph.dependencies(&path).map(String::from).collect(),
            dependents: self.graph.dependents(&path).map(String::from).collect(),
            centrality: self.graph.node(&path).map(|n| n.centrality).unwrap_or(0.0),
            trend: self.history.trend(&path),
            path,
        })
    }

    /// Build a full report from current state.
    pub fn generate_report(&mut self) -> AnalyticsReport {
        self.graph.update_centrality();

        let inputs = self.analyses.iter().map(|(path, analysis)| HotspotInput {
            path,
            complexity: analysis.complexity.unwrap_or(0),
            changes: self.change_count(path),
            line_count: analysis.line_count,
            dependents: self.graph.dependent_count(path),
        });
        let hotspots = report::hotspots(
            inputs,
            self.options.complexity_threshold,
            self.options.hotspot_threshold,
        );
        let code_smells = report::code_smells(&self.analyses);
        let patterns = report::patterns(&self.analyses);

        let edges = self.graph.edges();
        let total_dependencies = edges.len();
        let circular: Vec<_> = edges.into_iter().filter(|e| e.is_circular).collect();

        let trends = self
            .analyses
            .keys()
            .filter_map(|path| {
                let samples = self.history.samples(path);
                let (first, last) = (samples.first()?, samples.last()?);
                Some(ComplexityTrend {
                    path: path.clone(),
                    trend: self.history.trend(path),
                    samples: samples.len(),
                    first: first.complexity,
                    last: last.complexity,
                })
            })
            .collect();

        let mut central: Vec<CentralNode> = self
            .graph
            .nodes()
            .filter(|n| n.centrality > 0.0)
            .map(|n| CentralNode {
                path: n.path.clone(),
                centrality: n.centrality,
            })
            .collect();
        central.sort_by(|a, b| {
            b.centrality
                .total_cmp(&a.centrality)
                .then_with(|| a.path.cmp(&b.path))
        });
        central.truncate(MOST_CENTRAL_LIMIT);

        let average_complexity = if self.analyses.is_empty() {
            0.0
        } else {
            let total: u64 = self
                .analyses
                .values()
                .map(|a| u64::from(a.complexity.unwrap_or(0)))
                .sum();
            total as f64 / self.analyses.len() as f64
        };

        AnalyticsReport::assemble(
            self.analyses.len(),
            total_dependencies,
            average_complexity,
            hotspots,
            code_smells,
            patterns,
            circular,
            self.graph.find_cycles(),
            trends,
            central,
        )
    }
}

/// Module specifiers with their edge kind: imports first, then bare
/// dependencies that no import already names.
fn referenced_modules(analysis: &FileAnalysis) -> Vec<(String, EdgeKind)> {
    let mut modules: Vec<(String, EdgeKind)> = Vec::new();
    for import in analysis.imports() {
        if !modules.iter().any(|(m, _)| *m == import.module) {
            modules.push((import.module.clone(), EdgeKind::Import));
        }
    }
    for dependency in analysis.dependencies() {
        if !modules.iter().any(|(m, _)| m == dependency) {
            modules.push((dependency.clone(), EdgeKind::Dependency));
        }
    }
    modules
}

/// The source timestamp when the producer supplied one, else now.
fn sample_time(analysis: &FileAnalysis) -> DateTime<Utc> {
    if analysis.last_modified > DateTime::<Utc>::default() {
        analysis.last_modified
    } else {
        Utc::now()
    }
}
