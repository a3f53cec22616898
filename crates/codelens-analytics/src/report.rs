//! Code health report: hotspots, smells, patterns and cycles.
//!
//! Every section is computed from current engine state alone, so two
//! reports over the same state are identical apart from `generated_at`.

use crate::graph::GraphEdge;
use crate::history::Trend;
use chrono::{DateTime, Utc};
use codelens_indexer::FileAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CHANGE_FREQUENCY_THRESHOLD: u32 = 5;
const LINE_COUNT_THRESHOLD: usize = 500;
const DEPENDENT_THRESHOLD: usize = 10;

const COMPLEXITY_WEIGHT: f64 = 4.0;
const CHANGE_WEIGHT: f64 = 3.0;
const SIZE_WEIGHT: f64 = 2.0;
const DEPENDENT_WEIGHT: f64 = 3.0;

/// A factor never contributes more than this multiple of its weight.
const MAX_EXCESS_RATIO: f64 = 3.0;

const LONG_METHOD_COMPLEXITY: u32 = 15;
const LARGE_CLASS_MEMBERS: usize = 20;
const COMPLEX_CONDITIONAL_COMPLEXITY: u32 = 20;
const COMPLEX_CONDITIONAL_MAX_LINES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score >= 15.0 {
            Severity::Critical
        } else if score >= 12.0 {
            Severity::High
        } else if score >= 8.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotFactor {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub path: String,
    pub score: f64,
    pub severity: Severity,
    pub factors: Vec<HotspotFactor>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmellKind {
    LongMethod,
    LargeClass,
    ComplexConditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmellSeverity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSmell {
    pub kind: SmellKind,
    pub path: String,
    /// Function or class name; `None` for file-level smells
    pub name: Option<String>,
    pub line: Option<usize>,
    pub severity: SmellSeverity,
    /// The measurement that triggered the smell
    pub metric: u32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Singleton,
    Observer,
}

/// A heuristic match. `confidence` is in (0, 1] and never a guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub path: String,
    pub name: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityTrend {
    pub path: String,
    pub trend: Trend,
    pub samples: usize,
    pub first: u32,
    pub last: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CentralNode {
    pub path: String,
    pub centrality: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_files: usize,
    pub total_dependencies: usize,
    pub average_complexity: f64,
    pub hotspot_count: usize,
    pub code_smell_count: usize,
    pub pattern_count: usize,
    pub circular_dependency_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub hotspots: Vec<Hotspot>,
    pub code_smells: Vec<CodeSmell>,
    pub patterns: Vec<DetectedPattern>,
    pub circular_dependencies: Vec<GraphEdge>,
    pub cycles: Vec<Vec<String>>,
    pub complexity_trends: Vec<ComplexityTrend>,
    pub most_central: Vec<CentralNode>,
}

impl AnalyticsReport {
    /// Assemble a report. Summary counts are taken from the detail lists.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        total_files: usize,
        total_dependencies: usize,
        average_complexity: f64,
        hotspots: Vec<Hotspot>,
        code_smells: Vec<CodeSmell>,
        patterns: Vec<DetectedPattern>,
        circular_dependencies: Vec<GraphEdge>,
        cycles: Vec<Vec<String>>,
        complexity_trends: Vec<ComplexityTrend>,
        most_central: Vec<CentralNode>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: ReportSummary {
                total_files,
                total_dependencies,
                average_complexity,
                hotspot_count: hotspots.len(),
                code_smell_count: code_smells.len(),
                pattern_count: patterns.len(),
                circular_dependency_count: circular_dependencies.len(),
            },
            hotspots,
            code_smells,
            patterns,
            circular_dependencies,
            cycles,
            complexity_trends,
            most_central,
        }
    }

    /// Whether summary counts agree with the detail lists.
    pub fn is_consistent(&self) -> bool {
        self.summary.hotspot_count == self.hotspots.len()
            && self.summary.code_smell_count == self.code_smells.len()
            && self.summary.pattern_count == self.patterns.len()
            && self.summary.circular_dependency_count == self.circular_dependencies.len()
    }
}

/// Per-file measurements feeding the hotspot score.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HotspotInput<'a> {
    pub path: &'a str,
    pub complexity: u32,
    pub changes: u32,
    pub line_count: usize,
    pub dependents: usize,
}

/// Score every file and keep those at or above `min_score`, highest first.
pub(crate) fn hotspots<'a>(
    inputs: impl IntoIterator<Item = HotspotInput<'a>>,
    complexity_threshold: u32,
    min_score: f64,
) -> Vec<Hotspot> {
    let mut found: Vec<Hotspot> = inputs
        .into_iter()
        .filter_map(|input| {
            let mut factors = Vec::new();
            let mut recommendations = Vec::new();

            if let Some(factor) = factor(
                "complexity",
                f64::from(input.complexity),
                f64::from(complexity_threshold.max(1)),
                COMPLEXITY_WEIGHT,
            ) {
                recommendations.push(format!(
                    "Complexity {} exceeds {}; split branching logic into smaller functions",
                    input.complexity, complexity_threshold
                ));
                factors.push(factor);
            }
            if let Some(factor) = factor(
                "change_frequency",
                f64::from(input.changes),
                f64::from(CHANGE_FREQUENCY_THRESHOLD),
                CHANGE_WEIGHT,
            ) {
                recommendations.push(format!(
                    "Changed {} times; stabilize its interface and add regression tests",
                    input.changes
                ));
                factors.push(factor);
            }
            if let Some(factor) = factor(
                "size",
                input.line_count as f64,
                LINE_COUNT_THRESHOLD as f64,
                SIZE_WEIGHT,
            ) {
                recommendations.push(format!(
                    "{} lines long; split it by responsibility",
                    input.line_count
                ));
                factors.push(factor);
            }
            if let Some(factor) = factor(
                "dependents",
                input.dependents as f64,
                DEPENDENT_THRESHOLD as f64,
                DEPENDENT_WEIGHT,
            ) {
                recommendations.push(format!(
                    "{} files depend on it; keep its API narrow and well tested",
                    input.dependents
                ));
                factors.push(factor);
            }

            let score: f64 = factors.iter().map(|f| f.contribution).sum();
            if factors.is_empty() || score < min_score {
                return None;
            }
            Some(Hotspot {
                path: input.path.to_string(),
                score,
                severity: Severity::from_score(score),
                factors,
                recommendations,
            })
        })
        .collect();

    found.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
    found
}

/// Contribution of one factor, present only above its threshold.
fn factor(name: &str, value: f64, threshold: f64, weight: f64) -> Option<HotspotFactor> {
    if value <= threshold {
        return None;
    }
    let contribution = weight * (value / threshold).min(MAX_EXCESS_RATIO);
    Some(HotspotFactor {
        name: name.to_string(),
        value,
        threshold,
        contribution,
    })
}

pub(crate) fn code_smells(analyses: &BTreeMap<String, FileAnalysis>) -> Vec<CodeSmell> {
    let mut smells = Vec::new();

    for (path, analysis) in analyses {
        for function in analysis.functions() {
            if function.complexity <= LONG_METHOD_COMPLEXITY {
                continue;
            }
            let severity = if function.complexity > 30 {
                SmellSeverity::Critical
            } else if function.complexity > 20 {
                SmellSeverity::Major
            } else {
                SmellSeverity::Minor
            };
            smells.push(CodeSmell {
                kind: SmellKind::LongMethod,
                path: path.clone(),
                name: Some(function.name.clone()),
                line: Some(function.line),
                severity,
                metric: function.complexity,
                message: format!(
                    "Function '{}' has complexity {}",
                    function.name, function.complexity
                ),
            });
        }

        for class in analysis.classes() {
            let members = class.member_count();
            if members <= LARGE_CLASS_MEMBERS {
                continue;
            }
            let severity = if members > 50 {
                SmellSeverity::Critical
            } else if members > 30 {
                SmellSeverity::Major
            } else {
                SmellSeverity::Minor
            };
            smells.push(CodeSmell {
                kind: SmellKind::LargeClass,
                path: path.clone(),
                name: Some(class.name.clone()),
                line: Some(class.line),
                severity,
                metric: u32::try_from(members).unwrap_or(u32::MAX),
                message: format!("Type '{}' has {} members", class.name, members),
            });
        }

        let complexity = analysis.complexity.unwrap_or(0);
        if complexity > COMPLEX_CONDITIONAL_COMPLEXITY
            && analysis.line_count < COMPLEX_CONDITIONAL_MAX_LINES
        {
            smells.push(CodeSmell {
                kind: SmellKind::ComplexConditional,
                path: path.clone(),
                name: None,
                line: None,
                severity: SmellSeverity::Major,
                metric: complexity,
                message: format!(
                    "Complexity {} packed into {} lines",
                    complexity, analysis.line_count
                ),
            });
        }
    }

    smells.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    smells
}

const SINGLETON_ACCESSORS: &[&str] = &["getinstance", "get_instance", "instance", "shared", "sharedinstance"];

const SUBSCRIBE_NAMES: &[&str] = &["subscribe", "addlistener", "addeventlistener", "addobserver", "on", "register", "attach"];
const UNSUBSCRIBE_NAMES: &[&str] = &["unsubscribe", "removelistener", "removeeventlistener", "removeobserver", "off", "unregister", "detach"];
const NOTIFY_NAMES: &[&str] = &["notify", "notifyobservers", "notifylisteners", "emit", "publish", "dispatch", "trigger", "fire"];

/// Best-effort singleton and observer detection by naming convention.
pub(crate) fn patterns(analyses: &BTreeMap<String, FileAnalysis>) -> Vec<DetectedPattern> {
    let mut found = Vec::new();

    for (path, analysis) in analyses {
        for class in analysis.classes() {
            let lowered = class.name.to_lowercase();
            let accessor = class.methods.iter().find(|m| {
                let m = m.to_lowercase();
                SINGLETON_ACCESSORS.contains(&m.as_str())
            });
            let (confidence, evidence) = if lowered.contains("singleton") {
                (0.9, format!("type name '{}'", class.name))
            } else if let Some(accessor) = accessor {
                (0.7, format!("accessor '{}'", accessor))
            } else {
                continue;
            };
            found.push(DetectedPattern {
                kind: PatternKind::Singleton,
                path: path.clone(),
                name: class.name.clone(),
                confidence,
                evidence: vec![evidence],
            });
        }

        let mut names: Vec<&str> = analysis.functions().iter().map(|f| f.name.as_str()).collect();
        for class in analysis.classes() {
            names.extend(class.methods.iter().map(String::as_str));
        }

        let mut evidence = Vec::new();
        for category in [SUBSCRIBE_NAMES, UNSUBSCRIBE_NAMES, NOTIFY_NAMES] {
            if let Some(name) = names
                .iter()
                .find(|n| category.contains(&n.to_lowercase().as_str()))
            {
                evidence.push(format!("function '{}'", name));
            }
        }
        if evidence.len() >= 2 {
            let confidence = (0.3 + 0.2 * evidence.len() as f64).min(0.95);
            found.push(DetectedPattern {
                kind: PatternKind::Observer,
                path: path.clone(),
                name: file_stem(path).to_string(),
                confidence,
                evidence,
            });
        }
    }

    found.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.name.cmp(&b.name))
    });
    found
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}
