//! Codelens Analytics
//!
//! Code health analytics over the analyses produced during indexing:
//! - Dependency graph with value-keyed edges and cycle detection
//! - Resolution of project-local imports to indexed files
//! - Complexity history over a trailing window, and change frequency
//! - Hotspot, code smell and design pattern reports

mod engine;
mod error;
pub mod graph;
pub mod history;
pub mod report;
pub mod resolve;

pub use engine::{AnalyticsEngine, AnalyticsOptions, FileMetrics};
pub use error::AnalyticsError;
pub use graph::{DependencyGraph, EdgeKey, EdgeKind, GraphEdge, GraphNode};
pub use history::{ComplexityHistory, ComplexitySample, Trend};
pub use report::{
    AnalyticsReport, CodeSmell, DetectedPattern, Hotspot, PatternKind, ReportSummary, Severity,
    SmellKind, SmellSeverity,
};
