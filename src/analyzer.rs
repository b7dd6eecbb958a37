//! Resource-Allocation Analyzer
//!
//! Classifies request and allocation edges, evaluates the four Coffman
//! conditions and searches the allocation graph for circular wait.

use crate::graph::{AllocationGraph, CycleEdge};
use crate::metrics::{self, AnalyzerMetrics};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Default upper bound on edges accepted from untrusted payloads.
pub const DEFAULT_MAX_EDGES: usize = 10_000;

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Maximum number of edges accepted by the checked entry points
    pub max_edges: usize,
    /// Leading character of process labels
    pub process_prefix: char,
    /// Leading character of resource labels
    pub resource_prefix: char,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_edges: DEFAULT_MAX_EDGES,
            process_prefix: 'P',
            resource_prefix: 'R',
        }
    }
}

impl AnalyzerConfig {
    /// Returns the role a label plays, judged by its prefix.
    pub fn role_of(&self, label: &str) -> NodeRole {
        if label.starts_with(self.process_prefix) {
            NodeRole::Process
        } else if label.starts_with(self.resource_prefix) {
            NodeRole::Resource
        } else {
            NodeRole::Other
        }
    }

    /// Classifies an edge by the roles of its endpoints.
    pub fn edge_kind(&self, edge: &Edge) -> EdgeKind {
        match (self.role_of(&edge.source), self.role_of(&edge.target)) {
            (NodeRole::Process, NodeRole::Resource) => EdgeKind::Request,
            (NodeRole::Resource, NodeRole::Process) => EdgeKind::Allocation,
            _ => EdgeKind::Unclassified,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error raised when an edge list does not have the expected shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputFormatError {
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),
    #[error("Payload must be a JSON object")]
    NotAnObject,
    #[error("Missing field `{0}`")]
    MissingField(&'static str),
    #[error("Edge list must be a list of [source, target] pairs")]
    NotAList,
    #[error("Edge {index} is malformed: {reason}")]
    MalformedEdge { index: usize, reason: String },
    #[error("Edge {index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("Too many edges: got {count}, limit is {limit}")]
    TooManyEdges { count: usize, limit: usize },
}

// ============================================================================
// DATA MODEL
// ============================================================================

/// Role of a node label in the allocation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Process,
    Resource,
    /// Neither prefix matched; the node still takes part in cycle search.
    Other,
}

/// Meaning of an edge, derived from its endpoint roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Process -> Resource: the process is waiting for the resource.
    Request,
    /// Resource -> Process: the resource is held by the process.
    Allocation,
    Unclassified,
}

/// An ordered `(source, target)` pair. Serializes as a two-element list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl<S: Into<String>, T: Into<String>> From<(S, T)> for Edge {
    fn from((source, target): (S, T)) -> Self {
        Self::new(source, target)
    }
}

impl From<Edge> for (String, String) {
    fn from(edge: Edge) -> Self {
        (edge.source, edge.target)
    }
}

/// The four Coffman conditions as evaluated for one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(rename = "Mutual Exclusion")]
    pub mutual_exclusion: bool,
    #[serde(rename = "Hold and Wait")]
    pub hold_and_wait: bool,
    #[serde(rename = "No Preemption")]
    pub no_preemption: bool,
    #[serde(rename = "Circular Wait")]
    pub circular_wait: bool,
}

impl Conditions {
    /// True when all four conditions hold at once.
    ///
    /// Reported for inspection only; the verdict is decided by the cycle.
    pub fn all_hold(&self) -> bool {
        self.mutual_exclusion && self.hold_and_wait && self.no_preemption && self.circular_wait
    }
}

/// Full result of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub deadlock_detected: bool,
    /// First cycle found, empty when the graph is acyclic.
    pub cycle: Vec<CycleEdge>,
    pub conditions: Conditions,
}

/// Holding and waiting maps derived from edge prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Resource -> processes holding it, in edge order.
    holding: HashMap<String, Vec<String>>,
    /// Process -> resources it waits on, in edge order.
    waiting: HashMap<String, Vec<String>>,
}

impl Classification {
    pub fn holders(&self, resource: &str) -> &[String] {
        self.holding.get(resource).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn waiting_on(&self, process: &str) -> &[String] {
        self.waiting.get(process).map(Vec::as_slice).unwrap_or_default()
    }

    /// Some resource is recorded as held by more than one distinct process.
    pub fn mutual_exclusion(&self) -> bool {
        self.holding
            .values()
            .any(|holders| holders.iter().any(|h| h != &holders[0]))
    }

    /// Some process holds a resource while waiting on another.
    pub fn hold_and_wait(&self) -> bool {
        let holders: HashSet<&str> = self
            .holding
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        self.waiting
            .keys()
            .any(|process| holders.contains(process.as_str()))
    }

    /// Evaluates the first three conditions. Circular wait is left unset
    /// because it needs the graph.
    pub fn conditions(&self) -> Conditions {
        let hold_and_wait = self.hold_and_wait();
        Conditions {
            mutual_exclusion: self.mutual_exclusion(),
            hold_and_wait,
            // No preemption events exist in the input, so a process that
            // holds while waiting is taken to keep what it holds.
            no_preemption: hold_and_wait,
            circular_wait: false,
        }
    }
}

// ============================================================================
// ANALYZER
// ============================================================================

/// Stateless deadlock analyzer.
///
/// Every call builds its own graph and maps; an `Analyzer` can be shared
/// across threads by reference.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
    metrics: Option<AnalyzerMetrics>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub(crate) fn with_parts(config: AnalyzerConfig, metrics: Option<AnalyzerMetrics>) -> Self {
        Self { config, metrics }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&AnalyzerMetrics> {
        self.metrics.as_ref()
    }

    /// Builds the holding and waiting maps for `edges`.
    pub fn classify(&self, edges: &[Edge]) -> Classification {
        let mut classification = Classification::default();

        for edge in edges {
            match self.config.edge_kind(edge) {
                EdgeKind::Request => classification
                    .waiting
                    .entry(edge.source.clone())
                    .or_default()
                    .push(edge.target.clone()),
                EdgeKind::Allocation => classification
                    .holding
                    .entry(edge.source.clone())
                    .or_default()
                    .push(edge.target.clone()),
                EdgeKind::Unclassified => {}
            }
        }

        classification
    }

    /// Analyzes one allocation snapshot.
    ///
    /// A cycle alone decides the verdict: when one exists the result reports
    /// a deadlock whatever the other three conditions evaluated to, and when
    /// none exists it reports no deadlock.
    pub fn analyze(&self, edges: &[Edge]) -> Analysis {
        let started = Instant::now();

        let graph = AllocationGraph::from_edges(
            edges
                .iter()
                .map(|edge| (edge.source.as_str(), edge.target.as_str())),
        );
        let mut conditions = self.classify(edges).conditions();

        tracing::debug!(
            edges = edges.len(),
            nodes = graph.node_count(),
            mutual_exclusion = conditions.mutual_exclusion,
            hold_and_wait = conditions.hold_and_wait,
            "Evaluated allocation conditions"
        );

        let analysis = match graph.find_cycle() {
            Some(cycle) => {
                conditions.circular_wait = true;
                Analysis {
                    deadlock_detected: true,
                    cycle,
                    conditions,
                }
            }
            None => Analysis {
                deadlock_detected: false,
                cycle: Vec::new(),
                conditions,
            },
        };

        if analysis.deadlock_detected {
            metrics::trace_deadlock_detected(edges.len(), &analysis.cycle);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_analysis(edges.len(), &analysis, started.elapsed());
        }

        analysis
    }

    /// Validates `edges` against the configured limits, then analyzes them.
    pub fn analyze_checked(&self, edges: &[Edge]) -> Result<Analysis, InputFormatError> {
        self.validate(edges).map_err(|e| self.reject(e))?;
        Ok(self.analyze(edges))
    }

    /// Checks the edge count bound and that every label is non-empty.
    pub fn validate(&self, edges: &[Edge]) -> Result<(), InputFormatError> {
        if edges.len() > self.config.max_edges {
            return Err(InputFormatError::TooManyEdges {
                count: edges.len(),
                limit: self.config.max_edges,
            });
        }

        match edges
            .iter()
            .position(|edge| edge.source.is_empty() || edge.target.is_empty())
        {
            Some(index) => Err(InputFormatError::EmptyLabel { index }),
            None => Ok(()),
        }
    }

    /// Logs and counts a rejected payload, handing the error back.
    pub(crate) fn reject(&self, err: InputFormatError) -> InputFormatError {
        metrics::trace_input_rejected(&err);
        if let Some(metrics) = &self.metrics {
            metrics.inc_input_errors();
        }
        err
    }
}

/// Analyzes `edges` with the default configuration.
pub fn analyze(edges: &[Edge]) -> Analysis {
    Analyzer::default().analyze(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs.iter().map(|&pair| Edge::from(pair)).collect()
    }

    #[test]
    fn test_role_of_uses_prefix() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.role_of("P1"), NodeRole::Process);
        assert_eq!(config.role_of("R12"), NodeRole::Resource);
        assert_eq!(config.role_of("X1"), NodeRole::Other);
        assert_eq!(config.role_of("p1"), NodeRole::Other);
    }

    #[test]
    fn test_edge_kind() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.edge_kind(&Edge::new("P1", "R1")), EdgeKind::Request);
        assert_eq!(config.edge_kind(&Edge::new("R1", "P1")), EdgeKind::Allocation);
        assert_eq!(config.edge_kind(&Edge::new("P1", "P2")), EdgeKind::Unclassified);
        assert_eq!(config.edge_kind(&Edge::new("Q1", "R1")), EdgeKind::Unclassified);
    }

    #[test]
    fn test_classify_builds_maps_in_edge_order() {
        let analyzer = Analyzer::default();
        let classification =
            analyzer.classify(&edges(&[("P1", "R1"), ("P1", "R2"), ("R1", "P2"), ("R1", "P3")]));

        assert_eq!(classification.waiting_on("P1"), ["R1", "R2"]);
        assert_eq!(classification.holders("R1"), ["P2", "P3"]);
        assert!(classification.holders("R2").is_empty());
        assert!(classification.waiting_on("P2").is_empty());
    }

    #[test]
    fn test_mutual_exclusion_needs_distinct_holders() {
        let analyzer = Analyzer::default();
        assert!(analyzer
            .classify(&edges(&[("R1", "P1"), ("R1", "P2")]))
            .mutual_exclusion());
        assert!(!analyzer
            .classify(&edges(&[("R1", "P1"), ("R1", "P1")]))
            .mutual_exclusion());
        assert!(!analyzer
            .classify(&edges(&[("R1", "P1"), ("R2", "P1")]))
            .mutual_exclusion());
    }

    #[test]
    fn test_hold_and_wait_matches_holders_against_waiters() {
        let analyzer = Analyzer::default();

        let conditions = analyzer
            .classify(&edges(&[("R1", "P1"), ("P1", "R2")]))
            .conditions();
        assert!(conditions.hold_and_wait);
        assert!(conditions.no_preemption);

        let conditions = analyzer
            .classify(&edges(&[("R1", "P1"), ("P2", "R2")]))
            .conditions();
        assert!(!conditions.hold_and_wait);
        assert!(!conditions.no_preemption);
    }

    #[test]
    fn test_cycle_decides_verdict_over_conditions() {
        let analysis = analyze(&edges(&[("P1", "R1"), ("R1", "P1")]));

        assert!(analysis.deadlock_detected);
        assert!(analysis.conditions.circular_wait);
        assert!(!analysis.conditions.mutual_exclusion);
        assert!(!analysis.conditions.all_hold());
        assert_eq!(analysis.cycle.len(), 2);
    }

    #[test]
    fn test_no_cycle_means_no_deadlock() {
        let analysis = analyze(&edges(&[("R1", "P1"), ("P1", "R2"), ("R1", "P2")]));

        assert!(!analysis.deadlock_detected);
        assert!(analysis.cycle.is_empty());
        assert!(analysis.conditions.mutual_exclusion);
        assert!(analysis.conditions.hold_and_wait);
        assert!(!analysis.conditions.circular_wait);
    }

    #[test]
    fn test_unprefixed_labels_only_affect_cycle() {
        let analysis = analyze(&edges(&[("A", "B"), ("B", "A")]));

        assert!(analysis.deadlock_detected);
        assert_eq!(
            analysis.conditions,
            Conditions {
                circular_wait: true,
                ..Conditions::default()
            }
        );
    }

    #[test]
    fn test_custom_prefixes() {
        let analyzer = Analyzer::new(AnalyzerConfig {
            process_prefix: 'T',
            resource_prefix: 'L',
            ..AnalyzerConfig::default()
        });
        let classification = analyzer.classify(&edges(&[("L1", "T1"), ("L1", "T2")]));
        assert!(classification.mutual_exclusion());
    }

    #[test]
    fn test_validate_rejects_oversize_and_empty_labels() {
        let analyzer = Analyzer::new(AnalyzerConfig {
            max_edges: 1,
            ..AnalyzerConfig::default()
        });

        assert_eq!(
            analyzer.analyze_checked(&edges(&[("P1", "R1"), ("R1", "P1")])),
            Err(InputFormatError::TooManyEdges { count: 2, limit: 1 })
        );
        assert_eq!(
            analyzer.analyze_checked(&edges(&[("P1", "")])),
            Err(InputFormatError::EmptyLabel { index: 0 })
        );
        assert!(analyzer.analyze_checked(&edges(&[("P1", "R1")])).is_ok());
    }

    #[test]
    fn test_conditions_serialize_with_display_names() {
        let json = serde_json::to_value(Conditions {
            mutual_exclusion: true,
            ..Conditions::default()
        })
        .unwrap();

        assert_eq!(json["Mutual Exclusion"], true);
        assert_eq!(json["Hold and Wait"], false);
        assert_eq!(json["No Preemption"], false);
        assert_eq!(json["Circular Wait"], false);
    }
}
