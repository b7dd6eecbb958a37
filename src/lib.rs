//! Resource-Allocation Deadlock Analysis
//!
//! This crate analyzes a snapshot of request and allocation edges between
//! processes and resources, evaluates the four Coffman conditions and reports
//! a deadlock when the allocation graph contains a circular wait. A Banker's
//! safety check is provided for avoidance-style queries.

pub mod analyzer;
pub mod api;
pub mod bankers;
mod builder;
pub mod graph;
pub mod metrics;

pub use analyzer::{analyze, Analysis, Analyzer, AnalyzerConfig, Conditions, Edge, InputFormatError};
pub use builder::{AnalyzerBuilder, ConfigError};
pub use graph::{AllocationGraph, CycleEdge, Orientation};
pub use metrics::AnalyzerMetrics;
