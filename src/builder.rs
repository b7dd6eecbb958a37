use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::metrics::AnalyzerMetrics;

/// Error returned when a builder holds an unusable configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_edges must be greater than zero")]
    ZeroEdgeLimit,
    #[error("Process and resource prefixes must differ (both are '{0}')")]
    AmbiguousPrefixes(char),
}

/// Builder for `Analyzer`.
///
/// Provides a fluent API for configuring and creating an `Analyzer`.
#[derive(Debug, Default)]
pub struct AnalyzerBuilder {
    config: AnalyzerConfig,
    metrics: Option<AnalyzerMetrics>,
}

impl AnalyzerBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of edges accepted from a single payload.
    pub fn max_edges(mut self, max_edges: usize) -> Self {
        self.config.max_edges = max_edges;
        self
    }

    /// Sets the label prefixes that mark processes and resources.
    pub fn prefixes(mut self, process: char, resource: char) -> Self {
        self.config.process_prefix = process;
        self.config.resource_prefix = resource;
        self
    }

    /// Shares a metrics handle with the analyzer.
    pub fn with_metrics(mut self, metrics: AnalyzerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Modifies the configuration via a closure.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut AnalyzerConfig),
    {
        f(&mut self.config);
        self
    }

    /// Builds the `Analyzer`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the edge limit is zero or both prefixes are
    /// the same character.
    pub fn build(self) -> Result<Analyzer, ConfigError> {
        if self.config.max_edges == 0 {
            return Err(ConfigError::ZeroEdgeLimit);
        }
        if self.config.process_prefix == self.config.resource_prefix {
            return Err(ConfigError::AmbiguousPrefixes(self.config.process_prefix));
        }

        Ok(Analyzer::with_parts(self.config, self.metrics))
    }
}
