//! Analysis configuration.

use crate::abst::Bounds;

/// Configuration shared by all analyses.
///
/// Use `AnalysisConfig::default()` for an unbounded integer domain and the
/// conventional `source` / `retval` names.
///
/// # Examples
///
/// ```
/// use dataflow_rs::abst::Bounds;
/// use dataflow_rs::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default().with_bounds(Bounds::for_loops());
/// assert_eq!(config.bounds.max(), 200);
/// assert_eq!(config.taint_source, "source");
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AnalysisConfig {
    /// Finite window of the integer domain (default: unbounded)
    pub bounds: Bounds,
    /// Name of the value that introduces taint (default: "source")
    pub taint_source: String,
    /// Name of the return slot, hidden from interval reports (default: "retval")
    pub return_slot: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::unbounded(),
            taint_source: "source".to_string(),
            return_slot: "retval".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_taint_source(mut self, name: impl Into<String>) -> Self {
        self.taint_source = name.into();
        self
    }

    pub fn with_return_slot(mut self, name: impl Into<String>) -> Self {
        self.return_slot = name.into();
        self
    }
}
