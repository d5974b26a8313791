//! Source metadata shown alongside search results.

use serde::Serialize;

/// A contributing source of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub name: String,
    /// Source home page, if known.
    pub url: Option<String>,
    pub num_records: u64,
}

/// Read-only source lookups. Used for display only, never for filtering.
pub trait SourceDirectory: Send + Sync {
    /// Sources offering `record_type`, in declaration order.
    fn sources_for_type(&self, record_type: &str) -> Vec<SourceSummary>;

    fn find(&self, id: &str) -> Option<SourceSummary>;
}

/// A fixed source list with record counts per type.
#[derive(Debug, Clone, Default)]
pub struct StaticSources {
    entries: Vec<(String, SourceSummary)>,
}

impl StaticSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` holds `num_records` records of `record_type`.
    pub fn add(&mut self, record_type: impl Into<String>, source: SourceSummary) {
        self.entries.push((record_type.into(), source));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceDirectory for StaticSources {
    /// Only sources with at least one record of the type are listed.
    fn sources_for_type(&self, record_type: &str) -> Vec<SourceSummary> {
        self.entries
            .iter()
            .filter(|(t, s)| t == record_type && s.num_records > 0)
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn find(&self, id: &str) -> Option<SourceSummary> {
        self.entries
            .iter()
            .find(|(_, s)| s.id == id)
            .map(|(_, s)| s.clone())
    }
}
