//! Error taxonomy for the search pipeline.
//!
//! None of these are recovered inside the pipeline. They bubble up to the
//! request boundary, which decides how each one is rendered.

/// Errors produced while resolving, running, or shaping a search.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The requested (or defaulted) record type has no registry.
    ///
    /// Callers render this as "not found", not as a fault.
    #[error("unknown record type: {0}")]
    UnknownType(String),

    /// A registry or configuration bug, such as a sort id that does not
    /// resolve to a field's sort option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The search backend failed or returned malformed data.
    #[error("search backend error: {0}")]
    Backend(String),
}

/// Result alias used throughout the core crate.
pub type Result<T, E = SearchError> = std::result::Result<T, E>;
