//! Search backend abstraction.
//!
//! The orchestrator issues at most one [`SearchBackend::search`] call per
//! request. Implementations are `Send + Sync` and shared across concurrent
//! requests; retries and timeouts belong to the implementation.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Aggregation, Filter, RawBucket, Record, SortSpec};

/// One search against the index of a record type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendRequest {
    pub record_type: String,
    /// ANDed filter clauses, in registry order.
    pub filters: Vec<Filter>,
    pub from: u64,
    pub size: u64,
    /// Named aggregations, in facet registry order.
    pub aggregations: Vec<(String, Aggregation)>,
    /// `None` means the backend's relevance order.
    pub sort: Option<SortSpec>,
    /// Return full records rather than bare ids.
    pub hydrate: bool,
}

/// Raw backend result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub hits: Vec<Record>,
    pub total: u64,
    /// Buckets keyed by aggregation name.
    pub aggregations: HashMap<String, Vec<RawBucket>>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one filtered, paginated, aggregated search.
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse>;

    /// Number of records of `record_type` matching every filter.
    async fn count(&self, record_type: &str, filters: &[Filter]) -> Result<u64>;
}
