//! In-memory [`SearchBackend`] for tests and small fixture catalogs.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Filters are
//! evaluated by scanning every record of the type; relevance order is
//! insertion order. Terms aggregations are computed over all matching
//! records, ordered by count descending, then key.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{BackendRequest, BackendResponse, SearchBackend};
use crate::models::{Aggregation, Filter, RawBucket, Record, SortOrder};

/// In-memory backend. Cheap to build; counts the searches it serves.
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, Vec<Record>>>,
    searches: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, record_type: &str, record: Record) -> Result<()> {
        self.extend(record_type, std::iter::once(record))
    }

    pub fn extend(&self, record_type: &str, records: impl IntoIterator<Item = Record>) -> Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("record store lock poisoned"))?;
        stored
            .entry(record_type.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    /// Number of [`SearchBackend::search`] calls served so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(AtomicOrdering::SeqCst)
    }

    fn matching(&self, record_type: &str, filters: &[Filter]) -> Result<Vec<Record>> {
        let stored = self
            .records
            .read()
            .map_err(|_| anyhow!("record store lock poisoned"))?;
        Ok(stored
            .get(record_type)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filters.iter().all(|f| matches_filter(r, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Field values of a record as strings. Arrays yield every element.
fn field_values(record: &Record, field: &str) -> Vec<String> {
    let field = field.strip_suffix(".keyword").unwrap_or(field);
    match field {
        "id" => vec![record.id.clone()],
        "source" => vec![record.source.clone()],
        _ => match record.fields.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(value) => scalar_text(value).into_iter().collect(),
            None => Vec::new(),
        },
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Undo query-string escaping and split into lowercase terms.
fn query_terms(query: &str) -> Vec<String> {
    let mut unescaped = String::with_capacity(query.len());
    let mut chars = query.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(ch);
        }
    }
    unescaped
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

fn matches_filter(record: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Term { field, value } => field_values(record, field).iter().any(|v| v == value),
        Filter::QueryString { query, fields } => {
            let haystack: Vec<String> = if fields.is_empty() {
                record
                    .fields
                    .keys()
                    .flat_map(|f| field_values(record, f))
                    .map(|v| v.to_lowercase())
                    .collect()
            } else {
                fields
                    .iter()
                    .flat_map(|f| field_values(record, f))
                    .map(|v| v.to_lowercase())
                    .collect()
            };
            query_terms(query)
                .iter()
                .all(|term| haystack.iter().any(|v| v.contains(term.as_str())))
        }
        Filter::Range { field, gte, lte } => field_values(record, field)
            .iter()
            .filter_map(|v| v.parse::<i64>().ok())
            .any(|n| gte.map_or(true, |low| n >= low) && lte.map_or(true, |high| n <= high)),
    }
}

fn terms_buckets(records: &[Record], field: &str, size: usize) -> Vec<RawBucket> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let mut values = field_values(record, field);
        values.sort();
        values.dedup();
        for value in values {
            *counts.entry(value).or_default() += 1;
        }
    }
    let mut buckets: Vec<RawBucket> = counts
        .into_iter()
        .map(|(key, doc_count)| RawBucket { key, doc_count })
        .collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(size);
    buckets
}

/// Numbers compare numerically; records missing the field sort last.
fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    let first = |r: &Record| field_values(r, field).into_iter().next();
    match (first(a), first(b)) {
        (Some(x), Some(y)) => match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => x.to_lowercase().cmp(&y.to_lowercase()),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse> {
        self.searches.fetch_add(1, AtomicOrdering::SeqCst);
        let mut matched = self.matching(&request.record_type, &request.filters)?;

        let aggregations = request
            .aggregations
            .iter()
            .map(|(name, agg)| match agg {
                Aggregation::Terms { field, size } => {
                    (name.clone(), terms_buckets(&matched, field, *size))
                }
            })
            .collect();

        if let Some(sort) = &request.sort {
            matched.sort_by(|a, b| {
                let ord = compare_field(a, b, &sort.field);
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(request.from as usize)
            .take(request.size as usize)
            .map(|record| {
                if request.hydrate {
                    record
                } else {
                    Record {
                        fields: serde_json::Map::new(),
                        ..record
                    }
                }
            })
            .collect();

        Ok(BackendResponse {
            hits,
            total,
            aggregations,
        })
    }

    async fn count(&self, record_type: &str, filters: &[Filter]) -> Result<u64> {
        Ok(self.matching(record_type, filters)?.len() as u64)
    }
}
