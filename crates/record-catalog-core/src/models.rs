//! Core data types that flow between the registries, the orchestrator, and
//! the search backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw request parameters, keyed by name.
///
/// Build with [`collect_params`] so repeated names keep their first value.
pub type RawParams = BTreeMap<String, String>;

/// Collect query-string pairs into [`RawParams`]. The first occurrence of a
/// repeated name wins.
pub fn collect_params<I, K, V>(pairs: I) -> RawParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut params = RawParams::new();
    for (k, v) in pairs {
        params.entry(k.into()).or_insert_with(|| v.into());
    }
    params
}

/// A resolved query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(u64),
    Text(String),
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// The validated, resolved parameters of one search request.
///
/// Keys are query field names; every key has a definition in the active
/// record type's registry. Ordering is by name, so two states holding the
/// same pairs are equal regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryState(BTreeMap<String, ParamValue>);

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The record type id. Empty only for states not produced by the resolver.
    pub fn record_type(&self) -> &str {
        self.get(crate::fields::TYPE)
            .and_then(ParamValue::as_str)
            .unwrap_or_default()
    }

    pub fn start(&self) -> u64 {
        self.get(crate::fields::START)
            .and_then(ParamValue::as_number)
            .unwrap_or(0)
    }

    pub fn rows(&self) -> u64 {
        self.get(crate::fields::ROWS)
            .and_then(ParamValue::as_number)
            .unwrap_or(0)
    }

    pub fn sort(&self) -> Option<&str> {
        self.get(crate::fields::SORT).and_then(ParamValue::as_str)
    }

    /// A copy with `name` set to `value`.
    pub fn with(&self, name: &str, value: impl Into<ParamValue>) -> Self {
        let mut next = self.clone();
        next.insert(name, value);
        next
    }

    /// A copy with `name` removed.
    pub fn without(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.remove(name);
        next
    }

    /// A copy with every pair of `params` laid over this state.
    pub fn merged(&self, params: &BTreeMap<String, ParamValue>) -> Self {
        let mut next = self.clone();
        for (name, value) in params {
            next.insert(name.clone(), value.clone());
        }
        next
    }
}

impl FromIterator<(String, ParamValue)> for QueryState {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A hydrated record as returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub source: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A backend filter clause. All clauses of a request are ANDed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// Exact match on a keyword field.
    Term { field: String, value: String },
    /// Free-text query over the given fields (all fields when empty). The
    /// query has already been sanitized.
    QueryString { query: String, fields: Vec<String> },
    /// Inclusive numeric range.
    Range {
        field: String,
        gte: Option<i64>,
        lte: Option<i64>,
    },
}

/// An aggregation requested alongside the hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregation {
    Terms { field: String, size: usize },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A resolved backend sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// One bucket of a raw aggregation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBucket {
    pub key: String,
    pub doc_count: u64,
}

impl RawBucket {
    pub fn new(key: impl Into<String>, doc_count: u64) -> Self {
        Self {
            key: key.into(),
            doc_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_params_first_wins() {
        let params = collect_params([("city", "Boston"), ("city", "Salem"), ("rows", "5")]);
        assert_eq!(params.get("city").map(String::as_str), Some("Boston"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_state_equality_ignores_insert_order() {
        let mut a = QueryState::new();
        a.insert("city", "Boston");
        a.insert("start", 20u64);
        let mut b = QueryState::new();
        b.insert("start", 20u64);
        b.insert("city", "Boston");
        assert_eq!(a, b);
    }

    #[test]
    fn test_state_with_and_without() {
        let mut state = QueryState::new();
        state.insert("city", "Boston");
        let next = state.with("start", 40u64);
        assert_eq!(next.start(), 40);
        assert_eq!(state.start(), 0);
        assert!(!next.without("city").contains("city"));
    }

    #[test]
    fn test_record_flattens_fields() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "id": "nypl/1",
            "source": "nypl",
            "city": "Boston"
        }))
        .unwrap();
        assert_eq!(record.fields["city"], "Boston");
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["id"], "nypl/1");
        assert_eq!(back["city"], "Boston");
    }
}
