//! The search orchestrator.
//!
//! [`SearchOrchestrator::run_search`] drives one request through the
//! pipeline:
//!
//! ```text
//! Start → TypeResolved → ValuesResolved ─┬─▶ Redirect
//!                                        └─▶ BackendQueried → Shaped
//! ```
//!
//! Any step may fail with a [`SearchError`]. The redirect check happens
//! before any backend call: a request whose URL is not canonical never
//! reaches the backend.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{BackendRequest, SearchBackend};
use crate::canonical::UrlCanonicalizer;
use crate::catalog::{Catalog, RecordType};
use crate::error::{Result, SearchError};
use crate::fields::TYPE;
use crate::locale::Locale;
use crate::models::{Aggregation, Filter, QueryState, RawParams};
use crate::params::classify;
use crate::query::sanitize_query_string;
use crate::shape::{shape_results, ResultViewModel, ShapeContext};
use crate::sources::SourceDirectory;

/// One inbound search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Record type from the path, if any.
    pub record_type: Option<String>,
    pub params: RawParams,
    /// The absolute URL the request arrived on, compared against the
    /// canonical URL.
    pub request_url: String,
    pub locale: Locale,
}

/// Exactly one of a redirect or a result page.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Redirect(String),
    Results(Box<ResultViewModel>),
}

/// A state together with the backend clauses it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub state: QueryState,
    /// Filter clauses in registry order.
    pub filters: Vec<Filter>,
    /// Every facet's aggregation, displayed or not.
    pub aggregations: Vec<(String, Aggregation)>,
}

/// Resolve raw parameters against a type's registries.
///
/// Each definition's value is extracted, falling back to its default; every
/// present value with a filter clause contributes one clause.
pub fn resolve_query(record_type: &RecordType, params: &RawParams) -> ResolvedQuery {
    let mut state = QueryState::new();
    let mut filters = Vec::new();

    for def in record_type.queries().iter() {
        let value = def
            .extract_value(params)
            .or_else(|| def.default_value(params));
        if let Some(value) = value {
            if let Some(clause) = def.filter_clause(&value, sanitize_query_string) {
                filters.push(clause);
            }
            state.insert(def.name(), value);
        }
    }

    let aggregations = record_type
        .facets()
        .iter()
        .map(|facet| (facet.name().to_string(), facet.aggregation()))
        .collect();

    ResolvedQuery {
        state,
        filters,
        aggregations,
    }
}

/// Coordinates registries, canonical URLs, the backend and the shaper.
/// Shared read-only across requests.
#[derive(Clone)]
pub struct SearchOrchestrator {
    catalog: Arc<Catalog>,
    backend: Arc<dyn SearchBackend>,
    urls: UrlCanonicalizer,
    sources: Arc<dyn SourceDirectory>,
}

impl SearchOrchestrator {
    pub fn new(
        catalog: Arc<Catalog>,
        backend: Arc<dyn SearchBackend>,
        urls: UrlCanonicalizer,
        sources: Arc<dyn SourceDirectory>,
    ) -> Self {
        Self {
            catalog,
            backend,
            urls,
            sources,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn urls(&self) -> &UrlCanonicalizer {
        &self.urls
    }

    pub fn sources(&self) -> &dyn SourceDirectory {
        self.sources.as_ref()
    }

    /// Run one search: a redirect to the canonical URL, or a result page.
    pub async fn run_search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        let type_id = request
            .record_type
            .as_deref()
            .or_else(|| request.params.get(TYPE).map(String::as_str));
        let record_type = self.catalog.resolve_type(type_id)?;
        debug!(record_type = record_type.id(), "resolved record type");

        let resolved = resolve_query(record_type, &request.params);

        let expected = self
            .urls
            .canonical_url(&request.locale, record_type, &resolved.state, true);
        if expected != request.request_url {
            info!(from = %request.request_url, to = %expected, "redirecting to canonical url");
            return Ok(SearchOutcome::Redirect(expected));
        }

        let sort = match resolved.state.sort() {
            Some(id) => Some(record_type.resolve_sort(id)?),
            None => None,
        };

        let backend_request = BackendRequest {
            record_type: record_type.id().to_string(),
            filters: resolved.filters,
            from: resolved.state.start(),
            size: resolved.state.rows(),
            aggregations: resolved.aggregations,
            sort,
            hydrate: true,
        };
        let response = self.backend.search(&backend_request).await.map_err(|e| {
            warn!(record_type = record_type.id(), error = %e, "search backend failed");
            SearchError::Backend(format!("{:#}", e))
        })?;
        debug!(
            record_type = record_type.id(),
            total = response.total,
            hits = response.hits.len(),
            "backend returned"
        );

        let classes = classify(record_type, &resolved.state);
        let ctx = ShapeContext {
            record_type,
            locale: &request.locale,
            urls: &self.urls,
            sources: self.sources.sources_for_type(record_type.id()),
        };
        let view = shape_results(&ctx, &resolved.state, &classes, response)?;
        Ok(SearchOutcome::Results(Box::new(view)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::backend::BackendResponse;
    use crate::canonical::parse_query;
    use crate::catalog::{RecordTypeOptions, SortChoice};
    use crate::fields::{RangeField, TermField, TermsFacet, TextField};
    use crate::models::{collect_params, ParamValue, Record, SortOrder};
    use crate::sources::{SourceSummary, StaticSources};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    const BASE: &str = "http://example.org";

    fn catalog() -> Catalog {
        let mut options = RecordTypeOptions::new("location", "Locations");
        options.default_rows = 20;
        options.max_rows = 100;
        let mut sources = BTreeMap::new();
        sources.insert("nypl".to_string(), "New York Public Library".to_string());
        options.sources = sources;
        options.sorts = vec![SortChoice::new("city.asc", "City")];
        let mut rt = RecordType::new(options).unwrap();
        rt.add_query(Box::new(
            TermField::new("city", "city")
                .primary(true)
                .sort("asc", SortOrder::Asc),
        ))
        .unwrap();
        rt.add_query(Box::new(TermField::new("country", "country")))
            .unwrap();
        rt.add_query(Box::new(TextField::new("filter", vec![]))).unwrap();
        rt.add_query(Box::new(RangeField::new("date", "year")))
            .unwrap();
        rt.add_facet(Box::new(TermsFacet::new("country", "country", 50)))
            .unwrap();

        let mut catalog = Catalog::new();
        catalog.register(rt).unwrap();
        catalog
            .register(RecordType::new(RecordTypeOptions::new("person", "People")).unwrap())
            .unwrap();
        catalog
    }

    fn record(id: &str, city: &str, country: &str) -> Record {
        serde_json::from_value(json!({
            "id": id,
            "source": "nypl",
            "city": city,
            "country": country,
            "year": 1820
        }))
        .unwrap()
    }

    fn orchestrator_with(catalog: Catalog, backend: Arc<dyn SearchBackend>) -> SearchOrchestrator {
        let mut sources = StaticSources::new();
        sources.add(
            "location",
            SourceSummary {
                id: "nypl".into(),
                name: "New York Public Library".into(),
                url: None,
                num_records: 3,
            },
        );
        SearchOrchestrator::new(
            Arc::new(catalog),
            backend,
            UrlCanonicalizer::new(BASE, "en"),
            Arc::new(sources),
        )
    }

    fn memory() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend
            .extend(
                "location",
                vec![
                    record("1", "Boston", "US"),
                    record("2", "Boston", "CA"),
                    record("3", "Salem", "US"),
                ],
            )
            .unwrap();
        Arc::new(backend)
    }

    fn request(path_type: Option<&str>, path_and_query: &str) -> SearchRequest {
        let query = path_and_query.split_once('?').map_or("", |(_, q)| q);
        SearchRequest {
            record_type: path_type.map(String::from),
            params: parse_query(query),
            request_url: format!("{}{}", BASE, path_and_query),
            locale: Locale::new("en"),
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl SearchBackend for FailingBackend {
        async fn search(&self, _request: &BackendRequest) -> anyhow::Result<BackendResponse> {
            anyhow::bail!("connection refused")
        }

        async fn count(&self, _record_type: &str, _filters: &[Filter]) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_resolve_query_applies_defaults_and_clauses() {
        let catalog = catalog();
        let rt = catalog.registry_for("location").unwrap();
        let params = collect_params([("city", " Boston "), ("rows", "abc"), ("filter", "harbor")]);
        let resolved = resolve_query(rt, &params);
        assert_eq!(resolved.state.record_type(), "location");
        assert_eq!(resolved.state.start(), 0);
        assert_eq!(resolved.state.rows(), 20);
        assert_eq!(resolved.state.get("city"), Some(&ParamValue::text("Boston")));
        assert_eq!(resolved.filters.len(), 2);
        assert_eq!(resolved.aggregations.len(), 1);
    }

    #[test]
    fn test_canonical_round_trip_is_idempotent() {
        let catalog = catalog();
        let rt = catalog.registry_for("location").unwrap();
        let urls = UrlCanonicalizer::new(BASE, "en");
        let locale = Locale::new("en");
        let params = collect_params([
            ("date", " 1850 - 1800 "),
            ("date", "1800-1850"),
            ("filter", "  old   harbor "),
            ("city", "São Paulo"),
            ("start", "40"),
            ("rows", "1000"),
            ("sort", "city.asc"),
            ("bogus", "x"),
        ]);
        let first = urls.canonical_url(&locale, rt, &resolve_query(rt, &params).state, true);
        let query = first.split_once('?').map_or("", |(_, q)| q);
        let second = urls.canonical_url(
            &locale,
            rt,
            &resolve_query(rt, &parse_query(query)).state,
            true,
        );
        assert_eq!(first, second);
        assert!(!first.contains("bogus"));
    }

    #[tokio::test]
    async fn test_redirect_is_exact_and_skips_backend() {
        let backend = memory();
        let orch = orchestrator_with(catalog(), backend.clone());
        let outcome = orch
            .run_search(&request(
                Some("location"),
                "/location/search?country=US&city=%20Boston&start=0&junk=1",
            ))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Redirect(format!("{}/location/search?city=Boston&country=US", BASE))
        );
        assert_eq!(backend.search_count(), 0);
    }

    #[tokio::test]
    async fn test_default_type_redirects_to_typed_path() {
        let backend = memory();
        let orch = orchestrator_with(catalog(), backend.clone());
        let outcome = orch.run_search(&request(None, "/search")).await.unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Redirect(format!("{}/location/search", BASE))
        );

        let outcome = orch
            .run_search(&request(None, "/search?type=person"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SearchOutcome::Redirect(format!("{}/person/search", BASE))
        );
        assert_eq!(backend.search_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_type_is_not_found() {
        let orch = orchestrator_with(catalog(), memory());
        let err = orch
            .run_search(&request(Some("ship"), "/ship/search"))
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::UnknownType("ship".into()));
    }

    #[tokio::test]
    async fn test_canonical_request_returns_results() {
        let backend = memory();
        let orch = orchestrator_with(catalog(), backend.clone());
        let outcome = orch
            .run_search(&request(Some("location"), "/location/search?city=Boston"))
            .await
            .unwrap();
        let view = match outcome {
            SearchOutcome::Results(view) => view,
            other => panic!("expected results, got {:?}", other),
        };
        assert_eq!(backend.search_count(), 1);
        assert_eq!(view.title, "Boston");
        assert!(view.breadcrumbs.is_empty());
        assert_eq!(view.total, 2);
        assert_eq!(view.facets.len(), 1);
        assert_eq!(view.sources.len(), 1);
        assert_eq!(view.sorts.len(), 1);
        assert!(!view.sorts[0].selected);
    }

    #[tokio::test]
    async fn test_start_at_u64_max_is_shaped() {
        let backend = memory();
        let orch = orchestrator_with(catalog(), backend.clone());
        let outcome = orch
            .run_search(&request(
                Some("location"),
                "/location/search?start=18446744073709551615",
            ))
            .await
            .unwrap();
        let view = match outcome {
            SearchOutcome::Results(view) => view,
            other => panic!("expected results, got {:?}", other),
        };
        assert_eq!(backend.search_count(), 1);
        assert!(view.records.is_empty());
        assert_eq!(view.total, 3);
        assert_eq!(view.start, u64::MAX);
        assert_eq!(view.end, u64::MAX);
        assert_eq!(view.next, None);
    }

    #[tokio::test]
    async fn test_location_boston_scenario_hides_single_bucket_facet() {
        let backend = InMemoryBackend::new();
        backend
            .extend(
                "location",
                (0..40).map(|i| record(&i.to_string(), "Boston", "US")),
            )
            .unwrap();
        let backend = Arc::new(backend);
        let orch = orchestrator_with(catalog(), backend);
        let outcome = orch
            .run_search(&request(Some("location"), "/location/search?city=Boston"))
            .await
            .unwrap();
        let SearchOutcome::Results(view) = outcome else {
            panic!("expected results");
        };
        assert_eq!(view.title, "Boston");
        assert!(view.breadcrumbs.is_empty());
        assert!(view.facets.is_empty());
        assert_eq!(view.records.len(), 20);
        assert_eq!(
            view.next.as_deref(),
            Some("http://example.org/location/search?city=Boston&start=20")
        );
    }

    #[tokio::test]
    async fn test_sort_is_applied() {
        let orch = orchestrator_with(catalog(), memory());
        let outcome = orch
            .run_search(&request(Some("location"), "/location/search?sort=city.asc"))
            .await
            .unwrap();
        let SearchOutcome::Results(view) = outcome else {
            panic!("expected results");
        };
        let cities: Vec<_> = view
            .records
            .iter()
            .map(|r| r.fields["city"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(cities, vec!["Boston", "Boston", "Salem"]);
        assert!(view.sorts[0].selected);
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped() {
        let orch = orchestrator_with(catalog(), Arc::new(FailingBackend));
        let err = orch
            .run_search(&request(Some("location"), "/location/search"))
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::Backend("connection refused".into()));
    }

    #[tokio::test]
    async fn test_source_param_filters_and_titles() {
        let orch = orchestrator_with(catalog(), memory());
        let outcome = orch
            .run_search(&request(Some("location"), "/location/search?source=nypl"))
            .await
            .unwrap();
        let SearchOutcome::Results(view) = outcome else {
            panic!("expected results");
        };
        assert_eq!(view.title, "New York Public Library");
        assert_eq!(view.total, 3);
    }
}
