//! Elasticsearch search backend.
//!
//! Each record type lives in its own index, `{index_prefix}{type}`. A
//! [`BackendRequest`] is translated to the `_search` query DSL:
//!
//! ```json
//! {
//!   "query": { "bool": { "filter": [ ... ] } },
//!   "from": 0, "size": 20,
//!   "aggs": { "country": { "terms": { "field": "country", "size": 50 } } },
//!   "sort": [ { "city": { "order": "asc" } } ],
//!   "_source": true,
//!   "track_total_hits": true
//! }
//! ```
//!
//! Hits are hydrated from `_source`. Non-2xx responses and malformed bodies
//! are errors; there are no retries at this layer.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use record_catalog_core::backend::{BackendRequest, BackendResponse, SearchBackend};
use record_catalog_core::models::{Aggregation, Filter, RawBucket, Record};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::BackendConfig;

pub struct ElasticsearchBackend {
    client: reqwest::Client,
    url: String,
    index_prefix: String,
}

impl ElasticsearchBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            index_prefix: config.index_prefix.clone(),
        })
    }

    fn endpoint(&self, record_type: &str, action: &str) -> String {
        format!("{}/{}{}/{}", self.url, self.index_prefix, record_type, action)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Elasticsearch error {}: {}", status, body_text);
        }
        Ok(response.json().await?)
    }
}

fn filter_clause(filter: &Filter) -> Value {
    match filter {
        Filter::Term { field, value } => json!({ "term": { field: value } }),
        Filter::QueryString { query, fields } => {
            let mut clause = json!({ "query": query, "default_operator": "AND" });
            if !fields.is_empty() {
                clause["fields"] = json!(fields);
            }
            json!({ "query_string": clause })
        }
        Filter::Range { field, gte, lte } => {
            let mut bounds = Map::new();
            if let Some(gte) = gte {
                bounds.insert("gte".into(), json!(gte));
            }
            if let Some(lte) = lte {
                bounds.insert("lte".into(), json!(lte));
            }
            json!({ "range": { field: bounds } })
        }
    }
}

fn bool_query(filters: &[Filter]) -> Value {
    let clauses: Vec<Value> = filters.iter().map(filter_clause).collect();
    json!({ "bool": { "filter": clauses } })
}

/// The `_search` body for a request.
pub fn build_search_body(request: &BackendRequest) -> Value {
    let mut aggs = Map::new();
    for (name, agg) in &request.aggregations {
        let spec = match agg {
            Aggregation::Terms { field, size } => json!({ "terms": { "field": field, "size": size } }),
        };
        aggs.insert(name.clone(), spec);
    }

    let mut body = json!({
        "query": bool_query(&request.filters),
        "from": request.from,
        "size": request.size,
        "aggs": aggs,
        "_source": request.hydrate,
        "track_total_hits": true,
    });
    if let Some(sort) = &request.sort {
        body["sort"] = json!([{ sort.field.clone(): { "order": sort.order.as_str() } }]);
    }
    body
}

fn bucket_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_hit(hit: &Value, hydrate: bool) -> Result<Record> {
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Invalid Elasticsearch response: hit without _id"))?;
    let mut fields = match hit.get("_source") {
        Some(Value::Object(source)) => source.clone(),
        None if !hydrate => Map::new(),
        _ => bail!("Invalid Elasticsearch response: hit {} has no _source", id),
    };
    fields.remove("id");
    let source = match fields.remove("source") {
        Some(Value::String(s)) => s,
        _ => id.split('/').next().unwrap_or_default().to_string(),
    };
    Ok(Record {
        id: id.to_string(),
        source,
        fields,
    })
}

fn parse_bucket(bucket: &Value) -> Option<RawBucket> {
    let key = bucket_key(bucket.get("key")?)?;
    let doc_count = bucket.get("doc_count")?.as_u64()?;
    Some(RawBucket { key, doc_count })
}

/// Parse a `_search` response. `hits.total` may be a number (older servers)
/// or `{ "value": n }`. With `hydrate`, every hit must carry `_source`.
pub fn parse_search_response(body: &Value, hydrate: bool) -> Result<BackendResponse> {
    let hits = body
        .get("hits")
        .ok_or_else(|| anyhow!("Invalid Elasticsearch response: missing hits"))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Invalid Elasticsearch response: missing hits.total"))?;

    let records = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Elasticsearch response: missing hits.hits"))?
        .iter()
        .map(|hit| parse_hit(hit, hydrate))
        .collect::<Result<Vec<_>>>()?;

    let mut aggregations = HashMap::new();
    if let Some(aggs) = body.get("aggregations").and_then(Value::as_object) {
        for (name, agg) in aggs {
            let buckets = agg
                .get("buckets")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    anyhow!("Invalid Elasticsearch response: aggregation '{}' has no buckets", name)
                })?
                .iter()
                .map(|b| {
                    parse_bucket(b).ok_or_else(|| {
                        anyhow!("Invalid Elasticsearch response: malformed bucket in '{}'", name)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            aggregations.insert(name.clone(), buckets);
        }
    }

    Ok(BackendResponse {
        hits: records,
        total,
        aggregations,
    })
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse> {
        let url = self.endpoint(&request.record_type, "_search");
        let body = self.post(&url, &build_search_body(request)).await?;
        parse_search_response(&body, request.hydrate)
    }

    async fn count(&self, record_type: &str, filters: &[Filter]) -> Result<u64> {
        let url = self.endpoint(record_type, "_count");
        let body = self
            .post(&url, &json!({ "query": bool_query(filters) }))
            .await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("Invalid Elasticsearch response: missing count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_catalog_core::models::{SortOrder, SortSpec};

    fn request() -> BackendRequest {
        BackendRequest {
            record_type: "location".into(),
            filters: vec![
                Filter::Term {
                    field: "city".into(),
                    value: "Boston".into(),
                },
                Filter::Range {
                    field: "year".into(),
                    gte: Some(1800),
                    lte: None,
                },
                Filter::QueryString {
                    query: "harbor".into(),
                    fields: vec![],
                },
            ],
            from: 20,
            size: 20,
            aggregations: vec![(
                "country".into(),
                Aggregation::Terms {
                    field: "country".into(),
                    size: 50,
                },
            )],
            sort: Some(SortSpec {
                field: "city".into(),
                order: SortOrder::Desc,
            }),
            hydrate: true,
        }
    }

    #[test]
    fn test_build_search_body() {
        let body = build_search_body(&request());
        let filter = &body["query"]["bool"]["filter"];
        assert_eq!(filter[0], json!({ "term": { "city": "Boston" } }));
        assert_eq!(filter[1], json!({ "range": { "year": { "gte": 1800 } } }));
        assert_eq!(filter[2]["query_string"]["query"], "harbor");
        assert!(filter[2]["query_string"].get("fields").is_none());
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 20);
        assert_eq!(body["aggs"]["country"]["terms"]["size"], 50);
        assert_eq!(body["sort"], json!([{ "city": { "order": "desc" } }]));
        assert_eq!(body["_source"], true);
    }

    #[test]
    fn test_no_sort_uses_relevance() {
        let mut req = request();
        req.sort = None;
        assert!(build_search_body(&req).get("sort").is_none());
    }

    #[test]
    fn test_parse_search_response() {
        let body = json!({
            "hits": {
                "total": { "value": 45, "relation": "eq" },
                "hits": [
                    { "_id": "nypl/1", "_source": { "source": "nypl", "city": "Boston" } },
                    { "_id": "bl/7", "_source": { "city": "Salem" } }
                ]
            },
            "aggregations": {
                "country": { "buckets": [ { "key": "US", "doc_count": 40 }, { "key": 1820, "doc_count": 5 } ] }
            }
        });
        let resp = parse_search_response(&body, true).unwrap();
        assert_eq!(resp.total, 45);
        assert_eq!(resp.hits[0].source, "nypl");
        assert_eq!(resp.hits[0].fields["city"], "Boston");
        assert_eq!(resp.hits[1].source, "bl");
        assert_eq!(
            resp.aggregations["country"],
            vec![RawBucket::new("US", 40), RawBucket::new("1820", 5)]
        );
    }

    #[test]
    fn test_parse_legacy_total_and_errors() {
        let body = json!({ "hits": { "total": 3, "hits": [] } });
        assert_eq!(parse_search_response(&body, true).unwrap().total, 3);
        assert!(parse_search_response(&json!({ "error": "boom" }), true).is_err());
    }

    #[test]
    fn test_malformed_bucket_is_an_error() {
        let body = json!({
            "hits": { "total": 2, "hits": [] },
            "aggregations": {
                "country": { "buckets": [ { "key": "US", "doc_count": 1 }, { "key": "CA" } ] }
            }
        });
        let err = parse_search_response(&body, true).unwrap_err();
        assert!(err.to_string().contains("malformed bucket in 'country'"));
    }

    #[test]
    fn test_missing_source_only_allowed_without_hydrate() {
        let body = json!({ "hits": { "total": 1, "hits": [ { "_id": "nypl/1" } ] } });
        let err = parse_search_response(&body, true).unwrap_err();
        assert!(err.to_string().contains("has no _source"));

        let resp = parse_search_response(&body, false).unwrap();
        assert_eq!(resp.hits[0].source, "nypl");
        assert!(resp.hits[0].fields.is_empty());
    }
}
