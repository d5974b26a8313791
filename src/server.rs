//! HTTP search server.
//!
//! Serves search result pages as JSON view models. Every search URL has a
//! single canonical form; requests on any other form are answered with a
//! `302 Found` to the canonical URL before the backend is touched.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search` | Search the default record type |
//! | `GET`  | `/{type}/search` | Search one record type |
//! | `GET`  | `/source/{source}` | Redirect to the search of one source |
//! | `GET`  | `/{type}/source/{source}` | Same, for one record type |
//! | `GET`  | `/types` | List record types with sorts and facets |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "unknown record type: ship" } }
//! ```
//!
//! Error codes: `not_found` (404), `internal` (500). Internal errors carry
//! only a localized generic message; details go to the log.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use record_catalog_core::canonical::parse_query;
use record_catalog_core::fields::{LANG, SOURCE};
use record_catalog_core::locale::Locale;
use record_catalog_core::search::{SearchOutcome, SearchRequest};
use record_catalog_core::SearchError;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app::{App, SEARCH_ERROR_MESSAGE, SOURCE_NOT_FOUND_MESSAGE};
use crate::config::Config;

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    app: Arc<App>,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, base_url = %config.server.base_url, "search server listening");
    println!("Search server listening on http://{}", bind_addr);

    axum::serve(listener, router(Arc::new(app))).await?;
    Ok(())
}

/// The application router.
pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/types", get(handle_types))
        .route("/search", get(handle_search_default))
        .route("/source/{source}", get(handle_source_default))
        .route("/{type}/search", get(handle_search))
        .route("/{type}/source/{source}", get(handle_source))
        .layer(cors)
        .with_state(AppState { app })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 error.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Unknown types are "not found"; everything else is a generic failure with
/// a localized message.
fn classify_search_error(err: SearchError, locale: &Locale) -> AppError {
    match err {
        SearchError::UnknownType(_) => not_found(err.to_string()),
        SearchError::Configuration(_) | SearchError::Backend(_) => {
            error!(error = %err, "search failed");
            internal(locale.gettext(SEARCH_ERROR_MESSAGE))
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /types ============

#[derive(Serialize)]
struct TypeInfo {
    id: String,
    name: String,
    sorts: Vec<record_catalog_core::catalog::SortChoice>,
    facets: Vec<String>,
    sources: Vec<record_catalog_core::sources::SourceSummary>,
}

#[derive(Serialize)]
struct TypeListResponse {
    types: Vec<TypeInfo>,
}

async fn handle_types(State(state): State<AppState>) -> Json<TypeListResponse> {
    let orchestrator = state.app.orchestrator();
    let types = orchestrator
        .catalog()
        .types()
        .map(|t| TypeInfo {
            id: t.id().to_string(),
            name: t.display_name().to_string(),
            sorts: t.sorts().to_vec(),
            facets: t.facets().names().into_iter().map(String::from).collect(),
            sources: orchestrator.sources().sources_for_type(t.id()),
        })
        .collect();
    Json(TypeListResponse { types })
}

// ============ GET /search, /{type}/search ============

async fn handle_search_default(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    run(&state, None, &uri, query, None).await
}

async fn handle_search(
    State(state): State<AppState>,
    Path(record_type): Path<String>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    run(&state, Some(record_type), &uri, query, None).await
}

// ============ GET /source/{source}, /{type}/source/{source} ============

async fn handle_source_default(
    State(state): State<AppState>,
    Path(source): Path<String>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    run(&state, None, &uri, query, Some(source)).await
}

async fn handle_source(
    State(state): State<AppState>,
    Path((record_type, source)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    run(&state, Some(record_type), &uri, query, Some(source)).await
}

/// Run one search and render the outcome.
///
/// For source routes the source id is added to the parameters; the
/// resulting canonical URL is always a `/{type}/search` URL, so these
/// routes always redirect.
async fn run(
    state: &AppState,
    record_type: Option<String>,
    uri: &axum::http::Uri,
    query: Option<String>,
    source: Option<String>,
) -> Result<Response, AppError> {
    let app = &state.app;
    let mut params = parse_query(query.as_deref().unwrap_or_default());
    let locale = app.locale(params.get(LANG).map(String::as_str));

    if let Some(source) = source {
        if app.orchestrator().sources().find(&source).is_none() {
            return Err(not_found(locale.gettext(SOURCE_NOT_FOUND_MESSAGE)));
        }
        params.insert(SOURCE.to_string(), source);
    }

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let request = SearchRequest {
        record_type,
        params,
        request_url: app.orchestrator().urls().absolute(path_and_query),
        locale,
    };

    match app.orchestrator().run_search(&request).await {
        Ok(SearchOutcome::Redirect(url)) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
        }
        Ok(SearchOutcome::Results(view)) => {
            let mut response = Json(view).into_response();
            response
                .headers_mut()
                .insert("x-robots-tag", HeaderValue::from_static("noindex"));
            Ok(response)
        }
        Err(err) => Err(classify_search_error(err, &request.locale)),
    }
}
