//! Result shaping: raw backend output to a navigable result page.
//!
//! Given the resolved state and a successful backend response, builds:
//!
//! - pagination (`start`/`end` and prev/next links),
//! - facet widgets (zero-count buckets dropped, single-choice facets hidden,
//!   long facets split into visible and `extra` buckets),
//! - the page title and breadcrumb trail from the primary parameters,
//! - the sort menu.

use serde::Serialize;

use crate::backend::BackendResponse;
use crate::canonical::UrlCanonicalizer;
use crate::catalog::RecordType;
use crate::error::{Result, SearchError};
use crate::fields::START;
use crate::locale::Locale;
use crate::models::{QueryState, Record};
use crate::params::ParamClasses;
use crate::sources::SourceSummary;

/// Facets with more buckets than this are split.
pub const FACET_SPLIT_THRESHOLD: usize = 10;
/// Buckets shown before the `extra` toggle of a split facet.
pub const FACET_VISIBLE_BUCKETS: usize = 5;
/// Title msgid for pages with several primary parameters.
pub const SEARCH_RESULTS_TITLE: &str = "Search Results";

/// Everything the shaper reads besides the state and the response.
pub struct ShapeContext<'a> {
    pub record_type: &'a RecordType,
    pub locale: &'a Locale,
    pub urls: &'a UrlCanonicalizer,
    pub sources: Vec<SourceSummary>,
}

/// One step of the breadcrumb trail. Links to the search without this
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetBucket {
    pub label: String,
    pub count: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetView {
    /// Facet name.
    pub field: String,
    /// Localized title.
    pub name: String,
    pub buckets: Vec<FacetBucket>,
    /// Hidden by default; present only for split facets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<FacetBucket>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortView {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

/// The terminal output of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultViewModel {
    pub title: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub sources: Vec<SourceSummary>,
    pub values: QueryState,
    pub record_type: String,
    pub sorts: Vec<SortView>,
    pub facets: Vec<FacetView>,
    pub records: Vec<Record>,
    pub total: u64,
    /// One-based position of the first hit; 0 when there are no hits.
    pub start: u64,
    /// Position of the last hit shown.
    pub end: u64,
    pub prev: Option<String>,
    pub next: Option<String>,
    /// Search pages are never indexed.
    pub no_index: bool,
}

/// Build the view model. Fails only when the response lacks an aggregation
/// that was requested.
pub fn shape_results(
    ctx: &ShapeContext<'_>,
    state: &QueryState,
    classes: &ParamClasses,
    response: BackendResponse,
) -> Result<ResultViewModel> {
    let start = state.start();
    let rows = state.rows();
    let end = start.saturating_add(response.hits.len() as u64);

    let prev = (start > 0).then(|| {
        let target = start.saturating_sub(rows);
        page_url(ctx, state, target)
    });
    let next = (end < response.total).then(|| page_url(ctx, state, start.saturating_add(rows)));

    let facets = shape_facets(ctx, state, &response)?;
    let (title, breadcrumbs) = title_and_breadcrumbs(ctx, state, classes);

    let sorts = ctx
        .record_type
        .sorts()
        .iter()
        .map(|sort| SortView {
            id: sort.id.clone(),
            name: ctx.locale.gettext(&sort.name),
            selected: state.sort() == Some(sort.id.as_str()),
        })
        .collect();

    Ok(ResultViewModel {
        title,
        breadcrumbs,
        sources: ctx.sources.clone(),
        values: state.clone(),
        record_type: ctx.record_type.id().to_string(),
        sorts,
        facets,
        records: response.hits,
        total: response.total,
        start: if response.total > 0 {
            start.saturating_add(1)
        } else {
            0
        },
        end,
        prev,
        next,
        no_index: true,
    })
}

fn page_url(ctx: &ShapeContext<'_>, state: &QueryState, start: u64) -> String {
    let target = if start > 0 {
        state.with(START, start)
    } else {
        state.without(START)
    };
    ctx.urls
        .canonical_url(ctx.locale, ctx.record_type, &target, true)
}

fn shape_facets(
    ctx: &ShapeContext<'_>,
    state: &QueryState,
    response: &BackendResponse,
) -> Result<Vec<FacetView>> {
    let mut facets = Vec::new();

    for facet in ctx.record_type.facets().iter() {
        let raw = response.aggregations.get(facet.name()).ok_or_else(|| {
            SearchError::Backend(format!("missing aggregation '{}' in response", facet.name()))
        })?;

        let mut buckets: Vec<FacetBucket> = facet
            .format_buckets(raw, ctx.locale)
            .into_iter()
            .filter(|bucket| bucket.count > 0)
            .map(|bucket| FacetBucket {
                url: ctx.urls.canonical_url(
                    ctx.locale,
                    ctx.record_type,
                    &state.merged(&bucket.url_params),
                    false,
                ),
                label: bucket.label,
                count: bucket.count,
            })
            .collect();

        if buckets.len() <= 1 {
            continue;
        }

        let extra = if buckets.len() > FACET_SPLIT_THRESHOLD {
            Some(buckets.split_off(FACET_VISIBLE_BUCKETS))
        } else {
            None
        };

        facets.push(FacetView {
            field: facet.name().to_string(),
            name: facet.title(ctx.locale),
            buckets,
            extra,
        });
    }

    Ok(facets)
}

fn title_and_breadcrumbs(
    ctx: &ShapeContext<'_>,
    state: &QueryState,
    classes: &ParamClasses,
) -> (String, Vec<Breadcrumb>) {
    let titled = |name: &str| -> Option<String> {
        let def = ctx.record_type.query(name)?;
        let value = state.get(name)?;
        Some(def.search_title(value, ctx.locale))
    };

    match classes.primary.as_slice() {
        [] => (ctx.locale.gettext(ctx.record_type.display_name()), Vec::new()),
        [only] => (titled(only.as_str()).unwrap_or_default(), Vec::new()),
        primary => {
            let breadcrumbs = primary
                .iter()
                .filter_map(|name| {
                    let title = titled(name.as_str()).filter(|t| !t.is_empty())?;
                    Some(Breadcrumb {
                        name: title,
                        url: ctx.urls.canonical_url(
                            ctx.locale,
                            ctx.record_type,
                            &state.without(name),
                            false,
                        ),
                    })
                })
                .collect();
            (ctx.locale.gettext(SEARCH_RESULTS_TITLE), breadcrumbs)
        }
    }
}
