//! # Record Catalog Core
//!
//! Shared, runtime-agnostic logic for Record Catalog: the per-type query and
//! facet registries, URL canonicalization, the search orchestrator, and the
//! result shaper that turns raw backend hits and aggregation buckets into a
//! navigable result page.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The search
//! backend is reached only through the [`backend::SearchBackend`] trait.
//!
//! ## Pipeline
//!
//! ```text
//! raw params ──▶ QueryRegistry ──▶ QueryState ──▶ canonical URL ──┬─▶ redirect
//!                                                                 │
//!                    FacetRegistry ──▶ aggregations ──▶ backend ◀─┘
//!                                                          │
//!                      ParamClasses + Locale ──▶ shaper ◀──┘──▶ ResultViewModel
//! ```

pub mod backend;
pub mod canonical;
pub mod catalog;
pub mod error;
pub mod facet;
pub mod fields;
pub mod locale;
pub mod models;
pub mod params;
pub mod query;
pub mod search;
pub mod shape;
pub mod sources;

pub use error::SearchError;
