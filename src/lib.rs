//! # Record Catalog
//!
//! Faceted search over a catalog of records (locations, people, artworks,
//! ...) held in a search index. Every record type declares its query fields,
//! facets and sorts in the config file; the search pipeline turns a request
//! into a canonical query, redirects non-canonical URLs, queries the index
//! once and shapes the result into a navigable page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌───────────────┐
//! │ catalog.toml │──▶│ record-catalog-core │──▶│ SearchBackend │
//! │ types/fields │   │ registries + search │   │ memory / ES   │
//! └──────────────┘   └──────────┬──────────┘   └───────────────┘
//!                               │
//!                   ┌───────────┴───────────┐
//!                   ▼                       ▼
//!             ┌──────────┐            ┌──────────┐
//!             │   CLI    │            │   HTTP   │
//!             │(catalog) │            │  (axum)  │
//!             └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog check                                  # validate config
//! catalog types                                  # list record types
//! catalog search --type location --param city=Boston
//! catalog serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`catalog`] | Registries built from config |
//! | [`backend`] | Backend selection and fixture loading |
//! | [`elasticsearch`] | Elasticsearch backend |
//! | [`sources`] | Source metadata and record counts |
//! | [`app`] | Shared application context |
//! | [`search`] | `catalog search` command |
//! | [`server`] | HTTP server |

pub mod app;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod elasticsearch;
pub mod search;
pub mod server;
pub mod sources;
