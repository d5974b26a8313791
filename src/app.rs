//! Application context shared by the CLI and the HTTP server.
//!
//! Everything here is built once from the config and is read-only
//! afterwards, so a single [`App`] is shared by all requests.

use anyhow::Result;
use record_catalog_core::canonical::UrlCanonicalizer;
use record_catalog_core::locale::{Locale, Locales};
use record_catalog_core::search::SearchOrchestrator;
use std::sync::Arc;
use tracing::info;

use crate::backend::create_backend;
use crate::catalog::{build_catalog, build_locales};
use crate::config::Config;
use crate::sources::build_sources;

/// Generic message for failed searches (msgid).
pub const SEARCH_ERROR_MESSAGE: &str = "An error occurred while processing your search.";
/// Message for unknown source routes (msgid).
pub const SOURCE_NOT_FOUND_MESSAGE: &str = "Source not found.";

pub struct App {
    orchestrator: SearchOrchestrator,
    locales: Locales,
}

impl App {
    /// Build the registries, the backend and the source directory.
    pub async fn build(config: &Config) -> Result<Self> {
        let catalog = build_catalog(config)?;
        let backend = create_backend(config)?;
        let sources = build_sources(config, backend.as_ref()).await?;
        info!(
            types = catalog.len(),
            sources = config.sources.len(),
            backend = %config.backend.kind,
            "catalog ready"
        );

        let urls = UrlCanonicalizer::new(&config.server.base_url, &config.i18n.default_lang);
        let orchestrator =
            SearchOrchestrator::new(Arc::new(catalog), backend, urls, Arc::new(sources));
        Ok(Self {
            orchestrator,
            locales: build_locales(config),
        })
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn locale(&self, lang: Option<&str>) -> Locale {
        self.locales.resolve(lang)
    }
}
