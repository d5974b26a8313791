//! Facet definitions and their per-type registry.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Result, SearchError};
use crate::locale::Locale;
use crate::models::{Aggregation, ParamValue, RawBucket};

/// A backend bucket after a facet has formatted it for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedBucket {
    pub label: String,
    /// Zero-count buckets are informational and never displayed.
    pub count: u64,
    /// Parameters that narrow the current search to this bucket.
    pub url_params: BTreeMap<String, ParamValue>,
}

/// A navigational aggregation widget of one record type.
pub trait FacetDefinition: Send + Sync {
    /// Facet name; also the aggregation name in backend requests/responses.
    fn name(&self) -> &str;

    /// The aggregation to request. Always requested, displayed or not.
    fn aggregation(&self) -> Aggregation;

    /// Turn raw buckets into ordered display buckets.
    fn format_buckets(&self, buckets: &[RawBucket], locale: &Locale) -> Vec<FormattedBucket>;

    fn title(&self, locale: &Locale) -> String;
}

/// Ordered facet definitions of one record type.
#[derive(Default)]
pub struct FacetRegistry {
    defs: Vec<Box<dyn FacetDefinition>>,
}

impl FacetRegistry {
    pub fn new() -> Self {
        Self { defs: Vec::new() }
    }

    /// Register a facet. Names must be unique.
    pub fn register(&mut self, def: Box<dyn FacetDefinition>) -> Result<()> {
        if self.find(def.name()).is_some() {
            return Err(SearchError::Configuration(format!(
                "duplicate facet: {}",
                def.name()
            )));
        }
        self.defs.push(def);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&dyn FacetDefinition> {
        self.defs
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    /// Facets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn FacetDefinition> {
        self.defs.iter().map(|d| d.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }
}
