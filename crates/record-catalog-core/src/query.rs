//! Query field definitions and the per-type registry that holds them.
//!
//! A [`QueryDefinition`] knows how to pull one parameter out of a raw
//! request, what its default is, how it filters the backend query, which
//! sorts it offers, and how it titles a result page. Record types differ
//! only in which definitions they register, so the orchestrator never
//! special-cases a type.

use std::collections::BTreeMap;

use crate::error::{Result, SearchError};
use crate::locale::Locale;
use crate::models::{Filter, ParamValue, RawParams, SortSpec};

/// Escapes a user value before it is embedded in a query-string clause.
pub type Sanitizer = fn(&str) -> String;

/// One recognized query parameter of a record type.
pub trait QueryDefinition: Send + Sync {
    /// Parameter name. Unique within a registry.
    fn name(&self) -> &str;

    /// Extract and validate this field's value from the raw request.
    ///
    /// Invalid input yields `None`, which drops the parameter from the
    /// canonical URL.
    fn extract_value(&self, params: &RawParams) -> Option<ParamValue>;

    /// Value used when [`extract_value`](QueryDefinition::extract_value)
    /// finds nothing.
    fn default_value(&self, _params: &RawParams) -> Option<ParamValue> {
        None
    }

    /// Backend clause for a present value.
    fn filter_clause(&self, _value: &ParamValue, _sanitize: Sanitizer) -> Option<Filter> {
        None
    }

    /// Sorts offered by this field, keyed by sort key.
    fn sort_options(&self) -> BTreeMap<String, SortSpec> {
        BTreeMap::new()
    }

    /// Page title for a search narrowed by this value. May be empty.
    fn search_title(&self, value: &ParamValue, locale: &Locale) -> String;

    /// Whether this parameter defines page identity (title, breadcrumbs).
    fn is_primary(&self) -> bool {
        false
    }

    /// Serialized form for the canonical URL, or `None` to omit the pair.
    fn url_value(&self, value: &ParamValue) -> Option<String> {
        Some(value.to_string())
    }
}

/// Ordered query definitions of one record type.
#[derive(Default)]
pub struct QueryRegistry {
    defs: Vec<Box<dyn QueryDefinition>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self { defs: Vec::new() }
    }

    /// Register a definition. Names must be unique.
    pub fn register(&mut self, def: Box<dyn QueryDefinition>) -> Result<()> {
        if self.find(def.name()).is_some() {
            return Err(SearchError::Configuration(format!(
                "duplicate query field: {}",
                def.name()
            )));
        }
        self.defs.push(def);
        Ok(())
    }

    /// Find a definition by name.
    pub fn find(&self, name: &str) -> Option<&dyn QueryDefinition> {
        self.defs
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    /// Definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn QueryDefinition> {
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

/// Escape Lucene query-string syntax so user input is matched literally.
///
/// Reserved characters are backslash-escaped, `<` and `>` (which cannot be
/// escaped) are dropped, and the boolean operators `AND`/`OR`/`NOT` are
/// lowercased so they are treated as terms.
pub fn sanitize_query_string(input: &str) -> String {
    const RESERVED: &[char] = &[
        '\\', '+', '-', '=', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*',
        '?', ':', '/',
    ];

    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch == '<' || ch == '>' {
            continue;
        }
        if RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
        .split(' ')
        .map(|word| match word {
            "AND" | "OR" | "NOT" => word.to_lowercase(),
            _ => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
