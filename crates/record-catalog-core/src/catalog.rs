//! Record types and the catalog that maps type ids to their registries.
//!
//! A [`RecordType`] owns the [`QueryRegistry`] and [`FacetRegistry`] for one
//! kind of indexed document. The [`Catalog`] is built once at startup and is
//! read-only afterwards; lookups of unknown ids fail with
//! [`SearchError::UnknownType`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Result, SearchError};
use crate::facet::{FacetDefinition, FacetRegistry};
use crate::fields::{RowsField, SortField, SourceField, StartField, TypeField};
use crate::models::SortSpec;
use crate::query::{QueryDefinition, QueryRegistry};

/// A sort offered on a type's result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortChoice {
    /// `<field>.<key>`, resolved through the field's sort options.
    pub id: String,
    /// Display name (msgid).
    pub name: String,
}

impl SortChoice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Settings for [`RecordType::new`].
#[derive(Debug, Clone)]
pub struct RecordTypeOptions {
    pub id: String,
    pub name: String,
    pub default_rows: u64,
    pub max_rows: u64,
    pub sorts: Vec<SortChoice>,
    pub default_sort: Option<String>,
    /// Source id to display name, for the `source` field.
    pub sources: BTreeMap<String, String>,
}

impl RecordTypeOptions {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            default_rows: 100,
            max_rows: 500,
            sorts: Vec::new(),
            default_sort: None,
            sources: BTreeMap::new(),
        }
    }
}

/// One kind of indexed document with its query and facet fields.
pub struct RecordType {
    id: String,
    name: String,
    sorts: Vec<SortChoice>,
    default_sort: Option<String>,
    queries: QueryRegistry,
    facets: FacetRegistry,
}

fn is_slug(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

impl RecordType {
    /// Create a type whose registry holds the reserved fields.
    pub fn new(options: RecordTypeOptions) -> Result<Self> {
        if !is_slug(&options.id) {
            return Err(SearchError::Configuration(format!(
                "invalid record type id '{}': use lowercase letters, digits, '-' or '_'",
                options.id
            )));
        }
        if options.default_rows == 0 || options.max_rows < options.default_rows {
            return Err(SearchError::Configuration(format!(
                "record type '{}': rows must be between 1 and {}",
                options.id, options.max_rows
            )));
        }

        let sort_ids = options.sorts.iter().map(|s| s.id.clone()).collect();
        let mut queries = QueryRegistry::new();
        queries.register(Box::new(TypeField::new(&options.id, &options.name)))?;
        queries.register(Box::new(StartField))?;
        queries.register(Box::new(RowsField::new(
            options.default_rows,
            options.max_rows,
        )))?;
        queries.register(Box::new(SortField::new(
            sort_ids,
            options.default_sort.clone(),
        )))?;
        queries.register(Box::new(SourceField::new(options.sources)))?;

        Ok(Self {
            id: options.id,
            name: options.name,
            sorts: options.sorts,
            default_sort: options.default_sort,
            queries,
            facets: FacetRegistry::new(),
        })
    }

    pub fn add_query(&mut self, def: Box<dyn QueryDefinition>) -> Result<()> {
        self.queries.register(def)
    }

    pub fn add_facet(&mut self, def: Box<dyn FacetDefinition>) -> Result<()> {
        self.facets.register(def)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name (msgid).
    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn queries(&self) -> &QueryRegistry {
        &self.queries
    }

    pub fn facets(&self) -> &FacetRegistry {
        &self.facets
    }

    pub fn sorts(&self) -> &[SortChoice] {
        &self.sorts
    }

    pub fn default_sort(&self) -> Option<&str> {
        self.default_sort.as_deref()
    }

    pub fn query(&self, name: &str) -> Option<&dyn QueryDefinition> {
        self.queries.find(name)
    }

    /// Resolve `<field>.<key>` through the field's sort options.
    pub fn resolve_sort(&self, id: &str) -> Result<SortSpec> {
        let (field, key) = id.split_once('.').ok_or_else(|| {
            SearchError::Configuration(format!("malformed sort '{}': expected <field>.<key>", id))
        })?;
        let def = self.queries.find(field).ok_or_else(|| {
            SearchError::Configuration(format!(
                "sort '{}' on type '{}' names unknown field '{}'",
                id, self.id, field
            ))
        })?;
        def.sort_options().remove(key).ok_or_else(|| {
            SearchError::Configuration(format!(
                "sort '{}' on type '{}': field '{}' has no sort '{}'",
                id, self.id, field, key
            ))
        })
    }

    /// Check that every declared sort resolves and the default is declared.
    pub fn validate(&self) -> Result<()> {
        for sort in &self.sorts {
            self.resolve_sort(&sort.id)?;
        }
        if let Some(default) = &self.default_sort {
            if !self.sorts.iter().any(|s| &s.id == default) {
                return Err(SearchError::Configuration(format!(
                    "default sort '{}' of type '{}' is not declared",
                    default, self.id
                )));
            }
        }
        Ok(())
    }
}

/// All record types, in declaration order.
#[derive(Default)]
pub struct Catalog {
    types: Vec<RecordType>,
}

impl Catalog {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// Validate and add a record type. Ids must be unique.
    pub fn register(&mut self, record_type: RecordType) -> Result<()> {
        if self.types.iter().any(|t| t.id == record_type.id) {
            return Err(SearchError::Configuration(format!(
                "duplicate record type: {}",
                record_type.id
            )));
        }
        record_type.validate()?;
        self.types.push(record_type);
        Ok(())
    }

    pub fn registry_for(&self, id: &str) -> Result<&RecordType> {
        self.types
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| SearchError::UnknownType(id.to_string()))
    }

    /// The first declared type.
    pub fn default_type(&self) -> Option<&RecordType> {
        self.types.first()
    }

    /// An explicit id, else the first declared type.
    pub fn resolve_type(&self, id: Option<&str>) -> Result<&RecordType> {
        match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self.registry_for(id),
            None => self
                .default_type()
                .ok_or_else(|| SearchError::Configuration("no record types registered".into())),
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &RecordType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
