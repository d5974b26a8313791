//! Startup construction of the record type registries and locales.

use anyhow::{Context, Result};
use record_catalog_core::catalog::{Catalog, RecordType, RecordTypeOptions, SortChoice};
use record_catalog_core::fields::{RangeField, TermField, TermsFacet, TextField};
use record_catalog_core::locale::Locales;
use record_catalog_core::query::QueryDefinition;
use std::collections::BTreeMap;

use crate::config::{Config, FacetConfig, FacetKind, FieldConfig, FieldKind, TypeConfig};

/// Build every configured record type, in declaration order.
pub fn build_catalog(config: &Config) -> Result<Catalog> {
    let mut catalog = Catalog::new();
    for t in &config.types {
        let record_type =
            build_type(config, t).with_context(|| format!("Invalid record type: {}", t.id))?;
        catalog
            .register(record_type)
            .with_context(|| format!("Invalid record type: {}", t.id))?;
    }
    Ok(catalog)
}

fn build_type(config: &Config, t: &TypeConfig) -> Result<RecordType> {
    let sources: BTreeMap<String, String> = config
        .sources
        .iter()
        .filter(|s| s.types.iter().any(|id| id == &t.id))
        .map(|s| (s.id.clone(), s.name.clone()))
        .collect();

    let mut options = RecordTypeOptions::new(&t.id, &t.name);
    options.default_rows = t.rows(&config.search);
    options.max_rows = config.search.max_rows;
    options.sorts = t
        .sorts
        .iter()
        .map(|s| SortChoice::new(&s.id, &s.name))
        .collect();
    options.default_sort = t.default_sort.clone();
    options.sources = sources;

    let mut record_type = RecordType::new(options)?;
    for field in &t.fields {
        record_type.add_query(build_field(field))?;
    }
    for facet in &t.facets {
        record_type.add_facet(Box::new(build_facet(facet)))?;
    }
    Ok(record_type)
}

fn build_field(config: &FieldConfig) -> Box<dyn QueryDefinition> {
    let backend_field = config.field.clone().unwrap_or_else(|| config.name.clone());
    match config.kind {
        FieldKind::Term => {
            let mut field = TermField::new(&config.name, backend_field).primary(config.primary);
            if let Some(title) = &config.title {
                field = field.title(title);
            }
            if let Some(sort_field) = &config.sort_field {
                field = field.sort_field(sort_field);
            }
            for (key, order) in &config.sorts {
                field = field.sort(key, *order);
            }
            Box::new(field)
        }
        FieldKind::Text => {
            let mut field =
                TextField::new(&config.name, config.fields.clone()).primary(config.primary);
            if let Some(title) = &config.title {
                field = field.title(title);
            }
            Box::new(field)
        }
        FieldKind::Range => {
            let mut field = RangeField::new(&config.name, backend_field).primary(config.primary);
            if let Some(title) = &config.title {
                field = field.title(title);
            }
            Box::new(field)
        }
    }
}

fn build_facet(config: &FacetConfig) -> TermsFacet {
    match config.kind {
        FacetKind::Terms => {
            let mut facet = TermsFacet::new(&config.name, &config.field, config.size)
                .param(config.param());
            if let Some(title) = &config.title {
                facet = facet.title(title);
            }
            for (key, label) in &config.labels {
                facet = facet.label(key, label);
            }
            facet
        }
    }
}

/// Message catalogs from `[i18n.messages.<lang>]`.
pub fn build_locales(config: &Config) -> Locales {
    let mut locales = Locales::new(&config.i18n.default_lang);
    for (lang, messages) in &config.i18n.messages {
        locales.insert(lang, messages.clone());
    }
    locales
}

/// Validate the config and print what every record type declares.
///
/// Does not contact the backend.
pub fn run_check(config: &Config) -> Result<()> {
    let catalog = build_catalog(config)?;
    let locales = build_locales(config);

    for record_type in catalog.types() {
        println!("{} ({})", record_type.id(), record_type.display_name());
        println!("  fields: {}", record_type.queries().names().join(", "));
        let facets = record_type.facets().names();
        if !facets.is_empty() {
            println!("  facets: {}", facets.join(", "));
        }
        let sorts: Vec<&str> = record_type.sorts().iter().map(|s| s.id.as_str()).collect();
        if !sorts.is_empty() {
            println!(
                "  sorts:  {} (default: {})",
                sorts.join(", "),
                record_type.default_sort().unwrap_or("-")
            );
        }
    }

    let languages: Vec<&str> = locales.languages().collect();
    println!();
    println!(
        "{} types, {} sources, languages: {}",
        catalog.len(),
        config.sources.len(),
        languages.join(", ")
    );
    println!("Config OK.");
    Ok(())
}
