//! TOML configuration.
//!
//! Record types, their query fields, facets and sorts are all declared in
//! the config file and turned into registries once at startup (see
//! [`crate::catalog`]). [`load_config`] rejects anything that would make a
//! registry inconsistent, so a running server never meets a broken sort or
//! facet reference.

use anyhow::{bail, Context, Result};
use record_catalog_core::fields::RESERVED;
use record_catalog_core::models::SortOrder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub i18n: I18nConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Scheme and authority of public URLs, e.g. `https://records.example.org`.
    pub base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    /// JSON fixture file for the memory backend: `{"<type>": [records]}`.
    #[serde(default)]
    pub fixtures: Option<PathBuf>,
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default)]
    pub index_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            fixtures: None,
            url: default_backend_url(),
            index_prefix: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend_kind() -> String {
    "memory".to_string()
}
fn default_backend_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_rows")]
    pub default_rows: u64,
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_rows: default_rows(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_rows() -> u64 {
    100
}
fn default_max_rows() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct I18nConfig {
    #[serde(default = "default_lang")]
    pub default_lang: String,
    /// Translations per language, keyed by msgid.
    #[serde(default)]
    pub messages: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            default_lang: default_lang(),
            messages: BTreeMap::new(),
        }
    }
}

fn default_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Record types this source contributes to.
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TypeConfig {
    pub id: String,
    pub name: String,
    /// Page size; defaults to `search.default_rows`.
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default)]
    pub sorts: Vec<SortConfig>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub facets: Vec<FacetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SortConfig {
    /// `<field>.<key>`.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Term,
    Text,
    Range,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldConfig {
    pub name: String,
    pub kind: FieldKind,
    /// Backend field for `term` and `range`.
    #[serde(default)]
    pub field: Option<String>,
    /// Backend fields for `text`; empty searches all fields.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub primary: bool,
    /// Title template with a `{value}` placeholder.
    #[serde(default)]
    pub title: Option<String>,
    /// Sort key to direction, `term` only.
    #[serde(default)]
    pub sorts: BTreeMap<String, SortOrder>,
    /// Backend field to sort on, when it differs from `field`.
    #[serde(default)]
    pub sort_field: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    Terms,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FacetConfig {
    pub name: String,
    #[serde(default = "default_facet_kind")]
    pub kind: FacetKind,
    pub field: String,
    /// Query field a bucket sets; defaults to the facet name.
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default = "default_facet_size")]
    pub size: usize,
    #[serde(default)]
    pub title: Option<String>,
    /// Bucket key to display label (msgid).
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_facet_kind() -> FacetKind {
    FacetKind::Terms
}
fn default_facet_size() -> usize {
    50
}

impl TypeConfig {
    pub fn rows(&self, search: &SearchConfig) -> u64 {
        self.rows.unwrap_or(search.default_rows)
    }

    fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl FacetConfig {
    pub fn param(&self) -> &str {
        self.param.as_deref().unwrap_or(&self.name)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    url::Url::parse(&config.server.base_url)
        .with_context(|| format!("server.base_url is not a URL: {}", config.server.base_url))?;

    match config.backend.kind.as_str() {
        "memory" | "elasticsearch" => {}
        other => bail!(
            "Unknown backend kind: '{}'. Must be memory or elasticsearch.",
            other
        ),
    }

    if config.search.default_rows == 0 {
        bail!("search.default_rows must be >= 1");
    }
    if config.search.max_rows < config.search.default_rows {
        bail!("search.max_rows must be >= search.default_rows");
    }

    if config.i18n.default_lang.trim().is_empty() {
        bail!("i18n.default_lang must not be empty");
    }

    if config.types.is_empty() {
        bail!("at least one [[types]] entry is required");
    }

    let mut type_ids = HashSet::new();
    for t in &config.types {
        if !type_ids.insert(t.id.as_str()) {
            bail!("duplicate record type: {}", t.id);
        }
        validate_type(config, t)?;
    }

    let mut source_ids = HashSet::new();
    for source in &config.sources {
        if !source_ids.insert(source.id.as_str()) {
            bail!("duplicate source: {}", source.id);
        }
        for t in &source.types {
            if !type_ids.contains(t.as_str()) {
                bail!("source '{}' references unknown record type '{}'", source.id, t);
            }
        }
    }

    Ok(())
}

fn validate_type(config: &Config, t: &TypeConfig) -> Result<()> {
    let rows = t.rows(&config.search);
    if rows == 0 || rows > config.search.max_rows {
        bail!(
            "types.{}.rows must be between 1 and search.max_rows ({})",
            t.id,
            config.search.max_rows
        );
    }

    let mut names = HashSet::new();
    for field in &t.fields {
        if RESERVED.contains(&field.name.as_str()) {
            bail!("types.{}: field name '{}' is reserved", t.id, field.name);
        }
        if !names.insert(field.name.as_str()) {
            bail!("types.{}: duplicate field '{}'", t.id, field.name);
        }
        match field.kind {
            FieldKind::Term | FieldKind::Range if field.field.is_none() => bail!(
                "types.{}: field '{}' needs a backend `field`",
                t.id,
                field.name
            ),
            FieldKind::Text | FieldKind::Range if !field.sorts.is_empty() => bail!(
                "types.{}: only term fields may declare sorts ('{}')",
                t.id,
                field.name
            ),
            _ => {}
        }
    }

    let mut facet_names = HashSet::new();
    for facet in &t.facets {
        if !facet_names.insert(facet.name.as_str()) {
            bail!("types.{}: duplicate facet '{}'", t.id, facet.name);
        }
        if t.field(facet.param()).is_none() {
            bail!(
                "types.{}: facet '{}' sets unknown field '{}'",
                t.id,
                facet.name,
                facet.param()
            );
        }
    }

    for sort in &t.sorts {
        let resolved = sort
            .id
            .split_once('.')
            .and_then(|(field, key)| t.field(field).map(|f| f.sorts.contains_key(key)))
            .unwrap_or(false);
        if !resolved {
            bail!(
                "types.{}: sort '{}' does not name a <field>.<key> sort option",
                t.id,
                sort.id
            );
        }
    }

    if let Some(default) = &t.default_sort {
        if !t.sorts.iter().any(|s| &s.id == default) {
            bail!("types.{}: default_sort '{}' is not declared", t.id, default);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
[server]
bind = "127.0.0.1:7340"
base_url = "http://localhost:7340"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{}{}", BASE, extra))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_type_uses_defaults() {
        let config = parse(
            r#"
[[types]]
id = "location"
name = "Locations"
"#,
        )
        .unwrap();
        assert_eq!(config.backend.kind, "memory");
        assert_eq!(config.search.default_rows, 100);
        assert_eq!(config.types[0].rows(&config.search), 100);
        assert_eq!(config.i18n.default_lang, "en");
    }

    #[test]
    fn test_requires_a_type() {
        assert!(parse("").is_err());
    }

    #[test]
    fn test_rejects_reserved_field_name() {
        let err = parse(
            r#"
[[types]]
id = "location"
name = "Locations"
fields = [{ name = "rows", kind = "term", field = "rows" }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_rejects_unresolvable_sort() {
        let err = parse(
            r#"
[[types]]
id = "location"
name = "Locations"
sorts = [{ id = "city.desc", name = "City" }]
fields = [{ name = "city", kind = "term", field = "city", sorts = { asc = "asc" } }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("city.desc"));
    }

    #[test]
    fn test_rejects_undeclared_default_sort() {
        assert!(parse(
            r#"
[[types]]
id = "location"
name = "Locations"
default_sort = "city.asc"
fields = [{ name = "city", kind = "term", field = "city", sorts = { asc = "asc" } }]
"#,
        )
        .is_err());
    }

    #[test]
    fn test_rejects_facet_without_field() {
        let err = parse(
            r#"
[[types]]
id = "location"
name = "Locations"
facets = [{ name = "country", field = "country" }]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_rejects_unknown_backend_and_source_type() {
        let types = r#"
[[types]]
id = "location"
name = "Locations"
"#;
        assert!(parse(&format!("[backend]\nkind = \"solr\"\n{}", types)).is_err());
        assert!(parse(&format!(
            "{}\n[[sources]]\nid = \"nypl\"\nname = \"NYPL\"\ntypes = [\"ship\"]\n",
            types
        ))
        .is_err());
    }

    #[test]
    fn test_full_type_parses() {
        let config = parse(
            r#"
[[types]]
id = "location"
name = "Locations"
rows = 20
default_sort = "city.asc"
sorts = [{ id = "city.asc", name = "City (A-Z)" }]
fields = [
    { name = "city", kind = "term", field = "city", primary = true, sorts = { asc = "asc", desc = "desc" } },
    { name = "filter", kind = "text", fields = ["city", "notes"] },
    { name = "date", kind = "range", field = "year", title = "Dated {value}" },
    { name = "country", kind = "term", field = "country" },
]
facets = [{ name = "country", field = "country", size = 20, title = "Country", labels = { US = "United States" } }]
"#,
        )
        .unwrap();
        let t = &config.types[0];
        assert_eq!(t.fields.len(), 4);
        assert_eq!(t.fields[0].sorts["desc"], SortOrder::Desc);
        assert_eq!(t.facets[0].param(), "country");
        assert_eq!(t.facets[0].kind, FacetKind::Terms);
    }
}
