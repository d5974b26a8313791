//! Source metadata: which sources contribute records to which types.
//!
//! Record counts are fetched from the backend once at startup and are not
//! refreshed while the server runs.

use anyhow::Result;
use record_catalog_core::backend::SearchBackend;
use record_catalog_core::fields::SOURCE;
use record_catalog_core::models::Filter;
use record_catalog_core::sources::{SourceSummary, StaticSources};
use tracing::debug;

use crate::config::Config;

/// Count every configured source's records per type.
pub async fn build_sources(config: &Config, backend: &dyn SearchBackend) -> Result<StaticSources> {
    let mut sources = StaticSources::new();
    for source in &config.sources {
        for record_type in &source.types {
            let filter = [Filter::Term {
                field: SOURCE.to_string(),
                value: source.id.clone(),
            }];
            let num_records = backend.count(record_type, &filter).await?;
            debug!(source = %source.id, record_type = %record_type, num_records, "counted records");
            sources.add(
                record_type.clone(),
                SourceSummary {
                    id: source.id.clone(),
                    name: source.name.clone(),
                    url: source.url.clone(),
                    num_records,
                },
            );
        }
    }
    Ok(sources)
}

/// Print every record type with its sources and record counts.
pub async fn list_types(config: &Config) -> Result<()> {
    let app = crate::app::App::build(config).await?;
    let orchestrator = app.orchestrator();

    println!("{:<16} {:<24} {:>8}  SOURCES", "TYPE", "NAME", "ROWS");
    for record_type in orchestrator.catalog().types() {
        let rows = config
            .types
            .iter()
            .find(|t| t.id == record_type.id())
            .map(|t| t.rows(&config.search))
            .unwrap_or(config.search.default_rows);
        let sources: Vec<String> = orchestrator
            .sources()
            .sources_for_type(record_type.id())
            .into_iter()
            .map(|s| format!("{} ({})", s.id, s.num_records))
            .collect();
        println!(
            "{:<16} {:<24} {:>8}  {}",
            record_type.id(),
            record_type.display_name(),
            rows,
            if sources.is_empty() {
                "-".to_string()
            } else {
                sources.join(", ")
            }
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_catalog_core::backend::memory::InMemoryBackend;
    use record_catalog_core::models::Record;
    use record_catalog_core::sources::SourceDirectory;

    #[tokio::test]
    async fn test_build_sources_counts_per_type() {
        let config: Config = toml::from_str(
            r#"
[server]
bind = "127.0.0.1:7340"
base_url = "http://localhost:7340"

[[sources]]
id = "nypl"
name = "New York Public Library"
types = ["location", "person"]

[[types]]
id = "location"
name = "Locations"

[[types]]
id = "person"
name = "People"
"#,
        )
        .unwrap();

        let backend = InMemoryBackend::new();
        let record: Record =
            serde_json::from_value(serde_json::json!({"id": "nypl/1", "source": "nypl"}))
                .unwrap();
        backend.insert("location", record).unwrap();

        let sources = build_sources(&config, &backend).await.unwrap();
        assert_eq!(sources.len(), 2);
        let location = sources.sources_for_type("location");
        assert_eq!(location.len(), 1);
        assert_eq!(location[0].num_records, 1);
        assert!(sources.sources_for_type("person").is_empty());
    }
}
