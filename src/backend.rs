//! Search backend selection.
//!
//! | `backend.kind` | Backend |
//! |----------------|---------|
//! | `"memory"` | [`InMemoryBackend`] loaded from `backend.fixtures` |
//! | `"elasticsearch"` | [`ElasticsearchBackend`] |

use anyhow::{bail, Context, Result};
use record_catalog_core::backend::memory::InMemoryBackend;
use record_catalog_core::backend::SearchBackend;
use record_catalog_core::models::Record;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::elasticsearch::ElasticsearchBackend;

/// Create the configured backend.
pub fn create_backend(config: &Config) -> Result<Arc<dyn SearchBackend>> {
    match config.backend.kind.as_str() {
        "memory" => {
            let backend = match &config.backend.fixtures {
                Some(path) => load_fixtures(path)?,
                None => InMemoryBackend::new(),
            };
            Ok(Arc::new(backend))
        }
        "elasticsearch" => {
            info!(url = %config.backend.url, "using elasticsearch backend");
            Ok(Arc::new(ElasticsearchBackend::new(&config.backend)?))
        }
        other => bail!("Unknown backend kind: {}", other),
    }
}

/// Load `{"<type>": [records]}` into a memory backend.
pub fn load_fixtures(path: &Path) -> Result<InMemoryBackend> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures: {}", path.display()))?;
    let fixtures: BTreeMap<String, Vec<Record>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fixtures: {}", path.display()))?;

    let backend = InMemoryBackend::new();
    for (record_type, records) in fixtures {
        info!(record_type = %record_type, records = records.len(), "loaded fixtures");
        backend.extend(&record_type, records)?;
    }
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_catalog_core::models::Filter;

    #[tokio::test]
    async fn test_load_fixtures() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(
            &path,
            r#"{"location": [
                {"id": "nypl/1", "source": "nypl", "city": "Boston"},
                {"id": "bl/2", "source": "bl", "city": "Leeds"}
            ]}"#,
        )
        .unwrap();

        let backend = load_fixtures(&path).unwrap();
        assert_eq!(backend.count("location", &[]).await.unwrap(), 2);
        let nypl = [Filter::Term {
            field: "source".into(),
            value: "nypl".into(),
        }];
        assert_eq!(backend.count("location", &nypl).await.unwrap(), 1);
    }

    #[test]
    fn test_load_fixtures_reports_bad_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let err = load_fixtures(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to parse fixtures"));
    }
}
