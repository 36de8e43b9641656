//! Flag sources
//!
//! A source returns every flag row it knows about in one call. The store never
//! merges rows from different sources, so a source either succeeds wholesale
//! or fails.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Transport and decoding failures while reading flags
#[derive(Debug, Clone, Error)]
pub enum FlagSourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode flag rows: {0}")]
    Decode(String),

    #[error("Flag fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Flag source returned no rows")]
    Empty,

    #[error("Flag source unavailable: {0}")]
    Unavailable(String),

    #[error("Flag source '{0}' is read-only")]
    ReadOnly(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// One row of the flag table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRow {
    #[serde(alias = "flag_name")]
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl FlagRow {
    pub fn new(name: impl Into<String>, enabled: bool, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled,
            description: Some(description.into()),
        }
    }
}

/// Somewhere flag rows can be loaded from
#[async_trait::async_trait]
pub trait FlagSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch every flag row
    async fn fetch_all(&self) -> Result<Vec<FlagRow>, FlagSourceError>;

    /// Insert or update one row. Sources are read-only unless they override this.
    async fn upsert(&self, _row: &FlagRow) -> Result<(), FlagSourceError> {
        Err(FlagSourceError::ReadOnly(self.name().to_string()))
    }
}

// ============================================================================
// Local JSON fallback
// ============================================================================

/// Entry shape in the fallback file: `{ "<name>": { "enabled": .., "description": .. } }`
#[derive(Debug, Deserialize)]
struct FallbackEntry {
    enabled: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Reads the local fallback table from a JSON file
pub struct FileFlagSource {
    path: PathBuf,
}

impl FileFlagSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse fallback JSON text into rows (sorted by name)
    pub fn parse(text: &str) -> Result<Vec<FlagRow>, FlagSourceError> {
        let entries: BTreeMap<String, FallbackEntry> =
            serde_json::from_str(text).map_err(|e| FlagSourceError::Decode(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|(name, entry)| FlagRow {
                name,
                enabled: entry.enabled,
                description: entry.description,
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl FlagSource for FileFlagSource {
    fn name(&self) -> &str {
        "local-json"
    }

    async fn fetch_all(&self) -> Result<Vec<FlagRow>, FlagSourceError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            FlagSourceError::Io(format!("{}: {}", self.path.display(), e))
        })?;
        Self::parse(&text)
    }
}

// ============================================================================
// In-memory source (for embedding and testing)
// ============================================================================

/// Writable in-memory flag table
pub struct StaticFlagSource {
    rows: RwLock<Vec<FlagRow>>,
}

impl StaticFlagSource {
    pub fn new(rows: Vec<FlagRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait::async_trait]
impl FlagSource for StaticFlagSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_all(&self) -> Result<Vec<FlagRow>, FlagSourceError> {
        Ok(self.rows.read().await.clone())
    }

    async fn upsert(&self, row: &FlagRow) -> Result<(), FlagSourceError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|r| r.name == row.name) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fallback_json() {
        let rows = FileFlagSource::parse(
            r#"{
                "hifeed_enabled": { "enabled": false, "description": "Feed" },
                "referrals_enabled": { "enabled": true }
            }"#,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "hifeed_enabled");
        assert!(!rows[0].enabled);
        assert_eq!(rows[0].description.as_deref(), Some("Feed"));
        assert!(rows[1].enabled);
        assert!(rows[1].description.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            FileFlagSource::parse("[1, 2, 3]"),
            Err(FlagSourceError::Decode(_))
        ));
    }

    #[test]
    fn test_row_accepts_remote_column_name() {
        let row: FlagRow =
            serde_json::from_str(r#"{"flag_name": "hi_map_animation", "enabled": true, "description": null}"#)
                .unwrap();
        assert_eq!(row.name, "hi_map_animation");
        assert!(row.description.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let source = FileFlagSource::new("/nonexistent/hi-gate/flags.json");
        assert!(matches!(source.fetch_all().await, Err(FlagSourceError::Io(_))));
    }

    #[tokio::test]
    async fn test_static_source_upsert() {
        let source = StaticFlagSource::new(vec![FlagRow::new("a", false, "A")]);
        source.upsert(&FlagRow::new("a", true, "A")).await.unwrap();
        source.upsert(&FlagRow::new("b", true, "B")).await.unwrap();

        let rows = source.fetch_all().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.enabled));
    }
}
