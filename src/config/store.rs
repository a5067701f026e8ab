//! Key-value persistence backing the preferences
//!
//! The on-disk format is one JSON object; each preference is a separate key so
//! a damaged value only costs that one preference.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::cell::OnceCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<Value>;

    /// Persist immediately; no batching
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

/// JSON document on disk, read lazily on first access
pub struct JsonFileStore {
    path: PathBuf,
    document: OnceCell<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            document: OnceCell::new(),
        }
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::paths::APP_DIR);
        path.push(crate::constants::paths::PREFERENCES_FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document(&self) -> &Map<String, Value> {
        self.document.get_or_init(|| read_document(&self.path))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.document().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        // The cached document only changes once the file does
        let mut document = self.document().clone();
        document.insert(key.to_string(), value);
        write_document(&self.path, &document)?;
        self.document = OnceCell::from(document);
        Ok(())
    }
}

/// Missing or unreadable files yield an empty document; defaults fill the gaps
fn read_document(path: &Path) -> Map<String, Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No preferences file yet, using defaults");
            return Map::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read preferences, using defaults");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => {
            info!(path = %path.display(), keys = map.len(), "Loaded preferences");
            map
        }
        Ok(_) => {
            warn!(path = %path.display(), "Preferences file is not a JSON object, using defaults");
            Map::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Preferences file is corrupt, using defaults");
            Map::new()
        }
    }
}

/// Write to a sibling temp file, then rename over the original
fn write_document(path: &Path, document: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create config directory: {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(document)
        .context("Failed to serialize preferences to JSON")?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .context(format!("Failed to write preferences to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .context(format!("Failed to move preferences into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    values: std::collections::HashMap<String, Value>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("preferences.json"));
        assert!(store.get("favorites").is_none());
    }

    #[test]
    fn test_set_persists_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let mut store = JsonFileStore::new(path.clone());
        store.set("min_refresh_rate", json!(75.0)).unwrap();
        store.set("show_low_resolution", json!(true)).unwrap();

        let reloaded = JsonFileStore::new(path.clone());
        assert_eq!(reloaded.get("min_refresh_rate"), Some(json!(75.0)));
        assert_eq!(reloaded.get("show_low_resolution"), Some(json!(true)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_reads_empty_and_is_replaced_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = JsonFileStore::new(path.clone());
        assert!(store.get("favorites").is_none());

        store.set("start_at_login", json!(false)).unwrap();
        let reloaded = JsonFileStore::new(path);
        assert_eq!(reloaded.get("start_at_login"), Some(json!(false)));
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let mut store = JsonFileStore::new(blocker.join("preferences.json"));
        assert!(store.set("min_refresh_rate", json!(75.0)).is_err());
        assert!(store.get("min_refresh_rate").is_none());
    }

    #[test]
    fn test_failed_write_after_load_keeps_loaded_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"min_refresh_rate": 60.0}"#).unwrap();

        let mut store = JsonFileStore::new(path.clone());
        assert_eq!(store.get("min_refresh_rate"), Some(json!(60.0)));

        // A directory where the temp file should go makes the write fail
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(store.set("min_refresh_rate", json!(120.0)).is_err());
        assert_eq!(store.get("min_refresh_rate"), Some(json!(60.0)));
    }

    #[test]
    fn test_non_object_document_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(JsonFileStore::new(path).get("favorites").is_none());
    }
}
