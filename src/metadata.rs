//! Sidecar store for user-assigned tool names and descriptions.
//!
//! The whole document is rewritten after every mutation. Loading never fails:
//! a missing or unreadable document reads as empty, and individual malformed
//! entries are dropped.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ToolKey;
use crate::error::{Result, ToolboxError};

/// One stored entry as it appears in the JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// What the grid shows for a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub display_name: String,
    pub description: String,
}

pub struct MetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, ToolMetadata>,
    /// The document on disk could not be parsed; keep a copy before the
    /// first overwrite.
    unreadable_on_load: bool,
}

impl MetadataStore {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, unreadable) = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => (BTreeMap::new(), false),
            Ok(content) => match parse_document(&content) {
                Some(entries) => (entries, false),
                None => {
                    tracing::warn!("Ignoring unreadable tool info in {}", path.display());
                    (BTreeMap::new(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (BTreeMap::new(), false),
            Err(e) => {
                tracing::warn!("Failed to read tool info {}: {}", path.display(), e);
                let unreadable = e.kind() == std::io::ErrorKind::InvalidData;
                (BTreeMap::new(), unreadable)
            }
        };

        tracing::debug!("Loaded {} tool info entries from {}", entries.len(), path.display());
        Self {
            path,
            entries,
            unreadable_on_load: unreadable,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &ToolKey) -> bool {
        self.entries.contains_key(&key.to_string())
    }

    /// Display text for `key`, falling back to the file stem for the name.
    pub fn get(&self, key: &ToolKey) -> DisplayInfo {
        match self.entries.get(&key.to_string()) {
            Some(meta) => DisplayInfo {
                display_name: if meta.name.is_empty() {
                    key.stem()
                } else {
                    meta.name.clone()
                },
                description: meta.description.clone(),
            },
            None => DisplayInfo {
                display_name: key.stem(),
                description: String::new(),
            },
        }
    }

    /// Store a name and description, then persist.
    ///
    /// A blank name is replaced by the file stem. If the document cannot be
    /// written the in-memory entry is restored and the error returned.
    pub fn set(&mut self, key: &ToolKey, display_name: &str, description: &str) -> Result<()> {
        let name = match display_name.trim() {
            "" => key.stem(),
            trimmed => trimmed.to_string(),
        };
        let entry = ToolMetadata {
            name,
            description: description.trim().to_string(),
        };

        let id = key.to_string();
        let previous = self.entries.insert(id.clone(), entry);
        if let Err(e) = self.save() {
            match previous {
                Some(previous) => self.entries.insert(id, previous),
                None => self.entries.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Forget the stored entry for `key`. Returns whether one existed; an
    /// absent key leaves the document untouched.
    pub fn remove(&mut self, key: &ToolKey) -> Result<bool> {
        let id = key.to_string();
        let Some(previous) = self.entries.remove(&id) else {
            return Ok(false);
        };
        if let Err(e) = self.save() {
            self.entries.insert(id, previous);
            return Err(e);
        }
        Ok(true)
    }

    /// Write the whole document atomically (temp file + rename).
    pub fn save(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        if self.unreadable_on_load {
            let backup = backup_path(&self.path);
            match std::fs::rename(&self.path, &backup) {
                Ok(()) => tracing::warn!(
                    "Kept unreadable tool info as {} before overwriting",
                    backup.display()
                ),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.write_error(e)),
            }
            self.unreadable_on_load = false;
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;

        tracing::debug!("Saved {} tool info entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> ToolboxError {
        ToolboxError::MetadataWrite {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse the document, dropping entries that are not `{name, description}`
/// string records. `None` when the document itself is not a JSON object.
fn parse_document(content: &str) -> Option<BTreeMap<String, ToolMetadata>> {
    let Value::Object(map) = serde_json::from_str::<Value>(content).ok()? else {
        return None;
    };

    let entries = map
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<ToolMetadata>(value) {
            Ok(meta) => Some((key, meta)),
            Err(e) => {
                tracing::warn!("Dropping malformed tool info for {}: {}", key, e);
                None
            }
        })
        .collect();
    Some(entries)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> ToolKey {
        ToolKey::new("dev", "zeal.exe")
    }

    fn store(dir: &TempDir) -> MetadataStore {
        MetadataStore::load(dir.path().join("toolbox_data.json"))
    }

    fn read_doc(dir: &TempDir) -> Value {
        let raw = std::fs::read_to_string(dir.path().join("toolbox_data.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_defaults_without_metadata() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.is_empty());
        let info = store.get(&key());
        assert_eq!(info.display_name, "zeal");
        assert_eq!(info.description, "");
    }

    #[test]
    fn test_set_persists_whole_document() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.set(&key(), "  Zeal Docs ", " offline docs \n").unwrap();
        store.set(&ToolKey::new("net", "ping.exe"), "Ping", "").unwrap();

        let doc = read_doc(&dir);
        assert_eq!(doc["dev/zeal.exe"]["name"], "Zeal Docs");
        assert_eq!(doc["dev/zeal.exe"]["description"], "offline docs");
        assert_eq!(doc["net/ping.exe"]["name"], "Ping");

        let reloaded = MetadataStore::load(store.path());
        assert_eq!(reloaded.get(&key()).display_name, "Zeal Docs");
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_blank_name_becomes_stem() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.set(&key(), "   ", "docs").unwrap();
        assert_eq!(store.get(&key()).display_name, "zeal");
        assert_eq!(read_doc(&dir)["dev/zeal.exe"]["name"], "zeal");
    }

    #[test]
    fn test_remove_reverts_to_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.set(&key(), "Zeal", "docs").unwrap();
        assert!(store.remove(&key()).unwrap());

        let info = store.get(&key());
        assert_eq!(info.display_name, "zeal");
        assert_eq!(info.description, "");
        assert_eq!(read_doc(&dir), serde_json::json!({}));
    }

    #[test]
    fn test_remove_absent_key_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        assert!(!store.remove(&key()).unwrap());
        assert!(!dir.path().join("toolbox_data.json").exists());
    }

    #[test]
    fn test_corrupt_document_is_empty_and_recoverable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolbox_data.json");
        std::fs::write(&path, "{\"dev/zeal.exe\": {\"name\": ").unwrap();

        let mut store = MetadataStore::load(&path);
        assert!(store.is_empty());
        assert_eq!(store.get(&key()).display_name, "zeal");

        store.set(&key(), "Zeal", "").unwrap();
        assert_eq!(read_doc(&dir)["dev/zeal.exe"]["name"], "Zeal");

        let backup = std::fs::read_to_string(dir.path().join("toolbox_data.json.corrupt")).unwrap();
        assert!(backup.starts_with("{\"dev/zeal.exe\""));
    }

    #[test]
    fn test_malformed_entries_dropped_individually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolbox_data.json");
        std::fs::write(
            &path,
            r#"{
                "dev/zeal.exe": {"name": "Zeal", "description": "docs"},
                "dev/bad.exe": {"name": 42},
                "dev/worse.exe": "just a string",
                "dev/partial.exe": {"description": "no name"}
            }"#,
        )
        .unwrap();

        let store = MetadataStore::load(&path);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key()).display_name, "Zeal");
        let partial = store.get(&ToolKey::new("dev", "partial.exe"));
        assert_eq!(partial.display_name, "partial");
        assert_eq!(partial.description, "no name");
        assert!(!store.contains(&ToolKey::new("dev", "bad.exe")));
    }

    #[test]
    fn test_non_object_document_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolbox_data.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(MetadataStore::load(&path).is_empty());
    }

    #[test]
    fn test_write_failure_is_reported_and_rolled_back() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let mut store = MetadataStore::load(blocker.join("toolbox_data.json"));
        let err = store.set(&key(), "Zeal", "docs").unwrap_err();
        assert!(matches!(err, ToolboxError::MetadataWrite { .. }));
        assert!(!store.contains(&key()));
        assert_eq!(store.get(&key()).display_name, "zeal");
    }

    #[test]
    fn test_unicode_written_unescaped() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        store.set(&key(), "文档", "离线").unwrap();
        let raw = std::fs::read_to_string(dir.path().join("toolbox_data.json")).unwrap();
        assert!(raw.contains("文档"));
        assert!(raw.contains("\n  \"dev/zeal.exe\""));
    }
}
