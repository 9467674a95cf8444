//! Local key-value snapshot store (local chat mode).
//!
//! A JSON object file mapping string keys to values. The chat transcript lives under
//! [`TRANSCRIPT_KEY`]. Writes hold an exclusive lock on a sidecar `.lock` file and replace the
//! store atomically, so two clients on the same device never interleave partial writes.

use crate::transcript::Transcript;
use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Fixed key for the saved transcript.
pub const TRANSCRIPT_KEY: &str = "vant.chat.transcript";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".lock");
        PathBuf::from(p)
    }

    /// Read the whole store. A missing file is an empty store.
    fn read_all(&self) -> Result<Map<String, Value>, SnapshotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Ok(Map::new()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write under the store lock.
    fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        let result = (|| -> Result<(), SnapshotError> {
            let mut map = self.read_all().unwrap_or_else(|e| {
                log::warn!("discarding unreadable snapshot {}: {}", self.path.display(), e);
                Map::new()
            });
            f(&mut map);
            let tmp = self
                .path
                .with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
            std::fs::write(&tmp, serde_json::to_vec_pretty(&map)?)?;
            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        })();
        let _ = lock.unlock();
        result
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, SnapshotError> {
        Ok(self.read_all()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), SnapshotError> {
        self.update(|m| {
            m.insert(key.to_string(), value);
        })
    }

    pub fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        self.update(|m| {
            m.remove(key);
        })
    }

    /// Saved transcript, if any. An unreadable entry is treated as absent.
    pub fn load_transcript(&self) -> Option<Transcript> {
        let value = match self.get(TRANSCRIPT_KEY) {
            Ok(v) => v?,
            Err(e) => {
                log::warn!("reading snapshot {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("ignoring malformed transcript snapshot: {}", e);
                None
            }
        }
    }

    /// Save the transcript verbatim, minus thinking placeholders.
    pub fn save_transcript(&self, transcript: &Transcript) -> Result<(), SnapshotError> {
        let value = serde_json::to_value(transcript.without_placeholders())?;
        self.set(TRANSCRIPT_KEY, value)
    }

    pub fn clear_transcript(&self) -> Result<(), SnapshotError> {
        self.remove(TRANSCRIPT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::transcript::EntryBody;

    fn temp_store() -> (PathBuf, SnapshotStore) {
        let dir = std::env::temp_dir().join(format!("vant-snapshot-test-{}", uuid::Uuid::new_v4()));
        let store = SnapshotStore::new(dir.join("snapshot.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.get("anything").unwrap().is_none());
        assert!(store.load_transcript().is_none());
    }

    #[test]
    fn transcript_round_trips_without_placeholders() {
        let (dir, store) = temp_store();
        let mut t = Transcript::new();
        t.push(Role::User, "What is in the report?");
        let p = t.push_thinking();
        t.push(Role::Assistant, "**Revenue** grew.");
        store.save_transcript(&t).unwrap();

        let restored = store.load_transcript().unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.get(p).is_none());
        assert_eq!(
            restored.entries()[1].body,
            EntryBody::Markdown("**Revenue** grew.".into())
        );

        store.clear_transcript().unwrap();
        assert!(store.load_transcript().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn other_keys_survive_transcript_writes() {
        let (dir, store) = temp_store();
        store.set("theme", Value::String("dark".into())).unwrap();
        store.save_transcript(&Transcript::new()).unwrap();
        store.clear_transcript().unwrap();
        assert_eq!(store.get("theme").unwrap(), Some(Value::String("dark".into())));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_replaced_on_write() {
        let (dir, store) = temp_store();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.get(TRANSCRIPT_KEY).is_err());
        assert!(store.load_transcript().is_none());
        store.set("k", Value::Bool(true)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(Value::Bool(true)));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
