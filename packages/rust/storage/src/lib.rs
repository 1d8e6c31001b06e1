//! Persistent run cursor.
//!
//! The [`CursorStore`] keeps the single [`Cursor`] that separates already-summarized
//! records from new ones. Saves are a full overwrite through a temp file and a
//! rename, so a crash never leaves a half-written cursor behind.
//!
//! **Read rules:**
//! - Missing file: no cursor, first run.
//! - Unreadable JSON: no cursor, logged as a warning. The next run re-processes
//!   everything rather than failing.
//! - Any other I/O failure: error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use arxivsummary_shared::{ArxivSummaryError, Cursor, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File-backed store for the run cursor.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Store backed by the JSON file at `path`. Nothing is touched until a call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cursor, if any.
    pub fn load(&self) -> Result<Option<Cursor>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cursor file, treating as first run");
                return Ok(None);
            }
            Err(e) => return Err(ArxivSummaryError::io(&self.path, e)),
        };

        match serde_json::from_str::<Cursor>(&content) {
            Ok(cursor) => {
                debug!(last_seen = %cursor.last_seen_id, "cursor loaded");
                Ok(Some(cursor))
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "cursor file is unreadable, ignoring it"
                );
                Ok(None)
            }
        }
    }

    /// Replace the persisted cursor.
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| ArxivSummaryError::io(dir, e))?;

        let content = serde_json::to_string_pretty(cursor)
            .map_err(|e| ArxivSummaryError::Storage(format!("failed to encode cursor: {e}")))?;

        let temp = dir.join(format!(".cursor-{}.tmp", Uuid::now_v7()));
        std::fs::write(&temp, content).map_err(|e| ArxivSummaryError::io(&temp, e))?;

        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(ArxivSummaryError::io(&self.path, e));
        }

        info!(
            path = %self.path.display(),
            last_seen = %cursor.last_seen_id,
            "cursor saved"
        );
        Ok(())
    }

    /// Remove the persisted cursor. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "cursor cleared");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArxivSummaryError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arxivsummary_shared::RecordId;

    fn test_store() -> CursorStore {
        let dir = std::env::temp_dir().join(format!("as_cursor_test_{}", Uuid::now_v7()));
        CursorStore::new(dir.join("last_run.json"))
    }

    #[test]
    fn missing_file_is_first_run() {
        let store = test_store();
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let store = test_store();
        let cursor = Cursor::new(RecordId::from("http://arxiv.org/abs/2503.00001v1"), 17);
        store.save(&cursor).expect("save");

        let loaded = store.load().expect("load").expect("cursor present");
        assert_eq!(loaded, cursor);
    }

    #[test]
    fn save_overwrites_previous_cursor() {
        let store = test_store();
        store
            .save(&Cursor::new(RecordId::from("old"), 1))
            .expect("first save");
        store
            .save(&Cursor::new(RecordId::from("new"), 2))
            .expect("second save");

        let loaded = store.load().expect("load").expect("cursor present");
        assert_eq!(loaded.last_seen_id.as_str(), "new");

        let dir = store.path().parent().expect("parent");
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let store = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn reads_wire_format() {
        let store = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"lastSeenId":"http://arxiv.org/abs/2503.00009v2","timestamp":"2025-03-04T08:00:00Z","totalResults":25}"#,
        )
        .unwrap();

        let cursor = store.load().expect("load").expect("cursor present");
        assert_eq!(cursor.last_seen_id.as_str(), "http://arxiv.org/abs/2503.00009v2");
        assert_eq!(cursor.count_at_save, 25);
    }

    #[test]
    fn clear_removes_cursor() {
        let store = test_store();
        assert!(!store.clear().expect("clear missing"));
        store
            .save(&Cursor::new(RecordId::from("x"), 1))
            .expect("save");
        assert!(store.clear().expect("clear"));
        assert!(store.load().expect("load").is_none());
    }
}
