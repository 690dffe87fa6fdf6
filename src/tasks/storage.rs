use super::types::Task;
use crate::shared::errors::StorageError;
use crate::shared::paths::ensure_dir;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

// ============================================================================
// Storage Slots
// ============================================================================

/// A single key-value slot holding one serialized document.
pub trait DocumentSlot {
    /// Returns `None` when nothing has been stored yet.
    fn read(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the whole document.
    fn write(&self, contents: &str) -> Result<(), StorageError>;
}

/// Slot backed by one JSON file, replaced atomically via temp file + rename.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentSlot for FileSlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&self.path)?))
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                ensure_dir(dir).map_err(|e| {
                    StorageError::directory(format!("{}: {}", dir.display(), e))
                })?;
            }
        }

        let temp = self.temp_path();
        std::fs::write(&temp, contents)?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::trace!(
            target: "tasks::storage",
            path = %self.path.display(),
            bytes = contents.len(),
            "Replaced task document"
        );
        Ok(())
    }
}

/// In-process slot. Clones share the same document.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Rc<RefCell<Option<String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        let slot = Self::default();
        *slot.contents.borrow_mut() = Some(contents.into());
        slot
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }

    /// Makes subsequent writes fail, as a full disk or exceeded quota would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl DocumentSlot for MemorySlot {
    fn read(&self) -> Result<Option<String>, StorageError> {
        Ok(self.contents.borrow().clone())
    }

    fn write(&self, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "storage quota exceeded",
            )));
        }
        *self.contents.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}

// ============================================================================
// Persistence Adapter
// ============================================================================

/// Maps the task collection to and from one JSON array in a slot.
#[derive(Debug, Clone)]
pub struct TaskPersistence<S> {
    slot: S,
    pretty: bool,
}

impl<S: DocumentSlot> TaskPersistence<S> {
    pub fn new(slot: S) -> Self {
        Self {
            slot,
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Loads the stored collection. Never fails: a missing or unreadable
    /// document is an empty collection.
    pub fn load(&self) -> Vec<Task> {
        let contents = match self.slot.read() {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::info!(target: "tasks::storage", "No stored tasks, starting empty");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(target: "tasks::storage", "Could not read stored tasks: {}", e);
                return Vec::new();
            }
        };

        let tasks = decode_document(&contents);
        tracing::info!(target: "tasks::storage", "Loaded {} tasks", tasks.len());
        tasks
    }

    /// Serializes and replaces the whole document.
    pub fn save(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let contents = if self.pretty {
            serde_json::to_string_pretty(tasks)?
        } else {
            serde_json::to_string(tasks)?
        };
        self.slot.write(&contents)
    }
}

fn decode_document(contents: &str) -> Vec<Task> {
    let entries = match serde_json::from_str::<serde_json::Value>(contents) {
        Ok(serde_json::Value::Array(entries)) => entries,
        Ok(_) => {
            tracing::warn!(target: "tasks::storage", "Stored tasks are not an array, ignoring");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(target: "tasks::storage", "Stored tasks are not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let mut tasks = Vec::with_capacity(entries.len());
    let mut seen_ids = HashSet::new();
    let mut migrated = 0;

    for (index, mut entry) in entries.into_iter().enumerate() {
        if migrate_entry(&mut entry) {
            migrated += 1;
        }

        let mut task: Task = match serde_json::from_value(entry) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(
                    target: "tasks::storage",
                    index = index,
                    "Skipping undecodable task entry: {}",
                    e
                );
                continue;
            }
        };

        if !seen_ids.insert(task.id.clone()) {
            tracing::warn!(
                target: "tasks::storage",
                id = %task.id,
                "Skipping task with duplicate id"
            );
            continue;
        }

        dedupe_subtasks(&mut task);
        tasks.push(task);
    }

    if migrated > 0 {
        tracing::info!(
            target: "tasks::storage",
            "Migrated {} legacy tasks without subtasks",
            migrated
        );
    }

    tasks
}

/// Drops a null `subtasks` so it decodes like a missing one. Returns true
/// when the entry predates subtasks.
fn migrate_entry(entry: &mut serde_json::Value) -> bool {
    let Some(object) = entry.as_object_mut() else {
        return false;
    };
    match object.get("subtasks") {
        None => true,
        Some(serde_json::Value::Null) => {
            object.remove("subtasks");
            true
        }
        Some(_) => false,
    }
}

/// Keeps the first subtask for each id.
pub(crate) fn dedupe_subtasks(task: &mut Task) {
    let mut seen = HashSet::new();
    task.subtasks.retain(|subtask| seen.insert(subtask.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_TASK: &str = r#"[{
        "id": "legacy1",
        "title": "Old task",
        "completed": false,
        "priority": "low",
        "category": "study",
        "createdAt": "2023-01-01T00:00:00.000Z",
        "updatedAt": "2023-01-01T00:00:00.000Z"
    }]"#;

    #[test]
    fn test_missing_document_loads_empty() {
        let persistence = TaskPersistence::new(MemorySlot::new());
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn test_garbage_document_loads_empty() {
        let persistence = TaskPersistence::new(MemorySlot::with_contents("{not json"));
        assert!(persistence.load().is_empty());

        let persistence = TaskPersistence::new(MemorySlot::with_contents(r#"{"id":"x"}"#));
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn test_legacy_task_gets_empty_subtasks() {
        let persistence = TaskPersistence::new(MemorySlot::with_contents(LEGACY_TASK));
        let tasks = persistence.load();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].subtasks.is_empty());
    }

    #[test]
    fn test_null_subtasks_migrates() {
        let doc = LEGACY_TASK.replace(r#""completed": false,"#, r#""completed": false, "subtasks": null,"#);
        let persistence = TaskPersistence::new(MemorySlot::with_contents(doc));
        let tasks = persistence.load();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].subtasks.is_empty());
    }

    #[test]
    fn test_bad_entries_and_duplicates_are_skipped() {
        let doc = r#"[
            {"id": "a", "title": "A", "createdAt": "2024-01-01T00:00:00.000Z", "updatedAt": "2024-01-01T00:00:00.000Z"},
            {"id": "b", "title": "B", "createdAt": "yesterday", "updatedAt": "2024-01-01T00:00:00.000Z"},
            {"id": "a", "title": "A again", "createdAt": "2024-01-01T00:00:00.000Z", "updatedAt": "2024-01-01T00:00:00.000Z"},
            42
        ]"#;
        let persistence = TaskPersistence::new(MemorySlot::with_contents(doc));
        let tasks = persistence.load();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "A");
    }

    #[test]
    fn test_save_rewrites_migrated_shape() {
        let slot = MemorySlot::with_contents(LEGACY_TASK);
        let persistence = TaskPersistence::new(slot.clone());
        let tasks = persistence.load();
        persistence.save(&tasks).unwrap();

        let stored: serde_json::Value = serde_json::from_str(&slot.contents().unwrap()).unwrap();
        assert_eq!(stored[0]["subtasks"], serde_json::json!([]));
        assert_eq!(stored[0]["category"], "study");
    }

    #[test]
    fn test_file_slot_round_trip_and_no_temp_left() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("tasks.json");
        let slot = FileSlot::new(&path);

        assert!(slot.read().unwrap().is_none());

        slot.write("[]").unwrap();
        slot.write(LEGACY_TASK).unwrap();

        assert_eq!(slot.read().unwrap().as_deref(), Some(LEGACY_TASK));
        assert!(!path.with_file_name("tasks.json.tmp").exists());
    }

    #[test]
    fn test_failing_slot_reports_error() {
        let slot = MemorySlot::new();
        slot.set_fail_writes(true);
        let persistence = TaskPersistence::new(slot.clone());
        assert!(persistence.save(&[]).is_err());
        assert!(slot.contents().is_none());
    }
}
