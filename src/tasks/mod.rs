pub mod clock;
pub mod helpers;
pub mod storage;
pub mod store;
pub mod timestamp;
pub mod types;
pub mod views;

use crate::app::settings::AppSettings;
use std::path::Path;
use storage::{FileSlot, TaskPersistence};
use store::TaskStore;

/// Opens the task store backed by the document file under `storage_dir`.
pub fn init_task_store(settings: &AppSettings, storage_dir: &Path) -> TaskStore<FileSlot> {
    let slot = FileSlot::new(settings.document_path(storage_dir));
    let persistence = TaskPersistence::new(slot).pretty(settings.pretty_json);
    let store = TaskStore::new(persistence);

    tracing::info!(
        target: "tasks",
        "Task store initialized from {:?}: {} tasks",
        store.persistence().slot().path(),
        store.all_tasks().len()
    );
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::{Category, NewTask, Priority};

    #[test]
    fn test_init_task_store_uses_storage_key() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            storage_key: "work".to_string(),
            pretty_json: true,
            ..AppSettings::default()
        };

        let mut store = init_task_store(&settings, tmp.path());
        let path = store.persistence().slot().path().to_path_buf();
        assert_eq!(path, tmp.path().join("work.json"));
        assert!(store.all_tasks().is_empty());

        store.create(NewTask::new("Stored", Priority::Medium, Category::Work));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains('\n'));

        let reopened = init_task_store(&settings, tmp.path());
        assert_eq!(reopened.all_tasks().len(), 1);
        assert_eq!(reopened.all_tasks()[0].title, "Stored");
    }
}
