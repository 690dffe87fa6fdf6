pub mod app;
pub mod shared;
pub mod tasks;

use serde::Serialize;
use shared::paths::{get_log_dir, get_storage_dir};
use tasks::types::{Task, TaskFilters, TaskStats};

/// Snapshot handed to whatever renders the tasks.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview<'a> {
    pub filters: &'a TaskFilters,
    pub stats: TaskStats,
    pub completion_rate: u32,
    pub tasks: Vec<&'a Task>,
}

/// Loads settings, starts logging and opens the store, then prints an
/// overview of the stored tasks as JSON.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Falls back to defaults on its own; logging needs its level first.
    let settings = app::settings::load_settings();

    // Held until the end of `run` so buffered log lines are flushed.
    let _logging = app::logging::init_logging(&get_log_dir(), &settings.log_level)?;
    tracing::info!(
        target: "system",
        storage_key = %settings.storage_key,
        log_level = %settings.log_level,
        "Using settings"
    );

    let store = tasks::init_task_store(&settings, &get_storage_dir());
    let stats = store.stats();
    let overview = Overview {
        filters: store.filters(),
        stats,
        completion_rate: stats.completion_rate(),
        tasks: store.filtered_view(),
    };

    println!("{}", serde_json::to_string_pretty(&overview)?);
    Ok(())
}
