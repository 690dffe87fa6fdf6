use super::types::{Subtask, Task};
use uuid::Uuid;

pub fn find_task<'a>(tasks: &'a [Task], id: &str) -> Option<&'a Task> {
    tasks.iter().find(|task| task.id == id)
}

pub fn find_task_mut<'a>(tasks: &'a mut [Task], id: &str) -> Option<&'a mut Task> {
    tasks.iter_mut().find(|task| task.id == id)
}

pub fn find_subtask_mut<'a>(task: &'a mut Task, id: &str) -> Option<&'a mut Subtask> {
    task.subtasks.iter_mut().find(|subtask| subtask.id == id)
}

/// Allocates an id not already accepted by `taken`.
pub fn generate_unique_id(taken: impl Fn(&str) -> bool) -> String {
    loop {
        let candidate = Uuid::new_v4().to_string();
        if !taken(&candidate) {
            return candidate;
        }
    }
}

/// Trimmed title, or `None` when nothing is left.
pub fn normalize_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description.and_then(normalize_title)
}
