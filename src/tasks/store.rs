use super::clock::{Clock, SystemClock};
use super::helpers::{
    find_subtask_mut, find_task, find_task_mut, generate_unique_id, normalize_description,
    normalize_title,
};
use super::storage::{dedupe_subtasks, DocumentSlot, TaskPersistence};
use super::types::{NewTask, Subtask, Task, TaskFilters, TaskPatch, TaskStats};
use super::views::{compute_stats, filter_tasks};
use chrono::{DateTime, Utc};

/// Authoritative in-memory task collection plus the active filter criteria.
///
/// Mutations that target an unknown id, or carry a blank title, change
/// nothing and are not persisted. Every effective mutation is followed by a
/// best-effort save; a failed save is logged and the in-memory state stays.
pub struct TaskStore<S, C = SystemClock> {
    tasks: Vec<Task>,
    filters: TaskFilters,
    persistence: TaskPersistence<S>,
    clock: C,
}

impl<S: DocumentSlot> TaskStore<S, SystemClock> {
    pub fn new(persistence: TaskPersistence<S>) -> Self {
        Self::open(persistence, SystemClock)
    }
}

impl<S: DocumentSlot, C: Clock> TaskStore<S, C> {
    /// Loads the stored collection once, at session start.
    pub fn open(persistence: TaskPersistence<S>, clock: C) -> Self {
        let tasks = persistence.load();
        Self {
            tasks,
            filters: TaskFilters::default(),
            persistence,
            clock,
        }
    }

    pub fn persistence(&self) -> &TaskPersistence<S> {
        &self.persistence
    }

    pub fn all_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        find_task(&self.tasks, id)
    }

    pub fn filters(&self) -> &TaskFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: TaskFilters) {
        self.filters = filters;
    }

    pub fn filtered_view(&self) -> Vec<&Task> {
        filter_tasks(&self.tasks, &self.filters)
    }

    pub fn stats(&self) -> TaskStats {
        compute_stats(&self.tasks, self.clock.now())
    }

    // ------------------------------------------------------------------------
    // Task mutations
    // ------------------------------------------------------------------------

    /// Prepends a new task. Returns `None` for a blank title.
    pub fn create(&mut self, new_task: NewTask) -> Option<Task> {
        let Some(title) = normalize_title(&new_task.title) else {
            tracing::debug!(target: "tasks", "Ignoring create with blank title");
            return None;
        };

        let now = self.clock.now();
        let tasks = &self.tasks;
        let task = Task {
            id: generate_unique_id(|candidate| find_task(tasks, candidate).is_some()),
            title,
            description: normalize_description(new_task.description.as_deref()),
            completed: false,
            priority: new_task.priority,
            category: new_task.category,
            due_date: new_task.due_date,
            created_at: now,
            updated_at: now,
            subtasks: Vec::new(),
        };

        self.tasks.insert(0, task.clone());
        tracing::debug!(target: "tasks", id = %task.id, "Task created");
        self.persist();

        Some(task)
    }

    /// Merges `patch` into the task. A blank replacement title, for the task
    /// or any replacement subtask, rejects the whole patch.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> bool {
        let title = match patch.title.as_deref() {
            Some(raw) => match normalize_title(raw) {
                Some(title) => Some(title),
                None => {
                    tracing::debug!(target: "tasks", id = %id, "Ignoring update with blank title");
                    return false;
                }
            },
            None => None,
        };

        let subtasks = match patch.subtasks {
            Some(subtasks) => match normalize_subtasks(subtasks) {
                Some(subtasks) => Some(subtasks),
                None => {
                    tracing::debug!(
                        target: "tasks",
                        id = %id,
                        "Ignoring update with blank subtask title"
                    );
                    return false;
                }
            },
            None => None,
        };

        let now = self.clock.now();
        let Some(task) = find_task_mut(&mut self.tasks, id) else {
            return false;
        };

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = normalize_description(description.as_deref());
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(category) = patch.category {
            task.category = category;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(subtasks) = subtasks {
            task.subtasks = subtasks;
            dedupe_subtasks(task);
        }
        touch(task, now);

        tracing::debug!(target: "tasks", id = %id, "Task updated");
        self.persist();
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }

        tracing::debug!(target: "tasks", id = %id, "Task deleted");
        self.persist();
        true
    }

    /// Flips completion. Returns the new state, or `None` for an unknown id.
    pub fn toggle_complete(&mut self, id: &str) -> Option<bool> {
        let now = self.clock.now();
        let task = find_task_mut(&mut self.tasks, id)?;

        task.completed = !task.completed;
        touch(task, now);
        let completed = task.completed;

        tracing::debug!(target: "tasks", id = %id, completed = completed, "Task toggled");
        self.persist();
        Some(completed)
    }

    /// Moves the task at `from` to `to`, shifting the others.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.tasks.len();
        if from >= len || to >= len {
            tracing::debug!(
                target: "tasks",
                from = from,
                to = to,
                len = len,
                "Ignoring out-of-range reorder"
            );
            return false;
        }
        if from == to {
            return true;
        }

        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);

        tracing::debug!(target: "tasks", from = from, to = to, "Tasks reordered");
        self.persist();
        true
    }

    // ------------------------------------------------------------------------
    // Subtask mutations
    // ------------------------------------------------------------------------

    /// Appends a subtask. Returns `None` for an unknown task or blank title.
    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Option<Subtask> {
        let title = normalize_title(title)?;
        let now = self.clock.now();
        let task = find_task_mut(&mut self.tasks, task_id)?;

        let existing = &task.subtasks;
        let subtask = Subtask {
            id: generate_unique_id(|candidate| existing.iter().any(|s| s.id == candidate)),
            title,
            completed: false,
        };
        task.subtasks.push(subtask.clone());
        touch(task, now);

        tracing::debug!(
            target: "tasks",
            task_id = %task_id,
            subtask_id = %subtask.id,
            "Subtask created"
        );
        self.persist();
        Some(subtask)
    }

    /// Flips a subtask's completion. Returns the new state.
    pub fn toggle_subtask(&mut self, task_id: &str, subtask_id: &str) -> Option<bool> {
        let now = self.clock.now();
        let task = find_task_mut(&mut self.tasks, task_id)?;
        let subtask = find_subtask_mut(task, subtask_id)?;

        subtask.completed = !subtask.completed;
        let completed = subtask.completed;
        touch(task, now);

        tracing::debug!(
            target: "tasks",
            task_id = %task_id,
            subtask_id = %subtask_id,
            completed = completed,
            "Subtask toggled"
        );
        self.persist();
        Some(completed)
    }

    pub fn delete_subtask(&mut self, task_id: &str, subtask_id: &str) -> bool {
        let now = self.clock.now();
        let Some(task) = find_task_mut(&mut self.tasks, task_id) else {
            return false;
        };

        let before = task.subtasks.len();
        task.subtasks.retain(|s| s.id != subtask_id);
        if task.subtasks.len() == before {
            return false;
        }
        touch(task, now);

        tracing::debug!(
            target: "tasks",
            task_id = %task_id,
            subtask_id = %subtask_id,
            "Subtask deleted"
        );
        self.persist();
        true
    }

    pub fn update_subtask(&mut self, task_id: &str, subtask_id: &str, title: &str) -> bool {
        let Some(title) = normalize_title(title) else {
            return false;
        };
        let now = self.clock.now();
        let Some(task) = find_task_mut(&mut self.tasks, task_id) else {
            return false;
        };
        let Some(subtask) = find_subtask_mut(task, subtask_id) else {
            return false;
        };

        subtask.title = title;
        touch(task, now);

        tracing::debug!(
            target: "tasks",
            task_id = %task_id,
            subtask_id = %subtask_id,
            "Subtask renamed"
        );
        self.persist();
        true
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.tasks) {
            tracing::warn!(target: "tasks", "Failed to save tasks, keeping in-memory state: {}", e);
        }
    }
}

/// Trims every title; `None` if any is blank.
fn normalize_subtasks(subtasks: Vec<Subtask>) -> Option<Vec<Subtask>> {
    subtasks
        .into_iter()
        .map(|subtask| {
            Some(Subtask {
                title: normalize_title(&subtask.title)?,
                ..subtask
            })
        })
        .collect()
}

/// Refreshes `updated_at`, never moving it backwards.
fn touch(task: &mut Task, now: DateTime<Utc>) {
    if now > task.updated_at {
        task.updated_at = now;
    }
}
