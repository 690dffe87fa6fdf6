//! Derived read views: filtering, aggregate stats and due-date classification.
//!
//! Everything here is a pure function of the tasks passed in.

use super::types::{DueStatus, Task, TaskFilters, TaskStats};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Applies status, then category, then search. All three must match.
pub fn filter_tasks<'a>(tasks: &'a [Task], filters: &TaskFilters) -> Vec<&'a Task> {
    let needle = filters.search.to_lowercase();

    tasks
        .iter()
        .filter(|task| filters.status.matches(task.completed))
        .filter(|task| filters.category.matches(task.category))
        .filter(|task| needle.is_empty() || matches_search(task, &needle))
        .collect()
}

/// `needle` must already be lowercase.
fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < now)
}

/// Counts over the whole collection, never the filtered view.
pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let completed = tasks.iter().filter(|t| t.completed).count();

    TaskStats {
        total: tasks.len(),
        completed,
        active: tasks.len() - completed,
        overdue: tasks.iter().filter(|t| is_overdue(t, now)).count(),
    }
}

/// Classifies a due date relative to `now`, with "today" taken in `now`'s
/// time zone. Tasks without a due date, and completed tasks, are `Normal`.
pub fn due_status<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> DueStatus {
    let Some(due) = task.due_date else {
        return DueStatus::Normal;
    };
    if task.completed {
        return DueStatus::Normal;
    }

    let today = now.date_naive();
    let due_day = due.with_timezone(&now.timezone()).date_naive();
    let is_today = due_day == today;
    let is_tomorrow = today.succ_opt() == Some(due_day);

    if due < now.with_timezone(&Utc) && !is_today {
        DueStatus::Overdue
    } else if is_today || is_tomorrow {
        DueStatus::DueSoon
    } else {
        DueStatus::Normal
    }
}

/// Short human label for a due date: `Today`, `Tomorrow`, a weekday name
/// within the coming week, otherwise `Mon D`.
pub fn due_label<Tz: TimeZone>(due: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let local_due = due.with_timezone(&now.timezone());
    let today = now.date_naive();
    let due_day = local_due.date_naive();

    if due_day == today {
        return "Today".to_string();
    }
    if today.succ_opt() == Some(due_day) {
        return "Tomorrow".to_string();
    }

    // Whole days between the two instants, truncated toward zero.
    let days_until = (due - now.with_timezone(&Utc)).num_days();
    if days_until > 0 && days_until <= 7 {
        return local_due.format("%A").to_string();
    }

    format_month_day(due_day)
}

fn format_month_day(day: NaiveDate) -> String {
    format!("{} {}", day.format("%b"), day.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::{Category, CategoryFilter, FilterStatus, Priority};
    use chrono::FixedOffset;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn task(id: &str, title: &str) -> Task {
        let created = at(2024, 5, 1, 8);
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            completed: false,
            priority: Priority::Medium,
            category: Category::Personal,
            due_date: None,
            created_at: created,
            updated_at: created,
            subtasks: Vec::new(),
        }
    }

    #[test]
    fn test_search_is_case_insensitive_on_title_and_description() {
        let mut a = task("a", "Buy MILK");
        a.description = None;
        let mut b = task("b", "Groceries");
        b.description = Some("milk and eggs".to_string());
        let c = task("c", "Call mom");
        let tasks = vec![a, b, c];

        let filters = TaskFilters {
            search: "Milk".to_string(),
            ..TaskFilters::default()
        };
        let ids: Vec<&str> = filter_tasks(&tasks, &filters)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let mut work_done = task("1", "Report");
        work_done.category = Category::Work;
        work_done.completed = true;
        let mut work_open = task("2", "Report draft");
        work_open.category = Category::Work;
        let home_open = task("3", "Report to landlord");
        let tasks = vec![work_done, work_open, home_open];

        let filters = TaskFilters {
            status: FilterStatus::Active,
            category: CategoryFilter::Work,
            search: "report".to_string(),
        };
        let result = filter_tasks(&tasks, &filters);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "2");
    }

    #[test]
    fn test_stats_counts_overdue_on_active_only() {
        let now = at(2024, 5, 10, 12);
        let mut late = task("late", "late");
        late.due_date = Some(at(2024, 5, 9, 12));
        let mut late_done = task("done", "done");
        late_done.due_date = Some(at(2024, 5, 9, 12));
        late_done.completed = true;
        let mut future = task("future", "future");
        future.due_date = Some(at(2024, 5, 11, 12));

        let stats = compute_stats(&[late, late_done, future], now);
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                completed: 1,
                active: 2,
                overdue: 1
            }
        );
    }

    #[test]
    fn test_due_status_today_is_due_soon_even_if_past() {
        let now = at(2024, 5, 10, 15);
        let mut t = task("t", "t");
        t.due_date = Some(at(2024, 5, 10, 9));
        assert_eq!(due_status(&t, &now), DueStatus::DueSoon);
        // Still counted as overdue by stats, which compares instants.
        assert!(is_overdue(&t, now));
    }

    #[test]
    fn test_due_status_classification() {
        let now = at(2024, 5, 10, 12);
        let mut t = task("t", "t");

        assert_eq!(due_status(&t, &now), DueStatus::Normal);

        t.due_date = Some(at(2024, 5, 9, 12));
        assert_eq!(due_status(&t, &now), DueStatus::Overdue);

        t.due_date = Some(at(2024, 5, 11, 20));
        assert_eq!(due_status(&t, &now), DueStatus::DueSoon);

        t.due_date = Some(at(2024, 5, 13, 12));
        assert_eq!(due_status(&t, &now), DueStatus::Normal);

        t.due_date = Some(at(2024, 5, 1, 12));
        t.completed = true;
        assert_eq!(due_status(&t, &now), DueStatus::Normal);
    }

    #[test]
    fn test_due_status_uses_callers_time_zone() {
        // 23:00 UTC on the 9th is already the 10th in UTC+2.
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = at(2024, 5, 10, 12).with_timezone(&offset);
        let mut t = task("t", "t");
        t.due_date = Some(at(2024, 5, 9, 23));
        assert_eq!(due_status(&t, &now), DueStatus::DueSoon);
        assert_eq!(due_status(&t, &at(2024, 5, 10, 12)), DueStatus::Overdue);
    }

    #[test]
    fn test_due_label() {
        let now = at(2024, 5, 10, 12); // Friday
        assert_eq!(due_label(at(2024, 5, 10, 18), &now), "Today");
        assert_eq!(due_label(at(2024, 5, 11, 18), &now), "Tomorrow");
        assert_eq!(due_label(at(2024, 5, 14, 18), &now), "Tuesday");
        assert_eq!(due_label(at(2024, 5, 30, 18), &now), "May 30");
        assert_eq!(due_label(at(2024, 5, 2, 18), &now), "May 2");
    }
}
