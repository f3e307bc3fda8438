use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::datetime::{DueBucket, classify_due};
use crate::filter::{TaskFilter, filter_sort};
use crate::stats::{
    CategorySummary, category_color, category_counts, category_name, completion_percentage, priority_color,
};
use crate::task::{Category, Task};

/// One rendered line of the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    pub task: Task,
    pub category_name: Option<String>,
    pub category_color: String,
    pub priority_color: String,
    pub due: DueBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub rows: Vec<TaskRow>,
    pub total: usize,
    pub completed: usize,
    pub completion_percentage: u8,
    pub all_count: usize,
    pub categories: Vec<CategorySummary>,
    pub selected: String,
    pub search: String,
}

impl TaskView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Derives the full view from a snapshot. Never fails and never mutates.
///
/// Rows cover the filtered set; totals and category counts cover every task.
#[tracing::instrument(skip_all, fields(tasks = tasks.len(), categories = categories.len()))]
pub fn project(
    tasks: &[Task],
    categories: &[Category],
    filter: &TaskFilter,
    now: DateTime<Utc>,
    tz: &Tz,
) -> TaskView {
    let rows: Vec<TaskRow> = filter_sort(tasks, filter)
        .into_iter()
        .map(|task| TaskRow {
            category_name: category_name(categories, &task.category_id).map(str::to_string),
            category_color: category_color(categories, &task.category_id).to_string(),
            priority_color: priority_color(task.priority).to_string(),
            due: classify_due(task.due_date, now, tz),
            task,
        })
        .collect();

    let selected = filter.category.as_str().to_string();
    let view = TaskView {
        total: tasks.len(),
        completed: tasks.iter().filter(|t| t.completed).count(),
        completion_percentage: completion_percentage(tasks),
        all_count: tasks.len(),
        categories: category_counts(tasks, categories, &selected),
        selected,
        search: filter.search.clone(),
        rows,
    };

    debug!(rows = view.rows.len(), pct = view.completion_percentage, "projected task view");
    view
}
