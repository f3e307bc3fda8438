use std::cmp::Ordering;

use tracing::trace;

use crate::task::Task;

pub const ALL_CATEGORIES: &str = "all";

/// Which slice of the task list the user is looking at.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub enum CategorySelection {
  #[default]
  All,
  Category(String)
}

impl CategorySelection {
  pub fn parse(raw: &str) -> Self {
    let trimmed = raw.trim();
    if trimmed.is_empty()
      || trimmed == ALL_CATEGORIES
    {
      Self::All
    } else {
      Self::Category(trimmed.to_string())
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      | Self::All => ALL_CATEGORIES,
      | Self::Category(id) => id
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Category(id) => {
        task.in_category(id)
      }
    }
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskFilter {
  pub category: CategorySelection,
  pub search:   String
}

impl TaskFilter {
  pub fn new(
    category: CategorySelection,
    search: impl Into<String>
  ) -> Self {
    Self {
      category,
      search: search.into()
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if !self.category.matches(task) {
      return false;
    }

    if self.search.is_empty() {
      return true;
    }

    task
      .title
      .to_lowercase()
      .contains(
        &self.search.to_lowercase()
      )
  }
}

/// Filters `tasks` by category and title search, then orders them.
///
/// Running it again over its own output yields the same sequence.
#[tracing::instrument(
  skip(tasks),
  fields(total = tasks.len())
)]
pub fn filter_sort(
  tasks: &[Task],
  filter: &TaskFilter
) -> Vec<Task> {
  let mut out: Vec<Task> = tasks
    .iter()
    .filter(|task| filter.matches(task))
    .cloned()
    .collect();

  out.sort_by(compare_tasks);
  trace!(
    kept = out.len(),
    "filtered and sorted tasks"
  );
  out
}

/// Incomplete first, then priority rank, then `order`, then id.
pub fn compare_tasks(
  a: &Task,
  b: &Task
) -> Ordering {
  a.completed
    .cmp(&b.completed)
    .then_with(|| {
      a.priority
        .rank()
        .cmp(&b.priority.rank())
    })
    .then_with(|| a.order.cmp(&b.order))
    .then_with(|| a.id.cmp(&b.id))
}
