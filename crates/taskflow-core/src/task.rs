use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const DEFAULT_CATEGORY_COLOR: &str = "#5B4EE5";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    /// A value the store handed us that is none of the three known levels.
    Unknown,
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Self::High,
            "medium" | "med" | "m" => Self::Medium,
            "low" | "l" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// Sort rank; malformed priorities go last rather than being promoted.
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
            Self::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    pub category_id: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub order: i64,
}

impl Task {
    pub fn from_draft(id: String, draft: TaskDraft, default_category: &str, order: i64, now: DateTime<Utc>) -> Self {
        let mut task = Self {
            id,
            title: draft.title.trim().to_string(),
            completed: false,
            category_id: draft
                .category_id
                .unwrap_or_else(|| default_category.to_string()),
            priority: draft.priority.unwrap_or_default(),
            due_date: draft.due_date,
            created_at: Some(now),
            completed_at: None,
            order: draft.order.unwrap_or(order),
        };
        task.set_completed(draft.completed, now);
        task
    }

    /// Flips completion and keeps `completed_at` in step with it.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(now);
        } else if !completed {
            self.completed_at = None;
        } else if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.completed = completed;
    }

    pub fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(category_id) = patch.category_id.as_ref() {
            self.category_id = category_id.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        self.set_completed(patch.completed.unwrap_or(self.completed), now);
    }

    pub fn in_category(&self, category_id: &str) -> bool {
        self.category_id == category_id
    }
}

/// Fields supplied when creating a task; the store fills in the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub order: Option<i64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::Validation(
                "task title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub category_id: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub order: Option<i64>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub task_count: u32,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Validation(
                "category name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub task_count: Option<u32>,
    pub order: Option<i64>,
}

impl Category {
    pub fn apply_patch(&mut self, patch: &CategoryPatch) {
        if let Some(name) = patch.name.as_ref() {
            self.name = name.clone();
        }
        if let Some(color) = patch.color.as_ref() {
            self.color = color.clone();
        }
        if let Some(task_count) = patch.task_count {
            self.task_count = task_count;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
    }
}

/// Lowercased, dash-joined form of a category name, used as its id.
pub fn category_slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn completion_timestamp_follows_flag() {
        let mut task = Task::from_draft("1".to_string(), TaskDraft::new("Ship it"), "general", 0, now());
        assert!(task.completed_at.is_none());

        task.apply_patch(&TaskPatch::completed(true), now());
        assert_eq!(task.completed_at, Some(now()));

        let later = now() + Duration::hours(1);
        task.apply_patch(&TaskPatch::completed(true), later);
        assert_eq!(task.completed_at, Some(now()), "re-completing keeps the first timestamp");

        task.apply_patch(&TaskPatch::completed(false), later);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn unrelated_patch_repairs_missing_completion_timestamp() {
        let mut task = Task::from_draft("1".to_string(), TaskDraft::new("done"), "general", 0, now());
        task.completed = true;
        task.completed_at = None;

        task.apply_patch(&TaskPatch::order(5), now());
        assert!(task.completed);
        assert_eq!(task.order, 5);
        assert_eq!(task.completed_at, Some(now()));

        let mut open = Task::from_draft("2".to_string(), TaskDraft::new("open"), "general", 0, now());
        open.completed_at = Some(now());
        open.apply_patch(&TaskPatch::order(1), now());
        assert!(open.completed_at.is_none());
    }

    #[test]
    fn draft_created_completed_gets_timestamp() {
        let mut draft = TaskDraft::new("  Done already ");
        draft.completed = true;
        let task = Task::from_draft("7".to_string(), draft, "general", 3, now());
        assert_eq!(task.title, "Done already");
        assert_eq!(task.completed_at, Some(now()));
        assert_eq!(task.order, 3);
        assert_eq!(task.category_id, "general");
    }

    #[test]
    fn whitespace_title_is_rejected() {
        assert!(TaskDraft::new("   ").validate().is_err());
        assert!(TaskDraft::new("x").validate().is_ok());
    }

    #[test]
    fn priority_parse_is_lenient() {
        assert_eq!(Priority::parse("HIGH"), Priority::High);
        assert_eq!(Priority::parse("l"), Priority::Low);
        assert_eq!(Priority::parse("urgent"), Priority::Unknown);
        assert!(Priority::Unknown.rank() > Priority::Low.rank());
    }

    #[test]
    fn slug_joins_words() {
        assert_eq!(category_slug("  Home  Errands "), "home-errands");
    }
}
