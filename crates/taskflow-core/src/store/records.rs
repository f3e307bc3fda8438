//! Owned task/category tables shared by the local backends.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::task::{
    Category, CategoryDraft, CategoryPatch, DEFAULT_CATEGORY_COLOR, Task, TaskDraft, TaskPatch, category_slug,
};

#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
}

impl RecordSet {
    pub fn new(tasks: Vec<Task>, categories: Vec<Category>) -> Self {
        Self { tasks, categories }
    }

    pub fn next_task_id(&self) -> StoreResult<u64> {
        let max = self
            .tasks
            .iter()
            .filter_map(|t| t.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        max.checked_add(1)
            .ok_or_else(|| StoreError::Backend(format!("task id space exhausted after {max}")))
    }

    fn next_order(&self) -> StoreResult<i64> {
        following_order(self.tasks.iter().map(|t| t.order), "task")
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn create_task(&mut self, draft: TaskDraft, default_category: &str, now: DateTime<Utc>) -> StoreResult<Task> {
        draft.validate()?;
        let id = self.next_task_id()?.to_string();
        let order = match draft.order {
            Some(order) => order,
            None => self.next_order()?,
        };
        let task = Task::from_draft(id, draft, default_category, order, now);
        debug!(id = %task.id, title = %task.title, "created task");
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: &TaskPatch, now: DateTime<Utc>) -> StoreResult<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))?;
        task.apply_patch(patch, now);
        Ok(task.clone())
    }

    pub fn delete_task(&mut self, id: &str) -> StoreResult<bool> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::task_not_found(id))?;
        self.tasks.remove(idx);
        Ok(true)
    }

    pub fn tasks_in_category(&self, category_id: &str) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.in_category(category_id))
            .cloned()
            .collect()
    }

    pub fn search_tasks(&self, text: &str) -> Vec<Task> {
        let needle = text.to_lowercase();
        self.tasks
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn create_category(&mut self, draft: CategoryDraft) -> StoreResult<Category> {
        draft.validate()?;
        let id = category_slug(&draft.name);
        if self.category(&id).is_some() {
            return Err(StoreError::Validation(format!("category already exists: {id}")));
        }
        let order = match draft.order {
            Some(order) => order,
            None => following_order(self.categories.iter().map(|c| c.order), "category")?,
        };
        let category = Category {
            id,
            name: draft.name.trim().to_string(),
            color: draft.color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            task_count: 0,
            order,
        };
        self.categories.push(category.clone());
        Ok(category)
    }

    pub fn update_category(&mut self, id: &str, patch: &CategoryPatch) -> StoreResult<Category> {
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::category_not_found(id))?;
        category.apply_patch(patch);
        Ok(category.clone())
    }

    pub fn delete_category(&mut self, id: &str) -> StoreResult<bool> {
        let idx = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::category_not_found(id))?;
        self.categories.remove(idx);
        Ok(true)
    }

    pub fn update_task_count(&mut self, id: &str, count: u32) -> StoreResult<bool> {
        self.update_category(
            id,
            &CategoryPatch {
                task_count: Some(count),
                ..CategoryPatch::default()
            },
        )?;
        Ok(true)
    }
}

/// One past the largest existing order, or 0 for an empty table.
fn following_order(orders: impl Iterator<Item = i64>, kind: &str) -> StoreResult<i64> {
    match orders.max() {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend(format!("{kind} order space exhausted after {max}"))),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ErrorKind;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn ids_and_order_increase() {
        let mut records = RecordSet::default();
        let a = records.create_task(TaskDraft::new("a"), "general", now()).unwrap();
        let b = records.create_task(TaskDraft::new("b"), "general", now()).unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        assert!(b.order > a.order);
    }

    #[test]
    fn missing_ids_leave_records_untouched() {
        let mut records = RecordSet::default();
        records.create_task(TaskDraft::new("a"), "general", now()).unwrap();
        let err = records.update_task("42", &TaskPatch::completed(true), now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(records.delete_task("42").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(records.tasks.len(), 1);
        assert!(!records.tasks[0].completed);
    }

    #[test]
    fn empty_title_never_lands() {
        let mut records = RecordSet::default();
        let err = records.create_task(TaskDraft::new(" "), "general", now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(records.tasks.is_empty());
    }

    #[test]
    fn category_ids_are_slugs_and_unique() {
        let mut records = RecordSet::default();
        let created = records
            .create_category(CategoryDraft {
                name: "Side Projects".to_string(),
                ..CategoryDraft::default()
            })
            .unwrap();
        assert_eq!(created.id, "side-projects");
        assert_eq!(created.color, DEFAULT_CATEGORY_COLOR);

        let dup = records.create_category(CategoryDraft {
            name: "side projects".to_string(),
            ..CategoryDraft::default()
        });
        assert!(dup.is_err());

        assert!(records.update_task_count("side-projects", 4).unwrap());
        assert_eq!(records.categories[0].task_count, 4);
    }

    #[test]
    fn exhausted_id_or_order_is_a_backend_error() {
        let mut records = RecordSet::default();
        let mut last = records.create_task(TaskDraft::new("a"), "general", now()).unwrap();
        last.id = u64::MAX.to_string();
        records.tasks[0] = last;
        let err = records.create_task(TaskDraft::new("b"), "general", now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(records.tasks.len(), 1);

        records.tasks[0].id = "1".to_string();
        records.tasks[0].order = i64::MAX;
        let err = records.create_task(TaskDraft::new("b"), "general", now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);

        let explicit = TaskDraft {
            order: Some(0),
            ..TaskDraft::new("b")
        };
        assert_eq!(records.create_task(explicit, "general", now()).unwrap().id, "2");

        records
            .create_category(CategoryDraft {
                name: "Top".to_string(),
                order: Some(i64::MAX),
                ..CategoryDraft::default()
            })
            .unwrap();
        let err = records
            .create_category(CategoryDraft {
                name: "Next".to_string(),
                ..CategoryDraft::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[test]
    fn order_patch_keeps_completion_timestamp_consistent() {
        let raw = serde_json::json!({"id": 1, "title": "done", "completed": true});
        let task = crate::normalize::normalize_task(
            raw.as_object().unwrap(),
            &crate::normalize::NormalizeDefaults::default(),
        );
        let mut records = RecordSet::new(vec![task], Vec::new());

        let updated = records.update_task("1", &TaskPatch::order(5), now()).unwrap();
        assert!(updated.completed);
        assert!(updated.completed_at.is_some());
        assert_eq!(updated.order, 5);
    }
}
