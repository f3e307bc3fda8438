//! The task board: one backend, the last good snapshot, the current
//! filter, and the notices produced by user intents.
//!
//! Every store call is caught here. A failure is logged, turned into a
//! [`Notice::Error`], and leaves the snapshot exactly as it was.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::filter::{CategorySelection, TaskFilter};
use crate::projection::{TaskView, project};
use crate::store::{CategoryStore, TaskStore};
use crate::task::{Category, Task, TaskDraft, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Error(m) => m,
        }
    }
}

pub struct TaskBoard<S> {
    store: S,
    tasks: Vec<Task>,
    categories: Vec<Category>,
    filter: TaskFilter,
    tz: Tz,
    notices: Vec<Notice>,
    load_error: Option<String>,
}

impl<S> TaskBoard<S>
where
    S: TaskStore + CategoryStore,
{
    pub fn new(store: S, tz: Tz) -> Self {
        Self {
            store,
            tasks: vec![],
            categories: vec![],
            filter: TaskFilter::default(),
            tz,
            notices: vec![],
            load_error: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    /// Message from the most recent failed load, cleared by a good one.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn fail(&mut self, err: &StoreError, message: &str) {
        warn!(error = %err, kind = ?err.kind(), "{message}");
        self.notices.push(Notice::Error(message.to_string()));
    }

    /// Fetches tasks and categories concurrently. Both must succeed for the
    /// snapshot to change.
    #[tracing::instrument(skip(self))]
    pub async fn load(&mut self) -> bool {
        let result = tokio::try_join!(
            TaskStore::get_all(&self.store),
            CategoryStore::get_all(&self.store)
        );

        match result {
            Ok((tasks, categories)) => {
                info!(tasks = tasks.len(), categories = categories.len(), "loaded board");
                self.tasks = tasks;
                self.categories = categories;
                self.load_error = None;
                true
            }
            Err(err) => {
                self.load_error = Some(err.to_string());
                self.fail(&err, "Failed to load tasks");
                false
            }
        }
    }

    pub fn select_category(&mut self, selection: CategorySelection) {
        self.filter.category = selection;
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.filter.search = query.into();
    }

    #[tracing::instrument(skip(self))]
    pub async fn toggle_complete(&mut self, id: &str, completed: bool) -> Option<Task> {
        match TaskStore::update(&self.store, id, TaskPatch::completed(completed)).await {
            Ok(updated) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                    *slot = updated.clone();
                }
                if completed {
                    self.notices.push(Notice::Success("Task completed!".to_string()));
                }
                Some(updated)
            }
            Err(err) => {
                self.fail(&err, "Failed to update task");
                None
            }
        }
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_task(&mut self, draft: TaskDraft) -> Option<Task> {
        if let Err(err) = draft.validate() {
            warn!(error = %err, "rejected task draft");
            self.notices.push(Notice::Error(err.to_string()));
            return None;
        }

        match TaskStore::create(&self.store, draft).await {
            Ok(task) => {
                self.tasks.push(task.clone());
                self.notices
                    .push(Notice::Success("Task created successfully!".to_string()));
                Some(task)
            }
            Err(err) => {
                self.fail(&err, "Failed to create task");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&mut self, id: &str) -> bool {
        match TaskStore::delete(&self.store, id).await {
            Ok(_) => {
                self.tasks.retain(|t| t.id != id);
                self.notices.push(Notice::Success("Task deleted".to_string()));
                true
            }
            Err(err) => {
                self.fail(&err, "Failed to delete task");
                false
            }
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> TaskView {
        project(&self.tasks, &self.categories, &self.filter, now, &self.tz)
    }
}
