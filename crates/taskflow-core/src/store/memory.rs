use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::records::RecordSet;
use super::{CategoryStore, TaskStore};
use crate::error::StoreResult;
use crate::normalize::{NormalizeDefaults, normalize_categories, normalize_tasks};
use crate::task::{Category, CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch};

const SEED_JSON: &str = include_str!("../../data/seed.json");

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    categories: Vec<Value>,
    #[serde(default)]
    tasks: Vec<Value>,
}

/// Loads the bundled sample records through the normalizer.
pub fn seed_records(defaults: &NormalizeDefaults) -> StoreResult<RecordSet> {
    let seed: SeedFile = serde_json::from_str(SEED_JSON)?;
    Ok(RecordSet::new(
        normalize_tasks(seed.tasks, defaults),
        normalize_categories(seed.categories),
    ))
}

/// In-process store. Each instance owns its records; nothing is shared
/// between instances.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<RecordSet>,
    defaults: NormalizeDefaults,
    latency: Duration,
}

impl MemoryStore {
    pub fn new(records: RecordSet, defaults: NormalizeDefaults) -> Self {
        Self {
            records: Mutex::new(records),
            defaults,
            latency: Duration::ZERO,
        }
    }

    pub fn empty() -> Self {
        Self::new(RecordSet::default(), NormalizeDefaults::default())
    }

    pub fn seeded(defaults: NormalizeDefaults) -> StoreResult<Self> {
        let records = seed_records(&defaults)?;
        info!(
            tasks = records.tasks.len(),
            categories = records.categories.len(),
            "seeded memory store"
        );
        Ok(Self::new(records, defaults))
    }

    /// Delay applied before every operation, to mimic a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn snapshot(&self) -> RecordSet {
        self.records.lock().clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            debug!(ms = self.latency.as_millis() as u64, "simulating store latency");
            tokio::time::sleep(self.latency).await;
        }
    }

    fn with_records<R>(&self, f: impl FnOnce(&mut RecordSet) -> R) -> R {
        let mut records = self.records.lock();
        f(&mut records)
    }
}

impl TaskStore for MemoryStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.tasks.clone()))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.task(id).cloned()))
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        self.simulate_latency().await;
        let default_category = self.defaults.default_category.clone();
        self.with_records(|r| r.create_task(draft, &default_category, Utc::now()))
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        self.simulate_latency().await;
        self.with_records(|r| r.update_task(id, &patch, Utc::now()))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.simulate_latency().await;
        self.with_records(|r| r.delete_task(id))
    }

    async fn get_by_category(&self, category_id: &str) -> StoreResult<Vec<Task>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.tasks_in_category(category_id)))
    }

    async fn search(&self, text: &str) -> StoreResult<Vec<Task>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.search_tasks(text)))
    }
}

impl CategoryStore for MemoryStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.categories.clone()))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        self.simulate_latency().await;
        Ok(self.with_records(|r| r.category(id).cloned()))
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        self.simulate_latency().await;
        self.with_records(|r| r.create_category(draft))
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        self.simulate_latency().await;
        self.with_records(|r| r.update_category(id, &patch))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.simulate_latency().await;
        self.with_records(|r| r.delete_category(id))
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        self.simulate_latency().await;
        self.with_records(|r| r.update_task_count(id, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    #[test]
    fn seed_covers_both_record_shapes() {
        let records = seed_records(&NormalizeDefaults::default()).expect("seed parses");
        assert_eq!(records.categories.len(), 5);
        assert!(records.categories.iter().any(|c| c.id == "personal" && c.name == "Personal"));

        let answered = records.task("3").expect("task 3");
        assert_eq!(answered.category_id, "work");
        assert!(answered.completed_at.is_some());

        let drawer = records.task("8").expect("task 8");
        assert_eq!(drawer.category_id, "general");
        assert_eq!(drawer.priority, Priority::Unknown);
    }

    #[tokio::test]
    async fn instances_do_not_share_state() {
        let a = MemoryStore::seeded(NormalizeDefaults::default()).expect("seed");
        let b = MemoryStore::seeded(NormalizeDefaults::default()).expect("seed");

        TaskStore::delete(&a, "1").await.expect("delete");
        assert_eq!(TaskStore::get_all(&a).await.expect("a").len(), 7);
        assert_eq!(TaskStore::get_all(&b).await.expect("b").len(), 8);
    }

    #[tokio::test]
    async fn search_and_category_queries() {
        let store = MemoryStore::seeded(NormalizeDefaults::default()).expect("seed");
        let work = store.get_by_category("work").await.expect("by category");
        assert_eq!(work.len(), 3);
        let milk = store.search("MILK").await.expect("search");
        assert_eq!(milk.len(), 1);
        assert_eq!(milk[0].id, "5");
    }
}
