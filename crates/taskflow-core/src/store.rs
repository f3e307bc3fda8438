//! Persistence seam: the task/category store contracts and the backend
//! selected by configuration.

pub mod file;
pub mod memory;
pub mod records;
pub mod remote;
pub mod tags;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::info;

use crate::config::Config;
use crate::error::StoreResult;
use crate::normalize::NormalizeDefaults;
use crate::task::{Category, CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::{ApiSettings, RecordApiClient, RemoteCategoryStore, RemoteTaskStore};
pub use tags::TagCategoryStore;

pub trait TaskStore {
    fn get_all(&self) -> impl Future<Output = StoreResult<Vec<Task>>> + Send;

    fn get_by_id(&self, id: &str) -> impl Future<Output = StoreResult<Option<Task>>> + Send;

    fn create(&self, draft: TaskDraft) -> impl Future<Output = StoreResult<Task>> + Send;

    fn update(&self, id: &str, patch: TaskPatch) -> impl Future<Output = StoreResult<Task>> + Send;

    /// Resolves to `true` once the record is gone.
    fn delete(&self, id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn get_by_category(&self, category_id: &str) -> impl Future<Output = StoreResult<Vec<Task>>> + Send;

    fn search(&self, text: &str) -> impl Future<Output = StoreResult<Vec<Task>>> + Send;

    fn reorder(&self, id: &str, order: i64) -> impl Future<Output = StoreResult<Task>> + Send {
        self.update(id, TaskPatch::order(order))
    }
}

pub trait CategoryStore {
    fn get_all(&self) -> impl Future<Output = StoreResult<Vec<Category>>> + Send;

    fn get_by_id(&self, id: &str) -> impl Future<Output = StoreResult<Option<Category>>> + Send;

    fn create(&self, draft: CategoryDraft) -> impl Future<Output = StoreResult<Category>> + Send;

    fn update(&self, id: &str, patch: CategoryPatch) -> impl Future<Output = StoreResult<Category>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    fn update_task_count(&self, id: &str, count: u32) -> impl Future<Output = StoreResult<bool>> + Send;
}

#[derive(Debug, Clone)]
pub enum RemoteCategories {
    Table(RemoteCategoryStore),
    Tags(TagCategoryStore),
}

#[derive(Debug, Clone)]
pub struct RemoteStore {
    pub tasks: RemoteTaskStore,
    pub categories: RemoteCategories,
}

/// The one store the rest of the crate talks to.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    File(FileStore),
    Remote(RemoteStore),
}

impl Backend {
    #[tracing::instrument(skip(cfg, data_dir))]
    pub fn from_config(cfg: &Config, data_dir: &Path) -> anyhow::Result<Self> {
        let defaults = NormalizeDefaults {
            default_category: cfg.default_category(),
        };
        let kind = cfg.get("backend").unwrap_or_else(|| "memory".to_string());
        info!(backend = %kind, "selecting store backend");

        match kind.to_ascii_lowercase().as_str() {
            "memory" => {
                let latency = Duration::from_millis(cfg.get_u64("memory.latency_ms")?.unwrap_or(0));
                let store = MemoryStore::seeded(defaults)
                    .context("failed to seed memory store")?
                    .with_latency(latency);
                Ok(Self::Memory(store))
            }
            "file" => {
                let store = FileStore::open(data_dir, defaults)
                    .with_context(|| format!("failed to open file store at {}", data_dir.display()))?;
                Ok(Self::File(store))
            }
            "remote" => {
                let base_url = cfg
                    .get("api.url")
                    .ok_or_else(|| anyhow!("backend=remote requires api.url"))?;
                let settings = ApiSettings {
                    base_url,
                    project_id: cfg.get("api.project"),
                    api_key: cfg.get("api.key"),
                    timeout: Duration::from_secs(cfg.get_u64("api.timeout_secs")?.unwrap_or(30)),
                };
                let client = RecordApiClient::new(settings).context("failed building record API client")?;
                let tasks = RemoteTaskStore::new(
                    client.clone(),
                    cfg.get_or("api.task_table", "task"),
                    defaults,
                );

                let source = cfg.get_or("categories.source", "tags");
                let categories = match source.as_str() {
                    "table" => RemoteCategories::Table(RemoteCategoryStore::new(
                        client,
                        cfg.get_or("api.category_table", "category"),
                    )),
                    "tags" => RemoteCategories::Tags(TagCategoryStore::new(
                        client,
                        cfg.get_or("api.tag_table", "Test"),
                        cfg.get_or("api.tag_field", "Tags"),
                    )),
                    other => return Err(anyhow!("invalid categories.source: {other}")),
                };
                Ok(Self::Remote(RemoteStore { tasks, categories }))
            }
            other => Err(anyhow!("unknown backend: {other}")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::Remote(_) => "remote",
        }
    }
}

impl TaskStore for Backend {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        match self {
            Self::Memory(s) => TaskStore::get_all(s).await,
            Self::File(s) => TaskStore::get_all(s).await,
            Self::Remote(s) => s.tasks.get_all().await,
        }
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        match self {
            Self::Memory(s) => TaskStore::get_by_id(s, id).await,
            Self::File(s) => TaskStore::get_by_id(s, id).await,
            Self::Remote(s) => s.tasks.get_by_id(id).await,
        }
    }

    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        match self {
            Self::Memory(s) => TaskStore::create(s, draft).await,
            Self::File(s) => TaskStore::create(s, draft).await,
            Self::Remote(s) => s.tasks.create(draft).await,
        }
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        match self {
            Self::Memory(s) => TaskStore::update(s, id, patch).await,
            Self::File(s) => TaskStore::update(s, id, patch).await,
            Self::Remote(s) => s.tasks.update(id, patch).await,
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        match self {
            Self::Memory(s) => TaskStore::delete(s, id).await,
            Self::File(s) => TaskStore::delete(s, id).await,
            Self::Remote(s) => s.tasks.delete(id).await,
        }
    }

    async fn get_by_category(&self, category_id: &str) -> StoreResult<Vec<Task>> {
        match self {
            Self::Memory(s) => s.get_by_category(category_id).await,
            Self::File(s) => s.get_by_category(category_id).await,
            Self::Remote(s) => s.tasks.get_by_category(category_id).await,
        }
    }

    async fn search(&self, text: &str) -> StoreResult<Vec<Task>> {
        match self {
            Self::Memory(s) => s.search(text).await,
            Self::File(s) => s.search(text).await,
            Self::Remote(s) => s.tasks.search(text).await,
        }
    }
}

impl CategoryStore for RemoteCategories {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        match self {
            Self::Table(s) => s.get_all().await,
            Self::Tags(s) => s.get_all().await,
        }
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        match self {
            Self::Table(s) => s.get_by_id(id).await,
            Self::Tags(s) => s.get_by_id(id).await,
        }
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        match self {
            Self::Table(s) => s.create(draft).await,
            Self::Tags(s) => s.create(draft).await,
        }
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        match self {
            Self::Table(s) => s.update(id, patch).await,
            Self::Tags(s) => s.update(id, patch).await,
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        match self {
            Self::Table(s) => s.delete(id).await,
            Self::Tags(s) => s.delete(id).await,
        }
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        match self {
            Self::Table(s) => s.update_task_count(id, count).await,
            Self::Tags(s) => s.update_task_count(id, count).await,
        }
    }
}

impl CategoryStore for Backend {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        match self {
            Self::Memory(s) => CategoryStore::get_all(s).await,
            Self::File(s) => CategoryStore::get_all(s).await,
            Self::Remote(s) => s.categories.get_all().await,
        }
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        match self {
            Self::Memory(s) => CategoryStore::get_by_id(s, id).await,
            Self::File(s) => CategoryStore::get_by_id(s, id).await,
            Self::Remote(s) => s.categories.get_by_id(id).await,
        }
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        match self {
            Self::Memory(s) => CategoryStore::create(s, draft).await,
            Self::File(s) => CategoryStore::create(s, draft).await,
            Self::Remote(s) => s.categories.create(draft).await,
        }
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        match self {
            Self::Memory(s) => CategoryStore::update(s, id, patch).await,
            Self::File(s) => CategoryStore::update(s, id, patch).await,
            Self::Remote(s) => s.categories.update(id, patch).await,
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        match self {
            Self::Memory(s) => CategoryStore::delete(s, id).await,
            Self::File(s) => CategoryStore::delete(s, id).await,
            Self::Remote(s) => s.categories.delete(id).await,
        }
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        match self {
            Self::Memory(s) => s.update_task_count(id, count).await,
            Self::File(s) => s.update_task_count(id, count).await,
            Self::Remote(s) => s.categories.update_task_count(id, count).await,
        }
    }
}
