use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::memory::seed_records;
use super::records::RecordSet;
use super::{CategoryStore, TaskStore};
use crate::error::{StoreError, StoreResult};
use crate::normalize::{NormalizeDefaults, normalize_categories, normalize_tasks};
use crate::task::{Category, CategoryDraft, CategoryPatch, Task, TaskDraft, TaskPatch};

/// JSON-lines store: one record per line in `tasks.data` and
/// `categories.data`, rewritten atomically on every mutation.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub categories_path: PathBuf,
    defaults: NormalizeDefaults,
    lock: Mutex<()>,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir, defaults))]
    pub fn open(data_dir: &Path, defaults: NormalizeDefaults) -> StoreResult<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let tasks_path = data_dir.join("tasks.data");
        let categories_path = data_dir.join("categories.data");

        if !tasks_path.exists() {
            fs::write(&tasks_path, "")?;
        }
        if !categories_path.exists() {
            let seed = seed_records(&defaults)?;
            save_jsonl_atomic(&categories_path, &seed.categories)?;
            info!(count = seed.categories.len(), "wrote starter categories");
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            categories = %categories_path.display(),
            "opened file store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            categories_path,
            defaults,
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> StoreResult<RecordSet> {
        let tasks = normalize_tasks(load_jsonl(&self.tasks_path)?, &self.defaults);
        let categories = normalize_categories(load_jsonl(&self.categories_path)?);
        Ok(RecordSet::new(tasks, categories))
    }

    fn read<R>(&self, f: impl FnOnce(&RecordSet) -> R) -> StoreResult<R> {
        let _guard = self.lock.lock();
        let records = self.load()?;
        Ok(f(&records))
    }

    /// Loads, applies `f`, and writes back only if `f` succeeded.
    fn write<R>(&self, f: impl FnOnce(&mut RecordSet) -> StoreResult<R>) -> StoreResult<R> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        let out = f(&mut records)?;
        save_jsonl_atomic(&self.tasks_path, &records.tasks)?;
        save_jsonl_atomic(&self.categories_path, &records.categories)?;
        Ok(out)
    }
}

impl TaskStore for FileStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        self.read(|r| r.tasks.clone())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        self.read(|r| r.task(id).cloned())
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        draft.validate()?;
        let default_category = self.defaults.default_category.clone();
        self.write(|r| r.create_task(draft, &default_category, Utc::now()))
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        self.write(|r| r.update_task(id, &patch, Utc::now()))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.write(|r| r.delete_task(id))
    }

    async fn get_by_category(&self, category_id: &str) -> StoreResult<Vec<Task>> {
        self.read(|r| r.tasks_in_category(category_id))
    }

    async fn search(&self, text: &str) -> StoreResult<Vec<Task>> {
        self.read(|r| r.search_tasks(text))
    }
}

impl CategoryStore for FileStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        self.read(|r| r.categories.clone())
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        self.read(|r| r.category(id).cloned())
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        self.write(|r| r.create_category(draft))
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        self.write(|r| r.update_category(id, &patch))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.write(|r| r.delete_category(id))
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        self.write(|r| r.update_task_count(id, count))
    }
}

fn load_jsonl(path: &Path) -> StoreResult<Vec<Value>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|err| {
            StoreError::Backend(format!("failed parsing {} line {}: {err}", path.display(), idx + 1))
        })?;
        out.push(value);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> StoreResult<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
