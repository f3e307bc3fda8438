//! Client for the hosted record-management API.
//!
//! The API speaks in generic "records" keyed by external field names
//! (`Id`, `category_id`, `due_date`, ...). Reads go through the normalizer;
//! writes are translated here from the canonical types.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{CategoryStore, TaskStore};
use crate::error::{StoreError, StoreResult};
use crate::normalize::{NormalizeDefaults, normalize_categories, normalize_category, normalize_task, normalize_tasks};
use crate::task::{Category, CategoryDraft, CategoryPatch, DEFAULT_CATEGORY_COLOR, Task, TaskDraft, TaskPatch};

pub const TASK_FIELDS: &[&str] = &[
    "Id",
    "title",
    "completed",
    "category_id",
    "priority",
    "due_date",
    "created_at",
    "completed_at",
    "order",
];

pub const CATEGORY_FIELDS: &[&str] = &["Id", "Name", "color", "task_count", "order"];

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhereClause {
    pub field_name: String,
    pub operator: String,
    pub values: Vec<String>,
}

impl WhereClause {
    pub fn exact(field: &str, value: &str) -> Self {
        Self {
            field_name: field.to_string(),
            operator: "ExactMatch".to_string(),
            values: vec![value.to_string()],
        }
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Self {
            field_name: field.to_string(),
            operator: "Contains".to_string(),
            values: vec![value.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    results: Option<Vec<RecordResult>>,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct RecordApiClient {
    settings: ApiSettings,
    http: Client,
}

impl RecordApiClient {
    pub fn new(settings: ApiSettings) -> StoreResult<Self> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, http })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| StoreError::Backend(format!("invalid api url {}: {err}", self.settings.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend(format!("api url cannot take a path: {}", self.settings.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, segments: &[&str], body: Option<Value>) -> StoreResult<(StatusCode, String)> {
        let url = self.url(segments)?;
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(project) = self.settings.project_id.as_deref() {
            request = request.header("X-Project-Id", project);
        }
        if let Some(key) = self.settings.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, %url, "record api request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%status, bytes = text.len(), "record api response");
        Ok((status, text))
    }

    fn parse_envelope(status: StatusCode, text: &str) -> StoreResult<Envelope> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(StoreError::Backend(format!("HTTP {status}: {}", text.trim())));
            }
            Err(err) => return Err(StoreError::Decode(err)),
        };

        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| format!("request failed with HTTP {status}"));
            warn!(%status, %message, "record api reported failure");
            return Err(StoreError::Backend(message));
        }
        Ok(envelope)
    }

    /// Unwraps per-record results; any failed record fails the whole call.
    fn record_results(envelope: Envelope, action: &str) -> StoreResult<Vec<Value>> {
        let Some(results) = envelope.results else {
            return Err(StoreError::Backend("unexpected response format".to_string()));
        };

        let failed: Vec<&RecordResult> = results.iter().filter(|r| !r.success).collect();
        if let Some(first) = failed.first() {
            warn!(failed = failed.len(), action, "record api rejected records");
            return Err(StoreError::Backend(
                first
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("failed to {action} record")),
            ));
        }

        Ok(results.into_iter().filter_map(|r| r.data).collect())
    }

    #[tracing::instrument(skip(self, fields, clauses))]
    pub async fn query(&self, table: &str, fields: &[&str], clauses: Vec<WhereClause>) -> StoreResult<Vec<Value>> {
        let mut body = json!({ "fields": fields });
        if !clauses.is_empty() {
            body["where"] = serde_json::to_value(clauses)?;
        }
        let (status, text) = self.send(Method::POST, &["tables", table, "query"], Some(body)).await?;
        let envelope = Self::parse_envelope(status, &text)?;
        match envelope.data {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(vec![]),
            Some(other) => Err(StoreError::Backend(format!("expected a record list, got {other}"))),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, table: &str, id: &str) -> StoreResult<Option<Value>> {
        let (status, text) = self
            .send(Method::GET, &["tables", table, "records", id], None)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope = Self::parse_envelope(status, &text)?;
        Ok(envelope.data.filter(|v| !v.is_null()))
    }

    #[tracing::instrument(skip(self, record))]
    pub async fn create(&self, table: &str, record: Map<String, Value>) -> StoreResult<Value> {
        let body = json!({ "records": [record] });
        let (status, text) = self.send(Method::POST, &["tables", table, "records"], Some(body)).await?;
        let envelope = Self::parse_envelope(status, &text)?;
        first_record(Self::record_results(envelope, "create")?)
    }

    #[tracing::instrument(skip(self, record))]
    pub async fn update(&self, table: &str, record: Map<String, Value>) -> StoreResult<Value> {
        let body = json!({ "records": [record] });
        let (status, text) = self.send(Method::PATCH, &["tables", table, "records"], Some(body)).await?;
        let envelope = Self::parse_envelope(status, &text)?;
        first_record(Self::record_results(envelope, "update")?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, table: &str, id: &str) -> StoreResult<bool> {
        let body = json!({ "RecordIds": [record_id(id)] });
        let (status, text) = self.send(Method::DELETE, &["tables", table, "records"], Some(body)).await?;
        let envelope = Self::parse_envelope(status, &text)?;
        if envelope.results.is_some() {
            Self::record_results(envelope, "delete")?;
        }
        Ok(true)
    }
}

fn first_record(records: Vec<Value>) -> StoreResult<Value> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Backend("response carried no record".to_string()))
}

fn as_object(value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!("expected a record object, got {other}"))),
    }
}

/// Numeric ids travel as numbers, anything else as a string.
fn record_id(id: &str) -> Value {
    id.parse::<i64>().map_or_else(|_| Value::String(id.to_string()), Value::from)
}

fn timestamp(dt: DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn optional_timestamp(dt: Option<DateTime<Utc>>) -> Value {
    dt.map_or(Value::Null, timestamp)
}

/// Canonical draft -> external record shape.
pub fn draft_to_record(draft: &TaskDraft, now: DateTime<Utc>) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("title".into(), Value::String(draft.title.trim().to_string()));
    record.insert("completed".into(), Value::Bool(draft.completed));
    record.insert(
        "category_id".into(),
        draft.category_id.as_deref().map_or(Value::Null, record_id),
    );
    record.insert(
        "priority".into(),
        Value::String(draft.priority.unwrap_or_default().as_str().to_string()),
    );
    record.insert("due_date".into(), optional_timestamp(draft.due_date));
    record.insert("created_at".into(), timestamp(now));
    record.insert(
        "completed_at".into(),
        if draft.completed { timestamp(now) } else { Value::Null },
    );
    record.insert("order".into(), Value::from(draft.order.unwrap_or(0)));
    record
}

/// Canonical patch -> external partial record. Completion also writes the
/// matching `completed_at`.
pub fn patch_to_record(id: &str, patch: &TaskPatch, now: DateTime<Utc>) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("Id".into(), record_id(id));
    if let Some(title) = patch.title.as_ref() {
        record.insert("title".into(), Value::String(title.clone()));
    }
    if let Some(category_id) = patch.category_id.as_deref() {
        record.insert("category_id".into(), record_id(category_id));
    }
    if let Some(priority) = patch.priority {
        record.insert("priority".into(), Value::String(priority.as_str().to_string()));
    }
    if let Some(due_date) = patch.due_date {
        record.insert("due_date".into(), optional_timestamp(due_date));
    }
    if let Some(order) = patch.order {
        record.insert("order".into(), Value::from(order));
    }
    match patch.completed {
        Some(true) => {
            record.insert("completed".into(), Value::Bool(true));
            record.insert("completed_at".into(), timestamp(now));
        }
        Some(false) => {
            record.insert("completed".into(), Value::Bool(false));
            record.insert("completed_at".into(), Value::Null);
        }
        None => {}
    }
    record
}

#[derive(Debug, Clone)]
pub struct RemoteTaskStore {
    client: RecordApiClient,
    table: String,
    defaults: NormalizeDefaults,
}

impl RemoteTaskStore {
    pub fn new(client: RecordApiClient, table: impl Into<String>, defaults: NormalizeDefaults) -> Self {
        Self {
            client,
            table: table.into(),
            defaults,
        }
    }

    fn to_task(&self, value: Value) -> StoreResult<Task> {
        Ok(normalize_task(&as_object(value)?, &self.defaults))
    }
}

impl TaskStore for RemoteTaskStore {
    async fn get_all(&self) -> StoreResult<Vec<Task>> {
        let records = self.client.query(&self.table, TASK_FIELDS, vec![]).await?;
        Ok(normalize_tasks(records, &self.defaults))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        match self.client.get(&self.table, id).await? {
            Some(value) => self.to_task(value).map(Some),
            None => Ok(None),
        }
    }

    async fn create(&self, draft: TaskDraft) -> StoreResult<Task> {
        draft.validate()?;
        let created = self
            .client
            .create(&self.table, draft_to_record(&draft, Utc::now()))
            .await?;
        self.to_task(created)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        let updated = self
            .client
            .update(&self.table, patch_to_record(id, &patch, Utc::now()))
            .await?;
        self.to_task(updated)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.client.delete(&self.table, id).await
    }

    async fn get_by_category(&self, category_id: &str) -> StoreResult<Vec<Task>> {
        let records = self
            .client
            .query(&self.table, TASK_FIELDS, vec![WhereClause::exact("category_id", category_id)])
            .await?;
        Ok(normalize_tasks(records, &self.defaults))
    }

    async fn search(&self, text: &str) -> StoreResult<Vec<Task>> {
        let records = self
            .client
            .query(&self.table, TASK_FIELDS, vec![WhereClause::contains("title", text)])
            .await?;
        Ok(normalize_tasks(records, &self.defaults))
    }
}

/// Categories kept in their own table on the record API.
#[derive(Debug, Clone)]
pub struct RemoteCategoryStore {
    client: RecordApiClient,
    table: String,
}

impl RemoteCategoryStore {
    pub fn new(client: RecordApiClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

fn category_patch_record(id: &str, patch: &CategoryPatch) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("Id".into(), record_id(id));
    if let Some(name) = patch.name.as_ref() {
        record.insert("Name".into(), Value::String(name.clone()));
    }
    if let Some(color) = patch.color.as_ref() {
        record.insert("color".into(), Value::String(color.clone()));
    }
    if let Some(task_count) = patch.task_count {
        record.insert("task_count".into(), Value::from(task_count));
    }
    if let Some(order) = patch.order {
        record.insert("order".into(), Value::from(order));
    }
    record
}

impl CategoryStore for RemoteCategoryStore {
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        let records = self.client.query(&self.table, CATEGORY_FIELDS, vec![]).await?;
        Ok(normalize_categories(records))
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        match self.client.get(&self.table, id).await? {
            Some(value) => Ok(Some(normalize_category(&as_object(value)?))),
            None => Ok(None),
        }
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        draft.validate()?;
        let mut record = Map::new();
        record.insert("Name".into(), Value::String(draft.name.trim().to_string()));
        record.insert(
            "color".into(),
            Value::String(draft.color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string())),
        );
        record.insert("task_count".into(), Value::from(0));
        record.insert("order".into(), Value::from(draft.order.unwrap_or(0)));
        let created = self.client.create(&self.table, record).await?;
        Ok(normalize_category(&as_object(created)?))
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        let updated = self
            .client
            .update(&self.table, category_patch_record(id, &patch))
            .await?;
        Ok(normalize_category(&as_object(updated)?))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.client.delete(&self.table, id).await
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        let patch = CategoryPatch {
            task_count: Some(count),
            ..CategoryPatch::default()
        };
        self.client
            .update(&self.table, category_patch_record(id, &patch))
            .await?;
        Ok(true)
    }
}
