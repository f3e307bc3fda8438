//! Canonicalization of raw store records.
//!
//! Stores hand back records in more than one shape: the local fixtures use
//! `id`/`categoryId`/`dueDate`, the record API uses `Id`/`category_id`/
//! `due_date`, and identifiers arrive as numbers or strings. Everything that
//! enters the crate passes through here once so the rest of the code only
//! ever sees [`Task`] and [`Category`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::datetime::parse_timestamp;
use crate::task::{Category, DEFAULT_CATEGORY_COLOR, Priority, Task};

#[derive(Debug, Clone)]
pub struct NormalizeDefaults {
    pub default_category: String,
}

impl Default for NormalizeDefaults {
    fn default() -> Self {
        Self {
            default_category: "general".to_string(),
        }
    }
}

/// Looks a field up under its internal spelling first, then the external one.
/// `null` counts as absent.
fn field<'a>(raw: &'a Map<String, Value>, internal: &str, external: &str) -> Option<&'a Value> {
    raw.get(internal)
        .filter(|v| !v.is_null())
        .or_else(|| raw.get(external).filter(|v| !v.is_null()))
}

/// Renders an identifier-like value as a string; `3`, `3.0` and `"3"` all
/// become `"3"`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 9.0e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

pub fn normalize_task(raw: &Map<String, Value>, defaults: &NormalizeDefaults) -> Task {
    let id = field(raw, "id", "Id")
        .and_then(value_to_string)
        .unwrap_or_else(|| {
            warn!(?raw, "task record has no id");
            String::new()
        });

    let title = field(raw, "title", "Title")
        .and_then(value_to_string)
        .unwrap_or_default();

    let completed = field(raw, "completed", "Completed")
        .and_then(value_to_bool)
        .unwrap_or(false);

    let category_id = field(raw, "categoryId", "category_id")
        .and_then(value_to_string)
        .unwrap_or_else(|| defaults.default_category.clone());

    let priority = match field(raw, "priority", "Priority") {
        Some(Value::String(s)) => Priority::parse(s),
        Some(other) => {
            trace!(id = %id, value = %other, "non-string priority");
            Priority::Unknown
        }
        None => Priority::Medium,
    };

    let due_date = field(raw, "dueDate", "due_date").and_then(value_to_timestamp);
    let created_at = field(raw, "createdAt", "created_at").and_then(value_to_timestamp);
    let mut completed_at = field(raw, "completedAt", "completed_at").and_then(value_to_timestamp);

    if !completed && completed_at.is_some() {
        trace!(id = %id, "clearing stale completion timestamp");
        completed_at = None;
    } else if completed && completed_at.is_none() {
        trace!(id = %id, "completed record has no completion timestamp");
        completed_at = Some(created_at.unwrap_or_else(Utc::now));
    }

    let order = field(raw, "order", "Order")
        .and_then(value_to_i64)
        .unwrap_or(0);

    Task {
        id,
        title,
        completed,
        category_id,
        priority,
        due_date,
        created_at,
        completed_at,
        order,
    }
}

pub fn normalize_category(raw: &Map<String, Value>) -> Category {
    let id = field(raw, "id", "Id")
        .and_then(value_to_string)
        .unwrap_or_default();

    let name = field(raw, "name", "Name")
        .and_then(value_to_string)
        .unwrap_or_else(|| id.clone());

    let color = field(raw, "color", "Color")
        .and_then(value_to_string)
        .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string());

    let task_count = field(raw, "taskCount", "task_count")
        .and_then(value_to_i64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    let order = field(raw, "order", "Order")
        .and_then(value_to_i64)
        .unwrap_or(0);

    Category {
        id,
        name,
        color,
        task_count,
        order,
    }
}

/// Normalizes a batch, skipping anything that is not a JSON object.
pub fn normalize_tasks<I>(values: I, defaults: &NormalizeDefaults) -> Vec<Task>
where
    I: IntoIterator<Item = Value>,
{
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(normalize_task(&map, defaults)),
            other => {
                warn!(record = %other, "skipping non-object task record");
                None
            }
        })
        .collect()
}

pub fn normalize_categories<I>(values: I) -> Vec<Category>
where
    I: IntoIterator<Item = Value>,
{
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(normalize_category(&map)),
            other => {
                warn!(record = %other, "skipping non-object category record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn external_shape_is_reconciled() {
        let task = normalize_task(
            &obj(json!({
                "Id": 12,
                "title": "Pay rent",
                "completed": true,
                "category_id": 3,
                "priority": "high",
                "due_date": "2026-03-05T10:00:00Z",
                "created_at": "2026-03-01T08:00:00Z",
                "completed_at": "2026-03-02T08:00:00Z",
                "order": 4
            })),
            &NormalizeDefaults::default(),
        );

        assert_eq!(task.id, "12");
        assert_eq!(task.category_id, "3");
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
        assert!(task.completed_at.is_some());
        assert!(task.due_date.is_some());
        assert_eq!(task.order, 4);
    }

    #[test]
    fn internal_spelling_wins_on_conflict() {
        let task = normalize_task(
            &obj(json!({
                "id": "a1",
                "Id": 99,
                "title": "x",
                "categoryId": "work",
                "category_id": 7
            })),
            &NormalizeDefaults::default(),
        );
        assert_eq!(task.id, "a1");
        assert_eq!(task.category_id, "work");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let defaults = NormalizeDefaults {
            default_category: "inbox".to_string(),
        };
        let task = normalize_task(&obj(json!({ "Id": 1, "title": "bare", "category_id": null })), &defaults);
        assert_eq!(task.category_id, "inbox");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.order, 0);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn unrecognized_priority_is_kept_as_unknown() {
        let task = normalize_task(
            &obj(json!({ "id": 1, "title": "t", "priority": "URGENT!!" })),
            &NormalizeDefaults::default(),
        );
        assert_eq!(task.priority, Priority::Unknown);
    }

    #[test]
    fn stale_completion_timestamp_is_cleared() {
        let task = normalize_task(
            &obj(json!({
                "id": 1,
                "title": "t",
                "completed": "false",
                "completedAt": "2026-03-02T08:00:00Z"
            })),
            &NormalizeDefaults::default(),
        );
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn completed_record_without_timestamp_gets_one() {
        let task = normalize_task(
            &obj(json!({
                "id": 1,
                "title": "done",
                "completed": true,
                "created_at": "2026-03-01T10:00:00Z"
            })),
            &NormalizeDefaults::default(),
        );
        assert!(task.completed);
        assert_eq!(task.completed_at, task.created_at);
        assert!(task.completed_at.is_some());

        let bare = normalize_task(
            &obj(json!({"id": 2, "title": "done", "completed": true})),
            &NormalizeDefaults::default(),
        );
        assert!(bare.completed_at.is_some());
    }

    #[test]
    fn category_shapes_and_fallback_color() {
        let category = normalize_category(&obj(json!({ "Id": 3, "Name": "Work", "task_count": 5 })));
        assert_eq!(category.id, "3");
        assert_eq!(category.name, "Work");
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(category.task_count, 5);
    }

    #[test]
    fn non_objects_are_skipped() {
        let tasks = normalize_tasks(
            vec![json!(1), json!({ "id": 2, "title": "ok" }), json!("nope")],
            &NormalizeDefaults::default(),
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "2");
    }

    #[test]
    fn float_ids_render_as_integers() {
        assert_eq!(value_to_string(&json!(3.0)), Some("3".to_string()));
        assert_eq!(value_to_string(&json!("  ")), None);
    }
}
