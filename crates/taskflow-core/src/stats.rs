//! Summary numbers and color lookups derived from a task snapshot.

use serde::Serialize;

use crate::task::{Category, DEFAULT_CATEGORY_COLOR, Priority, Task};

pub const NEUTRAL_PRIORITY_COLOR: &str = "#9CA3AF";

/// `round(100 * completed / total)`, or 0 for an empty list.
pub fn completion_percentage(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    let pct = (completed as f64 / tasks.len() as f64) * 100.0;
    pct.round() as u8
}

pub fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "#FF6B6B",
        Priority::Medium => "#FFB347",
        Priority::Low => "#4ECDC4",
        Priority::Unknown => NEUTRAL_PRIORITY_COLOR,
    }
}

pub fn find_category<'a>(categories: &'a [Category], id: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.id == id)
}

pub fn category_color<'a>(categories: &'a [Category], id: &str) -> &'a str {
    find_category(categories, id)
        .map(|c| c.color.as_str())
        .unwrap_or(DEFAULT_CATEGORY_COLOR)
}

pub fn category_name<'a>(categories: &'a [Category], id: &str) -> Option<&'a str> {
    find_category(categories, id).map(|c| c.name.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub color: String,
    pub count: usize,
    pub selected: bool,
}

/// Per-category task counts over the full task set, in category order.
pub fn category_counts(tasks: &[Task], categories: &[Category], selected: &str) -> Vec<CategorySummary> {
    let mut ordered: Vec<&Category> = categories.iter().collect();
    ordered.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));

    ordered
        .into_iter()
        .map(|category| CategorySummary {
            id: category.id.clone(),
            name: category.name.clone(),
            color: category.color.clone(),
            count: tasks.iter().filter(|t| t.in_category(&category.id)).count(),
            selected: category.id == selected,
        })
        .collect()
}
