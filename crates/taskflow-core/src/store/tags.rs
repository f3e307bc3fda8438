//! Categories synthesized from the tag field of another record table.
//!
//! Nothing is stored: every read re-derives the list. Identity, name and
//! color are pure functions of the tag text and the list is sorted by tag,
//! so two reads over the same records agree regardless of record order.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::CategoryStore;
use super::remote::RecordApiClient;
use crate::error::StoreResult;
use crate::normalize::value_to_string;
use crate::task::{Category, CategoryDraft, CategoryPatch, category_slug};

pub const TAG_PALETTE: &[&str] = &["#5B4EE5", "#FF6B6B", "#4ECDC4", "#FFE66D", "#8B7FF0", "#4E9FF7"];

pub const UNTAGGED: &str = "general";

pub fn tag_color(tag: &str) -> &'static str {
    let digest = Sha256::digest(tag.as_bytes());
    let idx = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % TAG_PALETTE.len();
    TAG_PALETTE[idx]
}

pub fn display_name(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn synthetic(tag: &str, task_count: u32, order: i64) -> Category {
    Category {
        id: tag.to_string(),
        name: display_name(tag),
        color: tag_color(tag).to_string(),
        task_count,
        order,
    }
}

/// Groups records by their tag, counting records per tag. Untagged records
/// count toward [`UNTAGGED`].
pub fn derive_categories(records: &[Value], tag_field: &str) -> Vec<Category> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for record in records {
        let tag = record
            .get(tag_field)
            .and_then(value_to_string)
            .unwrap_or_else(|| UNTAGGED.to_string());
        *counts.entry(tag).or_default() += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, (tag, count))| synthetic(&tag, count, idx as i64))
        .collect()
}

#[derive(Debug, Clone)]
pub struct TagCategoryStore {
    client: RecordApiClient,
    table: String,
    tag_field: String,
}

impl TagCategoryStore {
    pub fn new(client: RecordApiClient, table: impl Into<String>, tag_field: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            tag_field: tag_field.into(),
        }
    }
}

impl CategoryStore for TagCategoryStore {
    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn get_all(&self) -> StoreResult<Vec<Category>> {
        let fields = ["Id", self.tag_field.as_str()];
        let records = self.client.query(&self.table, &fields, vec![]).await?;
        let categories = derive_categories(&records, &self.tag_field);
        debug!(records = records.len(), categories = categories.len(), "derived tag categories");
        Ok(categories)
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Category>> {
        let categories = CategoryStore::get_all(self).await?;
        Ok(categories.into_iter().find(|c| c.id == id))
    }

    async fn create(&self, draft: CategoryDraft) -> StoreResult<Category> {
        draft.validate()?;
        debug!(name = %draft.name, "tag categories are derived; create has no durable effect");
        let mut category = synthetic(&category_slug(&draft.name), 0, draft.order.unwrap_or(0));
        category.name = draft.name.trim().to_string();
        if let Some(color) = draft.color {
            category.color = color;
        }
        Ok(category)
    }

    async fn update(&self, id: &str, patch: CategoryPatch) -> StoreResult<Category> {
        debug!(id, "tag categories are derived; update has no durable effect");
        let mut category = synthetic(id, 0, 0);
        category.apply_patch(&patch);
        Ok(category)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        debug!(id, "tag categories are derived; delete has no durable effect");
        Ok(true)
    }

    async fn update_task_count(&self, id: &str, count: u32) -> StoreResult<bool> {
        debug!(id, count, "tag categories are derived; task count is not stored");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn derivation_ignores_record_order() {
        let forward = vec![
            json!({ "Id": 1, "Tags": "work" }),
            json!({ "Id": 2, "Tags": "home" }),
            json!({ "Id": 3, "Tags": "work" }),
            json!({ "Id": 4 }),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = derive_categories(&forward, "Tags");
        let b = derive_categories(&reversed, "Tags");
        assert_eq!(a, b);

        let ids: Vec<&str> = a.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["general", "home", "work"]);
        assert_eq!(a[2].name, "Work");
        assert_eq!(a[2].task_count, 2);
    }

    #[test]
    fn color_is_a_function_of_the_tag() {
        assert_eq!(tag_color("work"), tag_color("work"));
        assert!(TAG_PALETTE.contains(&tag_color("anything")));

        let alone = derive_categories(&[json!({ "Tags": "work" })], "Tags");
        let crowded = derive_categories(
            &[json!({ "Tags": "alpha" }), json!({ "Tags": "beta" }), json!({ "Tags": "work" })],
            "Tags",
        );
        assert_eq!(alone[0].color, crowded[2].color);
    }

    #[test]
    fn display_name_capitalizes_first_letter() {
        assert_eq!(display_name("errands"), "Errands");
        assert_eq!(display_name(""), "");
    }
}
