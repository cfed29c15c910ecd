pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::op::OpKey;
use crate::types::{Item, Stage};

/// Backing store for board cards. The engine never owns persistence; it
/// only calls these operations.
/// Implementations: MemoryItemStore (in-process), RestItemStore (backend crate).
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Initial load, called once per board mount. Groups should already be
    /// ordered by position; the board re-sorts anyway.
    async fn list_items_grouped_by_stage(&self) -> Result<BTreeMap<String, Vec<Item>>, StoreError>;

    /// Persist a stage change for exactly one item.
    async fn update_item_stage(
        &self,
        key: &OpKey,
        item_id: &str,
        stage_key: &str,
    ) -> Result<(), StoreError>;

    /// Persist the full order of one stage. List index is the new position.
    async fn reorder_stage_items(
        &self,
        key: &OpKey,
        stage_key: &str,
        ordered_ids: &[String],
    ) -> Result<(), StoreError>;
}

/// Source of the stages a board renders.
#[async_trait]
pub trait StageRegistry: Send + Sync {
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Flatten the store's grouped listing into a single item list. The group a
/// card is listed under wins over its own `stage` field.
pub fn flatten_groups(groups: BTreeMap<String, Vec<Item>>) -> Vec<Item> {
    groups
        .into_iter()
        .flat_map(|(stage_key, items)| {
            items.into_iter().map(move |mut item| {
                item.stage = stage_key.clone();
                item
            })
        })
        .collect()
}
