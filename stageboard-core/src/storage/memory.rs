/// In-process item store and stage registry.
///
/// Useful for local boards and tests. Writes are:
/// - idempotent per operation key (a replayed key is acknowledged, not reapplied)
/// - validated against the stage the item currently sits in
/// - versioned with a monotonic counter, bumped on every applied write
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::{ItemStore, StageRegistry, StoreError};
use crate::op::OpKey;
use crate::registry::default_stages;
use crate::types::{BoardKind, Item, Stage};

pub struct MemoryItemStore {
    /// item_id -> Item
    items: RwLock<HashMap<String, Item>>,
    /// Operation keys already applied
    applied: Mutex<HashSet<OpKey>>,
    version: AtomicU64,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            applied: Mutex::new(HashSet::new()),
            version: AtomicU64::new(0),
        }
    }

    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert(item);
        }
        store
    }

    pub fn insert(&self, item: Item) {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item.id.clone(), item);
    }

    pub fn get(&self, item_id: &str) -> Option<Item> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(item_id)
            .cloned()
    }

    /// Number of writes applied so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Ids in one stage, by stored position.
    pub fn stage_order(&self, stage_key: &str) -> Vec<String> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        let mut in_stage: Vec<&Item> = items.values().filter(|i| i.stage == stage_key).collect();
        in_stage.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        in_stage.into_iter().map(|i| i.id.clone()).collect()
    }

    /// Record `key`; false if it was already applied.
    fn claim(&self, key: &OpKey) -> bool {
        self.applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone())
    }

    fn release(&self, key: &OpKey) {
        self.applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list_items_grouped_by_stage(&self) -> Result<BTreeMap<String, Vec<Item>>, StoreError> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        let mut groups: BTreeMap<String, Vec<Item>> = BTreeMap::new();
        for item in items.values() {
            groups.entry(item.stage.clone()).or_default().push(item.clone());
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        }
        Ok(groups)
    }

    async fn update_item_stage(
        &self,
        key: &OpKey,
        item_id: &str,
        stage_key: &str,
    ) -> Result<(), StoreError> {
        if !self.claim(key) {
            log::debug!("[stageboard.memory.move] Replay of {} ignored", key);
            return Ok(());
        }

        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let next_position = items
            .values()
            .filter(|i| i.stage == stage_key && i.id != item_id)
            .map(|i| i.position + 1)
            .max()
            .unwrap_or(0);

        if !items.contains_key(item_id) {
            drop(items);
            self.release(key);
            return Err(StoreError::Rejected(format!("Item not found: {}", item_id)));
        }
        if let Some(item) = items.get_mut(item_id) {
            item.stage = stage_key.to_string();
            item.position = next_position;
        }
        self.version.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reorder_stage_items(
        &self,
        key: &OpKey,
        stage_key: &str,
        ordered_ids: &[String],
    ) -> Result<(), StoreError> {
        if !self.claim(key) {
            log::debug!("[stageboard.memory.reorder] Replay of {} ignored", key);
            return Ok(());
        }

        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let stray = ordered_ids
            .iter()
            .find(|id| items.get(id.as_str()).map_or(true, |i| i.stage != stage_key))
            .cloned();
        if let Some(stray) = stray {
            let message = format!("Item {} is not in stage {}", stray, stage_key);
            drop(items);
            self.release(key);
            return Err(StoreError::Rejected(message));
        }

        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(item) = items.get_mut(id.as_str()) {
                item.position = position as i64;
            }
        }
        self.version.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub struct MemoryStageRegistry {
    stages: RwLock<Vec<Stage>>,
}

impl MemoryStageRegistry {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages: RwLock::new(stages),
        }
    }

    pub fn for_kind(kind: BoardKind) -> Self {
        Self::new(default_stages(kind))
    }
}

#[async_trait]
impl StageRegistry for MemoryStageRegistry {
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        Ok(self.stages.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
