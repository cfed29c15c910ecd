/// In-memory board state: stage → ordered cards.
///
/// This is the single source of truth for what the interface renders. The
/// drag controller mutates it optimistically, the synchronizer restores it
/// when the backing store rejects a change.
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::registry::normalize_stages;
use crate::types::{Item, Stage, StageSummary};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Item {item_id} not found in stage {stage_key}")]
    ItemNotFound { item_id: String, stage_key: String },

    #[error("Index {index} out of range for stage {stage_key} (len {len})")]
    OutOfRange {
        stage_key: String,
        index: usize,
        len: usize,
    },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),
}

/// One stage and its cards, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub stage: Stage,
    pub items: Vec<Item>,
}

/// Immutable copy of the board taken at drag start, used only for rollback.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    columns: Arc<Vec<BoardColumn>>,
    revision: u64,
}

impl BoardSnapshot {
    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    /// Board revision at the moment the snapshot was taken.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Stage and index of an item as it was when the snapshot was taken.
    pub fn locate(&self, item_id: &str) -> Option<(String, usize)> {
        locate_in(&self.columns, item_id).map(|(key, index)| (key.to_string(), index))
    }
}

impl PartialEq for BoardSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

#[derive(Debug, Clone)]
pub struct BoardState {
    columns: Vec<BoardColumn>,
    /// Bumped on every mutation, including restores.
    revision: u64,
}

impl BoardState {
    /// Build the board from the registry's stages and the store's items.
    ///
    /// Items referencing a stage that is not registered land in the first
    /// stage. Each column is sorted by the persisted `position`; the sort is
    /// stable so equal positions keep their input order.
    pub fn load(stages: Vec<Stage>, items: Vec<Item>) -> Self {
        let mut columns: Vec<BoardColumn> = normalize_stages(stages)
            .into_iter()
            .map(|stage| BoardColumn {
                stage,
                items: Vec::new(),
            })
            .collect();

        let mut seen = HashSet::new();
        for mut item in items {
            if !seen.insert(item.id.clone()) {
                log::warn!(
                    "[stageboard.board.load] Duplicate item {} ignored",
                    item.id
                );
                continue;
            }
            let index = match columns.iter().position(|c| c.stage.key == item.stage) {
                Some(index) => index,
                None => {
                    log::debug!(
                        "[stageboard.board.load] Item {} references unknown stage {:?}, using {}",
                        item.id,
                        item.stage,
                        columns[0].stage.key
                    );
                    item.stage = columns[0].stage.key.clone();
                    0
                }
            };
            columns[index].items.push(item);
        }

        for column in &mut columns {
            column.items.sort_by_key(|item| item.position);
        }

        Self {
            columns,
            revision: 0,
        }
    }

    /// Move the card at `from_index` to `to_index` inside one stage.
    pub fn move_within_stage(
        &mut self,
        stage_key: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), BoardError> {
        let column = self.column_mut(stage_key)?;
        let len = column.items.len();
        for index in [from_index, to_index] {
            if index >= len {
                return Err(BoardError::OutOfRange {
                    stage_key: stage_key.to_string(),
                    index,
                    len,
                });
            }
        }
        if from_index == to_index {
            return Ok(());
        }

        let item = column.items.remove(from_index);
        column.items.insert(to_index, item);
        renumber(column);
        self.revision += 1;
        Ok(())
    }

    /// Move a card into another stage. `insert_index` is clamped to the
    /// destination length; the index actually used is returned.
    pub fn move_across_stages(
        &mut self,
        item_id: &str,
        from_stage_key: &str,
        to_stage_key: &str,
        insert_index: usize,
    ) -> Result<usize, BoardError> {
        let from = self.column_index(from_stage_key)?;
        let to = self.column_index(to_stage_key)?;

        let position = self.columns[from]
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| BoardError::ItemNotFound {
                item_id: item_id.to_string(),
                stage_key: from_stage_key.to_string(),
            })?;

        let mut item = self.columns[from].items.remove(position);
        item.stage = to_stage_key.to_string();

        let destination = &mut self.columns[to];
        let index = insert_index.min(destination.items.len());
        destination.items.insert(index, item);

        renumber(&mut self.columns[from]);
        if from != to {
            renumber(&mut self.columns[to]);
        }
        self.revision += 1;
        Ok(index)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            columns: Arc::new(self.columns.clone()),
            revision: self.revision,
        }
    }

    /// Replace the whole mapping with a snapshot's contents.
    pub fn restore(&mut self, snapshot: &BoardSnapshot) {
        self.columns = snapshot.columns.as_ref().clone();
        self.revision += 1;
    }

    /// True when the board holds exactly the snapshot's contents.
    pub fn matches(&self, snapshot: &BoardSnapshot) -> bool {
        self.columns == *snapshot.columns
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.columns.iter().map(|c| &c.stage)
    }

    pub fn has_stage(&self, stage_key: &str) -> bool {
        self.columns.iter().any(|c| c.stage.key == stage_key)
    }

    pub fn stage(&self, stage_key: &str) -> Option<&Stage> {
        self.column(stage_key).map(|c| &c.stage)
    }

    pub fn items(&self, stage_key: &str) -> Option<&[Item]> {
        self.column(stage_key).map(|c| c.items.as_slice())
    }

    /// Ids of a stage's cards in display order.
    pub fn ordered_ids(&self, stage_key: &str) -> Option<Vec<String>> {
        self.column(stage_key)
            .map(|c| c.items.iter().map(|item| item.id.clone()).collect())
    }

    /// Stage key and index of a card.
    pub fn locate(&self, item_id: &str) -> Option<(&str, usize)> {
        locate_in(&self.columns, item_id)
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.columns
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|item| item.id == item_id)
    }

    /// Total number of cards on the board.
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summaries(&self) -> Vec<StageSummary> {
        self.columns
            .iter()
            .map(|column| StageSummary {
                key: column.stage.key.clone(),
                label: column.stage.label.clone(),
                item_count: column.items.len(),
                total_value_cents: column.items.iter().filter_map(|i| i.value_cents).sum(),
            })
            .collect()
    }

    fn column(&self, stage_key: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|c| c.stage.key == stage_key)
    }

    fn column_index(&self, stage_key: &str) -> Result<usize, BoardError> {
        self.columns
            .iter()
            .position(|c| c.stage.key == stage_key)
            .ok_or_else(|| BoardError::UnknownStage(stage_key.to_string()))
    }

    fn column_mut(&mut self, stage_key: &str) -> Result<&mut BoardColumn, BoardError> {
        let index = self.column_index(stage_key)?;
        Ok(&mut self.columns[index])
    }
}

fn locate_in<'a>(columns: &'a [BoardColumn], item_id: &str) -> Option<(&'a str, usize)> {
    columns.iter().find_map(|column| {
        column
            .items
            .iter()
            .position(|item| item.id == item_id)
            .map(|index| (column.stage.key.as_str(), index))
    })
}

/// Positions follow list index, which is how the store reads a reorder.
fn renumber(column: &mut BoardColumn) {
    for (index, item) in column.items.iter_mut().enumerate() {
        item.position = index as i64;
    }
}
