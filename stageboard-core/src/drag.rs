/// Drag session controller: `Idle → Dragging → Idle`.
///
/// `start` records the dragged card and a rollback snapshot; `finish`
/// resolves the drop target, applies the move to the board and hands back the
/// persistence operation for it (if any).
use crate::board::{BoardSnapshot, BoardState};
use crate::geometry::{insertion_index, insertion_index_excluding, ItemBounds};
use crate::op::{generate_op_key, OpKind, PersistOp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("Item {0} is not on the board")]
    ItemNotFound(String),

    #[error("Item {0} still has a save in flight")]
    ItemBusy(String),
}

/// Where a card was released.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// Over another card; the dragged card takes that card's slot. Within
    /// one stage that is an array move, so a card dragged downwards lands
    /// after the card it was dropped on; across stages it lands before it.
    Item(String),
    /// Over a stage column. With a pointer position the slot comes from the
    /// rendered card bounds, otherwise the card goes to the top.
    Stage {
        stage_key: String,
        pointer_y: Option<f64>,
        bounds: Vec<ItemBounds>,
    },
}

impl DropTarget {
    pub fn item(item_id: impl Into<String>) -> Self {
        Self::Item(item_id.into())
    }

    pub fn stage(stage_key: impl Into<String>) -> Self {
        Self::Stage {
            stage_key: stage_key.into(),
            pointer_y: None,
            bounds: Vec::new(),
        }
    }

    pub fn stage_at(stage_key: impl Into<String>, pointer_y: f64, bounds: Vec<ItemBounds>) -> Self {
        Self::Stage {
            stage_key: stage_key.into(),
            pointer_y: Some(pointer_y),
            bounds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveDrag {
    pub item_id: String,
    pub origin_stage_key: String,
    pub origin_index: usize,
    snapshot: BoardSnapshot,
}

impl ActiveDrag {
    pub fn snapshot(&self) -> &BoardSnapshot {
        &self.snapshot
    }
}

#[derive(Debug, Clone, Default)]
enum DragPhase {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

/// Result of releasing a card.
#[derive(Debug, Clone)]
pub enum DropOutcome {
    /// No valid target; the board is untouched.
    Abandoned,
    /// Dropped back into its own slot; nothing to persist.
    Unchanged,
    /// The board was updated optimistically; this must be persisted.
    Persist(PersistOp),
}

impl DropOutcome {
    pub fn into_op(self) -> Option<PersistOp> {
        match self {
            DropOutcome::Persist(op) => Some(op),
            DropOutcome::Abandoned | DropOutcome::Unchanged => None,
        }
    }
}

/// Slot the dragged card resolves to.
enum Slot {
    /// Final index inside the card's current stage.
    Within(usize),
    /// Insertion index in another stage.
    Across { stage_key: String, index: usize },
}

#[derive(Debug, Default)]
pub struct DragSession {
    phase: DragPhase,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging(_))
    }

    pub fn active(&self) -> Option<&ActiveDrag> {
        match &self.phase {
            DragPhase::Dragging(active) => Some(active),
            DragPhase::Idle => None,
        }
    }

    /// Begin dragging `item_id`. A session already in progress is replaced
    /// and its snapshot dropped.
    pub fn start(&mut self, board: &BoardState, item_id: &str) -> Result<(), DragError> {
        let (origin_stage_key, origin_index) = board
            .locate(item_id)
            .map(|(stage_key, index)| (stage_key.to_string(), index))
            .ok_or_else(|| DragError::ItemNotFound(item_id.to_string()))?;

        if let DragPhase::Dragging(previous) = &self.phase {
            log::debug!(
                "[stageboard.drag.start] Replacing unfinished drag of {}",
                previous.item_id
            );
        }

        self.phase = DragPhase::Dragging(ActiveDrag {
            item_id: item_id.to_string(),
            origin_stage_key,
            origin_index,
            snapshot: board.snapshot(),
        });
        Ok(())
    }

    /// Drop the current gesture without touching the board.
    pub fn cancel(&mut self) {
        self.phase = DragPhase::Idle;
    }

    /// Release the dragged card over `target` (`None` = outside any stage).
    pub fn finish(&mut self, board: &mut BoardState, target: Option<DropTarget>) -> DropOutcome {
        let active = match std::mem::take(&mut self.phase) {
            DragPhase::Dragging(active) => active,
            DragPhase::Idle => return DropOutcome::Abandoned,
        };
        let Some(target) = target else {
            log::debug!(
                "[stageboard.drag.finish] {} dropped outside any stage",
                active.item_id
            );
            return DropOutcome::Abandoned;
        };

        // Another card's rollback may have moved things since drag start.
        let Some((current_stage, current_index)) = board
            .locate(&active.item_id)
            .map(|(stage_key, index)| (stage_key.to_string(), index))
        else {
            log::debug!(
                "[stageboard.drag.finish] {} vanished during the drag",
                active.item_id
            );
            return DropOutcome::Abandoned;
        };

        let Some(slot) = resolve_slot(board, &active.item_id, &current_stage, target) else {
            return DropOutcome::Abandoned;
        };

        // The board changed mid-drag (another card's rollback). The drag-start
        // copy would bring that undone move back, so roll back to now instead.
        let (snapshot, origin_stage_key, origin_index) =
            if board.revision() == active.snapshot.revision() {
                (active.snapshot, active.origin_stage_key, active.origin_index)
            } else {
                log::debug!(
                    "[stageboard.drag.finish] Board changed during drag of {}, refreshing snapshot",
                    active.item_id
                );
                (board.snapshot(), current_stage.clone(), current_index)
            };

        let kind = match slot {
            Slot::Within(to_index) => {
                let len = board.items(&current_stage).map_or(0, |items| items.len());
                let to_index = to_index.min(len.saturating_sub(1));
                if to_index == current_index {
                    return DropOutcome::Unchanged;
                }
                if let Err(e) = board.move_within_stage(&current_stage, current_index, to_index) {
                    log::debug!("[stageboard.drag.finish] Reorder aborted: {}", e);
                    return DropOutcome::Abandoned;
                }
                OpKind::Reorder {
                    ordered_ids: board.ordered_ids(&current_stage).unwrap_or_default(),
                    stage_key: current_stage,
                }
            }
            Slot::Across { stage_key, index } => {
                if let Err(e) =
                    board.move_across_stages(&active.item_id, &current_stage, &stage_key, index)
                {
                    log::debug!("[stageboard.drag.finish] Transition aborted: {}", e);
                    return DropOutcome::Abandoned;
                }
                OpKind::Transition {
                    ordered_ids: board.ordered_ids(&stage_key).unwrap_or_default(),
                    to_stage_key: stage_key,
                }
            }
        };

        let display_name = board
            .item(&active.item_id)
            .map(|item| item.display_name().to_string())
            .unwrap_or_else(|| active.item_id.clone());

        DropOutcome::Persist(PersistOp {
            key: generate_op_key(),
            item_id: active.item_id,
            display_name,
            origin_stage_key,
            origin_index,
            kind,
            snapshot,
            applied_revision: board.revision(),
        })
    }
}

fn resolve_slot(
    board: &BoardState,
    item_id: &str,
    current_stage: &str,
    target: DropTarget,
) -> Option<Slot> {
    match target {
        DropTarget::Item(over_id) => {
            if over_id == item_id {
                let (_, index) = board.locate(item_id)?;
                return Some(Slot::Within(index));
            }
            let Some((stage_key, index)) = board.locate(&over_id) else {
                log::debug!("[stageboard.drag.target] Drop target item {} not on the board", over_id);
                return None;
            };
            if stage_key == current_stage {
                Some(Slot::Within(index))
            } else {
                Some(Slot::Across {
                    stage_key: stage_key.to_string(),
                    index,
                })
            }
        }
        DropTarget::Stage {
            stage_key,
            pointer_y,
            bounds,
        } => {
            if !board.has_stage(&stage_key) {
                log::debug!("[stageboard.drag.target] Unknown drop stage {}", stage_key);
                return None;
            }
            if stage_key == current_stage {
                let index = pointer_y.map_or(0, |y| insertion_index_excluding(y, &bounds, item_id));
                Some(Slot::Within(index))
            } else {
                let index = pointer_y.map_or(0, |y| insertion_index(y, &bounds));
                Some(Slot::Across { stage_key, index })
            }
        }
    }
}
