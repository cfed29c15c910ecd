/// Persistence operations produced by a drop.
///
/// An operation carries everything needed to persist the drop and to undo
/// it: the drag-start snapshot, the board revision the optimistic move
/// produced, and an idempotency key the store can use to ignore replays.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::board::{BoardSnapshot, BoardState};

/// Idempotency key for one persistence operation (16 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpKey(String);

impl OpKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key for one of the store calls an operation makes, so a transition's
    /// stage update and its follow-up reorder are deduplicated separately.
    pub fn scoped(&self, call: &str) -> OpKey {
        OpKey(format!("{}-{}", self.0, call))
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OpKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

static OP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh key from a process-wide counter and the wall clock,
/// hashed so keys from different processes do not line up.
pub fn generate_op_key() -> OpKey {
    use sha2::{Digest, Sha256};
    let seq = OP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(ts.to_le_bytes());
    let hash = hasher.finalize();
    OpKey(hex::encode(&hash[..8]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// Order change inside one stage.
    Reorder {
        stage_key: String,
        ordered_ids: Vec<String>,
    },
    /// Stage change, followed by the destination stage's new order.
    Transition {
        to_stage_key: String,
        ordered_ids: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct PersistOp {
    pub key: OpKey,
    pub item_id: String,
    pub display_name: String,
    pub origin_stage_key: String,
    pub origin_index: usize,
    pub kind: OpKind,
    pub snapshot: BoardSnapshot,
    /// Board revision right after the optimistic move was applied.
    pub applied_revision: u64,
}

/// What undoing an operation did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollback {
    /// Whole board restored to the drag-start snapshot.
    Restored,
    /// Later moves exist; only this item went back to its origin slot.
    Reverted,
    /// Nothing to undo (item gone or already back in its origin stage).
    Skipped,
}

impl PersistOp {
    pub fn is_transition(&self) -> bool {
        matches!(self.kind, OpKind::Transition { .. })
    }

    /// Stage whose order this operation persists.
    pub fn target_stage_key(&self) -> &str {
        match &self.kind {
            OpKind::Reorder { stage_key, .. } => stage_key,
            OpKind::Transition { to_stage_key, .. } => to_stage_key,
        }
    }

    /// Undo the optimistic move on `board`.
    ///
    /// If the snapshot was taken right before this move and nothing touched
    /// the board since, the snapshot is restored verbatim. Otherwise a full
    /// restore would discard (or resurrect) other cards' moves, so only this
    /// card is sent back to where it started.
    pub fn rollback(&self, board: &mut BoardState) -> Rollback {
        if board.revision() == self.applied_revision
            && self.applied_revision == self.snapshot.revision() + 1
        {
            board.restore(&self.snapshot);
            return Rollback::Restored;
        }

        let current_stage = match board.locate(&self.item_id) {
            Some((stage_key, _)) => stage_key.to_string(),
            None => {
                log::warn!(
                    "[stageboard.op.rollback] Item {} no longer on the board, nothing to revert",
                    self.item_id
                );
                return Rollback::Skipped;
            }
        };
        if current_stage == self.origin_stage_key {
            return Rollback::Skipped;
        }

        match board.move_across_stages(
            &self.item_id,
            &current_stage,
            &self.origin_stage_key,
            self.origin_index,
        ) {
            Ok(_) => Rollback::Reverted,
            Err(e) => {
                log::warn!(
                    "[stageboard.op.rollback] Could not revert item {}: {}",
                    self.item_id,
                    e
                );
                Rollback::Skipped
            }
        }
    }
}
