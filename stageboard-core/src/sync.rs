/// Persistence synchronizer.
///
/// Runs the store calls for a drop and reconciles failures:
///   Transition fails  -> roll the board back, toast an error.
///   Transition ok     -> persist the destination order; optional success toast.
///   Reorder fails     -> toast an error, keep the local order (cosmetic only).
///
/// Calls are serialized per item: while an item has an operation in flight
/// it is "busy" and the engine refuses to start a new drag on it. Different
/// items race freely; for one stage the last reorder to land wins.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use crate::board::BoardState;
use crate::config::EngineConfig;
use crate::notify::{NoticeKind, NotificationSink};
use crate::op::{OpKey, OpKind, PersistOp, Rollback};
use crate::storage::{ItemStore, StoreError};

/// Board shared between the drag controller and in-flight operations.
/// Never locked across an `.await`.
pub type SharedBoard = Arc<Mutex<BoardState>>;

pub fn lock_board(board: &SharedBoard) -> MutexGuard<'_, BoardState> {
    board.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Everything the drop changed is persisted.
    Committed,
    /// The stage change (if any) stuck, the new order did not.
    ReorderFailed(StoreError),
    /// The stage change was rejected and the board was rolled back.
    RolledBack {
        error: StoreError,
        rollback: Rollback,
    },
}

impl SyncOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SyncOutcome::Committed)
    }
}

pub struct Synchronizer {
    board: SharedBoard,
    store: Arc<dyn ItemStore>,
    sink: Arc<dyn NotificationSink>,
    config: EngineConfig,
    /// item_id -> key of the operation currently in flight for it
    in_flight: Mutex<HashMap<String, OpKey>>,
}

impl Synchronizer {
    pub fn new(
        board: SharedBoard,
        store: Arc<dyn ItemStore>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            board,
            store,
            sink,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True while an operation for `item_id` has not finished.
    pub fn is_busy(&self, item_id: &str) -> bool {
        self.in_flight().contains_key(item_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight().len()
    }

    /// Mark the operation's item busy. Called when the drop happens so the
    /// item is locked before the task is even scheduled.
    pub fn track(&self, op: &PersistOp) {
        self.in_flight()
            .insert(op.item_id.clone(), op.key.clone());
    }

    /// Persist on the tokio runtime; the board reflects the result once the
    /// handle resolves.
    pub fn spawn(self: &Arc<Self>, op: PersistOp) -> JoinHandle<SyncOutcome> {
        self.track(&op);
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(op).await })
    }

    /// Persist one operation and reconcile the board with the result.
    pub async fn run(&self, op: PersistOp) -> SyncOutcome {
        self.track(&op);
        let outcome = match &op.kind {
            OpKind::Reorder {
                stage_key,
                ordered_ids,
            } => {
                let ordered_ids = self.current_order(stage_key, ordered_ids);
                match self
                    .persist_reorder(&op.key.scoped("order"), stage_key, &ordered_ids)
                    .await
                {
                    Ok(()) => SyncOutcome::Committed,
                    Err(e) => SyncOutcome::ReorderFailed(e),
                }
            }
            OpKind::Transition {
                to_stage_key,
                ordered_ids,
            } => match self.persist_transition(&op, to_stage_key).await {
                Err(error) => SyncOutcome::RolledBack {
                    rollback: self.roll_back(&op),
                    error,
                },
                Ok(()) => {
                    // Sibling rollbacks may have changed the stage since the drop.
                    let ordered_ids = self.current_order(to_stage_key, ordered_ids);
                    match self
                        .persist_reorder(&op.key.scoped("order"), to_stage_key, &ordered_ids)
                        .await
                    {
                        Ok(()) => SyncOutcome::Committed,
                        Err(e) => SyncOutcome::ReorderFailed(e),
                    }
                }
            },
        };
        self.release(&op);
        outcome
    }

    async fn persist_transition(&self, op: &PersistOp, to_stage_key: &str) -> Result<(), StoreError> {
        let stage_label = self.stage_label(to_stage_key);
        let key = op.key.scoped("stage");
        let result = self
            .bounded(self.store.update_item_stage(&key, &op.item_id, to_stage_key))
            .await;

        match &result {
            Ok(()) => {
                log::info!(
                    "[stageboard.sync.transition] {} -> {} ({})",
                    op.item_id,
                    to_stage_key,
                    op.key
                );
                if self.config.notify_transition_success {
                    self.sink.notify(
                        NoticeKind::Success,
                        "Item moved",
                        Some(&format!("{} → {}", op.display_name, stage_label)),
                    );
                }
            }
            Err(e) => {
                log::warn!(
                    "[stageboard.sync.transition] {} -> {} failed ({}): {}",
                    op.item_id,
                    to_stage_key,
                    op.key,
                    e
                );
                self.sink.notify(
                    NoticeKind::Error,
                    "Failed to move item",
                    Some(&format!("{} → {}: {}", op.display_name, stage_label, e)),
                );
            }
        }
        result
    }

    async fn persist_reorder(
        &self,
        key: &OpKey,
        stage_key: &str,
        ordered_ids: &[String],
    ) -> Result<(), StoreError> {
        let result = self
            .bounded(self.store.reorder_stage_items(key, stage_key, ordered_ids))
            .await;

        if let Err(e) = &result {
            log::warn!(
                "[stageboard.sync.reorder] Order of {} not saved ({}): {}",
                stage_key,
                key,
                e
            );
            self.sink.notify(
                NoticeKind::Error,
                "Failed to save order",
                Some(&format!("{}: {}", self.stage_label(stage_key), e)),
            );
        } else {
            log::debug!(
                "[stageboard.sync.reorder] {} now {:?} ({})",
                stage_key,
                ordered_ids,
                key
            );
        }
        result
    }

    fn roll_back(&self, op: &PersistOp) -> Rollback {
        let mut board = lock_board(&self.board);
        let rollback = op.rollback(&mut board);
        log::info!(
            "[stageboard.sync.rollback] {} back to {} ({:?})",
            op.item_id,
            op.origin_stage_key,
            rollback
        );
        rollback
    }

    /// Apply the configured timeout to one store call.
    async fn bounded<F>(&self, call: F) -> Result<(), StoreError>
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        match tokio::time::timeout(self.config.persist_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.persist_timeout_ms)),
        }
    }

    /// The stage's order as the board shows it now, or the drop-time order
    /// if the stage has gone.
    fn current_order(&self, stage_key: &str, at_drop: &[String]) -> Vec<String> {
        lock_board(&self.board)
            .ordered_ids(stage_key)
            .unwrap_or_else(|| at_drop.to_vec())
    }

    fn stage_label(&self, stage_key: &str) -> String {
        lock_board(&self.board)
            .stage(stage_key)
            .map(|stage| stage.label.clone())
            .unwrap_or_else(|| stage_key.to_string())
    }

    fn release(&self, op: &PersistOp) {
        let mut in_flight = self.in_flight();
        if in_flight.get(&op.item_id) == Some(&op.key) {
            in_flight.remove(&op.item_id);
        }
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, OpKey>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
