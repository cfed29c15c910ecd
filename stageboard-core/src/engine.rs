/// One mounted board: board state + drag session + synchronizer.
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::board::{BoardSnapshot, BoardState};
use crate::config::EngineConfig;
use crate::drag::{DragError, DragSession, DropOutcome, DropTarget};
use crate::notify::NotificationSink;
use crate::storage::{flatten_groups, ItemStore, StageRegistry, StoreError};
use crate::sync::{lock_board, SharedBoard, SyncOutcome, Synchronizer};

pub struct KanbanEngine {
    board: SharedBoard,
    session: DragSession,
    sync: Arc<Synchronizer>,
}

impl KanbanEngine {
    /// Load stages and items once and build the board.
    pub async fn mount(
        registry: &dyn StageRegistry,
        store: Arc<dyn ItemStore>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Result<Self, StoreError> {
        let stages = registry.list_stages().await?;
        let groups = store.list_items_grouped_by_stage().await?;
        let board = BoardState::load(stages, flatten_groups(groups));
        log::info!(
            "[stageboard.engine.mount] {} items across {} stages",
            board.len(),
            board.columns().len()
        );
        Ok(Self::new(board, store, sink, config))
    }

    pub fn new(
        board: BoardState,
        store: Arc<dyn ItemStore>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        let board = Arc::new(Mutex::new(board));
        let sync = Arc::new(Synchronizer::new(board.clone(), store, sink, config));
        Self {
            board,
            session: DragSession::new(),
            sync,
        }
    }

    /// Read-only access to the current board.
    pub fn with_board<R>(&self, f: impl FnOnce(&BoardState) -> R) -> R {
        f(&lock_board(&self.board))
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        lock_board(&self.board).snapshot()
    }

    pub fn synchronizer(&self) -> Arc<Synchronizer> {
        Arc::clone(&self.sync)
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_dragging()
    }

    /// Begin a drag. Refused while the item's previous save is in flight.
    pub fn drag_start(&mut self, item_id: &str) -> Result<(), DragError> {
        if self.sync.is_busy(item_id) {
            log::debug!("[stageboard.engine.drag] {} is busy, drag refused", item_id);
            return Err(DragError::ItemBusy(item_id.to_string()));
        }
        let board = lock_board(&self.board);
        self.session.start(&board, item_id)
    }

    pub fn cancel_drag(&mut self) {
        self.session.cancel();
    }

    /// Release the card. The board is updated optimistically; a returned
    /// operation has already marked its item busy and must be handed to
    /// [`Synchronizer::run`] or [`Synchronizer::spawn`].
    pub fn drag_end(&mut self, target: Option<DropTarget>) -> DropOutcome {
        let outcome = {
            let mut board = lock_board(&self.board);
            self.session.finish(&mut board, target)
        };
        if let DropOutcome::Persist(op) = &outcome {
            self.sync.track(op);
        }
        outcome
    }

    /// Drop and wait for the store. `None` when nothing needed saving.
    pub async fn drop_and_persist(&mut self, target: Option<DropTarget>) -> Option<SyncOutcome> {
        let op = self.drag_end(target).into_op()?;
        Some(self.sync.run(op).await)
    }

    /// Drop and persist in the background.
    pub fn drop_and_spawn(&mut self, target: Option<DropTarget>) -> Option<JoinHandle<SyncOutcome>> {
        let op = self.drag_end(target).into_op()?;
        Some(self.sync.spawn(op))
    }

    /// Convenience for hosts without pointer geometry: drag `item_id` and
    /// drop it over `target` in one step.
    pub async fn move_item(
        &mut self,
        item_id: &str,
        target: DropTarget,
    ) -> Result<Option<SyncOutcome>, DragError> {
        self.drag_start(item_id)?;
        Ok(self.drop_and_persist(Some(target)).await)
    }
}
