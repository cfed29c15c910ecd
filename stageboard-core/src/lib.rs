/// Stageboard core: board state, drag resolution and store synchronization
/// for stage-based Kanban boards (sales pipelines, ticket queues).
pub mod board;
pub mod config;
pub mod drag;
pub mod engine;
pub mod geometry;
pub mod notify;
pub mod op;
pub mod registry;
pub mod storage;
pub mod sync;
pub mod types;

pub use board::{BoardError, BoardSnapshot, BoardState};
pub use drag::{DragError, DropOutcome, DropTarget};
pub use engine::KanbanEngine;
pub use storage::{ItemStore, StageRegistry, StoreError};
pub use sync::SyncOutcome;
