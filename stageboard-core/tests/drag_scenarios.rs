use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stageboard_core::config::EngineConfig;
use stageboard_core::geometry::ItemBounds;
use stageboard_core::notify::{ChannelSink, NoticeKind};
use stageboard_core::op::{OpKey, Rollback};
use stageboard_core::storage::memory::MemoryStageRegistry;
use stageboard_core::types::{Item, Stage};
use stageboard_core::{DropTarget, ItemStore, KanbanEngine, StoreError, SyncOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Transition(String, String),
    Reorder(String, Vec<String>),
}

/// Records every write and fails stage updates on demand.
struct RecordingStore {
    items: Vec<Item>,
    calls: Mutex<Vec<Call>>,
    fail_transitions: bool,
}

impl RecordingStore {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            calls: Mutex::new(Vec::new()),
            fail_transitions: false,
        }
    }

    fn failing(items: Vec<Item>) -> Self {
        Self {
            fail_transitions: true,
            ..Self::new(items)
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn transitions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Transition(..)))
            .count()
    }
}

#[async_trait]
impl ItemStore for RecordingStore {
    async fn list_items_grouped_by_stage(&self) -> Result<BTreeMap<String, Vec<Item>>, StoreError> {
        let mut groups: BTreeMap<String, Vec<Item>> = BTreeMap::new();
        for item in &self.items {
            groups.entry(item.stage.clone()).or_default().push(item.clone());
        }
        Ok(groups)
    }

    async fn update_item_stage(
        &self,
        _key: &OpKey,
        item_id: &str,
        stage_key: &str,
    ) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Transition(item_id.to_string(), stage_key.to_string()));
        if self.fail_transitions {
            return Err(StoreError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    async fn reorder_stage_items(
        &self,
        _key: &OpKey,
        stage_key: &str,
        ordered_ids: &[String],
    ) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Reorder(stage_key.to_string(), ordered_ids.to_vec()));
        Ok(())
    }
}

fn lead_stages() -> MemoryStageRegistry {
    MemoryStageRegistry::new(vec![
        Stage::new("novo", "Novo", 0),
        Stage::new("qualificado", "Qualificado", 1),
        Stage::new("ganho", "Ganho", 2).won(),
    ])
}

async fn mount(store: Arc<RecordingStore>, registry: MemoryStageRegistry) -> (KanbanEngine, ChannelSink) {
    let (sink, _rx) = ChannelSink::new(16);
    let engine = KanbanEngine::mount(
        &registry,
        store,
        Arc::new(sink.clone()),
        EngineConfig::default(),
    )
    .await
    .unwrap();
    (engine, sink)
}

fn ids(engine: &KanbanEngine, stage: &str) -> Vec<String> {
    engine.with_board(|board| board.ordered_ids(stage).unwrap())
}

#[tokio::test]
async fn test_drag_into_empty_stage_persists_one_transition() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L1", "novo", 0),
        Item::new("L2", "novo", 1),
    ]));
    let (mut engine, _sink) = mount(store.clone(), lead_stages()).await;

    engine.drag_start("L1").unwrap();
    let outcome = engine
        .drop_and_persist(Some(DropTarget::stage("qualificado")))
        .await;

    assert_eq!(outcome, Some(SyncOutcome::Committed));
    assert_eq!(ids(&engine, "novo"), vec!["L2"]);
    assert_eq!(ids(&engine, "qualificado"), vec!["L1"]);
    assert_eq!(
        store.calls()[0],
        Call::Transition("L1".to_string(), "qualificado".to_string())
    );
    assert_eq!(store.transitions(), 1);
}

#[tokio::test]
async fn test_reorder_within_stage_makes_no_transition() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L2", "novo", 0),
        Item::new("L3", "novo", 1),
    ]));
    let (mut engine, _sink) = mount(store.clone(), lead_stages()).await;

    engine.drag_start("L2").unwrap();
    let outcome = engine.drop_and_persist(Some(DropTarget::item("L3"))).await;

    assert_eq!(outcome, Some(SyncOutcome::Committed));
    assert_eq!(ids(&engine, "novo"), vec!["L3", "L2"]);
    assert_eq!(
        store.calls(),
        vec![Call::Reorder(
            "novo".to_string(),
            vec!["L3".to_string(), "L2".to_string()]
        )]
    );
}

#[tokio::test]
async fn test_failed_transition_rolls_back_and_notifies() {
    let store = Arc::new(RecordingStore::failing(vec![
        Item::new("T0", "open", 0),
        Item::new("T1", "open", 1),
        Item::new("T9", "resolved", 0),
    ]));
    let registry = MemoryStageRegistry::new(vec![
        Stage::new("open", "Open", 0),
        Stage::new("resolved", "Resolved", 1),
    ]);
    let (mut engine, sink) = mount(store.clone(), registry).await;
    let mut notices = sink.subscribe();
    let before = engine.snapshot();

    engine.drag_start("T1").unwrap();
    let outcome = engine
        .drop_and_persist(Some(DropTarget::stage("resolved")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::RolledBack {
            error: StoreError::Network("connection reset".to_string()),
            rollback: Rollback::Restored,
        }
    );
    assert!(engine.with_board(|board| board.matches(&before)));
    assert_eq!(engine.with_board(|b| b.locate("T1").map(|(k, i)| (k.to_string(), i))), Some(("open".to_string(), 1)));
    assert_eq!(notices.try_recv().unwrap().kind, NoticeKind::Error);
    // Rejected transitions never persist an order.
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn test_rollback_during_a_drag_is_not_undone_later() {
    let store = Arc::new(RecordingStore::failing(vec![
        Item::new("T1", "open", 0),
        Item::new("T3", "open", 1),
    ]));
    let registry = MemoryStageRegistry::new(vec![
        Stage::new("open", "Open", 0),
        Stage::new("resolved", "Resolved", 1),
    ]);
    let (mut engine, _sink) = mount(store, registry).await;

    engine.drag_start("T1").unwrap();
    let first = engine
        .drag_end(Some(DropTarget::stage("resolved")))
        .into_op()
        .unwrap();

    // T3 is picked up while T1's save is still pending, then T1's fails.
    engine.drag_start("T3").unwrap();
    let sync = engine.synchronizer();
    assert!(matches!(sync.run(first).await, SyncOutcome::RolledBack { .. }));
    assert_eq!(ids(&engine, "open"), vec!["T1", "T3"]);

    let outcome = engine
        .drop_and_persist(Some(DropTarget::stage("resolved")))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SyncOutcome::RolledBack {
            rollback: Rollback::Restored,
            ..
        }
    ));
    assert_eq!(ids(&engine, "open"), vec!["T1", "T3"]);
    assert!(ids(&engine, "resolved").is_empty());
}

#[tokio::test]
async fn test_unknown_stage_is_remapped_to_first() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L1", "novo", 0),
        Item::new("L4", "archived", 3),
    ]));
    let (engine, _sink) = mount(store, lead_stages()).await;

    assert_eq!(ids(&engine, "novo"), vec!["L1", "L4"]);
    engine.with_board(|board| {
        assert_eq!(board.item("L4").unwrap().stage, "novo");
        assert!(!board.has_stage("archived"));
    });
}

#[tokio::test]
async fn test_pointer_position_picks_insertion_slot() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L1", "novo", 0),
        Item::new("Q1", "qualificado", 0),
        Item::new("Q2", "qualificado", 1),
    ]));
    let (mut engine, _sink) = mount(store.clone(), lead_stages()).await;

    let bounds = vec![ItemBounds::new("Q1", 0.0, 40.0), ItemBounds::new("Q2", 48.0, 40.0)];
    engine.drag_start("L1").unwrap();
    engine
        .drop_and_persist(Some(DropTarget::stage_at("qualificado", 60.0, bounds)))
        .await
        .unwrap();

    assert_eq!(ids(&engine, "qualificado"), vec!["Q1", "L1", "Q2"]);
    assert_eq!(
        store.calls()[1],
        Call::Reorder(
            "qualificado".to_string(),
            vec!["Q1".to_string(), "L1".to_string(), "Q2".to_string()]
        )
    );
}

#[tokio::test]
async fn test_drop_in_place_persists_nothing() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L1", "novo", 0),
        Item::new("L2", "novo", 1),
    ]));
    let (mut engine, _sink) = mount(store.clone(), lead_stages()).await;

    engine.drag_start("L1").unwrap();
    assert!(engine.drop_and_persist(Some(DropTarget::item("L1"))).await.is_none());
    engine.drag_start("L2").unwrap();
    assert!(engine.drop_and_persist(None).await.is_none());

    assert!(store.calls().is_empty());
    assert_eq!(ids(&engine, "novo"), vec!["L1", "L2"]);
}

#[tokio::test]
async fn test_item_count_preserved_across_moves() {
    let store = Arc::new(RecordingStore::new(vec![
        Item::new("L1", "novo", 0),
        Item::new("L2", "novo", 1),
        Item::new("L3", "qualificado", 0),
    ]));
    let (mut engine, _sink) = mount(store, lead_stages()).await;

    for (id, target) in [
        ("L1", DropTarget::stage("ganho")),
        ("L3", DropTarget::item("L1")),
        ("L2", DropTarget::item("L3")),
    ] {
        engine.drag_start(id).unwrap();
        engine.drop_and_persist(Some(target)).await;
        assert_eq!(engine.with_board(|b| b.len()), 3);
    }
    assert_eq!(ids(&engine, "ganho"), vec!["L2", "L3", "L1"]);
}
