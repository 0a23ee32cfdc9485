//! Position watcher behaviour against the in-memory store's change feed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use uuid::Uuid;

use signalgraph_graph::{PositionState, PositionWatcher};
use signalgraph_store::{
    EqFilter, MemoryStore, RecordStore, RowQuery, StoreError, Subscription, Table,
};

const WAIT: Duration = Duration::from_secs(2);

fn position(id: Uuid, user_id: Uuid, title: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_id": user_id,
        "title": title,
        "sections": [{"heading": "Summary", "body": title}],
        "created_at": created_at,
    })
}

/// Wait until `pred` holds for the watcher, or panic after a timeout.
async fn wait_for(watcher: &mut PositionWatcher, pred: impl Fn(&PositionWatcher) -> bool) {
    tokio::time::timeout(WAIT, async {
        while !pred(&*watcher) {
            watcher.changed().await;
        }
    })
    .await
    .expect("watcher never reached the expected state");
}

fn held_title(watcher: &PositionWatcher) -> Option<String> {
    watcher.current().and_then(|p| p.title.clone())
}

async fn wait_for_subscriptions(store: &MemoryStore, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while store.active_subscriptions() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription count never settled");
}

/// Position reads always fail; subscriptions work.
struct UnreadableStore(Arc<MemoryStore>);

#[async_trait]
impl RecordStore for UnreadableStore {
    async fn select(&self, _query: &RowQuery) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unavailable("read replica down".into()))
    }

    async fn subscribe(&self, table: Table, filter: EqFilter) -> Result<Subscription, StoreError> {
        self.0.subscribe(table, filter).await
    }
}

/// Reads block until `gate` is released; `reads` counts the ones that got through.
struct GatedStore {
    inner: Arc<MemoryStore>,
    gate: Notify,
    reads: AtomicUsize,
}

impl GatedStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            gate: Notify::new(),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, StoreError> {
        self.gate.notified().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.select(query).await
    }

    async fn subscribe(&self, table: Table, filter: EqFilter) -> Result<Subscription, StoreError> {
        self.inner.subscribe(table, filter).await
    }
}

// =========================================================================
// Initial fetch
// =========================================================================

#[tokio::test]
async fn initial_fetch_holds_newest_position() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    store.seed(
        Table::Positions,
        vec![
            position(Uuid::new_v4(), user, "older", "2026-03-01T00:00:00Z"),
            position(Uuid::new_v4(), user, "newest", "2026-03-03T00:00:00Z"),
            position(Uuid::new_v4(), user, "middle", "2026-03-02T00:00:00Z"),
            position(Uuid::new_v4(), Uuid::new_v4(), "someone else", "2026-03-09T00:00:00Z"),
        ],
    );

    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();
    wait_for(&mut watcher, |w| w.current().is_some()).await;

    assert_eq!(held_title(&watcher).as_deref(), Some("newest"));
    assert!(matches!(watcher.state(), PositionState::Holding(_)));
    watcher.stop().await;
}

#[tokio::test]
async fn no_rows_stays_empty() {
    let store = Arc::new(MemoryStore::new());
    let watcher = PositionWatcher::start(store.clone(), Uuid::new_v4()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(watcher.state(), PositionState::Empty);
    watcher.stop().await;
}

#[tokio::test]
async fn failed_fetch_still_follows_changes() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(UnreadableStore(inner.clone()));
    let user = Uuid::new_v4();

    let mut watcher = PositionWatcher::start(store, user).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(watcher.state(), PositionState::Empty);

    inner.insert(Table::Positions, position(Uuid::new_v4(), user, "pushed", "2026-03-04T00:00:00Z"));
    wait_for(&mut watcher, |w| w.current().is_some()).await;
    assert_eq!(held_title(&watcher).as_deref(), Some("pushed"));
    watcher.stop().await;
}

// =========================================================================
// Change events
// =========================================================================

#[tokio::test]
async fn insert_replaces_and_clears_generating() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();

    watcher.mark_generating();
    assert!(watcher.is_generating());

    store.insert(Table::Positions, position(Uuid::new_v4(), user, "fresh", "2026-03-05T00:00:00Z"));
    wait_for(&mut watcher, |w| held_title(w).as_deref() == Some("fresh")).await;

    assert!(!watcher.is_generating());
    watcher.stop().await;
}

#[tokio::test]
async fn update_replaces_but_keeps_generating() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let id = Uuid::new_v4();
    store.seed(Table::Positions, vec![position(id, user, "draft", "2026-03-01T00:00:00Z")]);

    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();
    wait_for(&mut watcher, |w| w.current().is_some()).await;
    watcher.mark_generating();

    store
        .update(Table::Positions, id, position(id, user, "revised", "2026-03-01T00:00:00Z"))
        .unwrap();
    wait_for(&mut watcher, |w| held_title(w).as_deref() == Some("revised")).await;

    assert!(watcher.is_generating());
    watcher.stop().await;
}

#[tokio::test]
async fn sparse_update_replaces_whole_row() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let id = Uuid::new_v4();
    store.seed(Table::Positions, vec![position(id, user, "complete", "2026-03-01T00:00:00Z")]);

    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();
    wait_for(&mut watcher, |w| held_title(w).is_some()).await;

    store
        .update(Table::Positions, id, json!({ "id": id, "user_id": user }))
        .unwrap();
    wait_for(&mut watcher, |w| held_title(w).is_none()).await;

    let held = watcher.current().unwrap();
    assert_eq!(held.id, id);
    assert!(held.sections.is_none());
    assert!(held.created_at.is_none());
    watcher.stop().await;
}

#[tokio::test]
async fn other_users_changes_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();

    store.insert(
        Table::Positions,
        position(Uuid::new_v4(), Uuid::new_v4(), "not mine", "2026-03-06T00:00:00Z"),
    );
    store.insert(Table::Positions, position(Uuid::new_v4(), user, "mine", "2026-03-06T00:00:01Z"));
    wait_for(&mut watcher, |w| w.current().is_some()).await;

    assert_eq!(held_title(&watcher).as_deref(), Some("mine"));
    watcher.stop().await;
}

#[tokio::test]
async fn undecodable_change_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();

    // No id: cannot decode into a position.
    store.insert(Table::Positions, json!({ "user_id": user, "title": "broken" }));
    store.insert(Table::Positions, position(Uuid::new_v4(), user, "valid", "2026-03-07T00:00:00Z"));
    wait_for(&mut watcher, |w| w.current().is_some()).await;

    assert_eq!(held_title(&watcher).as_deref(), Some("valid"));
    watcher.stop().await;
}

// =========================================================================
// Fetch and push ordering
// =========================================================================

#[tokio::test]
async fn late_initial_fetch_overwrites_pushed_row() {
    let inner = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    inner.seed(
        Table::Positions,
        vec![position(Uuid::new_v4(), user, "stored", "2026-03-10T00:00:00Z")],
    );
    let store = Arc::new(GatedStore::new(inner.clone()));

    let mut watcher = PositionWatcher::start(store.clone(), user).await.unwrap();
    inner.insert(Table::Positions, position(Uuid::new_v4(), user, "pushed", "2026-03-01T00:00:00Z"));
    wait_for(&mut watcher, |w| held_title(w).as_deref() == Some("pushed")).await;

    // The fetch lands last and wins, even though its row is not the one just pushed.
    store.gate.notify_one();
    wait_for(&mut watcher, |w| held_title(w).as_deref() == Some("stored")).await;
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    watcher.stop().await;
}

#[tokio::test]
async fn stop_discards_pending_initial_fetch() {
    let inner = Arc::new(MemoryStore::new());
    let user = Uuid::new_v4();
    inner.seed(
        Table::Positions,
        vec![position(Uuid::new_v4(), user, "stored", "2026-03-10T00:00:00Z")],
    );
    let store = Arc::new(GatedStore::new(inner.clone()));

    let watcher = PositionWatcher::start(store.clone(), user).await.unwrap();
    tokio::time::timeout(WAIT, watcher.stop())
        .await
        .expect("stop should not wait on a pending fetch");
    wait_for_subscriptions(&inner, 0).await;

    store.gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn stop_releases_subscription() {
    let store = Arc::new(MemoryStore::new());
    let watcher = PositionWatcher::start(store.clone(), Uuid::new_v4()).await.unwrap();
    assert_eq!(store.active_subscriptions(), 1);

    watcher.stop().await;
    wait_for_subscriptions(&store, 0).await;
}

#[tokio::test]
async fn drop_releases_subscription() {
    let store = Arc::new(MemoryStore::new());
    let watcher = PositionWatcher::start(store.clone(), Uuid::new_v4()).await.unwrap();
    assert_eq!(store.active_subscriptions(), 1);

    drop(watcher);
    wait_for_subscriptions(&store, 0).await;
}

#[tokio::test]
async fn watchers_for_different_users_are_independent() {
    let store = Arc::new(MemoryStore::new());
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let mut a = PositionWatcher::start(store.clone(), alice).await.unwrap();
    let b = PositionWatcher::start(store.clone(), bob).await.unwrap();
    assert_eq!(store.active_subscriptions(), 2);

    store.insert(Table::Positions, position(Uuid::new_v4(), alice, "alice", "2026-03-08T00:00:00Z"));
    wait_for(&mut a, |w| w.current().is_some()).await;
    assert!(b.current().is_none());

    b.stop().await;
    wait_for_subscriptions(&store, 1).await;
    a.stop().await;
}
