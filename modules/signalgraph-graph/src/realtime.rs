//! Live position tracking for one user.
//!
//! One-shot fetch of the newest position plus a change subscription, both feeding a
//! single held value. Whichever arrives last wins; there is no protection against a
//! late initial fetch overwriting a newer pushed row. Every arrival swaps the whole
//! row in, never merging fields from the previous one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use signalgraph_common::Position;
use signalgraph_store::{
    fetch_rows, ChangeKind, Direction, EqFilter, RecordStore, RowChange, RowQuery, Subscription, Table,
};

use crate::error::GraphError;

#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Empty,
    Holding(Arc<Position>),
}

struct Shared {
    user_id: Uuid,
    held: ArcSwapOption<Position>,
    generating: AtomicBool,
    disposed: AtomicBool,
    version: watch::Sender<u64>,
}

impl Shared {
    fn replace(&self, position: Position) -> bool {
        // Results that land after disposal are dropped on the floor.
        if self.disposed.load(Ordering::SeqCst) {
            debug!(user_id = %self.user_id, "Watcher disposed, discarding position");
            return false;
        }
        self.held.store(Some(Arc::new(position)));
        true
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn apply_fetch(&self, position: Position) {
        if self.replace(position) {
            self.bump();
        }
    }

    fn apply_change(&self, change: RowChange) {
        let position: Position = match change.decode() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, user_id = %self.user_id, "Undecodable position change, skipping");
                return;
            }
        };

        if !self.replace(position) {
            return;
        }
        if change.event == ChangeKind::Insert {
            self.generating.store(false, Ordering::SeqCst);
        }
        self.bump();
    }
}

/// Holds the most recent position for a user and keeps it current.
///
/// Dropping the watcher (or calling [`PositionWatcher::stop`]) ends the background
/// task, which releases the subscription.
pub struct PositionWatcher {
    shared: Arc<Shared>,
    changes: watch::Receiver<u64>,
    task: Option<JoinHandle<()>>,
}

impl PositionWatcher {
    /// Subscribe first, then fetch, so no event between the two is missed.
    pub async fn start<S>(store: Arc<S>, user_id: Uuid) -> Result<Self, GraphError>
    where
        S: RecordStore + ?Sized + 'static,
    {
        let subscription = store
            .subscribe(Table::Positions, EqFilter::new("user_id", user_id))
            .await
            .map_err(|source| GraphError::Subscribe {
                table: Table::Positions,
                source,
            })?;

        let (version, changes) = watch::channel(0);
        let shared = Arc::new(Shared {
            user_id,
            held: ArcSwapOption::empty(),
            generating: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            version,
        });

        let task = tokio::spawn(run(store, subscription, shared.clone()));
        info!(%user_id, "Position watcher started");

        Ok(Self {
            shared,
            changes,
            task: Some(task),
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.shared.user_id
    }

    pub fn current(&self) -> Option<Arc<Position>> {
        self.shared.held.load_full()
    }

    pub fn state(&self) -> PositionState {
        match self.current() {
            Some(position) => PositionState::Holding(position),
            None => PositionState::Empty,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.shared.generating.load(Ordering::SeqCst)
    }

    /// Flag that a new position is being generated. Cleared by the next INSERT.
    pub fn mark_generating(&self) {
        self.shared.generating.store(true, Ordering::SeqCst);
        self.shared.bump();
    }

    /// Wait for the next state change (held row replaced or generating flag set).
    pub async fn changed(&mut self) {
        // The sender lives in `shared`, which this watcher keeps alive.
        let _ = self.changes.changed().await;
    }

    /// Dispose the watcher and wait until its subscription is released.
    pub async fn stop(mut self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        info!(user_id = %self.shared.user_id, "Position watcher stopped");
    }
}

impl Drop for PositionWatcher {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<S>(store: Arc<S>, mut subscription: Subscription, shared: Arc<Shared>)
where
    S: RecordStore + ?Sized,
{
    let user_id = shared.user_id;
    let latest = RowQuery::new(Table::Positions)
        .eq("user_id", user_id)
        .order_by("created_at", Direction::Descending)
        .limit(1);

    let initial = fetch_rows::<Position, S>(&*store, &latest);
    tokio::pin!(initial);
    let mut fetched = false;

    loop {
        tokio::select! {
            result = &mut initial, if !fetched => {
                fetched = true;
                apply_initial(&shared, result);
            }
            change = subscription.next() => match change {
                Some(change) => shared.apply_change(change),
                None => {
                    info!(%user_id, "Position subscription closed");
                    break;
                }
            },
        }
    }

    if !fetched {
        apply_initial(&shared, initial.await);
    }
}

fn apply_initial(shared: &Shared, result: Result<Vec<Position>, signalgraph_store::StoreError>) {
    match result {
        Ok(rows) => match rows.into_iter().next() {
            Some(position) => shared.apply_fetch(position),
            None => debug!(user_id = %shared.user_id, "No position yet"),
        },
        Err(e) => warn!(error = %e, user_id = %shared.user_id, "Initial position fetch failed"),
    }
}
