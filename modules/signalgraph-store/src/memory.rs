//! MemoryStore — in-process record store.
//!
//! Mirrors the Postgres store's observable behaviour: text-form equality filters,
//! NULLS LAST ascending / NULLS FIRST descending ordering, whole-row change events.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{RecordStore, Subscription};
use crate::types::{value_text, Direction, EqFilter, RowChange, RowQuery, Table};

const CHANGE_BUFFER: usize = 256;

pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<serde_json::Value>>>,
    changes: broadcast::Sender<(Table, RowChange)>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tables: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Load rows without publishing change events.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = serde_json::Value>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table).or_default().extend(rows);
    }

    /// Append a row and publish an INSERT.
    pub fn insert(&self, table: Table, row: serde_json::Value) {
        {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            tables.entry(table).or_default().push(row.clone());
        }
        self.publish(table, RowChange::insert(row));
    }

    /// Replace the row whose `id` matches and publish an UPDATE carrying the new row.
    pub fn update(&self, table: Table, id: impl ToString, row: serde_json::Value) -> Result<(), StoreError> {
        let id = id.to_string();
        let matcher = EqFilter::new("id", &id);
        {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let slot = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| matcher.matches(r)))
                .ok_or_else(|| StoreError::NotFound {
                    table: table.to_string(),
                    id: id.clone(),
                })?;
            *slot = row.clone();
        }
        self.publish(table, RowChange::update(row));
        Ok(())
    }

    /// Number of subscriptions currently holding a live channel.
    pub fn active_subscriptions(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, table: Table, change: RowChange) {
        // No receivers is fine: nobody is listening yet.
        let delivered = self.changes.send((table, change)).unwrap_or(0);
        debug!(%table, delivered, "Published change event");
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, query: &RowQuery) -> Result<Vec<serde_json::Value>, StoreError> {
        query.validate()?;

        let mut rows: Vec<serde_json::Value> = {
            let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
            tables
                .get(&query.table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(order) = &query.order {
            // Stable: rows comparing equal keep insertion order.
            rows.sort_by(|a, b| {
                let ord = compare_column(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn subscribe(&self, table: Table, filter: EqFilter) -> Result<Subscription, StoreError> {
        crate::types::validate_column(&filter.column)?;
        let rx = self.changes.subscribe();

        let stream = futures::stream::unfold(
            (rx, filter),
            move |(mut rx, filter)| async move {
                loop {
                    match rx.recv().await {
                        Ok((changed, change)) => {
                            if changed == table && filter.matches(&change.new) {
                                return Some((change, (rx, filter)));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%table, skipped, "Subscriber lagged, change events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(Subscription::new(stream))
    }
}

/// Null and missing values sort after everything else, as in Postgres. Timestamps compare as
/// instants, so fractional seconds and offsets order correctly.
fn compare_column(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (timestamp(a), timestamp(b)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => value_text(a).cmp(&value_text(b)),
            },
        },
    }
}

fn timestamp(value: &serde_json::Value) -> Option<DateTime<FixedOffset>> {
    value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}
