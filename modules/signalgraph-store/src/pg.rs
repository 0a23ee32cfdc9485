//! PgRecordStore — record store backed by Postgres.
//!
//! Reads go through `to_jsonb(t)` so every table comes back as a JSON row without
//! per-table mapping. Subscriptions use `LISTEN <table>_changes`, fed by the trigger
//! installed with [`PgRecordStore::install_change_feed`].

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::{RecordStore, Subscription};
use crate::types::{validate_column, ChangeKind, Direction, EqFilter, RowChange, RowQuery, Table};

const CHANGE_FEED_SQL: &str = include_str!("../migrations/change_feed.sql");

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

/// Wire shape of a NOTIFY payload.
#[derive(Deserialize)]
struct NotifyPayload {
    event: ChangeKind,
    new: serde_json::Value,
    #[serde(default)]
    truncated: bool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Install the notify function and an insert/update trigger on `table`. Idempotent.
    pub async fn install_change_feed(&self, table: Table) -> Result<(), StoreError> {
        sqlx::raw_sql(CHANGE_FEED_SQL).execute(&self.pool).await?;

        let trigger = format!(
            "DROP TRIGGER IF EXISTS {table}_change_feed ON {table};
             CREATE TRIGGER {table}_change_feed AFTER INSERT OR UPDATE ON {table}
             FOR EACH ROW EXECUTE FUNCTION signalgraph_notify_change();"
        );
        sqlx::raw_sql(&trigger).execute(&self.pool).await?;

        info!(%table, "Change feed installed");
        Ok(())
    }
}

/// Build the SELECT for a validated query. Filter values are bound as `$1..$n`.
pub(crate) fn select_sql(query: &RowQuery) -> String {
    let mut sql = format!("SELECT to_jsonb(t) AS row FROM {} t", query.table);

    for (i, filter) in query.filters.iter().enumerate() {
        let keyword = if i == 0 { "WHERE" } else { "AND" };
        sql.push_str(&format!(" {keyword} t.{}::text = ${}", filter.column, i + 1));
    }

    if let Some(order) = &query.order {
        let direction = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        sql.push_str(&format!(" ORDER BY t.{} {direction}", order.column));
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    sql
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn select(&self, query: &RowQuery) -> Result<Vec<serde_json::Value>, StoreError> {
        query.validate()?;
        let sql = select_sql(query);

        let mut q = sqlx::query_scalar::<_, serde_json::Value>(&sql);
        for filter in &query.filters {
            q = q.bind(&filter.value);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn subscribe(&self, table: Table, filter: EqFilter) -> Result<Subscription, StoreError> {
        validate_column(&filter.column)?;

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&table.change_channel()).await?;
        info!(%table, column = %filter.column, "Listening for change events");

        let store = self.clone();
        let stream = listener.into_stream().filter_map(move |item| {
            let filter = filter.clone();
            let store = store.clone();
            async move {
                let notification = match item {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, %table, "Change feed receive failed");
                        return None;
                    }
                };

                let payload: NotifyPayload = match serde_json::from_str(notification.payload()) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, %table, "Undecodable change payload, skipping");
                        return None;
                    }
                };

                if !filter.matches(&payload.new) {
                    return None;
                }

                let row = if payload.truncated {
                    store.reread(table, &payload.new).await?
                } else {
                    payload.new
                };

                Some(RowChange {
                    event: payload.event,
                    new: row,
                })
            }
        });

        Ok(Subscription::new(stream))
    }
}

impl PgRecordStore {
    /// Fetch the full row for a truncated notification. `None` if it vanished or the read failed.
    async fn reread(&self, table: Table, sparse: &serde_json::Value) -> Option<serde_json::Value> {
        let id = sparse.get("id").map(crate::types::value_text)?;
        let query = RowQuery::new(table).eq("id", id).limit(1);

        match self.select(&query).await {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                warn!(error = %e, %table, "Re-read of truncated change failed");
                None
            }
        }
    }
}
