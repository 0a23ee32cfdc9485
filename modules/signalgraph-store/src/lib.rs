//! Record store contract consumed by the engine.
//!
//! Row-set reads (equality filters, one ordering column, optional limit) and a
//! push subscription for insert/update events on a single table. Rows travel as
//! `serde_json::Value`; callers decode them into their own types.
//!
//! Two implementations: `MemoryStore` for tests and local runs, `PgRecordStore`
//! backed by Postgres with a `LISTEN/NOTIFY` change feed.

pub mod error;
pub mod memory;
pub mod pg;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use pg::PgRecordStore;
pub use store::{fetch_rows, RecordStore, Subscription};
pub use types::{ChangeKind, Direction, EqFilter, Order, RowChange, RowQuery, Table};
