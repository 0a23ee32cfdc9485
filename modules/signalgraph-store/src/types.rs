//! Query and change-event types. Table-aware, row-agnostic.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Tables the engine reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Signals,
    Clusters,
    SignalEdges,
    Insights,
    Positions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Signals => "signals",
            Table::Clusters => "clusters",
            Table::SignalEdges => "signal_edges",
            Table::Insights => "insights",
            Table::Positions => "positions",
        }
    }

    /// `LISTEN` channel carrying this table's change feed.
    pub fn change_channel(&self) -> String {
        format!("{}_changes", self.as_str())
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Equality predicate on one column, compared by text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqFilter {
    pub column: String,
    pub value: String,
}

impl EqFilter {
    pub fn new(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    /// Whether `row[column]` equals the filter value. A missing or null column never matches.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match row.get(&self.column) {
            None | Some(serde_json::Value::Null) => false,
            Some(v) => value_text(v) == self.value,
        }
    }
}

/// A row-set read: all columns of one table, optional filters, ordering and limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub table: Table,
    pub filters: Vec<EqFilter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Add an equality filter. Repeatable; every filter must match.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(EqFilter::new(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Reject column names that are not plain lowercase identifiers. Stores interpolate
    /// column names into SQL, so this runs before any query is built.
    pub fn validate(&self) -> Result<(), StoreError> {
        let columns = self
            .filters
            .iter()
            .map(|f| f.column.as_str())
            .chain(self.order.iter().map(|o| o.column.as_str()));

        for column in columns {
            validate_column(column)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_column(column: &str) -> Result<(), StoreError> {
    let mut chars = column.chars();
    let valid_head = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(StoreError::InvalidQuery(format!("invalid column name {column:?}")))
    }
}

/// Text form used for equality: strings compare unquoted, everything else by JSON text.
pub(crate) fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A pushed change event: `{"event": "INSERT" | "UPDATE", "new": <row>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub event: ChangeKind,
    pub new: serde_json::Value,
}

impl RowChange {
    pub fn insert(row: serde_json::Value) -> Self {
        Self {
            event: ChangeKind::Insert,
            new: row,
        }
    }

    pub fn update(row: serde_json::Value) -> Self {
        Self {
            event: ChangeKind::Update,
            new: row,
        }
    }

    /// Decode the carried row.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.new.clone())?)
    }
}
