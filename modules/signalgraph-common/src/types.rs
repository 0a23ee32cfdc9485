use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// --- Stored rows ---

/// Treat an explicit `null` column like a missing one. `to_jsonb` emits every NULL.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// An atomic observed intelligence item. Read-only input to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Signal {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub cluster_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urgency: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// A named grouping of signals. Member order is preserved as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Cluster {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signal_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Raw similarity relation between two signals. Several edges may share a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignalEdge {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub source_signal_id: Uuid,
    pub target_signal_id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub similarity: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edge_type: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A ranked synthesis referencing one or more signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Insight {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub insight_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub signal_ids: Vec<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urgency: String,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// An asynchronously generated recommendation document tracked live per user.
///
/// Everything but the identity columns is optional so a sparse change payload still
/// decodes; the held value is always replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Position {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// --- Palette ---

/// Display color tuple assigned to a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteColor {
    pub name: &'static str,
    pub fill: &'static str,
    pub border: &'static str,
    pub glow: &'static str,
}

// --- Derived cluster view ---

/// A cluster with its color and resolved member signals. Dangling member ids are dropped.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedCluster {
    #[serde(flatten)]
    pub cluster: Cluster,
    pub color: PaletteColor,
    pub signals: Vec<Signal>,
}

/// Presence-only relation between two clusters, unique per unordered pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterEdge {
    pub source: Uuid,
    pub target: Uuid,
}

impl ClusterEdge {
    /// Orientation-free key: the two ids in ascending order.
    pub fn key(&self) -> (Uuid, Uuid) {
        pair_key(self.source, self.target)
    }
}

// --- Derived insight view ---

/// Coarse urgency bucket for an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Urgent,
    Emerging,
    Relevant,
}

impl Tier {
    /// Exact, case-sensitive match; anything unrecognised is `Relevant`.
    pub fn from_urgency(urgency: &str) -> Self {
        match urgency {
            "urgent" => Tier::Urgent,
            "emerging" => Tier::Emerging,
            _ => Tier::Relevant,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Urgent => write!(f, "urgent"),
            Tier::Emerging => write!(f, "emerging"),
            Tier::Relevant => write!(f, "relevant"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightWithData {
    #[serde(flatten)]
    pub insight: Insight,
    pub signals: Vec<Signal>,
    pub tier: Tier,
    pub total_refs: u64,
    pub cluster_name: String,
    pub composite_score: f64,
}

/// Inferred relation between two insights, unique per unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightEdge {
    pub source: Uuid,
    pub target: Uuid,
    pub relation: String,
    pub label: Option<String>,
}

impl InsightEdge {
    pub fn key(&self) -> (Uuid, Uuid) {
        pair_key(self.source, self.target)
    }
}

/// Canonical key for an unordered pair of identifiers.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
