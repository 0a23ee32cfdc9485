//! View loading: fetch one user's raw snapshot, then derive.
//!
//! Each view reads its tables concurrently and derives only once every read has
//! succeeded. A single failed read fails the view; nothing is half-built.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use signalgraph_common::{
    Cluster, ClusterEdge, EnrichedCluster, Insight, InsightEdge, InsightWithData, Signal,
    SignalEdge,
};
use signalgraph_store::{fetch_rows, Direction, RecordStore, RowQuery, Table};

use crate::builder::build_graph;
use crate::cluster_edges::aggregate_cluster_edges;
use crate::error::GraphError;
use crate::insights::{correlate_insights, rank_insights};

/// Clusters with colors and members, standalone signals, and cluster-to-cluster edges.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub user_id: Uuid,
    pub clusters: Vec<EnrichedCluster>,
    pub standalone: Vec<Signal>,
    pub edges: Vec<ClusterEdge>,
    pub loaded_at: DateTime<Utc>,
}

/// Ranked insights of one type and the insight-to-insight edges between them.
#[derive(Debug, Clone, Serialize)]
pub struct InsightView {
    pub user_id: Uuid,
    pub insight_type: String,
    pub insights: Vec<InsightWithData>,
    pub edges: Vec<InsightEdge>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    pub clusters: usize,
    pub standalone: usize,
    pub cluster_edges: usize,
    pub insights: usize,
    pub insight_edges: usize,
}

fn user_rows(table: Table, user_id: Uuid) -> RowQuery {
    RowQuery::new(table).eq("user_id", user_id)
}

async fn fetch_signals<S: RecordStore + ?Sized>(store: &S, user_id: Uuid) -> Result<Vec<Signal>, GraphError> {
    let query = user_rows(Table::Signals, user_id).order_by("created_at", Direction::Ascending);
    fetch_rows(store, &query).await.map_err(GraphError::fetch(Table::Signals))
}

async fn fetch_clusters<S: RecordStore + ?Sized>(store: &S, user_id: Uuid) -> Result<Vec<Cluster>, GraphError> {
    let query = user_rows(Table::Clusters, user_id).order_by("created_at", Direction::Ascending);
    fetch_rows(store, &query).await.map_err(GraphError::fetch(Table::Clusters))
}

async fn fetch_edges<S: RecordStore + ?Sized>(store: &S, user_id: Uuid) -> Result<Vec<SignalEdge>, GraphError> {
    let query = user_rows(Table::SignalEdges, user_id);
    fetch_rows(store, &query).await.map_err(GraphError::fetch(Table::SignalEdges))
}

async fn fetch_insights<S: RecordStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    insight_type: &str,
) -> Result<Vec<Insight>, GraphError> {
    let query = user_rows(Table::Insights, user_id)
        .eq("type", insight_type)
        .order_by("sort_order", Direction::Ascending);
    fetch_rows(store, &query).await.map_err(GraphError::fetch(Table::Insights))
}

impl ClusterView {
    pub async fn load<S: RecordStore + ?Sized>(store: &S, user_id: Uuid) -> Result<Self, GraphError> {
        let start = std::time::Instant::now();

        let (clusters, signals, edges) = tokio::try_join!(
            fetch_clusters(store, user_id),
            fetch_signals(store, user_id),
            fetch_edges(store, user_id),
        )?;

        let view = Self::derive(user_id, &clusters, &signals, &edges);

        let stats = view.stats();
        info!(
            %user_id,
            clusters = stats.clusters,
            standalone = stats.standalone,
            cluster_edges = stats.cluster_edges,
            elapsed_ms = start.elapsed().as_millis(),
            "Cluster view loaded"
        );

        Ok(view)
    }

    /// Pure derivation over an already-fetched snapshot.
    pub fn derive(user_id: Uuid, clusters: &[Cluster], signals: &[Signal], edges: &[SignalEdge]) -> Self {
        let parts = build_graph(clusters, signals);
        let edges = aggregate_cluster_edges(&parts.clusters, edges);

        Self {
            user_id,
            clusters: parts.clusters,
            standalone: parts.standalone,
            edges,
            loaded_at: Utc::now(),
        }
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            clusters: self.clusters.len(),
            standalone: self.standalone.len(),
            cluster_edges: self.edges.len(),
            ..ViewStats::default()
        }
    }
}

impl InsightView {
    pub async fn load<S: RecordStore + ?Sized>(
        store: &S,
        user_id: Uuid,
        insight_type: &str,
    ) -> Result<Self, GraphError> {
        let start = std::time::Instant::now();

        let (insights, signals, clusters, edges) = tokio::try_join!(
            fetch_insights(store, user_id, insight_type),
            fetch_signals(store, user_id),
            fetch_clusters(store, user_id),
            fetch_edges(store, user_id),
        )?;

        let view = Self::derive(user_id, insight_type, &insights, &signals, &clusters, &edges);

        let stats = view.stats();
        info!(
            %user_id,
            insight_type,
            insights = stats.insights,
            insight_edges = stats.insight_edges,
            elapsed_ms = start.elapsed().as_millis(),
            "Insight view loaded"
        );

        Ok(view)
    }

    /// Pure derivation over an already-fetched snapshot. Edges are inferred over the
    /// ranked order.
    pub fn derive(
        user_id: Uuid,
        insight_type: &str,
        insights: &[Insight],
        signals: &[Signal],
        clusters: &[Cluster],
        edges: &[SignalEdge],
    ) -> Self {
        let ranked = rank_insights(insights, signals, clusters);
        let edges = correlate_insights(&ranked, edges);

        Self {
            user_id,
            insight_type: insight_type.to_string(),
            insights: ranked,
            edges,
            loaded_at: Utc::now(),
        }
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            insights: self.insights.len(),
            insight_edges: self.edges.len(),
            ..ViewStats::default()
        }
    }
}
