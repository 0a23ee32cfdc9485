//! Cluster edge aggregation: signal-level similarity edges lifted to cluster pairs.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use signalgraph_common::{pair_key, ClusterEdge, EnrichedCluster, SignalEdge};

/// Edges must be strictly above this to link two clusters. Exactly 0.5 does not.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// One edge per unordered cluster pair, in order of first supporting raw edge.
///
/// Edges touching a standalone signal, or joining a cluster to itself, are skipped.
/// The first supporting raw edge decides the edge's orientation.
pub fn aggregate_cluster_edges(clusters: &[EnrichedCluster], edges: &[SignalEdge]) -> Vec<ClusterEdge> {
    let signal_to_cluster: HashMap<Uuid, Uuid> = clusters
        .iter()
        .flat_map(|c| c.signals.iter().map(move |s| (s.id, c.cluster.id)))
        .collect();

    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();
    let mut out = Vec::new();

    for edge in edges.iter().filter(|e| e.similarity > SIMILARITY_THRESHOLD) {
        let (Some(&source), Some(&target)) = (
            signal_to_cluster.get(&edge.source_signal_id),
            signal_to_cluster.get(&edge.target_signal_id),
        ) else {
            continue;
        };

        if source == target {
            continue;
        }

        if seen.insert(pair_key(source, target)) {
            out.push(ClusterEdge { source, target });
        }
    }

    debug!(raw = edges.len(), derived = out.len(), "Cluster edges aggregated");
    out
}
