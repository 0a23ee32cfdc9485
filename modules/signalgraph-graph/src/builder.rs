//! Graph builder: joins cluster rows with signal rows.
//!
//! Produces clusters with resolved member signals and a color, plus the standalone
//! signals no cluster claims. Every signal ends up in exactly one of the two, provided
//! no signal is listed by two clusters. Double membership is an upstream data problem
//! and is passed through: such a signal resolves in both clusters.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use signalgraph_common::{Cluster, EnrichedCluster, Signal};

use crate::palette::color_for;

#[derive(Debug, Clone, Default)]
pub struct GraphParts {
    pub clusters: Vec<EnrichedCluster>,
    pub standalone: Vec<Signal>,
}

/// Clusters keep fetch order and take their color from that position. Member ids with
/// no matching signal are dropped. Standalone signals keep fetch order.
pub fn build_graph(clusters: &[Cluster], signals: &[Signal]) -> GraphParts {
    let by_id: HashMap<Uuid, &Signal> = signals.iter().map(|s| (s.id, s)).collect();
    let mut claimed: HashSet<Uuid> = HashSet::new();
    let mut dangling = 0usize;

    let enriched: Vec<EnrichedCluster> = clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| {
            let members: Vec<Signal> = cluster
                .signal_ids
                .iter()
                .filter_map(|id| match by_id.get(id) {
                    Some(signal) => Some((*signal).clone()),
                    None => {
                        dangling += 1;
                        None
                    }
                })
                .collect();

            claimed.extend(members.iter().map(|s| s.id));

            EnrichedCluster {
                cluster: cluster.clone(),
                color: color_for(index),
                signals: members,
            }
        })
        .collect();

    let standalone: Vec<Signal> = signals
        .iter()
        .filter(|s| !claimed.contains(&s.id))
        .cloned()
        .collect();

    debug!(
        clusters = enriched.len(),
        standalone = standalone.len(),
        dangling,
        "Graph built"
    );

    GraphParts {
        clusters: enriched,
        standalone,
    }
}
