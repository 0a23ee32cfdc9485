//! Insight correlation and ranking.
//!
//! Ranking is per insight: score and tier read only the insight's own fields and its
//! resolved signals, so one insight never moves another's score. Correlation links two
//! insights when a raw signal edge has one endpoint in each insight's signal set.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use signalgraph_common::{Cluster, Insight, InsightEdge, InsightWithData, Signal, SignalEdge, Tier};

/// Cluster label used when the lead signal has no (known) cluster, or there is no lead signal.
pub const FALLBACK_CLUSTER_NAME: &str = "INTELLIGENCE";

/// Weighted blend of reference volume, inverse rank and evidence breadth.
///
/// `total_refs * 0.5 + (100 - sort_order) * 0.3 + (signal_count * 10) * 0.2`, with a
/// missing sort order read as 0. Evaluated left to right so equal inputs give
/// bit-identical scores.
pub fn composite_score(total_refs: u64, sort_order: Option<i32>, signal_count: usize) -> f64 {
    let inverse_rank = 100.0 - f64::from(sort_order.unwrap_or(0));
    let breadth = signal_count as f64 * 10.0;
    total_refs as f64 * 0.5 + inverse_rank * 0.3 + breadth * 0.2
}

/// Enrich every insight and order by composite score, highest first.
///
/// The sort is stable: equal scores keep their upstream order, which carries the
/// caller's own tie-break.
pub fn rank_insights(insights: &[Insight], signals: &[Signal], clusters: &[Cluster]) -> Vec<InsightWithData> {
    let by_id: HashMap<Uuid, &Signal> = signals.iter().map(|s| (s.id, s)).collect();
    let cluster_names: HashMap<Uuid, &str> = clusters.iter().map(|c| (c.id, c.name.as_str())).collect();

    let mut ranked: Vec<InsightWithData> = insights
        .iter()
        .map(|insight| enrich(insight, &by_id, &cluster_names))
        .collect();

    ranked.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(Ordering::Equal)
    });

    debug!(insights = ranked.len(), "Insights ranked");
    ranked
}

fn enrich(
    insight: &Insight,
    by_id: &HashMap<Uuid, &Signal>,
    cluster_names: &HashMap<Uuid, &str>,
) -> InsightWithData {
    let signals: Vec<Signal> = insight
        .signal_ids
        .iter()
        .filter_map(|id| by_id.get(id).map(|s| (*s).clone()))
        .collect();

    let total_refs: u64 = signals.iter().map(|s| u64::from(s.source_count)).sum();

    let cluster_name = signals
        .first()
        .and_then(|lead| lead.cluster_id)
        .and_then(|cid| cluster_names.get(&cid))
        .map(|name| name.to_string())
        .unwrap_or_else(|| FALLBACK_CLUSTER_NAME.to_string());

    let composite_score = composite_score(total_refs, insight.sort_order, signals.len());

    InsightWithData {
        insight: insight.clone(),
        tier: Tier::from_urgency(&insight.urgency),
        total_refs,
        cluster_name,
        composite_score,
        signals,
    }
}

/// Infer insight-to-insight edges from raw signal edges.
///
/// For each raw edge in order, every insight pair `(x, y)` with `x.id < y.id` whose
/// signal sets split the edge's endpoints one each (either direction) is linked, unless
/// that pair is already linked. The first supporting edge supplies the relation and label.
/// Within one raw edge, pairs are emitted in `(index of x, index of y)` order over
/// `insights`.
///
/// Candidate pairs come from a signal → insights index rather than testing every pair
/// against every edge; the output is the same.
pub fn correlate_insights(insights: &[InsightWithData], edges: &[SignalEdge]) -> Vec<InsightEdge> {
    let mut holders: HashMap<Uuid, Vec<usize>> = HashMap::new();
    for (idx, item) in insights.iter().enumerate() {
        let resolved: HashSet<Uuid> = item.signals.iter().map(|s| s.id).collect();
        for signal_id in resolved {
            holders.entry(signal_id).or_default().push(idx);
        }
    }

    let mut linked: HashSet<(Uuid, Uuid)> = HashSet::new();
    let mut out = Vec::new();

    for edge in edges {
        let (Some(left), Some(right)) = (
            holders.get(&edge.source_signal_id),
            holders.get(&edge.target_signal_id),
        ) else {
            continue;
        };

        let mut pairs: Vec<(usize, usize)> = Vec::with_capacity(left.len() * right.len());
        for &x in left {
            for &y in right {
                match insights[x].insight.id.cmp(&insights[y].insight.id) {
                    Ordering::Less => pairs.push((x, y)),
                    Ordering::Greater => pairs.push((y, x)),
                    Ordering::Equal => {}
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();

        for (i, j) in pairs {
            let source = insights[i].insight.id;
            let target = insights[j].insight.id;
            if linked.insert((source, target)) {
                out.push(InsightEdge {
                    source,
                    target,
                    relation: edge.edge_type.clone(),
                    label: edge.reason.clone(),
                });
            }
        }
    }

    debug!(raw = edges.len(), derived = out.len(), "Insight edges correlated");
    out
}
