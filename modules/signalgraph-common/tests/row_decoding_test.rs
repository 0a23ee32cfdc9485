//! Row decoding tests.
//!
//! Rows arrive from the record store as loose JSON. These verify that the row types
//! accept what the store actually sends: renamed columns, missing optional columns,
//! and sparse change payloads.

use serde_json::json;
use uuid::Uuid;

use signalgraph_common::{pair_key, Cluster, Insight, Position, Signal, SignalEdge, Tier};

#[test]
fn insight_reads_type_column() {
    let id = Uuid::new_v4();
    let insight: Insight = serde_json::from_value(json!({
        "id": id,
        "type": "insight",
        "title": "Port congestion",
        "signal_ids": [],
        "urgency": "urgent",
        "sort_order": 3,
        "created_at": "2026-01-05T10:00:00+00:00"
    }))
    .unwrap();

    assert_eq!(insight.id, id);
    assert_eq!(insight.insight_type, "insight");
    assert_eq!(insight.sort_order, Some(3));
}

#[test]
fn insight_without_sort_order_decodes_as_none() {
    let insight: Insight = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "created_at": "2026-01-05T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(insight.sort_order, None);
    assert!(insight.signal_ids.is_empty());
    assert_eq!(insight.urgency, "");
}

#[test]
fn signal_defaults_source_count_to_zero() {
    let signal: Signal = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "cluster_id": null,
        "title": "Shipping delay",
        "created_at": "2026-01-05T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(signal.source_count, 0);
    assert!(signal.cluster_id.is_none());
}

#[test]
fn signal_edge_reason_is_optional() {
    let edge: SignalEdge = serde_json::from_value(json!({
        "source_signal_id": Uuid::new_v4(),
        "target_signal_id": Uuid::new_v4(),
        "similarity": 0.72,
        "edge_type": "causal"
    }))
    .unwrap();

    assert!(edge.reason.is_none());
    assert_eq!(edge.edge_type, "causal");
}

#[test]
fn sparse_position_payload_leaves_absent_fields_empty() {
    let position: Position = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "user_id": Uuid::new_v4(),
        "title": "Q3 stance"
    }))
    .unwrap();

    assert_eq!(position.title.as_deref(), Some("Q3 stance"));
    assert!(position.sections.is_none());
    assert!(position.created_at.is_none());
}

#[test]
fn tier_mapping_is_exact() {
    assert_eq!(Tier::from_urgency("urgent"), Tier::Urgent);
    assert_eq!(Tier::from_urgency("emerging"), Tier::Emerging);
    assert_eq!(Tier::from_urgency(""), Tier::Relevant);
    assert_eq!(Tier::from_urgency("Urgent"), Tier::Relevant);
    assert_eq!(Tier::from_urgency("low"), Tier::Relevant);
}

#[test]
fn tier_serializes_snake_case() {
    assert_eq!(serde_json::to_value(Tier::Emerging).unwrap(), json!("emerging"));
    assert_eq!(Tier::Urgent.to_string(), "urgent");
}

#[test]
fn pair_key_ignores_orientation() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(pair_key(a, b), pair_key(b, a));
}

#[test]
fn pair_key_order_matches_string_order() {
    let low = Uuid::parse_str("0b4c1a4e-0000-4000-8000-000000000001").unwrap();
    let high = Uuid::parse_str("f0000000-0000-4000-8000-000000000000").unwrap();
    assert_eq!(pair_key(high, low), (low, high));
    assert!(low.to_string() < high.to_string());
}

// --- NULL columns (to_jsonb emits `"col": null`) ---

#[test]
fn signal_null_text_columns_read_as_empty() {
    let signal: Signal = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "user_id": null,
        "cluster_id": null,
        "source_count": null,
        "urgency": null,
        "title": null,
        "summary": null,
        "created_at": "2026-01-05T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(signal.source_count, 0);
    assert_eq!(signal.urgency, "");
    assert_eq!(signal.title, "");
    assert_eq!(signal.summary, "");
}

#[test]
fn insight_null_urgency_maps_to_relevant() {
    let insight: Insight = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "type": null,
        "title": null,
        "summary": null,
        "signal_ids": null,
        "urgency": null,
        "sort_order": null,
        "created_at": "2026-01-05T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(insight.insight_type, "");
    assert!(insight.signal_ids.is_empty());
    assert_eq!(insight.sort_order, None);
    assert_eq!(Tier::from_urgency(&insight.urgency), Tier::Relevant);
}

#[test]
fn cluster_null_members_read_as_empty() {
    let cluster: Cluster = serde_json::from_value(json!({
        "id": Uuid::new_v4(),
        "name": null,
        "description": null,
        "signal_ids": null,
        "created_at": "2026-01-05T10:00:00Z"
    }))
    .unwrap();

    assert_eq!(cluster.name, "");
    assert!(cluster.signal_ids.is_empty());
}

#[test]
fn signal_edge_null_similarity_reads_as_zero() {
    let edge: SignalEdge = serde_json::from_value(json!({
        "source_signal_id": Uuid::new_v4(),
        "target_signal_id": Uuid::new_v4(),
        "similarity": null,
        "edge_type": null,
        "reason": null
    }))
    .unwrap();

    assert_eq!(edge.similarity, 0.0);
    assert_eq!(edge.edge_type, "");
}

#[test]
fn wrong_type_still_fails() {
    let result = serde_json::from_value::<Signal>(json!({
        "id": Uuid::new_v4(),
        "urgency": 5,
        "created_at": "2026-01-05T10:00:00Z"
    }));
    assert!(result.is_err());
}
