pub mod builder;
pub mod cache;
pub mod cluster_edges;
pub mod error;
pub mod insights;
pub mod palette;
pub mod realtime;
pub mod views;

pub use builder::{build_graph, GraphParts};
pub use cache::ViewCache;
pub use cluster_edges::{aggregate_cluster_edges, SIMILARITY_THRESHOLD};
pub use error::GraphError;
pub use insights::{composite_score, correlate_insights, rank_insights, FALLBACK_CLUSTER_NAME};
pub use palette::{color_for, PALETTE};
pub use realtime::{PositionState, PositionWatcher};
pub use views::{ClusterView, InsightView, ViewStats};
