use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{error, info};
use uuid::Uuid;

use signalgraph_store::RecordStore;

use crate::error::GraphError;
use crate::views::{ClusterView, InsightView};

/// Last good derived views for one user, with atomic swap for lock-free reads.
///
/// A failed refresh leaves the previous view in place (stale but present). Nothing retries;
/// the next refresh is the caller's call.
pub struct ViewCache {
    user_id: Uuid,
    clusters: ArcSwapOption<ClusterView>,
    insights: ArcSwapOption<InsightView>,
    clusters_refreshing: AtomicBool,
    insights_refreshing: AtomicBool,
}

/// Clears the refresh flag however the refresh ends, including cancellation.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ViewCache {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            clusters: ArcSwapOption::empty(),
            insights: ArcSwapOption::empty(),
            clusters_refreshing: AtomicBool::new(false),
            insights_refreshing: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Current cluster view, if one has ever loaded.
    pub fn cluster_view(&self) -> Option<Arc<ClusterView>> {
        self.clusters.load_full()
    }

    /// Current insight view, only if it was derived for `insight_type`.
    pub fn insight_view(&self, insight_type: &str) -> Option<Arc<InsightView>> {
        self.insights
            .load_full()
            .filter(|view| view.insight_type == insight_type)
    }

    fn begin_refresh(flag: &AtomicBool) -> Option<RefreshGuard<'_>> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RefreshGuard(flag))
    }

    /// Re-derive the cluster view. Returns `Ok(false)` if another refresh was already running.
    pub async fn refresh_clusters<S: RecordStore + ?Sized>(&self, store: &S) -> Result<bool, GraphError> {
        let Some(_guard) = Self::begin_refresh(&self.clusters_refreshing) else {
            info!(user_id = %self.user_id, "Cluster view refresh already in progress, skipping");
            return Ok(false);
        };

        match ClusterView::load(store, self.user_id).await {
            Ok(view) => {
                self.clusters.store(Some(Arc::new(view)));
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, user_id = %self.user_id, "Failed to refresh cluster view, keeping stale data");
                Err(e)
            }
        }
    }

    /// Re-derive the insight view for `insight_type`. Same semantics as `refresh_clusters`.
    pub async fn refresh_insights<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        insight_type: &str,
    ) -> Result<bool, GraphError> {
        let Some(_guard) = Self::begin_refresh(&self.insights_refreshing) else {
            info!(user_id = %self.user_id, "Insight view refresh already in progress, skipping");
            return Ok(false);
        };

        match InsightView::load(store, self.user_id, insight_type).await {
            Ok(view) => {
                self.insights.store(Some(Arc::new(view)));
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, user_id = %self.user_id, insight_type, "Failed to refresh insight view, keeping stale data");
                Err(e)
            }
        }
    }
}
