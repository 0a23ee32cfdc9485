//! RecordStore — the read and subscribe contract.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::types::{EqFilter, RowChange, RowQuery, Table};

/// Row-set reads and change subscriptions over the stored tables.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Select all columns of the rows matching `query`, in the requested order.
    async fn select(&self, query: &RowQuery) -> Result<Vec<serde_json::Value>, StoreError>;

    /// Register interest in insert/update events on `table` whose row matches `filter`.
    async fn subscribe(&self, table: Table, filter: EqFilter) -> Result<Subscription, StoreError>;
}

/// Select and decode rows into `T`. One undecodable row fails the whole read.
pub async fn fetch_rows<T, S>(store: &S, query: &RowQuery) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    store
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}

type ChangeStream = Pin<Box<dyn Stream<Item = RowChange> + Send>>;
type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Live change feed for one table. Ends when released; dropping releases.
pub struct Subscription {
    stream: Option<ChangeStream>,
    on_release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(stream: impl Stream<Item = RowChange> + Send + 'static) -> Self {
        Self {
            stream: Some(Box::pin(stream)),
            on_release: None,
        }
    }

    /// Run `hook` exactly once when the subscription is released.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Drop the underlying channel. Idempotent.
    pub fn release(&mut self) {
        self.stream = None;
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }
}

impl Stream for Subscription {
    type Item = RowChange;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().stream.as_mut() {
            Some(stream) => stream.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn released_subscription_yields_nothing() {
        let mut sub = Subscription::new(futures::stream::iter(vec![RowChange::insert(json!({}))]));
        sub.release();
        assert!(sub.is_released());
        assert!(sub.next().await.is_none());
    }

    #[test]
    fn release_hook_runs_once_including_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new(futures::stream::empty()).with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.release();
        sub.release();
        drop(sub);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
