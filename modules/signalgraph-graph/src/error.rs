use thiserror::Error;

use signalgraph_store::{StoreError, Table};

#[derive(Error, Debug)]
pub enum GraphError {
    /// A record store read rejected. The view it belonged to was not derived.
    #[error("Fetch of {table} failed: {source}")]
    Fetch {
        table: Table,
        #[source]
        source: StoreError,
    },

    #[error("Subscription to {table} failed: {source}")]
    Subscribe {
        table: Table,
        #[source]
        source: StoreError,
    },
}

impl GraphError {
    pub fn fetch(table: Table) -> impl FnOnce(StoreError) -> Self {
        move |source| GraphError::Fetch { table, source }
    }
}
