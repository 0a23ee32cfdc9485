use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Row decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Row not found: {table} id={id}")]
    NotFound { table: String, id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
