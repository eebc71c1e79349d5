pub mod connection;
pub mod models;
pub mod repository;

pub use connection::connect_lazy;
pub use models::{UpdateOutcome, User};
pub use repository::{UserRepository, UserStore};

use thiserror::Error;

/// A fault in the underlying store, as opposed to "no such row".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("failed to decode column `{column}`: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}
