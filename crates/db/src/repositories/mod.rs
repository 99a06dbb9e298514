use concierge_core::errors::CollaboratorError;
use thiserror::Error;

pub mod analytics;
pub mod memory;
pub mod order;
pub mod product;
pub mod session;

pub use analytics::SqlAnalyticsSink;
pub use memory::{
    InMemoryAnalyticsSink, InMemoryCatalog, InMemoryOrderDirectory, InMemorySessionCache,
};
pub use order::SqlOrderDirectory;
pub use product::SqlCatalog;
pub use session::SqlSessionCache;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for CollaboratorError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

pub(crate) fn parse_u32(field: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{field} is out of range: {value}")))
}

pub(crate) fn parse_json_list(field: &str, raw: &str) -> Result<Vec<String>, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{field} is not a JSON list: {error}")))
}
