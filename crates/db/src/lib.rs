//! SQLite persistence for the concierge runtime: session cache, order and
//! catalog lookups, and the conversation analytics log.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    InMemoryAnalyticsSink, InMemoryCatalog, InMemoryOrderDirectory, InMemorySessionCache,
    RepositoryError, SqlAnalyticsSink, SqlCatalog, SqlOrderDirectory, SqlSessionCache,
};
