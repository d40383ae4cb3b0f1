//! # cassref - reference consistency for wide-column object stores
//!
//! Objects live as sparse rows in `obj_uuid_table`; a separate
//! `obj_fq_name_table` maps fully-qualified names to UUIDs. The two drift
//! apart when writers fail halfway, leaving `backref:<type>:<uuid>` columns
//! that point at objects which no longer exist.
//!
//! cassref provides:
//! - Blob-literal key encoding for point lookups
//! - A `Store` abstraction over a live cluster or a SQLite snapshot
//! - Reference index lookup against the fq-name table
//! - A consistency checker classifying references as dangling or absent
//! - A guarded repairer that deletes stale reference and attribute columns

pub mod key;
pub mod model;
pub mod store;
pub mod object;
pub mod index;
pub mod checker;
pub mod repair;
pub mod output;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use checker::{CheckReport, CheckScope, ConsistencyChecker, Finding, FindingStatus};
pub use config::ConnectionConfig;
pub use index::{FqNameIndex, MatchMode};
pub use model::{BackRef, Cell, KeyFilter, ParsedColumn, Table};
pub use repair::{RepairAction, RepairOutcome, RepairReport, Repairer};
pub use store::{CassandraStore, Scan, SqliteStore, Store};

/// Result type alias for cassref operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cassref operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Scan of {table} aborted: {message}")]
    Scan { table: String, message: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Snapshot error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
