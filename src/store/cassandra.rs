//! Live cluster connector
//!
//! Wraps one scylla `Session` and a private current-thread runtime, so every
//! statement blocks the caller until the round trip completes. Exactly one
//! session is opened per invocation and released when the store is closed
//! or dropped.

use std::time::Duration;

use futures_util::StreamExt;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::value::CqlValue;
use tokio::runtime::Runtime;

use super::{Scan, Store};
use crate::config::ConnectionConfig;
use crate::key::encode_key;
use crate::model::{Cell, KeyFilter, Table};
use crate::{Error, Result};

/// Any CQL type is accepted per column; blobs and text are both common
type RawRow = (Option<CqlValue>, Option<CqlValue>, Option<CqlValue>);

/// Store backed by a live Cassandra-compatible cluster
pub struct CassandraStore {
    // Declared before the runtime so the session is torn down first
    session: Session,
    runtime: Runtime,
    config: ConnectionConfig,
}

impl CassandraStore {
    /// Open a session against `config.server:config.port` using `config.keyspace`
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let address = config.node_address();
        tracing::debug!("Connecting to {} (keyspace {})", address, config.keyspace);

        let session = runtime
            .block_on(
                SessionBuilder::new()
                    .known_node(&address)
                    .use_keyspace(config.keyspace.as_str(), false)
                    .build(),
            )
            .map_err(|e| Error::Connection(format!("{}: {}", address, e)))?;

        tracing::info!("Connected to {} (keyspace {})", address, config.keyspace);
        Ok(Self {
            session,
            runtime,
            config: config.clone(),
        })
    }

    /// Release the session. Background driver tasks get a short grace period
    /// and are then abandoned; closing never fails.
    pub fn close(self) {
        let Self {
            session,
            runtime,
            config,
        } = self;
        drop(session);
        runtime.shutdown_timeout(Duration::from_secs(5));
        tracing::debug!("Closed session to {}", config.node_address());
    }
}

impl Store for CassandraStore {
    fn scan(&self, table: Table, filter: Option<&KeyFilter>) -> Result<Scan<'_>> {
        let cql = select_statement(table, filter);
        tracing::debug!("{}", cql);

        let pager = self
            .runtime
            .block_on(self.session.query_iter(cql, ()))
            .map_err(|e| scan_error(table, e))?;
        let mut rows = Box::pin(
            pager
                .rows_stream::<RawRow>()
                .map_err(|e| scan_error(table, e))?,
        );

        let runtime = &self.runtime;
        let cells = std::iter::from_fn(move || loop {
            match runtime.block_on(rows.next())? {
                Ok(row) => {
                    if let Some(cell) = row_to_cell(table, row) {
                        return Some(Ok(cell));
                    }
                }
                Err(e) => return Some(Err(scan_error(table, e))),
            }
        });
        Ok(Scan::new(table, cells))
    }

    fn delete(&self, table: Table, key: &str, column: &str) -> Result<()> {
        let cql = delete_statement(table, key, column);
        tracing::debug!("{}", cql);

        self.runtime
            .block_on(self.session.query_unpaged(cql, ()))
            .map_err(|e| Error::Query(format!("delete {}/{} from {}: {}", key, column, table, e)))?;
        Ok(())
    }
}

fn scan_error(table: Table, e: impl std::fmt::Display) -> Error {
    Error::Scan {
        table: table.to_string(),
        message: e.to_string(),
    }
}

/// Build the SELECT for a full or single-row scan
pub fn select_statement(table: Table, filter: Option<&KeyFilter>) -> String {
    match filter {
        Some(filter) => format!(
            "SELECT key, column1, value FROM {} WHERE key = {}",
            table.as_str(),
            filter.wire_key()
        ),
        None => format!("SELECT key, column1, value FROM {}", table.as_str()),
    }
}

/// Build the point DELETE for one cell
pub fn delete_statement(table: Table, key: &str, column: &str) -> String {
    format!(
        "DELETE FROM {} WHERE key = {} AND column1 = {}",
        table.as_str(),
        encode_key(key, false),
        encode_key(column, false)
    )
}

/// Keys and column names are re-encoded for deletes, so they must survive
/// the trip through `String` unchanged. Cells where they do not are skipped.
fn row_to_cell(table: Table, (key, column, value): RawRow) -> Option<Cell> {
    match (cql_to_identifier(key), cql_to_identifier(column)) {
        (Ok(key), Ok(column)) => Some(Cell {
            key,
            column,
            value: cql_to_text(value),
        }),
        (Err(bytes), _) | (_, Err(bytes)) => {
            tracing::warn!("Skipping cell in {} with non-UTF-8 blob 0x{}", table, hex::encode(bytes));
            None
        }
    }
}

fn cql_to_identifier(value: Option<CqlValue>) -> std::result::Result<String, Vec<u8>> {
    match value {
        Some(CqlValue::Blob(bytes)) => String::from_utf8(bytes).map_err(|e| e.into_bytes()),
        other => Ok(cql_to_text(other)),
    }
}

fn cql_to_text(value: Option<CqlValue>) -> String {
    match value {
        None => String::new(),
        Some(CqlValue::Text(s)) | Some(CqlValue::Ascii(s)) => s,
        Some(CqlValue::Blob(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(other) => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_full_table() {
        assert_eq!(
            select_statement(Table::ObjFqName, None),
            "SELECT key, column1, value FROM obj_fq_name_table"
        );
    }

    #[test]
    fn test_select_row_uses_blob_literal() {
        let filter = KeyFilter::exact("AB");
        assert_eq!(
            select_statement(Table::ObjUuid, Some(&filter)),
            "SELECT key, column1, value FROM obj_uuid_table WHERE key = 0x4142"
        );
    }

    #[test]
    fn test_select_type_row_substitutes_hyphens() {
        let filter = KeyFilter::object_type("a-b");
        assert!(select_statement(Table::ObjFqName, Some(&filter)).ends_with("key = 0x615f62"));
    }

    #[test]
    fn test_delete_statement() {
        assert_eq!(
            delete_statement(Table::ObjUuid, "A", "t"),
            "DELETE FROM obj_uuid_table WHERE key = 0x41 AND column1 = 0x74"
        );
    }

    #[test]
    fn test_cql_to_text() {
        assert_eq!(cql_to_text(None), "");
        assert_eq!(cql_to_text(Some(CqlValue::Text("x".to_string()))), "x");
        assert_eq!(cql_to_text(Some(CqlValue::Blob(b"backref:Foo:B".to_vec()))), "backref:Foo:B");
    }

    #[test]
    fn test_row_to_cell_decodes_blobs() {
        let row = (
            Some(CqlValue::Blob(b"A".to_vec())),
            Some(CqlValue::Blob(b"backref:Foo:B".to_vec())),
            None,
        );
        let cell = row_to_cell(Table::ObjUuid, row).unwrap();
        assert_eq!(cell, Cell::new("A", "backref:Foo:B", ""));
        assert_eq!(
            delete_statement(Table::ObjUuid, &cell.key, &cell.column),
            "DELETE FROM obj_uuid_table WHERE key = 0x41 AND column1 = 0x6261636b7265663a466f6f3a42"
        );
    }

    #[test]
    fn test_row_to_cell_skips_non_utf8_identifiers() {
        let bad_key = (
            Some(CqlValue::Blob(vec![0x41, 0xff])),
            Some(CqlValue::Blob(b"type".to_vec())),
            None,
        );
        assert!(row_to_cell(Table::ObjUuid, bad_key).is_none());

        let bad_column = (
            Some(CqlValue::Blob(b"A".to_vec())),
            Some(CqlValue::Blob(vec![0xc3, 0x28])),
            None,
        );
        assert!(row_to_cell(Table::ObjUuid, bad_column).is_none());

        let bad_value = (
            Some(CqlValue::Blob(b"A".to_vec())),
            Some(CqlValue::Blob(b"type".to_vec())),
            Some(CqlValue::Blob(vec![0xff])),
        );
        assert!(row_to_cell(Table::ObjUuid, bad_value).is_some());
    }
}
