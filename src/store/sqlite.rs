//! SQLite snapshot implementation

use std::path::Path;
use rusqlite::{Connection, params};
use crate::Result;
use crate::model::{Cell, KeyFilter, Table};
use super::{schema, Scan, Store};

/// SQLite-backed copy of the object tables
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a snapshot file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory snapshot (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Cell Operations ==========

    /// Insert or replace a cell
    pub fn insert_cell(&self, table: Table, cell: &Cell) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (key, column1, value) VALUES (?1, ?2, ?3)",
                table.as_str()
            ),
            params![cell.key, cell.column, cell.value],
        )?;
        Ok(())
    }

    /// Shorthand for inserting a triple
    pub fn put(&self, table: Table, key: &str, column: &str, value: &str) -> Result<()> {
        self.insert_cell(table, &Cell::new(key, column, value))
    }

    /// Count cells in a table
    pub fn count(&self, table: Table) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.as_str()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Check whether a specific cell exists
    pub fn contains(&self, table: Table, key: &str, column: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE key = ?1 AND column1 = ?2",
                table.as_str()
            ),
            params![key, column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ========== Bulk Operations ==========

    /// Begin a transaction for bulk operations
    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Delete all cells of both tables
    pub fn clear_all(&self) -> Result<()> {
        for table in Table::all() {
            self.conn.execute(&format!("DELETE FROM {}", table.as_str()), [])?;
        }
        Ok(())
    }

    /// Replace the snapshot contents with a full copy of `source`.
    ///
    /// Runs in one transaction; an aborted source scan leaves the
    /// previous contents in place.
    pub fn import_from(&self, source: &dyn Store) -> Result<SnapshotStats> {
        self.begin_transaction()?;
        match self.copy_tables(source) {
            Ok(stats) => {
                self.commit()?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!("Snapshot rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    fn copy_tables(&self, source: &dyn Store) -> Result<SnapshotStats> {
        self.clear_all()?;
        let mut stats = SnapshotStats::default();
        for &table in Table::all() {
            let mut copied = 0;
            for cell in source.scan(table, None)? {
                self.insert_cell(table, &cell?)?;
                copied += 1;
            }
            tracing::debug!("Copied {} cells from {}", copied, table);
            match table {
                Table::ObjUuid => stats.obj_uuid = copied,
                Table::ObjFqName => stats.obj_fq_name = copied,
            }
        }
        Ok(stats)
    }

    /// Helper to convert a row to a Cell
    fn row_to_cell(row: &rusqlite::Row) -> rusqlite::Result<Cell> {
        Ok(Cell {
            key: row.get(0)?,
            column: row.get(1)?,
            value: row.get(2)?,
        })
    }
}

impl Store for SqliteStore {
    fn scan(&self, table: Table, filter: Option<&KeyFilter>) -> Result<Scan<'_>> {
        let cells: Vec<Cell> = match filter {
            Some(filter) => {
                let mut stmt = self.conn.prepare(&schema::select_row(table))?;
                let cells = stmt
                    .query_map([filter.logical_key()], Self::row_to_cell)?
                    .collect::<rusqlite::Result<_>>()?;
                cells
            }
            None => {
                let mut stmt = self.conn.prepare(&schema::select_all(table))?;
                let cells = stmt
                    .query_map([], Self::row_to_cell)?
                    .collect::<rusqlite::Result<_>>()?;
                cells
            }
        };
        Ok(Scan::new(table, cells.into_iter().map(Ok)))
    }

    fn delete(&self, table: Table, key: &str, column: &str) -> Result<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1 AND column1 = ?2", table.as_str()),
            params![key, column],
        )?;
        Ok(())
    }
}

/// Cells copied per table by a snapshot import
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SnapshotStats {
    pub obj_uuid: usize,
    pub obj_fq_name: usize,
}

impl std::fmt::Display for SnapshotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Snapshot Statistics:")?;
        writeln!(f, "  obj_uuid_table: {}", self.obj_uuid)?;
        write!(f, "  obj_fq_name_table: {}", self.obj_fq_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FaultyStore;

    fn sample_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(Table::ObjUuid, "A", "type", "\"Foo\"").unwrap();
        store.put(Table::ObjUuid, "A", "backref:Foo:B", "").unwrap();
        store.put(Table::ObjUuid, "C", "type", "\"Bar\"").unwrap();
        store.put(Table::ObjFqName, "Foo", "default:a:A", "null").unwrap();
        store
    }

    #[test]
    fn test_cell_crud() {
        let store = sample_store();
        assert_eq!(store.count(Table::ObjUuid).unwrap(), 3);
        assert!(store.contains(Table::ObjUuid, "A", "backref:Foo:B").unwrap());

        store.delete(Table::ObjUuid, "A", "backref:Foo:B").unwrap();
        assert!(!store.contains(Table::ObjUuid, "A", "backref:Foo:B").unwrap());
        assert_eq!(store.count(Table::ObjUuid).unwrap(), 2);
    }

    #[test]
    fn test_full_scan() {
        let store = sample_store();
        let cells: Vec<Cell> = store
            .scan(Table::ObjUuid, None)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].key, "A");
    }

    #[test]
    fn test_filtered_scan() {
        let store = sample_store();
        let filter = KeyFilter::exact("A");
        let cells: Vec<Cell> = store
            .scan(Table::ObjUuid, Some(&filter))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.key == "A"));
    }

    #[test]
    fn test_filtered_scan_substitutes_type_separator() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(Table::ObjFqName, "virtual_network", "d:p:net:N1", "null").unwrap();
        let filter = KeyFilter::object_type("virtual-network");
        let scan = store.scan(Table::ObjFqName, Some(&filter)).unwrap();
        assert_eq!(scan.finish().unwrap(), 1);
    }

    #[test]
    fn test_import_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");

        let source = sample_store();
        let stats = {
            let target = SqliteStore::open(&path).unwrap();
            target.import_from(&source).unwrap()
        };
        assert_eq!(stats.obj_uuid, 3);
        assert_eq!(stats.obj_fq_name, 1);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count(Table::ObjUuid).unwrap(), 3);
        assert!(reopened.contains(Table::ObjFqName, "Foo", "default:a:A").unwrap());
    }

    #[test]
    fn test_import_rolls_back_on_aborted_scan() {
        let target = SqliteStore::open_in_memory().unwrap();
        target.put(Table::ObjUuid, "old", "type", "x").unwrap();

        let source = sample_store();
        let faulty = FaultyStore::new(&source, Table::ObjFqName, 0);
        assert!(target.import_from(&faulty).is_err());

        assert_eq!(target.count(Table::ObjUuid).unwrap(), 1);
        assert!(target.contains(Table::ObjUuid, "old", "type").unwrap());
    }
}
