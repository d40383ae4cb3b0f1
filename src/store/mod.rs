//! Store Layer - wide-row access behind one trait
//!
//! Backends:
//! - `CassandraStore`: a live cluster session (scylla driver)
//! - `SqliteStore`: an offline snapshot of both tables
//!
//! Every read is a `Scan`: a lazy, single-pass cursor of `(key, column1, value)`
//! cells. The first error ends the scan and is the only signal that it aborted.

pub mod cassandra;
pub mod schema;
pub mod sqlite;

pub use cassandra::CassandraStore;
pub use sqlite::SqliteStore;

use crate::model::{Cell, KeyFilter, Table};
use crate::Result;

/// Read and point-delete access to the object tables
pub trait Store {
    /// Start a scan over `table`, optionally restricted to one row key
    fn scan(&self, table: Table, filter: Option<&KeyFilter>) -> Result<Scan<'_>>;

    /// Delete a single `(key, column)` cell
    fn delete(&self, table: Table, key: &str, column: &str) -> Result<()>;
}

/// Lazy cursor over the cells of one table scan.
///
/// Not restartable: once exhausted, a fresh scan has to be requested from the
/// store. Iteration stops after the first error.
pub struct Scan<'a> {
    table: Table,
    cells: Box<dyn Iterator<Item = Result<Cell>> + 'a>,
    seen: usize,
    done: bool,
}

impl<'a> Scan<'a> {
    pub fn new(table: Table, cells: impl Iterator<Item = Result<Cell>> + 'a) -> Self {
        Self {
            table,
            cells: Box::new(cells),
            seen: 0,
            done: false,
        }
    }

    /// Table this scan reads
    pub fn table(&self) -> Table {
        self.table
    }

    /// Number of cells yielded so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Drain the remaining cells and report whether the scan completed cleanly
    pub fn finish(mut self) -> Result<usize> {
        for cell in self.by_ref() {
            cell?;
        }
        Ok(self.seen)
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cells.next() {
            Some(Ok(cell)) => {
                self.seen += 1;
                Some(Ok(cell))
            }
            Some(Err(e)) => {
                tracing::debug!("Scan of {} aborted after {} cells", self.table, self.seen);
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl std::fmt::Debug for Scan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scan")
            .field("table", &self.table)
            .field("seen", &self.seen)
            .field("done", &self.done)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn cells(n: usize) -> Vec<Result<Cell>> {
        (0..n).map(|i| Ok(Cell::new(format!("k{}", i), "type", "x"))).collect()
    }

    #[test]
    fn test_scan_counts_and_finishes() {
        let mut scan = Scan::new(Table::ObjUuid, cells(3).into_iter());
        assert!(scan.next().unwrap().is_ok());
        assert_eq!(scan.seen(), 1);
        assert_eq!(scan.finish().unwrap(), 3);
    }

    #[test]
    fn test_scan_stops_after_error() {
        let mut items = cells(1);
        items.push(Err(Error::Scan {
            table: "obj_uuid_table".to_string(),
            message: "timeout".to_string(),
        }));
        items.extend(cells(2));

        let mut scan = Scan::new(Table::ObjUuid, items.into_iter());
        assert!(scan.next().unwrap().is_ok());
        assert!(scan.next().unwrap().is_err());
        assert!(scan.next().is_none());
        assert_eq!(scan.seen(), 1);
    }

    #[test]
    fn test_finish_reports_abort() {
        let items = vec![Err(Error::Scan {
            table: "obj_uuid_table".to_string(),
            message: "timeout".to_string(),
        })];
        let scan = Scan::new(Table::ObjUuid, items.into_iter());
        assert!(matches!(scan.finish(), Err(Error::Scan { .. })));
    }
}
