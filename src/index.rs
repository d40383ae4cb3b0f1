//! Reference index lookup over `obj_fq_name_table`
//!
//! Index columns embed the owning object's UUID after its fq-name
//! components (`domain:project:name:<uuid>`). Lookup is a linear containment
//! test over those column names, optionally restricted to the row of one type.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::model::{KeyFilter, Table};
use crate::store::Store;

/// How a needle is matched against a column name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Plain substring containment; an id that is part of a longer id matches too
    #[default]
    Substring,
    /// The needle must equal one whole `:`-delimited segment
    Segment,
}

impl MatchMode {
    pub fn matches(&self, haystack: &str, needle: &str) -> bool {
        match self {
            MatchMode::Substring => haystack.contains(needle),
            MatchMode::Segment => haystack.split(':').any(|segment| segment == needle),
        }
    }
}

/// Existence checks against the fully-qualified name index
pub struct FqNameIndex<'a> {
    store: &'a dyn Store,
    mode: MatchMode,
}

impl<'a> FqNameIndex<'a> {
    pub fn new(store: &'a dyn Store, mode: MatchMode) -> Self {
        Self { store, mode }
    }

    /// Check whether any index column references `target`.
    ///
    /// With a non-empty `kind` only the index row for that type is scanned,
    /// otherwise the whole table.
    pub fn exists(&self, kind: Option<&str>, target: &str) -> Result<bool> {
        let filter = kind
            .filter(|k| !k.is_empty())
            .map(KeyFilter::object_type);

        for cell in self.store.scan(Table::ObjFqName, filter.as_ref())? {
            let cell = cell?;
            if self.mode.matches(&cell.column, target) {
                tracing::debug!("{} indexed under {} as {}", target, cell.key, cell.column);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::store::testing::FaultyStore;
    use crate::Error;

    fn index_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(Table::ObjFqName, "virtual_network", "default:admin:net1:N1-uuid", "null").unwrap();
        store.put(Table::ObjFqName, "project", "default:admin:P1", "null").unwrap();
        store
    }

    #[test]
    fn test_exists_without_type() {
        let store = index_store();
        let index = FqNameIndex::new(&store, MatchMode::Substring);
        assert!(index.exists(None, "N1-uuid").unwrap());
        assert!(index.exists(None, "P1").unwrap());
        assert!(!index.exists(None, "missing").unwrap());
    }

    #[test]
    fn test_empty_type_scans_everything() {
        let store = index_store();
        let index = FqNameIndex::new(&store, MatchMode::Substring);
        assert!(index.exists(Some(""), "P1").unwrap());
    }

    #[test]
    fn test_exists_restricted_to_type_row() {
        let store = index_store();
        let index = FqNameIndex::new(&store, MatchMode::Substring);
        assert!(index.exists(Some("virtual-network"), "N1-uuid").unwrap());
        assert!(index.exists(Some("virtual_network"), "N1-uuid").unwrap());
        assert!(!index.exists(Some("project"), "N1-uuid").unwrap());
    }

    #[test]
    fn test_substring_false_positive_and_segment_mode() {
        let store = index_store();
        let loose = FqNameIndex::new(&store, MatchMode::Substring);
        let exact = FqNameIndex::new(&store, MatchMode::Segment);

        // "N1" is a prefix of "N1-uuid"
        assert!(loose.exists(None, "N1").unwrap());
        assert!(!exact.exists(None, "N1").unwrap());
        assert!(exact.exists(None, "N1-uuid").unwrap());
    }

    #[test]
    fn test_aborted_index_scan_is_an_error() {
        let store = index_store();
        let faulty = FaultyStore::new(&store, Table::ObjFqName, 0);
        let index = FqNameIndex::new(&faulty, MatchMode::Substring);
        assert!(matches!(index.exists(None, "missing"), Err(Error::Scan { .. })));
    }

    #[test]
    fn test_match_modes() {
        assert!(MatchMode::Substring.matches("a:bc:d", "b"));
        assert!(!MatchMode::Segment.matches("a:bc:d", "b"));
        assert!(MatchMode::Segment.matches("a:bc:d", "bc"));
    }
}
