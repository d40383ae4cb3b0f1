//! Object lookups - attribute summaries and fulltext search

use std::collections::BTreeMap;

use crate::Result;
use crate::index::MatchMode;
use crate::model::{Cell, KeyFilter, Table};
use crate::store::Store;

/// Attribute columns (`type`, `fq_name*`, `parent_type`) of one object, by column name
pub type ObjectInfo = BTreeMap<String, String>;

/// Fetch the describing attributes of object `id`.
///
/// An empty map means the object row is gone or carries no attributes.
pub fn object_info(store: &dyn Store, id: &str) -> Result<ObjectInfo> {
    let filter = KeyFilter::exact(id);
    let mut info = ObjectInfo::new();
    for cell in store.scan(Table::ObjUuid, Some(&filter))? {
        let cell = cell?;
        if cell.is_attribute() {
            info.insert(cell.column, cell.value);
        }
    }
    Ok(info)
}

/// Visit every cell of both tables whose key, column name or value contains `needle`.
///
/// Returns the number of matches.
pub fn search_inside<F>(store: &dyn Store, needle: &str, mode: MatchMode, mut visit: F) -> Result<usize>
where
    F: FnMut(Table, &Cell),
{
    let mut matches = 0;
    for &table in Table::all() {
        for cell in store.scan(table, None)? {
            let cell = cell?;
            if mode.matches(&cell.key, needle)
                || mode.matches(&cell.column, needle)
                || mode.matches(&cell.value, needle)
            {
                visit(table, &cell);
                matches += 1;
            }
        }
    }
    Ok(matches)
}
