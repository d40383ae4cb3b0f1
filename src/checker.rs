//! Consistency checker for back references
//!
//! Scans `obj_uuid_table` for `backref:<type>:<uuid>` columns and verifies
//! every referenced object two ways:
//! - the fq-name index must know the UUID (else the reference is *dangling*)
//! - the object row must still carry attributes (else it is *absent*)
//!
//! Malformed reference columns are recorded and skipped; an aborted scan
//! fails the whole check.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;

use crate::index::{FqNameIndex, MatchMode};
use crate::model::{parse_column, BackRef, Cell, ParsedColumn, Table};
use crate::object::object_info;
use crate::store::Store;
use crate::{Error, Result};

/// Which references a check examines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckScope {
    /// Every reference in the primary table
    All,
    /// References pointing at this id, or held by the row with this id
    One(String),
}

impl CheckScope {
    /// Check if a reference from row `source` to `target` is in scope
    pub fn includes(&self, source: &str, target: &str) -> bool {
        match self {
            CheckScope::All => true,
            CheckScope::One(id) => target == id || source == id,
        }
    }

    fn includes_row(&self, source: &str) -> bool {
        match self {
            CheckScope::All => true,
            CheckScope::One(id) => source == id,
        }
    }
}

impl FromStr for CheckScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(Error::InvalidArgument("object id must not be empty".to_string())),
            "all" => Ok(CheckScope::All),
            id => Ok(CheckScope::One(id.to_string())),
        }
    }
}

impl std::fmt::Display for CheckScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckScope::All => write!(f, "all"),
            CheckScope::One(id) => write!(f, "{}", id),
        }
    }
}

/// Severity of a broken reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    /// Target missing from the fq-name index, but its row still has attributes
    Dangling,
    /// Target missing from the index and its row has no attributes
    Absent,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Dangling => "dangling",
            FindingStatus::Absent => "absent",
        }
    }
}

impl std::fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One broken reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Row holding the reference column
    pub source: String,
    /// Full reference column name
    pub column: String,
    /// Declared type of the target
    pub kind: String,
    /// Referenced object id
    pub target: String,
    pub status: FindingStatus,
}

/// A reference column that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedColumn {
    pub source: String,
    pub column: String,
    pub reason: String,
}

/// Outcome of one check run
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub scope: CheckScope,
    /// Cells read from the primary table
    pub scanned: usize,
    /// Well-formed references in scope
    pub examined: usize,
    pub findings: Vec<Finding>,
    pub malformed: Vec<MalformedColumn>,
}

impl CheckReport {
    fn new(scope: CheckScope) -> Self {
        Self {
            scope,
            scanned: 0,
            examined: 0,
            findings: Vec::new(),
            malformed: Vec::new(),
        }
    }

    pub fn dangling_count(&self) -> usize {
        self.count(FindingStatus::Dangling)
    }

    pub fn absent_count(&self) -> usize {
        self.count(FindingStatus::Absent)
    }

    fn count(&self, status: FindingStatus) -> usize {
        self.findings.iter().filter(|f| f.status == status).count()
    }

    /// Distinct targets classified as absent, sorted
    pub fn absent_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .findings
            .iter()
            .filter(|f| f.status == FindingStatus::Absent)
            .map(|f| f.target.clone())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Cross-checks references against the index and the object rows.
///
/// Lookups are memoised for the lifetime of the checker, so one checker
/// should serve one run.
pub struct ConsistencyChecker<'a> {
    store: &'a dyn Store,
    index: FqNameIndex<'a>,
    indexed: HashMap<BackRef, bool>,
    present: HashMap<String, bool>,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(store: &'a dyn Store, mode: MatchMode) -> Self {
        Self {
            store,
            index: FqNameIndex::new(store, mode),
            indexed: HashMap::new(),
            present: HashMap::new(),
        }
    }

    /// Check every reference in the primary table
    pub fn check_all(&mut self) -> Result<CheckReport> {
        self.check(CheckScope::All)
    }

    /// Check the references involving one object id
    pub fn check_one(&mut self, id: &str) -> Result<CheckReport> {
        self.check(CheckScope::One(id.to_string()))
    }

    pub fn check(&mut self, scope: CheckScope) -> Result<CheckReport> {
        tracing::info!("Checking back references for {}", scope);
        let mut report = CheckReport::new(scope);
        let store = self.store;

        for cell in store.scan(Table::ObjUuid, None)? {
            let cell = cell?;
            report.scanned += 1;

            let backref = match parse_column(&cell.column) {
                ParsedColumn::Other => continue,
                ParsedColumn::Malformed { reason } => {
                    if report.scope.includes_row(&cell.key) {
                        tracing::warn!(
                            "Skipping malformed reference column {:?} on {}: {}",
                            cell.column,
                            cell.key,
                            reason
                        );
                        report.malformed.push(MalformedColumn {
                            source: cell.key,
                            column: cell.column,
                            reason: reason.to_string(),
                        });
                    }
                    continue;
                }
                ParsedColumn::BackRef(backref) => backref,
            };

            if !report.scope.includes(&cell.key, &backref.target) {
                continue;
            }
            report.examined += 1;

            if let Some(finding) = self.verify(&cell, backref)? {
                report.findings.push(finding);
            }
        }

        tracing::info!(
            "Examined {} references: {} dangling, {} absent, {} malformed",
            report.examined,
            report.dangling_count(),
            report.absent_count(),
            report.malformed.len()
        );
        Ok(report)
    }

    fn verify(&mut self, cell: &Cell, backref: BackRef) -> Result<Option<Finding>> {
        if self.is_indexed(&backref)? {
            return Ok(None);
        }

        let status = if self.has_attributes(&backref.target)? {
            FindingStatus::Dangling
        } else {
            FindingStatus::Absent
        };
        tracing::debug!(
            "{} reference {} on {} -> {}",
            status,
            cell.column,
            cell.key,
            backref.target
        );

        Ok(Some(Finding {
            source: cell.key.clone(),
            column: cell.column.clone(),
            kind: backref.kind,
            target: backref.target,
            status,
        }))
    }

    fn is_indexed(&mut self, backref: &BackRef) -> Result<bool> {
        if let Some(&known) = self.indexed.get(backref) {
            return Ok(known);
        }
        let found = self.index.exists(Some(&backref.kind), &backref.target)?;
        self.indexed.insert(backref.clone(), found);
        Ok(found)
    }

    fn has_attributes(&mut self, id: &str) -> Result<bool> {
        if let Some(&known) = self.present.get(id) {
            return Ok(known);
        }
        let found = !object_info(self.store, id)?.is_empty();
        self.present.insert(id.to_string(), found);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::store::testing::FaultyStore;

    fn object(store: &SqliteStore, id: &str, kind: &str) {
        store.put(Table::ObjUuid, id, "type", &format!("\"{}\"", kind)).unwrap();
        store.put(Table::ObjUuid, id, "fq_name", &format!("[\"d\",\"{}\"]", id)).unwrap();
        store.put(Table::ObjFqName, kind, &format!("d:{}:{}", id, id), "null").unwrap();
    }

    fn backref(store: &SqliteStore, source: &str, kind: &str, target: &str) {
        store
            .put(Table::ObjUuid, source, &format!("backref:{}:{}", kind, target), "")
            .unwrap();
    }

    #[test]
    fn test_consistent_reference_has_no_findings() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        object(&store, "B", "Foo");
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.examined, 1);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_missing_everywhere_is_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.status, FindingStatus::Absent);
        assert_eq!(finding.source, "A");
        assert_eq!(finding.column, "backref:Foo:B");
        assert_eq!(finding.kind, "Foo");
        assert_eq!(finding.target, "B");
        assert_eq!(report.absent_targets(), vec!["B".to_string()]);
    }

    #[test]
    fn test_unindexed_but_present_is_dangling() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        store.put(Table::ObjUuid, "B", "type", "\"Foo\"").unwrap();
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.dangling_count(), 1);
        assert_eq!(report.absent_count(), 0);
    }

    #[test]
    fn test_row_without_attributes_counts_as_absent() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        store.put(Table::ObjUuid, "B", "backref:Foo:A", "").unwrap();
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_one("B").unwrap();
        let to_b: Vec<_> = report.findings.iter().filter(|f| f.target == "B").collect();
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0].status, FindingStatus::Absent);
    }

    #[test]
    fn test_index_lookup_is_type_scoped() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        object(&store, "B", "Bar");
        // declared type disagrees with the index row B lives under
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.dangling_count(), 1);
    }

    #[test]
    fn test_check_one_filters_by_target_or_source() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        object(&store, "C", "Foo");
        backref(&store, "A", "Foo", "B");
        backref(&store, "C", "Foo", "D");

        let mut checker = ConsistencyChecker::new(&store, MatchMode::Substring);
        let by_target = checker.check_one("B").unwrap();
        assert_eq!(by_target.examined, 1);
        assert_eq!(by_target.findings[0].target, "B");

        let by_source = checker.check_one("C").unwrap();
        assert_eq!(by_source.examined, 1);
        assert_eq!(by_source.findings[0].target, "D");

        let unrelated = checker.check_one("Z").unwrap();
        assert_eq!(unrelated.examined, 0);
    }

    #[test]
    fn test_malformed_columns_are_skipped() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        store.put(Table::ObjUuid, "A", "backref:Foo", "").unwrap();
        store.put(Table::ObjUuid, "A", "backref", "").unwrap();
        backref(&store, "A", "Foo", "B");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.malformed.len(), 2);
        assert_eq!(report.examined, 1);
        assert_eq!(report.absent_count(), 1);
    }

    #[test]
    fn test_counts_every_reference() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        object(&store, "B", "Foo");
        backref(&store, "A", "Foo", "B");
        backref(&store, "B", "Foo", "A");
        backref(&store, "B", "Foo", "X");
        backref(&store, "A", "Foo", "X");

        let report = ConsistencyChecker::new(&store, MatchMode::Substring).check_all().unwrap();
        assert_eq!(report.examined, 4);
        assert_eq!(report.absent_count(), 2);
        assert_eq!(report.absent_targets(), vec!["X".to_string()]);
    }

    #[test]
    fn test_aborted_primary_scan_fails_check() {
        let store = SqliteStore::open_in_memory().unwrap();
        object(&store, "A", "Foo");
        backref(&store, "A", "Foo", "B");

        let faulty = FaultyStore::new(&store, Table::ObjUuid, 1);
        let result = ConsistencyChecker::new(&faulty, MatchMode::Substring).check_all();
        assert!(matches!(result, Err(Error::Scan { .. })));
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<CheckScope>().unwrap(), CheckScope::All);
        assert_eq!("A".parse::<CheckScope>().unwrap(), CheckScope::One("A".to_string()));
        assert!("".parse::<CheckScope>().is_err());
    }
}
