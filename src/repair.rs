//! Repairer - guarded deletion of stale columns
//!
//! Both repairs first ask the fq-name index (across all types) whether the
//! target is still known. If it is, the object is live and nothing is
//! touched. Otherwise matching cells are collected and removed one point
//! delete at a time; a failure midway leaves earlier deletes in place.

use serde::Serialize;

use crate::index::{FqNameIndex, MatchMode};
use crate::model::{parse_column, KeyFilter, ParsedColumn, Table};
use crate::store::Store;
use crate::{Error, Result};

/// Which repair ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Remove `backref:*:<target>` columns from every row
    ClearBackrefs,
    /// Remove every column of the target's own row
    ClearProperties,
}

impl RepairAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairAction::ClearBackrefs => "clear-backref",
            RepairAction::ClearProperties => "clear-props",
        }
    }
}

impl std::fmt::Display for RepairAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// The target is still indexed, so it is considered live
    Refused,
    /// Stale cells were removed (or, on a dry run, would have been)
    Cleared { deleted: usize },
}

/// A `(row, column)` pair a repair removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedCell {
    pub key: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub target: String,
    pub action: RepairAction,
    pub dry_run: bool,
    pub outcome: RepairOutcome,
    pub removed: Vec<RemovedCell>,
}

impl RepairReport {
    /// Number of cells deleted; zero when refused
    pub fn deleted(&self) -> usize {
        match self.outcome {
            RepairOutcome::Refused => 0,
            RepairOutcome::Cleared { deleted } => deleted,
        }
    }

    pub fn is_refused(&self) -> bool {
        self.outcome == RepairOutcome::Refused
    }
}

pub struct Repairer<'a> {
    store: &'a dyn Store,
    index: FqNameIndex<'a>,
    dry_run: bool,
}

impl<'a> Repairer<'a> {
    pub fn new(store: &'a dyn Store, mode: MatchMode) -> Self {
        Self {
            store,
            index: FqNameIndex::new(store, mode),
            dry_run: false,
        }
    }

    /// Report what would be deleted without deleting anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Delete every reference column, on any row, whose embedded target is `target`
    pub fn clear_stale_references(&self, target: &str) -> Result<RepairReport> {
        let action = RepairAction::ClearBackrefs;
        if let Some(refused) = self.guard(action, target)? {
            return Ok(refused);
        }

        let mut stale = Vec::new();
        for cell in self.store.scan(Table::ObjUuid, None)? {
            let cell = cell?;
            if let ParsedColumn::BackRef(backref) = parse_column(&cell.column) {
                if backref.target == target {
                    stale.push(RemovedCell {
                        key: cell.key,
                        column: cell.column,
                    });
                }
            }
        }

        self.remove(action, target, stale)
    }

    /// Delete every column of `target`'s own row
    pub fn clear_orphaned_properties(&self, target: &str) -> Result<RepairReport> {
        let action = RepairAction::ClearProperties;
        if let Some(refused) = self.guard(action, target)? {
            return Ok(refused);
        }

        let filter = KeyFilter::exact(target);
        let mut orphaned = Vec::new();
        for cell in self.store.scan(Table::ObjUuid, Some(&filter))? {
            let cell = cell?;
            orphaned.push(RemovedCell {
                key: cell.key,
                column: cell.column,
            });
        }

        self.remove(action, target, orphaned)
    }

    /// Refuse when the target is still indexed under any type
    fn guard(&self, action: RepairAction, target: &str) -> Result<Option<RepairReport>> {
        if target.trim().is_empty() {
            return Err(Error::InvalidArgument("object id must not be empty".to_string()));
        }

        if self.index.exists(None, target)? {
            tracing::warn!("{} refused: {} still has an fq-name index entry", action, target);
            return Ok(Some(RepairReport {
                target: target.to_string(),
                action,
                dry_run: self.dry_run,
                outcome: RepairOutcome::Refused,
                removed: Vec::new(),
            }));
        }
        Ok(None)
    }

    fn remove(&self, action: RepairAction, target: &str, cells: Vec<RemovedCell>) -> Result<RepairReport> {
        if !self.dry_run {
            for (done, cell) in cells.iter().enumerate() {
                if let Err(e) = self.store.delete(Table::ObjUuid, &cell.key, &cell.column) {
                    tracing::error!(
                        "{} for {} stopped after {} of {} deletes",
                        action,
                        target,
                        done,
                        cells.len()
                    );
                    return Err(e);
                }
                tracing::info!("Deleted {} from {}", cell.column, cell.key);
            }
        }

        tracing::info!(
            "{} for {}: {} cells{}",
            action,
            target,
            cells.len(),
            if self.dry_run { " (dry run)" } else { "" }
        );
        Ok(RepairReport {
            target: target.to_string(),
            action,
            dry_run: self.dry_run,
            outcome: RepairOutcome::Cleared { deleted: cells.len() },
            removed: cells,
        })
    }
}
