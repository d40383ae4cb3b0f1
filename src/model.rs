//! Data model - tables, cells and reference columns
//!
//! Both object tables share the wide-row shape `(key, column1, value)`:
//! - `obj_uuid_table`: one row per object, keyed by its UUID
//! - `obj_fq_name_table`: one row per object type, columns embed fq-name and UUID
//!
//! Reference markers live in the object row as `backref:<type>:<uuid>` columns.

use crate::key;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Column-name prefix marking a back reference
pub const BACKREF_MARKER: &str = "backref";

/// Column-name prefixes that describe an object itself
pub const ATTRIBUTE_PREFIXES: &[&str] = &["type", "fq_name", "parent_type"];

/// The two tables the tool reads and repairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Primary table: object rows keyed by UUID
    ObjUuid,
    /// Secondary index: fully-qualified names keyed by type
    ObjFqName,
}

impl Table {
    /// Get the table name as stored in the keyspace
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::ObjUuid => "obj_uuid_table",
            Table::ObjFqName => "obj_fq_name_table",
        }
    }

    /// Get all tables, primary first
    pub fn all() -> &'static [Table] {
        &[Table::ObjUuid, Table::ObjFqName]
    }
}

impl FromStr for Table {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "obj_uuid_table" => Ok(Table::ObjUuid),
            "obj_fq_name_table" => Ok(Table::ObjFqName),
            _ => Err(crate::Error::InvalidArgument(format!("Unknown table: {}", s))),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `(rowKey, columnName, value)` triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub key: String,
    pub column: String,
    pub value: String,
}

impl Cell {
    pub fn new(key: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: column.into(),
            value: value.into(),
        }
    }

    /// Check if the column describes the object (type, fq_name, parent_type)
    pub fn is_attribute(&self) -> bool {
        ATTRIBUTE_PREFIXES
            .iter()
            .any(|prefix| self.column.starts_with(prefix))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.key, self.column, self.value)
    }
}

/// Restricts a scan to a single row key.
///
/// The logical key is what backends compare against decoded keys; the wire
/// key is the blob literal sent to the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    text: String,
    substitute_separator: bool,
}

impl KeyFilter {
    /// Filter on an object UUID, taken verbatim
    pub fn exact(id: impl Into<String>) -> Self {
        Self {
            text: id.into(),
            substitute_separator: false,
        }
    }

    /// Filter on an index row for an object type (hyphens become underscores)
    pub fn object_type(kind: impl Into<String>) -> Self {
        Self {
            text: kind.into(),
            substitute_separator: true,
        }
    }

    /// The key as stored once substitution is applied
    pub fn logical_key(&self) -> String {
        key::logical_key(&self.text, self.substitute_separator)
    }

    /// The key as a CQL blob literal
    pub fn wire_key(&self) -> String {
        key::encode_key(&self.text, self.substitute_separator)
    }

    pub fn matches(&self, row_key: &str) -> bool {
        row_key == self.logical_key()
    }
}

/// A well-formed `backref:<type>:<uuid>` column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackRef {
    /// Declared type of the referenced object
    pub kind: String,
    /// UUID of the referenced object
    pub target: String,
}

/// Result of classifying a column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedColumn {
    /// Not a reference marker at all
    Other,
    /// A reference marker with a type and a target
    BackRef(BackRef),
    /// Starts with the marker but does not split into marker, type and target
    Malformed { reason: &'static str },
}

/// Classify a column name from the primary table.
///
/// The name is split on `:` into at most three parts, so a target that
/// itself contains `:` stays intact in the last part.
pub fn parse_column(column: &str) -> ParsedColumn {
    if !column.starts_with(BACKREF_MARKER) {
        return ParsedColumn::Other;
    }

    let mut parts = column.splitn(3, ':');
    let marker = parts.next().unwrap_or_default();
    if marker != BACKREF_MARKER {
        return ParsedColumn::Malformed { reason: "marker is not followed by ':'" };
    }

    match (parts.next(), parts.next()) {
        (Some(kind), Some(target)) if !kind.is_empty() && !target.is_empty() => {
            ParsedColumn::BackRef(BackRef {
                kind: kind.to_string(),
                target: target.to_string(),
            })
        }
        (Some(_), Some(_)) => ParsedColumn::Malformed { reason: "empty type or target" },
        _ => ParsedColumn::Malformed { reason: "fewer than three ':'-delimited parts" },
    }
}
