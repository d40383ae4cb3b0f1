//! Snapshot schema definitions

use crate::model::Table;

/// SQL to create the object row table
pub const CREATE_OBJ_UUID_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS obj_uuid_table (
    key TEXT NOT NULL,
    column1 TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (key, column1)
)
"#;

/// SQL to create the fully-qualified name index table
pub const CREATE_OBJ_FQ_NAME_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS obj_fq_name_table (
    key TEXT NOT NULL,
    column1 TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (key, column1)
)
"#;

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_OBJ_UUID_TABLE, CREATE_OBJ_FQ_NAME_TABLE]
}

/// Select every cell of a table in key order
pub fn select_all(table: Table) -> String {
    format!(
        "SELECT key, column1, value FROM {} ORDER BY key, column1",
        table.as_str()
    )
}

/// Select the cells of a single row
pub fn select_row(table: Table) -> String {
    format!(
        "SELECT key, column1, value FROM {} WHERE key = ?1 ORDER BY column1",
        table.as_str()
    )
}
