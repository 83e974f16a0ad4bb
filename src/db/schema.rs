//! DDL rendering and shape validation for entity tables.
//! SQLite-first: `INTEGER PRIMARY KEY AUTOINCREMENT` keeps keys from being reused.

use crate::db::entity::{SqlType, TableShape};
use crate::error::RowkitError;
use std::collections::HashSet;

pub(crate) fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render `CREATE TABLE IF NOT EXISTS` for a shape.
///
/// Non-key columns are nullable; decoding maps NULL to the zero value.
/// Relation join columns get no UNIQUE or FOREIGN KEY constraint.
pub fn create_table_sql(shape: &TableShape) -> String {
    let columns: Vec<String> = shape
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote(c.name), c.sql_type.as_sql());
            if c.primary_key {
                def.push_str(" NOT NULL PRIMARY KEY");
            }
            if c.auto_increment {
                def.push_str(" AUTOINCREMENT");
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(shape.table),
        columns.join(", ")
    )
}

/// Reject shapes the DDL and query builders cannot handle.
pub fn validate(shape: &TableShape) -> Result<(), RowkitError> {
    let fail = |reason: String| RowkitError::Schema {
        entity: shape.name.to_string(),
        reason,
    };

    if shape.columns.is_empty() {
        return Err(fail("no columns declared".to_string()));
    }

    let mut seen = HashSet::new();
    for c in shape.columns {
        if !seen.insert(c.name) {
            return Err(fail(format!("duplicate column {}", c.name)));
        }
        if c.auto_increment && !(c.primary_key && c.sql_type == SqlType::Integer) {
            return Err(fail(format!(
                "column {} is autoincrement but not an INTEGER primary key",
                c.name
            )));
        }
    }

    match shape.columns.iter().filter(|c| c.primary_key).count() {
        1 => {}
        n => return Err(fail(format!("expected one primary key column, found {n}"))),
    }

    for rel in shape.relations {
        if shape.column(rel.base_column).is_none() {
            return Err(fail(format!(
                "relation {} joins on missing column {}",
                rel.name, rel.base_column
            )));
        }
        if rel.target.column(rel.join_column).is_none() {
            return Err(fail(format!(
                "relation {} joins on missing column {}.{}",
                rel.name, rel.target.name, rel.join_column
            )));
        }
        if rel.target.primary_key().is_none() {
            return Err(fail(format!(
                "relation {} targets {} which has no primary key",
                rel.name, rel.target.name
            )));
        }
    }

    Ok(())
}
