//! SQL statement text builders.
//!
//! Builders take physical names, never schema identifiers; the manager
//! resolves identifiers through the registry first.

use crate::error::{DbError, Result};
use crate::escape::{expand_placeholders, quote_identifier, quote_literal};

/// Statement that opens a transaction.
pub const BEGIN: &str = "BEGIN;";
/// Statement that commits a transaction.
pub const COMMIT: &str = "COMMIT;";
/// Statement that rolls back a transaction.
pub const ROLLBACK: &str = "ROLLBACK;";

/// `CREATE TABLE IF NOT EXISTS "<name>" ( <fields> );`
#[must_use]
pub fn create_table(name: &str, fields: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ( {} );",
        quote_identifier(name),
        fields
    )
}

/// `DROP TABLE IF EXISTS "<name>";`
#[must_use]
pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_identifier(name))
}

/// `ALTER TABLE "<old>" RENAME TO "<new>";`
#[must_use]
pub fn rename_table(old: &str, new: &str) -> String {
    format!(
        "ALTER TABLE {} RENAME TO {};",
        quote_identifier(old),
        quote_identifier(new)
    )
}

/// `CREATE TYPE "<name>" AS ENUM ( 'a', 'b' );`
#[must_use]
pub fn create_enum<S: AsRef<str>>(name: &str, values: &[S]) -> String {
    format!(
        "CREATE TYPE {} AS ENUM ( {} );",
        quote_identifier(name),
        join_literals(values)
    )
}

/// Catalog probe returning one row if the enum type exists.
#[must_use]
pub fn enum_exists(name: &str) -> String {
    format!(
        "SELECT 1 FROM pg_type WHERE typname = {};",
        quote_literal(name)
    )
}

/// Catalog probe returning one row if the table exists.
#[must_use]
pub fn table_exists(name: &str) -> String {
    format!(
        "SELECT 1 FROM pg_tables WHERE tablename = {};",
        quote_literal(name)
    )
}

/// `INSERT INTO "<name>" ("c1", "c2") VALUES ('v1', 'v2');`
///
/// Column and value counts must match.
pub fn insert<C, V>(name: &str, columns: &[C], values: &[V]) -> Result<String>
where
    C: AsRef<str>,
    V: AsRef<str>,
{
    if columns.len() != values.len() {
        return Err(DbError::PlaceholderMismatch {
            placeholders: columns.len(),
            arguments: values.len(),
        });
    }
    if columns.is_empty() {
        return Err(DbError::Config("insert needs at least one column".into()));
    }

    let columns = columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_identifier(name),
        columns,
        join_literals(values)
    ))
}

/// `UPDATE "<name>" SET <template with ? filled> WHERE "<col>" = '<value>';`
pub fn update<S: AsRef<str>>(
    name: &str,
    where_column: &str,
    where_value: &str,
    set_template: &str,
    args: &[S],
) -> Result<String> {
    let set_clause = expand_placeholders(set_template, args)?;
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = {};",
        quote_identifier(name),
        set_clause,
        quote_identifier(where_column),
        quote_literal(where_value)
    ))
}

/// `DELETE FROM "<name>" WHERE "<col>" = '<value>';`
#[must_use]
pub fn delete(name: &str, where_column: &str, where_value: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {};",
        quote_identifier(name),
        quote_identifier(where_column),
        quote_literal(where_value)
    )
}

fn join_literals<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| quote_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
