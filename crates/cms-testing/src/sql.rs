//! Tiny interpreter for the statement shapes `cms-db` produces.
//!
//! This is not a SQL engine. It recognizes the exact text of the DDL, CRUD
//! and catalog statements built by `cms_db::statement` and keeps just
//! enough state to make them observable. Unrecognized statements succeed
//! with zero affected rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cms_db::{BackendError, Row};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQLSTATE for a missing relation.
pub(crate) const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for a relation that already exists.
pub(crate) const DUPLICATE_TABLE: &str = "42P07";
/// SQLSTATE for a type that already exists.
pub(crate) const DUPLICATE_OBJECT: &str = "42710";
/// SQLSTATE for malformed statements.
pub(crate) const SYNTAX_ERROR: &str = "42601";

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        #[allow(clippy::expect_used)]
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("mock SQL pattern is valid"));
    };
}

pattern!(CREATE_TABLE, r#"^CREATE TABLE IF NOT EXISTS "([^"]+)" \("#);
pattern!(DROP_TABLE, r#"^DROP TABLE IF EXISTS "([^"]+)";$"#);
pattern!(RENAME_TABLE, r#"^ALTER TABLE "([^"]+)" RENAME TO "([^"]+)";$"#);
pattern!(CREATE_TYPE, r#"^CREATE TYPE "([^"]+)" AS ENUM \( (.*) \);$"#);
pattern!(INSERT, r#"^INSERT INTO "([^"]+)" \((.*?)\) VALUES \((.*)\);$"#);
pattern!(
    UPDATE,
    r#"^UPDATE "([^"]+)" SET (.*) WHERE "([^"]+)" = '((?:[^']|'')*)';$"#
);
pattern!(
    DELETE,
    r#"^DELETE FROM "([^"]+)" WHERE "([^"]+)" = '((?:[^']|'')*)';$"#
);
pattern!(
    TYPE_EXISTS,
    r#"^SELECT 1 FROM pg_type WHERE typname = '((?:[^']|'')*)';$"#
);
pattern!(
    TABLE_EXISTS,
    r#"^SELECT 1 FROM pg_tables WHERE tablename = '((?:[^']|'')*)';$"#
);
pattern!(SELECT_ALL, r#"^SELECT \* FROM "([^"]+)";$"#);
pattern!(SET_PAIR, r#""([^"]+)" = '((?:[^']|'')*)'"#);

/// A stored row: column name to text value.
pub(crate) type StoredRow = BTreeMap<String, String>;

/// Everything the mock backend remembers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    pub(crate) tables: HashMap<String, Vec<StoredRow>>,
    pub(crate) types: HashMap<String, Vec<String>>,
}

/// Result of one statement.
pub(crate) enum Outcome {
    Affected(u64),
    Rows(Vec<Row>),
}

pub(crate) fn apply(catalog: &mut Catalog, sql: &str) -> Result<Outcome, BackendError> {
    let sql = sql.trim();

    if let Some(c) = CREATE_TABLE.captures(sql) {
        catalog.tables.entry(c[1].to_string()).or_default();
        return Ok(Outcome::Affected(0));
    }

    if let Some(c) = DROP_TABLE.captures(sql) {
        catalog.tables.remove(&c[1]);
        return Ok(Outcome::Affected(0));
    }

    if let Some(c) = RENAME_TABLE.captures(sql) {
        let (old, new) = (&c[1], &c[2]);
        if catalog.tables.contains_key(new) {
            return Err(error(format!("relation \"{new}\" already exists"), DUPLICATE_TABLE));
        }
        let rows = catalog.tables.remove(old).ok_or_else(|| missing_table(old))?;
        catalog.tables.insert(new.to_string(), rows);
        return Ok(Outcome::Affected(0));
    }

    if let Some(c) = CREATE_TYPE.captures(sql) {
        let name = &c[1];
        if catalog.types.contains_key(name) {
            return Err(error(format!("type \"{name}\" already exists"), DUPLICATE_OBJECT));
        }
        let values = parse_literals(&c[2]).ok_or_else(|| syntax(sql))?;
        catalog.types.insert(name.to_string(), values);
        return Ok(Outcome::Affected(0));
    }

    if let Some(c) = INSERT.captures(sql) {
        let columns = parse_identifiers(&c[2]);
        let values = parse_literals(&c[3]).ok_or_else(|| syntax(sql))?;
        if columns.len() != values.len() {
            return Err(syntax(sql));
        }
        let rows = table_mut(catalog, &c[1])?;
        rows.push(columns.into_iter().zip(values).collect());
        return Ok(Outcome::Affected(1));
    }

    if let Some(c) = UPDATE.captures(sql) {
        let assignments: Vec<(String, String)> = SET_PAIR
            .captures_iter(&c[2])
            .map(|p| (p[1].to_string(), unescape(&p[2])))
            .collect();
        let (column, value) = (&c[3], unescape(&c[4]));

        let mut affected = 0;
        for row in table_mut(catalog, &c[1])? {
            if row.get(column) == Some(&value) {
                for (k, v) in &assignments {
                    row.insert(k.clone(), v.clone());
                }
                affected += 1;
            }
        }
        return Ok(Outcome::Affected(affected));
    }

    if let Some(c) = DELETE.captures(sql) {
        let (column, value) = (&c[2], unescape(&c[3]));
        let rows = table_mut(catalog, &c[1])?;
        let before = rows.len();
        rows.retain(|row| row.get(column) != Some(&value));
        return Ok(Outcome::Affected((before - rows.len()) as u64));
    }

    if let Some(c) = TYPE_EXISTS.captures(sql) {
        let found = catalog.types.contains_key(&unescape(&c[1]));
        return Ok(Outcome::Rows(exists_rows(found)));
    }

    if let Some(c) = TABLE_EXISTS.captures(sql) {
        let found = catalog.tables.contains_key(&unescape(&c[1]));
        return Ok(Outcome::Rows(exists_rows(found)));
    }

    if let Some(c) = SELECT_ALL.captures(sql) {
        let rows = catalog.tables.get(&c[1]).ok_or_else(|| missing_table(&c[1]))?;
        return Ok(Outcome::Rows(to_rows(rows)));
    }

    Ok(Outcome::Affected(0))
}

fn table_mut<'a>(catalog: &'a mut Catalog, name: &str) -> Result<&'a mut Vec<StoredRow>, BackendError> {
    catalog.tables.get_mut(name).ok_or_else(|| missing_table(name))
}

fn to_rows(rows: &[StoredRow]) -> Vec<Row> {
    let columns: Vec<String> = rows
        .iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    rows.iter()
        .map(|r| {
            let values = columns.iter().map(|c| r.get(c).cloned()).collect();
            Row::new(columns.clone(), values)
        })
        .collect()
}

fn exists_rows(found: bool) -> Vec<Row> {
    if found {
        vec![Row::new(vec!["?column?".into()], vec![Some("1".into())])]
    } else {
        Vec::new()
    }
}

fn error(message: String, code: &str) -> BackendError {
    BackendError::new(message).with_code(code)
}

fn missing_table(name: &str) -> BackendError {
    error(format!("relation \"{name}\" does not exist"), UNDEFINED_TABLE)
}

fn syntax(sql: &str) -> BackendError {
    error(format!("syntax error in: {sql}"), SYNTAX_ERROR)
}

fn unescape(literal: &str) -> String {
    literal.replace("''", "'")
}

fn parse_identifiers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .map(|id| {
            id.strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(id)
                .replace("\"\"", "\"")
        })
        .collect()
}

/// Parse `'a', 'b''c'` into its literal values.
fn parse_literals(list: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    let mut chars = list.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        match chars.next() {
            None => return Some(out),
            Some('\'') => {}
            Some(_) => return None,
        }

        let mut value = String::new();
        loop {
            match chars.next()? {
                '\'' if chars.next_if_eq(&'\'').is_some() => value.push('\''),
                '\'' => break,
                c => value.push(c),
            }
        }
        out.push(value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn affected(outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Affected(n) => n,
            Outcome::Rows(_) => panic!("expected affected count"),
        }
    }

    fn rows(outcome: Outcome) -> Vec<Row> {
        match outcome {
            Outcome::Rows(rows) => rows,
            Outcome::Affected(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(
            parse_literals("'a', 'O''Brien', ''").unwrap(),
            vec!["a", "O'Brien", ""]
        );
        assert_eq!(parse_literals("").unwrap(), Vec::<String>::new());
        assert!(parse_literals("'open").is_none());
        assert!(parse_literals("bare").is_none());
    }

    #[test]
    fn test_crud_cycle() {
        let mut catalog = Catalog::default();
        apply(&mut catalog, "CREATE TABLE IF NOT EXISTS \"pages\" ( id INT );").unwrap();

        let n = affected(
            apply(
                &mut catalog,
                "INSERT INTO \"pages\" (\"id\", \"title\") VALUES ('1', 'it''s');",
            )
            .unwrap(),
        );
        assert_eq!(n, 1);

        let n = affected(
            apply(
                &mut catalog,
                "UPDATE \"pages\" SET \"title\" = 'new' WHERE \"id\" = '1';",
            )
            .unwrap(),
        );
        assert_eq!(n, 1);

        let all = rows(apply(&mut catalog, "SELECT * FROM \"pages\";").unwrap());
        assert_eq!(all[0].get_by_name("title"), Some("new"));

        let n = affected(apply(&mut catalog, "DELETE FROM \"pages\" WHERE \"id\" = '1';").unwrap());
        assert_eq!(n, 1);
        assert!(catalog.tables["pages"].is_empty());
    }

    #[test]
    fn test_missing_table_and_duplicate_type() {
        let mut catalog = Catalog::default();
        let err = apply(&mut catalog, "DELETE FROM \"nope\" WHERE \"id\" = '1';")
            .err()
            .unwrap();
        assert_eq!(err.code.as_deref(), Some(UNDEFINED_TABLE));

        let ddl = "CREATE TYPE \"state\" AS ENUM ( 'a', 'b' );";
        apply(&mut catalog, ddl).unwrap();
        let err = apply(&mut catalog, ddl).err().unwrap();
        assert_eq!(err.code.as_deref(), Some(DUPLICATE_OBJECT));
        assert_eq!(catalog.types["state"], vec!["a", "b"]);
    }
}
