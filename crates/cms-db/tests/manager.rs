//! Connection manager tests against the in-memory mock backend.
//!
//! These cover schema materialization, renames and CRUD statement
//! generation end to end: registry lookup, statement text, pooled
//! execution and the backend's view of the result.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use cms_db::{ConnectionManager, DbError, SchemaState, statement};
use cms_testing::{MockConnection, MockDatabase, fixtures};

const ROOT: &str = "ROOT";
const PAGES: &str = "PAGES";
const PAGE_STATE: &str = "PAGE_STATE";

fn manager(db: &MockDatabase) -> ConnectionManager<MockConnection> {
    fixtures::init_tracing();
    let manager = ConnectionManager::connect(fixtures::settings(2), |params| db.connect(params))
        .expect("mock connections open");

    let schema = manager.schema();
    schema.register_table(ROOT, "cms_root", "id SERIAL PRIMARY KEY, title TEXT");
    schema.register_table(PAGES, "cms_pages", "id TEXT, title TEXT, author TEXT");
    schema.register_enum(PAGE_STATE, "page_state", ["draft", "published"]);
    manager
}

// =============================================================================
// Schema Materialization
// =============================================================================

#[test]
fn test_create_table_twice_succeeds() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    assert_eq!(manager.table_state(&ROOT), SchemaState::Registered);
    manager.create_table(&ROOT).unwrap();
    manager.create_table(&ROOT).unwrap();

    assert!(db.has_table("cms_root"));
    assert_eq!(db.executed("CREATE TABLE IF NOT EXISTS \"cms_root\""), 2);
    assert_eq!(manager.table_state(&ROOT), SchemaState::Materialized);
}

#[test]
fn test_create_enum_is_idempotent() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    manager.create_enum(&PAGE_STATE).unwrap();
    manager.create_enum(&PAGE_STATE).unwrap();

    assert_eq!(db.executed("CREATE TYPE"), 1);
    assert_eq!(db.executed("pg_type"), 2);
    assert_eq!(
        db.enum_values("page_state").unwrap(),
        vec!["draft", "published"]
    );
    assert_eq!(manager.enum_state(&PAGE_STATE), SchemaState::Materialized);
}

#[test]
fn test_unknown_identifier_sends_nothing() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    let err = manager.create_table(&"NOPE").unwrap_err();
    assert!(matches!(err, DbError::UnknownIdentifier(ref id) if id == "\"NOPE\""));
    assert!(manager.create_enum(&"NOPE").is_err());
    assert!(manager.delete(&"NOPE", "id", "1").is_err());

    assert!(db.statements().is_empty());
    assert_eq!(manager.table_state(&"NOPE"), SchemaState::Unregistered);
}

#[test]
fn test_drop_table_returns_to_registered() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    manager.create_table(&ROOT).unwrap();
    assert!(manager.table_exists(&ROOT).unwrap());

    manager.drop_table(&ROOT).unwrap();
    assert!(!db.has_table("cms_root"));
    assert!(!manager.table_exists(&ROOT).unwrap());
    assert_eq!(manager.table_state(&ROOT), SchemaState::Registered);
}

#[test]
fn test_initialize_creates_enums_before_tables() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    let report = manager.initialize();
    assert!(report.is_complete());
    assert_eq!(report.enums, vec![PAGE_STATE]);
    assert_eq!(report.tables, vec![ROOT, PAGES]);

    let statements = db.statements();
    let first_type = statements.iter().position(|s| s.starts_with("CREATE TYPE"));
    let first_table = statements.iter().position(|s| s.starts_with("CREATE TABLE"));
    assert!(first_type.unwrap() < first_table.unwrap());
}

#[test]
fn test_initialize_isolates_failures() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    db.fail_on("\"cms_root\"");

    let report = manager.initialize();
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, ROOT);
    assert!(matches!(report.failures[0].1, DbError::Query { .. }));

    assert_eq!(report.tables, vec![PAGES]);
    assert!(db.has_table("cms_pages"));
    assert!(!db.has_table("cms_root"));
    assert_eq!(manager.table_state(&ROOT), SchemaState::Registered);
}

// =============================================================================
// Renames
// =============================================================================

#[test]
fn test_rename_updates_registry_after_success() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&ROOT).unwrap();

    manager.rename_table(&ROOT, "cms_root_v2").unwrap();

    assert_eq!(manager.schema().table_name(&ROOT).unwrap(), "cms_root_v2");
    assert!(db.has_table("cms_root_v2"));
    assert!(!db.has_table("cms_root"));

    manager.insert(&ROOT, &["title"], &["after rename"]).unwrap();
    assert_eq!(db.rows("cms_root_v2").len(), 1);
}

#[test]
fn test_failed_rename_keeps_old_name() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&ROOT).unwrap();
    db.fail_on("RENAME");

    let err = manager.rename_table(&ROOT, "cms_root_v2").unwrap_err();
    assert!(matches!(err, DbError::Query { .. }));
    assert_eq!(manager.schema().table_name(&ROOT).unwrap(), "cms_root");
    assert!(db.has_table("cms_root"));
}

#[test]
fn test_rename_to_missing_table_keeps_old_name() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    assert!(manager.rename_table(&ROOT, "cms_root_v2").is_err());
    assert_eq!(manager.schema().table_name(&ROOT).unwrap(), "cms_root");
}

#[test]
fn test_rename_rejects_invalid_identifier() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    let err = manager.rename_table(&ROOT, "bad name; --").unwrap_err();
    assert!(matches!(err, DbError::InvalidIdentifier(_)));
    assert!(db.statements().is_empty());
}

// =============================================================================
// CRUD
// =============================================================================

#[test]
fn test_insert_update_delete_escape_values() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();

    let inserted = manager
        .insert(&PAGES, &["id", "title", "author"], &["1", "Hello", "O'Brien"])
        .unwrap();
    assert_eq!(inserted, 1);
    assert_eq!(db.rows("cms_pages")[0]["author"], "O'Brien");

    let updated = manager
        .update(&PAGES, "id", "1", "\"title\" = ?", &["It's new"])
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(db.rows("cms_pages")[0]["title"], "It's new");
    assert_eq!(
        db.executed("UPDATE \"cms_pages\" SET \"title\" = 'It''s new' WHERE \"id\" = '1';"),
        1
    );

    let deleted = manager
        .delete(&PAGES, "id", "1'; DROP TABLE cms_pages; --")
        .unwrap();
    assert_eq!(deleted, 0);
    assert!(db.has_table("cms_pages"));

    assert_eq!(manager.delete(&PAGES, "id", "1").unwrap(), 1);
    assert!(db.rows("cms_pages").is_empty());
}

#[test]
fn test_update_placeholder_mismatch_sends_nothing() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();
    db.clear_statements();

    let err = manager
        .update(&PAGES, "id", "1", "\"title\" = ?, \"author\" = ?", &["only one"])
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::PlaceholderMismatch {
            placeholders: 2,
            arguments: 1
        }
    ));
    assert!(err.is_configuration_error());
    assert!(db.statements().is_empty());
}

#[test]
fn test_insert_arity_mismatch_sends_nothing() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    let err = manager.insert(&PAGES, &["id", "title"], &["1"]).unwrap_err();
    assert!(matches!(err, DbError::PlaceholderMismatch { .. }));
    assert!(db.statements().is_empty());
}

#[test]
fn test_query_returns_rows() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();
    manager
        .insert(&PAGES, &["id", "title"], &["1", "Home"])
        .unwrap();

    let rows = manager.query("SELECT * FROM \"cms_pages\";").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_by_name("title"), Some("Home"));
}

#[test]
fn test_backend_error_carries_statement() {
    let db = MockDatabase::new();
    let manager = manager(&db);

    let err = manager.insert(&PAGES, &["id"], &["1"]).unwrap_err();
    match err {
        DbError::Query { statement, message } => {
            assert!(statement.starts_with("INSERT INTO \"cms_pages\""));
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_transaction_commits_on_ok() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();

    let count = manager
        .transaction(|tx| {
            tx.execute(&statement::insert("cms_pages", &["id"], &["1"])?)?;
            tx.execute(&statement::insert("cms_pages", &["id"], &["2"])?)
        })
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(db.rows("cms_pages").len(), 2);
    assert_eq!(db.executed(statement::COMMIT), 1);
    assert_eq!(db.executed(statement::ROLLBACK), 0);
}

#[test]
fn test_transaction_rolls_back_on_err() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();

    let result: cms_db::Result<()> = manager.transaction(|tx| {
        tx.execute(&statement::insert("cms_pages", &["id"], &["1"])?)?;
        Err(DbError::Transaction("abandoned".into()))
    });

    assert!(matches!(result, Err(DbError::Transaction(_))));
    assert!(db.rows("cms_pages").is_empty());
    assert_eq!(db.executed(statement::ROLLBACK), 1);
}

#[test]
fn test_failed_commit_rolls_back() {
    let db = MockDatabase::new();
    let manager = manager(&db);
    manager.create_table(&PAGES).unwrap();
    db.fail_on(statement::COMMIT);

    let result = manager.transaction(|tx| tx.execute(&statement::insert("cms_pages", &["id"], &["1"])?));

    assert!(result.is_err());
    assert!(db.rows("cms_pages").is_empty());
}
