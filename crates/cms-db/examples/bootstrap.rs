//! Startup sequence of a CMS process.
//!
//! This example demonstrates registering the schema under closed-enum keys,
//! materializing it, and serving a few requests through a shared
//! [`AppContext`]. It runs against the in-memory mock backend so it needs
//! no database server.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=cms_db=debug cargo run -p cms-db --example bootstrap
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::thread;

use cms_db::{AppContext, ConnectionManager, DbError, SchemaState};
use cms_testing::{MockConnection, MockDatabase, fixtures};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Table {
    Root,
    Pages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Schema {
    Table(Table),
    PageState,
}

type Db = ConnectionManager<MockConnection, Schema>;

fn main() -> Result<(), DbError> {
    fixtures::init_tracing();

    let backend = MockDatabase::new();
    let db: Db = ConnectionManager::connect(fixtures::settings(4), |params| backend.connect(params))?;

    let schema = db.schema();
    schema.register_enum(Schema::PageState, "page_state", ["draft", "published"]);
    schema.register_table(
        Schema::Table(Table::Root),
        "cms_root",
        "id SERIAL PRIMARY KEY, title TEXT",
    );
    schema.register_table(
        Schema::Table(Table::Pages),
        "cms_pages",
        "id TEXT PRIMARY KEY, title TEXT, state page_state",
    );

    let report = db.initialize();
    println!(
        "Initialized {} enum(s) and {} table(s), {} failure(s)",
        report.enums.len(),
        report.tables.len(),
        report.failures.len()
    );

    let ctx = AppContext::new(db);
    let pages = Schema::Table(Table::Pages);

    // Each request handler gets a clone of the context
    let handlers: Vec<_> = ["Home", "About", "Contact"]
        .into_iter()
        .enumerate()
        .map(|(i, title)| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                let id = i.to_string();
                ctx.db()
                    .insert(&pages, &["id", "title", "state"], &[id.as_str(), title, "draft"])
            })
        })
        .collect();

    for handler in handlers {
        handler.join().expect("handler panicked")?;
    }

    ctx.db()
        .update(&pages, "id", "0", "\"state\" = ?", &["published"])?;
    ctx.db().rename_table(&pages, "cms_pages_v2")?;

    for row in ctx.db().query("SELECT * FROM \"cms_pages_v2\";")? {
        println!(
            "{:>2}  {:<10} {}",
            row.get_by_name("id").unwrap_or("-"),
            row.get_by_name("title").unwrap_or("-"),
            row.get_by_name("state").unwrap_or("-"),
        );
    }

    assert_eq!(ctx.db().table_state(&pages), SchemaState::Materialized);
    println!("Pool status: {:?}", ctx.db().status());

    ctx.db().shutdown();
    Ok(())
}
