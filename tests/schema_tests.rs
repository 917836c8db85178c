use rusqlite::Connection;
use undograph::schema::ensure_schema;

#[test]
fn test_ensure_schema_creates_all_tables() {
    let conn = Connection::open_in_memory().expect("in-memory db");
    ensure_schema(&conn).expect("schema");

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .expect("prepare");
    let mut rows = stmt.query([]).expect("query");

    let mut found = Vec::new();
    while let Some(row) = rows.next().expect("rows") {
        found.push(row.get::<_, String>(0).expect("name"));
    }

    for table in [
        "by_type",
        "by_type_history",
        "completions",
        "operations",
        "relations",
        "relations_history_after",
        "relations_history_before",
        "undo_transactions",
    ] {
        assert!(found.contains(&table.to_string()), "missing table {table}");
    }
}

#[test]
fn test_ensure_schema_is_idempotent() {
    let conn = Connection::open_in_memory().expect("in-memory db");
    ensure_schema(&conn).expect("first");
    ensure_schema(&conn).expect("second");
}

#[test]
fn test_completions_unique_on_triple() {
    let conn = Connection::open_in_memory().expect("in-memory db");
    ensure_schema(&conn).expect("schema");
    conn.execute(
        "INSERT INTO completions(type_name, property, label) VALUES('T', 'p', 'x')",
        [],
    )
    .expect("first insert");
    let err = conn.execute(
        "INSERT INTO completions(type_name, property, label) VALUES('T', 'p', 'x')",
        [],
    );
    assert!(err.is_err(), "duplicate triple must be rejected");
}
