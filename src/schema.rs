use rusqlite::Connection;

use crate::errors::UndoGraphError;

pub fn ensure_schema(conn: &Connection) -> Result<(), UndoGraphError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS by_type (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            type_name TEXT NOT NULL,
            json      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS relations (
            from_id   INTEGER NOT NULL,
            to_id     INTEGER NOT NULL,
            relation  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS operations (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_type TEXT NOT NULL,
            current        INTEGER NOT NULL DEFAULT 0,
            next_operation INTEGER NOT NULL DEFAULT -1
        );
        CREATE TABLE IF NOT EXISTS by_type_history (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_id INTEGER NOT NULL,
            by_type_id   INTEGER NOT NULL,
            type_name    TEXT NOT NULL,
            before_json  TEXT NOT NULL,
            after_json   TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS relations_history_before (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_id INTEGER NOT NULL,
            from_id      INTEGER NOT NULL,
            to_id        INTEGER NOT NULL,
            relation     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS relations_history_after (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_id INTEGER NOT NULL,
            from_id      INTEGER NOT NULL,
            to_id        INTEGER NOT NULL,
            relation     TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS undo_transactions (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            undo_operation_start  INTEGER NOT NULL,
            undo_operation_end    INTEGER NOT NULL,
            current               INTEGER NOT NULL DEFAULT 0,
            next_undo_transaction INTEGER NOT NULL DEFAULT -1
        );
        CREATE TABLE IF NOT EXISTS completions (
            type_name TEXT NOT NULL,
            property  TEXT NOT NULL,
            label     TEXT NOT NULL,
            UNIQUE(type_name, property, label)
        );
        CREATE INDEX IF NOT EXISTS idx_by_type_name ON by_type(type_name);
        CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_id);
        CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_id);
        CREATE INDEX IF NOT EXISTS idx_operations_current ON operations(current);
        CREATE INDEX IF NOT EXISTS idx_operations_next ON operations(next_operation);
        CREATE INDEX IF NOT EXISTS idx_history_operation ON by_type_history(operation_id);
        CREATE INDEX IF NOT EXISTS idx_relations_before_op ON relations_history_before(operation_id);
        CREATE INDEX IF NOT EXISTS idx_relations_after_op ON relations_history_after(operation_id);
        CREATE INDEX IF NOT EXISTS idx_undo_tx_current ON undo_transactions(current);
        "#,
    )
    .map_err(|e| UndoGraphError::schema(e.to_string()))?;
    Ok(())
}
