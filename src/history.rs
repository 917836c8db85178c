use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::{
    errors::UndoGraphError,
    graph::{EdgeRow, UndoGraph},
    record::GraphRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }

    pub fn parse(text: &str) -> Result<Self, UndoGraphError> {
        match text {
            "create" => Ok(OperationType::Create),
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            other => Err(UndoGraphError::invalid_input(format!(
                "unknown operation type {other:?}"
            ))),
        }
    }

    /// The operation that cancels this one when replayed with the before
    /// image.
    pub fn inverse(self) -> Self {
        match self {
            OperationType::Create => OperationType::Delete,
            OperationType::Update => OperationType::Update,
            OperationType::Delete => OperationType::Create,
        }
    }
}

/// One atomic mutation, a node of the singly-linked operations chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRow {
    pub id: i64,
    pub op_type: OperationType,
    pub current: bool,
    pub next_operation: i64,
}

/// Replay image pinned to one operation. Empty strings stand in where an
/// image is inapplicable (no before image for create, no after image for
/// delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexHistoryRow {
    pub operation_id: i64,
    pub by_type_id: i64,
    pub type_name: String,
    pub before_json: String,
    pub after_json: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeHistoryTable {
    Before,
    After,
}

impl EdgeHistoryTable {
    pub(crate) fn table_name(self) -> &'static str {
        match self {
            EdgeHistoryTable::Before => "relations_history_before",
            EdgeHistoryTable::After => "relations_history_after",
        }
    }
}

/// History accessors and the per-operation writer.
impl UndoGraph {
    pub fn current_operation(&self) -> Result<Option<OperationRow>, UndoGraphError> {
        match self.current_operation_id()? {
            Some(id) => Ok(Some(self.operation(id)?)),
            None => Ok(None),
        }
    }

    pub fn operation_count(&self) -> Result<i64, UndoGraphError> {
        Ok(self
            .store()
            .scalar("SELECT COUNT(*) FROM operations", [])?
            .unwrap_or(0))
    }

    pub(crate) fn current_operation_id(&self) -> Result<Option<i64>, UndoGraphError> {
        self.store()
            .scalar("SELECT id FROM operations WHERE current=1", [])
    }

    pub(crate) fn max_operation_id(&self) -> Result<i64, UndoGraphError> {
        Ok(self
            .store()
            .scalar("SELECT COALESCE(MAX(id), 0) FROM operations", [])?
            .unwrap_or(0))
    }

    pub(crate) fn operation(&self, id: i64) -> Result<OperationRow, UndoGraphError> {
        let (id, op_type, current, next_operation): (i64, String, i64, i64) = self
            .conn()
            .query_row(
                "SELECT id, operation_type, current, next_operation FROM operations WHERE id=?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    UndoGraphError::not_found(format!("operation {id}"))
                }
                other => UndoGraphError::query(other.to_string()),
            })?;
        Ok(OperationRow {
            id,
            op_type: OperationType::parse(&op_type)?,
            current: current != 0,
            next_operation,
        })
    }

    /// The operation whose `next_operation` points at `id`.
    pub(crate) fn predecessor_of(&self, id: i64) -> Result<Option<i64>, UndoGraphError> {
        self.store().scalar(
            "SELECT id FROM operations WHERE next_operation=?1 AND id != ?1",
            params![id],
        )
    }

    /// Inserts a new operation row and moves the `current` marker onto it,
    /// linking the previous current operation's `next_operation` forward.
    /// Any operations still sitting ahead of the cursor are a stale redo
    /// branch at this point and are discarded first, so the previous
    /// current row is always the chain tail and the chain stays a single
    /// path; with an empty table the new row simply becomes the head.
    pub(crate) fn record_operation(&self, op_type: OperationType) -> Result<i64, UndoGraphError> {
        self.discard_redo_branch()?;
        let prev = self.current_operation_id()?;
        self.store().execute(
            "INSERT INTO operations(operation_type, current, next_operation) VALUES(?1, 0, -1)",
            params![op_type.as_str()],
        )?;
        let new_id = self.conn().last_insert_rowid();
        if let Some(prev_id) = prev {
            self.store().execute(
                "UPDATE operations SET next_operation=?2, current=0 WHERE id=?1",
                params![prev_id, new_id],
            )?;
        }
        self.store()
            .execute("UPDATE operations SET current=1 WHERE id=?1", params![new_id])?;
        tracing::debug!(operation = new_id, op_type = op_type.as_str(), "recorded operation");
        Ok(new_id)
    }

    /// Drops every operation after the cursor (all of them when the cursor
    /// is unset but rows remain), together with its replay images and the
    /// undo transactions spanning the dropped region. A mutation recorded
    /// mid-history diverges from the undone future; keeping those rows
    /// would orphan them from the chain.
    fn discard_redo_branch(&self) -> Result<(), UndoGraphError> {
        let stale = match self.current_operation_id()? {
            Some(current_id) => {
                let current = self.operation(current_id)?;
                self.operation_chain_from(current.next_operation)?
            }
            None => self.all_operation_ids()?,
        };
        if stale.is_empty() {
            return Ok(());
        }
        for op_id in &stale {
            self.store().execute(
                "DELETE FROM by_type_history WHERE operation_id=?1",
                params![op_id],
            )?;
            self.store().execute(
                "DELETE FROM relations_history_before WHERE operation_id=?1",
                params![op_id],
            )?;
            self.store().execute(
                "DELETE FROM relations_history_after WHERE operation_id=?1",
                params![op_id],
            )?;
            self.store()
                .execute("DELETE FROM operations WHERE id=?1", params![op_id])?;
        }
        if let Some(current_id) = self.current_operation_id()? {
            self.store().execute(
                "UPDATE operations SET next_operation=-1 WHERE id=?1",
                params![current_id],
            )?;
        }
        self.discard_stale_transactions()?;
        tracing::debug!(discarded = stale.len(), "dropped redo branch");
        Ok(())
    }

    /// Chain ids starting at `start_id` (−1 yields nothing), in link order.
    fn operation_chain_from(&self, start_id: i64) -> Result<Vec<i64>, UndoGraphError> {
        let mut ids = Vec::new();
        let mut seen = ahash::AHashSet::new();
        let mut cursor = start_id;
        while cursor > 0 && seen.insert(cursor) {
            ids.push(cursor);
            cursor = self
                .store()
                .scalar(
                    "SELECT next_operation FROM operations WHERE id=?1",
                    params![cursor],
                )?
                .unwrap_or(-1);
        }
        Ok(ids)
    }

    fn all_operation_ids(&self) -> Result<Vec<i64>, UndoGraphError> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT id FROM operations ORDER BY id")
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| UndoGraphError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    pub(crate) fn write_vertex_history(
        &self,
        operation_id: i64,
        by_type_id: i64,
        type_name: &str,
        before_json: &str,
        after_json: &str,
    ) -> Result<(), UndoGraphError> {
        self.store().execute(
            "INSERT INTO by_type_history(operation_id, by_type_id, type_name, before_json, after_json) \
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![operation_id, by_type_id, type_name, before_json, after_json],
        )?;
        Ok(())
    }

    /// The replay image recorded for one operation.
    pub fn vertex_history_for(
        &self,
        operation_id: i64,
    ) -> Result<VertexHistoryRow, UndoGraphError> {
        self.conn()
            .query_row(
                "SELECT operation_id, by_type_id, type_name, before_json, after_json \
                 FROM by_type_history WHERE operation_id=?1",
                params![operation_id],
                |row| {
                    Ok(VertexHistoryRow {
                        operation_id: row.get(0)?,
                        by_type_id: row.get(1)?,
                        type_name: row.get(2)?,
                        before_json: row.get(3)?,
                        after_json: row.get(4)?,
                    })
                },
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    UndoGraphError::not_found(format!("history for operation {operation_id}"))
                }
                other => UndoGraphError::query(other.to_string()),
            })
    }

    /// Copies every edge incident to the vertex into the before- or
    /// after-history table, tagged with the operation.
    pub(crate) fn snapshot_edges(
        &self,
        operation_id: i64,
        vertex_id: i64,
        table: EdgeHistoryTable,
    ) -> Result<(), UndoGraphError> {
        let sql = format!(
            "INSERT INTO {}(operation_id, from_id, to_id, relation) \
             SELECT ?1, from_id, to_id, relation FROM relations \
             WHERE from_id=?2 OR to_id=?2 ORDER BY rowid",
            table.table_name()
        );
        self.store().execute(&sql, params![operation_id, vertex_id])?;
        Ok(())
    }

    pub(crate) fn edge_history(
        &self,
        operation_id: i64,
        table: EdgeHistoryTable,
    ) -> Result<Vec<EdgeRow>, UndoGraphError> {
        let sql = format!(
            "SELECT from_id, to_id, relation FROM {} WHERE operation_id=?1 ORDER BY id",
            table.table_name()
        );
        let mut stmt = self
            .conn()
            .prepare_cached(&sql)
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![operation_id], |row| {
                Ok(EdgeRow {
                    from_id: row.get(0)?,
                    to_id: row.get(1)?,
                    relation: row.get(2)?,
                })
            })
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge.map_err(|e| UndoGraphError::query(e.to_string()))?);
        }
        Ok(edges)
    }
}

/// Orchestration of one recorded mutation: repository write plus the full
/// set of history rows.
impl UndoGraph {
    /// Saves the record and records the operation. The before edge snapshot
    /// straddles `save_related`: it is taken right after the vertex write,
    /// the after snapshot right after the callback returns.
    pub(crate) fn save_with_history<R: GraphRecord>(
        &self,
        record: &mut R,
        recurse: bool,
    ) -> Result<(), UndoGraphError> {
        if let Some(id) = record.id() {
            if self.saving().borrow().contains(&id) {
                return Ok(());
            }
        }
        let (op_type, before_json, after_json) = self.save_properties(record)?;
        let id = record
            .id()
            .ok_or_else(|| UndoGraphError::invalid_input("save did not assign an id"))?;
        self.saving().borrow_mut().insert(id);
        let operation_id = self.record_operation(op_type)?;
        self.snapshot_edges(operation_id, id, EdgeHistoryTable::Before)?;
        self.write_vertex_history(operation_id, id, R::type_name(), &before_json, &after_json)?;
        record.save_related(self, recurse)?;
        self.snapshot_edges(operation_id, id, EdgeHistoryTable::After)?;
        Ok(())
    }

    /// Deletes the vertex and records the operation. The before snapshot is
    /// taken while the edges still exist; the after snapshot afterwards and
    /// is therefore empty.
    pub(crate) fn delete_with_history(
        &self,
        id: i64,
        type_name: &str,
    ) -> Result<(), UndoGraphError> {
        let Some(before_json) = self.vertex_json(id)? else {
            return Ok(());
        };
        let operation_id = self.record_operation(OperationType::Delete)?;
        self.snapshot_edges(operation_id, id, EdgeHistoryTable::Before)?;
        self.write_vertex_history(operation_id, id, type_name, &before_json, "")?;
        self.delete_vertex_row(id)?;
        self.delete_incident_edges(id)?;
        self.snapshot_edges(operation_id, id, EdgeHistoryTable::After)?;
        Ok(())
    }
}

/// Walkable-history integrity report, in the spirit of a deep safety check:
/// counts plus any violations of the cursor and linked-list invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub operation_count: i64,
    pub transaction_count: i64,
    pub violations: Vec<String>,
}

impl HistoryReport {
    pub fn has_issues(&self) -> bool {
        !self.violations.is_empty()
    }
}

impl UndoGraph {
    /// Verifies both linked lists: at most one `current` row each, and the
    /// next-pointers forming a simple path (single head, no cycles, no
    /// branches) that reaches every row in the table.
    pub fn verify_history(&self) -> Result<HistoryReport, UndoGraphError> {
        let mut report = HistoryReport {
            operation_count: self.operation_count()?,
            transaction_count: self.transaction_count()?,
            violations: Vec::new(),
        };
        let current_ops = self
            .store()
            .scalar("SELECT COUNT(*) FROM operations WHERE current=1", [])?
            .unwrap_or(0);
        if current_ops > 1 {
            report
                .violations
                .push(format!("{current_ops} operations marked current"));
        }
        let current_txs = self
            .store()
            .scalar("SELECT COUNT(*) FROM undo_transactions WHERE current=1", [])?
            .unwrap_or(0);
        if current_txs > 1 {
            report
                .violations
                .push(format!("{current_txs} undo transactions marked current"));
        }
        let operation_total = report.operation_count;
        let transaction_total = report.transaction_count;
        self.check_list(&mut report, "operations", "next_operation", operation_total)?;
        self.check_list(
            &mut report,
            "undo_transactions",
            "next_undo_transaction",
            transaction_total,
        )?;
        Ok(report)
    }

    fn check_list(
        &self,
        report: &mut HistoryReport,
        table: &str,
        next_column: &str,
        total: i64,
    ) -> Result<(), UndoGraphError> {
        if total == 0 {
            return Ok(());
        }
        let branches = self
            .store()
            .scalar(
                &format!(
                    "SELECT COUNT(*) FROM (\
                         SELECT {next_column} FROM {table} \
                         WHERE {next_column} != -1 \
                         GROUP BY {next_column} HAVING COUNT(*) > 1\
                     )"
                ),
                [],
            )?
            .unwrap_or(0);
        if branches > 0 {
            report
                .violations
                .push(format!("{branches} branch points in {table} chain"));
        }
        let heads = self.unreferenced_ids(table, next_column)?;
        if heads.len() != 1 {
            report
                .violations
                .push(format!("{table} chain has {} heads", heads.len()));
            return Ok(());
        }
        let mut seen = ahash::AHashSet::new();
        let mut cursor = heads[0];
        loop {
            if !seen.insert(cursor) {
                report
                    .violations
                    .push(format!("{table} chain cycles at {cursor}"));
                return Ok(());
            }
            let next = self
                .store()
                .scalar(
                    &format!("SELECT {next_column} FROM {table} WHERE id=?1"),
                    params![cursor],
                )?
                .unwrap_or(-1);
            if next <= 0 {
                break;
            }
            cursor = next;
        }
        let reachable = seen.len() as i64;
        if reachable != total {
            report.violations.push(format!(
                "{} of {total} {table} rows unreachable from head",
                total - reachable
            ));
        }
        Ok(())
    }

    /// Rows no next-pointer references; a well-formed chain has exactly one
    /// (its head).
    fn unreferenced_ids(
        &self,
        table: &str,
        next_column: &str,
    ) -> Result<Vec<i64>, UndoGraphError> {
        let sql = format!(
            "SELECT id FROM {table} WHERE id NOT IN \
             (SELECT {next_column} FROM {table} WHERE {next_column} != -1) \
             ORDER BY id"
        );
        let mut stmt = self
            .conn()
            .prepare(&sql)
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| UndoGraphError::query(e.to_string()))?);
        }
        Ok(ids)
    }
}
