use rusqlite::params;

use crate::{
    errors::UndoGraphError,
    graph::UndoGraph,
    history::{EdgeHistoryTable, OperationType, VertexHistoryRow},
};

/// Undo/redo cursor navigation. Replay failures never surface: the store
/// transaction rolls back, a warning is logged, and both cursors stay
/// where they were.
impl UndoGraph {
    /// Reverts the current undo transaction by replaying its operations
    /// backwards from their before images. Returns the type of the last
    /// operation replayed, or `None` when there is nothing to undo.
    pub fn undo(&self) -> Result<Option<OperationType>, UndoGraphError> {
        match self.store().with_transaction(|| self.undo_step()) {
            Ok(replayed) => Ok(replayed),
            Err(err) => {
                tracing::warn!(error = %err, "undo replay failed; history unchanged");
                Ok(None)
            }
        }
    }

    /// Re-applies the next undo transaction forwards from its after
    /// images. With no current transaction but existing history, redo
    /// starts from the first transaction.
    pub fn redo(&self) -> Result<Option<OperationType>, UndoGraphError> {
        match self.store().with_transaction(|| self.redo_step()) {
            Ok(replayed) => Ok(replayed),
            Err(err) => {
                tracing::warn!(error = %err, "redo replay failed; history unchanged");
                Ok(None)
            }
        }
    }

    fn undo_step(&self) -> Result<Option<OperationType>, UndoGraphError> {
        let Some(tx) = self.current_transaction()? else {
            return Ok(None);
        };
        let mut cursor = tx.undo_operation_end;
        let mut replayed = None;
        while cursor > 0 && cursor != tx.undo_operation_start {
            let op = self.operation(cursor)?;
            let history = self.vertex_history_for(op.id)?;
            self.apply(
                op.op_type.inverse(),
                &history,
                EdgeHistoryTable::Before,
                &history.before_json,
            )?;
            replayed = Some(op.op_type);
            let prev = self.predecessor_of(cursor)?;
            self.store()
                .execute("UPDATE operations SET current=0 WHERE id=?1", params![cursor])?;
            match prev {
                Some(prev_id) => {
                    self.store().execute(
                        "UPDATE operations SET current=1 WHERE id=?1",
                        params![prev_id],
                    )?;
                    cursor = prev_id;
                }
                None => break,
            }
        }
        self.store().execute(
            "UPDATE undo_transactions SET current=0 WHERE id=?1",
            params![tx.id],
        )?;
        let prev_tx = self.store().scalar(
            "SELECT id FROM undo_transactions WHERE next_undo_transaction=?1 AND id != ?1",
            params![tx.id],
        )?;
        if let Some(prev_tx_id) = prev_tx {
            self.store().execute(
                "UPDATE undo_transactions SET current=1 WHERE id=?1",
                params![prev_tx_id],
            )?;
        }
        tracing::debug!(transaction = tx.id, "undo applied");
        Ok(replayed)
    }

    fn redo_step(&self) -> Result<Option<OperationType>, UndoGraphError> {
        let current = self.current_transaction()?;
        let target_id = match &current {
            Some(tx) => {
                if tx.next_undo_transaction <= 0 {
                    return Ok(None);
                }
                tx.next_undo_transaction
            }
            None => {
                let Some(first) = self
                    .store()
                    .scalar("SELECT id FROM undo_transactions ORDER BY id LIMIT 1", [])?
                else {
                    return Ok(None);
                };
                first
            }
        };
        let target = self.undo_transaction(target_id)?;
        let mut cursor = if target.undo_operation_start > 0 {
            self.operation(target.undo_operation_start)?.next_operation
        } else {
            self.store()
                .scalar("SELECT id FROM operations ORDER BY id LIMIT 1", [])?
                .unwrap_or(-1)
        };
        let mut replayed = None;
        while cursor > 0 {
            let op = self.operation(cursor)?;
            let history = self.vertex_history_for(op.id)?;
            self.apply(
                op.op_type,
                &history,
                EdgeHistoryTable::After,
                &history.after_json,
            )?;
            replayed = Some(op.op_type);
            self.store()
                .execute("UPDATE operations SET current=0 WHERE current=1", [])?;
            self.store()
                .execute("UPDATE operations SET current=1 WHERE id=?1", params![cursor])?;
            if cursor == target.undo_operation_end {
                break;
            }
            cursor = op.next_operation;
        }
        if let Some(tx) = current {
            self.store().execute(
                "UPDATE undo_transactions SET current=0 WHERE id=?1",
                params![tx.id],
            )?;
        }
        self.store().execute(
            "UPDATE undo_transactions SET current=1 WHERE id=?1",
            params![target.id],
        )?;
        tracing::debug!(transaction = target.id, "redo applied");
        Ok(replayed)
    }

    /// Writes one replay image back into `by_type` and `relations`.
    ///
    /// - create: re-insert the vertex under its original id, then every
    ///   edge recorded for the operation;
    /// - update: overwrite the blob, then rebuild the incident edge set
    ///   from the recorded snapshot;
    /// - delete: drop the vertex and its edges, ignoring edge history.
    fn apply(
        &self,
        op_type: OperationType,
        history: &VertexHistoryRow,
        table: EdgeHistoryTable,
        blob: &str,
    ) -> Result<(), UndoGraphError> {
        let vertex_id = history.by_type_id;
        match op_type {
            OperationType::Create => {
                self.insert_vertex_row_with_id(vertex_id, &history.type_name, blob)?;
                for edge in self.edge_history(history.operation_id, table)? {
                    self.insert_edge_row(edge.from_id, edge.to_id, &edge.relation)?;
                }
            }
            OperationType::Update => {
                self.update_vertex_row(vertex_id, blob)?;
                self.delete_incident_edges(vertex_id)?;
                for edge in self.edge_history(history.operation_id, table)? {
                    self.insert_edge_row(edge.from_id, edge.to_id, &edge.relation)?;
                }
            }
            OperationType::Delete => {
                self.delete_vertex_row(vertex_id)?;
                self.delete_incident_edges(vertex_id)?;
            }
        }
        Ok(())
    }
}
