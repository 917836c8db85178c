use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::UndoGraphError,
    graph::UndoGraph,
    history::{EdgeHistoryTable, OperationType},
};

/// One user-level undo step: the span of operation ids `(start, end]`
/// produced while the bracket was open. Singly linked, like operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoTransactionRow {
    pub id: i64,
    pub undo_operation_start: i64,
    pub undo_operation_end: i64,
    pub current: bool,
    pub next_undo_transaction: i64,
}

impl UndoGraph {
    pub fn current_transaction(&self) -> Result<Option<UndoTransactionRow>, UndoGraphError> {
        let id = self
            .store()
            .scalar("SELECT id FROM undo_transactions WHERE current=1", [])?;
        match id {
            Some(id) => Ok(Some(self.undo_transaction(id)?)),
            None => Ok(None),
        }
    }

    pub fn transaction_count(&self) -> Result<i64, UndoGraphError> {
        Ok(self
            .store()
            .scalar("SELECT COUNT(*) FROM undo_transactions", [])?
            .unwrap_or(0))
    }

    pub(crate) fn undo_transaction(&self, id: i64) -> Result<UndoTransactionRow, UndoGraphError> {
        self.conn()
            .query_row(
                "SELECT id, undo_operation_start, undo_operation_end, current, next_undo_transaction \
                 FROM undo_transactions WHERE id=?1",
                params![id],
                |row| {
                    Ok(UndoTransactionRow {
                        id: row.get(0)?,
                        undo_operation_start: row.get(1)?,
                        undo_operation_end: row.get(2)?,
                        current: row.get::<_, i64>(3)? != 0,
                        next_undo_transaction: row.get(4)?,
                    })
                },
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    UndoGraphError::not_found(format!("undo transaction {id}"))
                }
                other => UndoGraphError::query(other.to_string()),
            })
    }

    /// Wraps a user action into one undo step. All writes are atomic; the
    /// span of operations the action produced is captured and linked into
    /// the transactions list. A nested call participates in the active
    /// bracket instead of opening its own.
    ///
    /// An action that boils down to a single no-change update is rolled
    /// back wholesale: neither the vertex write nor any history row
    /// persists, and no new transaction appears.
    pub(crate) fn with_undo_transaction(
        &self,
        action: impl FnOnce() -> Result<(), UndoGraphError>,
    ) -> Result<(), UndoGraphError> {
        if self.bracket_active().get() {
            return action();
        }
        self.bracket_active().set(true);
        let result = self.store().with_transaction(|| {
            let tx_start = self.current_operation_id()?.unwrap_or(0);
            let baseline = self.max_operation_id()?;
            action()?;
            let tx_end = self.current_operation_id()?.unwrap_or(0);
            if tx_end == tx_start {
                return Ok(());
            }
            if self.is_idempotent_span(baseline)? {
                return Err(UndoGraphError::NoChange);
            }
            self.link_transaction(tx_start, tx_end)
        });
        self.bracket_active().set(false);
        self.saving().borrow_mut().clear();
        match result {
            Err(UndoGraphError::NoChange) => Ok(()),
            other => other,
        }
    }

    /// The idempotence guard: true when the bracket produced exactly one
    /// operation, it is an update, its before and after images are the
    /// same JSON value, and its edge snapshots are equal as sets.
    fn is_idempotent_span(&self, baseline: i64) -> Result<bool, UndoGraphError> {
        let count = self
            .store()
            .scalar(
                "SELECT COUNT(*) FROM operations WHERE id > ?1",
                params![baseline],
            )?
            .unwrap_or(0);
        if count != 1 {
            return Ok(false);
        }
        let Some(op_id) = self.store().scalar(
            "SELECT id FROM operations WHERE id > ?1",
            params![baseline],
        )?
        else {
            return Ok(false);
        };
        let op = self.operation(op_id)?;
        if op.op_type != OperationType::Update {
            return Ok(false);
        }
        let history = self.vertex_history_for(op_id)?;
        if history.before_json.is_empty() || history.after_json.is_empty() {
            return Ok(false);
        }
        let before: Value = serde_json::from_str(&history.before_json)
            .map_err(|e| UndoGraphError::codec(e.to_string()))?;
        let after: Value = serde_json::from_str(&history.after_json)
            .map_err(|e| UndoGraphError::codec(e.to_string()))?;
        if before != after {
            return Ok(false);
        }
        let mut edges_before = self.edge_history(op_id, EdgeHistoryTable::Before)?;
        let mut edges_after = self.edge_history(op_id, EdgeHistoryTable::After)?;
        edges_before.sort();
        edges_after.sort();
        Ok(edges_before == edges_after)
    }

    /// Inserts the transaction row and moves the `current` marker onto it,
    /// mirroring the operation-list linking. By the time a span closes, the
    /// stale forward branch has already been discarded alongside its
    /// operations, so the previous current transaction is the list tail
    /// (or the list is empty and the new row becomes the head).
    fn link_transaction(&self, start: i64, end: i64) -> Result<(), UndoGraphError> {
        let prev = self
            .store()
            .scalar("SELECT id FROM undo_transactions WHERE current=1", [])?;
        self.store().execute(
            "INSERT INTO undo_transactions\
             (undo_operation_start, undo_operation_end, current, next_undo_transaction) \
             VALUES(?1, ?2, 0, -1)",
            params![start, end],
        )?;
        let new_id = self.conn().last_insert_rowid();
        if let Some(prev_id) = prev {
            self.store().execute(
                "UPDATE undo_transactions SET next_undo_transaction=?2, current=0 WHERE id=?1",
                params![prev_id, new_id],
            )?;
        }
        self.store().execute(
            "UPDATE undo_transactions SET current=1 WHERE id=?1",
            params![new_id],
        )?;
        tracing::debug!(transaction = new_id, start, end, "linked undo transaction");
        Ok(())
    }

    /// Drops the transactions after the current one (all of them when no
    /// transaction is current but rows remain). Runs as part of discarding
    /// a redo branch; the spans being dropped cover exactly the operations
    /// being dropped.
    pub(crate) fn discard_stale_transactions(&self) -> Result<(), UndoGraphError> {
        let stale = match self.current_transaction()? {
            Some(tx) => self.transaction_chain_from(tx.next_undo_transaction)?,
            None => self.all_transaction_ids()?,
        };
        if stale.is_empty() {
            return Ok(());
        }
        for tx_id in &stale {
            self.store()
                .execute("DELETE FROM undo_transactions WHERE id=?1", params![tx_id])?;
        }
        if let Some(tx) = self.current_transaction()? {
            self.store().execute(
                "UPDATE undo_transactions SET next_undo_transaction=-1 WHERE id=?1",
                params![tx.id],
            )?;
        }
        Ok(())
    }

    fn transaction_chain_from(&self, start_id: i64) -> Result<Vec<i64>, UndoGraphError> {
        let mut ids = Vec::new();
        let mut seen = ahash::AHashSet::new();
        let mut cursor = start_id;
        while cursor > 0 && seen.insert(cursor) {
            ids.push(cursor);
            cursor = self
                .store()
                .scalar(
                    "SELECT next_undo_transaction FROM undo_transactions WHERE id=?1",
                    params![cursor],
                )?
                .unwrap_or(-1);
        }
        Ok(ids)
    }

    fn all_transaction_ids(&self) -> Result<Vec<i64>, UndoGraphError> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT id FROM undo_transactions ORDER BY id")
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
