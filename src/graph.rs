use std::{
    cell::{Cell, RefCell},
    path::Path,
};

use ahash::AHashSet;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::{errors::UndoGraphError, record::GraphRecord, store::GraphStore};

/// One directed labeled edge, as stored in `relations` and in the two edge
/// history tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeRow {
    pub from_id: i64,
    pub to_id: i64,
    pub relation: String,
}

/// The persistence engine: vertex/edge storage plus the transactional
/// undo/redo history. One logical caller at a time; every public mutation
/// runs inside a store-level transaction.
pub struct UndoGraph {
    store: GraphStore,
    bracket_active: Cell<bool>,
    saving: RefCell<AHashSet<i64>>,
}

impl UndoGraph {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UndoGraphError> {
        Ok(Self::from_store(GraphStore::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, UndoGraphError> {
        Ok(Self::from_store(GraphStore::open_in_memory()?))
    }

    /// Saves the record's scalar fields and its directly declared edges as
    /// one undo transaction. Related records are not saved recursively; see
    /// [`UndoGraph::save_all`] for that.
    pub fn save<R: GraphRecord>(&self, record: &mut R) -> Result<(), UndoGraphError> {
        self.with_undo_transaction(|| self.save_with_history(record, false))
    }

    /// Saves the record and every reachable related record as one undo
    /// transaction.
    pub fn save_all<R: GraphRecord>(&self, record: &mut R) -> Result<(), UndoGraphError> {
        self.with_undo_transaction(|| self.save_with_history(record, true))
    }

    /// Deletes the record's vertex and every edge incident to it as one
    /// undo transaction. The cascade hook is not invoked.
    pub fn delete<R: GraphRecord>(&self, record: &R) -> Result<(), UndoGraphError> {
        self.with_undo_transaction(|| match record.id() {
            Some(id) => self.delete_with_history(id, R::type_name()),
            None => Ok(()),
        })
    }

    /// Deletes the record and cascades through its `delete_related` hook,
    /// all as one undo transaction.
    pub fn delete_all<R: GraphRecord>(&self, record: &mut R) -> Result<(), UndoGraphError> {
        self.with_undo_transaction(|| {
            let Some(id) = record.id() else {
                return Ok(());
            };
            record.delete_related(self)?;
            self.delete_with_history(id, R::type_name())
        })
    }

    pub(crate) fn store(&self) -> &GraphStore {
        &self.store
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.store.conn()
    }

    pub(crate) fn bracket_active(&self) -> &Cell<bool> {
        &self.bracket_active
    }

    pub(crate) fn saving(&self) -> &RefCell<AHashSet<i64>> {
        &self.saving
    }

    fn from_store(store: GraphStore) -> Self {
        Self {
            store,
            bracket_active: Cell::new(false),
            saving: RefCell::new(AHashSet::new()),
        }
    }
}

/// Row-level primitives over `by_type` and `relations`. Everything above
/// (repository, history, replay) goes through these.
impl UndoGraph {
    pub(crate) fn insert_vertex_row(
        &self,
        type_name: &str,
        json: &str,
    ) -> Result<i64, UndoGraphError> {
        self.store.execute(
            "INSERT INTO by_type(type_name, json) VALUES(?1, ?2)",
            params![type_name, json],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Re-insert with the original id; used by replay so that vertex ids
    /// survive undo/redo cycles.
    pub(crate) fn insert_vertex_row_with_id(
        &self,
        id: i64,
        type_name: &str,
        json: &str,
    ) -> Result<(), UndoGraphError> {
        self.store.execute(
            "INSERT INTO by_type(id, type_name, json) VALUES(?1, ?2, ?3)",
            params![id, type_name, json],
        )?;
        Ok(())
    }

    pub(crate) fn update_vertex_row(&self, id: i64, json: &str) -> Result<(), UndoGraphError> {
        self.store.execute(
            "UPDATE by_type SET json=?2 WHERE id=?1",
            params![id, json],
        )?;
        Ok(())
    }

    pub(crate) fn delete_vertex_row(&self, id: i64) -> Result<(), UndoGraphError> {
        self.store
            .execute("DELETE FROM by_type WHERE id=?1", params![id])?;
        Ok(())
    }

    pub(crate) fn vertex_json(&self, id: i64) -> Result<Option<String>, UndoGraphError> {
        self.store
            .pluck("SELECT json FROM by_type WHERE id=?1", params![id])
    }

    pub(crate) fn insert_edge_row(
        &self,
        from_id: i64,
        to_id: i64,
        relation: &str,
    ) -> Result<(), UndoGraphError> {
        self.store.execute(
            "INSERT INTO relations(from_id, to_id, relation) VALUES(?1, ?2, ?3)",
            params![from_id, to_id, relation],
        )?;
        Ok(())
    }

    pub(crate) fn delete_edges_for_property(
        &self,
        from_id: i64,
        relation: &str,
    ) -> Result<(), UndoGraphError> {
        self.store.execute(
            "DELETE FROM relations WHERE from_id=?1 AND relation=?2",
            params![from_id, relation],
        )?;
        Ok(())
    }

    pub(crate) fn delete_incident_edges(&self, id: i64) -> Result<(), UndoGraphError> {
        self.store.execute(
            "DELETE FROM relations WHERE from_id=?1 OR to_id=?1",
            params![id],
        )?;
        Ok(())
    }
}
