use rusqlite::params;
use serde_json::Value;

use crate::{
    errors::UndoGraphError, graph::UndoGraph, history::OperationType, record::GraphRecord,
};

/// Typed CRUD over vertices and edges. Decoding rehydrates the record from
/// its JSON image, writes the id back, and runs the `initialize` callback
/// so related fields can be resolved lazily.
impl UndoGraph {
    /// All vertices of the record's type, in insertion order.
    pub fn retrieve<R: GraphRecord>(&self) -> Result<Vec<R>, UndoGraphError> {
        self.retrieve_rows(
            "SELECT id, json FROM by_type WHERE type_name=?1 ORDER BY id",
            params![R::type_name()],
        )
    }

    /// Same as [`UndoGraph::retrieve`] with an offset/limit window.
    pub fn retrieve_page<R: GraphRecord>(
        &self,
        start: u32,
        limit: u32,
    ) -> Result<Vec<R>, UndoGraphError> {
        self.retrieve_rows(
            "SELECT id, json FROM by_type WHERE type_name=?1 ORDER BY id LIMIT ?3 OFFSET ?2",
            params![R::type_name(), start, limit],
        )
    }

    /// Zero or one vertex; a row with the right id but another type name
    /// yields `None`.
    pub fn retrieve_by_id<R: GraphRecord>(&self, id: i64) -> Result<Option<R>, UndoGraphError> {
        let json = self.store().pluck(
            "SELECT json FROM by_type WHERE id=?1 AND type_name=?2",
            params![id, R::type_name()],
        )?;
        match json {
            Some(json) => Ok(Some(self.decode_record(id, &json)?)),
            None => Ok(None),
        }
    }

    /// Vertices reachable over `(from_id, property)` edges, in edge
    /// insertion order. An unsaved source yields the empty list.
    pub fn related<R: GraphRecord>(
        &self,
        from_id: Option<i64>,
        property: &str,
    ) -> Result<Vec<R>, UndoGraphError> {
        let Some(from_id) = from_id else {
            return Ok(Vec::new());
        };
        self.retrieve_rows(
            "SELECT b.id, b.json FROM relations r \
             JOIN by_type b ON b.id = r.to_id \
             WHERE r.from_id=?1 AND r.relation=?2 AND b.type_name=?3 \
             ORDER BY r.rowid",
            params![from_id, property, R::type_name()],
        )
    }

    /// [`UndoGraph::related`] restricted to exactly one result; zero or
    /// several yield `None`.
    pub fn related_item<R: GraphRecord>(
        &self,
        from_id: Option<i64>,
        property: &str,
    ) -> Result<Option<R>, UndoGraphError> {
        let mut items = self.related::<R>(from_id, property)?;
        if items.len() == 1 {
            Ok(items.pop())
        } else {
            Ok(None)
        }
    }

    /// Writes the scalar image: update when the identifier is set, insert
    /// otherwise (assigning the id back onto the record). Returns the
    /// operation type together with the before and after images.
    pub(crate) fn save_properties<R: GraphRecord>(
        &self,
        record: &mut R,
    ) -> Result<(OperationType, String, String), UndoGraphError> {
        let after_json = serde_json::to_string(&record.encode()?)
            .map_err(|e| UndoGraphError::codec(e.to_string()))?;
        match record.id() {
            Some(id) => {
                let before_json = self.vertex_json(id)?.unwrap_or_default();
                self.update_vertex_row(id, &after_json)?;
                Ok((OperationType::Update, before_json, after_json))
            }
            None => {
                let id = self.insert_vertex_row(R::type_name(), &after_json)?;
                record.set_id(id);
                Ok((OperationType::Create, String::new(), after_json))
            }
        }
    }

    /// Replaces the edge set for `(from_id, property)` with one edge per
    /// item. With `recurse`, each item is first saved through the full path
    /// so its id exists; without it, still-unsaved items are skipped.
    pub fn save_relations<R: GraphRecord>(
        &self,
        from_id: Option<i64>,
        items: &mut [R],
        property: &str,
        recurse: bool,
    ) -> Result<(), UndoGraphError> {
        let Some(from_id) = from_id else {
            return Ok(());
        };
        if recurse {
            for item in items.iter_mut() {
                self.save_with_history(item, true)?;
            }
        }
        self.delete_edges_for_property(from_id, property)?;
        for item in items.iter() {
            if let Some(to_id) = item.id() {
                self.insert_edge_row(from_id, to_id, property)?;
            }
        }
        Ok(())
    }

    /// To-one variant of [`UndoGraph::save_relations`].
    pub fn save_relation<R: GraphRecord>(
        &self,
        from_id: Option<i64>,
        item: Option<&mut R>,
        property: &str,
        recurse: bool,
    ) -> Result<(), UndoGraphError> {
        let Some(from_id) = from_id else {
            return Ok(());
        };
        if let Some(item) = item {
            if recurse {
                self.save_with_history(item, true)?;
            }
            self.delete_edges_for_property(from_id, property)?;
            if let Some(to_id) = item.id() {
                self.insert_edge_row(from_id, to_id, property)?;
            }
        } else {
            self.delete_edges_for_property(from_id, property)?;
        }
        Ok(())
    }

    pub(crate) fn decode_record<R: GraphRecord>(
        &self,
        id: i64,
        json: &str,
    ) -> Result<R, UndoGraphError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| UndoGraphError::codec(e.to_string()))?;
        let mut record = R::decode(&value)?;
        record.set_id(id);
        record.initialize(self)?;
        Ok(record)
    }

    fn retrieve_rows<R: GraphRecord, P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<R>, UndoGraphError> {
        let mut stmt = self
            .conn()
            .prepare_cached(sql)
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| UndoGraphError::query(e.to_string()))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row.map_err(|e| UndoGraphError::query(e.to_string()))?);
        }
        let mut records = Vec::new();
        for (id, json) in pairs {
            records.push(self.decode_record(id, &json)?);
        }
        Ok(records)
    }
}
