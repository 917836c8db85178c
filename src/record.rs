use serde_json::Value;

use crate::{errors::UndoGraphError, graph::UndoGraph};

/// Contract a user type fulfils to be persisted as a vertex.
///
/// Scalar fields travel through `encode`/`decode`; fields holding related
/// records are excluded from the JSON image and represented as edges, wired
/// up inside the three callbacks. Callbacks receive the engine by reference
/// and may call back into it; nested saves and deletes participate in the
/// transaction already in flight.
pub trait GraphRecord: Sized {
    /// Canonical, stable name the vertex rows are tagged with.
    fn type_name() -> &'static str;

    /// `None` means the record has not been saved yet.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// JSON image of the scalar fields only.
    fn encode(&self) -> Result<Value, UndoGraphError>;

    fn decode(value: &Value) -> Result<Self, UndoGraphError>;

    /// Runs after decoding; populates related fields via
    /// [`UndoGraph::related`] / [`UndoGraph::related_item`].
    fn initialize(&mut self, graph: &UndoGraph) -> Result<(), UndoGraphError> {
        let _ = graph;
        Ok(())
    }

    /// Runs after the vertex row is written; persists each outbound edge
    /// collection via [`UndoGraph::save_relations`] and
    /// [`UndoGraph::save_relation`]. Completion indexing opts in from here.
    fn save_related(&mut self, graph: &UndoGraph, recurse: bool) -> Result<(), UndoGraphError> {
        let _ = (graph, recurse);
        Ok(())
    }

    /// Enumerates children to cascade during [`UndoGraph::delete_all`].
    fn delete_related(&mut self, graph: &UndoGraph) -> Result<(), UndoGraphError> {
        let _ = graph;
        Ok(())
    }
}
