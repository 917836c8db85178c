//! Embeddable object-graph persistence over SQLite: user records stored as
//! self-describing JSON vertices with typed edges between them, plus a
//! durable, unbounded undo/redo history grouped into transactions.

pub mod codec;
pub mod completion;
pub mod errors;
pub mod graph;
pub mod history;
pub mod record;
pub mod repository;
pub mod schema;
pub mod store;
pub mod transaction;
pub mod undo;

pub use crate::errors::UndoGraphError;
pub use crate::graph::{EdgeRow, UndoGraph};
pub use crate::history::{HistoryReport, OperationRow, OperationType, VertexHistoryRow};
pub use crate::record::GraphRecord;
pub use crate::store::GraphStore;
pub use crate::transaction::UndoTransactionRow;
