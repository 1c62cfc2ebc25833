//! Persistence layer: libSQL-backed settings, the pending-write outbox, and
//! the local-first `ProgressStore`.

pub mod libsql_backend;
pub mod migrations;
pub mod outbox;
pub mod progress_store;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use outbox::{PendingOp, PendingWrite};
pub use progress_store::{
    CompletionRecord, FlushReport, LoadedProgress, ProgressSource, ProgressStore, SaveOutcome,
    spawn_outbox_flusher,
};
pub use traits::Database;
