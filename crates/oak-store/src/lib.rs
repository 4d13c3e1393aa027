// Relational activity store: the canonical log the rest of the daemon
// hangs off. Vector replicas are derived from rows here, never the
// other way around.

mod backup;
mod db;
mod error;
mod records;
mod schema;

pub mod queries;

pub use backup::{export_dump, restore_dump};
pub use db::Database;
pub use error::{Error, Result};
pub use records::{
    ActivityRecord, BatchRecord, NewActivity, NewObservation, ObservationFilter,
    ObservationRecord, SessionRecord, SessionStats, StoreStats,
};
pub use schema::SCHEMA_VERSION;
