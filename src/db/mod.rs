pub mod sqlite;
pub mod store;

pub use sqlite::*;
pub use store::*;

use thiserror::Error;
use uuid::Uuid;

use crate::compliance::types::Detection;
use crate::models::NormalizedLineItem;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal lock failed")]
    LockFailed,
}

/// Persistence boundary for reconciled line items and detections.
///
/// Line items are keyed by (case id, artifact id, page, row index);
/// detections by case id.
pub trait ExtractionStore: Send + Sync {
    /// Save line items. Every artifact in the batch replaces the rows
    /// previously stored for it under the same case.
    fn save_line_items(&self, items: &[NormalizedLineItem]) -> Result<(), DatabaseError>;

    fn load_line_items(&self, case_id: &Uuid) -> Result<Vec<NormalizedLineItem>, DatabaseError>;

    /// Replace the detections stored for a case with the given run's output.
    fn save_detections(&self, case_id: &Uuid, detections: &[Detection])
        -> Result<(), DatabaseError>;

    fn load_detections(&self, case_id: &Uuid) -> Result<Vec<Detection>, DatabaseError>;
}
