//! SQLite-backed `ExtractionStore`.
//!
//! Key columns are stored alongside the full JSON payload so rows can be
//! queried without deserializing, while the payload stays the source of truth.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::sqlite::{open_database, open_memory_database};
use super::{DatabaseError, ExtractionStore};
use crate::compliance::types::Detection;
use crate::models::NormalizedLineItem;

pub struct SqliteExtractionStore {
    conn: Mutex<Connection>,
}

impl SqliteExtractionStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockFailed)?;
        f(&conn)
    }
}

impl ExtractionStore for SqliteExtractionStore {
    fn save_line_items(&self, items: &[NormalizedLineItem]) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

            // A re-extracted artifact replaces all of its earlier rows.
            let artifacts: BTreeSet<(Uuid, Uuid)> =
                items.iter().map(|i| (i.case_id, i.artifact_id)).collect();
            for (case_id, artifact_id) in &artifacts {
                tx.execute(
                    "DELETE FROM line_items WHERE case_id = ?1 AND artifact_id = ?2",
                    params![case_id.to_string(), artifact_id.to_string()],
                )?;
            }

            for item in items {
                let item_json = serde_json::to_string(item)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

                tx.execute(
                    "INSERT INTO line_items
                     (case_id, artifact_id, page, row_index, line_id, doc_type, code,
                      code_system, date_of_service, charge_cents, allowed_cents,
                      plan_paid_cents, patient_resp_cents, consensus, low_confidence,
                      item_json, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    params![
                        item.case_id.to_string(),
                        item.artifact_id.to_string(),
                        item.page,
                        item.row_index as i64,
                        item.line_id.to_string(),
                        item.doc_type.as_str(),
                        item.code,
                        item.code_system.map(|c| c.as_str()),
                        item.date_of_service.map(|d| d.format("%Y-%m-%d").to_string()),
                        item.charge_cents,
                        item.allowed_cents,
                        item.plan_paid_cents,
                        item.patient_resp_cents,
                        item.consensus,
                        item.low_confidence as i32,
                        item_json,
                        now,
                    ],
                )?;
            }

            tx.commit()?;
            tracing::debug!(
                rows = items.len(),
                artifacts = artifacts.len(),
                "Stored line items"
            );
            Ok(())
        })
    }

    fn load_line_items(&self, case_id: &Uuid) -> Result<Vec<NormalizedLineItem>, DatabaseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT item_json FROM line_items
                 WHERE case_id = ?1
                 ORDER BY artifact_id, page, row_index",
            )?;

            let rows = stmt.query_map(params![case_id.to_string()], |row| {
                row.get::<_, String>(0)
            })?;

            let mut items = Vec::new();
            for row in rows {
                let json = row?;
                items.push(
                    serde_json::from_str(&json)
                        .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
                );
            }
            Ok(items)
        })
    }

    fn save_detections(
        &self,
        case_id: &Uuid,
        detections: &[Detection],
    ) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "DELETE FROM detections WHERE case_id = ?1",
                params![case_id.to_string()],
            )?;

            for detection in detections {
                if detection.case_id != *case_id {
                    return Err(DatabaseError::ConstraintViolation(format!(
                        "detection {} belongs to case {}, not {}",
                        detection.id, detection.case_id, case_id
                    )));
                }

                let detection_json = serde_json::to_string(detection)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

                tx.execute(
                    "INSERT INTO detections
                     (id, case_id, category, severity, detection_json, detected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        detection.id.to_string(),
                        case_id.to_string(),
                        detection.category.as_str(),
                        detection.severity.as_str(),
                        detection_json,
                        detection.detected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    fn load_detections(&self, case_id: &Uuid) -> Result<Vec<Detection>, DatabaseError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT detection_json FROM detections
                 WHERE case_id = ?1
                 ORDER BY rowid ASC",
            )?;

            let rows = stmt.query_map(params![case_id.to_string()], |row| {
                row.get::<_, String>(0)
            })?;

            let mut detections = Vec::new();
            for row in rows {
                let json = row?;
                detections.push(
                    serde_json::from_str(&json)
                        .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
                );
            }
            Ok(detections)
        })
    }
}
