//! Visit database operations.

use rusqlite::{params, OptionalExtension};

use super::{parse_date, Database, DbError, DbResult};
use crate::models::{StepData, Visit, VisitMetadata, VisitStep};

const VISIT_COLUMNS: &str = "visit_id, patient_id, patient_name, visit_date, metadata, \
                             current_step, step_data, created_at, updated_at";

impl Database {
    /// Insert a visit, or update step progress of an existing one.
    ///
    /// `created_at` and the patient columns are never rewritten.
    pub fn upsert_visit(&self, visit: &Visit) -> DbResult<()> {
        let metadata_json = serde_json::to_string(&visit.metadata)?;
        let step_data_json = serde_json::to_string(&visit.step_data)?;

        self.conn.execute(
            r#"
            INSERT INTO visits (
                visit_id, patient_id, patient_name, visit_date, metadata,
                current_step, step_data, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(visit_id) DO UPDATE SET
                metadata = excluded.metadata,
                current_step = excluded.current_step,
                step_data = excluded.step_data,
                updated_at = excluded.updated_at
            "#,
            params![
                visit.visit_id,
                visit.patient_id,
                visit.patient_name,
                visit.visit_date.to_string(),
                metadata_json,
                visit.current_step.as_str(),
                step_data_json,
                visit.created_at,
                visit.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, visit_id: &str) -> DbResult<Option<Visit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM visits WHERE visit_id = ?", VISIT_COLUMNS),
                [visit_id],
                VisitRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all visits of a patient, newest first.
    pub fn list_visits_for_patient(&self, patient_id: &str) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visits WHERE patient_id = ? \
             ORDER BY visit_date DESC, created_at DESC",
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], VisitRow::from_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }

    /// List visits that have not reached the completed step.
    pub fn list_open_visits(&self) -> DbResult<Vec<Visit>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM visits WHERE current_step != 'completed' \
             ORDER BY created_at ASC",
            VISIT_COLUMNS
        ))?;

        let rows = stmt.query_map([], VisitRow::from_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    visit_id: String,
    patient_id: String,
    patient_name: String,
    visit_date: String,
    metadata: String,
    current_step: String,
    step_data: String,
    created_at: String,
    updated_at: String,
}

impl VisitRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(VisitRow {
            visit_id: row.get(0)?,
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            visit_date: row.get(3)?,
            metadata: row.get(4)?,
            current_step: row.get(5)?,
            step_data: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<VisitRow> for Visit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let metadata: VisitMetadata = serde_json::from_str(&row.metadata)?;
        let step_data: StepData = serde_json::from_str(&row.step_data)?;
        let current_step: VisitStep = row.current_step.parse().map_err(DbError::Constraint)?;

        Ok(Visit {
            visit_id: row.visit_id,
            patient_id: row.patient_id,
            patient_name: row.patient_name,
            visit_date: parse_date(&row.visit_date)?,
            metadata,
            current_step,
            step_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
