//! Consultation database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{ConsultationDraft, ConsultationStatus};

impl Database {
    /// Insert or update a consultation.
    ///
    /// Completed consultations are immutable: once a row is `completed`,
    /// later saves are ignored. Returns whether a row was written.
    pub fn save_consultation(&self, draft: &ConsultationDraft) -> DbResult<bool> {
        let body = serde_json::to_string(draft)?;

        let rows_affected = self.conn.execute(
            r#"
            INSERT INTO consultations (
                consultation_id, visit_id, patient_id, visit_date, status,
                previous_consultation_id, body, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(consultation_id) DO UPDATE SET
                status = excluded.status,
                body = excluded.body,
                updated_at = excluded.updated_at
            WHERE consultations.status = 'draft'
            "#,
            params![
                draft.consultation_id,
                draft.visit_id,
                draft.patient_id,
                draft.visit_date.to_string(),
                status_to_string(&draft.status),
                draft.previous_consultation_id,
                body,
                draft.created_at,
                draft.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a consultation by ID.
    pub fn get_consultation(&self, consultation_id: &str) -> DbResult<Option<ConsultationDraft>> {
        self.conn
            .query_row(
                "SELECT body FROM consultations WHERE consultation_id = ?",
                [consultation_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|body| decode_body(&body))
            .transpose()
    }

    /// Latest saved consultation of a visit (draft or completed).
    pub fn get_consultation_for_visit(&self, visit_id: &str) -> DbResult<Option<ConsultationDraft>> {
        self.conn
            .query_row(
                r#"
                SELECT body FROM consultations
                WHERE visit_id = ?
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
                [visit_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(|body| decode_body(&body))
            .transpose()
    }

    /// Completed consultations of a patient, newest visit first.
    pub fn list_completed_consultations(&self, patient_id: &str) -> DbResult<Vec<ConsultationDraft>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT body FROM consultations
            WHERE patient_id = ? AND status = 'completed'
            ORDER BY visit_date DESC, created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| row.get::<_, String>(0))?;

        let mut consultations = Vec::new();
        for body in rows {
            consultations.push(decode_body(&body?)?);
        }
        Ok(consultations)
    }

    /// Delete abandoned drafts of a visit. Completed records are kept.
    pub fn discard_drafts_for_visit(&self, visit_id: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "DELETE FROM consultations WHERE visit_id = ? AND status = 'draft'",
            [visit_id],
        )?;
        Ok(rows_affected)
    }
}

fn decode_body(body: &str) -> DbResult<ConsultationDraft> {
    Ok(serde_json::from_str(body)?)
}

fn status_to_string(status: &ConsultationStatus) -> &'static str {
    match status {
        ConsultationStatus::Draft => "draft",
        ConsultationStatus::Completed => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Visit, VisitMetadata};
    use chrono::NaiveDate;

    fn setup() -> (Database, Visit) {
        let db = Database::open_in_memory().unwrap();
        let visit = Visit::new(
            "P1".into(),
            "Jane".into(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            VisitMetadata::default(),
        );
        db.upsert_visit(&visit).unwrap();
        (db, visit)
    }

    #[test]
    fn test_save_and_get_draft() {
        let (db, visit) = setup();
        let mut draft = ConsultationDraft::for_visit(&visit);
        draft.chief_complaint = "Chest pain".into();

        assert!(db.save_consultation(&draft).unwrap());
        let retrieved = db.get_consultation(&draft.consultation_id).unwrap().unwrap();
        assert_eq!(retrieved, draft);

        draft.chief_complaint = "Chest pain on exertion".into();
        assert!(db.save_consultation(&draft).unwrap());
        let retrieved = db.get_consultation_for_visit(&visit.visit_id).unwrap().unwrap();
        assert_eq!(retrieved.chief_complaint, "Chest pain on exertion");
    }

    #[test]
    fn test_completed_is_immutable() {
        let (db, visit) = setup();
        let mut draft = ConsultationDraft::for_visit(&visit);
        draft.chief_complaint = "Final".into();
        draft.status = ConsultationStatus::Completed;
        db.save_consultation(&draft).unwrap();

        draft.chief_complaint = "Edited later".into();
        draft.status = ConsultationStatus::Draft;
        assert!(!db.save_consultation(&draft).unwrap());

        let retrieved = db.get_consultation(&draft.consultation_id).unwrap().unwrap();
        assert_eq!(retrieved.chief_complaint, "Final");
        assert!(retrieved.is_completed());
    }

    #[test]
    fn test_list_completed_only() {
        let (db, visit) = setup();
        let draft = ConsultationDraft::for_visit(&visit);
        db.save_consultation(&draft).unwrap();

        let mut done = ConsultationDraft::for_visit(&visit);
        done.status = ConsultationStatus::Completed;
        db.save_consultation(&done).unwrap();

        let list = db.list_completed_consultations("P1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].consultation_id, done.consultation_id);
        assert!(db.list_completed_consultations("P2").unwrap().is_empty());
    }

    #[test]
    fn test_discard_drafts() {
        let (db, visit) = setup();
        db.save_consultation(&ConsultationDraft::for_visit(&visit)).unwrap();
        let mut done = ConsultationDraft::for_visit(&visit);
        done.status = ConsultationStatus::Completed;
        db.save_consultation(&done).unwrap();

        assert_eq!(db.discard_drafts_for_visit(&visit.visit_id).unwrap(), 1);
        assert!(db.get_consultation(&done.consultation_id).unwrap().is_some());
    }
}
