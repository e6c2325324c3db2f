//! The in-progress consultation of the active visit.

use tracing::info;

use super::{WorkflowError, WorkflowResult};
use crate::db::Database;
use crate::models::{ConsultationDraft, ConsultationStatus, ConsultationUpdate, Visit};

/// Holds the single mutable consultation draft of a visit.
///
/// A session is owned by whoever drives the visit (normally the
/// [`VisitWorkflowEngine`](super::VisitWorkflowEngine)); there is no global
/// "current consultation". The session never debounces: callers merge on
/// every edit and schedule persistence themselves.
#[derive(Debug, Clone)]
pub struct ConsultationSession {
    draft: ConsultationDraft,
}

impl ConsultationSession {
    /// Start an empty draft for a visit.
    pub fn new(visit: &Visit) -> Self {
        Self {
            draft: ConsultationDraft::for_visit(visit),
        }
    }

    /// Resume from a previously saved draft.
    pub fn resume(draft: ConsultationDraft) -> Self {
        Self { draft }
    }

    pub fn draft(&self) -> &ConsultationDraft {
        &self.draft
    }

    pub fn consultation_id(&self) -> &str {
        &self.draft.consultation_id
    }

    pub fn is_completed(&self) -> bool {
        self.draft.is_completed()
    }

    /// Shallow-merge form data into the draft.
    pub fn update_consultation_data(&mut self, partial: ConsultationUpdate) -> WorkflowResult<()> {
        self.ensure_editable()?;
        self.draft.apply(partial);
        self.draft.touch();
        Ok(())
    }

    /// Apply an arbitrary edit to the draft.
    pub fn edit<F>(&mut self, f: F) -> WorkflowResult<()>
    where
        F: FnOnce(&mut ConsultationDraft),
    {
        self.ensure_editable()?;
        let consultation_id = self.draft.consultation_id.clone();
        let visit_id = self.draft.visit_id.clone();
        let patient_id = self.draft.patient_id.clone();

        f(&mut self.draft);

        // Identity and status are owned by the session.
        self.draft.consultation_id = consultation_id;
        self.draft.visit_id = visit_id;
        self.draft.patient_id = patient_id;
        self.draft.status = ConsultationStatus::Draft;
        self.draft.touch();
        Ok(())
    }

    pub fn add_provisional_diagnosis(&mut self, diagnosis: &str) -> WorkflowResult<bool> {
        self.ensure_editable()?;
        Ok(self.draft.add_provisional_diagnosis(diagnosis))
    }

    pub fn add_differential_diagnosis(&mut self, diagnosis: &str) -> WorkflowResult<bool> {
        self.ensure_editable()?;
        Ok(self.draft.add_differential_diagnosis(diagnosis))
    }

    /// Replace the draft with a new one seeded from a prior, completed
    /// consultation.
    ///
    /// The current draft is discarded, not merged into. `previous` is only
    /// read; the new draft is a deep copy.
    pub fn load_consultation(&mut self, previous: &ConsultationDraft) -> WorkflowResult<()> {
        self.ensure_editable()?;
        if !previous.is_completed() {
            return Err(WorkflowError::ConsultationNotCompleted(
                previous.consultation_id.clone(),
            ));
        }
        if previous.patient_id != self.draft.patient_id {
            return Err(WorkflowError::PatientMismatch {
                expected: self.draft.patient_id.clone(),
                found: previous.patient_id.clone(),
            });
        }

        self.draft = self.draft.reseeded_from(previous);
        info!(
            consultation_id = %self.draft.consultation_id,
            previous_consultation_id = %previous.consultation_id,
            "Seeded consultation from previous visit"
        );
        Ok(())
    }

    /// Snapshot of the draft marked completed.
    pub fn completed_snapshot(&self) -> ConsultationDraft {
        let mut snapshot = self.draft.clone();
        snapshot.status = ConsultationStatus::Completed;
        snapshot.touch();
        snapshot
    }

    /// Replace the draft wholesale (used when the step is completed).
    pub(crate) fn replace(&mut self, draft: ConsultationDraft) {
        self.draft = draft;
    }

    fn ensure_editable(&self) -> WorkflowResult<()> {
        if self.draft.is_completed() {
            return Err(WorkflowError::ConsultationCompleted(
                self.draft.consultation_id.clone(),
            ));
        }
        Ok(())
    }
}

/// Completed consultations of a patient, newest visit first.
pub fn get_patient_consultations(
    db: &Database,
    patient_id: &str,
) -> WorkflowResult<Vec<ConsultationDraft>> {
    Ok(db.list_completed_consultations(patient_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrescriptionLine, VisitMetadata};
    use chrono::NaiveDate;

    fn make_visit(patient_id: &str) -> Visit {
        Visit::new(
            patient_id.into(),
            "Jane".into(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            VisitMetadata::default(),
        )
    }

    fn completed_consultation(visit: &Visit) -> ConsultationDraft {
        let mut session = ConsultationSession::new(visit);
        session
            .update_consultation_data(ConsultationUpdate {
                chief_complaint: Some("Joint pain".into()),
                provisional_diagnosis: Some(vec!["Osteoarthritis".into()]),
                ..Default::default()
            })
            .unwrap();
        session
            .edit(|d| {
                d.prescriptions
                    .ayurvedic
                    .push(PrescriptionLine::new("AY-1", "Yogaraj Guggulu", "1-0-1", "1 month"));
            })
            .unwrap();
        session.completed_snapshot()
    }

    #[test]
    fn test_update_merges() {
        let visit = make_visit("P1");
        let mut session = ConsultationSession::new(&visit);
        session
            .update_consultation_data(ConsultationUpdate {
                chief_complaint: Some("Fever".into()),
                ..Default::default()
            })
            .unwrap();
        session
            .update_consultation_data(ConsultationUpdate {
                history_of_present_illness: Some("Three days".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(session.draft().chief_complaint, "Fever");
        assert_eq!(session.draft().history_of_present_illness, "Three days");
    }

    #[test]
    fn test_edit_cannot_change_identity() {
        let visit = make_visit("P1");
        let mut session = ConsultationSession::new(&visit);
        let id = session.consultation_id().to_string();

        session
            .edit(|d| {
                d.consultation_id = "hijacked".into();
                d.status = ConsultationStatus::Completed;
            })
            .unwrap();

        assert_eq!(session.consultation_id(), id);
        assert!(!session.is_completed());
    }

    #[test]
    fn test_load_consultation_replaces_draft() {
        let old_visit = make_visit("P1");
        let previous = completed_consultation(&old_visit);

        let visit = make_visit("P1");
        let mut session = ConsultationSession::new(&visit);
        session
            .update_consultation_data(ConsultationUpdate {
                chief_complaint: Some("Unsaved typing".into()),
                ..Default::default()
            })
            .unwrap();
        let old_draft_id = session.consultation_id().to_string();

        session.load_consultation(&previous).unwrap();

        let draft = session.draft();
        assert_ne!(draft.consultation_id, old_draft_id);
        assert_eq!(draft.visit_id, visit.visit_id);
        assert_eq!(draft.chief_complaint, "Follow-up: Joint pain");
        assert_eq!(draft.provisional_diagnosis(), previous.provisional_diagnosis());
        assert_eq!(draft.prescriptions.ayurvedic[0].quantity(), 60);
        assert_eq!(
            draft.previous_consultation_id.as_deref(),
            Some(previous.consultation_id.as_str())
        );
    }

    #[test]
    fn test_loaded_draft_does_not_alias_history() {
        let previous = completed_consultation(&make_visit("P1"));
        let before = previous.clone();

        let mut session = ConsultationSession::new(&make_visit("P1"));
        session.load_consultation(&previous).unwrap();
        session.add_provisional_diagnosis("Gout").unwrap();
        session
            .edit(|d| d.prescriptions.ayurvedic[0].set_dosage_code("1-1-1"))
            .unwrap();

        assert_eq!(previous, before);
    }

    #[test]
    fn test_load_rejects_other_patient() {
        let previous = completed_consultation(&make_visit("P2"));
        let mut session = ConsultationSession::new(&make_visit("P1"));
        assert!(matches!(
            session.load_consultation(&previous),
            Err(WorkflowError::PatientMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_draft_source() {
        let visit = make_visit("P1");
        let other = ConsultationSession::new(&visit);
        let mut session = ConsultationSession::new(&make_visit("P1"));
        let id = session.consultation_id().to_string();

        assert!(matches!(
            session.load_consultation(other.draft()),
            Err(WorkflowError::ConsultationNotCompleted(_))
        ));
        assert_eq!(session.consultation_id(), id);
    }

    #[test]
    fn test_completed_session_is_read_only() {
        let visit = make_visit("P1");
        let mut session = ConsultationSession::new(&visit);
        let done = session.completed_snapshot();
        session.replace(done);

        assert!(matches!(
            session.update_consultation_data(ConsultationUpdate::default()),
            Err(WorkflowError::ConsultationCompleted(_))
        ));
        assert!(session.add_provisional_diagnosis("x").is_err());
    }

    #[test]
    fn test_independent_sessions() {
        let mut a = ConsultationSession::new(&make_visit("P1"));
        let mut b = ConsultationSession::new(&make_visit("P2"));
        a.add_provisional_diagnosis("Asthma").unwrap();
        b.add_provisional_diagnosis("Anemia").unwrap();

        assert_eq!(a.draft().provisional_diagnosis(), &["Asthma".to_string()]);
        assert_eq!(b.draft().provisional_diagnosis(), &["Anemia".to_string()]);
    }
}
