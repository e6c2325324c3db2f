//! Visit step progression.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::{
    get_patient_consultations, Clock, ConsultationSession, Debouncer, SystemClock, WorkflowError,
    WorkflowResult,
};
use crate::config::WorkflowConfig;
use crate::db::Database;
use crate::models::{
    ConsultationDraft, ConsultationStatus, ConsultationUpdate, StepPayload, Visit, VisitMetadata,
    VisitStep,
};

/// Drives one active visit through its clinical steps.
///
/// Owns the active [`Visit`], its [`ConsultationSession`] and the autosave
/// debouncer. Starting another visit replaces all three.
pub struct VisitWorkflowEngine<C: Clock = SystemClock> {
    db: Database,
    config: WorkflowConfig,
    clock: C,
    active: Option<Visit>,
    session: Option<ConsultationSession>,
    autosave: Debouncer,
}

impl VisitWorkflowEngine<SystemClock> {
    /// Create an engine using wall-clock time.
    pub fn new(db: Database, config: WorkflowConfig) -> Self {
        Self::with_clock(db, config, SystemClock)
    }
}

impl<C: Clock> VisitWorkflowEngine<C> {
    /// Create an engine with an explicit time source.
    pub fn with_clock(db: Database, config: WorkflowConfig, clock: C) -> Self {
        let autosave = Debouncer::new(config.autosave_delay());
        Self {
            db,
            config,
            clock,
            active: None,
            session: None,
            autosave,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // =========================================================================
    // Visit lifecycle
    // =========================================================================

    /// Start a visit and make it the active one.
    ///
    /// Any pending autosave of the previous consultation is flushed first.
    pub fn start_new_visit(
        &mut self,
        patient_id: &str,
        patient_name: &str,
        visit_date: NaiveDate,
        metadata: VisitMetadata,
    ) -> WorkflowResult<&Visit> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(WorkflowError::EmptyPatientId);
        }

        self.flush_autosave()?;

        let mut visit = Visit::new(
            patient_id.to_string(),
            patient_name.trim().to_string(),
            visit_date,
            metadata,
        );
        if self.config.registration_pre_done {
            visit.current_step = VisitStep::Vitals;
        }
        self.db.upsert_visit(&visit)?;

        info!(
            visit_id = %visit.visit_id,
            patient_id = %visit.patient_id,
            step = %visit.current_step,
            "Started visit"
        );

        self.session = Some(ConsultationSession::new(&visit));
        self.autosave.cancel();
        Ok(&*self.active.insert(visit))
    }

    /// Start a new visit for the patient of an earlier, completed
    /// consultation and seed its draft from it.
    ///
    /// The earlier visit and consultation are left untouched.
    pub fn start_follow_up_visit(
        &mut self,
        previous_consultation_id: &str,
        visit_date: NaiveDate,
        metadata: VisitMetadata,
    ) -> WorkflowResult<&Visit> {
        let previous = self
            .db
            .get_consultation(previous_consultation_id)?
            .ok_or_else(|| WorkflowError::ConsultationNotFound(previous_consultation_id.into()))?;
        if !previous.is_completed() {
            return Err(WorkflowError::ConsultationNotCompleted(previous.consultation_id));
        }
        let patient_name = self
            .db
            .get_visit(&previous.visit_id)?
            .map(|v| v.patient_name)
            .unwrap_or_default();

        self.start_new_visit(&previous.patient_id, &patient_name, visit_date, metadata)?;
        self.load_consultation(&previous)?;
        self.active_visit().ok_or(WorkflowError::NoActiveVisit)
    }

    /// Make a persisted, unfinished visit active again, with its last saved
    /// consultation draft.
    pub fn resume_visit(&mut self, visit_id: &str) -> WorkflowResult<&Visit> {
        let visit = self
            .db
            .get_visit(visit_id)?
            .ok_or_else(|| WorkflowError::VisitNotFound(visit_id.into()))?;

        self.flush_autosave()?;

        let session = match self.db.get_consultation_for_visit(visit_id)? {
            Some(draft) => ConsultationSession::resume(draft),
            None => ConsultationSession::new(&visit),
        };
        info!(visit_id = %visit.visit_id, step = %visit.current_step, "Resumed visit");

        self.session = Some(session);
        self.autosave.cancel();
        Ok(&*self.active.insert(visit))
    }

    pub fn active_visit(&self) -> Option<&Visit> {
        self.active.as_ref()
    }

    pub fn current_step(&self) -> Option<VisitStep> {
        self.active.as_ref().map(|v| v.current_step)
    }

    /// Record the output of the active step and advance to the next one.
    ///
    /// `step` must be the current step and `payload` must belong to it.
    /// Payloads are trusted; domain validation happens before this call.
    /// Returns the new current step.
    pub fn complete_step(&mut self, step: VisitStep, payload: StepPayload) -> WorkflowResult<VisitStep> {
        let visit = self.active.as_mut().ok_or(WorkflowError::NoActiveVisit)?;

        if visit.is_completed() {
            warn!(visit_id = %visit.visit_id, step = %step, "Step completion on a completed visit");
            return Err(WorkflowError::VisitCompleted(visit.visit_id.clone()));
        }
        if step != visit.current_step {
            warn!(
                visit_id = %visit.visit_id,
                expected = %visit.current_step,
                actual = %step,
                "Rejected out-of-order step completion"
            );
            return Err(WorkflowError::OutOfOrderStep {
                expected: visit.current_step,
                actual: step,
            });
        }
        if payload.step() != step {
            return Err(WorkflowError::PayloadMismatch {
                step,
                payload: payload.step(),
            });
        }

        let payload = match payload {
            StepPayload::Consultation(mut draft) => {
                draft.status = ConsultationStatus::Completed;
                self.db.save_consultation(&draft)?;
                if let Some(session) = self.session.as_mut() {
                    session.replace(draft.clone());
                }
                self.autosave.cancel();
                StepPayload::Consultation(draft)
            }
            StepPayload::Vitals(vitals) => {
                if let Some(session) = self.session.as_mut() {
                    if !session.is_completed() {
                        session.edit(|d| d.vitals = vitals.clone())?;
                        self.autosave.touch(self.clock.now());
                    }
                }
                StepPayload::Vitals(vitals)
            }
            other => other,
        };

        let next = step.next().unwrap_or(VisitStep::Completed);
        visit.step_data.record(payload);
        visit.current_step = next;
        visit.touch();
        self.db.upsert_visit(visit)?;

        info!(visit_id = %visit.visit_id, completed = %step, next = %next, "Completed step");

        if next.is_terminal() {
            self.flush_autosave()?;
        }
        Ok(next)
    }

    /// Complete the consultation step with the session's current draft.
    pub fn complete_consultation_step(&mut self) -> WorkflowResult<VisitStep> {
        let session = self.session.as_ref().ok_or(WorkflowError::NoActiveConsultation)?;
        let payload = StepPayload::Consultation(session.completed_snapshot());
        self.complete_step(VisitStep::Consultation, payload)
    }

    /// All persisted visits of a patient, newest first.
    pub fn patient_visits(&self, patient_id: &str) -> WorkflowResult<Vec<Visit>> {
        Ok(self.db.list_visits_for_patient(patient_id)?)
    }

    /// Persisted visits that have not reached the completed step, oldest
    /// first. Any of them can be picked up again with [`Self::resume_visit`].
    pub fn open_visits(&self) -> WorkflowResult<Vec<Visit>> {
        Ok(self.db.list_open_visits()?)
    }

    // =========================================================================
    // Consultation
    // =========================================================================

    pub fn consultation(&self) -> Option<&ConsultationSession> {
        self.session.as_ref()
    }

    /// Merge form data into the active draft and restart the autosave window.
    pub fn edit_consultation(&mut self, partial: ConsultationUpdate) -> WorkflowResult<()> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoActiveConsultation)?;
        session.update_consultation_data(partial)?;
        self.autosave.touch(self.clock.now());
        Ok(())
    }

    /// Apply an arbitrary edit to the active draft and restart the autosave
    /// window.
    pub fn edit_consultation_with<F>(&mut self, f: F) -> WorkflowResult<()>
    where
        F: FnOnce(&mut ConsultationDraft),
    {
        let session = self.session.as_mut().ok_or(WorkflowError::NoActiveConsultation)?;
        session.edit(f)?;
        self.autosave.touch(self.clock.now());
        Ok(())
    }

    /// Reseed the active draft from an earlier, completed consultation.
    ///
    /// The replaced draft gets a new ID, so any autosaved row of it is
    /// deleted; a visit keeps at most one stored draft.
    pub fn load_consultation(&mut self, previous: &ConsultationDraft) -> WorkflowResult<()> {
        let session = self.session.as_mut().ok_or(WorkflowError::NoActiveConsultation)?;
        let replaced = session.consultation_id().to_string();
        session.load_consultation(previous)?;

        let discarded = self.db.discard_drafts_for_visit(&session.draft().visit_id)?;
        debug!(
            replaced_consultation_id = %replaced,
            discarded,
            "Discarded replaced consultation draft"
        );
        self.autosave.touch(self.clock.now());
        Ok(())
    }

    /// Reseed the active draft from a stored consultation.
    pub fn load_consultation_by_id(&mut self, consultation_id: &str) -> WorkflowResult<()> {
        let previous = self
            .db
            .get_consultation(consultation_id)?
            .ok_or_else(|| WorkflowError::ConsultationNotFound(consultation_id.into()))?;
        self.load_consultation(&previous)
    }

    /// Completed consultations of a patient, newest visit first.
    pub fn patient_consultations(&self, patient_id: &str) -> WorkflowResult<Vec<ConsultationDraft>> {
        get_patient_consultations(&self.db, patient_id)
    }

    // =========================================================================
    // Autosave
    // =========================================================================

    /// Whether an edit is waiting to be written.
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Write the draft if the quiet period has elapsed. Returns whether a
    /// write happened.
    pub fn tick(&mut self) -> WorkflowResult<bool> {
        if !self.autosave.take_due(self.clock.now()) {
            return Ok(false);
        }
        self.write_draft()
    }

    /// Write any pending edit now.
    pub fn flush_autosave(&mut self) -> WorkflowResult<bool> {
        if !self.autosave.take_pending() {
            return Ok(false);
        }
        self.write_draft()
    }

    /// Leave the consultation screen: pending edits are flushed, never
    /// dropped.
    pub fn close_consultation(&mut self) -> WorkflowResult<()> {
        self.flush_autosave()?;
        Ok(())
    }

    fn write_draft(&mut self) -> WorkflowResult<bool> {
        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };
        if session.is_completed() {
            return Ok(false);
        }

        let written = self.db.save_consultation(session.draft())?;
        debug!(
            consultation_id = %session.consultation_id(),
            written,
            "Autosaved consultation draft"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::VitalField;
    use crate::models::{RegistrationData, TestsTreatment, VitalsReading};
    use crate::workflow::ManualClock;

    fn engine() -> VisitWorkflowEngine<ManualClock> {
        VisitWorkflowEngine::with_clock(
            Database::open_in_memory().unwrap(),
            WorkflowConfig::default(),
            ManualClock::default(),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn registration() -> StepPayload {
        StepPayload::Registration(RegistrationData::default())
    }

    #[test]
    fn test_start_new_visit() {
        let mut engine = engine();
        let visit = engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        assert_eq!(visit.current_step, VisitStep::Registration);
        let visit_id = visit.visit_id.clone();

        assert!(engine.consultation().is_some());
        assert!(engine.database().get_visit(&visit_id).unwrap().is_some());
    }

    #[test]
    fn test_empty_patient_id_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.start_new_visit("  ", "Jane", date(), VisitMetadata::default()),
            Err(WorkflowError::EmptyPatientId)
        ));
        assert!(engine.active_visit().is_none());
    }

    #[test]
    fn test_registration_pre_done() {
        let config = WorkflowConfig {
            registration_pre_done: true,
            ..Default::default()
        };
        let mut engine = VisitWorkflowEngine::with_clock(
            Database::open_in_memory().unwrap(),
            config,
            ManualClock::default(),
        );
        let visit = engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        assert_eq!(visit.current_step, VisitStep::Vitals);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        engine.complete_step(VisitStep::Registration, registration()).unwrap();

        let draft = engine.consultation().unwrap().draft().clone();
        let err = engine
            .complete_step(VisitStep::Consultation, StepPayload::Consultation(draft))
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::OutOfOrderStep {
                expected: VisitStep::Vitals,
                actual: VisitStep::Consultation
            }
        ));
        assert_eq!(engine.current_step(), Some(VisitStep::Vitals));
    }

    #[test]
    fn test_payload_mismatch_rejected() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        let err = engine
            .complete_step(VisitStep::Registration, StepPayload::Vitals(VitalsReading::new()))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::PayloadMismatch { .. }));
        assert_eq!(engine.current_step(), Some(VisitStep::Registration));
    }

    #[test]
    fn test_no_active_visit() {
        let mut engine = engine();
        assert!(matches!(
            engine.complete_step(VisitStep::Registration, registration()),
            Err(WorkflowError::NoActiveVisit)
        ));
        assert!(matches!(
            engine.edit_consultation(ConsultationUpdate::default()),
            Err(WorkflowError::NoActiveConsultation)
        ));
    }

    #[test]
    fn test_full_progression_and_terminal() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();

        assert_eq!(
            engine.complete_step(VisitStep::Registration, registration()).unwrap(),
            VisitStep::Vitals
        );
        let vitals = VitalsReading::new().with(VitalField::Pulse, "72");
        assert_eq!(
            engine.complete_step(VisitStep::Vitals, StepPayload::Vitals(vitals)).unwrap(),
            VisitStep::Consultation
        );
        assert_eq!(engine.complete_consultation_step().unwrap(), VisitStep::TestsTreatment);
        assert_eq!(
            engine
                .complete_step(
                    VisitStep::TestsTreatment,
                    StepPayload::TestsTreatment(TestsTreatment::default())
                )
                .unwrap(),
            VisitStep::Completed
        );

        let visit = engine.active_visit().unwrap();
        assert!(visit.is_completed());
        assert!(visit.step_data.has(VisitStep::Consultation));
        assert!(matches!(
            engine.complete_step(VisitStep::Completed, registration()),
            Err(WorkflowError::VisitCompleted(_))
        ));
    }

    #[test]
    fn test_vitals_flow_into_draft() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        engine.complete_step(VisitStep::Registration, registration()).unwrap();

        let vitals = VitalsReading::new()
            .with(VitalField::Height, "170")
            .with(VitalField::Weight, "70");
        engine.complete_step(VisitStep::Vitals, StepPayload::Vitals(vitals)).unwrap();

        assert_eq!(engine.consultation().unwrap().draft().vitals.bmi(), Some(24.2));
    }

    #[test]
    fn test_autosave_debounced() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        let id = engine.consultation().unwrap().consultation_id().to_string();

        for text in ["F", "Fe", "Fever"] {
            engine
                .edit_consultation(ConsultationUpdate {
                    chief_complaint: Some(text.into()),
                    ..Default::default()
                })
                .unwrap();
            engine.clock().advance(chrono::Duration::milliseconds(500));
            assert!(!engine.tick().unwrap());
        }
        assert!(engine.database().get_consultation(&id).unwrap().is_none());

        engine.clock().advance(chrono::Duration::milliseconds(1000));
        assert!(engine.tick().unwrap());
        assert!(!engine.tick().unwrap());

        let saved = engine.database().get_consultation(&id).unwrap().unwrap();
        assert_eq!(saved.chief_complaint, "Fever");
    }

    #[test]
    fn test_close_flushes_pending_edit() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        let id = engine.consultation().unwrap().consultation_id().to_string();

        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Cough".into()),
                ..Default::default()
            })
            .unwrap();
        engine.close_consultation().unwrap();

        assert!(!engine.autosave_pending());
        let saved = engine.database().get_consultation(&id).unwrap().unwrap();
        assert_eq!(saved.chief_complaint, "Cough");
    }

    #[test]
    fn test_new_visit_flushes_previous_session() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        let id = engine.consultation().unwrap().consultation_id().to_string();
        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Rash".into()),
                ..Default::default()
            })
            .unwrap();

        engine
            .start_new_visit("P2", "John", date(), VisitMetadata::default())
            .unwrap();

        assert_ne!(engine.consultation().unwrap().consultation_id(), id);
        let saved = engine.database().get_consultation(&id).unwrap().unwrap();
        assert_eq!(saved.chief_complaint, "Rash");
    }

    fn draft_rows(engine: &VisitWorkflowEngine<ManualClock>, visit_id: &str) -> i64 {
        engine
            .database()
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM consultations WHERE visit_id = ? AND status = 'draft'",
                [visit_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn completed_consultation_id(engine: &mut VisitWorkflowEngine<ManualClock>) -> String {
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        engine.complete_step(VisitStep::Registration, registration()).unwrap();
        engine
            .complete_step(VisitStep::Vitals, StepPayload::Vitals(VitalsReading::new()))
            .unwrap();
        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Wheeze".into()),
                ..Default::default()
            })
            .unwrap();
        engine.complete_consultation_step().unwrap();
        engine.consultation().unwrap().consultation_id().to_string()
    }

    #[test]
    fn test_completed_step_stores_completed_record() {
        let mut engine = engine();
        let id = completed_consultation_id(&mut engine);
        let stored = engine.database().get_consultation(&id).unwrap().unwrap();
        assert!(stored.is_completed());
        assert!(engine.consultation().unwrap().is_completed());
    }

    #[test]
    fn test_template_load_keeps_one_draft_row() {
        let mut engine = engine();
        let previous_id = completed_consultation_id(&mut engine);

        let visit_id = engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap()
            .visit_id
            .clone();
        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Typed before loading".into()),
                ..Default::default()
            })
            .unwrap();
        engine.clock().advance(chrono::Duration::milliseconds(1500));
        assert!(engine.tick().unwrap());
        assert_eq!(draft_rows(&engine, &visit_id), 1);

        engine.load_consultation_by_id(&previous_id).unwrap();
        engine.close_consultation().unwrap();

        assert_eq!(draft_rows(&engine, &visit_id), 1);
        let stored = engine
            .database()
            .get_consultation_for_visit(&visit_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.chief_complaint, "Follow-up: Wheeze");
    }

    #[test]
    fn test_draft_cannot_seed_follow_up() {
        let mut engine = engine();
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        let draft_id = engine.consultation().unwrap().consultation_id().to_string();
        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Unfinished".into()),
                ..Default::default()
            })
            .unwrap();
        engine.flush_autosave().unwrap();

        assert!(matches!(
            engine.start_follow_up_visit(&draft_id, date(), VisitMetadata::default()),
            Err(WorkflowError::ConsultationNotCompleted(_))
        ));
        assert_eq!(engine.patient_visits("P1").unwrap().len(), 1);
        engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap();
        assert!(matches!(
            engine.load_consultation_by_id(&draft_id),
            Err(WorkflowError::ConsultationNotCompleted(_))
        ));
    }

    #[test]
    fn test_open_visits() {
        let mut engine = engine();
        completed_consultation_id(&mut engine);
        engine
            .complete_step(
                VisitStep::TestsTreatment,
                StepPayload::TestsTreatment(TestsTreatment::default()),
            )
            .unwrap();
        let open_id = engine
            .start_new_visit("P2", "John", date(), VisitMetadata::default())
            .unwrap()
            .visit_id
            .clone();

        let open: Vec<String> = engine
            .open_visits()
            .unwrap()
            .into_iter()
            .map(|v| v.visit_id)
            .collect();
        assert_eq!(open, vec![open_id]);
    }

    #[test]
    fn test_resume_visit_restores_draft() {
        let mut engine = engine();
        let visit_id = engine
            .start_new_visit("P1", "Jane", date(), VisitMetadata::default())
            .unwrap()
            .visit_id
            .clone();
        engine
            .edit_consultation(ConsultationUpdate {
                chief_complaint: Some("Back pain".into()),
                ..Default::default()
            })
            .unwrap();
        engine
            .start_new_visit("P2", "John", date(), VisitMetadata::default())
            .unwrap();

        engine.resume_visit(&visit_id).unwrap();
        assert_eq!(engine.active_visit().unwrap().visit_id, visit_id);
        assert_eq!(engine.consultation().unwrap().draft().chief_complaint, "Back pain");
        assert!(matches!(
            engine.resume_visit("missing"),
            Err(WorkflowError::VisitNotFound(_))
        ));
    }
}
