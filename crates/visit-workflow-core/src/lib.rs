//! Visit Workflow Core Library
//!
//! Clinical-visit workflow for a hospital front desk: step progression,
//! consultation drafting with debounced autosave, and derived-field
//! calculators.
//!
//! # Architecture
//!
//! ```text
//!   Front desk ──► start_new_visit
//!                        │
//!                        ▼
//!   registration ─► vitals ─► consultation ─► tests-treatment ─► completed
//!                     │            │
//!           validate_vitals   ConsultationSession
//!           (error / warning)      │
//!                                  ▼
//!                      Debouncer ─► SQLite (drafts)
//!                                  │
//!                   completed consultations ─► history / follow-up seed
//! ```
//!
//! # Core Principle
//!
//! **The engine only tracks progression.** Domain validation (vital ranges,
//! required fields) happens at the step-input layer before a step is
//! completed. Hard errors block; warnings are shown but never block.
//!
//! # Modules
//!
//! - [`calc`]: BMI, vital-sign range checks, prescription quantities
//! - [`models`]: Domain types (Visit, ConsultationDraft, VitalsReading, etc.)
//! - [`workflow`]: Step engine, consultation session, debounce
//! - [`db`]: SQLite persistence for visits and consultations
//! - [`config`]: Runtime configuration

pub mod calc;
pub mod config;
pub mod db;
pub mod models;
pub mod workflow;

// Re-export commonly used types
pub use config::{ConfigError, WorkflowConfig};
pub use db::{Database, DbError};
pub use models::{
    ConsultationDraft, ConsultationStatus, ConsultationUpdate, PrescriptionLine, Prescriptions,
    RawPrescription, StepPayload, Visit, VisitMetadata, VisitStep, VitalsReading,
};
pub use workflow::{
    ConsultationSession, Debouncer, ManualClock, SystemClock, VisitWorkflowEngine, WorkflowError,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use models::{RegistrationData, TestsTreatment};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Workflow error: {0}")]
    WorkflowViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<DbError> for ClinicError {
    fn from(e: DbError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::SerializationError(e.to_string())
    }
}

impl From<ConfigError> for ClinicError {
    fn from(e: ConfigError) -> Self {
        ClinicError::ConfigurationError(e.to_string())
    }
}

impl From<WorkflowError> for ClinicError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Database(db) => db.into(),
            WorkflowError::EmptyPatientId | WorkflowError::PatientMismatch { .. } => {
                ClinicError::InvalidInput(e.to_string())
            }
            WorkflowError::VisitNotFound(_) | WorkflowError::ConsultationNotFound(_) => {
                ClinicError::NotFound(e.to_string())
            }
            other => ClinicError::WorkflowViolation(other.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a workflow core from a JSON configuration.
#[uniffi::export]
pub fn open_workflow(config_json: String) -> Result<Arc<VisitWorkflowCore>, ClinicError> {
    let config = WorkflowConfig::from_json_str(&config_json)?;
    let db = config.open_database()?;
    Ok(Arc::new(VisitWorkflowCore {
        engine: Mutex::new(VisitWorkflowEngine::new(db, config)),
    }))
}

/// Open a workflow core backed by an in-memory database (for testing).
#[uniffi::export]
pub fn open_workflow_in_memory() -> Result<Arc<VisitWorkflowCore>, ClinicError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(VisitWorkflowCore {
        engine: Mutex::new(VisitWorkflowEngine::new(db, WorkflowConfig::default())),
    }))
}

/// BMI from height (cm) and weight (kg), one decimal.
#[uniffi::export]
pub fn calculate_bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> Option<f64> {
    calc::compute_bmi(height_cm, weight_kg)
}

/// Range-check one vital-sign form value.
#[uniffi::export]
pub fn check_vital(field: String, value: String) -> FfiVitalCheck {
    calc::validate_vital(&field, &value).into()
}

/// Dispensed quantity for a dosage and duration code.
#[uniffi::export]
pub fn calculate_quantity(dosage_code: String, duration_code: String) -> u32 {
    calc::compute_quantity(&dosage_code, &duration_code)
}

/// Normalize upstream prescription JSON (array of loosely-shaped objects)
/// into canonical prescription lines, returned as JSON.
#[uniffi::export]
pub fn normalize_prescriptions_json(raw_json: String) -> Result<String, ClinicError> {
    let raw: Vec<RawPrescription> = serde_json::from_str(&raw_json)?;
    Ok(serde_json::to_string(&models::normalize_prescriptions(&raw))?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine wrapper for FFI.
#[derive(uniffi::Object)]
pub struct VisitWorkflowCore {
    engine: Mutex<VisitWorkflowEngine>,
}

#[uniffi::export]
impl VisitWorkflowCore {
    // =========================================================================
    // Visit Operations
    // =========================================================================

    /// Start a visit. `visit_date` is `YYYY-MM-DD`; `metadata_json` may be empty.
    pub fn start_new_visit(
        &self,
        patient_id: String,
        patient_name: String,
        visit_date: String,
        metadata_json: String,
    ) -> Result<FfiVisit, ClinicError> {
        let date = parse_visit_date(&visit_date)?;
        let metadata = parse_metadata(&metadata_json)?;
        let mut engine = self.engine.lock()?;
        let visit = engine.start_new_visit(&patient_id, &patient_name, date, metadata)?;
        FfiVisit::try_from(visit)
    }

    /// Start a follow-up visit seeded from an earlier consultation.
    pub fn start_follow_up_visit(
        &self,
        previous_consultation_id: String,
        visit_date: String,
        metadata_json: String,
    ) -> Result<FfiVisit, ClinicError> {
        let date = parse_visit_date(&visit_date)?;
        let metadata = parse_metadata(&metadata_json)?;
        let mut engine = self.engine.lock()?;
        let visit = engine.start_follow_up_visit(&previous_consultation_id, date, metadata)?;
        FfiVisit::try_from(visit)
    }

    /// Complete the active step. An empty consultation payload completes the
    /// step with the session draft. Returns the new step.
    pub fn complete_step(&self, step: String, payload_json: String) -> Result<String, ClinicError> {
        let step: VisitStep = step.parse().map_err(ClinicError::InvalidInput)?;
        let mut engine = self.engine.lock()?;

        let next = if step == VisitStep::Consultation && payload_json.trim().is_empty() {
            engine.complete_consultation_step()?
        } else {
            let payload = parse_payload(step, &payload_json)?;
            engine.complete_step(step, payload)?
        };
        Ok(next.to_string())
    }

    /// The active visit, if any.
    pub fn get_active_visit(&self) -> Result<Option<FfiVisit>, ClinicError> {
        let engine = self.engine.lock()?;
        engine.active_visit().map(FfiVisit::try_from).transpose()
    }

    /// Unfinished visits, oldest first.
    pub fn get_open_visits(&self) -> Result<Vec<FfiVisit>, ClinicError> {
        let engine = self.engine.lock()?;
        engine.open_visits()?.iter().map(FfiVisit::try_from).collect()
    }

    /// Make an unfinished visit active again.
    pub fn resume_visit(&self, visit_id: String) -> Result<FfiVisit, ClinicError> {
        let mut engine = self.engine.lock()?;
        let visit = engine.resume_visit(&visit_id)?;
        FfiVisit::try_from(visit)
    }

    // =========================================================================
    // Consultation Operations
    // =========================================================================

    /// Merge partial consultation JSON into the draft.
    pub fn update_consultation_data(&self, partial_json: String) -> Result<(), ClinicError> {
        let partial: ConsultationUpdate = serde_json::from_str(&partial_json)?;
        let mut engine = self.engine.lock()?;
        engine.edit_consultation(partial)?;
        Ok(())
    }

    /// Reseed the draft from a stored consultation.
    pub fn load_consultation(&self, previous_consultation_id: String) -> Result<(), ClinicError> {
        let mut engine = self.engine.lock()?;
        engine.load_consultation_by_id(&previous_consultation_id)?;
        Ok(())
    }

    /// The active draft as JSON.
    pub fn get_consultation_json(&self) -> Result<Option<String>, ClinicError> {
        let engine = self.engine.lock()?;
        engine
            .consultation()
            .map(|s| serde_json::to_string(s.draft()))
            .transpose()
            .map_err(Into::into)
    }

    /// Completed consultations of a patient (newest first) as a JSON array.
    pub fn get_patient_consultations_json(&self, patient_id: String) -> Result<String, ClinicError> {
        let engine = self.engine.lock()?;
        let consultations = engine.patient_consultations(&patient_id)?;
        Ok(serde_json::to_string(&consultations)?)
    }

    // =========================================================================
    // Autosave Operations
    // =========================================================================

    /// Drive the autosave debouncer; call periodically. Returns whether the
    /// draft was written.
    pub fn tick(&self) -> Result<bool, ClinicError> {
        let mut engine = self.engine.lock()?;
        Ok(engine.tick()?)
    }

    /// Flush pending edits when the consultation screen closes.
    pub fn close_consultation(&self) -> Result<(), ClinicError> {
        let mut engine = self.engine.lock()?;
        engine.close_consultation()?;
        Ok(())
    }
}

fn parse_visit_date(value: &str) -> Result<chrono::NaiveDate, ClinicError> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| ClinicError::InvalidInput(format!("Invalid visit date {}: {}", value, e)))
}

fn parse_metadata(json: &str) -> Result<VisitMetadata, ClinicError> {
    if json.trim().is_empty() {
        return Ok(VisitMetadata::default());
    }
    Ok(serde_json::from_str(json)?)
}

fn parse_payload(step: VisitStep, json: &str) -> Result<StepPayload, ClinicError> {
    let json = if json.trim().is_empty() { "{}" } else { json };
    let payload = match step {
        VisitStep::Registration => {
            StepPayload::Registration(serde_json::from_str::<RegistrationData>(json)?)
        }
        VisitStep::Vitals => StepPayload::Vitals(serde_json::from_str::<VitalsReading>(json)?),
        VisitStep::Consultation => {
            StepPayload::Consultation(serde_json::from_str::<ConsultationDraft>(json)?)
        }
        VisitStep::TestsTreatment => {
            StepPayload::TestsTreatment(serde_json::from_str::<TestsTreatment>(json)?)
        }
        VisitStep::Completed => {
            return Err(ClinicError::InvalidInput(
                "The completed step takes no payload".into(),
            ))
        }
    };
    Ok(payload)
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub visit_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub visit_date: String,
    pub current_step: String,
    pub step_data_json: String,
    pub created_at: String,
}

impl TryFrom<&Visit> for FfiVisit {
    type Error = ClinicError;

    fn try_from(visit: &Visit) -> Result<Self, Self::Error> {
        Ok(Self {
            visit_id: visit.visit_id.clone(),
            patient_id: visit.patient_id.clone(),
            patient_name: visit.patient_name.clone(),
            visit_date: visit.visit_date.to_string(),
            current_step: visit.current_step.to_string(),
            step_data_json: serde_json::to_string(&visit.step_data)?,
            created_at: visit.created_at.clone(),
        })
    }
}

/// FFI-safe vital check result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVitalCheck {
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl From<calc::VitalCheck> for FfiVitalCheck {
    fn from(check: calc::VitalCheck) -> Self {
        Self {
            error: check.error,
            warning: check.warning,
        }
    }
}
