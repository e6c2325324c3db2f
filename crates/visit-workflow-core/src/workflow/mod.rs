//! Visit workflow: step progression, consultation session and autosave.
//!
//! ```text
//! start_new_visit ─► registration ─► vitals ─► consultation ─► tests-treatment ─► completed
//!                                                  │
//!                                    ConsultationSession (draft)
//!                                                  │
//!                                 edit ─► Debouncer ─► autosave to store
//! ```
//!
//! The engine only does progression bookkeeping. Domain validation (vital
//! ranges, required fields) happens at the step-input layer before
//! [`VisitWorkflowEngine::complete_step`] is called.

mod clock;
mod debounce;
mod engine;
mod session;

pub use clock::*;
pub use debounce::*;
pub use engine::*;
pub use session::*;

use thiserror::Error;

use crate::db::DbError;
use crate::models::VisitStep;

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Patient ID must not be empty")]
    EmptyPatientId,

    #[error("No active visit")]
    NoActiveVisit,

    #[error("No active consultation")]
    NoActiveConsultation,

    #[error("Visit {0} is already completed")]
    VisitCompleted(String),

    #[error("Step '{actual}' completed out of order; current step is '{expected}'")]
    OutOfOrderStep {
        expected: VisitStep,
        actual: VisitStep,
    },

    #[error("Payload for '{payload}' cannot complete step '{step}'")]
    PayloadMismatch { step: VisitStep, payload: VisitStep },

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Consultation not found: {0}")]
    ConsultationNotFound(String),

    #[error("Consultation {0} is still a draft and cannot seed a follow-up")]
    ConsultationNotCompleted(String),

    #[error("Consultation {0} is completed and read-only")]
    ConsultationCompleted(String),

    #[error("Consultation belongs to patient {found}, expected {expected}")]
    PatientMismatch { expected: String, found: String },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
