//! Visit models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::consultation::ConsultationDraft;
use super::orders::TestsTreatment;
use super::vitals::VitalsReading;

/// Clinical steps of a visit, in their fixed order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum VisitStep {
    /// Front-desk check-in
    Registration,
    /// Nurse records vital signs
    Vitals,
    /// Doctor writes the consultation note
    Consultation,
    /// Lab/radiology orders and treatment
    TestsTreatment,
    /// Terminal
    Completed,
}

impl VisitStep {
    /// All steps in progression order.
    pub const ORDER: [VisitStep; 5] = [
        VisitStep::Registration,
        VisitStep::Vitals,
        VisitStep::Consultation,
        VisitStep::TestsTreatment,
        VisitStep::Completed,
    ];

    /// The step after this one. `Completed` has none.
    pub fn next(self) -> Option<VisitStep> {
        match self {
            VisitStep::Registration => Some(VisitStep::Vitals),
            VisitStep::Vitals => Some(VisitStep::Consultation),
            VisitStep::Consultation => Some(VisitStep::TestsTreatment),
            VisitStep::TestsTreatment => Some(VisitStep::Completed),
            VisitStep::Completed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == VisitStep::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisitStep::Registration => "registration",
            VisitStep::Vitals => "vitals",
            VisitStep::Consultation => "consultation",
            VisitStep::TestsTreatment => "tests-treatment",
            VisitStep::Completed => "completed",
        }
    }
}

impl fmt::Display for VisitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(VisitStep::Registration),
            "vitals" => Ok(VisitStep::Vitals),
            "consultation" => Ok(VisitStep::Consultation),
            "tests-treatment" => Ok(VisitStep::TestsTreatment),
            "completed" => Ok(VisitStep::Completed),
            _ => Err(format!("Unknown visit step: {}", s)),
        }
    }
}

/// Front-desk metadata supplied when a visit is started.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitMetadata {
    pub department: Option<String>,
    pub doctor: Option<String>,
    /// e.g. "new", "follow-up", "emergency"
    pub visit_type: Option<String>,
    /// Queue token issued at the desk
    pub token_number: Option<u32>,
}

/// Data captured at the registration step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationData {
    pub token_number: Option<u32>,
    pub referred_by: Option<String>,
    pub notes: Option<String>,
}

/// Payload handed to the engine when a step is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", content = "data", rename_all = "kebab-case")]
pub enum StepPayload {
    Registration(RegistrationData),
    Vitals(VitalsReading),
    Consultation(ConsultationDraft),
    TestsTreatment(TestsTreatment),
}

impl StepPayload {
    /// The step this payload belongs to.
    pub fn step(&self) -> VisitStep {
        match self {
            StepPayload::Registration(_) => VisitStep::Registration,
            StepPayload::Vitals(_) => VisitStep::Vitals,
            StepPayload::Consultation(_) => VisitStep::Consultation,
            StepPayload::TestsTreatment(_) => VisitStep::TestsTreatment,
        }
    }
}

/// Outputs of completed steps, keyed by step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StepData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vitals: Option<VitalsReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation: Option<ConsultationDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_treatment: Option<TestsTreatment>,
}

impl StepData {
    /// Store a payload under its step.
    pub fn record(&mut self, payload: StepPayload) {
        match payload {
            StepPayload::Registration(d) => self.registration = Some(d),
            StepPayload::Vitals(d) => self.vitals = Some(d),
            StepPayload::Consultation(d) => self.consultation = Some(d),
            StepPayload::TestsTreatment(d) => self.tests_treatment = Some(d),
        }
    }

    /// Check whether a step has captured data.
    pub fn has(&self, step: VisitStep) -> bool {
        match step {
            VisitStep::Registration => self.registration.is_some(),
            VisitStep::Vitals => self.vitals.is_some(),
            VisitStep::Consultation => self.consultation.is_some(),
            VisitStep::TestsTreatment => self.tests_treatment.is_some(),
            VisitStep::Completed => false,
        }
    }
}

/// One patient encounter tracked through the clinical steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    /// Unique visit ID
    pub visit_id: String,
    /// Patient ID (patient records live elsewhere)
    pub patient_id: String,
    /// Patient display name
    pub patient_name: String,
    pub visit_date: NaiveDate,
    pub metadata: VisitMetadata,
    /// Active step
    pub current_step: VisitStep,
    /// Outputs of completed steps
    pub step_data: StepData,
    /// Creation timestamp, never changes
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Visit {
    /// Create a visit at the registration step.
    pub fn new(
        patient_id: String,
        patient_name: String,
        visit_date: NaiveDate,
        metadata: VisitMetadata,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            visit_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            patient_name,
            visit_date,
            metadata,
            current_step: VisitStep::Registration,
            step_data: StepData::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.current_step.is_terminal()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
