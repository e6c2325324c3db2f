//! Consultation draft models.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::prescription::Prescriptions;
use super::visit::Visit;
use super::vitals::VitalsReading;

/// Prefix put on the chief complaint of a draft seeded from an earlier one.
pub const FOLLOW_UP_PREFIX: &str = "Follow-up: ";

/// Consultation lifecycle status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    /// Being edited; autosaved
    #[default]
    Draft,
    /// Consultation step completed; historical and read-only
    Completed,
}

/// The clinical note composed during a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "DraftRecord")]
pub struct ConsultationDraft {
    /// Unique consultation ID
    pub consultation_id: String,
    /// Owning visit
    pub visit_id: String,
    /// Patient ID (patient records live elsewhere)
    pub patient_id: String,
    /// Date of the owning visit
    pub visit_date: NaiveDate,
    pub chief_complaint: String,
    pub history_of_present_illness: String,
    pub past_medical_history: BTreeSet<String>,
    pub allergies: BTreeSet<String>,
    pub current_medications: BTreeSet<String>,
    /// Ordered, no duplicates
    provisional_diagnosis: Vec<String>,
    /// Ordered, no duplicates
    differential_diagnosis: Vec<String>,
    pub vitals: VitalsReading,
    pub prescriptions: Prescriptions,
    /// General advice for the patient (diet, rest)
    pub advice: Option<String>,
    /// Suggested follow-up date
    pub follow_up_date: Option<NaiveDate>,
    /// Consultation this draft was seeded from
    pub previous_consultation_id: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Wire shape of a draft. Diagnosis lists are deduplicated on the way in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftRecord {
    consultation_id: String,
    visit_id: String,
    patient_id: String,
    visit_date: NaiveDate,
    #[serde(default)]
    chief_complaint: String,
    #[serde(default)]
    history_of_present_illness: String,
    #[serde(default)]
    past_medical_history: BTreeSet<String>,
    #[serde(default)]
    allergies: BTreeSet<String>,
    #[serde(default)]
    current_medications: BTreeSet<String>,
    #[serde(default)]
    provisional_diagnosis: Vec<String>,
    #[serde(default)]
    differential_diagnosis: Vec<String>,
    #[serde(default)]
    vitals: VitalsReading,
    #[serde(default)]
    prescriptions: Prescriptions,
    #[serde(default)]
    advice: Option<String>,
    #[serde(default)]
    follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    previous_consultation_id: Option<String>,
    #[serde(default)]
    status: ConsultationStatus,
    created_at: String,
    updated_at: String,
}

impl From<DraftRecord> for ConsultationDraft {
    fn from(record: DraftRecord) -> Self {
        Self {
            consultation_id: record.consultation_id,
            visit_id: record.visit_id,
            patient_id: record.patient_id,
            visit_date: record.visit_date,
            chief_complaint: record.chief_complaint,
            history_of_present_illness: record.history_of_present_illness,
            past_medical_history: record.past_medical_history,
            allergies: record.allergies,
            current_medications: record.current_medications,
            provisional_diagnosis: dedup_in_order(record.provisional_diagnosis),
            differential_diagnosis: dedup_in_order(record.differential_diagnosis),
            vitals: record.vitals,
            prescriptions: record.prescriptions,
            advice: record.advice,
            follow_up_date: record.follow_up_date,
            previous_consultation_id: record.previous_consultation_id,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl ConsultationDraft {
    /// Create an empty draft for a visit.
    pub fn for_visit(visit: &Visit) -> Self {
        Self::new(
            visit.visit_id.clone(),
            visit.patient_id.clone(),
            visit.visit_date,
            visit.step_data.vitals.clone().unwrap_or_default(),
        )
    }

    fn new(visit_id: String, patient_id: String, visit_date: NaiveDate, vitals: VitalsReading) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            consultation_id: uuid::Uuid::new_v4().to_string(),
            visit_id,
            patient_id,
            visit_date,
            chief_complaint: String::new(),
            history_of_present_illness: String::new(),
            past_medical_history: BTreeSet::new(),
            allergies: BTreeSet::new(),
            current_medications: BTreeSet::new(),
            provisional_diagnosis: Vec::new(),
            differential_diagnosis: Vec::new(),
            vitals,
            prescriptions: Prescriptions::default(),
            advice: None,
            follow_up_date: None,
            previous_consultation_id: None,
            status: ConsultationStatus::Draft,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// A fresh draft for the same visit as `self`, seeded from `previous`.
    ///
    /// Keeps this draft's visit identity and vitals (when any were taken);
    /// everything else comes from `previous`. Every field is copied by value
    /// so the result shares nothing with `previous`.
    pub fn reseeded_from(&self, previous: &ConsultationDraft) -> Self {
        Self::new(
            self.visit_id.clone(),
            self.patient_id.clone(),
            self.visit_date,
            self.vitals.clone(),
        )
        .seeded_from(previous)
    }

    fn seeded_from(mut self, previous: &ConsultationDraft) -> Self {
        self.chief_complaint = follow_up_complaint(&previous.chief_complaint);
        self.history_of_present_illness = previous.history_of_present_illness.clone();
        self.past_medical_history = previous.past_medical_history.clone();
        self.allergies = previous.allergies.clone();
        self.current_medications = previous.current_medications.clone();
        self.provisional_diagnosis = previous.provisional_diagnosis.clone();
        self.differential_diagnosis = previous.differential_diagnosis.clone();
        self.prescriptions = previous.prescriptions.clone();
        self.advice = previous.advice.clone();
        // Vitals taken at this visit win over the old reading.
        if self.vitals.is_empty() {
            self.vitals = previous.vitals.clone();
        }
        self.previous_consultation_id = Some(previous.consultation_id.clone());
        self
    }

    pub fn provisional_diagnosis(&self) -> &[String] {
        &self.provisional_diagnosis
    }

    pub fn differential_diagnosis(&self) -> &[String] {
        &self.differential_diagnosis
    }

    /// Append a provisional diagnosis unless already present.
    pub fn add_provisional_diagnosis(&mut self, diagnosis: impl Into<String>) -> bool {
        push_unique(&mut self.provisional_diagnosis, diagnosis.into())
    }

    /// Append a differential diagnosis unless already present.
    pub fn add_differential_diagnosis(&mut self, diagnosis: impl Into<String>) -> bool {
        push_unique(&mut self.differential_diagnosis, diagnosis.into())
    }

    /// Replace the provisional list, dropping duplicates (first one wins).
    pub fn set_provisional_diagnosis(&mut self, diagnoses: Vec<String>) {
        self.provisional_diagnosis = dedup_in_order(diagnoses);
    }

    /// Replace the differential list, dropping duplicates (first one wins).
    pub fn set_differential_diagnosis(&mut self, diagnoses: Vec<String>) {
        self.differential_diagnosis = dedup_in_order(diagnoses);
    }

    /// Apply a shallow merge: every present field replaces the current one.
    pub fn apply(&mut self, update: ConsultationUpdate) {
        let ConsultationUpdate {
            chief_complaint,
            history_of_present_illness,
            past_medical_history,
            allergies,
            current_medications,
            provisional_diagnosis,
            differential_diagnosis,
            vitals,
            prescriptions,
            advice,
            follow_up_date,
        } = update;

        if let Some(v) = chief_complaint {
            self.chief_complaint = v;
        }
        if let Some(v) = history_of_present_illness {
            self.history_of_present_illness = v;
        }
        if let Some(v) = past_medical_history {
            self.past_medical_history = v;
        }
        if let Some(v) = allergies {
            self.allergies = v;
        }
        if let Some(v) = current_medications {
            self.current_medications = v;
        }
        if let Some(v) = provisional_diagnosis {
            self.set_provisional_diagnosis(v);
        }
        if let Some(v) = differential_diagnosis {
            self.set_differential_diagnosis(v);
        }
        if let Some(v) = vitals {
            self.vitals = v;
        }
        if let Some(v) = prescriptions {
            self.prescriptions = v;
        }
        if let Some(v) = advice {
            self.advice = Some(v).filter(|a| !a.trim().is_empty());
        }
        if let Some(v) = follow_up_date {
            self.follow_up_date = Some(v);
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn is_completed(&self) -> bool {
        self.status == ConsultationStatus::Completed
    }
}

/// Partial consultation data from the form. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsultationUpdate {
    pub chief_complaint: Option<String>,
    pub history_of_present_illness: Option<String>,
    pub past_medical_history: Option<BTreeSet<String>>,
    pub allergies: Option<BTreeSet<String>>,
    pub current_medications: Option<BTreeSet<String>>,
    pub provisional_diagnosis: Option<Vec<String>>,
    pub differential_diagnosis: Option<Vec<String>>,
    pub vitals: Option<VitalsReading>,
    pub prescriptions: Option<Prescriptions>,
    pub advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

impl ConsultationUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn follow_up_complaint(previous: &str) -> String {
    let previous = previous.strip_prefix(FOLLOW_UP_PREFIX).unwrap_or(previous);
    format!("{}{}", FOLLOW_UP_PREFIX, previous)
}

fn push_unique(list: &mut Vec<String>, entry: String) -> bool {
    let entry = entry.trim().to_string();
    if entry.is_empty() || list.iter().any(|e| *e == entry) {
        return false;
    }
    list.push(entry);
    true
}

fn dedup_in_order(entries: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        push_unique(&mut out, entry);
    }
    out
}
