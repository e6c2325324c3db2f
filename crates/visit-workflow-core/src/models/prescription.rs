//! Prescription models.

use serde::{Deserialize, Serialize};

use crate::calc::compute_quantity;

/// One prescribed medicine with its computed dispensed quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "LineRecord")]
pub struct PrescriptionLine {
    /// Medication catalog ID (may be empty for free-text entries)
    pub medication_id: String,
    /// Canonical medicine name
    pub medicine: String,
    /// Dosage code, e.g. "1-0-1" or "SOS"
    dosage_code: String,
    /// Duration label, e.g. "7 days" or "as needed"
    duration_code: String,
    /// Route of administration (e.g. "oral")
    pub route: Option<String>,
    /// Extra instructions ("after food")
    pub instructions: Option<String>,
    /// Units to dispense, derived from dosage and duration
    quantity: u32,
}

/// Stored shape of a line; `quantity` is always recomputed on load.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LineRecord {
    medication_id: String,
    medicine: String,
    dosage_code: String,
    duration_code: String,
    route: Option<String>,
    instructions: Option<String>,
}

impl From<LineRecord> for PrescriptionLine {
    fn from(record: LineRecord) -> Self {
        let mut line = PrescriptionLine::new(
            record.medication_id,
            record.medicine,
            record.dosage_code,
            record.duration_code,
        );
        line.route = record.route;
        line.instructions = record.instructions;
        line
    }
}

impl PrescriptionLine {
    /// Create a line and compute its quantity.
    pub fn new(
        medication_id: impl Into<String>,
        medicine: impl Into<String>,
        dosage_code: impl Into<String>,
        duration_code: impl Into<String>,
    ) -> Self {
        let dosage_code = dosage_code.into();
        let duration_code = duration_code.into();
        Self {
            medication_id: medication_id.into(),
            medicine: medicine.into(),
            quantity: compute_quantity(&dosage_code, &duration_code),
            dosage_code,
            duration_code,
            route: None,
            instructions: None,
        }
    }

    pub fn dosage_code(&self) -> &str {
        &self.dosage_code
    }

    pub fn duration_code(&self) -> &str {
        &self.duration_code
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Change the dosage; quantity is recomputed.
    pub fn set_dosage_code(&mut self, dosage_code: impl Into<String>) {
        self.dosage_code = dosage_code.into();
        self.recompute_quantity();
    }

    /// Change the duration; quantity is recomputed.
    pub fn set_duration_code(&mut self, duration_code: impl Into<String>) {
        self.duration_code = duration_code.into();
        self.recompute_quantity();
    }

    fn recompute_quantity(&mut self) {
        self.quantity = compute_quantity(&self.dosage_code, &self.duration_code);
    }
}

/// Prescriptions of a consultation, split by system of medicine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Prescriptions {
    pub ayurvedic: Vec<PrescriptionLine>,
    pub allopathic: Vec<PrescriptionLine>,
}

impl Prescriptions {
    pub fn is_empty(&self) -> bool {
        self.ayurvedic.is_empty() && self.allopathic.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ayurvedic.len() + self.allopathic.len()
    }

    /// Iterate all lines, ayurvedic first.
    pub fn iter(&self) -> impl Iterator<Item = &PrescriptionLine> {
        self.ayurvedic.iter().chain(self.allopathic.iter())
    }
}

/// Prescription as it arrives from upstream forms and mock data.
///
/// The medicine name shows up under `medicine`, `name` or `medicineName`
/// depending on the source screen. [`RawPrescription::normalize`] resolves
/// that once into a [`PrescriptionLine`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPrescription {
    #[serde(alias = "id")]
    pub medication_id: Option<String>,
    pub medicine: Option<String>,
    pub name: Option<String>,
    pub medicine_name: Option<String>,
    #[serde(alias = "dosage")]
    pub dosage_code: Option<String>,
    #[serde(alias = "duration")]
    pub duration_code: Option<String>,
    pub route: Option<String>,
    pub instructions: Option<String>,
}

impl RawPrescription {
    /// Resolve the medicine name: `medicine`, then `name`, then `medicineName`.
    /// Blank values are skipped.
    pub fn medicine_name(&self) -> Option<&str> {
        [&self.medicine, &self.name, &self.medicine_name]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Convert to a canonical line. Returns `None` when no medicine name is
    /// present in any of the accepted fields.
    pub fn normalize(&self) -> Option<PrescriptionLine> {
        let medicine = self.medicine_name()?;
        let mut line = PrescriptionLine::new(
            self.medication_id.clone().unwrap_or_default(),
            medicine,
            self.dosage_code.clone().unwrap_or_default(),
            self.duration_code.clone().unwrap_or_default(),
        );
        line.route = non_blank(self.route.as_deref());
        line.instructions = non_blank(self.instructions.as_deref());
        Some(line)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalize a batch of raw prescriptions, dropping entries with no name.
pub fn normalize_prescriptions(raw: &[RawPrescription]) -> Vec<PrescriptionLine> {
    raw.iter().filter_map(RawPrescription::normalize).collect()
}
