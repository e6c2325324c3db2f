//! Vital-sign reading captured at the vitals step.

use serde::{Deserialize, Serialize, Serializer};

use crate::calc::{compute_bmi_from_input, format_bmi, parse_measurement, VitalField, VitalsReport};

/// A vitals reading as entered on the form.
///
/// Measurements are kept as the entered strings. `bmi` is derived from
/// height and weight and recomputed whenever either changes; it cannot be
/// set directly. On the wire it is the one-decimal display string
/// (`"24.2"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "VitalsForm")]
pub struct VitalsReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blood_pressure_systolic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blood_pressure_diastolic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pulse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    respiratory_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oxygen_saturation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_bmi")]
    bmi: Option<f64>,
    /// Free-text notes from the nurse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Wire shape of a vitals form. Any incoming `bmi` is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VitalsForm {
    temperature: Option<String>,
    blood_pressure_systolic: Option<String>,
    blood_pressure_diastolic: Option<String>,
    pulse: Option<String>,
    respiratory_rate: Option<String>,
    oxygen_saturation: Option<String>,
    height: Option<String>,
    weight: Option<String>,
    notes: Option<String>,
}

impl From<VitalsForm> for VitalsReading {
    fn from(form: VitalsForm) -> Self {
        let mut reading = VitalsReading {
            temperature: form.temperature,
            blood_pressure_systolic: form.blood_pressure_systolic,
            blood_pressure_diastolic: form.blood_pressure_diastolic,
            pulse: form.pulse,
            respiratory_rate: form.respiratory_rate,
            oxygen_saturation: form.oxygen_saturation,
            height: form.height,
            weight: form.weight,
            bmi: None,
            notes: form.notes,
        };
        reading.recompute_bmi();
        reading
    }
}

impl VitalsReading {
    /// Create an empty reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, field: VitalField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a measurement. Blank values clear the field.
    pub fn set(&mut self, field: VitalField, value: impl Into<String>) {
        let value: String = value.into();
        let value = if value.trim().is_empty() {
            None
        } else {
            Some(value)
        };
        *self.slot_mut(field) = value;

        if matches!(field, VitalField::Height | VitalField::Weight) {
            self.recompute_bmi();
        }
    }

    /// Clear a measurement.
    pub fn clear(&mut self, field: VitalField) {
        self.set(field, String::new());
    }

    /// Get the entered value of a measurement.
    pub fn get(&self, field: VitalField) -> Option<&str> {
        match field {
            VitalField::Temperature => self.temperature.as_deref(),
            VitalField::BloodPressureSystolic => self.blood_pressure_systolic.as_deref(),
            VitalField::BloodPressureDiastolic => self.blood_pressure_diastolic.as_deref(),
            VitalField::Pulse => self.pulse.as_deref(),
            VitalField::RespiratoryRate => self.respiratory_rate.as_deref(),
            VitalField::OxygenSaturation => self.oxygen_saturation.as_deref(),
            VitalField::Height => self.height.as_deref(),
            VitalField::Weight => self.weight.as_deref(),
        }
    }

    /// Height in centimetres, if entered and numeric.
    pub fn height_cm(&self) -> Option<f64> {
        self.height.as_deref().and_then(parse_measurement)
    }

    /// Weight in kilograms, if entered and numeric.
    pub fn weight_kg(&self) -> Option<f64> {
        self.weight.as_deref().and_then(parse_measurement)
    }

    /// Derived BMI (one decimal).
    pub fn bmi(&self) -> Option<f64> {
        self.bmi
    }

    /// BMI formatted for display, e.g. `"24.2"`.
    pub fn bmi_display(&self) -> Option<String> {
        self.bmi.map(format_bmi)
    }

    /// Check every entered measurement against its ranges.
    pub fn validate(&self) -> VitalsReport {
        let checks = VitalField::ALL
            .iter()
            .filter_map(|field| self.get(*field).map(|v| (*field, field.check(v))))
            .collect();
        VitalsReport { checks }
    }

    /// True when no measurement has been entered.
    pub fn is_empty(&self) -> bool {
        VitalField::ALL.iter().all(|f| self.get(*f).is_none()) && self.notes.is_none()
    }

    fn slot_mut(&mut self, field: VitalField) -> &mut Option<String> {
        match field {
            VitalField::Temperature => &mut self.temperature,
            VitalField::BloodPressureSystolic => &mut self.blood_pressure_systolic,
            VitalField::BloodPressureDiastolic => &mut self.blood_pressure_diastolic,
            VitalField::Pulse => &mut self.pulse,
            VitalField::RespiratoryRate => &mut self.respiratory_rate,
            VitalField::OxygenSaturation => &mut self.oxygen_saturation,
            VitalField::Height => &mut self.height,
            VitalField::Weight => &mut self.weight,
        }
    }

    fn recompute_bmi(&mut self) {
        self.bmi = match (self.height.as_deref(), self.weight.as_deref()) {
            (Some(height), Some(weight)) => compute_bmi_from_input(height, weight),
            _ => None,
        };
    }
}

fn serialize_bmi<S: Serializer>(bmi: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match bmi {
        Some(value) => serializer.serialize_str(&format_bmi(*value)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi_follows_height_and_weight() {
        let mut vitals = VitalsReading::new()
            .with(VitalField::Height, "170")
            .with(VitalField::Weight, "70");
        assert_eq!(vitals.bmi(), Some(24.2));
        assert_eq!(vitals.bmi_display().as_deref(), Some("24.2"));

        vitals.set(VitalField::Weight, "80");
        assert_eq!(vitals.bmi(), Some(27.7));

        vitals.clear(VitalField::Height);
        assert_eq!(vitals.bmi(), None);
    }

    #[test]
    fn test_deserialize_recomputes_bmi() {
        let json = r#"{"height":"170","weight":"70","bmi":99.9,"pulse":"72"}"#;
        let vitals: VitalsReading = serde_json::from_str(json).unwrap();
        assert_eq!(vitals.bmi(), Some(24.2));
        assert_eq!(vitals.get(VitalField::Pulse), Some("72"));
    }

    #[test]
    fn test_bmi_serialized_as_display_string() {
        let vitals = VitalsReading::new()
            .with(VitalField::Height, "170")
            .with(VitalField::Weight, "70");
        let json = serde_json::to_value(&vitals).unwrap();
        assert_eq!(json["bmi"], "24.2");

        let back: VitalsReading = serde_json::from_value(json).unwrap();
        assert_eq!(back.bmi(), Some(24.2));

        let no_bmi = serde_json::to_value(VitalsReading::new().with(VitalField::Height, "170")).unwrap();
        assert!(no_bmi.get("bmi").is_none());
    }

    #[test]
    fn test_serialize_camel_case() {
        let vitals = VitalsReading::new().with(VitalField::BloodPressureSystolic, "120");
        let json = serde_json::to_value(&vitals).unwrap();
        assert_eq!(json["bloodPressureSystolic"], "120");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_validate_reports_only_entered_fields() {
        let vitals = VitalsReading::new()
            .with(VitalField::Temperature, "38.0")
            .with(VitalField::Pulse, "250");
        let report = vitals.validate();

        assert_eq!(report.checks.len(), 2);
        assert!(report.has_errors());
        assert!(report.has_warnings());
        assert!(report.get(VitalField::Pulse).unwrap().is_blocking());
        assert!(report.get(VitalField::Height).is_none());
    }
}
