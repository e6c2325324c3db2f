//! Vital-sign range checks.
//!
//! Every vital has an admissible range (physiologically possible) and a
//! normal sub-range. Outside admissible is a hard error that blocks the
//! step; inside admissible but outside normal is a warning only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bmi::parse_measurement;
use crate::models::VitalsReading;

/// A vital-sign field that can be range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VitalField {
    Temperature,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    Pulse,
    RespiratoryRate,
    OxygenSaturation,
    Height,
    Weight,
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalRange {
    pub min: f64,
    pub max: f64,
}

impl VitalRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl VitalField {
    /// All checked fields, in form order.
    pub const ALL: [VitalField; 8] = [
        VitalField::Temperature,
        VitalField::BloodPressureSystolic,
        VitalField::BloodPressureDiastolic,
        VitalField::Pulse,
        VitalField::RespiratoryRate,
        VitalField::OxygenSaturation,
        VitalField::Height,
        VitalField::Weight,
    ];

    /// Form key for this field.
    pub fn as_str(self) -> &'static str {
        match self {
            VitalField::Temperature => "temperature",
            VitalField::BloodPressureSystolic => "bloodPressureSystolic",
            VitalField::BloodPressureDiastolic => "bloodPressureDiastolic",
            VitalField::Pulse => "pulse",
            VitalField::RespiratoryRate => "respiratoryRate",
            VitalField::OxygenSaturation => "oxygenSaturation",
            VitalField::Height => "height",
            VitalField::Weight => "weight",
        }
    }

    /// Human-readable label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            VitalField::Temperature => "Temperature",
            VitalField::BloodPressureSystolic => "Systolic blood pressure",
            VitalField::BloodPressureDiastolic => "Diastolic blood pressure",
            VitalField::Pulse => "Pulse",
            VitalField::RespiratoryRate => "Respiratory rate",
            VitalField::OxygenSaturation => "Oxygen saturation",
            VitalField::Height => "Height",
            VitalField::Weight => "Weight",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            VitalField::Temperature => "°C",
            VitalField::BloodPressureSystolic | VitalField::BloodPressureDiastolic => "mmHg",
            VitalField::Pulse => "bpm",
            VitalField::RespiratoryRate => "breaths/min",
            VitalField::OxygenSaturation => "%",
            VitalField::Height => "cm",
            VitalField::Weight => "kg",
        }
    }

    /// Physiologically possible range. Values outside are rejected.
    pub fn admissible_range(self) -> VitalRange {
        match self {
            VitalField::Temperature => VitalRange::new(35.0, 42.0),
            VitalField::BloodPressureSystolic => VitalRange::new(70.0, 250.0),
            VitalField::BloodPressureDiastolic => VitalRange::new(40.0, 150.0),
            VitalField::Pulse => VitalRange::new(30.0, 200.0),
            VitalField::RespiratoryRate => VitalRange::new(8.0, 40.0),
            VitalField::OxygenSaturation => VitalRange::new(70.0, 100.0),
            VitalField::Height => VitalRange::new(50.0, 250.0),
            VitalField::Weight => VitalRange::new(10.0, 300.0),
        }
    }

    /// Clinically typical range. Values outside are flagged, not rejected.
    pub fn normal_range(self) -> VitalRange {
        match self {
            VitalField::Temperature => VitalRange::new(36.1, 37.2),
            VitalField::BloodPressureSystolic => VitalRange::new(90.0, 140.0),
            VitalField::BloodPressureDiastolic => VitalRange::new(60.0, 90.0),
            VitalField::Pulse => VitalRange::new(60.0, 100.0),
            VitalField::RespiratoryRate => VitalRange::new(12.0, 20.0),
            VitalField::OxygenSaturation => VitalRange::new(95.0, 100.0),
            VitalField::Height => VitalRange::new(140.0, 200.0),
            VitalField::Weight => VitalRange::new(40.0, 120.0),
        }
    }

    fn decimals(self) -> usize {
        match self {
            VitalField::Temperature => 1,
            _ => 0,
        }
    }

    fn describe(self, range: VitalRange) -> String {
        let d = self.decimals();
        format!("{:.*}-{:.*} {}", d, range.min, d, range.max, self.unit())
    }

    /// Check a raw form value against this field's ranges.
    pub fn check(self, value: &str) -> VitalCheck {
        if value.trim().is_empty() {
            return VitalCheck::ok();
        }

        let Some(number) = parse_measurement(value) else {
            return VitalCheck::error(format!("{} must be a number", self.label()));
        };

        let admissible = self.admissible_range();
        if !admissible.contains(number) {
            return VitalCheck::error(format!(
                "{} must be between {}",
                self.label(),
                self.describe(admissible)
            ));
        }

        let normal = self.normal_range();
        if !normal.contains(number) {
            return VitalCheck::warning(format!(
                "{} is outside the normal range ({})",
                self.label(),
                self.describe(normal)
            ));
        }

        VitalCheck::ok()
    }
}

impl fmt::Display for VitalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "temperature" | "temp" => Ok(VitalField::Temperature),
            "bloodpressuresystolic" | "bpsystolic" | "systolic" => {
                Ok(VitalField::BloodPressureSystolic)
            }
            "bloodpressurediastolic" | "bpdiastolic" | "diastolic" => {
                Ok(VitalField::BloodPressureDiastolic)
            }
            "pulse" | "heartrate" => Ok(VitalField::Pulse),
            "respiratoryrate" | "respiration" => Ok(VitalField::RespiratoryRate),
            "oxygensaturation" | "spo2" => Ok(VitalField::OxygenSaturation),
            "height" => Ok(VitalField::Height),
            "weight" => Ok(VitalField::Weight),
            _ => Err(format!("Unknown vital field: {}", s)),
        }
    }
}

/// Outcome of checking one vital value.
///
/// `error` blocks step completion; `warning` is shown but does not block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalCheck {
    pub error: Option<String>,
    pub warning: Option<String>,
}

impl VitalCheck {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(message: String) -> Self {
        Self {
            error: Some(message),
            warning: None,
        }
    }

    pub fn warning(message: String) -> Self {
        Self {
            error: None,
            warning: Some(message),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.warning.is_none()
    }

    pub fn is_blocking(&self) -> bool {
        self.error.is_some()
    }
}

/// Check a vital value by form field name.
///
/// Unknown field names are not checked.
pub fn validate_vital(field: &str, value: &str) -> VitalCheck {
    match field.parse::<VitalField>() {
        Ok(field) => field.check(value),
        Err(_) => VitalCheck::ok(),
    }
}

/// Per-field results for a whole vitals form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalsReport {
    pub checks: Vec<(VitalField, VitalCheck)>,
}

impl VitalsReport {
    pub fn has_errors(&self) -> bool {
        self.checks.iter().any(|(_, c)| c.is_blocking())
    }

    pub fn has_warnings(&self) -> bool {
        self.checks.iter().any(|(_, c)| c.warning.is_some())
    }

    pub fn errors(&self) -> impl Iterator<Item = (VitalField, &str)> {
        self.checks
            .iter()
            .filter_map(|(f, c)| c.error.as_deref().map(|e| (*f, e)))
    }

    pub fn warnings(&self) -> impl Iterator<Item = (VitalField, &str)> {
        self.checks
            .iter()
            .filter_map(|(f, c)| c.warning.as_deref().map(|w| (*f, w)))
    }

    pub fn get(&self, field: VitalField) -> Option<&VitalCheck> {
        self.checks.iter().find(|(f, _)| *f == field).map(|(_, c)| c)
    }
}

/// Check every entered measurement of a vitals form.
///
/// Step completion is blocked by `has_errors()` only; warnings are shown
/// alongside the form.
pub fn validate_vitals(vitals: &VitalsReading) -> VitalsReport {
    vitals.validate()
}
