//! Derived-field calculators.
//!
//! Pure functions with no side effects. These back the step-input layer:
//! - BMI from height and weight
//! - Vital-sign range checks (hard error vs. soft warning)
//! - Prescription quantity from dosage and duration codes

mod bmi;
mod dosage;
mod vitals;

pub use bmi::*;
pub use dosage::*;
pub use vitals::*;
