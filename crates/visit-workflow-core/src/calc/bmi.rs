//! Body-mass index.

/// Compute BMI from height in centimetres and weight in kilograms.
///
/// Returns `None` when either input is missing, zero, negative or not finite.
/// The result is rounded to one decimal place.
pub fn compute_bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> Option<f64> {
    let height_cm = height_cm.filter(|h| h.is_finite() && *h > 0.0)?;
    let weight_kg = weight_kg.filter(|w| w.is_finite() && *w > 0.0)?;

    let height_m = height_cm / 100.0;
    Some(round_one_decimal(weight_kg / (height_m * height_m)))
}

/// Compute BMI from the raw form strings.
pub fn compute_bmi_from_input(height_cm: &str, weight_kg: &str) -> Option<f64> {
    compute_bmi(parse_measurement(height_cm), parse_measurement(weight_kg))
}

/// Format a BMI value the way it is displayed ("24.2").
pub fn format_bmi(bmi: f64) -> String {
    format!("{:.1}", bmi)
}

/// Parse a numeric form value. Blank or non-numeric input yields `None`.
pub fn parse_measurement(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
