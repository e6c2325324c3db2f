//! Prescription quantity from dosage and duration codes.
//!
//! Dosage codes encode units per time-of-day slot: `"1-0-1"` is one unit in
//! the morning and one in the evening, `"1-1-1-1"` adds a night dose.

/// Duration label meaning "take when required".
pub const AS_NEEDED: &str = "as needed";

/// Dosage code meaning "take when required" (si opus sit).
pub const SOS: &str = "SOS";

/// Quantity dispensed when the duration is [`AS_NEEDED`].
pub const AS_NEEDED_QUANTITY: u32 = 10;

/// Known duration labels and their length in days.
pub const DURATION_DAYS: &[(&str, u32)] = &[
    ("3 days", 3),
    ("5 days", 5),
    ("7 days", 7),
    ("10 days", 10),
    ("14 days", 14),
    ("1 month", 30),
    ("2 months", 60),
    ("3 months", 90),
    (AS_NEEDED, 0),
];

/// Units taken per day for a dosage code.
///
/// Sums the slots of `N-N-N` or `N-N-N-N` codes. `"SOS"` counts as zero
/// regular units. Anything else, including a sum that does not fit in a
/// `u32`, falls back to one unit per day.
pub fn daily_units_from_dosage_code(code: &str) -> u32 {
    let code = code.trim();
    if code.eq_ignore_ascii_case(SOS) {
        return 0;
    }

    let slots: Vec<&str> = code.split('-').map(str::trim).collect();
    if slots.len() != 3 && slots.len() != 4 {
        return 1;
    }

    slots
        .iter()
        .try_fold(0u32, |total, slot| {
            if slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            total.checked_add(slot.parse::<u32>().ok()?)
        })
        .unwrap_or(1)
}

/// Number of days for a duration label. Unknown labels yield zero.
pub fn days_from_duration_code(code: &str) -> u32 {
    let normalized = code.trim().to_lowercase();
    DURATION_DAYS
        .iter()
        .find(|(label, _)| *label == normalized)
        .map(|(_, days)| *days)
        .unwrap_or(0)
}

/// Check whether a duration label is the "as needed" sentinel.
pub fn is_as_needed(duration_code: &str) -> bool {
    duration_code.trim().eq_ignore_ascii_case(AS_NEEDED)
}

/// Quantity to dispense: daily units × days, or the fixed fallback for
/// "as needed" durations regardless of dosage. Saturates at `u32::MAX`.
pub fn compute_quantity(dosage_code: &str, duration_code: &str) -> u32 {
    if is_as_needed(duration_code) {
        return AS_NEEDED_QUANTITY;
    }
    daily_units_from_dosage_code(dosage_code).saturating_mul(days_from_duration_code(duration_code))
}
