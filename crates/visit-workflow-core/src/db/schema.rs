//! SQLite schema definition.

/// Complete database schema for the visit workflow store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Visits
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    visit_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    patient_name TEXT NOT NULL,
    visit_date TEXT NOT NULL,                    -- YYYY-MM-DD
    metadata TEXT NOT NULL DEFAULT '{}',         -- JSON VisitMetadata
    current_step TEXT NOT NULL CHECK (current_step IN (
        'registration', 'vitals', 'consultation', 'tests-treatment', 'completed'
    )),
    step_data TEXT NOT NULL DEFAULT '{}',        -- JSON StepData
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visits_patient ON visits(patient_id, visit_date);

-- ============================================================================
-- Consultations (autosaved drafts and completed records)
-- ============================================================================

CREATE TABLE IF NOT EXISTS consultations (
    consultation_id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(visit_id),
    patient_id TEXT NOT NULL,
    visit_date TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'completed')),
    previous_consultation_id TEXT,
    body TEXT NOT NULL,                          -- JSON ConsultationDraft
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_consultations_patient
    ON consultations(patient_id, status, visit_date DESC);
CREATE INDEX IF NOT EXISTS idx_consultations_visit ON consultations(visit_id);
"#;
