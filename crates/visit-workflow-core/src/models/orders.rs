//! Test and treatment orders captured at the tests-treatment step.

use serde::{Deserialize, Serialize};

/// Department that performs a test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TestCategory {
    Lab,
    Radiology,
}

/// Progress of an ordered test.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    #[default]
    Ordered,
    SampleCollected,
    Completed,
}

/// A single lab or radiology order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestOrder {
    pub test_name: String,
    pub category: TestCategory,
    #[serde(default)]
    pub status: TestStatus,
    /// Result text, once reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl TestOrder {
    pub fn new(test_name: impl Into<String>, category: TestCategory) -> Self {
        Self {
            test_name: test_name.into(),
            category,
            status: TestStatus::Ordered,
            result: None,
        }
    }

    /// Record a result; marks the order completed.
    pub fn complete(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.status = TestStatus::Completed;
    }
}

/// Payload of the tests-treatment step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TestsTreatment {
    pub tests: Vec<TestOrder>,
    /// Procedures performed during the visit
    pub procedures: Vec<String>,
    pub treatment_notes: Option<String>,
}

impl TestsTreatment {
    /// Orders still waiting on a result.
    pub fn pending_tests(&self) -> impl Iterator<Item = &TestOrder> {
        self.tests
            .iter()
            .filter(|t| t.status != TestStatus::Completed)
    }
}
