//! GenerateTests: produce a test-case listing for the document.

use pyrunner_types::FlowKind;
use serde::Deserialize;

use super::{FlowContract, OutputShape, require};
use crate::error::FlowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateTestsInput {
    pub code: String,
    pub documentation: Option<String>,
}

impl GenerateTestsInput {
    pub fn new(code: impl Into<String>, documentation: Option<String>) -> Self {
        Self {
            code: code.into(),
            documentation,
        }
    }
}

/// A display artifact. Never merged into the document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateTestsOutput {
    #[serde(rename = "testCases")]
    pub test_cases: String,
}

impl OutputShape for GenerateTestsOutput {
    const FIELD: &'static str = "testCases";
}

impl FlowContract for GenerateTestsInput {
    const KIND: FlowKind = FlowKind::GenerateTests;
    type Output = GenerateTestsOutput;

    fn validate(&self) -> Result<(), FlowError> {
        let mut errors = Vec::new();
        require(&mut errors, "code", &self.code, "Code cannot be empty.");
        FlowError::check(errors)
    }

    fn phrase(&self) -> String {
        let documentation = self
            .documentation
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("No documentation provided.");

        format!(
            "You are a test case generator for Python code.\n\
             You will generate test cases based on the provided code and documentation.\n\
             \n\
             Code:\n\
             ```python\n\
             {}\n\
             ```\n\
             \n\
             Documentation:\n\
             {}",
            self.code, documentation
        )
    }
}
