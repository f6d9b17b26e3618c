//! Annotate: add comments to the document per the user's requirements.

use pyrunner_types::FlowKind;
use serde::Deserialize;

use super::{FlowContract, OutputShape, require};
use crate::error::FlowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateInput {
    pub code: String,
    pub requirements: String,
}

impl AnnotateInput {
    pub fn new(code: impl Into<String>, requirements: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            requirements: requirements.into(),
        }
    }
}

/// The annotated document, which replaces the current one verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnnotateOutput {
    #[serde(rename = "annotatedCode")]
    pub annotated_code: String,
}

impl OutputShape for AnnotateOutput {
    const FIELD: &'static str = "annotatedCode";
}

impl FlowContract for AnnotateInput {
    const KIND: FlowKind = FlowKind::Annotate;
    type Output = AnnotateOutput;

    fn validate(&self) -> Result<(), FlowError> {
        let mut errors = Vec::new();
        require(&mut errors, "code", &self.code, "Code cannot be empty.");
        require(
            &mut errors,
            "requirements",
            &self.requirements,
            "Project requirements cannot be empty.",
        );
        FlowError::check(errors)
    }

    fn phrase(&self) -> String {
        format!(
            "You are an AI assistant specialized in generating comments for Python code.\n\
             Given the following Python code and project requirements, generate comments for the code.\n\
             Return the complete code with the comments added.\n\
             \n\
             Project Requirements: {}\n\
             \n\
             Python Code:\n\
             ```python\n\
             {}\n\
             ```",
            self.requirements, self.code
        )
    }
}
