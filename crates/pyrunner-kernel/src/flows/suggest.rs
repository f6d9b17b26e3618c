//! Suggest: propose a continuation of the document.

use pyrunner_types::{Credential, FlowKind};
use serde::Deserialize;

use super::{FlowContract, OutputShape, require, require_credential};
use crate::error::FlowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestInput {
    pub code: String,
    pub credential: Option<Credential>,
}

impl SuggestInput {
    pub fn new(code: impl Into<String>, credential: Option<Credential>) -> Self {
        Self {
            code: code.into(),
            credential,
        }
    }
}

/// Continuation text, held in the suggestion slot until accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuggestOutput {
    pub suggestion: String,
}

impl OutputShape for SuggestOutput {
    const FIELD: &'static str = "suggestion";
}

impl FlowContract for SuggestInput {
    const KIND: FlowKind = FlowKind::Suggest;
    type Output = SuggestOutput;

    fn validate(&self) -> Result<(), FlowError> {
        require_credential(self.credential.as_ref())?;
        let mut errors = Vec::new();
        require(&mut errors, "code", &self.code, "Code cannot be empty.");
        FlowError::check(errors)
    }

    fn phrase(&self) -> String {
        format!(
            "You are an expert Python developer AI assistant. Your task is to complete the given Python code.\n\
             Only provide the code that should be added to complete the user's request. \
             Do not repeat the code that the user has already written.\n\
             Your suggestion should be a continuation of the provided code.\n\
             \n\
             Here is the user's current Python code:\n\
             ```python\n\
             {}\n\
             ```",
            self.code
        )
    }

    fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}
