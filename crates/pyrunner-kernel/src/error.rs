//! Error taxonomy for flow requests.
//!
//! Every failure is scoped to the one request that produced it; none of
//! these are fatal to the process.

use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Input field name as it appears in the flow contract.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that terminate a flow request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// One or more required fields missing or empty. No backend call made.
    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// A precondition such as a credential is missing. No backend call made.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The backend replied but the reply does not satisfy the output shape.
    #[error("malformed reply: {0}")]
    Protocol(String),

    /// The backend call itself failed.
    #[error("backend call failed: {0}")]
    Transport(String),
}

impl FlowError {
    /// Build a validation error from collected field errors.
    ///
    /// Returns `Ok(())` when nothing was collected.
    pub fn check(fields: Vec<FieldError>) -> Result<(), FlowError> {
        if fields.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Validation(fields))
        }
    }

    /// Per-field messages, empty for non-validation errors.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            FlowError::Validation(fields) => fields,
            _ => &[],
        }
    }

    /// Text shown to the user.
    ///
    /// Protocol and transport failures read the same: the caller only
    /// learns that the operation failed and why.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Validation(fields) => {
                format!("Please check your inputs. {}", join_messages(fields))
            }
            FlowError::Precondition(reason) => reason.clone(),
            FlowError::Protocol(reason) | FlowError::Transport(reason) => {
                format!("operation failed: {reason}")
            }
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_messages(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_empty_is_ok() {
        assert!(FlowError::check(vec![]).is_ok());
    }

    #[test]
    fn test_validation_lists_fields() {
        let err = FlowError::check(vec![
            FieldError::new("code", "Code cannot be empty."),
            FieldError::new("requirements", "Project requirements cannot be empty."),
        ])
        .unwrap_err();

        assert_eq!(err.field_errors().len(), 2);
        assert_eq!(
            err.to_string(),
            "invalid input: code: Code cannot be empty.; requirements: Project requirements cannot be empty."
        );
        assert_eq!(
            err.user_message(),
            "Please check your inputs. Code cannot be empty. Project requirements cannot be empty."
        );
    }

    #[test]
    fn test_protocol_and_transport_surface_alike() {
        let protocol = FlowError::Protocol("no JSON object".into());
        let transport = FlowError::Transport("connection refused".into());
        assert!(protocol.user_message().starts_with("operation failed: "));
        assert!(transport.user_message().starts_with("operation failed: "));
    }
}
