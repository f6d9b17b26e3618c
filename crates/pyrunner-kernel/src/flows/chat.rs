//! Chat: answer the latest question given the document and prior turns.

use pyrunner_types::{ChatMessage, ChatRole, Credential, FlowKind};
use serde::Deserialize;

use super::{FlowContract, OutputShape, require, require_credential};
use crate::error::FlowError;
use crate::llm::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInput {
    /// The latest user utterance.
    pub prompt: String,
    pub code: String,
    /// Session contents before the utterance was echoed.
    pub history: Vec<ChatMessage>,
    pub credential: Option<Credential>,
}

impl ChatInput {
    pub fn new(
        prompt: impl Into<String>,
        code: impl Into<String>,
        history: Vec<ChatMessage>,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            code: code.into(),
            history,
            credential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatOutput {
    pub response: String,
}

impl OutputShape for ChatOutput {
    const FIELD: &'static str = "response";
}

impl FlowContract for ChatInput {
    const KIND: FlowKind = FlowKind::Chat;
    type Output = ChatOutput;

    fn validate(&self) -> Result<(), FlowError> {
        require_credential(self.credential.as_ref())?;
        let mut errors = Vec::new();
        require(&mut errors, "prompt", &self.prompt, "Message cannot be empty.");
        FlowError::check(errors)
    }

    fn phrase(&self) -> String {
        format!(
            "You are an expert Python developer AI assistant. Your goal is to help users \
             understand, debug, and improve their Python code.\n\
             \n\
             You are having a conversation with a user. Earlier turns precede this message.\n\
             \n\
             Here is the user's current Python code:\n\
             ```python\n\
             {}\n\
             ```\n\
             \n\
             And here is the user's latest question:\n\
             {}\n\
             \n\
             Your response should be helpful, concise, and directly related to their question and code.\n\
             If you provide code snippets, use Markdown.",
            self.code, self.prompt
        )
    }

    fn history(&self) -> Vec<Message> {
        self.history
            .iter()
            .map(|m| match m.role {
                ChatRole::User => Message::user(&m.content),
                ChatRole::Assistant => Message::assistant(&m.content),
            })
            .collect()
    }

    fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn key() -> Option<Credential> {
        Some(Credential::new("sk-test"))
    }

    #[test]
    fn test_missing_credential_is_precondition() {
        let err = ChatInput::new("why?", "x = 1", vec![], None)
            .validate()
            .unwrap_err();
        assert!(matches!(err, FlowError::Precondition(_)));
    }

    #[test]
    fn test_empty_prompt_is_validation() {
        let err = ChatInput::new("  ", "x = 1", vec![], key())
            .validate()
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "prompt");
    }

    #[test]
    fn test_history_becomes_messages_in_order() {
        let history = vec![
            ChatMessage::user("what is x?", 0, None),
            ChatMessage::assistant("x is one", 1, None),
        ];
        let input = ChatInput::new("and y?", "x = 1", history, key());

        let messages = input.history();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "what is x?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "x is one");

        let prompt = input.phrase();
        assert!(prompt.contains("latest question:\nand y?"));
        assert!(!prompt.contains("what is x?"));
        assert!(!prompt.contains("sk-test"));
        assert!(input.system().contains("\"response\""));
    }
}
