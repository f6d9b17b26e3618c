//! Conversation message types shared between the kernel and front ends.

use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// The role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person editing the document.
    User,
    /// The generative backend.
    Assistant,
}

impl ChatRole {
    /// Lowercase name as it appears in phrased history lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One entry in an append-only conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// Position in the session; strictly increasing in append order.
    pub ordinal: u64,
    /// The chat request this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestId>,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>, ordinal: u64, request: Option<RequestId>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            ordinal,
            request,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>, ordinal: u64, request: Option<RequestId>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            ordinal,
            request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let id = RequestId::new();
        let user = ChatMessage::user("hello", 0, Some(id));
        assert_eq!(user.role, ChatRole::User);
        assert_eq!(user.request, Some(id));

        let assistant = ChatMessage::assistant("hi there", 1, Some(id));
        assert_eq!(assistant.role, ChatRole::Assistant);
        assert_eq!(assistant.ordinal, 1);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("q", 3, None);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("request").is_none());
    }
}
