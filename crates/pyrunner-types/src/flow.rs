//! Flow kinds: the four generative operations the backend serves.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// One kind of generative-backend operation with a fixed input/output contract.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowKind {
    /// Rewrite the document with inline annotations.
    Annotate,
    /// Produce a test-case listing for the document.
    GenerateTests,
    /// One conversational turn about the document.
    Chat,
    /// Propose a continuation of the document.
    Suggest,
}

impl FlowKind {
    /// All flow kinds, in declaration order.
    pub fn all() -> Vec<FlowKind> {
        FlowKind::iter().collect()
    }

    /// Stable lowercase name, used in notification subjects and logs.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Whether this kind writes into a single-value slot (document, test
    /// listing, suggestion) rather than appending to an ordered log.
    ///
    /// Only slot kinds can have results superseded by a newer request.
    pub fn is_slot(&self) -> bool {
        !matches!(self, FlowKind::Chat)
    }

    /// Whether requests of this kind must carry a per-request credential.
    pub fn requires_credential(&self) -> bool {
        matches!(self, FlowKind::Chat | FlowKind::Suggest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_kind_names() {
        assert_eq!(FlowKind::Annotate.as_str(), "annotate");
        assert_eq!(FlowKind::GenerateTests.as_str(), "generate_tests");
        assert_eq!(FlowKind::GenerateTests.to_string(), "generate_tests");
        assert_eq!(FlowKind::from_str("suggest").unwrap(), FlowKind::Suggest);
        assert!(FlowKind::from_str("execute").is_err());
    }

    #[test]
    fn test_all_kinds() {
        assert_eq!(
            FlowKind::all(),
            vec![
                FlowKind::Annotate,
                FlowKind::GenerateTests,
                FlowKind::Chat,
                FlowKind::Suggest
            ]
        );
    }

    #[test]
    fn test_credential_requirements() {
        assert!(FlowKind::Chat.requires_credential());
        assert!(FlowKind::Suggest.requires_credential());
        assert!(!FlowKind::Annotate.requires_credential());
        assert!(!FlowKind::GenerateTests.requires_credential());
    }

    #[test]
    fn test_chat_is_not_a_slot() {
        assert!(!FlowKind::Chat.is_slot());
        assert!(FlowKind::Suggest.is_slot());
    }
}
