//! Shared types for pyrunner.
//!
//! A pure leaf crate with **no internal pyrunner dependencies**: correlation
//! ids, flow kinds, per-request credentials and chat messages. The kernel
//! and every front end speak this vocabulary.
//!
//! | Type              | Purpose                                        |
//! |-------------------|------------------------------------------------|
//! | [`RequestId`]     | Ties one dispatched request to its one result  |
//! | [`FlowKind`]      | Annotate, GenerateTests, Chat, Suggest         |
//! | [`Credential`]    | User API key, threaded through each request    |
//! | [`ChatMessage`]   | Append-only conversation entry with ordinal    |

pub mod chat;
pub mod credential;
pub mod flow;
pub mod ids;

pub use chat::{ChatMessage, ChatRole};
pub use credential::Credential;
pub use flow::FlowKind;
pub use ids::RequestId;
