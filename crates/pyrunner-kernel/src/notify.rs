//! Notification sink for resolved operations.
//!
//! The coordinator publishes one [`Notification`] per resolved request that
//! the user should hear about. Front ends subscribe with dot-separated
//! subject patterns:
//!
//! - `*` matches exactly one token: `notify.*.failure` matches every failure
//! - `>` matches one or more trailing tokens: `notify.>` matches everything
//!
//! Subjects have the form `notify.{kind}.{level}`, e.g.
//! `notify.annotate.success`.

use pyrunner_types::{FlowKind, RequestId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity for [`NotificationBus::new`] callers.
pub const DEFAULT_CAPACITY: usize = 256;

// ============================================================================
// Pattern Matching
// ============================================================================

/// Check a subject against a pattern. See the module docs for wildcards.
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.').peekable();
    let mut subject_tokens = subject.split('.');

    while let Some(token) = pattern_tokens.next() {
        let Some(subject_token) = subject_tokens.next() else {
            return false;
        };
        match token {
            // only valid as the last token
            ">" => return pattern_tokens.peek().is_none(),
            "*" => {}
            exact if exact != subject_token => return false,
            _ => {}
        }
    }

    subject_tokens.next().is_none()
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Failure,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Failure => "failure",
        }
    }
}

/// A toast-style message about one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub kind: FlowKind,
    /// Absent when the request was rejected before dispatch.
    pub request: Option<RequestId>,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(
        kind: FlowKind,
        request: Option<RequestId>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: Level::Success,
            kind,
            request,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn failure(
        kind: FlowKind,
        request: Option<RequestId>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level: Level::Failure,
            kind,
            request,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn subject(&self) -> String {
        format!("notify.{}.{}", self.kind.as_str(), self.level.as_str())
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Broadcast bus for notifications. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every subscriber. Returns how many receivers got it.
    pub fn publish(&self, notification: Notification) -> usize {
        self.tx.send(notification).unwrap_or(0)
    }

    pub fn subscribe(&self, pattern: &str) -> Subscription {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A filtered view of the bus.
pub struct Subscription {
    pattern: String,
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next matching notification. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(n) if matches_pattern(&self.pattern, &n.subject()) => return Some(n),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(pattern = %self.pattern, skipped, "notification subscriber lagged");
                }
            }
        }
    }

    /// Next matching notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.try_recv() {
                Ok(n) if matches_pattern(&self.pattern, &n.subject()) => return Some(n),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(pattern = %self.pattern, skipped, "notification subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
