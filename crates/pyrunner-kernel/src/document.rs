//! The shared, mutable document buffer.
//!
//! Flows read snapshots of it; only the coordinator writes flow results
//! into it. Every write bumps the revision so a resolving request can tell
//! whether the user edited the buffer after it was dispatched.

/// Text buffer with a write counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    revision: u64,
}

/// An immutable copy of the document taken at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub revision: u64,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// User edit: replace the whole buffer.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.bump();
    }

    /// User edit: empty the buffer.
    pub fn clear(&mut self) {
        self.text.clear();
        self.bump();
    }

    /// Flow write: replace the buffer verbatim with a result.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.set_text(text);
    }

    /// Flow write: append text exactly as given.
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.bump();
    }

    /// Append a code snippet on its own line.
    pub fn insert_snippet(&mut self, code: &str) {
        self.text.push('\n');
        self.text.push_str(code);
        self.bump();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            text: self.text.clone(),
            revision: self.revision,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
