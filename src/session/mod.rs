//! Conversation state
//!
//! A [`Session`] is the ordered message history of one conversation. The
//! persona occupies index 0 for the whole lifetime of the session; trimming
//! only ever discards messages after it.

mod manager;

pub use manager::{Collaborators, SessionManager, Turn, capture_utterance, speak_best_effort};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Trim once the history grows past this many messages
pub const TRIM_THRESHOLD: usize = 16;

/// Number of most recent messages kept (besides the persona) when trimming
pub const TRIM_RETAIN: usize = 14;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One conversation: identifier, history and lifecycle flag
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    messages: Vec<Message>,
    ended: bool,
}

impl Session {
    /// Create a session holding only the persona message
    #[must_use]
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: vec![Message::system(persona)],
            ended: false,
        }
    }

    /// Identifier used to correlate log records
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// History, oldest first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages including the persona
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the persona message is never removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The persona prompt at index 0
    #[must_use]
    pub fn persona(&self) -> &str {
        &self.messages[0].content
    }

    /// Whether the session has been ended
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    /// Fail with `InvalidState` once the session has ended
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the session has ended
    pub fn ensure_live(&self) -> Result<()> {
        if self.ended {
            return Err(Error::InvalidState(format!("session {} has ended", self.id)));
        }
        Ok(())
    }

    /// Apply the hard-cap trimming policy
    ///
    /// Above [`TRIM_THRESHOLD`] messages the history becomes the persona plus
    /// the [`TRIM_RETAIN`] most recent messages. Returns how many were dropped.
    pub fn trim(&mut self) -> usize {
        if self.messages.len() <= TRIM_THRESHOLD {
            return 0;
        }

        let cut = self.messages.len() - TRIM_RETAIN;
        let removed = cut - 1;
        self.messages.drain(1..cut);
        removed
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything but a fresh persona message
    pub(crate) fn reset(&mut self, persona: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(persona));
    }

    pub(crate) const fn mark_ended(&mut self) {
        self.ended = true;
    }
}
