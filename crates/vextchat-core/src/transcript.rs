// Chat turns and the append-only transcript.

use chrono::{DateTime, Utc};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatTurn {
            role,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }
}

/// Ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn and return a reference to it.
    pub fn push_user(&mut self, content: impl Into<String>) -> &ChatTurn {
        self.push(ChatTurn::new(Role::User, content))
    }

    /// Append an assistant turn and return a reference to it.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> &ChatTurn {
        self.push(ChatTurn::new(Role::Assistant, content))
    }

    fn push(&mut self, turn: ChatTurn) -> &ChatTurn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// True when turns strictly alternate user, assistant, user, ...
    /// starting with a user turn. A trailing user turn (reply pending) is
    /// allowed.
    pub fn is_alternating(&self) -> bool {
        self.turns.iter().enumerate().all(|(i, turn)| {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            turn.role == expected
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
