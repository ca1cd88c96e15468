//! Conversation turns and the ordered log that holds them.
//!
//! The persisted shape mirrors the provider's content objects
//! (`{"role":"user","parts":[{"text":"..."}]}`) so a stored history can be sent
//! back to the model without translation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::conversation::core::errors::ChatResult;

/// Author of a turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Text produced by the model (or the fallback responder).
    Model,
}

impl Role {
    /// Stable string form for storage and the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            _ => Err(value.to_string()),
        }
    }
}

/// One utterance in the conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredTurn", into = "StoredTurn")]
pub struct Turn {
    /// Author of the turn.
    pub role: Role,
    /// Text of the turn.
    pub text: String,
}

impl Turn {
    /// Build a user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Build a model turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredPart {
    #[serde(default)]
    text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredTurn {
    role: Role,
    #[serde(default)]
    parts: Vec<StoredPart>,
}

impl From<StoredTurn> for Turn {
    fn from(stored: StoredTurn) -> Self {
        let text = stored
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect::<String>();
        Self {
            role: stored.role,
            text,
        }
    }
}

impl From<Turn> for StoredTurn {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role,
            parts: vec![StoredPart { text: turn.text }],
        }
    }
}

/// Ordered, append-only conversation log.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Parse a persisted JSON snapshot.
    ///
    /// # Errors
    /// Returns an error if the snapshot is not a JSON array of turns.
    pub fn from_json(raw: &str) -> ChatResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize the log for persistence.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> ChatResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log has no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Borrow the turns in chronological order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Iterate over turns in chronological order.
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl From<Vec<Turn>> for ConversationLog {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_snapshot_written_by_mobile_client() {
        let raw = r#"[{"role":"user","parts":[{"text":"hi"}]},{"role":"model","parts":[{"text":"Hello!"}]}]"#;
        let log = ConversationLog::from_json(raw).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.turns()[0], Turn::user("hi"));
        assert_eq!(log.turns()[1], Turn::model("Hello!"));
    }

    #[test]
    fn test_writes_single_part_per_turn() {
        let log = ConversationLog::from(vec![Turn::user("ping"), Turn::model("pong")]);
        let json: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "parts": [{"text": "ping"}]},
                {"role": "model", "parts": [{"text": "pong"}]}
            ])
        );
    }

    #[test]
    fn test_multi_part_turn_is_concatenated() {
        let raw = r#"[{"role":"model","parts":[{"text":"foo "},{"text":"bar"}]}]"#;
        let log = ConversationLog::from_json(raw).unwrap();
        assert_eq!(log.turns()[0].text, "foo bar");
    }

    #[test]
    fn test_rejects_unknown_role_and_non_array() {
        assert!(ConversationLog::from_json(r#"[{"role":"system","parts":[]}]"#).is_err());
        assert!(ConversationLog::from_json(r#"{"role":"user"}"#).is_err());
        assert!(ConversationLog::from_json("not json").is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("model".parse::<Role>(), Ok(Role::Model));
        assert!("assistant".parse::<Role>().is_err());
    }
}
