//! UI-facing projection of conversation turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::core::turn::{ConversationLog, Role, Turn};

/// Identifier of the synthetic greeting message.
pub const GREETING_ID: &str = "initial";

/// Who a displayed message is attributed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The local user.
    User,
    /// The assistant.
    Bot,
}

impl From<Role> for Sender {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Model => Self::Bot,
        }
    }
}

/// A message ready for display. Timestamps are regenerated on every projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    /// Identifier: the turn index, `initial` for the greeting, or a random id for
    /// replies that are not part of the log.
    pub id: String,
    /// Message text.
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Client-side timestamp.
    pub timestamp: DateTime<Utc>,
    /// Set for replies produced by the fallback responder.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl DisplayMessage {
    /// The synthetic greeting shown for an empty log.
    #[must_use]
    pub fn greeting(text: impl Into<String>) -> Self {
        Self {
            id: GREETING_ID.to_string(),
            text: text.into(),
            sender: Sender::Bot,
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    /// Project the turn at `index` of the log.
    #[must_use]
    pub fn from_turn(index: usize, turn: &Turn) -> Self {
        Self {
            id: index.to_string(),
            text: turn.text.clone(),
            sender: turn.role.into(),
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    /// A fallback reply that was not recorded in the log.
    #[must_use]
    pub fn transient_fallback(text: impl Into<String>) -> Self {
        Self {
            id: format!("fallback-{}", Uuid::new_v4()),
            text: text.into(),
            sender: Sender::Bot,
            timestamp: Utc::now(),
            is_error: true,
        }
    }

    /// Mark this message as produced by the fallback responder.
    #[must_use]
    pub const fn with_error(mut self) -> Self {
        self.is_error = true;
        self
    }
}

/// Project a log for display: the greeting if empty, otherwise one message per turn.
#[must_use]
pub fn project(log: &ConversationLog, greeting: &str) -> Vec<DisplayMessage> {
    if log.is_empty() {
        return vec![DisplayMessage::greeting(greeting)];
    }

    log.iter()
        .enumerate()
        .map(|(index, turn)| DisplayMessage::from_turn(index, turn))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log_projects_greeting() {
        let messages = project(&ConversationLog::new(), "Hi there");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, GREETING_ID);
        assert_eq!(messages[0].text, "Hi there");
        assert_eq!(messages[0].sender, Sender::Bot);
        assert!(!messages[0].is_error);
    }

    #[test]
    fn test_turns_project_in_order_with_index_ids() {
        let log = ConversationLog::from(vec![Turn::user("q"), Turn::model("a")]);
        let messages = project(&log, "unused");

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["0", "1"]);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].text, "a");
    }

    #[test]
    fn test_error_flag_serialization() {
        let plain = serde_json::to_value(DisplayMessage::greeting("x")).unwrap();
        assert!(plain.get("isError").is_none());
        assert_eq!(plain["sender"], "bot");

        let fallback = serde_json::to_value(DisplayMessage::transient_fallback("x")).unwrap();
        assert_eq!(fallback["isError"], true);
        assert!(fallback["id"].as_str().unwrap().starts_with("fallback-"));
    }
}
