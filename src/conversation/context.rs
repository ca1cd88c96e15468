//! Context window selection: which prior turns accompany a request.
//!
//! The returned history always starts with a user turn, alternates roles and
//! ends with a model turn, so appending the current message keeps the
//! request well-formed for the provider.

use crate::conversation::core::config::{ContextConfig, ContextPolicy};
use crate::conversation::core::turn::{ConversationLog, Role, Turn};

/// Select the prior turns to send with the next request.
#[must_use]
pub fn select_history(config: &ContextConfig, log: &ConversationLog) -> Vec<Turn> {
    match &config.policy {
        ContextPolicy::CurrentOnly => Vec::new(),
        ContextPolicy::FullHistory => normalize(window(log.turns(), config.max_turns)),
        ContextPolicy::Persona {
            instruction,
            acknowledgement,
        } => {
            let mut history = vec![
                Turn::user(instruction.clone()),
                Turn::model(acknowledgement.clone()),
            ];
            history.extend(normalize(window(log.turns(), config.max_turns)));
            history
        }
    }
}

fn window(turns: &[Turn], max_turns: Option<usize>) -> &[Turn] {
    match max_turns {
        Some(max) if turns.len() > max => &turns[turns.len() - max..],
        _ => turns,
    }
}

fn normalize(turns: &[Turn]) -> Vec<Turn> {
    let mut out: Vec<Turn> = Vec::with_capacity(turns.len());

    for turn in turns.iter().skip_while(|t| t.role == Role::Model) {
        match out.last_mut() {
            Some(last) if last.role == turn.role => {
                last.text.push_str("\n\n");
                last.text.push_str(&turn.text);
            }
            _ => out.push(turn.clone()),
        }
    }

    if out.last().is_some_and(|t| t.role == Role::User) {
        out.pop();
    }

    out
}
