use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::user::UserId;

/// Loosely-typed scratchpad carried across turns of one session.
pub type ContextMap = Map<String, Value>;

pub mod context_keys {
    pub const DOCTOR_ID: &str = "doctor_id";
    pub const DOCTOR_NAME: &str = "doctor_name";
    pub const LAST_DOCTOR_ID: &str = "last_doctor_id";
    pub const LAST_DOCTOR_NAME: &str = "last_doctor_name";
    pub const LAST_DATE: &str = "last_date";
    pub const AVAILABLE_SLOTS: &str = "available_slots";
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: UserId,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(user_id: UserId, session_id: impl Into<String>) -> Self {
        Self { user_id, session_id: session_id.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    Tool,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
}

impl Turn {
    pub fn user(content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { role: TurnRole::User, content: content.into(), timestamp: Some(at), tools_used: None }
    }

    pub fn assistant(
        content: impl Into<String>,
        at: DateTime<Utc>,
        tools_used: Vec<String>,
    ) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            timestamp: Some(at),
            tools_used: Some(tools_used),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub turns: Vec<Turn>,
    pub context: ContextMap,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            turns: Vec::new(),
            context: ContextMap::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        if let Some(at) = turn.timestamp {
            self.updated_at = at;
        }
        self.turns.push(turn);
    }

    /// Shallow merge: keys in `partial` replace existing keys, others are kept.
    pub fn merge_context(&mut self, partial: ContextMap) {
        for (key, value) in partial {
            self.context.insert(key, value);
        }
    }

    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{ContextMap, Session, SessionKey, Turn, TurnRole};
    use crate::domain::user::UserId;

    fn session() -> Session {
        Session::new(SessionKey::new(UserId("user-1".to_string()), "s-1"), Utc::now())
    }

    #[test]
    fn recent_turns_returns_tail_in_order() {
        let mut session = session();
        for index in 0..15 {
            session.push_turn(Turn::user(format!("turn {index}"), Utc::now()));
        }

        let window = session.recent_turns(10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "turn 5");
        assert_eq!(window[9].content, "turn 14");
        assert_eq!(session.recent_turns(50).len(), 15);
    }

    #[test]
    fn merge_context_overwrites_by_key_only() {
        let mut session = session();
        session.context.insert("doctor_id".to_string(), json!("doc-1"));
        session.context.insert("last_date".to_string(), json!("2026-03-02"));

        let mut partial = ContextMap::new();
        partial.insert("last_date".to_string(), json!("2026-03-03"));
        session.merge_context(partial);

        assert_eq!(session.context["doctor_id"], json!("doc-1"));
        assert_eq!(session.context["last_date"], json!("2026-03-03"));
    }

    #[test]
    fn assistant_turn_serializes_tool_usage_but_user_turn_omits_it() {
        let user = serde_json::to_value(Turn::user("hi", Utc::now())).expect("user turn");
        assert!(user.get("tools_used").is_none());

        let assistant =
            Turn::assistant("done", Utc::now(), vec!["get_all_doctors".to_string()]);
        assert_eq!(assistant.role, TurnRole::Assistant);
        let value = serde_json::to_value(assistant).expect("assistant turn");
        assert_eq!(value["tools_used"], json!(["get_all_doctors"]));
    }
}
