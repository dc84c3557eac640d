//! Prompt assembly: system instruction, a bounded history window, then the
//! new user message.

use carebook_core::clock::Clock;
use carebook_core::domain::session::{ContextMap, Session, TurnRole};
use carebook_core::domain::user::UserRole;

use crate::llm::ChatMessage;
use crate::session::DEFAULT_HISTORY_WINDOW;

const BASE_PROMPT: &str = include_str!("../../../templates/prompts/base.txt");
const PATIENT_PROMPT: &str = include_str!("../../../templates/prompts/patient.txt");
const DOCTOR_PROMPT: &str = include_str!("../../../templates/prompts/doctor.txt");

#[derive(Clone, Copy, Debug)]
pub struct ConversationAssembler {
    history_window: usize,
    clock: Clock,
}

impl Default for ConversationAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW, Clock::System)
    }
}

impl ConversationAssembler {
    pub fn new(history_window: usize, clock: Clock) -> Self {
        Self { history_window, clock }
    }

    pub fn system_prompt(&self, role: UserRole, profile_context: &ContextMap) -> String {
        let now = self.clock.local_now().format("%B %d, %Y at %I:%M %p");
        let mut prompt = format!("{}\nCURRENT DATE AND TIME: {now}", BASE_PROMPT.trim_end());

        let role_prompt = match role {
            UserRole::Patient => Some(PATIENT_PROMPT),
            UserRole::Doctor => Some(DOCTOR_PROMPT),
            UserRole::Admin => None,
        };
        if let Some(role_prompt) = role_prompt {
            prompt.push_str("\n\n");
            prompt.push_str(role_prompt.trim_end());
        }

        if !profile_context.is_empty() {
            let rendered = serde_json::to_string_pretty(profile_context)
                .unwrap_or_else(|_| "{}".to_string());
            prompt.push_str("\n\nCONVERSATION CONTEXT:\n");
            prompt.push_str(&rendered);
            prompt.push_str("\n\nResolve references to earlier messages with this context.");
        }

        prompt
    }

    /// Tool turns are not replayed; they cannot be matched to call ids across requests.
    pub fn build(
        &self,
        session: &Session,
        new_user_message: &str,
        role: UserRole,
        profile_context: &ContextMap,
    ) -> Vec<ChatMessage> {
        let history = session.recent_turns(self.history_window);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt(role, profile_context)));

        messages.extend(history.iter().filter_map(|turn| match turn.role {
            TurnRole::User => Some(ChatMessage::user(turn.content.clone())),
            TurnRole::Assistant => Some(ChatMessage::assistant(turn.content.clone())),
            TurnRole::Tool => None,
        }));

        messages.push(ChatMessage::user(new_user_message));
        messages
    }
}
