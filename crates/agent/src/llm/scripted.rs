use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, LlmClient, LlmError, LlmResponse};
use crate::tools::registry::ToolSpec;

/// Deterministic model double: replays queued responses in order and records
/// every message list it was shown.
///
/// With [`ScriptedLlmClient::repeating`] the same response is returned forever,
/// which is how a model that never stops calling tools is simulated.
#[derive(Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<LlmResponse>>,
    repeat: Option<LlmResponse>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self { script: Mutex::new(responses.into()), ..Self::default() }
    }

    pub fn repeating(response: LlmResponse) -> Self {
        Self { repeat: Some(response), ..Self::default() }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn rounds(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<LlmResponse, LlmError> {
        let round = {
            let mut requests = match self.requests.lock() {
                Ok(requests) => requests,
                Err(poisoned) => poisoned.into_inner(),
            };
            requests.push(messages.to_vec());
            requests.len()
        };

        let next = match self.script.lock() {
            Ok(mut script) => script.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        next.or_else(|| self.repeat.clone()).ok_or(LlmError::ScriptExhausted { round })
    }
}
