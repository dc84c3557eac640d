use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptRecordId(pub String);

/// Write-once audit entry for one processed user message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub id: PromptRecordId,
    pub user_id: UserId,
    pub session_id: String,
    pub prompt: String,
    pub response: String,
    pub tools_used: Vec<String>,
    pub tokens_used: Option<u32>,
    pub processing_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolUsageCount {
    pub tool: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PromptStats {
    pub total_prompts: u64,
    pub avg_processing_time_ms: f64,
    pub most_used_tools: Vec<ToolUsageCount>,
}

impl PromptStats {
    pub const TOP_TOOLS: usize = 5;

    pub fn summarize(records: &[PromptRecord]) -> Self {
        let total_prompts = records.len() as u64;
        let avg_processing_time_ms = if records.is_empty() {
            0.0
        } else {
            let total: u64 = records.iter().map(|record| record.processing_time_ms).sum();
            ((total as f64 / records.len() as f64) * 100.0).round() / 100.0
        };

        let mut counts: HashMap<&str, u64> = HashMap::new();
        for tool in records.iter().flat_map(|record| record.tools_used.iter()) {
            *counts.entry(tool.as_str()).or_default() += 1;
        }

        let mut most_used_tools = counts
            .into_iter()
            .map(|(tool, count)| ToolUsageCount { tool: tool.to_string(), count })
            .collect::<Vec<_>>();
        // ties break alphabetically so the ranking is stable
        most_used_tools.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tool.cmp(&b.tool)));
        most_used_tools.truncate(Self::TOP_TOOLS);

        Self { total_prompts, avg_processing_time_ms, most_used_tools }
    }
}
