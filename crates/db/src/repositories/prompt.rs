use carebook_core::domain::prompt::{PromptRecord, PromptRecordId};
use carebook_core::domain::user::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_err, parse_timestamp, PromptRecordRepository, RepositoryError};
use crate::DbPool;

const PROMPT_COLUMNS: &str = "id, user_id, session_id, prompt, response, tools_used_json, \
                              tokens_used, processing_time_ms, success, error_message, created_at";

pub struct SqlPromptRecordRepository {
    pool: DbPool,
}

impl SqlPromptRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PromptRecordRepository for SqlPromptRecordRepository {
    async fn append(&self, record: PromptRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO prompt_records (
                id, user_id, session_id, prompt, response, tools_used_json,
                tokens_used, processing_time_ms, success, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id.0)
        .bind(&record.user_id.0)
        .bind(&record.session_id)
        .bind(&record.prompt)
        .bind(&record.response)
        .bind(serde_json::to_string(&record.tools_used).map_err(decode_err)?)
        .bind(record.tokens_used.map(i64::from))
        .bind(i64::try_from(record.processing_time_ms).map_err(decode_err)?)
        .bind(record.success)
        .bind(&record.error_message)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PromptRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompt_records
             WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(&user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(prompt_from_row).collect()
    }

    async fn all_for_user(&self, user_id: &UserId) -> Result<Vec<PromptRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROMPT_COLUMNS} FROM prompt_records WHERE user_id = ? ORDER BY created_at ASC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(prompt_from_row).collect()
    }
}

fn prompt_from_row(row: &SqliteRow) -> Result<PromptRecord, RepositoryError> {
    let tools_used_json: String = row.try_get("tools_used_json")?;
    let tokens_used: Option<i64> = row.try_get("tokens_used")?;
    let processing_time_ms: i64 = row.try_get("processing_time_ms")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PromptRecord {
        id: PromptRecordId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        session_id: row.try_get("session_id")?,
        prompt: row.try_get("prompt")?,
        response: row.try_get("response")?,
        tools_used: serde_json::from_str(&tools_used_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid tools_used_json: {e}")))?,
        tokens_used: tokens_used.map(u32::try_from).transpose().map_err(decode_err)?,
        processing_time_ms: u64::try_from(processing_time_ms).map_err(decode_err)?,
        success: row.try_get("success")?,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
