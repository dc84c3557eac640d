use carebook_core::domain::session::{ContextMap, Session, SessionKey, Turn};
use carebook_core::domain::user::UserId;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_err, parse_timestamp, RepositoryError, SessionRepository};
use crate::DbPool;

const SESSION_COLUMNS: &str =
    "user_id, session_id, turns_json, context_json, is_active, created_at, updated_at";

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_active(&self, key: &SessionKey) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM conversation_sessions
             WHERE user_id = ? AND session_id = ? AND is_active = 1"
        ))
        .bind(&key.user_id.0)
        .bind(&key.session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn insert_if_absent(&self, session: Session) -> Result<Session, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_sessions (
                user_id, session_id, turns_json, context_json, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT(user_id, session_id) WHERE is_active = 1 DO NOTHING
            "#,
        )
        .bind(&session.key.user_id.0)
        .bind(&session.key.session_id)
        .bind(serde_json::to_string(&session.turns).map_err(decode_err)?)
        .bind(serde_json::to_string(&session.context).map_err(decode_err)?)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_active(&session.key).await?.ok_or_else(|| {
            RepositoryError::Decode(format!(
                "active session `{}` vanished after insert",
                session.key.session_id
            ))
        })
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        if !session.active {
            self.deactivate(&session.key).await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_sessions (
                user_id, session_id, turns_json, context_json, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 1, ?, ?)
            ON CONFLICT(user_id, session_id) WHERE is_active = 1 DO UPDATE SET
                turns_json = excluded.turns_json,
                context_json = excluded.context_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.key.user_id.0)
        .bind(&session.key.session_id)
        .bind(serde_json::to_string(&session.turns).map_err(decode_err)?)
        .bind(serde_json::to_string(&session.context).map_err(decode_err)?)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate(&self, key: &SessionKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversation_sessions
             SET is_active = 0, updated_at = ?
             WHERE user_id = ? AND session_id = ? AND is_active = 1",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&key.user_id.0)
        .bind(&key.session_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        session_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM conversation_sessions
             WHERE user_id = ?1 AND is_active = 1 AND (?2 IS NULL OR session_id = ?2)
             ORDER BY updated_at DESC, id DESC
             LIMIT ?3"
        ))
        .bind(&user_id.0)
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }
}

fn session_from_row(row: &SqliteRow) -> Result<Session, RepositoryError> {
    let turns_json: String = row.try_get("turns_json")?;
    let context_json: String = row.try_get("context_json")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Session {
        key: SessionKey::new(UserId(row.try_get("user_id")?), row.try_get::<String, _>("session_id")?),
        turns: serde_json::from_str::<Vec<Turn>>(&turns_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid turns_json: {e}")))?,
        context: serde_json::from_str::<ContextMap>(&context_json)
            .map_err(|e| RepositoryError::Decode(format!("invalid context_json: {e}")))?,
        active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
