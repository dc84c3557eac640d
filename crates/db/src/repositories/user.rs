use carebook_core::domain::user::{User, UserId, UserRole};
use sqlx::{sqlite::SqliteRow, Row};

use super::{decode_err, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, role, is_active, created_at FROM users WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, role, is_active, created_at
             FROM users
             WHERE lower(email) = lower(?)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, role, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                role = excluded.role,
                is_active = excluded.is_active
            "#,
        )
        .bind(&user.id.0)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(User {
        id: UserId(row.try_get("id")?),
        email: row.try_get("email")?,
        role: role.parse::<UserRole>().map_err(decode_err)?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
