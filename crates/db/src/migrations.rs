use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "users",
        "doctors",
        "patients",
        "appointments",
        "conversation_sessions",
        "prompt_records",
        "notifications",
        "notification_reads",
    ];

    const MANAGED_INDEXES: &[&str] = &[
        "idx_doctors_name",
        "idx_appointments_doctor_scheduled_at",
        "idx_appointments_patient_id",
        "idx_appointments_status",
        "idx_conversation_sessions_active",
        "idx_conversation_sessions_user_updated",
        "idx_prompt_records_user_created",
        "idx_notifications_recipient_created",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "table `{table}` should exist");
        }
    }

    #[tokio::test]
    async fn only_one_active_session_row_per_user_and_session() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let ts = "2026-03-02T09:00:00+00:00";
        sqlx::query("INSERT INTO users (id, email, role, created_at) VALUES ('u-1', 'a@b.c', 'patient', ?)")
            .bind(ts)
            .execute(&pool)
            .await
            .expect("insert user");

        let insert = "INSERT INTO conversation_sessions (user_id, session_id, is_active, created_at, updated_at)
                      VALUES ('u-1', 's-1', ?, ?, ?)";
        sqlx::query(insert).bind(1).bind(ts).bind(ts).execute(&pool).await.expect("first active");
        let duplicate = sqlx::query(insert).bind(1).bind(ts).bind(ts).execute(&pool).await;
        assert!(duplicate.is_err(), "second active row must violate the partial unique index");

        sqlx::query("UPDATE conversation_sessions SET is_active = 0")
            .execute(&pool)
            .await
            .expect("deactivate");
        sqlx::query(insert).bind(1).bind(ts).bind(ts).execute(&pool).await.expect("fresh active");
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_TABLES.len() + MANAGED_INDEXES.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            let managed = MANAGED_TABLES.contains(&name.as_str())
                || MANAGED_INDEXES.contains(&name.as_str());
            managed.then(|| (row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
        })
        .collect();
        signature.sort();
        signature
    }
}
