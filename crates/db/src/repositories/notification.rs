use carebook_core::domain::notification::{Notification, NotificationId, NotificationKind};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, recipient_id, kind, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&notification.id.0)
        .bind(&notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.content)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_read(
        &self,
        id: &NotificationId,
        read_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO notification_reads (notification_id, read_at)
             SELECT id, ? FROM notifications WHERE id = ?",
        )
        .bind(read_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT n.id, n.recipient_id, n.kind, n.content, n.created_at, r.read_at
             FROM notifications n
             LEFT JOIN notification_reads r ON r.notification_id = n.id
             WHERE n.recipient_id = ?1 AND (?2 = 0 OR r.read_at IS NULL)
             ORDER BY n.created_at DESC, n.rowid DESC",
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;
    let read_at: Option<String> = row.try_get("read_at")?;

    Ok(Notification {
        id: NotificationId(row.try_get("id")?),
        recipient_id: row.try_get("recipient_id")?,
        content: row.try_get("content")?,
        kind: NotificationKind::parse(&kind),
        created_at: parse_timestamp("created_at", &created_at)?,
        read_at: read_at.map(|value| parse_timestamp("read_at", &value)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use carebook_core::domain::notification::{Notification, NotificationId, NotificationKind};

    use super::SqlNotificationRepository;
    use crate::repositories::NotificationRepository;
    use crate::{connect_with_settings, migrations};

    fn notification(id: &str, minutes: i64) -> Notification {
        Notification {
            id: NotificationId(id.to_string()),
            recipient_id: "doc-1".to_string(),
            content: format!("report {id}"),
            kind: NotificationKind::Report,
            created_at: Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).single().expect("ts")
                + Duration::minutes(minutes),
            read_at: None,
        }
    }

    #[tokio::test]
    async fn read_receipts_are_appended_once_and_derive_read_state() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlNotificationRepository::new(pool);

        repo.append(notification("n-1", 0)).await.expect("append");
        repo.append(notification("n-2", 5)).await.expect("append");

        let read_at = Utc.with_ymd_and_hms(2026, 3, 2, 19, 0, 0).single().expect("ts");
        assert!(repo.record_read(&NotificationId("n-1".to_string()), read_at).await.expect("read"));
        assert!(!repo
            .record_read(&NotificationId("n-1".to_string()), read_at)
            .await
            .expect("re-read"));
        assert!(!repo
            .record_read(&NotificationId("missing".to_string()), read_at)
            .await
            .expect("missing"));

        let all = repo.list_for_recipient("doc-1", false).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.0, "n-2");
        assert_eq!(all[1].read_at, Some(read_at));

        let unread = repo.list_for_recipient("doc-1", true).await.expect("unread");
        assert_eq!(unread.len(), 1);
        assert!(!unread[0].is_read());
    }
}
