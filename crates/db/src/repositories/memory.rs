use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use carebook_core::domain::notification::{Notification, NotificationId};
use carebook_core::domain::prompt::PromptRecord;
use carebook_core::domain::session::{Session, SessionKey};
use carebook_core::domain::user::UserId;

use super::{NotificationRepository, PromptRecordRepository, RepositoryError, SessionRepository};

/// Active sessions only; deactivation drops the entry.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_active(&self, key: &SessionKey) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).cloned())
    }

    async fn insert_if_absent(&self, session: Session) -> Result<Session, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.entry(session.key.clone()).or_insert(session).clone())
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if session.active {
            sessions.insert(session.key.clone(), session.clone());
        } else {
            sessions.remove(&session.key);
        }
        Ok(())
    }

    async fn deactivate(&self, key: &SessionKey) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(key).is_some())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        session_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        let mut matching = sessions
            .values()
            .filter(|session| session.key.user_id == *user_id)
            .filter(|session| session_id.map_or(true, |id| session.key.session_id == id))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryPromptRecordRepository {
    records: RwLock<Vec<PromptRecord>>,
}

#[async_trait::async_trait]
impl PromptRecordRepository for InMemoryPromptRecordRepository {
    async fn append(&self, record: PromptRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Decode(format!(
                "prompt record `{}` already exists",
                record.id.0
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<PromptRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| record.user_id == *user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn all_for_user(&self, user_id: &UserId) -> Result<Vec<PromptRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| record.user_id == *user_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
    reads: RwLock<HashMap<NotificationId, DateTime<Utc>>>,
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn append(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        Ok(())
    }

    async fn record_read(
        &self,
        id: &NotificationId,
        read_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let notifications = self.notifications.read().await;
        if !notifications.iter().any(|notification| notification.id == *id) {
            return Ok(false);
        }
        let mut reads = self.reads.write().await;
        if reads.contains_key(id) {
            return Ok(false);
        }
        reads.insert(id.clone(), read_at);
        Ok(true)
    }

    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        let reads = self.reads.read().await;
        Ok(notifications
            .iter()
            .rev()
            .filter(|notification| notification.recipient_id == recipient_id)
            .map(|notification| Notification {
                read_at: reads.get(&notification.id).copied(),
                ..notification.clone()
            })
            .filter(|notification| !unread_only || notification.read_at.is_none())
            .collect())
    }
}
