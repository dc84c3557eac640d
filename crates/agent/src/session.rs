//! Durable per-(user, session) conversation state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

use carebook_core::clock::Clock;
use carebook_core::domain::session::{ContextMap, Session, SessionKey, Turn};
use carebook_core::domain::user::UserId;
use carebook_db::repositories::{RepositoryError, SessionRepository};

pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Clone)]
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    clock: Clock,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>, clock: Clock) -> Self {
        Self { repository, clock }
    }

    /// Get-or-create. When two callers race on a fresh key both receive the
    /// row that was stored first.
    pub async fn load(&self, user_id: &UserId, session_id: &str) -> Result<Session, RepositoryError> {
        let key = SessionKey::new(user_id.clone(), session_id);
        if let Some(session) = self.repository.find_active(&key).await? {
            return Ok(session);
        }

        let session = self.repository.insert_if_absent(Session::new(key, self.clock.utc_now())).await?;
        info!(
            event_name = "session.created",
            user_id = %session.key.user_id.0,
            session_id = %session.key.session_id,
            "conversation session opened"
        );
        Ok(session)
    }

    pub fn append_turn(&self, session: &mut Session, turn: Turn) {
        session.push_turn(turn);
    }

    pub fn merge_context(&self, session: &mut Session, partial: ContextMap) {
        session.merge_context(partial);
        session.updated_at = self.clock.utc_now();
    }

    pub async fn persist(&self, session: &Session) -> Result<(), RepositoryError> {
        self.repository.save(session).await
    }

    pub async fn deactivate(&self, user_id: &UserId, session_id: &str) -> Result<bool, RepositoryError> {
        let closed =
            self.repository.deactivate(&SessionKey::new(user_id.clone(), session_id)).await?;
        if closed {
            info!(
                event_name = "session.deactivated",
                user_id = %user_id.0,
                session_id,
                "conversation session closed"
            );
        }
        Ok(closed)
    }

    pub async fn find_active(
        &self,
        user_id: &UserId,
        session_id: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        self.repository.find_active(&SessionKey::new(user_id.clone(), session_id)).await
    }

    pub async fn history(
        &self,
        user_id: &UserId,
        session_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Session>, RepositoryError> {
        self.repository.list_for_user(user_id, session_id, limit).await
    }
}

/// In-process keyed lock serializing work on one session.
#[derive(Clone, Default)]
pub struct SessionLocks {
    slots: Arc<Mutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, key: &SessionKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // drop idle slots nobody is holding or waiting on
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        match self.slots.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::json;

    use carebook_core::clock::Clock;
    use carebook_core::domain::session::{ContextMap, SessionKey, Turn};
    use carebook_core::domain::user::UserId;
    use carebook_db::repositories::InMemorySessionRepository;

    use super::{SessionLocks, SessionStore};

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(InMemorySessionRepository::default()), Clock::System)
    }

    #[tokio::test]
    async fn load_is_idempotent_without_writes() {
        let store = store();
        let user = UserId("user-1".to_string());

        let mut session = store.load(&user, "s-1").await.expect("create");
        store.append_turn(&mut session, Turn::user("hello", Utc::now()));
        let mut partial = ContextMap::new();
        partial.insert("last_date".to_string(), json!("2026-03-02"));
        store.merge_context(&mut session, partial);
        store.persist(&session).await.expect("persist");

        let first = store.load(&user, "s-1").await.expect("first load");
        let second = store.load(&user, "s-1").await.expect("second load");
        assert_eq!(first.turns, second.turns);
        assert_eq!(first.context, second.context);
        assert_eq!(first.turns.len(), 1);
    }

    #[tokio::test]
    async fn deactivated_sessions_start_fresh() {
        let store = store();
        let user = UserId("user-1".to_string());

        let mut session = store.load(&user, "s-1").await.expect("create");
        store.append_turn(&mut session, Turn::user("hello", Utc::now()));
        store.persist(&session).await.expect("persist");

        assert!(store.deactivate(&user, "s-1").await.expect("deactivate"));
        assert!(!store.deactivate(&user, "s-1").await.expect("already closed"));
        assert!(store.find_active(&user, "s-1").await.expect("lookup").is_none());

        let reopened = store.load(&user, "s-1").await.expect("reopen");
        assert!(reopened.turns.is_empty());
    }

    #[tokio::test]
    async fn same_session_work_is_serialized() {
        let locks = SessionLocks::default();
        let key = SessionKey::new(UserId("user-1".to_string()), "s-1");

        let guard = locks.acquire(&key).await;
        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.expect("contender finishes");

        let other = SessionKey::new(UserId("user-1".to_string()), "s-2");
        let _other_guard = locks.acquire(&other).await;
        assert_eq!(locks.tracked(), 1);
    }
}
