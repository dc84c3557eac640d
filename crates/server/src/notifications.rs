//! In-app inbox routes.
//!
//! Doctors read the inbox addressed to their doctor id; everyone else reads
//! the one addressed to their user id.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use carebook_agent::{AgentError, AgentRuntime};
use carebook_core::clock::Clock;
use carebook_core::domain::notification::{Notification, NotificationId};
use carebook_core::domain::user::UserId;
use carebook_db::repositories::NotificationRepository;

use crate::caller::Caller;
use crate::error::{agent_rejection, reject, ApiRejection};

#[derive(Clone)]
pub struct NotificationState {
    runtime: Arc<AgentRuntime>,
    notifications: Arc<dyn NotificationRepository>,
    clock: Clock,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub fn router(
    runtime: Arc<AgentRuntime>,
    notifications: Arc<dyn NotificationRepository>,
    clock: Clock,
) -> Router {
    Router::new()
        .route("/api/v1/notifications", get(list))
        .route("/api/v1/notifications/{notification_id}/read", post(mark_read))
        .with_state(NotificationState { runtime, notifications, clock })
}

pub async fn list(
    State(state): State<NotificationState>,
    Caller(user_id): Caller,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, ApiRejection> {
    let recipient = recipient_for(&state, &user_id).await?;
    let notifications = state
        .notifications
        .list_for_recipient(&recipient, query.unread_only)
        .await
        .map_err(|error| agent_rejection(AgentError::Persistence(error)))?;
    Ok(Json(notifications))
}

/// Idempotent: marking an already-read notification returns it unchanged.
pub async fn mark_read(
    State(state): State<NotificationState>,
    Caller(user_id): Caller,
    Path(notification_id): Path<String>,
) -> Result<Json<Notification>, ApiRejection> {
    let recipient = recipient_for(&state, &user_id).await?;
    let inbox = state
        .notifications
        .list_for_recipient(&recipient, false)
        .await
        .map_err(|error| agent_rejection(AgentError::Persistence(error)))?;

    let Some(mut notification) =
        inbox.into_iter().find(|notification| notification.id.0 == notification_id)
    else {
        return Err(reject(StatusCode::NOT_FOUND, "notification_not_found", "Notification not found"));
    };
    if notification.is_read() {
        return Ok(Json(notification));
    }

    let read_at = state.clock.utc_now();
    let recorded = state
        .notifications
        .record_read(&NotificationId(notification_id), read_at)
        .await
        .map_err(|error| agent_rejection(AgentError::Persistence(error)))?;
    if recorded {
        notification.read_at = Some(read_at);
        info!(
            event_name = "notification.read",
            recipient = %recipient,
            notification_id = %notification.id.0,
            "notification marked read"
        );
    }
    Ok(Json(notification))
}

async fn recipient_for(state: &NotificationState, user_id: &UserId) -> Result<String, ApiRejection> {
    let profile = state.runtime.caller(user_id).await.map_err(agent_rejection)?;
    Ok(match profile.doctor {
        Some(doctor) => doctor.id.0,
        None => profile.user.id.0,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use chrono::{Duration, Utc};

    use carebook_agent::llm::ScriptedLlmClient;
    use carebook_core::domain::notification::{Notification, NotificationId, NotificationKind};
    use carebook_core::domain::user::UserId;

    use super::{list, mark_read, InboxQuery, NotificationState};
    use crate::bootstrap::test_support::seeded_app;
    use crate::caller::Caller;

    async fn state_with_report_for(recipient: &str) -> NotificationState {
        let app = seeded_app(Arc::new(ScriptedLlmClient::default())).await;
        app.notifications
            .append(Notification {
                id: NotificationId("n-1".to_string()),
                recipient_id: recipient.to_string(),
                content: "Daily report: 3 appointments today".to_string(),
                kind: NotificationKind::Report,
                created_at: Utc::now() - Duration::minutes(5),
                read_at: None,
            })
            .await
            .expect("append");
        NotificationState { runtime: app.runtime, notifications: app.notifications, clock: app.clock }
    }

    fn caller(id: &str) -> Caller {
        Caller(UserId(id.to_string()))
    }

    #[tokio::test]
    async fn doctors_read_their_inbox_by_doctor_id() {
        let state = state_with_report_for("doc-ahuja").await;

        let Json(inbox) = list(
            State(state.clone()),
            caller("user-dr-ahuja"),
            Query(InboxQuery { unread_only: true }),
        )
        .await
        .expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Report);

        let Json(read) =
            mark_read(State(state.clone()), caller("user-dr-ahuja"), Path("n-1".to_string()))
                .await
                .expect("marked");
        assert!(read.is_read());

        let Json(again) =
            mark_read(State(state.clone()), caller("user-dr-ahuja"), Path("n-1".to_string()))
                .await
                .expect("idempotent");
        assert_eq!(again.read_at, read.read_at);

        let Json(unread) =
            list(State(state), caller("user-dr-ahuja"), Query(InboxQuery { unread_only: true }))
                .await
                .expect("inbox");
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn other_inboxes_are_not_reachable() {
        let state = state_with_report_for("doc-ahuja").await;

        let Json(inbox) =
            list(State(state.clone()), caller("user-dr-sharma"), Query(InboxQuery::default()))
                .await
                .expect("inbox");
        assert!(inbox.is_empty());

        let (status, body) =
            mark_read(State(state), caller("user-dr-sharma"), Path("n-1".to_string()))
                .await
                .expect_err("not theirs");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error_class, "notification_not_found");
    }
}
