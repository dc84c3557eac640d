use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use carebook_core::audit::TracingAuditSink;
use carebook_db::DbPool;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    audit: Arc<TracingAuditSink>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    /// Calendar, email and inbox failures absorbed since startup.
    pub degraded_side_effects: u64,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, audit: Arc<TracingAuditSink>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, audit })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "carebook-server agent runtime initialized".to_string(),
        },
        database,
        degraded_side_effects: state.audit.degraded_count(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            warn!(event_name = "system.health.database_unreachable", error = %error, "health probe failed");
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use carebook_core::audit::{
        AuditSink, Collaborator, CollaboratorDegradation, TracingAuditSink,
    };
    use carebook_core::domain::appointment::AppointmentId;
    use carebook_db::connect_with_settings;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_is_reachable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool.clone(),
            audit: Arc::new(TracingAuditSink::default()),
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.degraded_side_effects, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState {
            db_pool: pool,
            audit: Arc::new(TracingAuditSink::default()),
        }))
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn degraded_side_effects_are_reported() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let audit = Arc::new(TracingAuditSink::default());
        let degradation = CollaboratorDegradation::new(
            Collaborator::Email,
            "send_confirmation",
            AppointmentId("appt-1".to_string()),
            "sendgrid returned status 502",
        );
        audit.emit(degradation.to_audit_event("req-1"));

        let (_, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), audit: audit.clone() })).await;
        assert_eq!(payload.degraded_side_effects, 1);

        pool.close().await;
    }
}
