use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chatorder_db::{migrations, DbPool};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
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
    pub schema: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Ready only when the database answers and the order-intake schema is in place.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let schema = if database.status == "ready" {
        schema_check(&state.db_pool).await
    } else {
        HealthCheck { status: "degraded", detail: "database unreachable".to_string() }
    };
    let ready = database.status == "ready" && schema.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "chatorder-server order intake runtime initialized".to_string(),
        },
        database,
        schema,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    match migrations::applied_count(pool).await {
        Ok(applied) if applied > 0 => {
            HealthCheck { status: "ready", detail: format!("{applied} migrations applied") }
        }
        Ok(_) => HealthCheck { status: "degraded", detail: "no migrations applied".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("schema not initialized: {error}") }
        }
    }
}
