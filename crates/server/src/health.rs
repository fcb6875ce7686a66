use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use orderdesk_core::store::OrderStore;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn OrderStore>,
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
    pub store: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Arc<dyn OrderStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store = store_check(state.store.as_ref()).await;
    let ready = store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "orderdesk-server runtime initialized".to_string(),
        },
        store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn store_check(store: &dyn OrderStore) -> HealthCheck {
    match store.probe().await {
        Ok(()) => HealthCheck { status: "ready", detail: "order store probe succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("order store probe failed: {error}") }
        }
    }
}
