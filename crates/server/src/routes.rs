//! Conversational HTTP surface over the transaction coordinator.
//!
//! Every coordinator outcome, including business failures, is returned with
//! HTTP 200 and a `status` field. Only malformed requests get a 4xx.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use orderdesk_core::{RequestError, TransactionCoordinator, TransactionId, TransactionResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::health;

pub const DEFAULT_INTENT: &str = "transaction";

#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<TransactionCoordinator>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub intent: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub transaction_id: String,
    pub approved: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ActiveContextResponse {
    pub user_id: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub kind: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

/// A refused request tagged with the correlation id it was logged under.
#[derive(Debug)]
pub struct ApiFailure {
    error: RequestError,
    correlation_id: String,
}

impl ApiFailure {
    fn new(error: RequestError, correlation_id: &str) -> Self {
        warn!(
            event_name = "http.request.rejected",
            correlation_id = %correlation_id,
            error_class = error.error_class(),
            "{error}"
        );
        Self { error, correlation_id: correlation_id.to_string() }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ApiError {
            error: self.error.user_message().to_string(),
            kind: self.error.error_class(),
            detail: self.error.to_string(),
            correlation_id: self.correlation_id,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Unwraps a JSON body, turning extractor rejections into the shared 400 body.
fn read_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiFailure> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ApiFailure::new(RequestError::MalformedBody { reason: rejection.body_text() }, correlation_id)
    })
}

pub fn router(coordinator: Arc<TransactionCoordinator>) -> Router {
    let store = coordinator.store().clone();
    Router::new()
        .route("/chat", post(chat))
        .route("/approve", post(approve))
        .route("/sessions/{user_id}/active", get(active_context))
        .with_state(AppState { coordinator })
        .merge(health::router(store))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TransactionResult>, ApiFailure> {
    let correlation_id = Uuid::new_v4().to_string();
    let body = read_body(payload, &correlation_id)?;
    let user_id = RequestError::require("user_id", &body.user_id)
        .map_err(|error| ApiFailure::new(error, &correlation_id))?;
    let query = RequestError::require("query", &body.query)
        .map_err(|error| ApiFailure::new(error, &correlation_id))?;

    let intent = body.intent.as_deref().map(str::trim).filter(|i| !i.is_empty());
    let intent = intent.unwrap_or(DEFAULT_INTENT);
    let result = state.coordinator.process(intent, query, user_id).await;

    info!(
        event_name = "http.chat",
        correlation_id = %correlation_id,
        user_id = %user_id,
        intent = %intent,
        status = result.kind().as_str(),
        "chat turn handled"
    );
    Ok(Json(result))
}

async fn approve(
    State(state): State<AppState>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<TransactionResult>, ApiFailure> {
    let correlation_id = Uuid::new_v4().to_string();
    let body = read_body(payload, &correlation_id)?;
    let transaction_id = RequestError::require("transaction_id", &body.transaction_id)
        .map_err(|error| ApiFailure::new(error, &correlation_id))?;

    let id = TransactionId(transaction_id.to_string());
    let result = if body.approved {
        state.coordinator.execute(&id).await
    } else {
        state.coordinator.reject(&id).await
    };

    info!(
        event_name = "http.approve",
        correlation_id = %correlation_id,
        transaction_id = %id,
        approved = body.approved,
        status = result.kind().as_str(),
        "approval decision handled"
    );
    Ok(Json(result))
}

async fn active_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<ActiveContextResponse> {
    let active = state.coordinator.has_active_context(&user_id).await;
    Json(ActiveContextResponse { user_id, active })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::NaiveDate;
    use orderdesk_core::config::CoordinatorConfig;
    use orderdesk_core::domain::order::{Order, OrderId, OrderStatus};
    use orderdesk_core::store::InMemoryOrderStore;
    use orderdesk_core::TransactionCoordinator;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    fn order(id: &str, item: &str, status: OrderStatus, customer: &str) -> Order {
        Order {
            id: OrderId(id.to_string()),
            item: item.to_string(),
            status,
            customer_id: Some(customer.to_string()),
            order_date: NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid date"),
        }
    }

    async fn app() -> (Router, Arc<InMemoryOrderStore>) {
        let store = Arc::new(
            InMemoryOrderStore::with_orders(vec![
                order("ORD-001", "사운드바", OrderStatus::Shipping, "U1"),
                order("ORD-002", "모니터", OrderStatus::Placed, "U2"),
            ])
            .await,
        );
        let coordinator =
            Arc::new(TransactionCoordinator::new(store.clone(), CoordinatorConfig::default()));
        (router(coordinator), store)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |value| Body::from(value.to_string())))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn chat_then_approve_commits_the_cancellation() {
        let (app, store) = app().await;

        let (status, proposed) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({ "query": "ORD-001 취소해 주세요", "user_id": "U1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(proposed["status"], "pending_approval");
        let transaction_id = proposed["data"]["id"].as_str().expect("transaction id").to_string();

        let (_, active) = send(&app, "GET", "/sessions/U1/active", None).await;
        assert_eq!(active, json!({ "user_id": "U1", "active": true }));

        let (status, committed) = send(
            &app,
            "POST",
            "/approve",
            Some(json!({ "transaction_id": transaction_id, "approved": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(committed["status"], "completed");
        assert_eq!(
            store.durable_order(&OrderId("ORD-001".to_string())).await.map(|o| o.status),
            Some(OrderStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn business_failures_still_return_ok() {
        let (app, _) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({ "query": "ORD-002 취소", "intent": "cancel", "user_id": "U1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"]["kind"], "forbidden");

        let (status, body) = send(
            &app,
            "POST",
            "/approve",
            Some(json!({ "transaction_id": "TXN-missing", "approved": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["kind"], "transaction_not_found");
    }

    #[tokio::test]
    async fn blank_user_id_is_a_bad_request() {
        let (app, _) = app().await;

        let (status, body) =
            send(&app, "POST", "/chat", Some(json!({ "query": "내 주문", "user_id": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "empty_field");
        assert_eq!(body["detail"], "user_id must not be empty");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));

        let (status, body) = send(
            &app,
            "POST",
            "/approve",
            Some(json!({ "transaction_id": "", "approved": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "transaction_id must not be empty");
    }

    #[tokio::test]
    async fn missing_fields_get_the_same_error_body_as_blank_ones() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "POST", "/chat", Some(json!({ "query": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "malformed_body");
        assert!(body["detail"].as_str().is_some_and(|detail| detail.contains("user_id")));
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn health_is_mounted_on_the_same_router() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }
}
