//! JSON HTTP surface over the payment history.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use payhist_common::cursor::SyncCursor;
use payhist_common::memo::InvoiceMemo;
use payhist_common::node::NodeError;
use payhist_common::payment::PaymentView;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ReconcileError;
use crate::history::PaymentHistory;
use crate::invoices::RelatedInvoice;
use crate::sync::SyncReport;

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node: String,
    pub ready: bool,
}

#[derive(Serialize, Deserialize)]
pub struct PaymentRequestBody {
    pub payment_request: String,
}

#[derive(Serialize, Deserialize)]
pub struct SendPaymentBody {
    pub payment_request: String,
    #[serde(default)]
    pub amount: i64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: ReconcileError) -> ApiError {
    let status = match &e {
        ReconcileError::Node(NodeError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ReconcileError::Node(_) | ReconcileError::StreamClosed => StatusCode::BAD_GATEWAY,
        ReconcileError::PaymentFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReconcileError::InvalidMemo(_) | ReconcileError::InvalidHash(_) => StatusCode::BAD_REQUEST,
        ReconcileError::Store(_) | ReconcileError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn require_ready(history: &PaymentHistory) -> Result<(), ApiError> {
    if history.node.is_ready() {
        Ok(())
    } else {
        Err(api_error(
            NodeError::Unavailable(format!("{} is not ready", history.node.node_name())).into(),
        ))
    }
}

pub fn router(history: Arc<PaymentHistory>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/payments", get(payments_handler))
        .route("/payments/sync", post(sync_handler))
        .route("/payments/send", post(send_handler))
        .route("/cursor", get(cursor_handler))
        .route("/invoices", post(add_invoice_handler))
        .route("/invoices/standard", post(add_standard_invoice_handler))
        .route("/invoices/decode", post(decode_handler))
        .route("/invoices/related", post(related_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .with_state(history)
}

async fn health_handler(State(history): State<Arc<PaymentHistory>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        node: history.node.node_name().to_string(),
        ready: history.node.is_ready(),
    })
}

async fn payments_handler(
    State(history): State<Arc<PaymentHistory>>,
) -> Result<Json<Vec<PaymentView>>, ApiError> {
    history.payments().await.map(Json).map_err(api_error)
}

async fn sync_handler(
    State(history): State<Arc<PaymentHistory>>,
) -> Result<Json<SyncReport>, ApiError> {
    require_ready(&history)?;
    history.sync().await.map(Json).map_err(api_error)
}

async fn send_handler(
    State(history): State<Arc<PaymentHistory>>,
    Json(req): Json<SendPaymentBody>,
) -> Result<Json<SyncReport>, ApiError> {
    require_ready(&history)?;
    history
        .invoices
        .send_payment(&req.payment_request, req.amount)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn cursor_handler(
    State(history): State<Arc<PaymentHistory>>,
) -> Result<Json<SyncCursor>, ApiError> {
    history
        .store
        .cursor()
        .map(Json)
        .map_err(|e| api_error(e.into()))
}

async fn add_invoice_handler(
    State(history): State<Arc<PaymentHistory>>,
    Json(memo): Json<InvoiceMemo>,
) -> Result<Json<PaymentRequestBody>, ApiError> {
    let payment_request = history.invoices.add_invoice(&memo).await.map_err(api_error)?;
    Ok(Json(PaymentRequestBody { payment_request }))
}

async fn add_standard_invoice_handler(
    State(history): State<Arc<PaymentHistory>>,
    Json(memo): Json<InvoiceMemo>,
) -> Result<Json<PaymentRequestBody>, ApiError> {
    let payment_request = history
        .invoices
        .add_standard_invoice(&memo)
        .await
        .map_err(api_error)?;
    Ok(Json(PaymentRequestBody { payment_request }))
}

async fn decode_handler(
    State(history): State<Arc<PaymentHistory>>,
    Json(req): Json<PaymentRequestBody>,
) -> Result<Json<InvoiceMemo>, ApiError> {
    history
        .invoices
        .decode_payment_request(&req.payment_request)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn related_handler(
    State(history): State<Arc<PaymentHistory>>,
    Json(req): Json<PaymentRequestBody>,
) -> Result<Json<RelatedInvoice>, ApiError> {
    history
        .invoices
        .related_invoice(&req.payment_request)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Server-sent stream of notification events. Lagged receivers skip ahead.
async fn events_handler(
    State(history): State<Arc<PaymentHistory>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(history.notifier.subscribe()).filter_map(|event| {
        let event = event.ok()?;
        Event::default().json_data(event).ok().map(Ok)
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
