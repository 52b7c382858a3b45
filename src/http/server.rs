//! HTTP server setup and request handlers.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request-id, timeout, body limit, trace)
//! - Map typed record errors to HTTP status codes
//! - Serve until the shutdown signal fires, then drain

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::attendance::model::RecordRequest;
use crate::attendance::recorder::{AttendanceRecorder, BulkOutcome, RecordError};
use crate::attendance::store::{AttendanceStore, RecordFilter};
use crate::config::schema::AppConfig;
use crate::resilience::registry::DependencyRegistry;
use crate::resilience::timeouts::TimeoutPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<AttendanceRecorder>,
    pub registry: Arc<DependencyRegistry>,
    pub store: Arc<dyn AttendanceStore>,
}

/// HTTP server for the attendance service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and state.
    pub fn new(config: &AppConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let timeouts = TimeoutPolicy::from_config(config);
        Router::new()
            .route("/", get(health))
            .route("/api/attendance", post(record_attendance).get(list_records))
            .route("/api/attendance/bulk", post(record_bulk))
            .route("/api/attendance/student/{student_id}", get(student_summary))
            .route("/api/attendance/course/{course_id}", get(course_summary))
            .route("/api/attendance/circuit-breakers", get(circuit_breakers))
            .route(
                "/api/attendance/circuit-breakers/reset",
                post(reset_circuit_breakers),
            )
            .route("/api/attendance/bulkheads", get(bulkhead_stats))
            .with_state(state)
            .layer(TimeoutLayer::new(timeouts.request))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve connections until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await
    }
}

#[derive(Serialize)]
struct HealthDoc {
    service: &'static str,
    status: &'static str,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthDoc> {
    // An open circuit means writes are being rejected as retryable.
    let status = if state.registry.any_open() {
        "degraded"
    } else {
        "healthy"
    };
    Json(HealthDoc {
        service: "Attendance Recording Service",
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Response body for a single record operation.
#[derive(Serialize)]
struct RecordResponse {
    message: &'static str,
    record_id: Uuid,
    duplicate: bool,
    student_id: String,
    course_id: String,
    date: NaiveDate,
    status: String,
}

async fn record_attendance(
    State(state): State<AppState>,
    Json(request): Json<RecordRequest>,
) -> Result<Response, RecordError> {
    let student_id = request.student_id.clone();
    let course_id = request.course_id.clone();
    let date = request.date;
    let status = request.status;

    let outcome = state.recorder.record_attendance(request).await?;

    let (code, message) = if outcome.duplicate {
        (StatusCode::OK, "Already recorded")
    } else {
        (StatusCode::CREATED, "Recorded successfully")
    };

    Ok((
        code,
        Json(RecordResponse {
            message,
            record_id: outcome.record_id,
            duplicate: outcome.duplicate,
            student_id,
            course_id,
            date,
            status: status.as_str().to_string(),
        }),
    )
        .into_response())
}

#[derive(Deserialize)]
struct BulkRequest {
    records: Vec<RecordRequest>,
}

async fn record_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkOutcome>, RecordError> {
    if request.records.is_empty() {
        return Err(RecordError::Invalid("no records provided".into()));
    }
    Ok(Json(state.recorder.record_bulk(request.records).await))
}

async fn list_records(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Response, RecordError> {
    let records = state.store.query(&filter).await?;
    Ok(Json(records).into_response())
}

#[derive(Deserialize)]
struct StudentSummaryQuery {
    course_id: Option<String>,
}

async fn student_summary(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<StudentSummaryQuery>,
) -> Result<Response, RecordError> {
    let summary = state
        .store
        .student_summary(&student_id, query.course_id.as_deref())
        .await?;
    Ok(Json(summary).into_response())
}

#[derive(Deserialize)]
struct CourseSummaryQuery {
    date: Option<NaiveDate>,
}

async fn course_summary(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(query): Query<CourseSummaryQuery>,
) -> Result<Response, RecordError> {
    let summary = state.store.course_summary(&course_id, query.date).await?;
    Ok(Json(summary).into_response())
}

async fn circuit_breakers(State(state): State<AppState>) -> Response {
    Json(state.registry.all_circuits()).into_response()
}

async fn reset_circuit_breakers(State(state): State<AppState>) -> Response {
    state.registry.reset_all();
    Json(serde_json::json!({ "message": "circuit breakers reset" })).into_response()
}

async fn bulkhead_stats(State(state): State<AppState>) -> Response {
    Json(state.registry.pool_stats()).into_response()
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecordError::Invalid(_) | RecordError::EntityNotFound { .. } => StatusCode::BAD_REQUEST,
            RecordError::BulkheadFull(_) => StatusCode::TOO_MANY_REQUESTS,
            RecordError::CircuitOpen(_) | RecordError::DependencyUnreachable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RecordError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let retry_after_secs = match &self {
            RecordError::CircuitOpen(e) => Some(e.retry_in.as_secs().max(1)),
            RecordError::DependencyUnreachable { .. } => Some(1),
            _ => None,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "retryable": self.retryable(),
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
