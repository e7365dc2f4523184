//! §6 HTTP surface: `POST /api/v1/ingest`, `GET /api/v1/health`, and the
//! JSON-over-HTTP binding of the Query RPC (`POST /api/v1/query`), which
//! together with `push::push_ws` implement the transport-agnostic
//! `IngestService`/`QueryService` contracts from SPEC_FULL.md section E.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use hive_core::audit::{AuditEvent, AuditOperation, AuditOutcome, AuditSink};
use hive_core::auth::{authenticate, authenticate_optional};
use hive_core::error::HiveError;
use ingestion::api::IngestPayload;
use query::QueryRequest;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestPayload>,
) -> impl IntoResponse {
    let principal = match authenticate(state.api_keys.as_ref(), bearer_header(&headers)) {
        Ok(principal) => principal,
        Err(err) => return auth_error_response(err),
    };

    let (metadata, content) = match payload.into_metadata_and_text() {
        Ok(pair) => pair,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    };

    if metadata.tenant_id != principal.tenant_id {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "tenant_id does not match authenticated key" })),
        )
            .into_response();
    }

    let document_id = metadata.document_id.clone();
    let tenant_id = metadata.tenant_id.clone();
    let content_for_contradiction = content.clone();

    match state.ingest_coordinator.ingest(metadata, content).await {
        Ok(chunk_ids) => {
            // The coordinator itself writes the step-5 audit/event-log entries,
            // including for zero-chunk ingests, so nothing to do here.
            state.metrics.record_ingest(chunk_ids.len() as u64, 0);

            let detector = state.contradiction_detector.clone();
            tokio::spawn(async move {
                detector
                    .check_document(&document_id, &tenant_id, &content_for_contradiction)
                    .await;
            });

            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "chunks_total": chunk_ids.len(),
                    "chunks_stored": chunk_ids.len(),
                })),
            )
                .into_response()
        }
        Err(err) => {
            let audit_tenant = if tenant_id.trim().is_empty() { "unknown".to_string() } else { tenant_id };
            if let Ok(event) = AuditEvent::new(AuditOperation::Ingest, AuditOutcome::Failed, audit_tenant) {
                let _ = state.audit.record(event);
            }
            error_response(&err)
        }
    }
}

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(mut request): Json<QueryRequest>,
) -> impl IntoResponse {
    let principal = match authenticate(state.api_keys.as_ref(), bearer_header(&headers)) {
        Ok(principal) => principal,
        Err(err) => return auth_error_response(err),
    };
    request.tenant_id = principal.tenant_id.clone();

    match state.query_engine.execute(request).await {
        Ok(response) => {
            let _ = state.audit.record(
                AuditEvent::new(AuditOperation::Query, AuditOutcome::Succeeded, principal.tenant_id).unwrap(),
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub async fn health_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    match authenticate_optional(state.api_keys.as_ref(), bearer_header(&headers), Utc::now()) {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "up", "version": "1.0" })),
        )
            .into_response(),
        Err(hive_core::auth::AuthError::KeyDisabled) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "key_disabled", "status": "key_disabled" })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct PurgeParams {
    /// Omitted means "purge everything" — §4.15 requires the caller be an
    /// elevated administrative key in that case.
    tenant_id: Option<String>,
}

pub async fn purge_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<PurgeParams>,
) -> impl IntoResponse {
    let principal = match authenticate(state.api_keys.as_ref(), bearer_header(&headers)) {
        Ok(principal) => principal,
        Err(err) => return auth_error_response(err),
    };

    let scope = match &params.tenant_id {
        Some(tenant_id) => {
            if tenant_id != &principal.tenant_id && !principal.is_admin {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "cannot purge another tenant" })),
                )
                    .into_response();
            }
            Some(tenant_id.as_str())
        }
        None => {
            if !principal.is_admin {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "unscoped purge requires an administrative key" })),
                )
                    .into_response();
            }
            None
        }
    };

    let audit_tenant = scope.unwrap_or("*").to_string();
    match state.ingest_coordinator.purge(scope).await {
        Ok(counts) => {
            let _ = state.audit.record(
                AuditEvent::new(AuditOperation::Purge, AuditOutcome::Succeeded, audit_tenant)
                    .expect("audit_tenant is never empty"),
            );
            (StatusCode::OK, Json(counts)).into_response()
        }
        Err(err) => {
            let _ = state.audit.record(
                AuditEvent::new(AuditOperation::Purge, AuditOutcome::Failed, audit_tenant)
                    .expect("audit_tenant is never empty"),
            );
            error_response(&err)
        }
    }
}

fn auth_error_response(err: hive_core::auth::AuthError) -> axum::response::Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": err.to_string() }))).into_response()
}

fn error_response(err: &dyn HiveError) -> axum::response::Response {
    use hive_core::error::ErrorCode;
    let status = match err.error_code() {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
