//! Upload reconciliation API handlers
//!
//! POST /uploads/discover, GET /uploads/sessions, GET /uploads/sessions/:id,
//! POST /uploads/sessions/:id/confirm, POST /uploads/sessions/:id/cancel

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::sessions;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ConfirmationPayload, ConfirmationSummary, SessionStatus, SessionSummary, UploadKind, UploadMetadata,
    UploadSession,
};
use crate::services::{discover_upload, ConfirmationCommitter, DiscoveryResponse};
use crate::AppState;

/// Largest accepted upload body
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// GET /uploads/sessions query
#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// POST /uploads/sessions/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub session_id: Uuid,
    /// False when the session had already left `pending_review`
    pub cancelled: bool,
}

fn text_field(name: &str, value: String) -> ApiResult<Option<String>> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() > 1024 {
        return Err(ApiError::BadRequest(format!("Field '{}' is too long", name)));
    }
    Ok(Some(value))
}

fn parse_kind(name: &str, value: &str) -> ApiResult<UploadKind> {
    UploadKind::parse(value).ok_or_else(|| ApiError::BadRequest(format!("Invalid {}: '{}'", name, value)))
}

/// POST /uploads/discover
///
/// Multipart fields: `file`, `file_kind`, `report_date` (YYYY-MM-DD), and
/// optional `market_id`, `uploaded_by`, `expected_kind`.
pub async fn discover(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<DiscoveryResponse>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut file_kind: Option<UploadKind> = None;
    let mut report_date: Option<NaiveDate> = None;
    let mut market_id: Option<i64> = None;
    let mut uploaded_by: Option<String> = None;
    let mut expected_kind: Option<UploadKind> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.xlsx").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
            file = Some((filename, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field '{}': {}", name, e)))?;
        let Some(value) = text_field(&name, value)? else {
            continue;
        };

        match name.as_str() {
            "file_kind" => file_kind = Some(parse_kind("file_kind", &value)?),
            "expected_kind" => expected_kind = Some(parse_kind("expected_kind", &value)?),
            "report_date" => {
                report_date = Some(
                    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                        .map_err(|_| ApiError::BadRequest(format!("Invalid report_date: '{}'", value)))?,
                )
            }
            "market_id" => {
                market_id = Some(
                    value
                        .parse()
                        .map_err(|_| ApiError::BadRequest(format!("Invalid market_id: '{}'", value)))?,
                )
            }
            "uploaded_by" => uploaded_by = Some(value),
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    let file_kind = file_kind.ok_or_else(|| ApiError::BadRequest("Missing file_kind".to_string()))?;

    let metadata = UploadMetadata {
        filename,
        file_kind,
        report_date,
        market_id,
        uploaded_by,
    };

    let response = discover_upload(&state.db, metadata, expected_kind, &bytes).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /uploads/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            SessionStatus::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid status: '{}'", raw)))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    Ok(Json(sessions::list_sessions(&state.db, status, limit).await?))
}

/// GET /uploads/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<UploadSession>> {
    Ok(Json(sessions::get_session(&state.db, session_id).await?))
}

/// POST /uploads/sessions/:id/confirm
pub async fn confirm_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ConfirmationPayload>,
) -> ApiResult<Json<ConfirmationSummary>> {
    let committer = ConfirmationCommitter::new(state.db.clone());
    Ok(Json(committer.confirm(session_id, payload).await?))
}

/// POST /uploads/sessions/:id/cancel
///
/// Idempotent: cancelling a terminal session reports `cancelled: false`.
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    // Surface 404 for unknown ids rather than a silent no-op
    let session = sessions::get_session(&state.db, session_id).await?;

    let cancelled = session.status.can_transition_to(SessionStatus::Cancelled)
        && sessions::cancel_session(&state.db, session_id).await? == 1;
    tracing::info!(session_id = %session_id, cancelled, "Cancel requested");

    Ok(Json(CancelResponse { session_id, cancelled }))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/uploads/discover",
            post(discover).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/uploads/sessions", get(list_sessions))
        .route("/uploads/sessions/:id", get(get_session))
        .route("/uploads/sessions/:id/confirm", post(confirm_session))
        .route("/uploads/sessions/:id/cancel", post(cancel_session))
}
