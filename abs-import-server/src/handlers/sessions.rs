//! Imported-session listing and skip handlers.

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use abs_import_contracts::ids::{ForeignSessionId, ImportId};
use abs_import_core::import::{skip_session, ImportedSession, SessionFilter, SessionStatus};

use crate::infra::{ApiResponse, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SessionFilterQuery {
    #[serde(default)]
    pub status: Option<String>,
}

fn parse_session_filter(raw: Option<&str>) -> SessionFilter {
    match raw {
        Some("pending") => SessionFilter::Pending,
        Some("ready") => SessionFilter::Ready,
        Some("imported") => SessionFilter::Imported,
        Some("skipped") => SessionFilter::Skipped,
        _ => SessionFilter::All,
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SessionStatusCounts {
    pub pending: usize,
    pub ready: usize,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<ImportedSession>,
    pub summary: SessionStatusCounts,
}

pub async fn list_imported_sessions_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Query(query): Query<SessionFilterQuery>,
) -> AppResult<Json<ApiResponse<SessionListResponse>>> {
    let filter = parse_session_filter(query.status.as_deref());
    let sessions = state
        .imports
        .list_imported_sessions(ImportId::from(id), filter)
        .await?;

    let mut summary = SessionStatusCounts::default();
    for session in &sessions {
        match session.status {
            SessionStatus::PendingUser | SessionStatus::PendingBook => summary.pending += 1,
            SessionStatus::Ready => summary.ready += 1,
            SessionStatus::Imported => summary.imported += 1,
            SessionStatus::Skipped => summary.skipped += 1,
        }
    }

    Ok(Json(ApiResponse::success(SessionListResponse { sessions, summary })))
}

#[derive(Debug, Deserialize)]
pub struct SkipSessionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn skip_session_handler(
    State(state): State<AppState>,
    AxumPath((id, foreign_session_id)): AxumPath<(Uuid, String)>,
    Json(req): Json<SkipSessionRequest>,
) -> AppResult<Json<ApiResponse<ImportedSession>>> {
    let import_id = ImportId::from(id);
    let foreign_session_id = ForeignSessionId::from(foreign_session_id);
    let session = skip_session(state.imports.as_ref(), import_id, &foreign_session_id, req.reason).await?;
    Ok(Json(ApiResponse::success(session)))
}
