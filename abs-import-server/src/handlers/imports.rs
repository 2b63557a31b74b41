//! Import lifecycle handlers: create, list, get, delete, execute, and the
//! legacy one-shot entry point (spec §6.2).

use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Path as AxumPath, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId, ImportId, LocalBookId, LocalUserId};
use abs_import_contracts::store::DomainEvent;
use abs_import_core::import::{create_import, create_import_with_config, Import};
use abs_import_core::{execute, parse_backup, AnalyzerConfig, ExecutionReport};

use crate::infra::{ApiResponse, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateImportRequest {
    pub backup_path: String,
    pub name: Option<String>,
}

pub async fn create_import_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateImportRequest>,
) -> AppResult<Json<ApiResponse<Import>>> {
    let backup = parse_backup(Path::new(&req.backup_path))?;
    let import = create_import(
        state.imports.as_ref(),
        state.catalog.as_ref(),
        req.backup_path,
        req.name,
        &backup,
    )
    .await?;
    state
        .catalog
        .notify(DomainEvent::ImportCreated { import_id: import.id })
        .await;
    Ok(Json(ApiResponse::success(import)))
}

pub async fn list_imports_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Import>>>> {
    let imports = state.imports.list_imports().await?;
    Ok(Json(ApiResponse::success(imports)))
}

pub async fn get_import_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> AppResult<Json<ApiResponse<Import>>> {
    let import = state.imports.get_import(ImportId::from(id)).await?;
    Ok(Json(ApiResponse::success(import)))
}

#[derive(Debug, Serialize)]
pub struct DeleteAck {
    pub deleted: bool,
}

pub async fn delete_import_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> AppResult<Json<ApiResponse<DeleteAck>>> {
    state.imports.delete_import(ImportId::from(id)).await?;
    Ok(Json(ApiResponse::success(DeleteAck { deleted: true })))
}

pub async fn execute_import_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> AppResult<Json<ApiResponse<ExecutionReport>>> {
    let import_id = ImportId::from(id);
    let report = execute(state.imports.as_ref(), state.catalog.as_ref(), import_id).await?;
    if !report.is_noop() {
        state
            .catalog
            .notify(DomainEvent::ExecutionCompleted { import_id })
            .await;
    }
    Ok(Json(ApiResponse::success(report)))
}

/// Request body for the legacy one-shot import path: parse, analyze with
/// caller-supplied overrides, persist, and execute in a single call.
#[derive(Debug, Deserialize)]
pub struct LegacyImportRequest {
    pub backup_path: String,
    pub name: Option<String>,
    #[serde(default)]
    pub match_by_email: Option<bool>,
    #[serde(default)]
    pub match_by_path: Option<bool>,
    #[serde(default)]
    pub fuzzy_match_books: Option<bool>,
    #[serde(default)]
    pub fuzzy_threshold: Option<f64>,
    #[serde(default)]
    pub fuzzy_margin: Option<f64>,
    #[serde(default)]
    pub path_suffix_segments: Option<usize>,
    #[serde(default)]
    pub user_mappings: HashMap<String, Uuid>,
    #[serde(default)]
    pub book_mappings: HashMap<String, Uuid>,
}

#[derive(Debug, Serialize)]
pub struct LegacyImportResponse {
    pub import: Import,
    pub report: ExecutionReport,
}

fn config_from_legacy_request(req: &LegacyImportRequest) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    if let Some(v) = req.match_by_email {
        config.match_by_email = v;
    }
    if let Some(v) = req.match_by_path {
        config.match_by_path = v;
    }
    if let Some(v) = req.fuzzy_match_books {
        config.fuzzy_match_books = v;
    }
    if let Some(v) = req.fuzzy_threshold {
        config.fuzzy_threshold = v;
    }
    if let Some(v) = req.fuzzy_margin {
        config.fuzzy_margin = v;
    }
    if let Some(v) = req.path_suffix_segments {
        config.path_suffix_segments = v;
    }
    config.user_mappings = req
        .user_mappings
        .iter()
        .map(|(foreign, local)| (ForeignUserId::from(foreign.clone()), LocalUserId::from(*local)))
        .collect();
    config.book_mappings = req
        .book_mappings
        .iter()
        .map(|(foreign, local)| (ForeignMediaId::from(foreign.clone()), LocalBookId::from(*local)))
        .collect();
    config
}

pub async fn legacy_import_handler(
    State(state): State<AppState>,
    Json(req): Json<LegacyImportRequest>,
) -> AppResult<Json<ApiResponse<LegacyImportResponse>>> {
    let config = config_from_legacy_request(&req);
    let backup = parse_backup(Path::new(&req.backup_path))?;
    let import = create_import_with_config(
        state.imports.as_ref(),
        state.catalog.as_ref(),
        req.backup_path,
        req.name,
        &backup,
        config,
    )
    .await?;

    let report = execute(state.imports.as_ref(), state.catalog.as_ref(), import.id).await?;

    Ok(Json(ApiResponse::success(LegacyImportResponse {
        import,
        report,
    })))
}
