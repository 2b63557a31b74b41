//! Stand-alone analysis handlers: fire-and-poll async analysis plus the
//! synchronous one-shot variant (spec §6.2 "Analyze backup").

use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Path as AxumPath, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use abs_import_contracts::ids::{AnalysisId, ForeignMediaId, ForeignUserId, LocalBookId, LocalUserId};
use abs_import_core::{analyze, parse_backup, AnalysisResult, AnalyzerConfig};

use crate::infra::{ApiResponse, AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub backup_path: String,
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

fn build_config(req: &AnalysisRequest) -> AnalyzerConfig {
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

#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub analysis_id: AnalysisId,
}

/// Parses the backup synchronously (cheap relative to matching) and hands
/// the matching pipeline off to a detached task tracked by
/// [`abs_import_core::ProgressTracker`], returning immediately with the id a
/// caller polls via [`get_analysis_handler`].
pub async fn start_analysis_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> AppResult<Json<ApiResponse<StartAnalysisResponse>>> {
    let config = build_config(&req);
    let backup = parse_backup(Path::new(&req.backup_path))?;

    let analysis_id = state.progress.start().await;
    let catalog = state.catalog.clone();
    let progress = state.progress.clone();

    tokio::spawn(async move {
        let result = analyze(
            &backup,
            catalog.as_ref(),
            &config,
            |phase, current, total| progress.try_update(analysis_id, phase, current, total),
            || false,
        )
        .await;

        match result {
            Ok(analysis) => progress.complete(analysis_id, analysis).await,
            Err(e) => progress.fail(analysis_id, e.to_string()).await,
        }
    });

    Ok(Json(ApiResponse::success(StartAnalysisResponse {
        analysis_id,
    })))
}

pub async fn get_analysis_handler(
    State(state): State<AppState>,
    AxumPath(analysis_id): AxumPath<Uuid>,
) -> AppResult<Json<ApiResponse<abs_import_core::ProgressSnapshot>>> {
    let snapshot = state
        .progress
        .get(AnalysisId::from(analysis_id))
        .await
        .ok_or_else(|| AppError::not_found("no analysis found for that id"))?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Synchronous one-shot analysis: parse and match inline, no tracker entry.
/// Cancellation is not wired to the request lifecycle — the analysis always
/// runs to completion once started.
pub async fn one_shot_analyze_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> AppResult<Json<ApiResponse<AnalysisResult>>> {
    let config = build_config(&req);
    let backup = parse_backup(Path::new(&req.backup_path))?;
    let result = analyze(&backup, state.catalog.as_ref(), &config, |_, _, _| {}, || false).await?;
    Ok(Json(ApiResponse::success(result)))
}
