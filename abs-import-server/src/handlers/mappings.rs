//! Imported-user and imported-book listing and mapping-edit handlers.

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId, ImportId, LocalBookId, LocalUserId};
use abs_import_contracts::store::DomainEvent;
use abs_import_core::import::{set_book_mapping, set_user_mapping, EntityFilter, ImportedBook, ImportedUser};

use crate::infra::{ApiResponse, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

fn parse_entity_filter(raw: Option<&str>) -> EntityFilter {
    match raw {
        Some("mapped") => EntityFilter::Mapped,
        Some("unmapped") => EntityFilter::Unmapped,
        _ => EntityFilter::All,
    }
}

pub async fn list_imported_users_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Query(query): Query<FilterQuery>,
) -> AppResult<Json<ApiResponse<Vec<ImportedUser>>>> {
    let filter = parse_entity_filter(query.filter.as_deref());
    let users = state
        .imports
        .list_imported_users(ImportId::from(id), filter)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

#[derive(Debug, Deserialize)]
pub struct MapUserRequest {
    pub local_user_id: Option<Uuid>,
}

pub async fn map_user_handler(
    State(state): State<AppState>,
    AxumPath((id, foreign_user_id)): AxumPath<(Uuid, String)>,
    Json(req): Json<MapUserRequest>,
) -> AppResult<Json<ApiResponse<ImportedUser>>> {
    let import_id = ImportId::from(id);
    let foreign_user_id = ForeignUserId::from(foreign_user_id);
    let local_user_id = req.local_user_id.map(LocalUserId::from);

    let user = set_user_mapping(
        state.imports.as_ref(),
        state.catalog.as_ref(),
        import_id,
        &foreign_user_id,
        local_user_id,
    )
    .await?;
    state
        .catalog
        .notify(DomainEvent::MappingChanged { import_id })
        .await;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn list_imported_books_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Query(query): Query<FilterQuery>,
) -> AppResult<Json<ApiResponse<Vec<ImportedBook>>>> {
    let filter = parse_entity_filter(query.filter.as_deref());
    let books = state
        .imports
        .list_imported_books(ImportId::from(id), filter)
        .await?;
    Ok(Json(ApiResponse::success(books)))
}

#[derive(Debug, Deserialize)]
pub struct MapBookRequest {
    pub local_book_id: Option<Uuid>,
}

pub async fn map_book_handler(
    State(state): State<AppState>,
    AxumPath((id, foreign_media_id)): AxumPath<(Uuid, String)>,
    Json(req): Json<MapBookRequest>,
) -> AppResult<Json<ApiResponse<ImportedBook>>> {
    let import_id = ImportId::from(id);
    let foreign_media_id = ForeignMediaId::from(foreign_media_id);
    let local_book_id = req.local_book_id.map(LocalBookId::from);

    let book = set_book_mapping(
        state.imports.as_ref(),
        state.catalog.as_ref(),
        import_id,
        &foreign_media_id,
        local_book_id,
    )
    .await?;
    state
        .catalog
        .notify(DomainEvent::MappingChanged { import_id })
        .await;
    Ok(Json(ApiResponse::success(book)))
}
