//! Creation path and mapping edits for the Import aggregate (spec §4.5).
//!
//! Both entry points persist best-effort: a single child row failing to
//! store is logged and skipped rather than aborting the whole operation,
//! per the subsystem's propagation policy.

use abs_import_contracts::ids::{
    ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId, LocalBookId, LocalUserId,
};
use abs_import_contracts::store::CatalogStore;
use tracing::warn;

use crate::analyzer::{analyze, AnalyzerConfig};
use crate::error::{ImportError, Result};
use crate::parser::ParsedBackup;

use super::model::{
    Import, ImportedBook, ImportedProgress, ImportedSession, ImportedUser, ImportStatus,
    ProgressStatus, SessionStatus,
};
use super::recalculator::recalculate;
use super::repository::ImportRepository;

/// Runs the full creation path: analyze the already-parsed backup with
/// default settings, persist the parent record and every child row, then
/// recalculate statuses and transition to `active`.
pub async fn create_import(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    backup_path: String,
    name: Option<String>,
    backup: &ParsedBackup,
) -> Result<Import> {
    create_import_with_config(repo, catalog, backup_path, name, backup, AnalyzerConfig::default()).await
}

/// Same creation path as [`create_import`], but with caller-supplied matcher
/// settings — used by the legacy one-shot import entry point, which accepts
/// explicit user/book mappings alongside the archive.
pub async fn create_import_with_config(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    backup_path: String,
    name: Option<String>,
    backup: &ParsedBackup,
    config: AnalyzerConfig,
) -> Result<Import> {
    let analysis = analyze(backup, catalog, &config, |_, _, _| {}, || false).await?;

    let import_id = ImportId::new();
    let name = name.unwrap_or_else(|| backup_path.clone());
    let mut import = Import::new(import_id, name, backup_path);
    import.totals.users = analysis.users.len();
    import.totals.books = analysis.books.len();
    import.totals.sessions = backup.sessions.len();

    if let Err(e) = repo.create_import(import.clone()).await {
        return Err(ImportError::from(e));
    }

    let mut users_mapped = 0usize;
    for decision in &analysis.users {
        let (local_user_id, local_email, local_display_name, mapped_at) =
            if decision.decision.confidence.auto_accepts() {
                if let Some(local_id) = decision.decision.local_id {
                    match catalog.get_user(local_id).await {
                        Ok(Some(user)) => (
                            Some(local_id),
                            Some(user.email),
                            Some(user.display_name),
                            Some(chrono::Utc::now()),
                        ),
                        _ => (None, None, None, None),
                    }
                } else {
                    (None, None, None, None)
                }
            } else {
                (None, None, None, None)
            };

        let imported_user = ImportedUser {
            import_id,
            foreign_user_id: decision.foreign_user_id.clone(),
            foreign_username: decision.foreign_username.clone(),
            foreign_email: decision.foreign_email.clone(),
            local_user_id,
            local_email,
            local_display_name,
            session_count: 0,
            total_listen_ms: 0,
            confidence: decision.decision.confidence,
            match_reason: decision.decision.reason.clone(),
            suggestions: decision.decision.suggestions.iter().map(|s| s.local_id).collect(),
            mapped_at,
        };

        match repo.upsert_imported_user(imported_user).await {
            Ok(()) => {
                if local_user_id.is_some() {
                    users_mapped += 1;
                }
            }
            Err(e) => warn!(%import_id, foreign_user_id = %decision.foreign_user_id, error = %e, "failed to persist imported user"),
        }
    }

    for user in &backup.users {
        for progress in &user.progress {
            let entry = ImportedProgress {
                import_id,
                foreign_user_id: user.id.clone(),
                foreign_media_id: progress.abs_media_id.clone(),
                current_time_ms: progress.current_time_ms,
                duration_ms: progress.duration_ms,
                fraction: progress.fraction,
                is_finished: progress.is_finished,
                last_update_ms: progress.last_update_ms,
                finished_at_ms: progress.finished_at_ms,
                status: ProgressStatus::PendingBook,
            };
            if let Err(e) = repo.upsert_imported_progress(entry).await {
                warn!(%import_id, foreign_user_id = %user.id, error = %e, "failed to persist imported progress");
            }
        }
    }

    let mut books_mapped = 0usize;
    for decision in &analysis.books {
        let (local_book_id, local_title, local_author, mapped_at) =
            if decision.decision.confidence.auto_accepts() {
                if let Some(local_id) = decision.decision.local_id {
                    match catalog.get_book(local_id).await {
                        Ok(Some(book)) => (
                            Some(local_id),
                            Some(book.title),
                            Some(book.primary_author),
                            Some(chrono::Utc::now()),
                        ),
                        _ => (None, None, None, None),
                    }
                } else {
                    (None, None, None, None)
                }
            } else {
                (None, None, None, None)
            };

        let imported_book = ImportedBook {
            import_id,
            foreign_media_id: decision.foreign_media_id.clone(),
            foreign_title: decision.foreign_title.clone(),
            foreign_author: decision.foreign_author.clone(),
            foreign_duration_ms: decision.foreign_duration_ms,
            foreign_asin: decision.foreign_asin.clone(),
            foreign_isbn: decision.foreign_isbn.clone(),
            local_book_id,
            local_title,
            local_author,
            session_count: 0,
            confidence: decision.decision.confidence,
            match_reason: decision.decision.reason.clone(),
            suggestions: decision.decision.suggestions.iter().map(|s| s.local_id).collect(),
            mapped_at,
        };

        match repo.upsert_imported_book(imported_book).await {
            Ok(()) => {
                if local_book_id.is_some() {
                    books_mapped += 1;
                }
            }
            Err(e) => warn!(%import_id, foreign_media_id = %decision.foreign_media_id, error = %e, "failed to persist imported book"),
        }
    }

    let mut unnormalized_sessions = 0usize;
    for session in &backup.sessions {
        let normalized_media_id = analysis
            .book_key_lookup
            .get(session.library_item_id.as_str())
            .cloned()
            .unwrap_or_else(|| {
                unnormalized_sessions += 1;
                session.library_item_id.clone()
            });

        let imported_session = ImportedSession {
            import_id,
            foreign_session_id: session.id.clone(),
            foreign_user_id: session.user_id.clone(),
            foreign_media_id: normalized_media_id,
            started_at_ms: session.started_at_ms,
            duration_ms: session.duration_ms,
            start_position_ms: session.start_position_ms,
            end_position_ms: session.end_position_ms,
            status: SessionStatus::PendingUser,
            imported_at: None,
            skip_reason: None,
        };

        if let Err(e) = repo.upsert_imported_session(imported_session).await {
            warn!(%import_id, foreign_session_id = %session.id, error = %e, "failed to persist imported session");
        }
    }

    if unnormalized_sessions > 0 {
        warn!(
            %import_id,
            count = unnormalized_sessions,
            "sessions referenced a foreign book id absent from this backup's library items"
        );
    }

    recalculate(repo, import_id).await;

    import.mapped.users = users_mapped;
    import.mapped.books = books_mapped;
    import.status = ImportStatus::Active;
    import.updated_at = chrono::Utc::now();

    repo.update_import(import.clone()).await.map_err(ImportError::from)?;

    Ok(import)
}

/// Sets or clears the local user mapped onto a foreign user. Idempotent:
/// re-applying the same target bumps `mapped_at`/`updated_at` but changes
/// nothing else observable.
pub async fn set_user_mapping(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    import_id: ImportId,
    foreign_user_id: &ForeignUserId,
    local_user_id: Option<LocalUserId>,
) -> Result<ImportedUser> {
    let mut entry = repo
        .get_imported_user(import_id, foreign_user_id)
        .await
        .map_err(ImportError::from)?;

    match local_user_id {
        Some(id) => {
            let user = catalog
                .get_user(id)
                .await
                .map_err(ImportError::from)?
                .ok_or_else(|| ImportError::Validation(format!("unknown local user {id}")))?;
            entry.local_user_id = Some(id);
            entry.local_email = Some(user.email);
            entry.local_display_name = Some(user.display_name);
            entry.mapped_at = Some(chrono::Utc::now());
        }
        None => {
            entry.local_user_id = None;
            entry.local_email = None;
            entry.local_display_name = None;
            entry.mapped_at = None;
        }
    }

    repo.upsert_imported_user(entry.clone())
        .await
        .map_err(ImportError::from)?;
    recalculate(repo, import_id).await;
    refresh_stats(repo, import_id).await;

    Ok(entry)
}

pub async fn set_book_mapping(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    import_id: ImportId,
    foreign_media_id: &ForeignMediaId,
    local_book_id: Option<LocalBookId>,
) -> Result<ImportedBook> {
    let mut entry = repo
        .get_imported_book(import_id, foreign_media_id)
        .await
        .map_err(ImportError::from)?;

    match local_book_id {
        Some(id) => {
            let book = catalog
                .get_book(id)
                .await
                .map_err(ImportError::from)?
                .ok_or_else(|| ImportError::Validation(format!("unknown local book {id}")))?;
            entry.local_book_id = Some(id);
            entry.local_title = Some(book.title);
            entry.local_author = Some(book.primary_author);
            entry.mapped_at = Some(chrono::Utc::now());
        }
        None => {
            entry.local_book_id = None;
            entry.local_title = None;
            entry.local_author = None;
            entry.mapped_at = None;
        }
    }

    repo.upsert_imported_book(entry.clone())
        .await
        .map_err(ImportError::from)?;
    recalculate(repo, import_id).await;
    refresh_stats(repo, import_id).await;

    Ok(entry)
}

/// Marks a session terminally `skipped`, bypassing whatever the recalculator
/// would otherwise derive for it. Idempotent: skipping an already-skipped
/// session just overwrites the reason.
pub async fn skip_session(
    repo: &(dyn ImportRepository),
    import_id: ImportId,
    foreign_session_id: &ForeignSessionId,
    reason: Option<String>,
) -> Result<ImportedSession> {
    let mut session = repo
        .get_imported_session(import_id, foreign_session_id)
        .await
        .map_err(ImportError::from)?;

    if session.status == SessionStatus::Imported {
        return Err(ImportError::Conflict(format!(
            "session {foreign_session_id} is already imported and cannot be skipped"
        )));
    }

    session.status = SessionStatus::Skipped;
    session.skip_reason = Some(reason.unwrap_or_else(|| "skipped by administrator".into()));

    repo.upsert_imported_session(session.clone())
        .await
        .map_err(ImportError::from)?;

    Ok(session)
}

async fn refresh_stats(repo: &(dyn ImportRepository), import_id: ImportId) {
    let Ok(mut import) = repo.get_import(import_id).await else {
        warn!(%import_id, "failed to reload import while refreshing stats");
        return;
    };

    let users_mapped = repo
        .list_imported_users(import_id, super::repository::EntityFilter::Mapped)
        .await
        .map(|v| v.len())
        .unwrap_or(import.mapped.users);
    let books_mapped = repo
        .list_imported_books(import_id, super::repository::EntityFilter::Mapped)
        .await
        .map(|v| v.len())
        .unwrap_or(import.mapped.books);

    import.mapped.users = users_mapped;
    import.mapped.books = books_mapped;
    import.updated_at = chrono::Utc::now();

    if let Err(e) = repo.update_import(import).await {
        warn!(%import_id, error = %e, "failed to persist refreshed import stats");
    }
}
