//! Executor (spec §4.7): turns `ready` sessions and reconciled progress
//! entries into durable listening history, rebuilt playback state, and
//! per-(user, book) reading sessions.
//!
//! Not transactional across sessions by design — a partial run is useful
//! and safely resumable, since already-`imported` sessions are skipped on
//! the next invocation.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId, ImportId, LocalBookId, LocalUserId};
use abs_import_contracts::store::{CatalogStore, ListeningEvent, PlaybackStateRecord, ReadingSessionRecord};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::import::{
    EntityFilter, ImportRepository, ImportStatus, ImportedBook, ImportedProgress, ProgressStatus,
    SessionFilter, SessionStatus,
};

const FINISHED_CARRY_THRESHOLD: f64 = 0.99;
const DURATION_CLAMP_FRACTION: f64 = 0.98;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub sessions_imported: usize,
    pub sessions_failed: usize,
    pub events_created: usize,
    pub progress_rebuilt: usize,
    pub progress_failed: usize,
    pub abs_progress_unmatched: usize,
    pub reading_sessions_created: usize,
    pub reading_sessions_skipped: usize,
    pub duration: std::time::Duration,
}

impl ExecutionReport {
    /// True when the run touched nothing: no events, no playback-state
    /// rebuilds, and no reading sessions. A convenience for the admin
    /// surface to short-circuit a "nothing to do" response; it changes no
    /// executor semantics.
    pub fn is_noop(&self) -> bool {
        self.events_created == 0 && self.progress_rebuilt == 0 && self.reading_sessions_created == 0
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Runs the executor once for `import_id`. Aborts only if the mapping
/// tables themselves fail to load; every per-item failure is logged and
/// counted instead.
pub async fn execute(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    import_id: ImportId,
) -> Result<ExecutionReport> {
    let start = Instant::now();
    let mut report = ExecutionReport::default();

    let mapped_users = repo
        .list_imported_users(import_id, EntityFilter::Mapped)
        .await
        .map_err(crate::error::ImportError::from)?;
    let mapped_books = repo
        .list_imported_books(import_id, EntityFilter::Mapped)
        .await
        .map_err(crate::error::ImportError::from)?;

    let user_map: HashMap<ForeignUserId, LocalUserId> = mapped_users
        .iter()
        .filter_map(|u| u.local_user_id.map(|id| (u.foreign_user_id.clone(), id)))
        .collect();
    let book_map: HashMap<ForeignMediaId, LocalBookId> = mapped_books
        .iter()
        .filter_map(|b| b.local_book_id.map(|id| (b.foreign_media_id.clone(), id)))
        .collect();
    let book_by_local: HashMap<LocalBookId, &ImportedBook> = mapped_books
        .iter()
        .filter_map(|b| b.local_book_id.map(|id| (id, b)))
        .collect();
    let local_book_durations: HashMap<LocalBookId, i64> = catalog
        .list_books()
        .await
        .map_err(crate::error::ImportError::from)?
        .into_iter()
        .map(|b| (b.id, b.duration_ms))
        .collect();

    let ready_sessions = repo
        .list_imported_sessions(import_id, SessionFilter::Ready)
        .await
        .map_err(crate::error::ImportError::from)?;

    let mut affected: HashSet<(LocalUserId, LocalBookId, ForeignUserId, ForeignMediaId)> = HashSet::new();

    for mut session in ready_sessions {
        let (Some(local_user_id), Some(local_book_id)) = (
            user_map.get(&session.foreign_user_id).copied(),
            book_map.get(&session.foreign_media_id).copied(),
        ) else {
            report.sessions_failed += 1;
            warn!(
                %import_id,
                foreign_session_id = %session.foreign_session_id,
                "ready session had no resolvable mapping at execution time"
            );
            continue;
        };

        let event = ListeningEvent {
            id: Uuid::new_v4(),
            user_id: local_user_id,
            book_id: local_book_id,
            start_position_ms: session.start_position_ms,
            end_position_ms: session.end_position_ms,
            duration_ms: session.duration_ms,
            device_id: "abs-import".into(),
            device_name: "ABS Import".into(),
            started_at: millis_to_datetime(session.started_at_ms),
            ended_at: millis_to_datetime(session.started_at_ms) + chrono::Duration::milliseconds(session.duration_ms),
            playback_speed: 1.0,
            created_at: Utc::now(),
        };

        match catalog.append_event(event).await {
            Ok(()) => {
                report.events_created += 1;
                affected.insert((
                    local_user_id,
                    local_book_id,
                    session.foreign_user_id.clone(),
                    session.foreign_media_id.clone(),
                ));
            }
            Err(e) => {
                report.sessions_failed += 1;
                error!(%import_id, foreign_session_id = %session.foreign_session_id, error = %e, "failed to append listening event");
                continue;
            }
        }

        session.status = SessionStatus::Imported;
        session.imported_at = Some(Utc::now());
        if let Err(e) = repo.upsert_imported_session(session.clone()).await {
            error!(%import_id, foreign_session_id = %session.foreign_session_id, error = %e, "failed to mark session imported");
        } else {
            report.sessions_imported += 1;
        }
    }

    let progress_entries = repo
        .list_imported_progress(import_id, EntityFilter::All)
        .await
        .map_err(crate::error::ImportError::from)?;

    for (local_user_id, local_book_id, foreign_user_id, foreign_media_id) in &affected {
        match rebuild_playback_state(
            repo,
            catalog,
            &local_book_durations,
            &progress_entries,
            &book_map,
            import_id,
            *local_user_id,
            *local_book_id,
            foreign_user_id,
            foreign_media_id,
        )
        .await
        {
            Ok(unmatched) => {
                report.progress_rebuilt += 1;
                if unmatched {
                    report.abs_progress_unmatched += 1;
                }
            }
            Err(e) => {
                report.progress_failed += 1;
                error!(%import_id, %local_user_id, %local_book_id, error = %e, "failed to rebuild playback state");
            }
        }
    }

    for imported_user in &mapped_users {
        let Some(local_user_id) = imported_user.local_user_id else {
            continue;
        };
        let user_progress: Vec<&ImportedProgress> = progress_entries
            .iter()
            .filter(|p| p.foreign_user_id == imported_user.foreign_user_id)
            .collect();

        for progress in user_progress {
            if progress.current_time_ms == 0 {
                continue;
            }

            let local_book_id = book_map
                .get(&progress.foreign_media_id)
                .copied()
                .or_else(|| book_by_local.values().find(|b| b.foreign_media_id == progress.foreign_media_id).and_then(|b| b.local_book_id));
            let Some(local_book_id) = local_book_id else {
                continue;
            };

            match catalog
                .list_reading_sessions(local_user_id, local_book_id)
                .await
            {
                Ok(existing) if !existing.is_empty() => {
                    report.reading_sessions_skipped += 1;
                    mark_progress_applied(repo, progress, import_id).await;
                    continue;
                }
                Err(e) => {
                    error!(%import_id, %local_user_id, %local_book_id, error = %e, "failed to list reading sessions");
                    continue;
                }
                _ => {}
            }

            let started_at = if progress.last_update_ms > 0 {
                millis_to_datetime(progress.last_update_ms)
            } else {
                Utc::now()
            };
            let finished_at = if progress.is_finished {
                Some(
                    progress
                        .finished_at_ms
                        .map(millis_to_datetime)
                        .unwrap_or_else(Utc::now),
                )
            } else {
                None
            };
            let listen_time_ms = if progress.duration_ms > 0 {
                (progress.fraction * progress.duration_ms as f64).round() as i64
            } else {
                0
            };

            let session = ReadingSessionRecord {
                id: Uuid::new_v4(),
                user_id: local_user_id,
                book_id: local_book_id,
                started_at,
                finished_at,
                is_completed: progress.is_finished,
                final_progress: progress.fraction,
                listen_time_ms,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };

            match catalog.create_reading_session(session).await {
                Ok(()) => {
                    report.reading_sessions_created += 1;
                    mark_progress_applied(repo, progress, import_id).await;
                }
                Err(e) => error!(%import_id, %local_user_id, %local_book_id, error = %e, "failed to persist reading session"),
            }
        }
    }

    update_mapped_sessions_imported(repo, import_id).await;
    maybe_complete_import(repo, import_id).await;

    report.duration = start.elapsed();
    Ok(report)
}

/// Transitions a non-terminal `ImportedProgress` entry to `applied` once it
/// has been consumed — either as a finished-carry source during playback
/// rebuild or to materialize a reading session. Best-effort: a failure here
/// is logged, never surfaced, since the action it records already succeeded.
async fn mark_progress_applied(repo: &(dyn ImportRepository), progress: &ImportedProgress, import_id: ImportId) {
    if progress.status == ProgressStatus::Applied {
        return;
    }
    let mut updated = progress.clone();
    updated.status = ProgressStatus::Applied;
    if let Err(e) = repo.upsert_imported_progress(updated).await {
        warn!(
            %import_id,
            foreign_user_id = %progress.foreign_user_id,
            foreign_media_id = %progress.foreign_media_id,
            error = %e,
            "failed to mark imported progress applied"
        );
    }
}

/// Keeps `Import.mapped.sessions_imported` converged with the count of
/// `imported` child sessions (spec §3, §8) after a run. Best-effort, same as
/// [`maybe_complete_import`].
async fn update_mapped_sessions_imported(repo: &(dyn ImportRepository), import_id: ImportId) {
    let imported = match repo.list_imported_sessions(import_id, SessionFilter::Imported).await {
        Ok(s) => s,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to load imported sessions while refreshing mapped count");
            return;
        }
    };

    let mut import = match repo.get_import(import_id).await {
        Ok(i) => i,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to reload import while refreshing mapped session count");
            return;
        }
    };

    if import.mapped.sessions_imported == imported.len() {
        return;
    }

    import.mapped.sessions_imported = imported.len();
    import.updated_at = Utc::now();
    if let Err(e) = repo.update_import(import).await {
        warn!(%import_id, error = %e, "failed to persist refreshed mapped session count");
    }
}

/// Transitions `active→completed` (spec §2, §3) once every user and book
/// on the import is mapped and no session remains `ready`/`pendingUser`/
/// `pendingBook`. Best-effort: a failure here is logged, never surfaced —
/// the run itself already succeeded by this point.
async fn maybe_complete_import(repo: &(dyn ImportRepository), import_id: ImportId) {
    let unmapped_users = match repo.list_imported_users(import_id, EntityFilter::Unmapped).await {
        Ok(u) => u,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to load unmapped users while checking completion");
            return;
        }
    };
    if !unmapped_users.is_empty() {
        return;
    }

    let unmapped_books = match repo.list_imported_books(import_id, EntityFilter::Unmapped).await {
        Ok(b) => b,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to load unmapped books while checking completion");
            return;
        }
    };
    if !unmapped_books.is_empty() {
        return;
    }

    let sessions = match repo.list_imported_sessions(import_id, SessionFilter::All).await {
        Ok(s) => s,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to load sessions while checking completion");
            return;
        }
    };
    let all_settled = sessions
        .iter()
        .all(|s| matches!(s.status, SessionStatus::Imported | SessionStatus::Skipped));
    if !all_settled {
        return;
    }

    let mut import = match repo.get_import(import_id).await {
        Ok(i) => i,
        Err(e) => {
            warn!(%import_id, error = %e, "failed to reload import while checking completion");
            return;
        }
    };
    if import.status == ImportStatus::Completed {
        return;
    }

    import.status = ImportStatus::Completed;
    import.updated_at = Utc::now();
    if let Err(e) = repo.update_import(import).await {
        warn!(%import_id, error = %e, "failed to persist import completion");
    }
}

#[allow(clippy::too_many_arguments)]
async fn rebuild_playback_state(
    repo: &(dyn ImportRepository),
    catalog: &(dyn CatalogStore + Send + Sync),
    local_book_durations: &HashMap<LocalBookId, i64>,
    progress_entries: &[ImportedProgress],
    book_map: &HashMap<ForeignMediaId, LocalBookId>,
    import_id: ImportId,
    local_user_id: LocalUserId,
    local_book_id: LocalBookId,
    foreign_user_id: &ForeignUserId,
    foreign_media_id: &ForeignMediaId,
) -> crate::error::Result<bool> {
    let events = catalog
        .list_events(local_user_id, local_book_id)
        .await
        .map_err(crate::error::ImportError::from)?;

    let total_listen_time_ms: i64 = events.iter().map(|e| e.duration_ms).sum();
    let mut max_position_ms = events.iter().map(|e| e.end_position_ms).max().unwrap_or(0);
    let latest_event = events.iter().max_by_key(|e| e.ended_at);
    let earliest_started_at = events.iter().map(|e| e.started_at).min().unwrap_or_else(Utc::now);

    let book_duration_ms = local_book_durations.get(&local_book_id).copied().unwrap_or(0);
    if book_duration_ms > 0 && max_position_ms > book_duration_ms {
        max_position_ms = (book_duration_ms as f64 * DURATION_CLAMP_FRACTION).floor() as i64;
    }

    let existing = catalog.get_playback_state(local_user_id, local_book_id).await;
    let latest_ended_at = latest_event.map(|e| e.ended_at).unwrap_or_else(Utc::now);

    let mut state = match existing {
        Ok(mut current) => {
            if current.last_played_at < latest_ended_at {
                let previous_total = current.total_listen_time_ms;
                current.current_position_ms = max_position_ms;
                current.last_played_at = latest_ended_at;
                current.updated_at = Utc::now();
                let delta = (total_listen_time_ms - previous_total).max(0);
                current.total_listen_time_ms = previous_total + delta;
            }
            current
        }
        Err(abs_import_contracts::error::StoreError::ProgressNotFound) => PlaybackStateRecord {
            user_id: local_user_id,
            book_id: local_book_id,
            current_position_ms: max_position_ms,
            started_at: earliest_started_at,
            last_played_at: latest_ended_at,
            total_listen_time_ms,
            updated_at: Utc::now(),
            is_finished: false,
            finished_at: None,
        },
        Err(e) => return Err(e.into()),
    };

    if book_duration_ms > 0 && state.current_position_ms as f64 >= FINISHED_CARRY_THRESHOLD * book_duration_ms as f64 {
        state.is_finished = true;
        state.finished_at = Some(Utc::now());
    }

    let mut unmatched = true;
    if let Some(progress) = progress_entries
        .iter()
        .find(|p| &p.foreign_user_id == foreign_user_id && &p.foreign_media_id == foreign_media_id)
    {
        unmatched = false;
        if progress.is_finished {
            state.is_finished = true;
            state.finished_at = Some(progress.finished_at_ms.map(millis_to_datetime).unwrap_or_else(Utc::now));
            mark_progress_applied(repo, progress, import_id).await;
        }
    } else if let Some(progress) = progress_entries.iter().find(|p| {
        &p.foreign_user_id == foreign_user_id
            && book_map.get(&p.foreign_media_id).copied() == Some(local_book_id)
    }) {
        unmatched = false;
        if progress.is_finished {
            state.is_finished = true;
            state.finished_at = Some(progress.finished_at_ms.map(millis_to_datetime).unwrap_or_else(Utc::now));
            mark_progress_applied(repo, progress, import_id).await;
        }
    }

    catalog
        .upsert_playback_state(state.clone())
        .await
        .map_err(crate::error::ImportError::from)?;

    match catalog.get_playback_state(local_user_id, local_book_id).await {
        Ok(persisted) if persisted.is_finished != state.is_finished => {
            error!(
                %local_user_id,
                %local_book_id,
                "playback state read-back mismatch on is_finished after upsert"
            );
        }
        Err(e) => error!(%local_user_id, %local_book_id, error = %e, "playback state read-back failed after upsert"),
        _ => {}
    }

    Ok(unmatched)
}
