//! Status Recalculator (spec §4.6): recomputes session and progress status
//! purely from current mapping state. Idempotent — running it twice in a
//! row has the same effect as running it once — and never fails the
//! surrounding edit; per-row failures are logged and skipped.

use std::collections::HashSet;

use abs_import_contracts::ids::{ForeignMediaId, ForeignUserId, ImportId};
use tracing::warn;

use super::model::{ProgressStatus, SessionStatus};
use super::repository::{EntityFilter, ImportRepository};

/// Re-derives every non-terminal session's status and every non-`applied`
/// progress entry's status for `import_id`. Returns the count of rows that
/// changed, for callers that want to log something more useful than "ran".
pub async fn recalculate(
    repo: &(dyn ImportRepository),
    import_id: ImportId,
) -> usize {
    let mut changed = 0;

    let mapped_users: HashSet<ForeignUserId> = match repo
        .list_imported_users(import_id, EntityFilter::Mapped)
        .await
    {
        Ok(users) => users.into_iter().map(|u| u.foreign_user_id).collect(),
        Err(e) => {
            warn!(%import_id, error = %e, "recalculator: failed to load mapped users");
            return changed;
        }
    };

    let mapped_books: HashSet<ForeignMediaId> = match repo
        .list_imported_books(import_id, EntityFilter::Mapped)
        .await
    {
        Ok(books) => books.into_iter().map(|b| b.foreign_media_id).collect(),
        Err(e) => {
            warn!(%import_id, error = %e, "recalculator: failed to load mapped books");
            return changed;
        }
    };

    let sessions = match repo
        .list_imported_sessions(import_id, super::repository::SessionFilter::All)
        .await
    {
        Ok(s) => s,
        Err(e) => {
            warn!(%import_id, error = %e, "recalculator: failed to load sessions");
            return changed;
        }
    };

    for mut session in sessions {
        if matches!(session.status, SessionStatus::Imported | SessionStatus::Skipped) {
            continue;
        }
        let desired = if !mapped_users.contains(&session.foreign_user_id) {
            SessionStatus::PendingUser
        } else if !mapped_books.contains(&session.foreign_media_id) {
            SessionStatus::PendingBook
        } else {
            SessionStatus::Ready
        };
        if desired != session.status {
            session.status = desired;
            if let Err(e) = repo.upsert_imported_session(session).await {
                warn!(%import_id, error = %e, "recalculator: failed to persist session status");
                continue;
            }
            changed += 1;
        }
    }

    let progress_entries = match repo
        .list_imported_progress(import_id, EntityFilter::All)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            warn!(%import_id, error = %e, "recalculator: failed to load progress entries");
            return changed;
        }
    };

    for mut progress in progress_entries {
        if progress.status == ProgressStatus::Applied {
            continue;
        }
        let desired = if mapped_books.contains(&progress.foreign_media_id) {
            ProgressStatus::Ready
        } else {
            ProgressStatus::PendingBook
        };
        if desired != progress.status {
            progress.status = desired;
            if let Err(e) = repo.upsert_imported_progress(progress).await {
                warn!(%import_id, error = %e, "recalculator: failed to persist progress status");
                continue;
            }
            changed += 1;
        }
    }

    changed
}
