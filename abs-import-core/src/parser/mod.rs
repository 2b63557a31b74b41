//! Decodes a backup archive into an in-memory [`ParsedBackup`].
//!
//! Pure and deterministic: no writes to the catalog store happen here, and
//! the only I/O is the single read of the archive file.

mod wire;

use std::path::Path;

use abs_import_contracts::ids::{ForeignMediaId, ForeignSessionId, ForeignUserId};
use chrono::{TimeZone, Utc};

use crate::error::{ImportError, Result};

#[derive(Debug, Clone)]
pub struct ParsedBackup {
    pub users: Vec<ParsedUser>,
    pub library_items: Vec<ParsedLibraryItem>,
    pub sessions: Vec<ParsedSession>,
}

#[derive(Debug, Clone)]
pub struct ParsedUser {
    pub id: ForeignUserId,
    pub username: String,
    pub email: Option<String>,
    pub progress: Vec<ParsedProgress>,
}

#[derive(Debug, Clone)]
pub struct ParsedProgress {
    pub abs_media_id: ForeignMediaId,
    pub current_time_ms: i64,
    pub duration_ms: i64,
    pub fraction: f64,
    pub is_finished: bool,
    pub last_update_ms: i64,
    pub finished_at_ms: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ParsedLibraryItem {
    pub id: ForeignMediaId,
    pub media_id: Option<ForeignMediaId>,
    pub title: String,
    pub primary_author: String,
    pub asin: Option<String>,
    pub isbn: Option<String>,
    pub duration_ms: i64,
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedSession {
    pub id: ForeignSessionId,
    pub user_id: ForeignUserId,
    pub library_item_id: ForeignMediaId,
    pub started_at_ms: i64,
    pub duration_ms: i64,
    pub start_position_ms: i64,
    pub end_position_ms: i64,
    pub display_title: Option<String>,
}

impl ParsedBackup {
    /// A short human-readable scope line: counts and the session date range.
    pub fn summary(&self) -> String {
        let range = self
            .sessions
            .iter()
            .map(|s| s.started_at_ms)
            .fold(None, |acc: Option<(i64, i64)>, ts| match acc {
                None => Some((ts, ts)),
                Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
            });

        let range_str = match range {
            Some((lo, hi)) => {
                let lo = Utc.timestamp_millis_opt(lo).single();
                let hi = Utc.timestamp_millis_opt(hi).single();
                match (lo, hi) {
                    (Some(lo), Some(hi)) => format!(
                        ", sessions from {} to {}",
                        lo.format("%Y-%m-%d"),
                        hi.format("%Y-%m-%d")
                    ),
                    _ => String::new(),
                }
            }
            None => String::new(),
        };

        format!(
            "{} users, {} books, {} sessions{}",
            self.users.len(),
            self.library_items.len(),
            self.sessions.len(),
            range_str
        )
    }
}

/// Loads and decodes a backup archive from an absolute path.
pub fn parse_backup(path: &Path) -> Result<ParsedBackup> {
    if !path.exists() {
        return Err(ImportError::NotFound(format!(
            "backup archive not found at {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    let wire: wire::WireBackup = serde_json::from_slice(&bytes).map_err(|e| {
        ImportError::InvalidBackup(format!("malformed backup JSON: {e}"))
    })?;

    if wire.users.is_empty() && wire.library_items.is_empty() && wire.sessions.is_empty() {
        return Err(ImportError::InvalidBackup(
            "backup archive contains no users, library items, or sessions".into(),
        ));
    }

    normalize(wire)
}

fn normalize(wire: wire::WireBackup) -> Result<ParsedBackup> {
    let users = wire
        .users
        .into_iter()
        .map(normalize_user)
        .collect::<Result<Vec<_>>>()?;

    let library_items = wire
        .library_items
        .into_iter()
        .map(normalize_library_item)
        .collect::<Result<Vec<_>>>()?;

    let sessions = wire
        .sessions
        .into_iter()
        .map(normalize_session)
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedBackup {
        users,
        library_items,
        sessions,
    })
}

fn normalize_user(user: wire::WireUser) -> Result<ParsedUser> {
    if user.id.trim().is_empty() {
        return Err(ImportError::InvalidBackup(
            "backup user entry missing an id".into(),
        ));
    }

    let progress = user
        .media_progress
        .into_iter()
        // Podcast progress entries are filtered out; only book-type
        // progress is emitted. ABS tags podcast episode progress with an
        // `episodeId`; book progress never carries one.
        .filter(|p| p.episode_id.is_none())
        .map(normalize_progress)
        .collect();

    Ok(ParsedUser {
        id: user.id.into(),
        username: user.username,
        email: user.email,
        progress,
    })
}

fn normalize_progress(progress: wire::WireProgress) -> ParsedProgress {
    let duration_ms = (progress.duration * 1000.0).round() as i64;
    let current_time_ms = (progress.current_time_sec * 1000.0).round() as i64;
    let last_update_ms = progress
        .last_update_ms
        .into_iter()
        .chain(progress.started_at_ms)
        .chain(progress.finished_at_ms)
        .max()
        .unwrap_or(0);
    let finished_at_ms = if progress.is_finished {
        progress.finished_at_ms
    } else {
        None
    };

    ParsedProgress {
        abs_media_id: progress.library_item_id.into(),
        current_time_ms,
        duration_ms,
        fraction: progress.progress.clamp(0.0, 1.0),
        is_finished: progress.is_finished,
        last_update_ms,
        finished_at_ms,
    }
}

fn normalize_library_item(item: wire::WireLibraryItem) -> Result<ParsedLibraryItem> {
    if item.id.trim().is_empty() {
        return Err(ImportError::InvalidBackup(
            "backup library item missing an id".into(),
        ));
    }

    let duration_ms = item
        .media
        .duration
        .map(|secs| (secs * 1000.0).round() as i64)
        .unwrap_or(0);

    Ok(ParsedLibraryItem {
        id: item.id.into(),
        media_id: item.media_id.map(Into::into),
        title: item.media.metadata.title,
        primary_author: item.media.metadata.author_name.unwrap_or_default(),
        asin: item.media.metadata.asin,
        isbn: item.media.metadata.isbn,
        duration_ms,
        path: item.path,
    })
}

fn normalize_session(session: wire::WireSession) -> Result<ParsedSession> {
    if session.id.trim().is_empty() {
        return Err(ImportError::InvalidBackup(
            "backup session missing an id".into(),
        ));
    }

    let start_position_ms = (session.start_time_sec * 1000.0).round() as i64;
    let end_position_ms = (session.current_time_sec * 1000.0).round() as i64;
    let duration_ms = (end_position_ms - start_position_ms).max(0);

    Ok(ParsedSession {
        id: session.id.into(),
        user_id: session.user_id.into(),
        library_item_id: session.library_item_id.into(),
        started_at_ms: session.started_at_ms,
        duration_ms,
        start_position_ms,
        end_position_ms,
        display_title: session.display_title,
    })
}
