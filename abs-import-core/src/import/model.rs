//! The durable Import aggregate: one parent record plus four child
//! collections. These rows belong to the import subsystem itself, not the
//! pre-existing catalog, so they live beside their repository port here
//! rather than in `abs-import-contracts`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use abs_import_contracts::ids::{ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId, LocalBookId, LocalUserId};

use crate::confidence::Confidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Analyzing,
    Active,
    Completed,
    Failed,
    Archived,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportTotals {
    pub users: usize,
    pub books: usize,
    pub sessions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportMapped {
    pub users: usize,
    pub books: usize,
    pub sessions_imported: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: ImportId,
    pub name: String,
    pub backup_path: String,
    pub status: ImportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub totals: ImportTotals,
    pub mapped: ImportMapped,
}

impl Import {
    pub fn new(id: ImportId, name: String, backup_path: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            backup_path,
            status: ImportStatus::Analyzing,
            created_at: now,
            updated_at: now,
            totals: ImportTotals::default(),
            mapped: ImportMapped::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedUser {
    pub import_id: ImportId,
    pub foreign_user_id: ForeignUserId,
    pub foreign_username: String,
    pub foreign_email: Option<String>,
    pub local_user_id: Option<LocalUserId>,
    pub local_email: Option<String>,
    pub local_display_name: Option<String>,
    pub session_count: usize,
    pub total_listen_ms: i64,
    pub confidence: Confidence,
    pub match_reason: String,
    pub suggestions: Vec<LocalUserId>,
    pub mapped_at: Option<DateTime<Utc>>,
}

impl ImportedUser {
    pub fn is_mapped(&self) -> bool {
        self.local_user_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedBook {
    pub import_id: ImportId,
    pub foreign_media_id: ForeignMediaId,
    pub foreign_title: String,
    pub foreign_author: String,
    pub foreign_duration_ms: i64,
    pub foreign_asin: Option<String>,
    pub foreign_isbn: Option<String>,
    pub local_book_id: Option<LocalBookId>,
    pub local_title: Option<String>,
    pub local_author: Option<String>,
    pub session_count: usize,
    pub confidence: Confidence,
    pub match_reason: String,
    pub suggestions: Vec<LocalBookId>,
    pub mapped_at: Option<DateTime<Utc>>,
}

impl ImportedBook {
    pub fn is_mapped(&self) -> bool {
        self.local_book_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingUser,
    PendingBook,
    Ready,
    Imported,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedSession {
    pub import_id: ImportId,
    pub foreign_session_id: ForeignSessionId,
    pub foreign_user_id: ForeignUserId,
    /// Normalized against the `LibraryItem.ID`/`LibraryItem.MediaID` lookup
    /// built during creation (spec §4.5 step 7); raw foreign key if the
    /// session referenced a book absent from the backup's library items.
    pub foreign_media_id: ForeignMediaId,
    pub started_at_ms: i64,
    pub duration_ms: i64,
    pub start_position_ms: i64,
    pub end_position_ms: i64,
    pub status: SessionStatus,
    pub imported_at: Option<DateTime<Utc>>,
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    PendingBook,
    Ready,
    Applied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedProgress {
    pub import_id: ImportId,
    pub foreign_user_id: ForeignUserId,
    pub foreign_media_id: ForeignMediaId,
    pub current_time_ms: i64,
    pub duration_ms: i64,
    pub fraction: f64,
    pub is_finished: bool,
    pub last_update_ms: i64,
    pub finished_at_ms: Option<i64>,
    pub status: ProgressStatus,
}
