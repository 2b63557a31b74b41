//! The backup file's on-disk JSON shape.
//!
//! Kept private to this module: nothing downstream should ever see these
//! structs directly. [`super::parse_backup`] normalizes them into the
//! public [`super::ParsedBackup`] value.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct WireBackup {
    pub users: Vec<WireUser>,
    #[serde(rename = "libraryItems")]
    pub library_items: Vec<WireLibraryItem>,
    pub sessions: Vec<WireSession>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    #[serde(rename = "mediaProgress", default)]
    pub media_progress: Vec<WireProgress>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireProgress {
    #[serde(rename = "libraryItemId")]
    pub library_item_id: String,
    /// Present only for podcast episode progress; book progress omits it.
    #[serde(rename = "episodeId", default)]
    pub episode_id: Option<String>,
    #[serde(rename = "currentTime")]
    pub current_time_sec: f64,
    pub duration: f64,
    pub progress: f64,
    #[serde(rename = "isFinished", default)]
    pub is_finished: bool,
    #[serde(rename = "lastUpdate", default)]
    pub last_update_ms: Option<i64>,
    #[serde(rename = "startedAt", default)]
    pub started_at_ms: Option<i64>,
    #[serde(rename = "finishedAt", default)]
    pub finished_at_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireLibraryItem {
    pub id: String,
    #[serde(rename = "mediaId", default)]
    pub media_id: Option<String>,
    pub media: WireMedia,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireMedia {
    pub metadata: WireMetadata,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireMetadata {
    pub title: String,
    #[serde(rename = "authorName", default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireSession {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "libraryItemId")]
    pub library_item_id: String,
    #[serde(rename = "startedAt")]
    pub started_at_ms: i64,
    #[serde(rename = "startTime")]
    pub start_time_sec: f64,
    #[serde(rename = "currentTime")]
    pub current_time_sec: f64,
    #[serde(rename = "displayTitle", default)]
    pub display_title: Option<String>,
}
