//! The narrow `CatalogStore` contract consumed by the import subsystem.
//!
//! This mirrors the reference media server's `database::ports::*` split —
//! one focused trait per concern, composed into a single object-safe
//! supertrait that the core crate depends on as `Arc<dyn CatalogStore>`.
//! Nothing here is a concrete implementation; a deployment plugs in its own
//! backing store (Postgres, in-memory, whatever) behind this seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::ids::{ImportId, LocalBookId, LocalUserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: LocalUserId,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub id: LocalBookId,
    pub title: String,
    pub primary_author: String,
    pub asin: Option<String>,
    pub isbn: Option<String>,
    pub path: Option<String>,
    /// Known total duration of the local catalog's copy, milliseconds.
    /// `0` means unknown.
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListeningEvent {
    pub id: Uuid,
    pub user_id: LocalUserId,
    pub book_id: LocalBookId,
    pub start_position_ms: i64,
    pub end_position_ms: i64,
    pub duration_ms: i64,
    pub device_id: String,
    pub device_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub playback_speed: f32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStateRecord {
    pub user_id: LocalUserId,
    pub book_id: LocalBookId,
    pub current_position_ms: i64,
    pub started_at: DateTime<Utc>,
    pub last_played_at: DateTime<Utc>,
    pub total_listen_time_ms: i64,
    pub updated_at: DateTime<Utc>,
    pub is_finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSessionRecord {
    pub id: Uuid,
    pub user_id: LocalUserId,
    pub book_id: LocalBookId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub final_progress: f64,
    pub listen_time_ms: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserCatalog: Send + Sync {
    async fn get_user(&self, id: LocalUserId) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
}

#[async_trait]
pub trait BookCatalog: Send + Sync {
    async fn get_book(&self, id: LocalBookId) -> StoreResult<Option<BookRecord>>;
    async fn list_books(&self) -> StoreResult<Vec<BookRecord>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, event: ListeningEvent) -> StoreResult<()>;
    async fn list_events_for_user(&self, user_id: LocalUserId) -> StoreResult<Vec<ListeningEvent>>;
    async fn list_events(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<Vec<ListeningEvent>>;
    async fn list_events_in_range(
        &self,
        user_id: LocalUserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ListeningEvent>>;
}

#[async_trait]
pub trait PlaybackStateStore: Send + Sync {
    /// Returns `Err(StoreError::ProgressNotFound)`, never a bare `Ok(None)`,
    /// when no playback state has ever been recorded for this pair — callers
    /// must distinguish that sentinel from a real failure by matching the
    /// error variant, never by inspecting its message.
    async fn get_playback_state(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<PlaybackStateRecord>;
    async fn upsert_playback_state(&self, state: PlaybackStateRecord) -> StoreResult<()>;
    async fn delete_playback_state(&self, user_id: LocalUserId, book_id: LocalBookId) -> StoreResult<()>;
}

#[async_trait]
pub trait ReadingSessionStore: Send + Sync {
    async fn create_reading_session(&self, session: ReadingSessionRecord) -> StoreResult<()>;
    async fn list_reading_sessions(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<Vec<ReadingSessionRecord>>;
}

/// Fire-and-forget realtime notification sink (SSE fan-out in the reference
/// deployment). No delivery guarantee is relied upon by the core.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: DomainEvent);
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    ImportCreated { import_id: ImportId },
    ImportStatusChanged { import_id: ImportId, status: String },
    MappingChanged { import_id: ImportId },
    ExecutionCompleted { import_id: ImportId },
}

/// Composed handle onto the pre-existing catalog (users, books, listening
/// history, playback state, reading sessions). The import-specific
/// aggregate (`Import` + its four child collections) is a separate
/// repository defined alongside its domain model in `abs-import-core`,
/// since those rows belong to this subsystem rather than the catalog at
/// large. Implementations are expected to be cheap to clone (e.g. an
/// `Arc<...>` internally) since the subsystem never holds a handle across
/// request boundaries without going through `AppState`.
pub trait CatalogStore:
    UserCatalog + BookCatalog + EventStore + PlaybackStateStore + ReadingSessionStore + NotificationSink
{
}

impl<T> CatalogStore for T where
    T: UserCatalog
        + BookCatalog
        + EventStore
        + PlaybackStateStore
        + ReadingSessionStore
        + NotificationSink
{
}
