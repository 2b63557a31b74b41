//! In-memory `CatalogStore` + `ImportRepository` implementation for local
//! and demo deployments. Mirrors the reference media server's practice of
//! shipping a memory-backed database alongside the durable one: no SQL
//! involved, a `HashMap` behind an `RwLock` stands in directly.
//!
//! Not durable across restarts and not intended for production traffic —
//! a deployment with persistence requirements plugs a real store in behind
//! the same two traits instead.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use abs_import_contracts::error::{StoreError, StoreResult};
use abs_import_contracts::ids::{
    ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId, LocalBookId, LocalUserId,
};
use abs_import_contracts::store::{
    BookCatalog, BookRecord, DomainEvent, EventStore, ListeningEvent, NotificationSink,
    PlaybackStateRecord, PlaybackStateStore, ReadingSessionRecord, ReadingSessionStore,
    UserCatalog, UserRecord,
};
use abs_import_core::import::{
    EntityFilter, Import, ImportRepository, ImportedBook, ImportedProgress, ImportedSession,
    ImportedUser, ProgressStatus, SessionFilter, SessionStatus,
};

#[derive(Default)]
pub struct InMemoryCatalogStore {
    users: RwLock<HashMap<LocalUserId, UserRecord>>,
    books: RwLock<HashMap<LocalBookId, BookRecord>>,
    events: RwLock<Vec<ListeningEvent>>,
    playback: RwLock<HashMap<(LocalUserId, LocalBookId), PlaybackStateRecord>>,
    reading_sessions: RwLock<Vec<ReadingSessionRecord>>,
    notifications: RwLock<Vec<DomainEvent>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a handful of users and books so `ABS_IMPORT_DEV_MODE=true`
    /// deployments have something to match against out of the box.
    pub fn seeded_for_dev() -> Self {
        let store = Self::new();
        store.seed_user(UserRecord {
            id: LocalUserId::new(),
            email: "alice@example.com".into(),
            display_name: "alice".into(),
        });
        store.seed_user(UserRecord {
            id: LocalUserId::new(),
            email: "bob@example.com".into(),
            display_name: "bob".into(),
        });
        store.seed_book(BookRecord {
            id: LocalBookId::new(),
            title: "Project Hail Mary".into(),
            primary_author: "Andy Weir".into(),
            asin: Some("B08FH9JKW6".into()),
            isbn: None,
            path: Some("/library/project-hail-mary".into()),
            duration_ms: 16 * 3_600_000,
        });
        store
    }

    pub fn seed_user(&self, user: UserRecord) {
        self.users.write().unwrap().insert(user.id, user);
    }

    pub fn seed_book(&self, book: BookRecord) {
        self.books.write().unwrap().insert(book.id, book);
    }
}

#[async_trait]
impl UserCatalog for InMemoryCatalogStore {
    async fn get_user(&self, id: LocalUserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let needle = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email.trim().to_lowercase() == needle)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let needle = username.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.display_name.trim().to_lowercase() == needle)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.users.read().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl BookCatalog for InMemoryCatalogStore {
    async fn get_book(&self, id: LocalBookId) -> StoreResult<Option<BookRecord>> {
        Ok(self.books.read().unwrap().get(&id).cloned())
    }

    async fn list_books(&self) -> StoreResult<Vec<BookRecord>> {
        Ok(self.books.read().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl EventStore for InMemoryCatalogStore {
    async fn append_event(&self, event: ListeningEvent) -> StoreResult<()> {
        self.events.write().unwrap().push(event);
        Ok(())
    }

    async fn list_events_for_user(&self, user_id: LocalUserId) -> StoreResult<Vec<ListeningEvent>> {
        Ok(self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_events(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<Vec<ListeningEvent>> {
        Ok(self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn list_events_in_range(
        &self,
        user_id: LocalUserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ListeningEvent>> {
        Ok(self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.started_at >= from && e.started_at <= to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PlaybackStateStore for InMemoryCatalogStore {
    async fn get_playback_state(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<PlaybackStateRecord> {
        self.playback
            .read()
            .unwrap()
            .get(&(user_id, book_id))
            .cloned()
            .ok_or(StoreError::ProgressNotFound)
    }

    async fn upsert_playback_state(&self, state: PlaybackStateRecord) -> StoreResult<()> {
        self.playback
            .write()
            .unwrap()
            .insert((state.user_id, state.book_id), state);
        Ok(())
    }

    async fn delete_playback_state(&self, user_id: LocalUserId, book_id: LocalBookId) -> StoreResult<()> {
        self.playback.write().unwrap().remove(&(user_id, book_id));
        Ok(())
    }
}

#[async_trait]
impl ReadingSessionStore for InMemoryCatalogStore {
    async fn create_reading_session(&self, session: ReadingSessionRecord) -> StoreResult<()> {
        self.reading_sessions.write().unwrap().push(session);
        Ok(())
    }

    async fn list_reading_sessions(
        &self,
        user_id: LocalUserId,
        book_id: LocalBookId,
    ) -> StoreResult<Vec<ReadingSessionRecord>> {
        Ok(self
            .reading_sessions
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && s.book_id == book_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationSink for InMemoryCatalogStore {
    async fn notify(&self, event: DomainEvent) {
        self.notifications.write().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct InMemoryImportRepository {
    imports: RwLock<HashMap<ImportId, Import>>,
    users: RwLock<HashMap<(ImportId, ForeignUserId), ImportedUser>>,
    books: RwLock<HashMap<(ImportId, ForeignMediaId), ImportedBook>>,
    sessions: RwLock<HashMap<(ImportId, ForeignSessionId), ImportedSession>>,
    progress: RwLock<HashMap<(ImportId, ForeignUserId, ForeignMediaId), ImportedProgress>>,
}

impl InMemoryImportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportRepository for InMemoryImportRepository {
    async fn create_import(&self, import: Import) -> StoreResult<()> {
        self.imports.write().unwrap().insert(import.id, import);
        Ok(())
    }

    async fn get_import(&self, id: ImportId) -> StoreResult<Import> {
        self.imports
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("import {id}")))
    }

    async fn list_imports(&self) -> StoreResult<Vec<Import>> {
        Ok(self.imports.read().unwrap().values().cloned().collect())
    }

    async fn update_import(&self, import: Import) -> StoreResult<()> {
        self.imports.write().unwrap().insert(import.id, import);
        Ok(())
    }

    async fn delete_import(&self, id: ImportId) -> StoreResult<()> {
        self.imports.write().unwrap().remove(&id);
        self.users.write().unwrap().retain(|(i, _), _| *i != id);
        self.books.write().unwrap().retain(|(i, _), _| *i != id);
        self.sessions.write().unwrap().retain(|(i, _), _| *i != id);
        self.progress.write().unwrap().retain(|(i, _, _), _| *i != id);
        Ok(())
    }

    async fn upsert_imported_user(&self, user: ImportedUser) -> StoreResult<()> {
        self.users
            .write()
            .unwrap()
            .insert((user.import_id, user.foreign_user_id.clone()), user);
        Ok(())
    }

    async fn get_imported_user(
        &self,
        import_id: ImportId,
        foreign_user_id: &ForeignUserId,
    ) -> StoreResult<ImportedUser> {
        self.users
            .read()
            .unwrap()
            .get(&(import_id, foreign_user_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("imported user {foreign_user_id}")))
    }

    async fn list_imported_users(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedUser>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.import_id == import_id)
            .filter(|u| match filter {
                EntityFilter::All => true,
                EntityFilter::Mapped => u.is_mapped(),
                EntityFilter::Unmapped => !u.is_mapped(),
            })
            .cloned()
            .collect())
    }

    async fn upsert_imported_book(&self, book: ImportedBook) -> StoreResult<()> {
        self.books
            .write()
            .unwrap()
            .insert((book.import_id, book.foreign_media_id.clone()), book);
        Ok(())
    }

    async fn get_imported_book(
        &self,
        import_id: ImportId,
        foreign_media_id: &ForeignMediaId,
    ) -> StoreResult<ImportedBook> {
        self.books
            .read()
            .unwrap()
            .get(&(import_id, foreign_media_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("imported book {foreign_media_id}")))
    }

    async fn list_imported_books(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedBook>> {
        Ok(self
            .books
            .read()
            .unwrap()
            .values()
            .filter(|b| b.import_id == import_id)
            .filter(|b| match filter {
                EntityFilter::All => true,
                EntityFilter::Mapped => b.is_mapped(),
                EntityFilter::Unmapped => !b.is_mapped(),
            })
            .cloned()
            .collect())
    }

    async fn upsert_imported_session(&self, session: ImportedSession) -> StoreResult<()> {
        self.sessions.write().unwrap().insert(
            (session.import_id, session.foreign_session_id.clone()),
            session,
        );
        Ok(())
    }

    async fn get_imported_session(
        &self,
        import_id: ImportId,
        foreign_session_id: &ForeignSessionId,
    ) -> StoreResult<ImportedSession> {
        self.sessions
            .read()
            .unwrap()
            .get(&(import_id, foreign_session_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("imported session {foreign_session_id}")))
    }

    async fn list_imported_sessions(
        &self,
        import_id: ImportId,
        filter: SessionFilter,
    ) -> StoreResult<Vec<ImportedSession>> {
        Ok(self
            .sessions
            .read()
            .unwrap()
            .values()
            .filter(|s| s.import_id == import_id)
            .filter(|s| match filter {
                SessionFilter::All => true,
                SessionFilter::Pending => {
                    matches!(s.status, SessionStatus::PendingUser | SessionStatus::PendingBook)
                }
                SessionFilter::Ready => s.status == SessionStatus::Ready,
                SessionFilter::Imported => s.status == SessionStatus::Imported,
                SessionFilter::Skipped => s.status == SessionStatus::Skipped,
            })
            .cloned()
            .collect())
    }

    async fn upsert_imported_progress(&self, progress: ImportedProgress) -> StoreResult<()> {
        self.progress.write().unwrap().insert(
            (
                progress.import_id,
                progress.foreign_user_id.clone(),
                progress.foreign_media_id.clone(),
            ),
            progress,
        );
        Ok(())
    }

    async fn list_imported_progress(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedProgress>> {
        Ok(self
            .progress
            .read()
            .unwrap()
            .values()
            .filter(|p| p.import_id == import_id)
            .filter(|p| match filter {
                EntityFilter::All => true,
                EntityFilter::Mapped => p.status == ProgressStatus::Applied,
                EntityFilter::Unmapped => p.status != ProgressStatus::Applied,
            })
            .cloned()
            .collect())
    }
}
