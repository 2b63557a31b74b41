//! In-memory `CatalogStore` + `ImportRepository` test double.
//!
//! Mirrors the reference media server's practice of testing domain logic
//! against Postgres-backed fakes one layer down from the real database —
//! here the subsystem's store seam is narrow enough that a `HashMap`
//! behind an `RwLock` stands in directly, with no SQL involved at all.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use abs_import_contracts::error::{StoreError, StoreResult};
use abs_import_contracts::ids::{
    ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId, LocalBookId, LocalUserId,
};
use abs_import_contracts::store::{
    BookCatalog, BookRecord, DomainEvent, EventStore, ListeningEvent, NotificationSink,
    PlaybackStateStore, PlaybackStateRecord, ReadingSessionRecord, ReadingSessionStore,
    UserCatalog, UserRecord,
};
use abs_import_core::import::{
    EntityFilter, Import, ImportRepository, ImportedBook, ImportedProgress, ImportedSession,
    ImportedUser, SessionFilter, SessionStatus,
};

#[derive(Default)]
pub struct FakeCatalog {
    pub users: RwLock<HashMap<LocalUserId, UserRecord>>,
    pub books: RwLock<HashMap<LocalBookId, BookRecord>>,
    pub events: RwLock<Vec<ListeningEvent>>,
    pub playback: RwLock<HashMap<(LocalUserId, LocalBookId), PlaybackStateRecord>>,
    pub reading_sessions: RwLock<Vec<ReadingSessionRecord>>,
    pub notifications: RwLock<Vec<DomainEvent>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, user: UserRecord) {
        self.users.write().unwrap().insert(user.id, user);
    }

    pub fn seed_book(&self, book: BookRecord) {
        self.books.write().unwrap().insert(book.id, book);
    }
}

#[async_trait]
impl UserCatalog for FakeCatalog {
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
impl BookCatalog for FakeCatalog {
    async fn get_book(&self, id: LocalBookId) -> StoreResult<Option<BookRecord>> {
        Ok(self.books.read().unwrap().get(&id).cloned())
    }

    async fn list_books(&self) -> StoreResult<Vec<BookRecord>> {
        Ok(self.books.read().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl EventStore for FakeCatalog {
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
impl PlaybackStateStore for FakeCatalog {
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
impl ReadingSessionStore for FakeCatalog {
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
impl NotificationSink for FakeCatalog {
    async fn notify(&self, event: DomainEvent) {
        self.notifications.write().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct FakeImportRepo {
    imports: RwLock<HashMap<ImportId, Import>>,
    users: RwLock<HashMap<(ImportId, ForeignUserId), ImportedUser>>,
    books: RwLock<HashMap<(ImportId, ForeignMediaId), ImportedBook>>,
    sessions: RwLock<HashMap<(ImportId, ForeignSessionId), ImportedSession>>,
    progress: RwLock<HashMap<(ImportId, ForeignUserId, ForeignMediaId), ImportedProgress>>,
}

impl FakeImportRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportRepository for FakeImportRepo {
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
                EntityFilter::Mapped => p.status == abs_import_core::import::ProgressStatus::Applied,
                EntityFilter::Unmapped => p.status != abs_import_core::import::ProgressStatus::Applied,
            })
            .cloned()
            .collect())
    }
}

/// Wraps [`FakeImportRepo`] but rejects every `n`th call to
/// `upsert_imported_user` with a `StoreError::Unavailable`, delegating
/// every other call unchanged. Exercises the "counters increment only
/// after the corresponding store write succeeds" rule (spec §9, §8
/// scenario 6) without needing a second full trait impl.
pub struct FlakyImportRepo {
    inner: FakeImportRepo,
    every_n: usize,
    calls: std::sync::atomic::AtomicUsize,
}

impl FlakyImportRepo {
    pub fn failing_every(every_n: usize) -> Self {
        Self {
            inner: FakeImportRepo::new(),
            every_n,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImportRepository for FlakyImportRepo {
    async fn create_import(&self, import: Import) -> StoreResult<()> {
        self.inner.create_import(import).await
    }

    async fn get_import(&self, id: ImportId) -> StoreResult<Import> {
        self.inner.get_import(id).await
    }

    async fn list_imports(&self) -> StoreResult<Vec<Import>> {
        self.inner.list_imports().await
    }

    async fn update_import(&self, import: Import) -> StoreResult<()> {
        self.inner.update_import(import).await
    }

    async fn delete_import(&self, id: ImportId) -> StoreResult<()> {
        self.inner.delete_import(id).await
    }

    async fn upsert_imported_user(&self, user: ImportedUser) -> StoreResult<()> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        if n % self.every_n == 0 {
            return Err(StoreError::Unavailable(format!(
                "injected failure on call {n}"
            )));
        }
        self.inner.upsert_imported_user(user).await
    }

    async fn get_imported_user(
        &self,
        import_id: ImportId,
        foreign_user_id: &ForeignUserId,
    ) -> StoreResult<ImportedUser> {
        self.inner.get_imported_user(import_id, foreign_user_id).await
    }

    async fn list_imported_users(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedUser>> {
        self.inner.list_imported_users(import_id, filter).await
    }

    async fn upsert_imported_book(&self, book: ImportedBook) -> StoreResult<()> {
        self.inner.upsert_imported_book(book).await
    }

    async fn get_imported_book(
        &self,
        import_id: ImportId,
        foreign_media_id: &ForeignMediaId,
    ) -> StoreResult<ImportedBook> {
        self.inner.get_imported_book(import_id, foreign_media_id).await
    }

    async fn list_imported_books(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedBook>> {
        self.inner.list_imported_books(import_id, filter).await
    }

    async fn upsert_imported_session(&self, session: ImportedSession) -> StoreResult<()> {
        self.inner.upsert_imported_session(session).await
    }

    async fn get_imported_session(
        &self,
        import_id: ImportId,
        foreign_session_id: &ForeignSessionId,
    ) -> StoreResult<ImportedSession> {
        self.inner.get_imported_session(import_id, foreign_session_id).await
    }

    async fn list_imported_sessions(
        &self,
        import_id: ImportId,
        filter: SessionFilter,
    ) -> StoreResult<Vec<ImportedSession>> {
        self.inner.list_imported_sessions(import_id, filter).await
    }

    async fn upsert_imported_progress(&self, progress: ImportedProgress) -> StoreResult<()> {
        self.inner.upsert_imported_progress(progress).await
    }

    async fn list_imported_progress(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedProgress>> {
        self.inner.list_imported_progress(import_id, filter).await
    }
}

pub fn user_record(email: &str, display_name: &str) -> UserRecord {
    UserRecord {
        id: LocalUserId::new(),
        email: email.to_string(),
        display_name: display_name.to_string(),
    }
}

pub fn book_record(title: &str, author: &str, duration_ms: i64) -> BookRecord {
    BookRecord {
        id: LocalBookId::new(),
        title: title.to_string(),
        primary_author: author.to_string(),
        asin: None,
        isbn: None,
        path: None,
        duration_ms,
    }
}

pub fn new_event_id() -> Uuid {
    Uuid::new_v4()
}
