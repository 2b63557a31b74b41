//! Persistence port for the Import aggregate. A concrete store implements
//! this alongside [`abs_import_contracts::store::CatalogStore`]; the two are
//! kept as separate traits because the aggregate here is owned by this
//! subsystem, not by the pre-existing catalog.

use async_trait::async_trait;

use abs_import_contracts::error::StoreResult;
use abs_import_contracts::ids::{ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId};

use super::model::{Import, ImportedBook, ImportedProgress, ImportedSession, ImportedUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFilter {
    All,
    Mapped,
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    All,
    Pending,
    Ready,
    Imported,
    Skipped,
}

#[async_trait]
pub trait ImportRepository: Send + Sync {
    async fn create_import(&self, import: Import) -> StoreResult<()>;
    async fn get_import(&self, id: ImportId) -> StoreResult<Import>;
    async fn list_imports(&self) -> StoreResult<Vec<Import>>;
    async fn update_import(&self, import: Import) -> StoreResult<()>;
    /// Deletes the import and every child row under its key prefix.
    async fn delete_import(&self, id: ImportId) -> StoreResult<()>;

    async fn upsert_imported_user(&self, user: ImportedUser) -> StoreResult<()>;
    async fn get_imported_user(
        &self,
        import_id: ImportId,
        foreign_user_id: &ForeignUserId,
    ) -> StoreResult<ImportedUser>;
    async fn list_imported_users(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedUser>>;

    async fn upsert_imported_book(&self, book: ImportedBook) -> StoreResult<()>;
    async fn get_imported_book(
        &self,
        import_id: ImportId,
        foreign_media_id: &ForeignMediaId,
    ) -> StoreResult<ImportedBook>;
    async fn list_imported_books(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedBook>>;

    async fn upsert_imported_session(&self, session: ImportedSession) -> StoreResult<()>;
    async fn get_imported_session(
        &self,
        import_id: ImportId,
        foreign_session_id: &ForeignSessionId,
    ) -> StoreResult<ImportedSession>;
    async fn list_imported_sessions(
        &self,
        import_id: ImportId,
        filter: SessionFilter,
    ) -> StoreResult<Vec<ImportedSession>>;

    async fn upsert_imported_progress(&self, progress: ImportedProgress) -> StoreResult<()>;
    async fn list_imported_progress(
        &self,
        import_id: ImportId,
        filter: EntityFilter,
    ) -> StoreResult<Vec<ImportedProgress>>;
}
