//! Trait surfaces and identifiers shared between the import core and the
//! server binary.
//!
//! This crate intentionally carries no business logic: it is the seam
//! between `abs-import-core` (which consumes [`CatalogStore`]) and whatever
//! concrete catalog implementation a deployment plugs in.

pub mod error;
pub mod ids;
pub mod store;

pub mod prelude {
    pub use super::error::StoreError;
    pub use super::ids::{
        AnalysisId, ForeignMediaId, ForeignSessionId, ForeignUserId, ImportId, LocalBookId,
        LocalUserId,
    };
    pub use super::store::{
        BookRecord, CatalogStore, DomainEvent, ListeningEvent, PlaybackStateRecord,
        ReadingSessionRecord, UserRecord,
    };
}
