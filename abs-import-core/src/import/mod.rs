//! The durable Import aggregate, its persistence port, the Status
//! Recalculator, and the creation/mapping-edit orchestration.

pub mod model;
pub mod recalculator;
pub mod repository;
pub mod service;

pub use model::{
    Import, ImportedBook, ImportedProgress, ImportedSession, ImportedUser, ImportMapped,
    ImportStatus, ImportTotals, ProgressStatus, SessionStatus,
};
pub use recalculator::recalculate;
pub use repository::{EntityFilter, ImportRepository, SessionFilter};
pub use service::{create_import, create_import_with_config, set_book_mapping, set_user_mapping, skip_session};
