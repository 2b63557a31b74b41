//! Core parser, matching engine, durable import model, and executor for
//! the Audiobookshelf backup import subsystem. Depends only on the
//! abstract [`abs_import_contracts::store::CatalogStore`] seam — no
//! concrete catalog implementation lives in this crate.

pub mod analyzer;
pub mod confidence;
pub mod error;
pub mod executor;
pub mod import;
pub mod parser;
pub mod progress_tracker;

pub use analyzer::{analyze, AnalysisResult, AnalyzerConfig, Phase};
pub use confidence::Confidence;
pub use error::{ImportError, Result};
pub use executor::{execute, ExecutionReport};
pub use parser::{parse_backup, ParsedBackup};
pub use progress_tracker::{AnalysisStatus, ProgressSnapshot, ProgressTracker};
