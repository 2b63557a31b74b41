use std::sync::Arc;

use abs_import_contracts::store::CatalogStore;
use abs_import_core::import::ImportRepository;
use abs_import_core::ProgressTracker;

use crate::config::Config;

/// Shared application handles, cheap to clone (everything behind an `Arc`).
/// Never holds a request-scoped borrow — detached analysis tasks clone this
/// directly rather than borrowing from a request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn CatalogStore + Send + Sync>,
    pub imports: Arc<dyn ImportRepository>,
    pub progress: Arc<ProgressTracker>,
}
