pub mod api_response;
pub mod app_state;
pub mod errors;

pub use api_response::ApiResponse;
pub use app_state::AppState;
pub use errors::{AppError, AppResult};
