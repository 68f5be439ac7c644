// Export route modules
pub mod invoke;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new().merge(invoke::routes(state))
}
