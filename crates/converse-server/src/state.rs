use converse::router::InvocationRouter;
use std::sync::Arc;

/// Shared application state.
///
/// The router, and the transport client inside it, is built once at startup and
/// only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<InvocationRouter>,
}
