use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{authorize, health_check, AuthzState};

pub fn create_authz_router(state: Arc<AuthzState>) -> Router {
    Router::new()
        .route("/authz", any(authorize))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
