// HTTP routes: flow metrics and identity cache distribution

mod http;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::flow_store::FlowStore;
use crate::identity_store::IdentityStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) identity_store: Arc<IdentityStore>,
    pub(crate) flow_store: Arc<FlowStore>,
}

pub fn app(identity_store: Arc<IdentityStore>, flow_store: Arc<FlowStore>) -> Router {
    let state = AppState {
        identity_store,
        flow_store,
    };
    Router::new()
        .route("/", get(|| async { "khan agent" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/connections", get(http::connections_handler)) // GET /connections
        .route(
            "/cache",
            get(http::get_cache_handler).post(http::set_cache_handler),
        ) // GET + POST /cache
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
