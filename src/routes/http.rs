// GET/POST handlers: version, connections exposition, cache distribution

use axum::http::{StatusCode, header};
use axum::{Json, extract::State, response::IntoResponse};

use super::AppState;
use crate::models::IdentitySnapshot;
use crate::render;
use crate::version::{NAME, VERSION};

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /connections — current flow counts, one line per flow. Always a
/// syntactically valid body (possibly empty); resync problems never turn
/// into an error status here.
pub(super) async fn connections_handler(State(state): State<AppState>) -> impl IntoResponse {
    // One flow-set generation and one identity generation for the whole
    // response; swaps mid-render cannot produce a mixed view.
    let flows = state.flow_store.current();
    let snapshot = state.identity_store.snapshot();
    (
        [(header::CONTENT_TYPE, "text/plain")],
        render::render(&flows, &snapshot),
    )
}

/// GET /cache — the full identity snapshot as an IP -> identity JSON object.
pub(super) async fn get_cache_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.identity_store.snapshot().as_ref().clone())
}

/// POST /cache — seed the local cache wholesale (push-based distribution).
/// A malformed body is rejected by the JSON extractor before this runs.
pub(super) async fn set_cache_handler(
    State(state): State<AppState>,
    Json(snapshot): Json<IdentitySnapshot>,
) -> impl IntoResponse {
    let entries = snapshot.len();
    state.identity_store.replace(snapshot);
    tracing::info!(entries, "identity cache seeded via POST");
    StatusCode::NO_CONTENT
}
