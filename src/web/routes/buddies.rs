use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::warn;

use crate::services::buddy_search_service::{self, BuddyQuery};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

pub async fn buddy_search_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Query(query): Query<BuddyQuery>,
) -> impl IntoResponse {
    let page = match buddy_search_service::build_buddy_search(
        &state.pool,
        state.geocoder.as_ref(),
        state.matrix.as_ref(),
        auth_user.id,
        &query,
    )
    .await
    {
        Ok(page) => page,
        Err(e) => {
            warn!("Buddy search failed for user {}: {}", auth_user.id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(serde_json::json!({
        "candidates": page.candidates,
        "markers": page.markers,
        "counts": page.counts,
        "filters": page.filters,
    }))
    .into_response()
}
