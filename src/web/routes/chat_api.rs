use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::services::messaging_service::{self, ChatResolveError};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveConversationQuery {
    pub user_id: i64,
}

pub async fn resolve_conversation_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Query(query): Query<ResolveConversationQuery>,
) -> impl IntoResponse {
    match messaging_service::resolve_conversation(&state.pool, auth_user.id, query.user_id).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => resolve_error_response(e),
    }
}

fn resolve_error_response(error: ChatResolveError) -> Response {
    match error {
        ChatResolveError::NotAllowed => (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "You must be connected with this user to message them.",
                "reason": "not_allowed",
            })),
        )
            .into_response(),
        ChatResolveError::Upstream(upstream) => {
            let body = upstream
                .body
                .unwrap_or_else(|| serde_json::json!({ "error": "upstream_error" }));
            (upstream.status, Json(body)).into_response()
        }
        ChatResolveError::Db(e) => {
            warn!("Conversation resolve failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
