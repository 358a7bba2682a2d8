use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::database::user_repo;
use crate::services::friendship_service::{self, FriendshipError};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct FriendshipCommandForm {
    pub action: String, // request|cancel|accept|decline
}

pub async fn friendship_command_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(target_user_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<FriendshipCommandForm>,
) -> impl IntoResponse {
    match friendship_service::apply_command(&state.pool, auth_user.id, target_user_id, &form.action)
        .await
    {
        Ok(notice) => Json(serde_json::json!({ "notice": notice })).into_response(),
        Err(e) => friendship_error_response(e),
    }
}

pub async fn friends_overview_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let overview = match friendship_service::load_overview(&state.pool, auth_user.id).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Friends overview load failed for {}: {}", auth_user.id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let friend_ids: Vec<i64> = overview
        .friendships
        .iter()
        .map(|f| f.other(auth_user.id))
        .collect();
    let friends = match user_repo::list_users_by_ids(&state.pool, &friend_ids).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Friend user load failed for {}: {}", auth_user.id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let friends: Vec<_> = friends
        .iter()
        .map(|u| serde_json::json!({ "user_id": u.id, "username": u.username }))
        .collect();

    Json(serde_json::json!({
        "friends": friends,
        "incoming_pending": overview.incoming_pending,
        "outgoing_pending": overview.outgoing_pending,
    }))
    .into_response()
}

fn friendship_error_response(error: FriendshipError) -> Response {
    let (status, reason) = match &error {
        FriendshipError::SelfRequest => (StatusCode::BAD_REQUEST, "self_request"),
        FriendshipError::InvalidAction => (StatusCode::BAD_REQUEST, "invalid_action"),
        FriendshipError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        FriendshipError::NotPending => (StatusCode::CONFLICT, "not_pending"),
        FriendshipError::NotRecipient | FriendshipError::NotSender => {
            (StatusCode::FORBIDDEN, "forbidden")
        }
        FriendshipError::Db(e) => {
            warn!("Friendship command failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(serde_json::json!({ "error": error.to_string(), "reason": reason })),
    )
        .into_response()
}
