use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::services::session_search_service::{self, SessionQuery};
use crate::services::session_service::{self, BookingError, SeatOutcome, SessionInput};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

pub async fn session_browse_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let page =
        match session_search_service::build_session_browse(&state.pool, auth_user.id, &query).await
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Session browse failed for {}: {}", auth_user.id, e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

    Json(serde_json::json!({
        "sessions": page.sessions,
        "markers": page.markers,
    }))
    .into_response()
}

pub async fn friends_sessions_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match session_search_service::friends_sessions(&state.pool, auth_user.id).await {
        Ok(sessions) => Json(serde_json::json!({ "sessions": sessions })).into_response(),
        Err(e) => {
            warn!("Friends' sessions load failed for {}: {}", auth_user.id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn tutor_dashboard_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let views = match session_search_service::tutor_dashboard(&state.pool, auth_user.id).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Tutor dashboard load failed for {}: {}", auth_user.id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let sessions: Vec<_> = views
        .iter()
        .map(|v| {
            serde_json::json!({
                "session": v.session,
                "requests": v.requests,
            })
        })
        .collect();
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SessionForm {
    pub subject: String,
    pub description: Option<String>,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub is_remote: Option<bool>,
    pub capacity: Option<i64>,
}

impl SessionForm {
    fn into_input(self) -> SessionInput {
        SessionInput {
            subject: self.subject,
            description: self.description.unwrap_or_default(),
            date: self.date,
            start_time: self.start_time.filter(|s| !s.trim().is_empty()),
            end_time: self.end_time.filter(|s| !s.trim().is_empty()),
            location: self.location,
            is_remote: self.is_remote.unwrap_or(false),
            capacity: self.capacity.unwrap_or(1),
        }
    }
}

pub async fn create_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<SessionForm>,
) -> impl IntoResponse {
    match session_service::create_session(
        &state.pool,
        state.geocoder.as_ref(),
        auth_user.id,
        form.into_input(),
    )
    .await
    {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => booking_error_response(e),
    }
}

pub async fn edit_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<SessionForm>,
) -> impl IntoResponse {
    match session_service::update_session(
        &state.pool,
        state.geocoder.as_ref(),
        session_id,
        auth_user.id,
        form.into_input(),
    )
    .await
    {
        Ok(session) => Json(session).into_response(),
        Err(e) => booking_error_response(e),
    }
}

pub async fn delete_session_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match session_service::delete_session(&state.pool, session_id, auth_user.id).await {
        Ok(()) => Json(serde_json::json!({ "notice": "session_deleted" })).into_response(),
        Err(e) => booking_error_response(e),
    }
}

pub async fn session_requests_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<i64>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match session_service::list_requests_for_session(&state.pool, session_id, auth_user.id).await {
        Ok(requests) => Json(serde_json::json!({ "requests": requests })).into_response(),
        Err(e) => booking_error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SeatRequestForm {
    pub note: Option<String>,
}

pub async fn request_seat_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(session_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<SeatRequestForm>,
) -> impl IntoResponse {
    match session_service::request_seat(&state.pool, session_id, auth_user.id, form.note.as_deref())
        .await
    {
        Ok(SeatOutcome::Requested) => {
            Json(serde_json::json!({ "notice": "request_sent" })).into_response()
        }
        // Not an error: report the standing request's status instead.
        Ok(SeatOutcome::AlreadyRequested(status)) => Json(serde_json::json!({
            "notice": "already_requested",
            "status": status.as_str(),
        }))
        .into_response(),
        Err(e) => booking_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SeatCommandForm {
    pub action: String, // approve|decline|cancel
}

pub async fn seat_command_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(request_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<SeatCommandForm>,
) -> impl IntoResponse {
    let (result, notice) = match form.action.trim() {
        "approve" => (
            session_service::approve_request(&state.pool, request_id, auth_user.id).await,
            "request_approved",
        ),
        "decline" => (
            session_service::decline_request(&state.pool, request_id, auth_user.id).await,
            "request_declined",
        ),
        "cancel" => (
            session_service::cancel_seat_request(&state.pool, request_id, auth_user.id).await,
            "request_canceled",
        ),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    match result {
        Ok(()) => Json(serde_json::json!({ "notice": notice })).into_response(),
        Err(e) => booking_error_response(e),
    }
}

fn booking_error_response(error: BookingError) -> Response {
    let (status, reason) = match &error {
        BookingError::MissingSubject => (StatusCode::BAD_REQUEST, "missing_subject"),
        BookingError::InvalidCapacity => (StatusCode::BAD_REQUEST, "invalid_capacity"),
        BookingError::SessionNotFound | BookingError::RequestNotFound => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        BookingError::NotSessionTutor | BookingError::NotRequestStudent => {
            (StatusCode::FORBIDDEN, "forbidden")
        }
        BookingError::SessionFull => (StatusCode::CONFLICT, "session_full"),
        BookingError::NotPending => (StatusCode::CONFLICT, "not_pending"),
        BookingError::Db(e) => {
            warn!("Booking command failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(serde_json::json!({ "error": error.to_string(), "reason": reason })),
    )
        .into_response()
}
