use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::database::profile_repo;
use crate::models::ProfileRole;
use crate::services::profile_service::{self, ProfileError, ProfileInput};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

pub async fn own_profile_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let profile = match profile_repo::load_profile(&state.pool, auth_user.id).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Profile load failed for {}: {}", auth_user.id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(profile) = profile else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let role = match profile.role() {
        ProfileRole::Student { major, year } => serde_json::json!({
            "type": "student", "major": major, "year": year,
        }),
        ProfileRole::Tutor { subjects, rate } => serde_json::json!({
            "type": "tutor", "subjects": subjects, "rate": rate,
        }),
    };
    Json(serde_json::json!({ "profile": profile, "role": role })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub role: String,
    pub school: Option<String>,
    pub location: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub major: Option<String>,
    pub year: Option<String>,
    pub subjects: Option<String>,
    pub rate: Option<f64>,
}

pub async fn edit_profile_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> impl IntoResponse {
    let input = ProfileInput {
        role: form.role,
        school: form.school,
        location: form.location,
        avatar: form.avatar,
        bio: form.bio,
        major: form.major,
        year: form.year,
        subjects: form.subjects,
        rate: form.rate,
    };

    match profile_service::save_profile(&state.pool, state.geocoder.as_ref(), auth_user.id, input)
        .await
    {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => profile_error_response(e),
    }
}

fn profile_error_response(error: ProfileError) -> Response {
    let (status, reason) = match &error {
        ProfileError::InvalidRole => (StatusCode::BAD_REQUEST, "invalid_role"),
        ProfileError::UserNotFound => (StatusCode::NOT_FOUND, "not_found"),
        ProfileError::Db(e) => {
            warn!("Profile save failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(serde_json::json!({ "error": error.to_string(), "reason": reason })),
    )
        .into_response()
}
