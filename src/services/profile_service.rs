use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;

use crate::database::{profile_repo, user_repo};
use crate::geo::Geocode;
use crate::models::ProfileRow;

// Locations that mean "not a physical place"; they never geocode.
pub const REMOTE_TOKENS: [&str; 2] = ["remote", "online"];

pub fn is_remote_token(location: &str) -> bool {
    let token = location.trim().to_lowercase();
    REMOTE_TOKENS.contains(&token.as_str())
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown profile role")]
    InvalidRole,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ProfileInput {
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

/// Persist a profile edit. Coordinates are recomputed exactly when the
/// location string changed or coordinates are missing; a geocoder failure or
/// a remote token leaves them null and the save still goes through.
pub async fn save_profile(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    user_id: i64,
    input: ProfileInput,
) -> Result<ProfileRow, ProfileError> {
    if input.role != "student" && input.role != "tutor" {
        return Err(ProfileError::InvalidRole);
    }
    if user_repo::load_user_by_id(pool, user_id).await?.is_none() {
        return Err(ProfileError::UserNotFound);
    }

    let existing = profile_repo::load_profile(pool, user_id).await?;

    let location = input
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let coords = resolve_coordinates(geocoder, location.as_deref(), existing.as_ref()).await;

    let row = ProfileRow {
        user_id,
        role: input.role,
        school: input.school,
        location,
        latitude: coords.map(|(lat, _)| lat),
        longitude: coords.map(|(_, lng)| lng),
        avatar: input.avatar,
        bio: input.bio,
        major: input.major,
        year: input.year,
        subjects: input.subjects,
        rate: input.rate,
    };

    profile_repo::upsert_profile(pool, &row).await?;
    Ok(row)
}

async fn resolve_coordinates(
    geocoder: &dyn Geocode,
    location: Option<&str>,
    existing: Option<&ProfileRow>,
) -> Option<(f64, f64)> {
    let Some(location) = location else {
        return None;
    };
    if is_remote_token(location) {
        return None;
    }

    let previous_location = existing.and_then(|p| p.location.as_deref()).unwrap_or("");
    let previous_coords = existing.and_then(|p| p.coordinates());

    let unchanged = previous_location.trim() == location;
    if unchanged && previous_coords.is_some() {
        return previous_coords;
    }

    match geocoder.resolve(location).await {
        Some(coords) => Some(coords),
        None => {
            // Stale coordinates would be worse than none.
            warn!("Geocoding failed for location '{}'", location);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, test_pool};
    use crate::geo::test_stubs::StubGeocoder;

    fn student_input(location: Option<&str>) -> ProfileInput {
        ProfileInput {
            role: "student".to_string(),
            location: location.map(str::to_string),
            major: Some("CS".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn new_location_is_geocoded() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;
        let geocoder = StubGeocoder::new(Some((33.7756, -84.3963)));

        let row = save_profile(&pool, &geocoder, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();

        assert_eq!(row.coordinates(), Some((33.7756, -84.3963)));
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn geocoder_failure_still_saves_with_null_coords() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;
        let geocoder = StubGeocoder::new(None);

        let row = save_profile(&pool, &geocoder, user, student_input(Some("Nowhere Hall")))
            .await
            .unwrap();

        assert_eq!(row.coordinates(), None);
        let stored = profile_repo::load_profile(&pool, user).await.unwrap().unwrap();
        assert_eq!(stored.location.as_deref(), Some("Nowhere Hall"));
        assert_eq!(stored.coordinates(), None);
    }

    #[tokio::test]
    async fn remote_location_forces_null_coords() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;

        // First give the profile real coordinates.
        let geocoder = StubGeocoder::new(Some((33.7756, -84.3963)));
        save_profile(&pool, &geocoder, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();

        // Switching to "Remote" must clear them even though the geocoder
        // would happily return something.
        let row = save_profile(&pool, &geocoder, user, student_input(Some("Remote")))
            .await
            .unwrap();
        assert_eq!(row.coordinates(), None);
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn unchanged_location_skips_the_geocoder() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;
        let geocoder = StubGeocoder::new(Some((33.7756, -84.3963)));

        save_profile(&pool, &geocoder, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();
        let row = save_profile(&pool, &geocoder, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();

        assert_eq!(row.coordinates(), Some((33.7756, -84.3963)));
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_coords_retrigger_geocoding_for_same_location() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;

        let failing = StubGeocoder::new(None);
        save_profile(&pool, &failing, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();

        // Same location string, but coordinates are still missing.
        let working = StubGeocoder::new(Some((33.7756, -84.3963)));
        let row = save_profile(&pool, &working, user, student_input(Some("Klaus Building")))
            .await
            .unwrap();
        assert_eq!(row.coordinates(), Some((33.7756, -84.3963)));
        assert_eq!(working.call_count(), 1);
    }

    #[tokio::test]
    async fn invalid_role_is_rejected() {
        let pool = test_pool().await;
        let user = insert_user(&pool, "alice").await;
        let geocoder = StubGeocoder::new(None);

        let mut input = student_input(None);
        input.role = "admin".to_string();
        let err = save_profile(&pool, &geocoder, user, input).await.unwrap_err();
        assert!(matches!(err, ProfileError::InvalidRole));
    }
}
