use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::{BuddyCandidate, ProfileRow};

const SQL_LOAD_PROFILE: &str = r#"
SELECT user_id, role, school, location, latitude, longitude, avatar, bio,
       major, year, subjects, rate
FROM profiles
WHERE user_id = ?1
"#;

const SQL_UPSERT_PROFILE: &str = r#"
INSERT INTO profiles (
  user_id, role, school, location, latitude, longitude, avatar, bio,
  major, year, subjects, rate
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT(user_id) DO UPDATE SET
  role = excluded.role,
  school = excluded.school,
  location = excluded.location,
  latitude = excluded.latitude,
  longitude = excluded.longitude,
  avatar = excluded.avatar,
  bio = excluded.bio,
  major = excluded.major,
  year = excluded.year,
  subjects = excluded.subjects,
  rate = excluded.rate
"#;

const SQL_UPDATE_PROFILE_GEO: &str = r#"
UPDATE profiles SET latitude = ?2, longitude = ?3 WHERE user_id = ?1
"#;

// Everyone with a profile except the viewer; exclusion by relationship is
// applied in Rust, bounded here like the Discovery grid query.
const SQL_LIST_CANDIDATES: &str = r#"
SELECT
    u.id AS user_id, u.username, u.first_name, u.last_name, u.email,
    p.role, p.school, p.location, p.latitude, p.longitude, p.avatar
FROM users u
JOIN profiles p ON p.user_id = u.id
WHERE u.id != ?1
LIMIT 500
"#;

const SQL_LIST_PROFILES_MISSING_GEO: &str = r#"
SELECT user_id, role, school, location, latitude, longitude, avatar, bio,
       major, year, subjects, rate
FROM profiles
WHERE location IS NOT NULL AND TRIM(location) != ''
  AND (latitude IS NULL OR longitude IS NULL)
LIMIT ?1
"#;

pub async fn load_profile(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Option<ProfileRow>> {
    sqlx::query_as::<_, ProfileRow>(SQL_LOAD_PROFILE)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn upsert_profile(
    executor: impl SqliteExecutor<'_>,
    profile: &ProfileRow,
) -> sqlx::Result<()> {
    sqlx::query(SQL_UPSERT_PROFILE)
        .bind(profile.user_id)
        .bind(&profile.role)
        .bind(&profile.school)
        .bind(&profile.location)
        .bind(profile.latitude)
        .bind(profile.longitude)
        .bind(&profile.avatar)
        .bind(&profile.bio)
        .bind(&profile.major)
        .bind(&profile.year)
        .bind(&profile.subjects)
        .bind(profile.rate)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn update_profile_geo(
    executor: impl SqliteExecutor<'_>,
    user_id: i64,
    coords: Option<(f64, f64)>,
) -> sqlx::Result<u64> {
    let (lat, lng) = match coords {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    let res = sqlx::query(SQL_UPDATE_PROFILE_GEO)
        .bind(user_id)
        .bind(lat)
        .bind(lng)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_candidates(
    pool: &SqlitePool,
    viewer_user_id: i64,
) -> sqlx::Result<Vec<BuddyCandidate>> {
    sqlx::query_as::<_, BuddyCandidate>(SQL_LIST_CANDIDATES)
        .bind(viewer_user_id)
        .fetch_all(pool)
        .await
}

pub async fn list_profiles_missing_geo(
    pool: &SqlitePool,
    limit: i64,
) -> sqlx::Result<Vec<ProfileRow>> {
    sqlx::query_as::<_, ProfileRow>(SQL_LIST_PROFILES_MISSING_GEO)
        .bind(limit)
        .fetch_all(pool)
        .await
}
