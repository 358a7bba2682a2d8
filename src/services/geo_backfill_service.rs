use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::database::{profile_repo, session_repo};
use crate::geo::Geocode;
use crate::services::profile_service::is_remote_token;

#[derive(Debug, Default)]
pub struct GeoBackfillReport {
    pub candidates: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One-shot repair for rows that predate geocoding or whose lookup failed at
/// save time. Identical locations within a run share one upstream call.
pub async fn backfill_missing_geo(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    limit: i64,
) -> sqlx::Result<GeoBackfillReport> {
    let mut report = GeoBackfillReport::default();
    let mut cache: HashMap<String, (f64, f64)> = HashMap::new();

    let profiles = profile_repo::list_profiles_missing_geo(pool, limit).await?;
    report.candidates += profiles.len();
    for profile in profiles {
        let Some(location) = profile.location.as_deref() else {
            report.skipped += 1;
            continue;
        };
        match lookup(geocoder, &mut cache, location).await {
            Lookup::Skipped => report.skipped += 1,
            Lookup::Failed => {
                warn!("No coords found for profile {} ('{}')", profile.user_id, location);
                report.failed += 1;
            }
            Lookup::Found(coords) => {
                profile_repo::update_profile_geo(pool, profile.user_id, Some(coords)).await?;
                report.updated += 1;
            }
        }
    }

    let sessions = session_repo::list_sessions_missing_geo(pool, limit).await?;
    report.candidates += sessions.len();
    for session in sessions {
        let Some(location) = session.location.as_deref() else {
            report.skipped += 1;
            continue;
        };
        match lookup(geocoder, &mut cache, location).await {
            Lookup::Skipped => report.skipped += 1,
            Lookup::Failed => {
                warn!("No coords found for session {} ('{}')", session.id, location);
                report.failed += 1;
            }
            Lookup::Found(coords) => {
                session_repo::update_session_geo(pool, session.id, Some(coords)).await?;
                report.updated += 1;
            }
        }
    }

    info!(
        "Geo backfill done: candidates={}, updated={}, skipped={}, failed={}",
        report.candidates, report.updated, report.skipped, report.failed
    );
    Ok(report)
}

enum Lookup {
    Found((f64, f64)),
    Skipped,
    Failed,
}

async fn lookup(
    geocoder: &dyn Geocode,
    cache: &mut HashMap<String, (f64, f64)>,
    location: &str,
) -> Lookup {
    if is_remote_token(location) {
        return Lookup::Skipped;
    }
    let cache_key = location.trim().to_lowercase();
    if let Some(coords) = cache.get(&cache_key).copied() {
        return Lookup::Found(coords);
    }
    match geocoder.resolve(location).await {
        Some(coords) => {
            cache.insert(cache_key, coords);
            Lookup::Found(coords)
        }
        None => Lookup::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, test_pool};
    use crate::geo::test_stubs::StubGeocoder;
    use crate::models::ProfileRow;

    async fn profile_without_coords(pool: &SqlitePool, user_id: i64, location: &str) {
        let row = ProfileRow {
            user_id,
            role: "student".to_string(),
            school: None,
            location: Some(location.to_string()),
            latitude: None,
            longitude: None,
            avatar: None,
            bio: None,
            major: None,
            year: None,
            subjects: None,
            rate: None,
        };
        profile_repo::upsert_profile(pool, &row).await.unwrap();
    }

    #[tokio::test]
    async fn backfill_fills_missing_coords_and_caches_lookups() {
        let pool = test_pool().await;
        let a = insert_user(&pool, "a").await;
        let b = insert_user(&pool, "b").await;
        let c = insert_user(&pool, "c").await;
        profile_without_coords(&pool, a, "Klaus Building").await;
        profile_without_coords(&pool, b, "klaus building").await;
        profile_without_coords(&pool, c, "Remote").await;

        let geocoder = StubGeocoder::new(Some((33.7772, -84.3962)));
        let report = backfill_missing_geo(&pool, &geocoder, 100).await.unwrap();

        assert_eq!(report.candidates, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        // Case-insensitive cache: one upstream call for both rows.
        assert_eq!(geocoder.call_count(), 1);

        let stored = profile_repo::load_profile(&pool, b).await.unwrap().unwrap();
        assert_eq!(stored.coordinates(), Some((33.7772, -84.3962)));
    }

    #[tokio::test]
    async fn failed_lookups_leave_rows_untouched() {
        let pool = test_pool().await;
        let a = insert_user(&pool, "a").await;
        profile_without_coords(&pool, a, "Unmappable Place").await;

        let geocoder = StubGeocoder::new(None);
        let report = backfill_missing_geo(&pool, &geocoder, 100).await.unwrap();

        assert_eq!(report.failed, 1);
        let stored = profile_repo::load_profile(&pool, a).await.unwrap().unwrap();
        assert_eq!(stored.coordinates(), None);
    }
}
