use std::collections::HashSet;

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::database::{friend_repo, profile_repo};
use crate::geo::{Geocode, RoadDistanceProvider};
use crate::models::{BuddyCandidate, BuddyMarker, BuddyTabCounts};
use crate::services::profile_service::is_remote_token;

pub const DEFAULT_RADIUS_MILES: f64 = 15.0;
pub const MIN_RADIUS_MILES: f64 = 1.0;
pub const MAX_RADIUS_MILES: f64 = 500.0;

#[derive(Debug, Deserialize, Default)]
pub struct BuddyQuery {
    pub q: Option<String>,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_miles: Option<f64>,
    pub use_traffic: Option<bool>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AppliedBuddyFilters {
    pub search_query: String,
    pub radius_miles: f64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_label: Option<String>,
}

pub struct BuddySearchPage {
    pub candidates: Vec<BuddyCandidate>,
    pub markers: Vec<BuddyMarker>,
    pub counts: BuddyTabCounts,
    pub filters: AppliedBuddyFilters,
}

/// Ranked, radius-filtered buddy candidates plus the map-marker universe.
///
/// The list view honors the text query and distance ranking; the marker list
/// always reflects every addressable non-excluded user so the map stays
/// stable while the list is filtered.
pub async fn build_buddy_search(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    matrix: &dyn RoadDistanceProvider,
    viewer_user_id: i64,
    query: &BuddyQuery,
) -> sqlx::Result<BuddySearchPage> {
    let friendships = friend_repo::list_friendships_for(pool, viewer_user_id).await?;
    let incoming = friend_repo::list_pending_incoming(pool, viewer_user_id).await?;
    let outgoing = friend_repo::list_pending_outgoing(pool, viewer_user_id).await?;

    let mut excluded: HashSet<i64> = HashSet::new();
    excluded.insert(viewer_user_id);
    excluded.extend(friendships.iter().map(|f| f.other(viewer_user_id)));
    excluded.extend(incoming.iter().map(|r| r.from_user));
    excluded.extend(outgoing.iter().map(|r| r.to_user));

    let pool_rows = profile_repo::list_candidates(pool, viewer_user_id).await?;
    let addressable: Vec<BuddyCandidate> = pool_rows
        .into_iter()
        .filter(|c| !excluded.contains(&c.user_id))
        .collect();

    // Markers ignore the text query on purpose.
    let markers = build_markers(&addressable);

    let search_query = query.q.clone().unwrap_or_default();
    let location_text = query
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut candidates: Vec<BuddyCandidate> = addressable
        .into_iter()
        .filter(|c| matches_text_query(c, &search_query))
        .collect();

    let radius_miles = query
        .radius_miles
        .unwrap_or(DEFAULT_RADIUS_MILES)
        .clamp(MIN_RADIUS_MILES, MAX_RADIUS_MILES);

    let origin = resolve_origin(pool, geocoder, viewer_user_id, query, location_text.as_deref())
        .await?;

    let mut ranked = false;
    if let Some(origin) = origin {
        let destinations: Vec<(i64, f64, f64)> = candidates
            .iter()
            .filter_map(|c| {
                c.latitude
                    .zip(c.longitude)
                    .map(|(lat, lng)| (c.user_id, lat, lng))
            })
            .collect();

        if !destinations.is_empty() {
            let use_traffic = query.use_traffic.unwrap_or(false);
            match matrix
                .batch_road_distance(origin, &destinations, use_traffic)
                .await
            {
                Ok(distances) => {
                    // Missing keys mean unreachable or dropped by the
                    // provider; those candidates are excluded, not errors.
                    candidates.retain_mut(|c| match distances.get(&c.user_id) {
                        Some(d) if d.distance_miles <= radius_miles => {
                            c.distance_miles = Some(d.distance_miles);
                            c.drive_minutes = Some(d.duration_minutes);
                            c.drive_minutes_in_traffic = d.duration_in_traffic_minutes;
                            true
                        }
                        _ => false,
                    });
                    sort_ranked(&mut candidates);
                    ranked = true;
                }
                Err(e) => {
                    warn!("Distance matrix unavailable, falling back to text filter: {}", e);
                }
            }
        }
    }

    if !ranked {
        // No origin, no geocoded candidates, or the batch failed outright:
        // coarse substring filter over the full pool instead of an empty page.
        if let Some(needle) = location_text.as_deref() {
            let needle = needle.to_lowercase();
            candidates.retain(|c| {
                c.location
                    .as_deref()
                    .map(|l| l.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
        }
        candidates.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));
    }

    let counts = BuddyTabCounts {
        candidates: candidates.len(),
        friends: friendships.len(),
        incoming_pending: incoming.len(),
        outgoing_pending: outgoing.len(),
    };

    let filters = AppliedBuddyFilters {
        search_query,
        radius_miles,
        lat: origin.map(|(lat, _)| lat),
        lng: origin.map(|(_, lng)| lng),
        location_label: location_text,
    };

    Ok(BuddySearchPage {
        candidates,
        markers,
        counts,
        filters,
    })
}

// Origin precedence: explicit coordinates, then a geocoded location string,
// then the viewer's own profile coordinates.
async fn resolve_origin(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    viewer_user_id: i64,
    query: &BuddyQuery,
    location_text: Option<&str>,
) -> sqlx::Result<Option<(f64, f64)>> {
    if let Some(origin) = query.lat.zip(query.lng) {
        return Ok(Some(origin));
    }
    if let Some(text) = location_text {
        if !is_remote_token(text) {
            if let Some(origin) = geocoder.resolve(text).await {
                return Ok(Some(origin));
            }
        }
        // A location string that fails to geocode falls through to the
        // coarse filter rather than silently using the profile origin.
        return Ok(None);
    }
    let profile = profile_repo::load_profile(pool, viewer_user_id).await?;
    Ok(profile.and_then(|p| p.coordinates()))
}

fn matches_text_query(candidate: &BuddyCandidate, q: &str) -> bool {
    let q = q.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    [
        candidate.username.as_str(),
        candidate.first_name.as_str(),
        candidate.last_name.as_str(),
        candidate.email.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&q))
}

fn sort_ranked(candidates: &mut [BuddyCandidate]) {
    candidates.sort_by(|a, b| {
        a.distance_miles
            .unwrap_or(f64::MAX)
            .partial_cmp(&b.distance_miles.unwrap_or(f64::MAX))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.drive_minutes
                    .unwrap_or(f64::MAX)
                    .partial_cmp(&b.drive_minutes.unwrap_or(f64::MAX))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
    });
}

fn build_markers(addressable: &[BuddyCandidate]) -> Vec<BuddyMarker> {
    addressable
        .iter()
        .filter_map(|c| {
            let (lat, lng) = c.latitude.zip(c.longitude)?;
            let location = c.location.as_deref().unwrap_or("");
            if is_remote_token(location) {
                return None;
            }
            Some(BuddyMarker {
                user_id: c.user_id,
                username: c.username.clone(),
                lat,
                lng,
                location: location.to_string(),
                avatar: c.avatar.clone(),
            })
        })
        .collect()
}
