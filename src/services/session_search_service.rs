use serde::Deserialize;
use sqlx::SqlitePool;

use crate::database::{profile_repo, session_repo, session_request_repo};
use crate::geo::great_circle_miles;
use crate::models::{SessionBrowseRow, SessionMarker, SessionRequestRow};
use crate::services::friendship_service;
use crate::services::profile_service::is_remote_token;

#[derive(Debug, Deserialize, Default)]
pub struct SessionQuery {
    pub subject: Option<String>,
    pub tutor: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub capacity_type: Option<String>, // one_on_one|group
    pub include_full: Option<bool>,
}

pub struct SessionBrowsePage {
    pub sessions: Vec<SessionBrowseRow>,
    pub markers: Vec<SessionMarker>,
}

pub async fn build_session_browse(
    pool: &SqlitePool,
    viewer_user_id: i64,
    query: &SessionQuery,
) -> sqlx::Result<SessionBrowsePage> {
    let location = query
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let remote_only = location.map(is_remote_token).unwrap_or(false);

    let rows = session_repo::browse_sessions(
        pool,
        session_repo::BrowseFilter {
            subject_like: query.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            tutor_like: query.tutor.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            location_like: if remote_only { None } else { location },
            remote_only,
            date: query.date.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            tutor_id: None,
        },
    )
    .await?;

    let wanted_minute = query.time.as_deref().and_then(parse_time_of_day);
    let include_full = query.include_full.unwrap_or(false);
    let capacity_type = query.capacity_type.as_deref().unwrap_or("");

    let viewer_coords = profile_repo::load_profile(pool, viewer_user_id)
        .await?
        .and_then(|p| p.coordinates());

    let mut sessions = Vec::new();
    for mut row in rows {
        if let Some(minute) = wanted_minute {
            if !session_covers_minute(&row, minute) {
                continue;
            }
        }
        match capacity_type {
            "one_on_one" if row.capacity != 1 => continue,
            "group" if row.capacity <= 1 => continue,
            _ => {}
        }
        if !include_full && row.is_full() {
            continue;
        }

        if let (Some((vlat, vlng)), Some(lat), Some(lng)) =
            (viewer_coords, row.latitude, row.longitude)
        {
            row.distance_miles = Some(great_circle_miles(vlat, vlng, lat, lng));
        }
        sessions.push(row);
    }

    let markers = build_session_markers(&sessions);
    Ok(SessionBrowsePage { sessions, markers })
}

/// Sessions where any friend of the viewer holds a live seat request.
pub async fn friends_sessions(
    pool: &SqlitePool,
    viewer_user_id: i64,
) -> sqlx::Result<Vec<SessionBrowseRow>> {
    let friend_ids = friendship_service::friend_ids(pool, viewer_user_id).await?;
    session_repo::list_sessions_with_student_requests(pool, &friend_ids).await
}

pub struct TutorSessionView {
    pub session: SessionBrowseRow,
    pub requests: Vec<SessionRequestRow>,
}

/// The tutor's own sessions with their per-student request lists.
pub async fn tutor_dashboard(
    pool: &SqlitePool,
    tutor_id: i64,
) -> sqlx::Result<Vec<TutorSessionView>> {
    let rows = session_repo::browse_sessions(
        pool,
        session_repo::BrowseFilter {
            tutor_id: Some(tutor_id),
            ..Default::default()
        },
    )
    .await?;

    let mut views = Vec::with_capacity(rows.len());
    for session in rows {
        let requests = session_request_repo::list_for_session(pool, session.id).await?;
        views.push(TutorSessionView { session, requests });
    }
    Ok(views)
}

fn build_session_markers(sessions: &[SessionBrowseRow]) -> Vec<SessionMarker> {
    sessions
        .iter()
        .filter_map(|s| {
            if s.is_remote() {
                return None;
            }
            let (lat, lng) = s.latitude.zip(s.longitude)?;
            Some(SessionMarker {
                session_id: s.id,
                lat,
                lng,
                subject: s.subject.clone(),
                location: s.location.clone().unwrap_or_default(),
                tutor: s.tutor_username.clone(),
                date: s.date.clone(),
                distance_miles: s.distance_miles,
            })
        })
        .collect()
}

// Sessions with no start or end time count as "any time".
fn session_covers_minute(row: &SessionBrowseRow, minute: u32) -> bool {
    let (Some(start), Some(end)) = (
        row.start_time.as_deref().and_then(parse_time_of_day),
        row.end_time.as_deref().and_then(parse_time_of_day),
    ) else {
        return true;
    };
    start <= minute && minute <= end
}

/// Minutes since midnight from "14:30", "2:30pm" or "2:30 pm"; bad input is
/// treated as no filter.
fn parse_time_of_day(input: &str) -> Option<u32> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }

    let (body, meridiem) = if let Some(rest) = s.strip_suffix("pm") {
        (rest.trim_end(), Some(true))
    } else if let Some(rest) = s.strip_suffix("am") {
        (rest.trim_end(), Some(false))
    } else {
        (s.as_str(), None)
    };

    let mut parts = body.split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || minute > 59 {
        return None;
    }

    let hour = match meridiem {
        Some(pm) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            (hour % 12) + if pm { 12 } else { 0 }
        }
        None => {
            if hour > 23 {
                return None;
            }
            hour
        }
    };
    Some(hour * 60 + minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, test_pool};
    use crate::geo::test_stubs::StubGeocoder;
    use crate::services::session_service::{self, SessionInput};

    fn input(subject: &str, capacity: i64) -> SessionInput {
        SessionInput {
            subject: subject.to_string(),
            description: String::new(),
            date: "2026-09-15".to_string(),
            start_time: Some("14:00".to_string()),
            end_time: Some("16:00".to_string()),
            location: Some("Crosland Tower".to_string()),
            is_remote: false,
            capacity,
        }
    }

    async fn create(pool: &SqlitePool, tutor: i64, input: SessionInput) -> i64 {
        let geocoder = StubGeocoder::new(Some((33.7743, -84.3957)));
        session_service::create_session(pool, &geocoder, tutor, input)
            .await
            .unwrap()
            .id
    }

    #[test]
    fn time_parsing_accepts_both_clock_styles() {
        assert_eq!(parse_time_of_day("14:30"), Some(14 * 60 + 30));
        assert_eq!(parse_time_of_day("2:30pm"), Some(14 * 60 + 30));
        assert_eq!(parse_time_of_day("2:30 PM"), Some(14 * 60 + 30));
        assert_eq!(parse_time_of_day("12:00am"), Some(0));
        assert_eq!(parse_time_of_day("12:15pm"), Some(12 * 60 + 15));
        assert_eq!(parse_time_of_day("9pm"), Some(21 * 60));
        assert_eq!(parse_time_of_day("25:00"), None);
        assert_eq!(parse_time_of_day("garbage"), None);
    }

    #[tokio::test]
    async fn time_filter_honors_open_ended_sessions() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let tutor = insert_user(&pool, "tutor").await;

        create(&pool, tutor, input("Calculus", 2)).await;

        let mut anytime = input("Linear Algebra", 2);
        anytime.start_time = None;
        anytime.end_time = None;
        create(&pool, tutor, anytime).await;

        let query = SessionQuery {
            time: Some("3:00pm".to_string()),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        assert_eq!(page.sessions.len(), 2);

        let query = SessionQuery {
            time: Some("17:30".to_string()),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        let subjects: Vec<&str> = page.sessions.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Linear Algebra"]);
    }

    #[tokio::test]
    async fn full_sessions_are_hidden_unless_requested() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let tutor = insert_user(&pool, "tutor").await;
        let student = insert_user(&pool, "student").await;

        let session_id = create(&pool, tutor, input("Physics", 1)).await;
        session_service::request_seat(&pool, session_id, student, None)
            .await
            .unwrap();
        let request = crate::database::session_request_repo::load_request_by_pair(
            &pool, session_id, student,
        )
        .await
        .unwrap()
        .unwrap();
        session_service::approve_request(&pool, request.id, tutor)
            .await
            .unwrap();

        let page = build_session_browse(&pool, viewer, &SessionQuery::default())
            .await
            .unwrap();
        assert!(page.sessions.is_empty());

        let query = SessionQuery {
            include_full: Some(true),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        assert_eq!(page.sessions.len(), 1);
        assert!(page.sessions[0].is_full());
    }

    #[tokio::test]
    async fn capacity_type_splits_one_on_one_from_group() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let tutor = insert_user(&pool, "tutor").await;

        create(&pool, tutor, input("Solo Calculus", 1)).await;
        create(&pool, tutor, input("Group Calculus", 4)).await;

        let query = SessionQuery {
            capacity_type: Some("one_on_one".to_string()),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].capacity, 1);

        let query = SessionQuery {
            capacity_type: Some("group".to_string()),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.sessions[0].capacity, 4);
    }

    #[tokio::test]
    async fn remote_token_selects_remote_sessions_and_skips_markers() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let tutor = insert_user(&pool, "tutor").await;

        create(&pool, tutor, input("On campus", 2)).await;

        let mut remote = input("Over video", 2);
        remote.is_remote = true;
        remote.location = None;
        create(&pool, tutor, remote).await;

        let query = SessionQuery {
            location: Some("Remote".to_string()),
            ..Default::default()
        };
        let page = build_session_browse(&pool, viewer, &query).await.unwrap();
        let subjects: Vec<&str> = page.sessions.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Over video"]);
        assert!(page.markers.is_empty());
    }

    #[tokio::test]
    async fn markers_carry_viewer_distance() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let tutor = insert_user(&pool, "tutor").await;

        // Viewer at Georgia Tech, session downtown.
        let row = crate::models::ProfileRow {
            user_id: viewer,
            role: "student".to_string(),
            school: None,
            location: Some("Georgia Tech".to_string()),
            latitude: Some(33.7756),
            longitude: Some(-84.3963),
            avatar: None,
            bio: None,
            major: None,
            year: None,
            subjects: None,
            rate: None,
        };
        profile_repo::upsert_profile(&pool, &row).await.unwrap();

        create(&pool, tutor, input("Economics", 2)).await;

        let page = build_session_browse(&pool, viewer, &SessionQuery::default())
            .await
            .unwrap();
        assert_eq!(page.markers.len(), 1);
        let distance = page.markers[0].distance_miles.unwrap();
        assert!(distance > 0.0 && distance < 1.0, "got {distance}");
    }

    #[tokio::test]
    async fn friends_sessions_follow_live_requests_only() {
        let pool = test_pool().await;
        let viewer = insert_user(&pool, "viewer").await;
        let friend = insert_user(&pool, "friend").await;
        let stranger = insert_user(&pool, "stranger").await;
        let tutor = insert_user(&pool, "tutor").await;

        friendship_service::request_connection(&pool, viewer, friend)
            .await
            .unwrap();
        friendship_service::request_connection(&pool, friend, viewer)
            .await
            .unwrap();

        let joined = create(&pool, tutor, input("Friend joins this", 2)).await;
        let other = create(&pool, tutor, input("Stranger joins this", 2)).await;
        let abandoned = create(&pool, tutor, input("Friend canceled this", 2)).await;

        session_service::request_seat(&pool, joined, friend, None)
            .await
            .unwrap();
        session_service::request_seat(&pool, other, stranger, None)
            .await
            .unwrap();
        session_service::request_seat(&pool, abandoned, friend, None)
            .await
            .unwrap();
        let canceled = crate::database::session_request_repo::load_request_by_pair(
            &pool, abandoned, friend,
        )
        .await
        .unwrap()
        .unwrap();
        session_service::cancel_seat_request(&pool, canceled.id, friend)
            .await
            .unwrap();

        let sessions = friends_sessions(&pool, viewer).await.unwrap();
        let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![joined]);
    }

    #[tokio::test]
    async fn dashboard_lists_own_sessions_with_requests() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let other_tutor = insert_user(&pool, "other_tutor").await;
        let student = insert_user(&pool, "student").await;

        let mine = create(&pool, tutor, input("Mine", 2)).await;
        create(&pool, other_tutor, input("Not mine", 2)).await;
        session_service::request_seat(&pool, mine, student, None)
            .await
            .unwrap();

        let views = tutor_dashboard(&pool, tutor).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].session.id, mine);
        assert_eq!(views[0].requests.len(), 1);
        assert_eq!(views[0].requests[0].student_id, student);
    }
}
