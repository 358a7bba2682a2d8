use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;

use crate::database::session_repo::{self, NewSession};
use crate::database::session_request_repo;
use crate::geo::Geocode;
use crate::models::{SessionRequestRow, SessionRequestStatus, TutoringSessionRow};
use crate::services::profile_service::is_remote_token;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("session subject is required")]
    MissingSubject,
    #[error("capacity must be at least 1")]
    InvalidCapacity,
    #[error("session not found")]
    SessionNotFound,
    #[error("request not found")]
    RequestNotFound,
    #[error("only the session's tutor may do this")]
    NotSessionTutor,
    #[error("only the requesting student may do this")]
    NotRequestStudent,
    #[error("this session is already full")]
    SessionFull,
    #[error("this request has already been resolved")]
    NotPending,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Default, Clone)]
pub struct SessionInput {
    pub subject: String,
    pub description: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub is_remote: bool,
    pub capacity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    Requested,
    /// A live request already exists; its current status is reported instead
    /// of creating a duplicate.
    AlreadyRequested(SessionRequestStatus),
}

pub async fn seats_taken(pool: &SqlitePool, session_id: i64) -> sqlx::Result<i64> {
    session_request_repo::count_approved(pool, session_id).await
}

pub async fn is_full(pool: &SqlitePool, session: &TutoringSessionRow) -> sqlx::Result<bool> {
    Ok(seats_taken(pool, session.id).await? >= session.capacity)
}

pub async fn create_session(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    tutor_id: i64,
    input: SessionInput,
) -> Result<TutoringSessionRow, BookingError> {
    validate_input(&input)?;

    let location = normalized_location(&input);
    let coords = resolve_session_coords(geocoder, &input, location.as_deref(), None).await;

    let session_id = session_repo::insert_session(
        pool,
        NewSession {
            tutor_id,
            subject: input.subject.trim(),
            description: input.description.trim(),
            date: &input.date,
            start_time: input.start_time.as_deref(),
            end_time: input.end_time.as_deref(),
            location: location.as_deref(),
            is_remote: input.is_remote,
            capacity: input.capacity,
            latitude: coords.map(|(lat, _)| lat),
            longitude: coords.map(|(_, lng)| lng),
        },
    )
    .await?;

    session_repo::load_session(pool, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)
}

pub async fn update_session(
    pool: &SqlitePool,
    geocoder: &dyn Geocode,
    session_id: i64,
    tutor_id: i64,
    input: SessionInput,
) -> Result<TutoringSessionRow, BookingError> {
    validate_input(&input)?;

    let existing = session_repo::load_session(pool, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;
    if existing.tutor_id != tutor_id {
        return Err(BookingError::NotSessionTutor);
    }

    let location = normalized_location(&input);
    let coords =
        resolve_session_coords(geocoder, &input, location.as_deref(), Some(&existing)).await;

    session_repo::update_session(
        pool,
        session_id,
        NewSession {
            tutor_id,
            subject: input.subject.trim(),
            description: input.description.trim(),
            date: &input.date,
            start_time: input.start_time.as_deref(),
            end_time: input.end_time.as_deref(),
            location: location.as_deref(),
            is_remote: input.is_remote,
            capacity: input.capacity,
            latitude: coords.map(|(lat, _)| lat),
            longitude: coords.map(|(_, lng)| lng),
        },
    )
    .await?;

    session_repo::load_session(pool, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)
}

pub async fn delete_session(
    pool: &SqlitePool,
    session_id: i64,
    tutor_id: i64,
) -> Result<(), BookingError> {
    let existing = session_repo::load_session(pool, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;
    if existing.tutor_id != tutor_id {
        return Err(BookingError::NotSessionTutor);
    }
    session_repo::delete_session(pool, session_id).await?;
    Ok(())
}

/// Student asks for a seat. Full sessions are rejected up front; an existing
/// (session, student) request is reported instead of duplicated, with the
/// unique constraint backing the check under races.
pub async fn request_seat(
    pool: &SqlitePool,
    session_id: i64,
    student_id: i64,
    note: Option<&str>,
) -> Result<SeatOutcome, BookingError> {
    let mut tx = pool.begin().await?;

    let session = session_repo::load_session(&mut *tx, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;

    let approved = session_request_repo::count_approved(&mut *tx, session_id).await?;
    if approved >= session.capacity {
        return Err(BookingError::SessionFull);
    }

    if let Some(existing) =
        session_request_repo::load_request_by_pair(&mut *tx, session_id, student_id).await?
    {
        return Ok(SeatOutcome::AlreadyRequested(existing.status()));
    }

    session_request_repo::insert_pending_request(&mut *tx, session_id, student_id, note).await?;
    tx.commit().await?;
    Ok(SeatOutcome::Requested)
}

/// Tutor approves a pending request. The capacity recheck and the status
/// flip are one guarded statement, so concurrent approvals cannot oversell
/// the session; zero rows affected is split into its two causes afterwards.
pub async fn approve_request(
    pool: &SqlitePool,
    request_id: i64,
    tutor_id: i64,
) -> Result<(), BookingError> {
    let mut tx = pool.begin().await?;

    let request = session_request_repo::load_request_by_id(&mut *tx, request_id)
        .await?
        .ok_or(BookingError::RequestNotFound)?;
    let session = session_repo::load_session(&mut *tx, request.session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;
    if session.tutor_id != tutor_id {
        return Err(BookingError::NotSessionTutor);
    }

    let flipped = session_request_repo::approve_guarded(&mut *tx, request_id).await?;
    if flipped == 0 {
        let current = session_request_repo::load_request_by_id(&mut *tx, request_id)
            .await?
            .ok_or(BookingError::RequestNotFound)?;
        if current.status() != SessionRequestStatus::Pending {
            return Err(BookingError::NotPending);
        }
        return Err(BookingError::SessionFull);
    }

    tx.commit().await?;
    Ok(())
}

pub async fn decline_request(
    pool: &SqlitePool,
    request_id: i64,
    tutor_id: i64,
) -> Result<(), BookingError> {
    let mut tx = pool.begin().await?;

    let request = session_request_repo::load_request_by_id(&mut *tx, request_id)
        .await?
        .ok_or(BookingError::RequestNotFound)?;
    let session = session_repo::load_session(&mut *tx, request.session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;
    if session.tutor_id != tutor_id {
        return Err(BookingError::NotSessionTutor);
    }

    let flipped = session_request_repo::set_status_guarded(
        &mut *tx,
        request_id,
        SessionRequestStatus::Declined.as_str(),
    )
    .await?;
    if flipped == 0 {
        return Err(BookingError::NotPending);
    }
    tx.commit().await?;
    Ok(())
}

/// Student withdraws their own pending request.
pub async fn cancel_seat_request(
    pool: &SqlitePool,
    request_id: i64,
    student_id: i64,
) -> Result<(), BookingError> {
    let mut tx = pool.begin().await?;

    let request = session_request_repo::load_request_by_id(&mut *tx, request_id)
        .await?
        .ok_or(BookingError::RequestNotFound)?;
    if request.student_id != student_id {
        return Err(BookingError::NotRequestStudent);
    }

    let flipped = session_request_repo::set_status_guarded(
        &mut *tx,
        request_id,
        SessionRequestStatus::Canceled.as_str(),
    )
    .await?;
    if flipped == 0 {
        return Err(BookingError::NotPending);
    }
    tx.commit().await?;
    Ok(())
}

pub async fn list_requests_for_session(
    pool: &SqlitePool,
    session_id: i64,
    tutor_id: i64,
) -> Result<Vec<SessionRequestRow>, BookingError> {
    let session = session_repo::load_session(pool, session_id)
        .await?
        .ok_or(BookingError::SessionNotFound)?;
    if session.tutor_id != tutor_id {
        return Err(BookingError::NotSessionTutor);
    }
    Ok(session_request_repo::list_for_session(pool, session_id).await?)
}

fn validate_input(input: &SessionInput) -> Result<(), BookingError> {
    if input.subject.trim().is_empty() {
        return Err(BookingError::MissingSubject);
    }
    if input.capacity < 1 {
        return Err(BookingError::InvalidCapacity);
    }
    Ok(())
}

fn normalized_location(input: &SessionInput) -> Option<String> {
    input
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Same rule as profile saves: remote forces null, geocode exactly when the
// location changed or coordinates are missing, failure degrades to null.
async fn resolve_session_coords(
    geocoder: &dyn Geocode,
    input: &SessionInput,
    location: Option<&str>,
    existing: Option<&TutoringSessionRow>,
) -> Option<(f64, f64)> {
    if input.is_remote {
        return None;
    }
    let location = location?;
    if is_remote_token(location) {
        return None;
    }

    let previous_location = existing.and_then(|s| s.location.as_deref()).unwrap_or("");
    let previous_coords = existing.filter(|s| !s.is_remote()).and_then(|s| s.coordinates());

    if previous_location.trim() == location && previous_coords.is_some() {
        return previous_coords;
    }

    match geocoder.resolve(location).await {
        Some(coords) => Some(coords),
        None => {
            warn!("Geocoding failed for session location '{}'", location);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, test_pool};
    use crate::geo::test_stubs::StubGeocoder;

    fn session_input(capacity: i64) -> SessionInput {
        SessionInput {
            subject: "CS 1332 - Data Structures and Algorithms".to_string(),
            description: "Exam prep".to_string(),
            date: "2026-09-15".to_string(),
            start_time: Some("14:00".to_string()),
            end_time: Some("16:00".to_string()),
            location: Some("Crosland Tower".to_string()),
            is_remote: false,
            capacity,
        }
    }

    async fn make_session(pool: &SqlitePool, tutor: i64, capacity: i64) -> TutoringSessionRow {
        let geocoder = StubGeocoder::new(Some((33.7743, -84.3957)));
        create_session(pool, &geocoder, tutor, session_input(capacity))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn input_validation_rejects_bad_sessions() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let geocoder = StubGeocoder::new(None);

        let err = create_session(&pool, &geocoder, tutor, session_input(0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidCapacity));

        let mut input = session_input(1);
        input.subject = "   ".to_string();
        let err = create_session(&pool, &geocoder, tutor, input).await.unwrap_err();
        assert!(matches!(err, BookingError::MissingSubject));
    }

    #[tokio::test]
    async fn remote_session_forces_null_coords() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let geocoder = StubGeocoder::new(Some((33.7743, -84.3957)));

        let mut input = session_input(1);
        input.is_remote = true;
        input.location = None;
        let session = create_session(&pool, &geocoder, tutor, input).await.unwrap();

        assert!(session.is_remote());
        assert_eq!(session.coordinates(), None);
        assert_eq!(geocoder.call_count(), 0);
    }

    #[tokio::test]
    async fn location_change_retriggers_geocoding() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let geocoder = StubGeocoder::new(Some((33.7743, -84.3957)));
        let session = create_session(&pool, &geocoder, tutor, session_input(2))
            .await
            .unwrap();
        assert_eq!(geocoder.call_count(), 1);

        // Unchanged location: coordinates carry over without another lookup.
        update_session(&pool, &geocoder, session.id, tutor, session_input(2))
            .await
            .unwrap();
        assert_eq!(geocoder.call_count(), 1);

        let mut moved = session_input(2);
        moved.location = Some("Price Gilbert Library".to_string());
        let updated = update_session(&pool, &geocoder, session.id, tutor, moved)
            .await
            .unwrap();
        assert_eq!(geocoder.call_count(), 2);
        assert!(updated.coordinates().is_some());
    }

    #[tokio::test]
    async fn seat_request_is_idempotent_per_student() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let student = insert_user(&pool, "student").await;
        let session = make_session(&pool, tutor, 3).await;

        let first = request_seat(&pool, session.id, student, None).await.unwrap();
        assert_eq!(first, SeatOutcome::Requested);

        let second = request_seat(&pool, session.id, student, None).await.unwrap();
        assert_eq!(
            second,
            SeatOutcome::AlreadyRequested(SessionRequestStatus::Pending)
        );

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM session_requests WHERE session_id = ?1")
                .bind(session.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn full_session_rejects_new_requests() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let a = insert_user(&pool, "student_a").await;
        let b = insert_user(&pool, "student_b").await;
        let session = make_session(&pool, tutor, 1).await;

        request_seat(&pool, session.id, a, None).await.unwrap();
        let request = session_request_repo::load_request_by_pair(&pool, session.id, a)
            .await
            .unwrap()
            .unwrap();
        approve_request(&pool, request.id, tutor).await.unwrap();

        let err = request_seat(&pool, session.id, b, None).await.unwrap_err();
        assert!(matches!(err, BookingError::SessionFull));
    }

    #[tokio::test]
    async fn approve_rechecks_capacity_and_leaves_loser_pending() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let a = insert_user(&pool, "student_a").await;
        let b = insert_user(&pool, "student_b").await;
        let session = make_session(&pool, tutor, 1).await;

        // Both students request while there is still a free seat.
        request_seat(&pool, session.id, a, None).await.unwrap();
        request_seat(&pool, session.id, b, None).await.unwrap();

        let req_a = session_request_repo::load_request_by_pair(&pool, session.id, a)
            .await
            .unwrap()
            .unwrap();
        let req_b = session_request_repo::load_request_by_pair(&pool, session.id, b)
            .await
            .unwrap()
            .unwrap();

        approve_request(&pool, req_a.id, tutor).await.unwrap();

        let err = approve_request(&pool, req_b.id, tutor).await.unwrap_err();
        assert!(matches!(err, BookingError::SessionFull));

        // The losing request is still pending and the seat count held.
        let still_pending = session_request_repo::load_request_by_id(&pool, req_b.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(still_pending.status(), SessionRequestStatus::Pending);
        assert_eq!(seats_taken(&pool, session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn capacity_is_never_oversold_across_many_approvals() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let session = make_session(&pool, tutor, 2).await;

        let mut request_ids = Vec::new();
        for name in ["s1", "s2", "s3", "s4"] {
            let student = insert_user(&pool, name).await;
            request_seat(&pool, session.id, student, None).await.unwrap();
            let req = session_request_repo::load_request_by_pair(&pool, session.id, student)
                .await
                .unwrap()
                .unwrap();
            request_ids.push(req.id);
        }

        let mut approved = 0;
        for id in request_ids {
            match approve_request(&pool, id, tutor).await {
                Ok(()) => approved += 1,
                Err(BookingError::SessionFull) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(approved, 2);
        assert_eq!(seats_taken(&pool, session.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn role_guards_hold() {
        let pool = test_pool().await;
        let tutor = insert_user(&pool, "tutor").await;
        let intruder = insert_user(&pool, "intruder").await;
        let student = insert_user(&pool, "student").await;
        let session = make_session(&pool, tutor, 1).await;

        request_seat(&pool, session.id, student, None).await.unwrap();
        let request = session_request_repo::load_request_by_pair(&pool, session.id, student)
            .await
            .unwrap()
            .unwrap();

        let err = approve_request(&pool, request.id, intruder).await.unwrap_err();
        assert!(matches!(err, BookingError::NotSessionTutor));

        let err = cancel_seat_request(&pool, request.id, intruder).await.unwrap_err();
        assert!(matches!(err, BookingError::NotRequestStudent));

        cancel_seat_request(&pool, request.id, student).await.unwrap();
        let err = approve_request(&pool, request.id, tutor).await.unwrap_err();
        assert!(matches!(err, BookingError::NotPending));
    }
}
