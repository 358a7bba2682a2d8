use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::SessionRequestRow;

const SQL_REQUEST_COLUMNS: &str = r#"
id, session_id, student_id, status, note, created_at
"#;

const SQL_INSERT_REQUEST: &str = r#"
INSERT INTO session_requests (session_id, student_id, status, note)
VALUES (?1, ?2, 'pending', ?3)
"#;

const SQL_COUNT_APPROVED: &str = r#"
SELECT COUNT(*) FROM session_requests
WHERE session_id = ?1 AND status = 'approved'
"#;

const SQL_APPROVE_GUARDED: &str = r#"
UPDATE session_requests
SET status = 'approved'
WHERE id = ?1
  AND status = 'pending'
  AND (SELECT COUNT(*) FROM session_requests r
       WHERE r.session_id = session_requests.session_id
         AND r.status = 'approved')
      < (SELECT capacity FROM tutoring_sessions s
         WHERE s.id = session_requests.session_id)
"#;

const SQL_SET_STATUS_GUARDED: &str = r#"
UPDATE session_requests
SET status = ?2
WHERE id = ?1 AND status = 'pending'
"#;

pub async fn load_request_by_id(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
) -> sqlx::Result<Option<SessionRequestRow>> {
    let sql = format!(
        "SELECT {} FROM session_requests WHERE id = ?1",
        SQL_REQUEST_COLUMNS
    );
    sqlx::query_as::<_, SessionRequestRow>(&sql)
        .bind(request_id)
        .fetch_optional(executor)
        .await
}

pub async fn load_request_by_pair(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    student_id: i64,
) -> sqlx::Result<Option<SessionRequestRow>> {
    let sql = format!(
        "SELECT {} FROM session_requests WHERE session_id = ?1 AND student_id = ?2",
        SQL_REQUEST_COLUMNS
    );
    sqlx::query_as::<_, SessionRequestRow>(&sql)
        .bind(session_id)
        .bind(student_id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_pending_request(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    student_id: i64,
    note: Option<&str>,
) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_REQUEST)
        .bind(session_id)
        .bind(student_id)
        .bind(note)
        .execute(executor)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn count_approved(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(SQL_COUNT_APPROVED)
        .bind(session_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Status flip and capacity recheck in one statement, so two concurrent
/// approvals cannot both slip under the limit. Zero rows affected means the
/// request was not pending or the session is full.
pub async fn approve_guarded(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_APPROVE_GUARDED)
        .bind(request_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

/// Guarded transition: affects zero rows when the request is not pending.
pub async fn set_status_guarded(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
    status: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_STATUS_GUARDED)
        .bind(request_id)
        .bind(status)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_for_session(
    pool: &SqlitePool,
    session_id: i64,
) -> sqlx::Result<Vec<SessionRequestRow>> {
    let sql = format!(
        "SELECT {} FROM session_requests WHERE session_id = ?1 ORDER BY created_at",
        SQL_REQUEST_COLUMNS
    );
    sqlx::query_as::<_, SessionRequestRow>(&sql)
        .bind(session_id)
        .fetch_all(pool)
        .await
}

pub async fn list_for_student(
    pool: &SqlitePool,
    student_id: i64,
) -> sqlx::Result<Vec<SessionRequestRow>> {
    let sql = format!(
        "SELECT {} FROM session_requests WHERE student_id = ?1 ORDER BY created_at DESC",
        SQL_REQUEST_COLUMNS
    );
    sqlx::query_as::<_, SessionRequestRow>(&sql)
        .bind(student_id)
        .fetch_all(pool)
        .await
}
