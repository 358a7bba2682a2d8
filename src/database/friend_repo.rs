use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::friends::canonical_pair;
use crate::models::{FriendRequestRow, FriendshipRow};

const SQL_LOAD_FRIENDSHIP: &str = r#"
SELECT id, user_lo, user_hi, created_at
FROM friendships
WHERE user_lo = ?1 AND user_hi = ?2
"#;

const SQL_INSERT_FRIENDSHIP: &str = r#"
INSERT INTO friendships (user_lo, user_hi) VALUES (?1, ?2)
"#;

const SQL_LIST_FRIENDSHIPS_FOR: &str = r#"
SELECT id, user_lo, user_hi, created_at
FROM friendships
WHERE user_lo = ?1 OR user_hi = ?1
"#;

const SQL_LOAD_REQUEST_BY_PAIR: &str = r#"
SELECT id, from_user, to_user, status, created_at, responded_at
FROM friend_requests
WHERE from_user = ?1 AND to_user = ?2
"#;

const SQL_LOAD_REQUEST_BY_ID: &str = r#"
SELECT id, from_user, to_user, status, created_at, responded_at
FROM friend_requests
WHERE id = ?1
"#;

const SQL_INSERT_PENDING_REQUEST: &str = r#"
INSERT INTO friend_requests (from_user, to_user, status) VALUES (?1, ?2, 'pending')
"#;

const SQL_REOPEN_REQUEST: &str = r#"
UPDATE friend_requests
SET status = 'pending', responded_at = NULL
WHERE id = ?1 AND status != 'pending'
"#;

const SQL_SET_REQUEST_STATUS: &str = r#"
UPDATE friend_requests
SET status = ?2, responded_at = datetime('now')
WHERE id = ?1 AND status = 'pending'
"#;

const SQL_LIST_PENDING_INCOMING: &str = r#"
SELECT id, from_user, to_user, status, created_at, responded_at
FROM friend_requests
WHERE to_user = ?1 AND status = 'pending'
ORDER BY created_at DESC
"#;

const SQL_LIST_PENDING_OUTGOING: &str = r#"
SELECT id, from_user, to_user, status, created_at, responded_at
FROM friend_requests
WHERE from_user = ?1 AND status = 'pending'
ORDER BY created_at DESC
"#;

pub async fn load_friendship(
    executor: impl SqliteExecutor<'_>,
    a: i64,
    b: i64,
) -> sqlx::Result<Option<FriendshipRow>> {
    let (lo, hi) = canonical_pair(a, b);
    sqlx::query_as::<_, FriendshipRow>(SQL_LOAD_FRIENDSHIP)
        .bind(lo)
        .bind(hi)
        .fetch_optional(executor)
        .await
}

/// Canonicalizes before insert; the UNIQUE (user_lo, user_hi) constraint is
/// the backstop against a racing duplicate.
pub async fn insert_friendship(
    executor: impl SqliteExecutor<'_>,
    a: i64,
    b: i64,
) -> sqlx::Result<()> {
    let (lo, hi) = canonical_pair(a, b);
    sqlx::query(SQL_INSERT_FRIENDSHIP)
        .bind(lo)
        .bind(hi)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn list_friendships_for(
    pool: &SqlitePool,
    user_id: i64,
) -> sqlx::Result<Vec<FriendshipRow>> {
    sqlx::query_as::<_, FriendshipRow>(SQL_LIST_FRIENDSHIPS_FOR)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn load_request_by_pair(
    executor: impl SqliteExecutor<'_>,
    from_user: i64,
    to_user: i64,
) -> sqlx::Result<Option<FriendRequestRow>> {
    sqlx::query_as::<_, FriendRequestRow>(SQL_LOAD_REQUEST_BY_PAIR)
        .bind(from_user)
        .bind(to_user)
        .fetch_optional(executor)
        .await
}

pub async fn load_request_by_id(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
) -> sqlx::Result<Option<FriendRequestRow>> {
    sqlx::query_as::<_, FriendRequestRow>(SQL_LOAD_REQUEST_BY_ID)
        .bind(request_id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_pending_request(
    executor: impl SqliteExecutor<'_>,
    from_user: i64,
    to_user: i64,
) -> sqlx::Result<()> {
    sqlx::query(SQL_INSERT_PENDING_REQUEST)
        .bind(from_user)
        .bind(to_user)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn reopen_request(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_REOPEN_REQUEST)
        .bind(request_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

/// Guarded transition: affects zero rows when the request is not pending.
pub async fn set_request_status(
    executor: impl SqliteExecutor<'_>,
    request_id: i64,
    status: &str,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_SET_REQUEST_STATUS)
        .bind(request_id)
        .bind(status)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

pub async fn list_pending_incoming(
    pool: &SqlitePool,
    user_id: i64,
) -> sqlx::Result<Vec<FriendRequestRow>> {
    sqlx::query_as::<_, FriendRequestRow>(SQL_LIST_PENDING_INCOMING)
        .bind(user_id)
        .fetch_all(pool)
        .await
}

pub async fn list_pending_outgoing(
    pool: &SqlitePool,
    user_id: i64,
) -> sqlx::Result<Vec<FriendRequestRow>> {
    sqlx::query_as::<_, FriendRequestRow>(SQL_LIST_PENDING_OUTGOING)
        .bind(user_id)
        .fetch_all(pool)
        .await
}
