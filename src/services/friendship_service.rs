use sqlx::SqlitePool;
use thiserror::Error;

use crate::database::friend_repo;
use crate::models::friends::canonical_pair;
use crate::models::{FriendRequestRow, FriendRequestStatus, FriendshipRow};

#[derive(Debug, Error)]
pub enum FriendshipError {
    #[error("you cannot send a friend request to yourself")]
    SelfRequest,
    #[error("invalid friendship action")]
    InvalidAction,
    #[error("friend request not found")]
    NotFound,
    #[error("this request has already been resolved")]
    NotPending,
    #[error("only the recipient can respond to a friend request")]
    NotRecipient,
    #[error("only the sender can cancel a friend request")]
    NotSender,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    RequestSent,
    AlreadyFriends,
    AlreadyRequested,
    AutoAccepted,
}

impl ConnectOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectOutcome::RequestSent => "request_sent",
            ConnectOutcome::AlreadyFriends => "already_friends",
            ConnectOutcome::AlreadyRequested => "already_requested",
            ConnectOutcome::AutoAccepted => "now_friends",
        }
    }
}

/// Send (or resolve) a connection request. The check order matters: an
/// existing friendship wins over a reverse pending request, which wins over
/// a same-direction pending request. A pending request in the reverse
/// direction is auto-accepted instead of leaving two pending edges for one
/// relationship.
pub async fn request_connection(
    pool: &SqlitePool,
    from_user: i64,
    to_user: i64,
) -> Result<ConnectOutcome, FriendshipError> {
    if from_user == to_user {
        return Err(FriendshipError::SelfRequest);
    }

    let mut tx = pool.begin().await?;

    if friend_repo::load_friendship(&mut *tx, from_user, to_user)
        .await?
        .is_some()
    {
        return Ok(ConnectOutcome::AlreadyFriends);
    }

    if let Some(reverse) = friend_repo::load_request_by_pair(&mut *tx, to_user, from_user).await? {
        if reverse.status() == FriendRequestStatus::Pending {
            let flipped = friend_repo::set_request_status(
                &mut *tx,
                reverse.id,
                FriendRequestStatus::Accepted.as_str(),
            )
            .await?;
            if flipped == 0 {
                return Err(FriendshipError::NotPending);
            }
            friend_repo::insert_friendship(&mut *tx, from_user, to_user).await?;
            tx.commit().await?;
            return Ok(ConnectOutcome::AutoAccepted);
        }
    }

    match friend_repo::load_request_by_pair(&mut *tx, from_user, to_user).await? {
        Some(existing) if existing.status() == FriendRequestStatus::Pending => {
            Ok(ConnectOutcome::AlreadyRequested)
        }
        Some(existing) => {
            // Requests are never deleted; re-opening the terminal row is the
            // "create" step under the one-row-per-ordered-pair invariant.
            friend_repo::reopen_request(&mut *tx, existing.id).await?;
            tx.commit().await?;
            Ok(ConnectOutcome::RequestSent)
        }
        None => {
            friend_repo::insert_pending_request(&mut *tx, from_user, to_user).await?;
            tx.commit().await?;
            Ok(ConnectOutcome::RequestSent)
        }
    }
}

/// Accept a pending request. Only the recipient may accept; the canonical
/// (lo, hi) pair is recomputed here, at acceptance time, since the request's
/// direction says nothing about id order.
pub async fn accept_request(
    pool: &SqlitePool,
    request_id: i64,
    acting_user: i64,
) -> Result<(), FriendshipError> {
    let mut tx = pool.begin().await?;

    let Some(request) = friend_repo::load_request_by_id(&mut *tx, request_id).await? else {
        return Err(FriendshipError::NotFound);
    };
    if request.to_user != acting_user {
        return Err(FriendshipError::NotRecipient);
    }

    let flipped = friend_repo::set_request_status(
        &mut *tx,
        request_id,
        FriendRequestStatus::Accepted.as_str(),
    )
    .await?;
    if flipped == 0 {
        return Err(FriendshipError::NotPending);
    }

    friend_repo::insert_friendship(&mut *tx, request.from_user, request.to_user).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn decline_request(
    pool: &SqlitePool,
    request_id: i64,
    acting_user: i64,
) -> Result<(), FriendshipError> {
    resolve_request(
        pool,
        request_id,
        acting_user,
        FriendRequestStatus::Declined,
    )
    .await
}

pub async fn cancel_request(
    pool: &SqlitePool,
    request_id: i64,
    acting_user: i64,
) -> Result<(), FriendshipError> {
    resolve_request(
        pool,
        request_id,
        acting_user,
        FriendRequestStatus::Canceled,
    )
    .await
}

async fn resolve_request(
    pool: &SqlitePool,
    request_id: i64,
    acting_user: i64,
    target_status: FriendRequestStatus,
) -> Result<(), FriendshipError> {
    let mut tx = pool.begin().await?;

    let Some(request) = friend_repo::load_request_by_id(&mut *tx, request_id).await? else {
        return Err(FriendshipError::NotFound);
    };
    match target_status {
        FriendRequestStatus::Declined if request.to_user != acting_user => {
            return Err(FriendshipError::NotRecipient)
        }
        FriendRequestStatus::Canceled if request.from_user != acting_user => {
            return Err(FriendshipError::NotSender)
        }
        _ => {}
    }

    let flipped =
        friend_repo::set_request_status(&mut *tx, request_id, target_status.as_str()).await?;
    if flipped == 0 {
        return Err(FriendshipError::NotPending);
    }
    tx.commit().await?;
    Ok(())
}

/// Command-style entry point for the user-page form: actor acts on a target
/// user with one of request|cancel|accept|decline. Returns a notice token
/// for the caller to render.
pub async fn apply_command(
    pool: &SqlitePool,
    actor_user_id: i64,
    target_user_id: i64,
    action: &str,
) -> Result<&'static str, FriendshipError> {
    match action.trim() {
        "request" => {
            let outcome = request_connection(pool, actor_user_id, target_user_id).await?;
            Ok(outcome.as_str())
        }
        "cancel" => {
            let request = friend_repo::load_request_by_pair(pool, actor_user_id, target_user_id)
                .await?
                .ok_or(FriendshipError::NotFound)?;
            cancel_request(pool, request.id, actor_user_id).await?;
            Ok("request_canceled")
        }
        "accept" => {
            let request = friend_repo::load_request_by_pair(pool, target_user_id, actor_user_id)
                .await?
                .ok_or(FriendshipError::NotFound)?;
            accept_request(pool, request.id, actor_user_id).await?;
            Ok("request_accepted")
        }
        "decline" => {
            let request = friend_repo::load_request_by_pair(pool, target_user_id, actor_user_id)
                .await?
                .ok_or(FriendshipError::NotFound)?;
            decline_request(pool, request.id, actor_user_id).await?;
            Ok("request_declined")
        }
        _ => Err(FriendshipError::InvalidAction),
    }
}

pub async fn are_friends(pool: &SqlitePool, a: i64, b: i64) -> sqlx::Result<bool> {
    if a == b {
        return Ok(false);
    }
    Ok(friend_repo::load_friendship(pool, a, b).await?.is_some())
}

pub async fn friend_ids(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<i64>> {
    let rows = friend_repo::list_friendships_for(pool, user_id).await?;
    Ok(rows.iter().map(|row| row.other(user_id)).collect())
}

/// Everyone with a pending request touching this user, in either direction.
pub async fn pending_peer_ids(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Vec<i64>> {
    let incoming = friend_repo::list_pending_incoming(pool, user_id).await?;
    let outgoing = friend_repo::list_pending_outgoing(pool, user_id).await?;
    let mut ids: Vec<i64> = incoming.iter().map(|r| r.from_user).collect();
    ids.extend(outgoing.iter().map(|r| r.to_user));
    Ok(ids)
}

pub struct FriendsOverview {
    pub friendships: Vec<FriendshipRow>,
    pub incoming_pending: Vec<FriendRequestRow>,
    pub outgoing_pending: Vec<FriendRequestRow>,
}

pub async fn load_overview(pool: &SqlitePool, user_id: i64) -> sqlx::Result<FriendsOverview> {
    Ok(FriendsOverview {
        friendships: friend_repo::list_friendships_for(pool, user_id).await?,
        incoming_pending: friend_repo::list_pending_incoming(pool, user_id).await?,
        outgoing_pending: friend_repo::list_pending_outgoing(pool, user_id).await?,
    })
}

/// Conversation unique name for a user pair, stable regardless of direction.
pub fn conversation_unique_name(a: i64, b: i64) -> String {
    let (lo, hi) = canonical_pair(a, b);
    format!("userpair_{}_{}", lo, hi)
}
