use axum::http::StatusCode;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::services::friendship_service::{self, conversation_unique_name};

/// Who may start a conversation: nobody messages themselves, everyone else
/// needs an accepted friendship.
pub async fn can_message(pool: &SqlitePool, viewer: i64, target: i64) -> sqlx::Result<bool> {
    if viewer == target {
        return Ok(false);
    }
    friendship_service::are_friends(pool, viewer, target).await
}

#[derive(Debug, Clone)]
pub struct ChatUpstreamError {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl ChatUpstreamError {
    fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Error)]
pub enum ChatResolveError {
    #[error("you must be connected with this user to message them")]
    NotAllowed,
    #[error("chat provider error")]
    Upstream(ChatUpstreamError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

fn chat_api_base_url() -> String {
    std::env::var("CHAT_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}

fn connect_failed(url: &str, err: impl ToString) -> ChatUpstreamError {
    ChatUpstreamError::new(
        StatusCode::BAD_GATEWAY,
        Some(serde_json::json!({
            "error": "connect_failed",
            "detail": err.to_string(),
            "url": url
        })),
    )
}

/// Gatekeeper in front of the opaque chat provider: check the friendship,
/// then get-or-create the pair conversation upstream. The provider owns the
/// conversation itself; we only hand it the stable pair name.
pub async fn resolve_conversation(
    pool: &SqlitePool,
    viewer: i64,
    target: i64,
) -> Result<Value, ChatResolveError> {
    if !can_message(pool, viewer, target).await? {
        return Err(ChatResolveError::NotAllowed);
    }

    let base = chat_api_base_url();
    let url = format!("{}/api/v1/conversations", base.trim_end_matches('/'));
    let unique_name = conversation_unique_name(viewer, target);

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .json(&serde_json::json!({
            "unique_name": unique_name,
            "participants": [format!("user_{}", viewer), format!("user_{}", target)],
        }))
        .send()
        .await
        .map_err(|e| ChatResolveError::Upstream(connect_failed(&url, e)))?;

    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body: Value = resp
        .json()
        .await
        .map_err(|e| ChatResolveError::Upstream(connect_failed(&url, e)))?;
    if !status.is_success() {
        return Err(ChatResolveError::Upstream(ChatUpstreamError::new(
            status,
            Some(body),
        )));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, test_pool};

    #[tokio::test]
    async fn messaging_requires_an_accepted_friendship() {
        let pool = test_pool().await;
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;

        assert!(!can_message(&pool, alice, bob).await.unwrap());
        assert!(!can_message(&pool, alice, alice).await.unwrap());

        friendship_service::request_connection(&pool, alice, bob)
            .await
            .unwrap();
        assert!(!can_message(&pool, alice, bob).await.unwrap());

        friendship_service::request_connection(&pool, bob, alice)
            .await
            .unwrap();
        assert!(can_message(&pool, alice, bob).await.unwrap());
        assert!(can_message(&pool, bob, alice).await.unwrap());
    }
}
