#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct FriendshipRow {
    pub id: i64,
    pub user_lo: i64,
    pub user_hi: i64,
    pub created_at: String,
}

impl FriendshipRow {
    /// The friend's id from the viewpoint of `user_id`.
    pub fn other(&self, user_id: i64) -> i64 {
        if self.user_lo == user_id {
            self.user_hi
        } else {
            self.user_lo
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct FriendRequestRow {
    pub id: i64,
    pub from_user: i64,
    pub to_user: i64,
    pub status: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

impl FriendRequestRow {
    pub fn status(&self) -> FriendRequestStatus {
        FriendRequestStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
    Canceled,
}

impl FriendRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Declined => "declined",
            FriendRequestStatus::Canceled => "canceled",
        }
    }

    pub fn parse(input: &str) -> Self {
        match input {
            "accepted" => FriendRequestStatus::Accepted,
            "declined" => FriendRequestStatus::Declined,
            "canceled" => FriendRequestStatus::Canceled,
            _ => FriendRequestStatus::Pending,
        }
    }
}

/// Canonical storage ordering for an undirected pair: lower id first.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
