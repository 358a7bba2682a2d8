use serde::Serialize;

// View-model row for the buddy search list (users + profile + computed
// distance fields).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BuddyCandidate {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub school: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub avatar: Option<String>,
    #[sqlx(skip)]
    pub distance_miles: Option<f64>,
    #[sqlx(skip)]
    pub drive_minutes: Option<f64>,
    #[sqlx(skip)]
    pub drive_minutes_in_traffic: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuddyMarker {
    pub user_id: i64,
    pub username: String,
    pub lat: f64,
    pub lng: f64,
    pub location: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BuddyTabCounts {
    pub candidates: usize,
    pub friends: usize,
    pub incoming_pending: usize,
    pub outgoing_pending: usize,
}
