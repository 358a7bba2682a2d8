use serde::Serialize;

// View-model row for the session browse list (sessions + tutor + seat count).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionBrowseRow {
    pub id: i64,
    pub tutor_id: i64,
    pub subject: String,
    pub description: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub is_remote: i64,
    pub capacity: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub tutor_username: String,
    pub seats_taken: i64,
    #[sqlx(skip)]
    pub distance_miles: Option<f64>,
}

impl SessionBrowseRow {
    pub fn is_full(&self) -> bool {
        self.seats_taken >= self.capacity
    }

    pub fn is_remote(&self) -> bool {
        self.is_remote == 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionMarker {
    pub session_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub subject: String,
    pub location: String,
    pub tutor: String,
    pub date: String,
    pub distance_miles: Option<f64>,
}
