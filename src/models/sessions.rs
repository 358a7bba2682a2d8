#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct TutoringSessionRow {
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
    pub created_at: String,
}

impl TutoringSessionRow {
    pub fn is_remote(&self) -> bool {
        self.is_remote == 1
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SessionRequestRow {
    pub id: i64,
    pub session_id: i64,
    pub student_id: i64,
    pub status: String,
    pub note: Option<String>,
    pub created_at: String,
}

impl SessionRequestRow {
    pub fn status(&self) -> SessionRequestStatus {
        SessionRequestStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequestStatus {
    Pending,
    Approved,
    Declined,
    Canceled,
}

impl SessionRequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionRequestStatus::Pending => "pending",
            SessionRequestStatus::Approved => "approved",
            SessionRequestStatus::Declined => "declined",
            SessionRequestStatus::Canceled => "canceled",
        }
    }

    pub fn parse(input: &str) -> Self {
        match input {
            "approved" => SessionRequestStatus::Approved,
            "declined" => SessionRequestStatus::Declined,
            "canceled" => SessionRequestStatus::Canceled,
            _ => SessionRequestStatus::Pending,
        }
    }
}
