use sqlx::{sqlite::SqliteArguments, Arguments, SqliteExecutor, SqlitePool};

use crate::models::{SessionBrowseRow, TutoringSessionRow};

const SQL_SESSION_COLUMNS: &str = r#"
id, tutor_id, subject, description, date, start_time, end_time,
location, is_remote, capacity, latitude, longitude, created_at
"#;

const SQL_INSERT_SESSION: &str = r#"
INSERT INTO tutoring_sessions (
  tutor_id, subject, description, date, start_time, end_time,
  location, is_remote, capacity, latitude, longitude
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

const SQL_UPDATE_SESSION: &str = r#"
UPDATE tutoring_sessions SET
  subject = ?2,
  description = ?3,
  date = ?4,
  start_time = ?5,
  end_time = ?6,
  location = ?7,
  is_remote = ?8,
  capacity = ?9,
  latitude = ?10,
  longitude = ?11
WHERE id = ?1
"#;

const SQL_DELETE_SESSION: &str = r#"
DELETE FROM tutoring_sessions WHERE id = ?1
"#;

const SQL_UPDATE_SESSION_GEO: &str = r#"
UPDATE tutoring_sessions SET latitude = ?2, longitude = ?3 WHERE id = ?1
"#;

const SQL_BROWSE_BASE: &str = r#"
SELECT
    s.id, s.tutor_id, s.subject, s.description, s.date, s.start_time,
    s.end_time, s.location, s.is_remote, s.capacity, s.latitude, s.longitude,
    u.username AS tutor_username,
    (SELECT COUNT(*) FROM session_requests r
     WHERE r.session_id = s.id AND r.status = 'approved') AS seats_taken
FROM tutoring_sessions s
JOIN users u ON u.id = s.tutor_id
WHERE 1 = 1
"#;

const SQL_LIST_SESSIONS_MISSING_GEO: &str = r#"
SELECT id, tutor_id, subject, description, date, start_time, end_time,
       location, is_remote, capacity, latitude, longitude, created_at
FROM tutoring_sessions
WHERE is_remote = 0
  AND location IS NOT NULL AND TRIM(location) != ''
  AND (latitude IS NULL OR longitude IS NULL)
LIMIT ?1
"#;

pub async fn load_session(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
) -> sqlx::Result<Option<TutoringSessionRow>> {
    let sql = format!("SELECT {} FROM tutoring_sessions WHERE id = ?1", SQL_SESSION_COLUMNS);
    sqlx::query_as::<_, TutoringSessionRow>(&sql)
        .bind(session_id)
        .fetch_optional(executor)
        .await
}

pub struct NewSession<'a> {
    pub tutor_id: i64,
    pub subject: &'a str,
    pub description: &'a str,
    pub date: &'a str,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub location: Option<&'a str>,
    pub is_remote: bool,
    pub capacity: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub async fn insert_session(
    executor: impl SqliteExecutor<'_>,
    session: NewSession<'_>,
) -> sqlx::Result<i64> {
    let res = sqlx::query(SQL_INSERT_SESSION)
        .bind(session.tutor_id)
        .bind(session.subject)
        .bind(session.description)
        .bind(session.date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.location)
        .bind(session.is_remote as i64)
        .bind(session.capacity)
        .bind(session.latitude)
        .bind(session.longitude)
        .execute(executor)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn update_session(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    session: NewSession<'_>,
) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_UPDATE_SESSION)
        .bind(session_id)
        .bind(session.subject)
        .bind(session.description)
        .bind(session.date)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.location)
        .bind(session.is_remote as i64)
        .bind(session.capacity)
        .bind(session.latitude)
        .bind(session.longitude)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

pub async fn delete_session(executor: impl SqliteExecutor<'_>, session_id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE_SESSION)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

pub async fn update_session_geo(
    executor: impl SqliteExecutor<'_>,
    session_id: i64,
    coords: Option<(f64, f64)>,
) -> sqlx::Result<u64> {
    let (lat, lng) = match coords {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    let res = sqlx::query(SQL_UPDATE_SESSION_GEO)
        .bind(session_id)
        .bind(lat)
        .bind(lng)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

#[derive(Debug, Default)]
pub struct BrowseFilter<'a> {
    pub subject_like: Option<&'a str>,
    pub tutor_like: Option<&'a str>,
    pub location_like: Option<&'a str>,
    pub remote_only: bool,
    pub date: Option<&'a str>,
    pub tutor_id: Option<i64>,
}

pub async fn browse_sessions(
    pool: &SqlitePool,
    filter: BrowseFilter<'_>,
) -> sqlx::Result<Vec<SessionBrowseRow>> {
    let mut sql = String::from(SQL_BROWSE_BASE);
    let mut args = SqliteArguments::default();

    if let Some(subject) = filter.subject_like {
        sql.push_str(" AND LOWER(s.subject) LIKE ?");
        let _ = args.add(format!("%{}%", subject.to_lowercase()));
    }
    if let Some(tutor) = filter.tutor_like {
        sql.push_str(
            " AND (LOWER(u.username) LIKE ? OR LOWER(u.first_name) LIKE ? OR LOWER(u.last_name) LIKE ?)",
        );
        let like = format!("%{}%", tutor.to_lowercase());
        let _ = args.add(like.clone());
        let _ = args.add(like.clone());
        let _ = args.add(like);
    }
    if filter.remote_only {
        sql.push_str(" AND s.is_remote = 1");
    } else if let Some(location) = filter.location_like {
        sql.push_str(" AND LOWER(COALESCE(s.location, '')) LIKE ?");
        let _ = args.add(format!("%{}%", location.to_lowercase()));
    }
    if let Some(date) = filter.date {
        sql.push_str(" AND s.date = ?");
        let _ = args.add(date.to_string());
    }
    if let Some(tutor_id) = filter.tutor_id {
        sql.push_str(" AND s.tutor_id = ?");
        let _ = args.add(tutor_id);
    }

    sql.push_str(" ORDER BY s.date, s.start_time LIMIT 500");

    sqlx::query_as_with::<_, SessionBrowseRow, _>(&sql, args)
        .fetch_all(pool)
        .await
}

/// Sessions where any of the given students holds a live (pending or
/// approved) seat request. Used for the friends' sessions view.
pub async fn list_sessions_with_student_requests(
    pool: &SqlitePool,
    student_ids: &[i64],
) -> sqlx::Result<Vec<SessionBrowseRow>> {
    if student_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; student_ids.len()].join(", ");
    let sql = format!(
        "{} AND s.id IN (SELECT DISTINCT session_id FROM session_requests \
         WHERE student_id IN ({}) AND status IN ('pending', 'approved')) \
         ORDER BY s.date, s.start_time",
        SQL_BROWSE_BASE, placeholders
    );

    let mut args = SqliteArguments::default();
    for id in student_ids {
        let _ = args.add(*id);
    }

    sqlx::query_as_with::<_, SessionBrowseRow, _>(&sql, args)
        .fetch_all(pool)
        .await
}

pub async fn list_sessions_missing_geo(
    pool: &SqlitePool,
    limit: i64,
) -> sqlx::Result<Vec<TutoringSessionRow>> {
    sqlx::query_as::<_, TutoringSessionRow>(SQL_LIST_SESSIONS_MISSING_GEO)
        .bind(limit)
        .fetch_all(pool)
        .await
}
