use sqlx::SqlitePool;

use crate::models::UsersRow;

const SQL_LOAD_USER_BY_ID: &str = r#"
SELECT id, username, first_name, last_name, email
FROM users
WHERE id = ?1
"#;

pub async fn load_user_by_id(pool: &SqlitePool, user_id: i64) -> sqlx::Result<Option<UsersRow>> {
    sqlx::query_as::<_, UsersRow>(SQL_LOAD_USER_BY_ID)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_users_by_ids(pool: &SqlitePool, ids: &[i64]) -> sqlx::Result<Vec<UsersRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, username, first_name, last_name, email FROM users \
         WHERE id IN ({}) ORDER BY LOWER(username)",
        placeholders
    );
    let mut query = sqlx::query_as::<_, UsersRow>(&sql);
    for id in ids {
        query = query.bind(*id);
    }
    query.fetch_all(pool).await
}
