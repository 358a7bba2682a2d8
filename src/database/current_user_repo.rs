use sqlx::SqlitePool;

const SQL_LOAD_CURRENT_USER: &str = r#"
SELECT user_id FROM current_user LIMIT 1
"#;

pub async fn load_current_user_id(pool: &SqlitePool) -> sqlx::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(SQL_LOAD_CURRENT_USER)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id,)| id))
}
