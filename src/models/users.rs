#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsersRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}
