use serde::Serialize;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Bot {
    pub id: i64,
    pub name: String,
    pub telegram_username: String,
}
