use serde::Serialize;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Plan {
    pub id: i64,
    pub bot_id: i64,
    pub name: String,
    pub price_cents: i64,
    pub interval: String,
}
