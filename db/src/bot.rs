use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::models::bot::Bot;

pub async fn get_bot_by_username<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    telegram_username: &str,
) -> Res<Option<Bot>> {
    sqlx::query_as::<_, Bot>(
        "SELECT id, name, telegram_username FROM bots WHERE telegram_username = $1",
    )
    .bind(telegram_username)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_bot<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    name: &str,
    telegram_username: &str,
) -> Res<Bot> {
    sqlx::query_as::<_, Bot>(
        r#"
        INSERT INTO bots (name, telegram_username)
        VALUES ($1, $2)
        RETURNING id, name, telegram_username
        "#,
    )
    .bind(name)
    .bind(telegram_username)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
