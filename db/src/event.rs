use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::dtos::event::EventInsert;

pub async fn insert_event<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    event_id: &str,
) -> Res<EventInsert> {
    let result = sqlx::query(
        "INSERT INTO processed_payment_events (event_id) VALUES ($1) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    if result.rows_affected() == 0 {
        Ok(EventInsert::Duplicate)
    } else {
        Ok(EventInsert::Recorded)
    }
}
