use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::{dtos::plan::PlanCreateRequest, models::plan::Plan};

pub async fn get_plans_by_bot_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    bot_id: i64,
) -> Res<Vec<Plan>> {
    sqlx::query_as::<_, Plan>(
        "SELECT id, bot_id, name, price_cents, interval FROM plans WHERE bot_id = $1 ORDER BY id",
    )
    .bind(bot_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Returns the plan only if it exists and belongs to `bot_id`.
pub async fn get_plan_for_bot<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    bot_id: i64,
    plan_id: i64,
) -> Res<Option<Plan>> {
    sqlx::query_as::<_, Plan>(
        "SELECT id, bot_id, name, price_cents, interval FROM plans WHERE id = $1 AND bot_id = $2",
    )
    .bind(plan_id)
    .bind(bot_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_plan<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: PlanCreateRequest,
) -> Res<Plan> {
    sqlx::query_as::<_, Plan>(
        r#"
        INSERT INTO plans (bot_id, name, price_cents, interval)
        VALUES ($1, $2, $3, $4)
        RETURNING id, bot_id, name, price_cents, interval
        "#,
    )
    .bind(data.bot_id)
    .bind(data.name)
    .bind(data.price_cents)
    .bind(data.interval)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
