use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

use crate::{dtos::subscriber::SubscriberUpsert, models::subscriber::Subscriber};

const SELECT_COLS: &str = r#"
    id, bot_id, tg_user_id, plan_id, active, current_period_end,
    stripe_customer_id, stripe_subscription_id, created_at, updated_at
"#;

pub async fn get_subscriber<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    bot_id: i64,
    tg_user_id: &str,
) -> Res<Option<Subscriber>> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE bot_id = $1 AND tg_user_id = $2",
        SELECT_COLS
    ))
    .bind(bot_id)
    .bind(tg_user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Inserts or updates the subscriber row for (bot_id, tg_user_id) in one
/// statement. Concurrent first inserts collapse onto the unique constraint:
/// the loser takes the `DO UPDATE` branch against the winner's row.
pub async fn upsert_subscriber<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriberUpsert,
) -> Res<Subscriber> {
    sqlx::query_as::<_, Subscriber>(&format!(
        r#"
        INSERT INTO subscribers
            (bot_id, tg_user_id, plan_id, active, current_period_end,
             stripe_customer_id, stripe_subscription_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (bot_id, tg_user_id) DO UPDATE SET
            plan_id = EXCLUDED.plan_id,
            active = EXCLUDED.active,
            current_period_end = COALESCE(EXCLUDED.current_period_end, subscribers.current_period_end),
            stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscribers.stripe_customer_id),
            stripe_subscription_id = COALESCE(EXCLUDED.stripe_subscription_id, subscribers.stripe_subscription_id),
            updated_at = NOW()
        RETURNING {}
        "#,
        SELECT_COLS
    ))
    .bind(data.bot_id)
    .bind(data.tg_user_id)
    .bind(data.plan_id)
    .bind(data.active)
    .bind(data.current_period_end)
    .bind(data.stripe_customer_id)
    .bind(data.stripe_subscription_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn deactivate_by_stripe_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    stripe_subscription_id: &str,
) -> Res<u64> {
    let result = sqlx::query(
        "UPDATE subscribers SET active = FALSE, updated_at = NOW() WHERE stripe_subscription_id = $1",
    )
    .bind(stripe_subscription_id)
    .execute(executor)
    .await
    .map_err(AppError::from)?;

    Ok(result.rows_affected())
}
