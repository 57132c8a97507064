use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use sqlx::PgPool;

use crate::{
    dtos::{
        event::{Applied, EventInsert},
        plan::PlanCreateRequest,
        subscriber::SubscriberUpsert,
    },
    models::{bot::Bot, plan::Plan, subscriber::Subscriber},
};

/// Persistence used by the backend API.
///
/// Absence is always `Ok(None)`; an `Err` means the store itself failed.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_bot(&self, name: &str, telegram_username: &str) -> Res<Bot>;
    async fn get_bot_by_username(&self, telegram_username: &str) -> Res<Option<Bot>>;

    async fn create_plan(&self, data: PlanCreateRequest) -> Res<Plan>;
    async fn get_plans_by_bot(&self, bot_id: i64) -> Res<Vec<Plan>>;
    async fn get_plan_for_bot(&self, bot_id: i64, plan_id: i64) -> Res<Option<Plan>>;

    async fn get_subscriber(&self, bot_id: i64, tg_user_id: &str) -> Res<Option<Subscriber>>;

    /// Records `event_id` and upserts the subscriber as one unit.
    /// A known `event_id` leaves the subscriber untouched.
    async fn apply_payment(&self, event_id: &str, data: SubscriberUpsert)
    -> Res<Applied<Subscriber>>;

    /// Records `event_id` and deactivates every subscriber billed through
    /// `stripe_subscription_id` as one unit. Yields the affected row count.
    async fn apply_cancellation(
        &self,
        event_id: &str,
        stripe_subscription_id: &str,
    ) -> Res<Applied<u64>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_bot(&self, name: &str, telegram_username: &str) -> Res<Bot> {
        crate::bot::insert_bot(&*self.pool, name, telegram_username).await
    }

    async fn get_bot_by_username(&self, telegram_username: &str) -> Res<Option<Bot>> {
        crate::bot::get_bot_by_username(&*self.pool, telegram_username).await
    }

    async fn create_plan(&self, data: PlanCreateRequest) -> Res<Plan> {
        crate::plan::insert_plan(&*self.pool, data).await
    }

    async fn get_plans_by_bot(&self, bot_id: i64) -> Res<Vec<Plan>> {
        crate::plan::get_plans_by_bot_id(&*self.pool, bot_id).await
    }

    async fn get_plan_for_bot(&self, bot_id: i64, plan_id: i64) -> Res<Option<Plan>> {
        crate::plan::get_plan_for_bot(&*self.pool, bot_id, plan_id).await
    }

    async fn get_subscriber(&self, bot_id: i64, tg_user_id: &str) -> Res<Option<Subscriber>> {
        crate::subscriber::get_subscriber(&*self.pool, bot_id, tg_user_id).await
    }

    async fn apply_payment(
        &self,
        event_id: &str,
        data: SubscriberUpsert,
    ) -> Res<Applied<Subscriber>> {
        let mut tx = self.pool.begin().await?;
        if crate::event::insert_event(&mut *tx, event_id).await? == EventInsert::Duplicate {
            tx.rollback().await?;
            return Ok(Applied::Duplicate);
        }
        let subscriber = crate::subscriber::upsert_subscriber(&mut *tx, data).await?;
        tx.commit().await?;
        Ok(Applied::Applied(subscriber))
    }

    async fn apply_cancellation(
        &self,
        event_id: &str,
        stripe_subscription_id: &str,
    ) -> Res<Applied<u64>> {
        let mut tx = self.pool.begin().await?;
        if crate::event::insert_event(&mut *tx, event_id).await? == EventInsert::Duplicate {
            tx.rollback().await?;
            return Ok(Applied::Duplicate);
        }
        let affected =
            crate::subscriber::deactivate_by_stripe_subscription(&mut *tx, stripe_subscription_id)
                .await?;
        tx.commit().await?;
        Ok(Applied::Applied(affected))
    }
}
