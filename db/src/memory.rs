//! In-memory [`Store`] mirroring the Postgres constraints:
//! unique bot usernames, one subscriber per (bot, user), unique event ids.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;
use common::error::{AppError, Res};

use crate::{
    dtos::{event::Applied, plan::PlanCreateRequest, subscriber::SubscriberUpsert},
    models::{bot::Bot, plan::Plan, subscriber::Subscriber},
    store::Store,
};

#[derive(Default)]
struct Tables {
    bots: Vec<Bot>,
    plans: Vec<Plan>,
    subscribers: HashMap<(i64, String), Subscriber>,
    events: HashSet<String>,
    next_subscriber_id: i64,
}

impl Tables {
    fn upsert_subscriber(&mut self, data: SubscriberUpsert) -> Subscriber {
        let now = Utc::now();
        let key = (data.bot_id, data.tg_user_id.clone());

        if let Some(existing) = self.subscribers.get_mut(&key) {
            existing.plan_id = data.plan_id;
            existing.active = data.active;
            if data.current_period_end.is_some() {
                existing.current_period_end = data.current_period_end;
            }
            if data.stripe_customer_id.is_some() {
                existing.stripe_customer_id = data.stripe_customer_id;
            }
            if data.stripe_subscription_id.is_some() {
                existing.stripe_subscription_id = data.stripe_subscription_id;
            }
            existing.updated_at = now;
            return existing.clone();
        }

        self.next_subscriber_id += 1;
        let subscriber = Subscriber {
            id: self.next_subscriber_id,
            bot_id: data.bot_id,
            tg_user_id: data.tg_user_id,
            plan_id: data.plan_id,
            active: data.active,
            current_period_end: data.current_period_end,
            stripe_customer_id: data.stripe_customer_id,
            stripe_subscription_id: data.stripe_subscription_id,
            created_at: now,
            updated_at: now,
        };
        self.subscribers.insert(key, subscriber.clone());
        subscriber
    }

    fn deactivate_by_stripe_subscription(&mut self, stripe_subscription_id: &str) -> u64 {
        let mut affected = 0;
        for sub in self.subscribers.values_mut() {
            if sub.stripe_subscription_id.as_deref() == Some(stripe_subscription_id) {
                sub.active = false;
                sub.updated_at = Utc::now();
                affected += 1;
            }
        }
        affected
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriber rows across all bots.
    pub fn subscriber_count(&self) -> usize {
        self.tables.lock().unwrap().subscribers.len()
    }

    /// Number of recorded processed events.
    pub fn event_count(&self) -> usize {
        self.tables.lock().unwrap().events.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_bot(&self, name: &str, telegram_username: &str) -> Res<Bot> {
        let mut t = self.tables.lock().unwrap();
        if t.bots.iter().any(|b| b.telegram_username == telegram_username) {
            return Err(AppError::Internal(format!(
                "duplicate telegram_username {}",
                telegram_username
            )));
        }
        let bot = Bot {
            id: t.bots.len() as i64 + 1,
            name: name.to_string(),
            telegram_username: telegram_username.to_string(),
        };
        t.bots.push(bot.clone());
        Ok(bot)
    }

    async fn get_bot_by_username(&self, telegram_username: &str) -> Res<Option<Bot>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .bots
            .iter()
            .find(|b| b.telegram_username == telegram_username)
            .cloned())
    }

    async fn create_plan(&self, data: PlanCreateRequest) -> Res<Plan> {
        let mut t = self.tables.lock().unwrap();
        if !t.bots.iter().any(|b| b.id == data.bot_id) {
            return Err(AppError::Internal(format!("unknown bot {}", data.bot_id)));
        }
        let plan = Plan {
            id: t.plans.len() as i64 + 1,
            bot_id: data.bot_id,
            name: data.name,
            price_cents: data.price_cents,
            interval: data.interval,
        };
        t.plans.push(plan.clone());
        Ok(plan)
    }

    async fn get_plans_by_bot(&self, bot_id: i64) -> Res<Vec<Plan>> {
        let t = self.tables.lock().unwrap();
        Ok(t.plans.iter().filter(|p| p.bot_id == bot_id).cloned().collect())
    }

    async fn get_plan_for_bot(&self, bot_id: i64, plan_id: i64) -> Res<Option<Plan>> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .plans
            .iter()
            .find(|p| p.id == plan_id && p.bot_id == bot_id)
            .cloned())
    }

    async fn get_subscriber(&self, bot_id: i64, tg_user_id: &str) -> Res<Option<Subscriber>> {
        let t = self.tables.lock().unwrap();
        Ok(t.subscribers.get(&(bot_id, tg_user_id.to_string())).cloned())
    }

    async fn apply_payment(
        &self,
        event_id: &str,
        data: SubscriberUpsert,
    ) -> Res<Applied<Subscriber>> {
        let mut t = self.tables.lock().unwrap();
        if !t.events.insert(event_id.to_string()) {
            return Ok(Applied::Duplicate);
        }
        Ok(Applied::Applied(t.upsert_subscriber(data)))
    }

    async fn apply_cancellation(
        &self,
        event_id: &str,
        stripe_subscription_id: &str,
    ) -> Res<Applied<u64>> {
        let mut t = self.tables.lock().unwrap();
        if !t.events.insert(event_id.to_string()) {
            return Ok(Applied::Duplicate);
        }
        Ok(Applied::Applied(t.deactivate_by_stripe_subscription(stripe_subscription_id)))
    }
}
