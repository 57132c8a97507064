use chrono::{DateTime, Utc};

/// Fields written by an upsert on (bot_id, tg_user_id).
///
/// `active` and `plan_id` always overwrite. The optional fields only
/// overwrite when `Some`; `None` keeps whatever the row already holds.
#[derive(Debug, Clone)]
pub struct SubscriberUpsert {
    pub bot_id: i64,
    pub tg_user_id: String,
    pub plan_id: i64,
    pub active: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}
