use chrono::{DateTime, Utc};
use db::models::plan::Plan;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanResponse {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub interval: String,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            price_cents: plan.price_cents,
            interval: plan.interval,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub bot_id: i64,
    pub tg_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub active: bool,
    pub plan_id: Option<i64>,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    pub provider: String,
    pub provider_ref: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub ok: bool,
    /// True when this provider reference had already been applied.
    pub already_processed: bool,
}
