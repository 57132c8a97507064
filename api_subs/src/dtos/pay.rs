use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PaypalSubscriptionRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    #[serde(default)]
    pub tg_username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approve_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub url: String,
}
