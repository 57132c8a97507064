use std::collections::HashMap;

use async_trait::async_trait;

use crate::{env_config::Config, error::Res, paypal::PaypalClient};

/// Who is asking for a recurring subscription, and for which plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    pub tg_username: String,
}

/// Outbound calls to the payment providers. Each call is one-shot: errors are
/// returned to the caller as-is and never retried here.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// One-time card checkout. Returns the hosted checkout URL.
    async fn create_checkout_session(
        &self,
        plan_name: &str,
        price_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Res<String>;

    /// Recurring subscription. Returns the buyer approval URL.
    async fn create_subscription_approval(&self, req: &ApprovalRequest) -> Res<String>;
}

pub struct LiveBillingGateway {
    stripe: stripe::Client,
    paypal: PaypalClient,
    success_url: String,
    cancel_url: String,
}

impl LiveBillingGateway {
    pub fn from_config(config: &Config) -> Res<Self> {
        Ok(Self {
            stripe: crate::stripe::create_client(&config.stripe_secret_key),
            paypal: PaypalClient::new(&config.paypal)?,
            success_url: config.frontend_success_url.clone(),
            cancel_url: config.frontend_cancel_url.clone(),
        })
    }
}

#[async_trait]
impl BillingGateway for LiveBillingGateway {
    async fn create_checkout_session(
        &self,
        plan_name: &str,
        price_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Res<String> {
        crate::stripe::create_checkout_session(
            &self.stripe,
            plan_name,
            price_cents,
            metadata,
            &self.success_url,
            &self.cancel_url,
        )
        .await
    }

    async fn create_subscription_approval(&self, req: &ApprovalRequest) -> Res<String> {
        self.paypal
            .create_subscription(req.bot_id, req.plan_id, &req.tg_user_id, &req.tg_username)
            .await
    }
}
