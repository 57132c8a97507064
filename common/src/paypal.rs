use std::{collections::HashMap, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    env_config::PaypalConfig,
    error::{AppError, Res},
};

/// Minimal PayPal REST client: just enough to start a billing subscription
/// and hand back the buyer approval link.
#[derive(Clone)]
pub struct PaypalClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    plan_ids: HashMap<i64, String>,
    return_url: String,
    cancel_url: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct CreateSubscription<'a> {
    plan_id: &'a str,
    custom_id: String,
    subscriber: Subscriber<'a>,
    application_context: ApplicationContext<'a>,
}

#[derive(Serialize)]
struct Subscriber<'a> {
    name: SubscriberName<'a>,
}

#[derive(Serialize)]
struct SubscriberName<'a> {
    given_name: &'a str,
}

#[derive(Serialize)]
struct ApplicationContext<'a> {
    user_action: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

impl SubscriptionResponse {
    /// The `approve` link the buyer must open to confirm the subscription.
    pub fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.as_str())
    }
}

impl PaypalClient {
    pub fn new(config: &PaypalConfig) -> Res<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            plan_ids: config.plan_ids.clone(),
            return_url: config.return_url.clone(),
            cancel_url: config.cancel_url.clone(),
        })
    }

    async fn access_token(&self) -> Res<String> {
        let res = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("PayPal token request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "PayPal token request returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = res.json().await.map_err(|e| {
            AppError::MalformedProviderResponse(format!("PayPal token response: {}", e))
        })?;
        Ok(token.access_token)
    }

    /// Creates a PayPal subscription for a local plan and returns the approval URL.
    pub async fn create_subscription(
        &self,
        bot_id: i64,
        plan_id: i64,
        tg_user_id: &str,
        tg_username: &str,
    ) -> Res<String> {
        let paypal_plan_id = self.plan_ids.get(&plan_id).ok_or_else(|| {
            AppError::Gateway(format!("no PayPal plan configured for plan {}", plan_id))
        })?;

        let token = self.access_token().await?;

        let given_name = if tg_username.is_empty() {
            tg_user_id
        } else {
            tg_username
        };
        let body = CreateSubscription {
            plan_id: paypal_plan_id,
            custom_id: format!("{}:{}:{}", bot_id, plan_id, tg_user_id),
            subscriber: Subscriber {
                name: SubscriberName { given_name },
            },
            application_context: ApplicationContext {
                user_action: "SUBSCRIBE_NOW",
                return_url: &self.return_url,
                cancel_url: &self.cancel_url,
            },
        };

        let res = self
            .http
            .post(format!("{}/v1/billing/subscriptions", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("PayPal subscription request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!(
                "PayPal subscription request returned {}: {}",
                status, body
            )));
        }

        let sub: SubscriptionResponse = res.json().await.map_err(|e| {
            AppError::MalformedProviderResponse(format!("PayPal subscription response: {}", e))
        })?;

        log::info!(
            "Created PayPal subscription {} for user {} (plan {})",
            sub.id.as_deref().unwrap_or("?"),
            tg_user_id,
            plan_id
        );

        sub.approve_url().map(str::to_string).ok_or_else(|| {
            AppError::MalformedProviderResponse("PayPal response has no approve link".to_string())
        })
    }
}
