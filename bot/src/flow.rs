//! Purchase flow of the bot, independent of the Telegram transport.
//!
//! Handlers turn updates into [`Inbound`] events; [`Flow::handle`] answers
//! with the [`Outbound`] actions to perform. Per-user progress is:
//! plans shown, plan picked (pending selection stored), payment method
//! picked, then either an invoice awaiting payment or a PayPal link.

use std::sync::Arc;

use common::env_config::BotConfig;

use crate::{
    backend::{ActivationRequest, ApprovalRequest, BackendApi, BackendError, PlanInfo},
    payload::StarsPayload,
    pricing::{self, StarsPricing},
    session::SessionStore,
};

pub const STARS_CURRENCY: &str = "XTR";
pub const STARS_PROVIDER: &str = "stars";

pub const HELP_TEXT: &str = "Available commands:\n\
    /start - welcome, subscription status and plans\n\
    /subscribe - choose a plan and pay\n\
    /plans - list the plans\n\
    /help - this message";

#[derive(Debug, Clone, PartialEq)]
pub struct UserRef {
    pub id: u64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Start(UserRef),
    ShowPlans(UserRef),
    Help,
    Callback {
        user: UserRef,
        data: String,
    },
    PreCheckout {
        user: UserRef,
        payload: String,
        currency: String,
        total_amount: i64,
    },
    PaymentSucceeded {
        user: UserRef,
        payload: String,
        charge_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    /// Private chat the invoice goes to.
    pub user_id: u64,
    pub title: String,
    pub description: String,
    pub payload: String,
    pub currency: String,
    pub label: String,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Text with one inline button per row.
    Choices { text: String, buttons: Vec<Button> },
    Invoice(Invoice),
    /// `Err` carries the reason shown to the payer.
    PreCheckoutAnswer(Result<(), String>),
}

/// Callback data attached to the inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Plan(i64),
    PayStars,
    PayPaypal,
    Unknown,
}

impl Callback {
    pub fn parse(data: &str) -> Self {
        match data {
            "pay:stars" => Callback::PayStars,
            "pay:paypal" => Callback::PayPaypal,
            _ => data
                .strip_prefix("plan:")
                .and_then(|id| id.parse().ok())
                .map(Callback::Plan)
                .unwrap_or(Callback::Unknown),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub bot_id: i64,
    pub pricing: StarsPricing,
    pub stars_title: String,
    pub stars_description: String,
    pub benefits_basic_url: String,
    pub benefits_vip_url: String,
}

impl FlowSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            bot_id: config.bot_id,
            pricing: StarsPricing::from_config(config),
            stars_title: config.stars_title.clone(),
            stars_description: config.stars_description.clone(),
            benefits_basic_url: config.benefits_basic_url.clone(),
            benefits_vip_url: config.benefits_vip_url.clone(),
        }
    }

    fn benefits_url(&self, plan_name: &str) -> &str {
        if pricing::is_vip(plan_name) {
            &self.benefits_vip_url
        } else {
            &self.benefits_basic_url
        }
    }
}

pub struct Flow {
    backend: Arc<dyn BackendApi>,
    sessions: SessionStore,
    settings: FlowSettings,
}

fn text(msg: impl Into<String>) -> Vec<Outbound> {
    vec![Outbound::Text(msg.into())]
}

fn plan_buttons(plans: &[PlanInfo]) -> Vec<Button> {
    plans
        .iter()
        .map(|plan| Button {
            label: format!("{} (choose payment)", plan.name),
            data: format!("plan:{}", plan.id),
        })
        .collect()
}

const NO_PLAN_SELECTED: &str = "⚠️ No plan selected. Use /subscribe.";

impl Flow {
    pub fn new(backend: Arc<dyn BackendApi>, sessions: SessionStore, settings: FlowSettings) -> Self {
        Self {
            backend,
            sessions,
            settings,
        }
    }

    pub async fn handle(&self, inbound: Inbound) -> Vec<Outbound> {
        match inbound {
            Inbound::Start(user) => self.start(&user).await,
            Inbound::ShowPlans(_) => self.show_plans().await,
            Inbound::Help => text(HELP_TEXT),
            Inbound::Callback { user, data } => match Callback::parse(&data) {
                Callback::Plan(plan_id) => self.select_plan(&user, plan_id),
                Callback::PayStars => self.pay_stars(&user).await,
                Callback::PayPaypal => self.pay_paypal(&user).await,
                Callback::Unknown => {
                    log::debug!("Ignoring callback `{}` from user {}", data, user.id);
                    Vec::new()
                }
            },
            Inbound::PreCheckout {
                user,
                payload,
                currency,
                total_amount,
            } => {
                let answer = self
                    .check_pre_checkout(&user, &payload, &currency, total_amount)
                    .await;
                if let Err(reason) = &answer {
                    log::warn!("Rejected pre-checkout of user {}: {}", user.id, reason);
                }
                vec![Outbound::PreCheckoutAnswer(answer)]
            }
            Inbound::PaymentSucceeded {
                user,
                payload,
                charge_id,
            } => self.payment_succeeded(&user, &payload, charge_id).await,
        }
    }

    async fn start(&self, user: &UserRef) -> Vec<Outbound> {
        let tg_user_id = user.id.to_string();
        let fetched = tokio::try_join!(
            self.backend.plans(self.settings.bot_id),
            self.backend.status(self.settings.bot_id, &tg_user_id),
        );
        let (plans, status) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                log::error!("Backend unavailable on /start: {}", err);
                return text(format!(
                    "⚠️ Backend isn't reachable. Please try again later.\nError: {}",
                    err
                ));
            }
        };

        let status_text = match (status.active, status.current_period_end) {
            (true, Some(end)) => format!("Subscribed ✅ (until {})", end.format("%Y-%m-%d")),
            (true, None) => "Subscribed ✅".to_string(),
            (false, _) => "Not subscribed".to_string(),
        };
        let first_name = if user.first_name.is_empty() {
            "there"
        } else {
            user.first_name.as_str()
        };

        let mut lines = vec![
            format!("👋 Welcome, {}!", first_name),
            String::new(),
            format!("🔒 Status: {}", status_text),
            String::new(),
            "Choose a plan:".to_string(),
        ];
        for plan in &plans {
            match self.settings.benefits_url(&plan.name) {
                "" => lines.push(format!("• {} ({})", plan.name, plan.interval)),
                url => lines.push(format!("• {} ({}): {}", plan.name, plan.interval, url)),
            }
        }
        lines.push(String::new());
        lines.push("⭐ Pay with Telegram Stars or 🅿️ PayPal Subscription".to_string());
        lines.push("➡️ Buy here: /subscribe".to_string());

        let body = lines.join("\n");
        if plans.is_empty() {
            return text(body);
        }
        vec![Outbound::Choices {
            text: body,
            buttons: plan_buttons(&plans),
        }]
    }

    async fn show_plans(&self) -> Vec<Outbound> {
        match self.backend.plans(self.settings.bot_id).await {
            Ok(plans) if plans.is_empty() => text("No plans are available right now."),
            Ok(plans) => vec![Outbound::Choices {
                text: "Select a plan:".to_string(),
                buttons: plan_buttons(&plans),
            }],
            Err(err) => {
                log::error!("Failed to load plans: {}", err);
                text(format!("⚠️ Can't load plans.\nError: {}", err))
            }
        }
    }

    fn select_plan(&self, user: &UserRef, plan_id: i64) -> Vec<Outbound> {
        self.sessions.select(self.settings.bot_id, user.id, plan_id);
        vec![Outbound::Choices {
            text: "Choose a payment method:".to_string(),
            buttons: vec![
                Button {
                    label: "⭐ Pay with Telegram Stars".to_string(),
                    data: "pay:stars".to_string(),
                },
                Button {
                    label: "🅿️ Pay with PayPal Subscription".to_string(),
                    data: "pay:paypal".to_string(),
                },
            ],
        }]
    }

    async fn find_plan(&self, plan_id: i64) -> Result<Option<PlanInfo>, BackendError> {
        let plans = self.backend.plans(self.settings.bot_id).await?;
        Ok(plans.into_iter().find(|p| p.id == plan_id))
    }

    async fn pay_stars(&self, user: &UserRef) -> Vec<Outbound> {
        let bot_id = self.settings.bot_id;
        let Some(plan_id) = self.sessions.pending_plan(bot_id, user.id) else {
            return text(NO_PLAN_SELECTED);
        };

        let plan = match self.find_plan(plan_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                self.sessions.clear(bot_id, user.id);
                return text("⚠️ Plan not found. Use /subscribe again.");
            }
            Err(err) => {
                log::error!("Failed to load plans for invoice: {}", err);
                return text(format!("⚠️ Can't load plans.\nError: {}", err));
            }
        };

        let payload = StarsPayload {
            bot_id,
            plan_id: plan.id,
            user_id: user.id,
        };
        log::info!("Sending Stars invoice {} to user {}", payload, user.id);
        vec![Outbound::Invoice(Invoice {
            user_id: user.id,
            title: self.settings.stars_title.clone(),
            description: self.settings.stars_description.clone(),
            payload: payload.to_string(),
            currency: STARS_CURRENCY.to_string(),
            amount: self.settings.pricing.amount_for(&plan.name),
            label: plan.name,
        })]
    }

    async fn pay_paypal(&self, user: &UserRef) -> Vec<Outbound> {
        let bot_id = self.settings.bot_id;
        let Some(plan_id) = self.sessions.pending_plan(bot_id, user.id) else {
            return text(NO_PLAN_SELECTED);
        };

        let req = ApprovalRequest {
            bot_id,
            plan_id,
            tg_user_id: user.id.to_string(),
            tg_username: user.username.clone().unwrap_or_default(),
        };
        match self.backend.paypal_approval(&req).await {
            Ok(approve_url) => {
                self.sessions.clear(bot_id, user.id);
                text(format!(
                    "🅿️ Complete PayPal subscription here:\n{}",
                    approve_url
                ))
            }
            Err(err) => {
                log::error!("PayPal approval failed for user {}: {}", user.id, err);
                text(format!("⚠️ PayPal error:\n{}", err))
            }
        }
    }

    /// Invoices are only accepted while they still match what this bot would
    /// issue now: own payload, own bot, Stars currency, existing plan, current price.
    async fn check_pre_checkout(
        &self,
        user: &UserRef,
        payload: &str,
        currency: &str,
        total_amount: i64,
    ) -> Result<(), String> {
        let payload: StarsPayload = payload
            .parse()
            .map_err(|err| format!("Unknown payment: {}", err))?;
        if payload.bot_id != self.settings.bot_id || payload.user_id != user.id {
            return Err("This invoice was not issued for you.".to_string());
        }
        if currency != STARS_CURRENCY {
            return Err(format!("Unsupported currency {}.", currency));
        }

        let plan = match self.find_plan(payload.plan_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => return Err("This plan is no longer available.".to_string()),
            Err(err) => {
                log::error!("Failed to load plans for pre-checkout: {}", err);
                return Err("Payments are temporarily unavailable. Please try again later.".to_string());
            }
        };
        if i64::from(self.settings.pricing.amount_for(&plan.name)) != total_amount {
            return Err("The price has changed. Please request a new invoice.".to_string());
        }
        Ok(())
    }

    async fn payment_succeeded(&self, user: &UserRef, payload: &str, charge_id: String) -> Vec<Outbound> {
        let payload: StarsPayload = match payload.parse() {
            Ok(payload) => payload,
            Err(err) => {
                log::error!(
                    "Unparsable payment payload `{}` (charge {}): {}",
                    payload,
                    charge_id,
                    err
                );
                return text(
                    "✅ Payment received, but the payment reference could not be parsed. Please contact support.",
                );
            }
        };

        let req = ActivationRequest {
            bot_id: payload.bot_id,
            plan_id: payload.plan_id,
            tg_user_id: payload.user_id.to_string(),
            provider: STARS_PROVIDER.to_string(),
            provider_ref: charge_id,
        };
        let result = match self.backend.activate(&req).await {
            Ok(result) if result.ok => result,
            Ok(_) => {
                log::error!("Backend declined activation of {}", payload);
                return text("✅ Payment received, but activation failed. Please contact support.");
            }
            Err(err) => {
                log::error!("Activation of {} failed: {}", payload, err);
                return text("✅ Payment received, but activation failed. Please contact support.");
            }
        };
        self.sessions.clear(self.settings.bot_id, user.id);

        let mut message = if result.already_processed {
            "✅ This payment was already applied. Your subscription is active.".to_string()
        } else {
            "✅ Payment received! Subscription activated.".to_string()
        };
        match self.find_plan(payload.plan_id).await {
            Ok(Some(plan)) => {
                let url = self.settings.benefits_url(&plan.name);
                if !url.is_empty() {
                    message.push_str(&format!("\n\n🔗 Your benefits: {}", url));
                }
            }
            Ok(None) => {}
            Err(err) => log::warn!("Could not resolve benefits link: {}", err),
        }
        text(message)
    }
}
