use std::collections::HashMap;

use common::{
    billing::{ApprovalRequest, BillingGateway},
    error::{AppError, Res},
};
use db::{Store, dtos::event::Applied};
use stripe::{Event, EventObject, EventType};

use crate::{
    dtos::pay::{CheckoutRequest, PaypalSubscriptionRequest},
    services::sub::{self, Activation},
};

/// Creates a recurring-billing approval link for a plan of the bot.
/// The gateway is only called once the plan is known to belong to the bot.
pub async fn create_paypal_approval(
    store: &dyn Store,
    gateway: &dyn BillingGateway,
    req: PaypalSubscriptionRequest,
) -> Res<String> {
    sub::validate_tg_user_id(&req.tg_user_id)?;
    store
        .get_plan_for_bot(req.bot_id, req.plan_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("plan {} for bot {}", req.plan_id, req.bot_id))
        })?;

    gateway
        .create_subscription_approval(&ApprovalRequest {
            bot_id: req.bot_id,
            plan_id: req.plan_id,
            tg_user_id: req.tg_user_id,
            tg_username: req.tg_username,
        })
        .await
}

/// Creates a one-time card checkout session for a plan of the bot.
/// The metadata lets the webhook map the completed session back to the user.
pub async fn create_checkout(
    store: &dyn Store,
    gateway: &dyn BillingGateway,
    req: CheckoutRequest,
) -> Res<String> {
    sub::validate_tg_user_id(&req.tg_user_id)?;
    let plan = store
        .get_plan_for_bot(req.bot_id, req.plan_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("plan {} for bot {}", req.plan_id, req.bot_id))
        })?;

    let metadata = HashMap::from([
        ("bot_id".to_string(), req.bot_id.to_string()),
        ("plan_id".to_string(), plan.id.to_string()),
        ("tg_user_id".to_string(), req.tg_user_id),
    ]);

    gateway
        .create_checkout_session(&plan.name, plan.price_cents, metadata)
        .await
}

/// The parts of a completed checkout session needed to activate a subscriber.
#[derive(Debug, Clone, Default)]
pub struct CheckoutCompletion {
    pub session_id: String,
    pub metadata: HashMap<String, String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

/// Activates the subscriber described by the session metadata.
/// Sessions without usable metadata are logged and skipped.
pub async fn apply_checkout_completion(store: &dyn Store, done: CheckoutCompletion) -> Res<()> {
    let parse_id = |key: &str| done.metadata.get(key).and_then(|v| v.parse::<i64>().ok());
    let (Some(bot_id), Some(plan_id), Some(tg_user_id)) = (
        parse_id("bot_id"),
        parse_id("plan_id"),
        done.metadata.get("tg_user_id").cloned(),
    ) else {
        log::warn!(
            "Checkout session {} has no subscriber metadata, ignoring",
            done.session_id
        );
        return Ok(());
    };
    if let Err(err) = sub::validate_tg_user_id(&tg_user_id) {
        log::warn!("Checkout session {} has an unusable user id: {}", done.session_id, err);
        return Ok(());
    }

    sub::activate(
        store,
        Activation {
            bot_id,
            plan_id,
            tg_user_id,
            provider: "stripe".to_string(),
            provider_ref: done.session_id,
            stripe_customer_id: done.customer_id,
            stripe_subscription_id: done.subscription_id,
        },
    )
    .await?;
    Ok(())
}

/// What a verified webhook event asks of the store.
#[derive(Debug, Clone)]
pub enum WebhookAction {
    CheckoutCompleted(CheckoutCompletion),
    /// Carries the Stripe subscription id.
    SubscriptionDeleted(String),
    Ignored,
}

pub fn webhook_action(event: &Event) -> WebhookAction {
    match (&event.type_, &event.data.object) {
        (EventType::CheckoutSessionCompleted, EventObject::CheckoutSession(session)) => {
            WebhookAction::CheckoutCompleted(CheckoutCompletion {
                session_id: session.id.to_string(),
                metadata: session.metadata.clone().unwrap_or_default(),
                customer_id: session.customer.as_ref().map(|c| c.id().to_string()),
                subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
            })
        }
        (EventType::CustomerSubscriptionDeleted, EventObject::Subscription(subscription)) => {
            WebhookAction::SubscriptionDeleted(subscription.id.to_string())
        }
        _ => WebhookAction::Ignored,
    }
}

/// Applies a webhook action at most once.
///
/// Completed checkouts are keyed by their session, so a session reported by
/// several events activates once. Everything else is keyed by `event_id`.
pub async fn apply_webhook_action(
    store: &dyn Store,
    event_id: &str,
    action: WebhookAction,
) -> Res<()> {
    match action {
        WebhookAction::CheckoutCompleted(done) => apply_checkout_completion(store, done).await,
        WebhookAction::SubscriptionDeleted(subscription_id) => {
            let key = sub::event_key("stripe", event_id);
            match store.apply_cancellation(&key, &subscription_id).await? {
                Applied::Applied(affected) => log::info!(
                    "Subscription {} deleted, {} subscriber(s) deactivated",
                    subscription_id,
                    affected
                ),
                Applied::Duplicate => log::info!("Webhook event {} already processed", key),
            }
            Ok(())
        }
        WebhookAction::Ignored => Ok(()),
    }
}

/// Processes a verified webhook event.
pub async fn process_webhook_event(store: &dyn Store, event: Event) -> Res<()> {
    log::info!("Processing webhook event {}: {}", event.id.as_str(), event.type_);
    let action = webhook_action(&event);
    if matches!(action, WebhookAction::Ignored) {
        log::info!("Unhandled event type: {}", event.type_);
    }
    apply_webhook_action(store, event.id.as_str(), action).await
}
