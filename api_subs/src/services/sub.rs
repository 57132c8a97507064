use chrono::{DateTime, Duration, Utc};
use common::error::{AppError, Res};
use db::{
    Store,
    dtos::{event::Applied, subscriber::SubscriberUpsert},
    models::{plan::Plan, subscriber::Subscriber},
};

use crate::dtos::sub::StatusResponse;

/// Column widths of `subscribers.tg_user_id` and `processed_payment_events.event_id`
/// bound these; `provider:provider_ref` must fit in the latter.
pub const MAX_TG_USER_ID_LEN: usize = 32;
pub const MAX_PROVIDER_LEN: usize = 32;
pub const MAX_PROVIDER_REF_LEN: usize = 200;

/// A confirmed payment that should switch a subscriber on.
#[derive(Debug, Clone)]
pub struct Activation {
    pub bot_id: i64,
    pub plan_id: i64,
    pub tg_user_id: String,
    /// Provider tag, e.g. `stars`, `stripe`, `paypal`.
    pub provider: String,
    /// Provider-issued payment reference, unique per provider.
    pub provider_ref: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

#[derive(Debug)]
pub enum ActivationOutcome {
    Activated(Subscriber),
    AlreadyProcessed,
}

/// Gets the plans of a bot, ordered by id.
pub async fn list_plans(store: &dyn Store, bot_id: i64) -> Res<Vec<Plan>> {
    store.get_plans_by_bot(bot_id).await
}

/// Gets the subscription status of a user.
/// A user without a subscriber row is simply inactive.
pub async fn get_status(store: &dyn Store, bot_id: i64, tg_user_id: &str) -> Res<StatusResponse> {
    validate_tg_user_id(tg_user_id)?;
    let status = match store.get_subscriber(bot_id, tg_user_id).await? {
        Some(sub) => StatusResponse {
            active: sub.active,
            plan_id: Some(sub.plan_id),
            current_period_end: sub.current_period_end,
        },
        None => StatusResponse {
            active: false,
            plan_id: None,
            current_period_end: None,
        },
    };
    Ok(status)
}

/// Rejects chat user ids that cannot be stored.
pub fn validate_tg_user_id(tg_user_id: &str) -> Res<()> {
    if tg_user_id.trim().is_empty() {
        return Err(AppError::BadRequest("tg_user_id must not be empty".to_string()));
    }
    if tg_user_id.len() > MAX_TG_USER_ID_LEN {
        return Err(AppError::BadRequest(format!(
            "tg_user_id must be at most {} bytes",
            MAX_TG_USER_ID_LEN
        )));
    }
    Ok(())
}

fn validate_reference(provider: &str, provider_ref: &str) -> Res<()> {
    if provider.trim().is_empty() || provider_ref.trim().is_empty() {
        return Err(AppError::BadRequest(
            "provider and provider_ref must not be empty".to_string(),
        ));
    }
    if provider.len() > MAX_PROVIDER_LEN || provider_ref.len() > MAX_PROVIDER_REF_LEN {
        return Err(AppError::BadRequest(format!(
            "provider must be at most {} bytes and provider_ref at most {} bytes",
            MAX_PROVIDER_LEN, MAX_PROVIDER_REF_LEN
        )));
    }
    Ok(())
}

/// Dedup key of a payment confirmation.
pub fn event_key(provider: &str, provider_ref: &str) -> String {
    format!("{}:{}", provider, provider_ref)
}

/// Marks the subscriber active for the given plan.
///
/// Idempotent on (provider, provider_ref): the event marker and the subscriber
/// write commit together, so a reference that was already applied returns
/// `AlreadyProcessed` and a failed attempt leaves nothing behind to retry over.
pub async fn activate(store: &dyn Store, req: Activation) -> Res<ActivationOutcome> {
    validate_tg_user_id(&req.tg_user_id)?;
    validate_reference(&req.provider, &req.provider_ref)?;

    let plan = store
        .get_plan_for_bot(req.bot_id, req.plan_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("plan {} for bot {}", req.plan_id, req.bot_id))
        })?;

    let event_id = event_key(&req.provider, &req.provider_ref);
    let upsert = SubscriberUpsert {
        bot_id: req.bot_id,
        tg_user_id: req.tg_user_id,
        plan_id: plan.id,
        active: true,
        current_period_end: Some(period_end(&plan.interval, Utc::now())),
        stripe_customer_id: req.stripe_customer_id,
        stripe_subscription_id: req.stripe_subscription_id,
    };

    match store.apply_payment(&event_id, upsert).await? {
        Applied::Applied(subscriber) => {
            log::info!(
                "Activated user {} on bot {} with plan {} via {}",
                subscriber.tg_user_id,
                subscriber.bot_id,
                subscriber.plan_id,
                req.provider
            );
            Ok(ActivationOutcome::Activated(subscriber))
        }
        Applied::Duplicate => {
            log::info!("Payment {} already applied, skipping", event_id);
            Ok(ActivationOutcome::AlreadyProcessed)
        }
    }
}

/// End of the paid period that starts at `from`. Unknown intervals count as a month.
pub fn period_end(interval: &str, from: DateTime<Utc>) -> DateTime<Utc> {
    let days = match interval.to_lowercase().as_str() {
        "day" => 1,
        "week" => 7,
        "year" => 365,
        _ => 30,
    };
    from + Duration::days(days)
}
