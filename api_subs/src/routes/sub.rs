use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{error::Res, http::Success};
use db::Store;

use crate::{
    dtos::sub::{ActivateRequest, ActivateResponse, StatusQuery},
    services::{
        self,
        sub::{Activation, ActivationOutcome},
    },
};

/// Returns the subscription status of a chat user.
///
/// # Input
/// - `query`: `bot_id` and `tg_user_id`
///
/// # Output
/// - Success: `{active, plan_id, current_period_end}`; users who never
///   subscribed get `active: false`
/// - Error: 400 for a malformed query, 503 when the store is unreachable
#[get("/status")]
pub async fn get_status(
    query: web::Query<StatusQuery>,
    store: web::Data<Arc<dyn Store>>,
) -> Res<impl Responder> {
    let status =
        services::sub::get_status(store.get_ref().as_ref(), query.bot_id, &query.tg_user_id)
            .await?;
    Success::ok(status)
}

/// Activates a subscription after a confirmed payment.
///
/// # Input
/// - `req`: `{bot_id, plan_id, tg_user_id, provider, provider_ref}`
///
/// # Output
/// - Success: `{ok: true, already_processed}`; repeating a call with the same
///   provider reference succeeds without changing anything
/// - Error: 400 for a malformed body, 404 for a plan the bot does not own,
///   503 when the store is unreachable (safe to retry)
#[post("/activate")]
pub async fn post_activate(
    req: web::Json<ActivateRequest>,
    store: web::Data<Arc<dyn Store>>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    let outcome = services::sub::activate(
        store.get_ref().as_ref(),
        Activation {
            bot_id: req.bot_id,
            plan_id: req.plan_id,
            tg_user_id: req.tg_user_id,
            provider: req.provider,
            provider_ref: req.provider_ref,
            stripe_customer_id: None,
            stripe_subscription_id: None,
        },
    )
    .await?;

    Success::ok(ActivateResponse {
        ok: true,
        already_processed: matches!(outcome, ActivationOutcome::AlreadyProcessed),
    })
}
