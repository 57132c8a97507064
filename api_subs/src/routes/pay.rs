use std::sync::Arc;

use actix_web::{HttpRequest, Responder, post, web};
use common::{
    billing::BillingGateway,
    env_config::Config,
    error::{AppError, Res},
    http::Success,
    stripe,
};
use db::Store;

use crate::{
    dtos::pay::{ApprovalResponse, CheckoutRequest, CheckoutResponse, PaypalSubscriptionRequest},
    services,
};

/// Creates a PayPal subscription and returns the link the user must approve.
///
/// # Input
/// - `req`: `{bot_id, plan_id, tg_user_id, tg_username}`
///
/// # Output
/// - Success: `{approve_url}`
/// - Error: 404 if the plan does not exist or belongs to another bot (PayPal
///   is not called), 502 if PayPal fails or answers without an approve link
#[post("/create-subscription")]
pub async fn post_create_subscription(
    req: web::Json<PaypalSubscriptionRequest>,
    store: web::Data<Arc<dyn Store>>,
    gateway: web::Data<Arc<dyn BillingGateway>>,
) -> Res<impl Responder> {
    let approve_url = services::pay::create_paypal_approval(
        store.get_ref().as_ref(),
        gateway.get_ref().as_ref(),
        req.into_inner(),
    )
    .await?;
    Success::ok(ApprovalResponse { approve_url })
}

/// Creates a one-time Stripe Checkout session for a plan.
///
/// # Input
/// - `req`: `{bot_id, plan_id, tg_user_id}`
///
/// # Output
/// - Success: 201 with `{url}` of the hosted checkout page
/// - Error: 404 for a plan the bot does not own, 502 if Stripe fails
#[post("/checkout")]
pub async fn post_checkout(
    req: web::Json<CheckoutRequest>,
    store: web::Data<Arc<dyn Store>>,
    gateway: web::Data<Arc<dyn BillingGateway>>,
) -> Res<impl Responder> {
    let url = services::pay::create_checkout(
        store.get_ref().as_ref(),
        gateway.get_ref().as_ref(),
        req.into_inner(),
    )
    .await?;
    Success::created(CheckoutResponse { url })
}

/// Handles Stripe webhook events.
///
/// # Input
/// - `payload`: raw event body
/// - `req`: request carrying the `Stripe-Signature` header
///
/// # Output
/// - Success: 200 once the event is applied, or when it was already applied
/// - Error: 400 for a missing or invalid signature
///
/// # Example Event Types Handled
/// - checkout.session.completed: activates the subscriber named in the session metadata
/// - customer.subscription.deleted: deactivates the subscriber holding that subscription
#[post("/webhook")]
pub async fn post_webhook(
    payload: String,
    req: HttpRequest,
    config: web::Data<Arc<Config>>,
    store: web::Data<Arc<dyn Store>>,
) -> Res<impl Responder> {
    let signature = match req.headers().get("stripe-signature") {
        Some(signature) => signature.to_str().unwrap_or(""),
        None => return Err(AppError::BadRequest("Stripe signature missing".to_string())),
    };

    let event = stripe::construct_event(&payload, signature, &config.stripe_webhook_secret)?;
    services::pay::process_webhook_event(store.get_ref().as_ref(), event).await?;

    Success::ack()
}
