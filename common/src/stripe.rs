use std::collections::HashMap;

use stripe::{
    CheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, Event, Webhook,
};

use crate::error::{AppError, Res};

pub fn create_client(secret_key: &str) -> Client {
    Client::new(secret_key)
}

/// Creates a one-time (`mode=payment`) checkout session for a single plan
/// and returns the hosted checkout URL.
pub async fn create_checkout_session(
    client: &Client,
    plan_name: &str,
    price_cents: i64,
    metadata: HashMap<String, String>,
    success_url: &str,
    cancel_url: &str,
) -> Res<String> {
    let params = CreateCheckoutSession {
        mode: Some(CheckoutSessionMode::Payment),
        line_items: Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(price_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: plan_name.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]),
        success_url: Some(success_url),
        cancel_url: Some(cancel_url),
        metadata: Some(metadata),
        ..Default::default()
    };

    let session = CheckoutSession::create(client, params)
        .await
        .map_err(AppError::from)?;

    session.url.ok_or_else(|| {
        AppError::MalformedProviderResponse(format!(
            "checkout session {} has no url",
            session.id
        ))
    })
}

/// Verifies the `Stripe-Signature` header against the webhook secret and
/// parses the event.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::warn!("Rejected webhook event: {}", e);
            Err(AppError::BadRequest(format!("Webhook Error: {}", e)))
        }
    }
}
