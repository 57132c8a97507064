use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use actix_web::{App, http::StatusCode, test, web};
use async_trait::async_trait;
use common::{
    billing::{ApprovalRequest, BillingGateway},
    env_config::{Config, PaypalConfig},
    error::{AppError, Res},
};
use db::{Store, dtos::plan::PlanCreateRequest, memory::MemoryStore};
use serde_json::{Value, json};

#[derive(Default)]
struct RecordingGateway {
    approvals: Mutex<Vec<ApprovalRequest>>,
    checkouts: Mutex<Vec<(String, i64, HashMap<String, String>)>>,
    fail_with: Option<String>,
}

#[async_trait]
impl BillingGateway for RecordingGateway {
    async fn create_checkout_session(
        &self,
        plan_name: &str,
        price_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Res<String> {
        self.checkouts
            .lock()
            .unwrap()
            .push((plan_name.to_string(), price_cents, metadata));
        Ok("https://checkout.stripe.test/cs_1".to_string())
    }

    async fn create_subscription_approval(&self, req: &ApprovalRequest) -> Res<String> {
        self.approvals.lock().unwrap().push(req.clone());
        match &self.fail_with {
            Some(msg) => Err(AppError::MalformedProviderResponse(msg.clone())),
            None => Ok(format!("https://paypal.test/approve/{}", req.plan_id)),
        }
    }
}

fn test_config() -> Arc<Config> {
    Arc::new(Config {
        environment: "test".to_string(),
        database_url: String::new(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        num_workers: 1,
        console_logging_enabled: false,
        log_file: String::new(),
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: "whsec_test".to_string(),
        frontend_success_url: String::new(),
        frontend_cancel_url: String::new(),
        paypal: PaypalConfig {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            plan_ids: HashMap::new(),
            return_url: String::new(),
            cancel_url: String::new(),
            timeout: Duration::from_secs(1),
        },
        seed: None,
    })
}

/// Bot 1 sells Basic (plan 1) and VIP (plan 2); bot 2 sells Other (plan 3).
async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let one = store.create_bot("One", "one_bot").await.unwrap();
    let two = store.create_bot("Two", "two_bot").await.unwrap();
    for (bot_id, name, price_cents) in [(one.id, "Basic", 1000), (one.id, "VIP", 2000), (two.id, "Other", 500)] {
        store
            .create_plan(PlanCreateRequest {
                bot_id,
                name: name.to_string(),
                price_cents,
                interval: "month".to_string(),
            })
            .await
            .unwrap();
    }
    store
}

macro_rules! app {
    ($store:expr, $gateway:expr) => {{
        let store: Arc<dyn Store> = $store.clone();
        let gateway: Arc<dyn BillingGateway> = $gateway.clone();
        test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .app_data(web::Data::new(gateway))
                .app_data(web::Data::new(test_config()))
                .service(api_subs::routes::health::get_root)
                .service(web::scope("/api").configure(api_subs::configure)),
        )
        .await
    }};
}

#[actix_web::test]
async fn root_reports_ok() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(body, json!({ "ok": true }));
}

#[actix_web::test]
async fn lists_plans_of_the_bot_only() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::get().uri("/api/bots/1/plans").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!([
            { "id": 1, "name": "Basic", "price_cents": 1000, "interval": "month" },
            { "id": 2, "name": "VIP", "price_cents": 2000, "interval": "month" }
        ])
    );

    let req = test::TestRequest::get().uri("/api/bots/99/plans").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn unknown_user_is_inactive() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    for user in ["1", "42", "never-seen"] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/status?bot_id=1&tg_user_id={}", user))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["active"], json!(false));
        assert_eq!(body["plan_id"], Value::Null);
    }
}

#[actix_web::test]
async fn activation_then_status_is_active() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({
            "bot_id": 1, "plan_id": 2, "tg_user_id": "42",
            "provider": "stars", "provider_ref": "abc"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "ok": true, "already_processed": false }));

    let req = test::TestRequest::get()
        .uri("/api/status?bot_id=1&tg_user_id=42")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["active"], json!(true));
    assert_eq!(body["plan_id"], json!(2));
    assert!(body["current_period_end"].is_string());
}

#[actix_web::test]
async fn repeated_activation_mutates_once() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let activate = |plan_id: i64| {
        test::TestRequest::post()
            .uri("/api/activate")
            .set_json(json!({
                "bot_id": 1, "plan_id": plan_id, "tg_user_id": "7",
                "provider": "stars", "provider_ref": "charge-1"
            }))
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, activate(1)).await;
    assert_eq!(first["already_processed"], json!(false));
    let before = store.get_subscriber(1, "7").await.unwrap().unwrap();

    // same reference, different plan: must be ignored
    let second: Value = test::call_and_read_body_json(&app, activate(2)).await;
    assert_eq!(second, json!({ "ok": true, "already_processed": true }));

    let after = store.get_subscriber(1, "7").await.unwrap().unwrap();
    assert_eq!(before, after);
    assert_eq!(store.subscriber_count(), 1);
    assert_eq!(store.event_count(), 1);
}

#[actix_web::test]
async fn concurrent_first_activations_leave_one_row() {
    let store = seeded_store().await;

    let calls = (0..8).map(|i| {
        let store: Arc<dyn Store> = store.clone();
        tokio::spawn(async move {
            api_subs::services::sub::activate(
                store.as_ref(),
                api_subs::services::sub::Activation {
                    bot_id: 1,
                    plan_id: 1,
                    tg_user_id: "500".to_string(),
                    provider: "stars".to_string(),
                    provider_ref: format!("race-{}", i),
                    stripe_customer_id: None,
                    stripe_subscription_id: None,
                },
            )
            .await
        })
    });
    for res in futures::future::join_all(calls).await {
        assert!(res.unwrap().is_ok());
    }

    assert_eq!(store.subscriber_count(), 1);
    assert!(store.get_subscriber(1, "500").await.unwrap().unwrap().active);
}

#[actix_web::test]
async fn activation_rejects_foreign_plan_and_bad_bodies() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({
            "bot_id": 1, "plan_id": 3, "tg_user_id": "42",
            "provider": "stars", "provider_ref": "x1"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({ "bot_id": "one", "plan_id": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({
            "bot_id": 1, "plan_id": 1, "tg_user_id": "42",
            "provider": "stars", "provider_ref": ""
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    assert_eq!(store.subscriber_count(), 0);
}

#[actix_web::test]
async fn approval_for_foreign_plan_is_not_found_without_gateway_call() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/paypal/create-subscription")
        .set_json(json!({
            "bot_id": 1, "plan_id": 3, "tg_user_id": "42", "tg_username": "alice"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    assert!(gateway.approvals.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn approval_returns_gateway_url() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/paypal/create-subscription")
        .set_json(json!({ "bot_id": 1, "plan_id": 2, "tg_user_id": "42", "tg_username": "alice" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "approve_url": "https://paypal.test/approve/2" }));

    let approvals = gateway.approvals.lock().unwrap();
    assert_eq!(
        approvals.as_slice(),
        &[ApprovalRequest {
            bot_id: 1,
            plan_id: 2,
            tg_user_id: "42".to_string(),
            tg_username: "alice".to_string(),
        }]
    );
}

#[actix_web::test]
async fn malformed_provider_response_is_bad_gateway() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway {
        fail_with: Some("no approve link".to_string()),
        ..Default::default()
    });
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/paypal/create-subscription")
        .set_json(json!({ "bot_id": 1, "plan_id": 1, "tg_user_id": "42" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn checkout_passes_plan_and_metadata() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/billing/checkout")
        .set_json(json!({ "bot_id": 1, "plan_id": 2, "tg_user_id": "42" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["url"], json!("https://checkout.stripe.test/cs_1"));

    let checkouts = gateway.checkouts.lock().unwrap();
    let (name, price, metadata) = &checkouts[0];
    assert_eq!(name, "VIP");
    assert_eq!(*price, 2000);
    assert_eq!(metadata.get("tg_user_id").map(String::as_str), Some("42"));
    assert_eq!(metadata.get("plan_id").map(String::as_str), Some("2"));
}

#[actix_web::test]
async fn webhook_without_valid_signature_is_rejected() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);

    let req = test::TestRequest::post()
        .uri("/api/stripe/webhook")
        .set_payload(r#"{"id":"evt_1"}"#)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/stripe/webhook")
        .insert_header(("stripe-signature", "t=1,v1=bad"))
        .set_payload(r#"{"id":"evt_1"}"#)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.event_count(), 0);
}

#[actix_web::test]
async fn completed_checkout_activates_with_stripe_ids() {
    use api_subs::services::pay::{CheckoutCompletion, apply_checkout_completion};

    let store = seeded_store().await;
    let done = CheckoutCompletion {
        session_id: "cs_123".to_string(),
        metadata: HashMap::from([
            ("bot_id".to_string(), "1".to_string()),
            ("plan_id".to_string(), "1".to_string()),
            ("tg_user_id".to_string(), "77".to_string()),
        ]),
        customer_id: Some("cus_1".to_string()),
        subscription_id: Some("sub_1".to_string()),
    };
    apply_checkout_completion(store.as_ref(), done.clone()).await.unwrap();
    apply_checkout_completion(store.as_ref(), done).await.unwrap();

    let sub = store.get_subscriber(1, "77").await.unwrap().unwrap();
    assert!(sub.active);
    assert_eq!(sub.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(store.event_count(), 1);

    // metadata-less sessions are skipped without error
    apply_checkout_completion(store.as_ref(), CheckoutCompletion::default())
        .await
        .unwrap();
    assert_eq!(store.subscriber_count(), 1);
}

#[actix_web::test]
async fn over_long_identifiers_are_bad_requests() {
    let store = seeded_store().await;
    let gateway = Arc::new(RecordingGateway::default());
    let app = app!(store, gateway);
    let long_user = "9".repeat(33);

    let req = test::TestRequest::get()
        .uri(&format!("/api/status?bot_id=1&tg_user_id={}", long_user))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({
            "bot_id": 1, "plan_id": 1, "tg_user_id": long_user,
            "provider": "stars", "provider_ref": "r1"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/activate")
        .set_json(json!({
            "bot_id": 1, "plan_id": 1, "tg_user_id": "42",
            "provider": "stars", "provider_ref": "r".repeat(201)
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/paypal/create-subscription")
        .set_json(json!({ "bot_id": 1, "plan_id": 1, "tg_user_id": long_user }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/billing/checkout")
        .set_json(json!({ "bot_id": 1, "plan_id": 1, "tg_user_id": long_user }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    assert!(gateway.approvals.lock().unwrap().is_empty());
    assert!(gateway.checkouts.lock().unwrap().is_empty());
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(store.event_count(), 0);
}

fn stripe_event(id: &str, type_: stripe::EventType, object: stripe::EventObject) -> stripe::Event {
    stripe::Event {
        id: id.parse().unwrap(),
        type_,
        data: stripe::NotificationEventData {
            object,
            previous_attributes: None,
        },
        ..Default::default()
    }
}

fn completed_session(session_id: &str, user: &str) -> stripe::EventObject {
    stripe::EventObject::CheckoutSession(stripe::CheckoutSession {
        id: session_id.parse().unwrap(),
        metadata: Some(HashMap::from([
            ("bot_id".to_string(), "1".to_string()),
            ("plan_id".to_string(), "2".to_string()),
            ("tg_user_id".to_string(), user.to_string()),
        ])),
        customer: Some(stripe::Expandable::Id("cus_9".parse().unwrap())),
        subscription: Some(stripe::Expandable::Id("sub_9".parse().unwrap())),
        ..Default::default()
    })
}

#[actix_web::test]
async fn redelivered_checkout_event_is_a_no_op() {
    use api_subs::services::pay::process_webhook_event;

    let store = seeded_store().await;
    let event = stripe_event(
        "evt_1",
        stripe::EventType::CheckoutSessionCompleted,
        completed_session("cs_9", "88"),
    );
    process_webhook_event(store.as_ref(), event.clone()).await.unwrap();
    let before = store.get_subscriber(1, "88").await.unwrap().unwrap();

    process_webhook_event(store.as_ref(), event).await.unwrap();
    let after = store.get_subscriber(1, "88").await.unwrap().unwrap();

    assert!(after.active);
    assert_eq!(after.plan_id, 2);
    assert_eq!(after.stripe_subscription_id.as_deref(), Some("sub_9"));
    assert_eq!(before, after);
    assert_eq!(store.subscriber_count(), 1);
    assert_eq!(store.event_count(), 1);
}

#[actix_web::test]
async fn deleted_subscription_event_deactivates_once() {
    use api_subs::services::pay::process_webhook_event;

    let store = seeded_store().await;
    let checkout = stripe_event(
        "evt_1",
        stripe::EventType::CheckoutSessionCompleted,
        completed_session("cs_9", "88"),
    );
    process_webhook_event(store.as_ref(), checkout).await.unwrap();

    let deleted = stripe_event(
        "evt_2",
        stripe::EventType::CustomerSubscriptionDeleted,
        stripe::EventObject::Subscription(stripe::Subscription {
            id: "sub_9".parse().unwrap(),
            ..Default::default()
        }),
    );
    process_webhook_event(store.as_ref(), deleted.clone()).await.unwrap();
    assert!(!store.get_subscriber(1, "88").await.unwrap().unwrap().active);
    assert_eq!(store.event_count(), 2);

    // a later payment reactivates; the redelivered deletion must not undo it
    api_subs::services::sub::activate(
        store.as_ref(),
        api_subs::services::sub::Activation {
            bot_id: 1,
            plan_id: 2,
            tg_user_id: "88".to_string(),
            provider: "stars".to_string(),
            provider_ref: "renewal".to_string(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
        },
    )
    .await
    .unwrap();
    process_webhook_event(store.as_ref(), deleted).await.unwrap();

    assert!(store.get_subscriber(1, "88").await.unwrap().unwrap().active);
    assert_eq!(store.event_count(), 3);
}

#[actix_web::test]
async fn unhandled_event_types_record_nothing() {
    use api_subs::services::pay::process_webhook_event;

    let store = seeded_store().await;
    let event = stripe_event(
        "evt_3",
        stripe::EventType::CustomerCreated,
        stripe::EventObject::Customer(Default::default()),
    );
    process_webhook_event(store.as_ref(), event).await.unwrap();
    assert_eq!(store.event_count(), 0);
    assert_eq!(store.subscriber_count(), 0);
}
