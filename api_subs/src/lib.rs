use actix_web::web::{self};
use common::error::AppError;

pub mod routes {
    pub mod bot;
    pub mod health;
    pub mod pay;
    pub mod sub;
}

pub mod services {
    pub mod pay;
    pub mod sub;
}

pub mod dtos {
    pub mod pay;
    pub mod sub;
}

pub fn mount_bots() -> actix_web::Scope {
    web::scope("/bots").service(routes::bot::get_plans)
}
pub fn mount_paypal() -> actix_web::Scope {
    web::scope("/paypal").service(routes::pay::post_create_subscription)
}
pub fn mount_billing() -> actix_web::Scope {
    web::scope("/billing").service(routes::pay::post_checkout)
}
pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/stripe").service(routes::pay::post_webhook)
}

/// Registers every `/api` endpoint. Extractor failures are reported as 400
/// with the same `{"error": ...}` body as the other errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(mount_bots())
    .service(mount_paypal())
    .service(mount_billing())
    .service(mount_webhook())
    .service(routes::sub::get_status)
    .service(routes::sub::post_activate);
}
