use std::sync::Arc;

use actix_web::{Responder, get, web};
use common::{error::Res, http::Success};
use db::Store;

use crate::{dtos::sub::PlanResponse, services};

/// Lists the plans a bot sells.
///
/// # Input
/// - `path`: the bot id
///
/// # Output
/// - Success: a JSON array `[{id, name, price_cents, interval}]`, empty when the bot has no plans
/// - Error: 503 when the store is unreachable
#[get("/{bot_id}/plans")]
pub async fn get_plans(
    path: web::Path<i64>,
    store: web::Data<Arc<dyn Store>>,
) -> Res<impl Responder> {
    let bot_id = path.into_inner();
    let plans = services::sub::list_plans(store.get_ref().as_ref(), bot_id).await?;
    let plans: Vec<PlanResponse> = plans.into_iter().map(PlanResponse::from).collect();
    Success::ok(plans)
}
