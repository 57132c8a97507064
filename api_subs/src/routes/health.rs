use actix_web::{Responder, get};
use common::{error::Res, http::Success};

/// Liveness probe. Always `{"ok": true}`.
#[get("/")]
pub async fn get_root() -> Res<impl Responder> {
    Success::ack()
}
