mod backend;
mod flow;
mod handlers;
mod payload;
mod pricing;
mod session;

use std::sync::Arc;

use common::env_config::BotConfig;
use teloxide::prelude::*;

use crate::{
    backend::HttpBackend,
    flow::{Flow, FlowSettings},
    session::SessionStore,
};

#[tokio::main]
async fn main() {
    // get env vars
    let config = BotConfig::from_env();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file).expect("Failed to set up logger");
    }

    let backend = HttpBackend::new(&config.backend_base_url, config.backend_timeout)
        .expect("Failed to build backend client");
    let flow = Arc::new(Flow::new(
        Arc::new(backend),
        SessionStore::new(config.session_ttl),
        FlowSettings::from_config(&config),
    ));

    log::info!(
        "Starting bot {} against {}",
        config.bot_id,
        config.backend_base_url
    );

    let bot = Bot::new(config.telegram_token.clone());
    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![flow])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
