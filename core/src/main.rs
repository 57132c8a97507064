use std::sync::Arc;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::{
    billing::{BillingGateway, LiveBillingGateway},
    env_config::Config,
};
use db::{PgStore, Store};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file).expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, config.is_production())
        .await
        .expect("Failed to set up database");
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    if let Some(seed) = &config.seed {
        db::seed_demo_data(store.as_ref(), &seed.bot_name, &seed.bot_username)
            .await
            .expect("Failed to seed demo data");
    }

    // payment providers
    let gateway: Arc<dyn BillingGateway> = Arc::new(
        LiveBillingGateway::from_config(&config).expect("Failed to build payment clients"),
    );

    log::info!(
        "Listening on {}:{} ({})",
        config.server_host,
        config.server_port,
        config.environment
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .wrap(logger::middleware())
            .service(api_subs::routes::health::get_root)
            .service(web::scope("/api").configure(api_subs::configure))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
