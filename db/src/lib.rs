use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgSslMode},
};
use std::{str::FromStr, sync::Arc};

pub mod bot;
pub mod event;
pub mod plan;
pub mod store;
pub mod subscriber;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub mod models {
    pub mod bot;
    pub mod plan;
    pub mod subscriber;
}

pub mod dtos {
    pub mod event;
    pub mod plan;
    pub mod subscriber;
}

pub use store::{PgStore, Store};

pub async fn setup(
    database_url: &str,
    require_ssl: bool,
) -> Result<Arc<PgPool>, Box<dyn std::error::Error>> {
    let url = url::Url::parse(database_url)?;
    let db_name = url.path().trim_start_matches('/');
    let username = url.username();
    let password = url.password().unwrap_or("");
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(5432);

    let admin_url = format!(
        "postgresql://{}:{}@{}:{}/postgres",
        username, password, host, port
    );

    let mut admin_options = PgConnectOptions::from_str(&admin_url)?;
    if require_ssl {
        admin_options = admin_options.ssl_mode(PgSslMode::Require);
    }

    let admin_pool = PgPool::connect_with(admin_options).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("Creating database {}", db_name);
        sqlx::query(&format!("CREATE DATABASE \"{}\"", db_name))
            .execute(&admin_pool)
            .await?;
    }

    admin_pool.close().await;

    let mut options = PgConnectOptions::from_str(database_url)?;
    if require_ssl {
        options = options.ssl_mode(PgSslMode::Require);
    }
    let pool = PgPool::connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(Arc::new(pool))
}

/// Ensures a bot with the given username exists, with a monthly `Basic` and
/// `VIP` plan. Does nothing when the bot is already provisioned.
pub async fn seed_demo_data(
    store: &dyn Store,
    bot_name: &str,
    bot_username: &str,
) -> common::error::Res<models::bot::Bot> {
    if let Some(bot) = store.get_bot_by_username(bot_username).await? {
        return Ok(bot);
    }

    let bot = store.create_bot(bot_name, bot_username).await?;
    for (name, price_cents) in [("Basic", 1000), ("VIP", 2000)] {
        store
            .create_plan(dtos::plan::PlanCreateRequest {
                bot_id: bot.id,
                name: name.to_string(),
                price_cents,
                interval: "month".to_string(),
            })
            .await?;
    }
    log::info!("Provisioned bot {} (@{}) with demo plans", bot.id, bot_username);
    Ok(bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn seeding_twice_provisions_once() {
        let store = MemoryStore::new();
        let first = seed_demo_data(&store, "Demo", "demo_bot").await.unwrap();
        let second = seed_demo_data(&store, "Demo", "demo_bot").await.unwrap();
        assert_eq!(first, second);

        let plans = store.get_plans_by_bot(first.id).await.unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Basic", "VIP"]);
    }
}
