use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use intake::{
    config::AppConfig,
    db,
    store::PgStore,
    sync::deliver_due_messages,
    telegram::TelegramClient,
};

const DELIVERY_BATCH: i64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("deliver-scheduled") => deliver_scheduled().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\nUsage: maintenance deliver-scheduled");
            std::process::exit(1);
        }
        None => {
            eprintln!("Usage: maintenance deliver-scheduled");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn deliver_scheduled() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let store = PgStore::new(pool);
    let telegram = TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.crm_timeout,
    )
    .context("failed to build chat client")?;

    let mut total = 0;
    loop {
        let delivered = deliver_due_messages(&store, &telegram, DELIVERY_BATCH)
            .await
            .context("failed to deliver scheduled messages")?;
        total += delivered;
        if delivered < DELIVERY_BATCH as usize {
            break;
        }
    }

    println!("Delivered {total} scheduled messages.");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
