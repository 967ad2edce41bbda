mod bot;
mod config;
mod error;
mod http_client;
mod lifecycle;
mod payment;
mod payments;
mod provisioner;
mod stats;
mod status;
mod storage;
mod subscription;
mod users;
mod web;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use crate::bot::BotContext;
use crate::bot::telegram::{TelegramMessenger, run_dispatcher};
use crate::lifecycle::SubscriptionService;
use crate::payment::yookassa::YooKassaGateway;
use crate::provisioner::HttpProvisioner;
use crate::storage::Database;
use crate::storage::time::ServiceTimer;
use crate::web::WebState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(ServiceTimer)
        .init();

    let settings = Arc::new(config::Settings::load()?);
    if settings.telegram.token.is_empty() {
        return Err("telegram.token is not set (config or BOT_TOKEN)".into());
    }

    let db = Arc::new(Database::new(&settings.storage.database_path).await?);
    tracing::info!("Database opened at {}", settings.storage.database_path);

    let provisioner = Arc::new(HttpProvisioner::new(&settings.provisioner)?);
    let gateway = Arc::new(YooKassaGateway::new(&settings.payment)?);
    let service = Arc::new(SubscriptionService::new(db.clone(), provisioner));

    let bot = Bot::new(settings.telegram.token.clone());
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let ctx = Arc::new(BotContext::new(
        settings.clone(),
        service,
        gateway,
        messenger,
    ));

    let web_state = WebState {
        settings: settings.clone(),
        store: db,
    };

    tokio::select! {
        res = web::serve(web_state) => {
            if let Err(e) = res {
                tracing::error!("Mini app server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = run_dispatcher(bot, ctx) => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
