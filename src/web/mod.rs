//! Read-only mini web view opened from the bot.

pub mod handlers;
mod page;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::storage::AccountStore;

#[derive(Clone)]
pub struct WebState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn AccountStore>,
}

pub fn create_app(state: WebState) -> Router {
    handlers::routes()
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: WebState) -> AppResult<()> {
    let addr = format!(
        "{}:{}",
        state.settings.miniapp.host, state.settings.miniapp.port
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Mini app listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
