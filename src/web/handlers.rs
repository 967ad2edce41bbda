use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Html,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bot::links::import_deep_link;
use crate::error::Result as AppResult;
use crate::storage::time::now_local;
use crate::subscription::Subscription;
use crate::web::WebState;
use crate::web::page::UserPage;

pub fn routes() -> Router<Arc<WebState>> {
    Router::new()
        .route("/", get(index))
        .route("/u/{user_id}", get(user_page))
        .route("/api/users/{user_id}/status", get(user_status))
}

async fn index() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    config: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub user_id: i64,
    pub exists: bool,
    pub active: bool,
    pub expiry_date: Option<String>,
}

impl StatusResponse {
    fn from_subscription(user_id: i64, sub: Option<&Subscription>) -> Self {
        Self {
            user_id,
            exists: sub.is_some(),
            active: sub.is_some_and(|s| s.is_enabled_and_active_at(now_local())),
            expiry_date: sub.and_then(|s| s.expiry_date.clone()),
        }
    }
}

async fn user_page(
    State(state): State<Arc<WebState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> AppResult<Html<String>> {
    let sub = state.store.get_subscription(user_id).await?;
    let status = StatusResponse::from_subscription(user_id, sub.as_ref());

    let config = Some(query.config.trim()).filter(|c| !c.is_empty());
    let deep_link = config.map(|c| import_deep_link(&state.settings.connection, c));

    let page = UserPage {
        user_id,
        exists: status.exists,
        active: status.active,
        expiry_date: status.expiry_date.as_deref(),
        config,
        deep_link: deep_link.as_deref(),
        bot_url: state.settings.telegram.bot_url.as_deref(),
    };
    Ok(Html(page.render()))
}

async fn user_status(
    State(state): State<Arc<WebState>>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    let sub = state.store.get_subscription(user_id).await?;
    Ok(Json(StatusResponse::from_subscription(user_id, sub.as_ref())))
}
