//! Client for the VPN vendor's config service.
//!
//! The service issues one opaque token per user and can extend its lifetime.
//! Both calls are authenticated with a static `x-api-key` header.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::settings::ProvisionerConfig;
use crate::error::AppError;
use crate::http_client;
use crate::subscription::normalize_token;

#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Issues a fresh config token valid for `days`.
    async fn obtain(&self, user_id: i64, days: i64) -> Result<String, AppError>;
    /// Adds `days` to an existing token.
    async fn extend(&self, token: &str, days: i64) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct ObtainRequest<'a> {
    time: i64,
    id: String,
    server: &'a str,
}

#[derive(Serialize)]
struct ExtendRequest<'a> {
    time: i64,
    uid: &'a str,
    server: &'a str,
}

pub struct HttpProvisioner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    region: String,
}

impl HttpProvisioner {
    pub fn new(config: &ProvisionerConfig) -> Result<Self, AppError> {
        let client = http_client::client_for_url_with_timeout(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            &config.no_proxy_hosts,
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            region: config.region.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        if resp.status() != reqwest::StatusCode::OK {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Provisioner(format!(
                "{} returned {}: {}",
                endpoint, status, text
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn obtain(&self, user_id: i64, days: i64) -> Result<String, AppError> {
        let body = ObtainRequest {
            time: days,
            id: user_id.to_string(),
            server: &self.region,
        };
        let text = self.post("giveconfig", &body).await?.text().await?;
        let token = normalize_token(&text);
        if token.is_empty() {
            return Err(AppError::Provisioner("giveconfig returned an empty token".into()));
        }
        tracing::info!(user_id, days, "obtained VPN config");
        Ok(token.to_string())
    }

    async fn extend(&self, token: &str, days: i64) -> Result<(), AppError> {
        let token = normalize_token(token);
        if token.is_empty() {
            return Err(AppError::Provisioner("cannot extend an empty token".into()));
        }
        let body = ExtendRequest {
            time: days,
            uid: token,
            server: &self.region,
        };
        self.post("extendconfig", &body).await?;
        Ok(())
    }
}
