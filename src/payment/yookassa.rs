use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::settings::PaymentConfig;
use crate::error::AppError;
use crate::http_client;
use crate::payment::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct Amount<'a> {
    value: String,
    currency: &'a str,
}

#[derive(Serialize)]
struct Confirmation<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    return_url: &'a str,
}

#[derive(Serialize)]
struct Metadata {
    user_id: String,
    period: String,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    amount: Amount<'a>,
    confirmation: Confirmation<'a>,
    capture: bool,
    description: &'a str,
    metadata: Metadata,
}

#[derive(Deserialize)]
struct PaymentObject {
    id: String,
    status: String,
    #[serde(default)]
    confirmation: Option<ConfirmationObject>,
}

#[derive(Deserialize)]
struct ConfirmationObject {
    #[serde(default)]
    confirmation_url: Option<String>,
}

pub struct YooKassaGateway {
    client: reqwest::Client,
    api_base: String,
    shop_id: String,
    secret_key: String,
    currency: String,
    return_url: String,
}

impl YooKassaGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, AppError> {
        if config.shop_id.trim().is_empty() || config.secret_key.trim().is_empty() {
            return Err(AppError::Config(
                "payment shop_id and secret_key must be set".into(),
            ));
        }
        let client = http_client::client_for_url_with_timeout(&config.api_base, REQUEST_TIMEOUT, &[])?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            shop_id: config.shop_id.clone(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
            return_url: config.return_url.clone(),
        })
    }

    async fn parse_response(resp: reqwest::Response) -> Result<PaymentObject, AppError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("HTTP {}: {}", status, text)));
        }
        Ok(resp.json::<PaymentObject>().await?)
    }
}

#[async_trait]
impl PaymentGateway for YooKassaGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, AppError> {
        let body = CreateBody {
            amount: Amount {
                value: format!("{}.00", request.amount_rub),
                currency: &self.currency,
            },
            confirmation: Confirmation {
                kind: "redirect",
                return_url: &self.return_url,
            },
            capture: true,
            description: &request.description,
            metadata: Metadata {
                user_id: request.user_id.to_string(),
                period: request.months.to_string(),
            },
        };

        let resp = self
            .client
            .post(format!("{}/payments", self.api_base))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;
        let payment = Self::parse_response(resp).await?;

        let confirmation_url = payment
            .confirmation
            .and_then(|c| c.confirmation_url)
            .ok_or_else(|| AppError::Gateway(format!("payment {} has no confirmation url", payment.id)))?;
        tracing::info!(
            user_id = request.user_id,
            payment_id = %payment.id,
            "payment created"
        );
        Ok(CreatedPayment {
            id: payment.id,
            status: PaymentStatus::parse(&payment.status),
            confirmation_url,
        })
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, AppError> {
        let resp = self
            .client
            .get(format!("{}/payments/{}", self.api_base, payment_id))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .send()
            .await?;
        let payment = Self::parse_response(resp).await?;
        Ok(PaymentStatus::parse(&payment.status))
    }
}
