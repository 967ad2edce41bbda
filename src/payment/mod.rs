pub mod poller;
pub mod yookassa;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// Lifecycle state reported by the gateway for a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PaymentStatus {
    Pending,
    WaitingForCapture,
    Succeeded,
    Canceled,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => PaymentStatus::Pending,
            "waiting_for_capture" => PaymentStatus::WaitingForCapture,
            "succeeded" => PaymentStatus::Succeeded,
            "canceled" => PaymentStatus::Canceled,
            "failed" => PaymentStatus::Failed,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::WaitingForCapture => "waiting_for_capture",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other(s) => s,
        }
    }

    /// No further status changes are expected.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Canceled | PaymentStatus::Failed
        )
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub user_id: i64,
    pub months: u32,
    pub amount_rub: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub confirmation_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment, AppError>;
    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus, AppError>;
}
