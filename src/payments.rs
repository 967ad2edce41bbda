use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::storage::time::parse_stored;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Gateway,
    AdminGift,
    Trial,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Gateway => "gateway",
            PaymentMethod::AdminGift => "admin_gift",
            PaymentMethod::Trial => "trial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            // rows written before the tag was generalized
            "gateway" | "yookassa" => Some(PaymentMethod::Gateway),
            "admin_gift" => Some(PaymentMethod::AdminGift),
            "trial" => Some(PaymentMethod::Trial),
            _ => None,
        }
    }
}

/// Append-only payment history row.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub period_months: i64,
    pub paid_at: Option<String>,
    pub method: PaymentMethod,
}

impl PaymentRecord {
    pub fn paid_at(&self) -> Option<NaiveDateTime> {
        self.paid_at.as_deref().and_then(|s| parse_stored(s).ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub amount: f64,
    pub period_months: i64,
    pub paid_at: NaiveDateTime,
    pub method: PaymentMethod,
}

/// Period recorded for day-based grants (trial, admin gift).
pub fn period_months_for_days(days: i64) -> i64 {
    if days >= 30 { (days / 30).max(1) } else { 1 }
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn has_payment_method(
        &self,
        user_id: i64,
        method: PaymentMethod,
    ) -> Result<bool, AppError>;
    async fn list_payments(&self) -> Result<Vec<PaymentRecord>, AppError>;
    async fn list_user_payments(&self, user_id: i64) -> Result<Vec<PaymentRecord>, AppError>;
}
