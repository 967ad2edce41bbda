pub mod database;
pub mod database_payments;
pub mod database_subscriptions;
pub mod database_users;
pub mod time;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::AppError;
use crate::payments::{NewPayment, PaymentStore};
use crate::subscription::{ExpiryChange, SubscriptionStore};
use crate::users::BotUserStore;

pub use database::Database;

/// Rows removed by [`AccountStore::purge_user`], per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub subscriptions: usize,
    pub payments: usize,
    pub bot_users: usize,
}

impl PurgeReport {
    pub fn total(&self) -> usize {
        self.subscriptions + self.payments + self.bot_users
    }
}

/// What [`AccountStore::save_renewal`] committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedRenewal {
    pub payment_id: i64,
    pub expiry: NaiveDateTime,
    /// Whether the stored expiry was still in the future before the write.
    pub was_active: bool,
}

/// Everything the bot persists, plus the operations that span several tables
/// and must commit together.
#[async_trait]
pub trait AccountStore: BotUserStore + SubscriptionStore + PaymentStore {
    /// Rewrites the subscription row and appends the payment record in one
    /// transaction. `change` is applied to the expiry stored at that moment;
    /// `payment.paid_at` is both "now" and the new payment date.
    async fn save_renewal(
        &self,
        user_id: i64,
        change: ExpiryChange,
        token: &str,
        payment: &NewPayment,
    ) -> Result<SavedRenewal, AppError>;

    /// Removes the user from all three tables in one transaction.
    async fn purge_user(&self, user_id: i64) -> Result<PurgeReport, AppError>;
}
