//! Subscription lifecycle: purchases, trials and administrator overrides.
//!
//! Local bookkeeping is authoritative. Vendor calls that fail after the
//! local decision is made are logged and skipped, so the vendor's view can
//! drift from the database until the next successful call.

use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;

use crate::config::Plan;
use crate::error::AppError;
use crate::payments::{NewPayment, PaymentMethod, period_months_for_days};
use crate::provisioner::Provisioner;
use crate::storage::time::now_local;
use crate::storage::{AccountStore, PurgeReport};
use crate::subscription::{ExpiryChange, Subscription, next_expiry};

/// Days of access left until `expiry`, rounded up, at least one.
fn remaining_days(expiry: NaiveDateTime, now: NaiveDateTime) -> i64 {
    let secs = (expiry - now).num_seconds();
    (secs + 86_399).div_euclid(86_400).max(1)
}

/// Result of any operation that (re)writes the subscription row.
#[derive(Debug, Clone, PartialEq)]
pub struct Renewal {
    pub user_id: i64,
    /// Whether the subscription was active before this operation.
    pub was_active: bool,
    pub expiry: NaiveDateTime,
    pub payment_id: i64,
    /// `false` when the vendor could not issue a token; it is fetched on next connect.
    pub token_ready: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Issued(Renewal),
    AlreadyUsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Expiry still in the future; only the flag was restored.
    FlagRestored,
    /// Recently expired; restored with a one-day window.
    Restored { expiry: NaiveDateTime },
    /// Long expired; restored with a seven-day grace period.
    Grace { expiry: NaiveDateTime },
}

/// Expired subscriptions older than this are only reactivated with a grace period.
const RECENT_EXPIRY_DAYS: i64 = 30;
const GRACE_DAYS: i64 = 7;

struct PaymentDraft {
    amount: f64,
    period_months: i64,
    method: PaymentMethod,
}

pub struct SubscriptionService {
    store: Arc<dyn AccountStore>,
    provisioner: Arc<dyn Provisioner>,
    clock: fn() -> NaiveDateTime,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn AccountStore>, provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            store,
            provisioner,
            clock: now_local,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Bookkeeping for a confirmed gateway payment.
    pub async fn record_purchase(&self, user_id: i64, plan: Plan) -> Result<Renewal, AppError> {
        let existing = self.store.get_subscription(user_id).await?;
        let now = self.now();
        let renewal = self
            .commit(
                user_id,
                existing.as_ref(),
                ExpiryChange::Extend { days: plan.days() },
                plan.days(),
                PaymentDraft {
                    amount: f64::from(plan.price_rub),
                    period_months: i64::from(plan.months),
                    method: PaymentMethod::Gateway,
                },
                now,
            )
            .await?;
        tracing::info!(
            user_id,
            months = plan.months,
            expiry = %renewal.expiry,
            "subscription purchased"
        );
        Ok(renewal)
    }

    /// A trial counts as used once a trial payment exists, or, for users from
    /// before trials were recorded, once any subscription row exists.
    pub async fn has_used_trial(&self, user_id: i64) -> Result<bool, AppError> {
        if self
            .store
            .has_payment_method(user_id, PaymentMethod::Trial)
            .await?
        {
            return Ok(true);
        }
        Ok(self.store.get_subscription(user_id).await?.is_some())
    }

    pub async fn issue_trial(&self, user_id: i64, days: i64) -> Result<TrialOutcome, AppError> {
        if self.has_used_trial(user_id).await? {
            return Ok(TrialOutcome::AlreadyUsed);
        }
        let now = self.now();
        let renewal = self
            .commit(
                user_id,
                None,
                ExpiryChange::Reset(now + Duration::days(days)),
                days,
                PaymentDraft {
                    amount: 0.0,
                    period_months: period_months_for_days(days),
                    method: PaymentMethod::Trial,
                },
                now,
            )
            .await?;
        tracing::info!(user_id, days, "trial issued");
        Ok(TrialOutcome::Issued(renewal))
    }

    /// Gift from an administrator: a fresh period starting now.
    pub async fn admin_grant(&self, user_id: i64, days: i64) -> Result<Renewal, AppError> {
        let existing = self.store.get_subscription(user_id).await?;
        let now = self.now();
        let renewal = self
            .commit(
                user_id,
                existing.as_ref(),
                ExpiryChange::Reset(now + Duration::days(days)),
                days,
                PaymentDraft {
                    amount: 0.0,
                    period_months: period_months_for_days(days),
                    method: PaymentMethod::AdminGift,
                },
                now,
            )
            .await?;
        tracing::info!(user_id, days, "subscription granted by admin");
        Ok(renewal)
    }

    pub async fn admin_extend(&self, user_id: i64, days: i64) -> Result<NaiveDateTime, AppError> {
        let sub = self.require(user_id).await?;
        let now = self.now();
        let expiry = next_expiry(sub.expiry(), now, days);
        self.store.update_expiry(user_id, expiry, true).await?;
        self.vendor_extend(user_id, sub.token(), days).await;
        tracing::info!(user_id, days, expiry = %expiry, "subscription extended by admin");
        Ok(expiry)
    }

    pub async fn admin_deactivate(&self, user_id: i64) -> Result<NaiveDateTime, AppError> {
        self.require(user_id).await?;
        let expiry = self.now() - Duration::days(1);
        self.store.update_expiry(user_id, expiry, false).await?;
        tracing::info!(user_id, "subscription deactivated by admin");
        Ok(expiry)
    }

    pub async fn admin_activate(&self, user_id: i64) -> Result<Activation, AppError> {
        let sub = self.require(user_id).await?;
        let now = self.now();
        let outcome = match sub.expiry() {
            Some(expiry) if expiry > now => {
                self.store.set_active(user_id, true).await?;
                Activation::FlagRestored
            }
            Some(expiry) if (now - expiry).num_days() <= RECENT_EXPIRY_DAYS => {
                let expiry = now + Duration::days(1);
                self.store.update_expiry(user_id, expiry, true).await?;
                self.vendor_extend(user_id, sub.token(), 1).await;
                Activation::Restored { expiry }
            }
            _ => {
                let expiry = now + Duration::days(GRACE_DAYS);
                self.store.update_expiry(user_id, expiry, true).await?;
                self.vendor_extend(user_id, sub.token(), GRACE_DAYS).await;
                Activation::Grace { expiry }
            }
        };
        tracing::info!(user_id, ?outcome, "subscription activated by admin");
        Ok(outcome)
    }

    pub async fn admin_delete(&self, user_id: i64) -> Result<PurgeReport, AppError> {
        let report = self.store.purge_user(user_id).await?;
        if report.total() == 0 {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        tracing::info!(user_id, ?report, "user deleted by admin");
        Ok(report)
    }

    /// Token for an active subscription, fetching it from the vendor when an
    /// earlier issue left it empty. `None` when there is no active subscription.
    pub async fn ensure_token(&self, user_id: i64) -> Result<Option<String>, AppError> {
        let Some(sub) = self.store.get_subscription(user_id).await? else {
            return Ok(None);
        };
        let now = self.now();
        let Some(expiry) = sub.expiry().filter(|e| *e > now) else {
            return Ok(None);
        };
        if let Some(token) = sub.token() {
            return Ok(Some(token.to_string()));
        }

        let token = self
            .provisioner
            .obtain(user_id, remaining_days(expiry, now))
            .await?;
        self.store.set_token(user_id, &token).await?;
        tracing::info!(user_id, "backfilled missing VPN config");
        Ok(Some(token))
    }

    async fn require(&self, user_id: i64) -> Result<Subscription, AppError> {
        self.store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription for user {user_id}")))
    }

    async fn commit(
        &self,
        user_id: i64,
        existing: Option<&Subscription>,
        change: ExpiryChange,
        days: i64,
        draft: PaymentDraft,
        now: NaiveDateTime,
    ) -> Result<Renewal, AppError> {
        let token = match existing.and_then(Subscription::token) {
            Some(token) => {
                self.vendor_extend(user_id, Some(token), days).await;
                token.to_string()
            }
            None => {
                // The stored expiry is re-read on write; this one only sizes the new config.
                let expiry = change.resolve(existing.and_then(Subscription::expiry), now);
                match self
                    .provisioner
                    .obtain(user_id, remaining_days(expiry, now))
                    .await
                {
                    Ok(token) => token,
                    Err(e) => {
                        tracing::warn!(user_id, "VPN config not issued, will retry on connect: {}", e);
                        String::new()
                    }
                }
            }
        };

        let payment = NewPayment {
            user_id,
            amount: draft.amount,
            period_months: draft.period_months,
            paid_at: now,
            method: draft.method,
        };
        let saved = self
            .store
            .save_renewal(user_id, change, &token, &payment)
            .await?;
        Ok(Renewal {
            user_id,
            was_active: saved.was_active,
            expiry: saved.expiry,
            payment_id: saved.payment_id,
            token_ready: !token.is_empty(),
        })
    }

    async fn vendor_extend(&self, user_id: i64, token: Option<&str>, days: i64) {
        let Some(token) = token else {
            tracing::warn!(user_id, days, "no VPN config to extend, vendor not updated");
            return;
        };
        if let Err(e) = self.provisioner.extend(token, days).await {
            tracing::warn!(user_id, days, "vendor extend failed, local expiry kept: {}", e);
        }
    }
}
