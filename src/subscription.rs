use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::AppError;
use crate::status;
use crate::storage::time::parse_stored;

/// One VPN subscription row; at most one per user.
///
/// Timestamps are kept as the stored text because existing rows mix three
/// formats; use the accessors to interpret them.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub user_id: i64,
    /// Stored flag. Read paths combine it with the derived expiry status.
    pub active: bool,
    pub payment_date: Option<String>,
    pub expiry_date: Option<String>,
    pub token: Option<String>,
    pub last_update: Option<String>,
}

impl Subscription {
    pub fn expiry(&self) -> Option<NaiveDateTime> {
        self.expiry_date.as_deref().and_then(|s| parse_stored(s).ok())
    }

    pub fn payment_at(&self) -> Option<NaiveDateTime> {
        self.payment_date.as_deref().and_then(|s| parse_stored(s).ok())
    }

    /// Provider token with stray quotes removed; `None` while awaiting backfill.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(normalize_token)
            .filter(|t| !t.is_empty())
    }

    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        status::is_active_at(self.expiry_date.as_deref(), now)
    }

    pub fn is_enabled_and_active_at(&self, now: NaiveDateTime) -> bool {
        self.active && self.is_active_at(now)
    }
}

pub fn normalize_token(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Extended expiry: stacks on the current one while it is still in the future,
/// otherwise counts from `now`.
pub fn next_expiry(current: Option<NaiveDateTime>, now: NaiveDateTime, days: i64) -> NaiveDateTime {
    match current {
        Some(expiry) if expiry > now => expiry + Duration::days(days),
        _ => now + Duration::days(days),
    }
}

/// How a renewal moves the expiry. Resolved against the stored row inside the
/// write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryChange {
    /// See [`next_expiry`].
    Extend { days: i64 },
    /// Fresh period ending at the given time.
    Reset(NaiveDateTime),
}

impl ExpiryChange {
    pub fn resolve(self, current: Option<NaiveDateTime>, now: NaiveDateTime) -> NaiveDateTime {
        match self {
            ExpiryChange::Extend { days } => next_expiry(current, now, days),
            ExpiryChange::Reset(expiry) => expiry,
        }
    }
}

/// Full replacement of a user's subscription row.
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub user_id: i64,
    pub payment_date: NaiveDateTime,
    pub expiry: NaiveDateTime,
    pub token: String,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>, AppError>;
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AppError>;
    async fn update_expiry(
        &self,
        user_id: i64,
        expiry: NaiveDateTime,
        active: bool,
    ) -> Result<bool, AppError>;
    async fn set_active(&self, user_id: i64, active: bool) -> Result<bool, AppError>;
    async fn set_token(&self, user_id: i64, token: &str) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(token: Option<&str>, expiry: Option<&str>) -> Subscription {
        Subscription {
            user_id: 1,
            active: true,
            payment_date: None,
            expiry_date: expiry.map(String::from),
            token: token.map(String::from),
            last_update: None,
        }
    }

    #[test]
    fn token_strips_quotes_and_treats_blank_as_missing() {
        assert_eq!(sub(Some("\"abc-123\""), None).token(), Some("abc-123"));
        assert_eq!(sub(Some("'abc'\n"), None).token(), Some("abc"));
        assert_eq!(sub(Some(""), None).token(), None);
        assert_eq!(sub(Some("\"\""), None).token(), None);
        assert_eq!(sub(None, None).token(), None);
    }

    #[test]
    fn next_expiry_stacks_only_on_future_dates() {
        let now = parse_stored("10.06.2026 12:00").unwrap();
        let at = |s: &str| parse_stored(s).unwrap();
        assert_eq!(
            next_expiry(Some(at("20.06.2026 12:00")), now, 30),
            at("20.07.2026 12:00")
        );
        assert_eq!(
            next_expiry(Some(at("01.06.2026 12:00")), now, 30),
            at("10.07.2026 12:00")
        );
        assert_eq!(next_expiry(None, now, 7), at("17.06.2026 12:00"));
        assert_eq!(
            ExpiryChange::Reset(at("01.01.2027 00:00")).resolve(Some(at("20.06.2026 12:00")), now),
            at("01.01.2027 00:00")
        );
    }

    #[test]
    fn enabled_and_active_requires_flag() {
        let now = parse_stored("01.06.2026 12:00").unwrap();
        let mut s = sub(None, Some("02.06.2026 12:00"));
        assert!(s.is_enabled_and_active_at(now));
        s.active = false;
        assert!(s.is_active_at(now));
        assert!(!s.is_enabled_and_active_at(now));
    }
}
