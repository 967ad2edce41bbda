//! Subscription status derived from the stored expiry text.
//!
//! The stored `subscribed` flag is not trusted on its own: a subscription is
//! active exactly when its expiry parses and lies strictly in the future.

use chrono::NaiveDateTime;

use crate::storage::time::parse_stored;
use crate::subscription::Subscription;

/// Days before expiry at which a subscription counts as expiring.
pub const EXPIRING_WINDOW_DAYS: i64 = 3;

const SECONDS_PER_DAY: i64 = 86_400;

pub fn is_active_at(expiry: Option<&str>, now: NaiveDateTime) -> bool {
    expiry
        .and_then(|s| parse_stored(s).ok())
        .is_some_and(|e| e > now)
}

/// Whole days until `expiry`, rounded towards negative infinity.
pub fn days_left(expiry: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (expiry - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

pub fn is_expiring_at(expiry: Option<&str>, now: NaiveDateTime) -> bool {
    match expiry.and_then(|s| parse_stored(s).ok()) {
        Some(e) if e > now => (0..=EXPIRING_WINDOW_DAYS).contains(&days_left(e, now)),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No subscription row.
    Missing,
    Active {
        expiry: NaiveDateTime,
        days_left: i64,
    },
    /// Row exists but the expiry is past or unreadable.
    Expired,
}

impl SubscriptionState {
    pub fn derive(sub: Option<&Subscription>, now: NaiveDateTime) -> Self {
        let Some(sub) = sub else {
            return SubscriptionState::Missing;
        };
        match sub.expiry() {
            Some(expiry) if expiry > now => SubscriptionState::Active {
                expiry,
                days_left: days_left(expiry, now),
            },
            _ => SubscriptionState::Expired,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionState::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        parse_stored(s).unwrap()
    }

    #[test]
    fn equivalent_instants_agree_across_formats() {
        let now = at("15.03.2026 00:00");
        for (a, b, c) in [
            ("16.03.2026 00:00", "2026-03-16 00:00:00", "2026-03-16"),
            ("15.03.2026 00:00", "2026-03-15 00:00:00", "2026-03-15"),
            ("14.03.2026 00:00", "2026-03-14 00:00:00", "2026-03-14"),
        ] {
            let expected = is_active_at(Some(a), now);
            assert_eq!(is_active_at(Some(b), now), expected);
            assert_eq!(is_active_at(Some(c), now), expected);
        }
    }

    #[test]
    fn active_is_strictly_after_now() {
        let now = at("15.03.2026 12:00");
        assert!(is_active_at(Some("15.03.2026 12:01"), now));
        assert!(!is_active_at(Some("15.03.2026 12:00"), now));
        assert!(!is_active_at(Some("garbage"), now));
        assert!(!is_active_at(None, now));
    }

    #[test]
    fn days_left_floors() {
        let now = at("15.03.2026 12:00");
        assert_eq!(days_left(at("15.03.2026 11:00"), now), -1);
        assert_eq!(days_left(at("15.03.2026 13:00"), now), 0);
        assert_eq!(days_left(at("18.03.2026 11:59"), now), 2);
        assert_eq!(days_left(at("18.03.2026 12:00"), now), 3);
    }

    #[test]
    fn expiring_window_is_three_days() {
        let now = at("15.03.2026 12:00");
        assert!(is_expiring_at(Some("15.03.2026 18:00"), now));
        assert!(is_expiring_at(Some("19.03.2026 11:00"), now));
        assert!(!is_expiring_at(Some("19.03.2026 12:00"), now));
        assert!(!is_expiring_at(Some("14.03.2026 12:00"), now));
    }

    #[test]
    fn derive_state() {
        let now = at("15.03.2026 12:00");
        assert_eq!(
            SubscriptionState::derive(None, now),
            SubscriptionState::Missing
        );
        let mut sub = Subscription {
            user_id: 1,
            active: true,
            payment_date: None,
            expiry_date: Some("25.03.2026 12:00".into()),
            token: None,
            last_update: None,
        };
        let state = SubscriptionState::derive(Some(&sub), now);
        assert!(state.is_active());
        assert_eq!(
            state,
            SubscriptionState::Active {
                expiry: at("25.03.2026 12:00"),
                days_left: 10
            }
        );

        sub.expiry_date = Some("nonsense".into());
        assert_eq!(
            SubscriptionState::derive(Some(&sub), now),
            SubscriptionState::Expired
        );
    }
}
