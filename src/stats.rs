use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::AppError;
use crate::payments::PaymentRecord;
use crate::storage::AccountStore;
use crate::subscription::Subscription;
use crate::users::BotUser;

/// Plan lengths reported separately in payment statistics.
pub const REPORTED_PERIODS: [i64; 4] = [1, 3, 6, 12];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentStats {
    pub revenue_today: f64,
    pub revenue_week: f64,
    pub revenue_month: f64,
    /// Mean over every record, free ones included; rounded to cents.
    pub avg_payment: f64,
    /// `(period in months, number of records)` for each of [`REPORTED_PERIODS`].
    pub by_period: Vec<(i64, usize)>,
}

impl PaymentStats {
    pub fn count_for_period(&self, months: i64) -> usize {
        self.by_period
            .iter()
            .find(|(p, _)| *p == months)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: usize,
    pub active_subs: usize,
    pub expired_subs: usize,
    pub new_today: usize,
    pub new_week: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailedStats {
    pub users: UserStats,
    pub payments: PaymentStats,
}

/// Quick numbers shown on the admin panel home screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_users: usize,
    pub active_subs: usize,
    pub monthly_revenue: f64,
    pub new_today: usize,
}

impl From<&DetailedStats> for DashboardStats {
    fn from(s: &DetailedStats) -> Self {
        Self {
            total_users: s.users.total_users,
            active_subs: s.users.active_subs,
            monthly_revenue: s.payments.revenue_month,
            new_today: s.users.new_today,
        }
    }
}

pub fn payment_stats(payments: &[PaymentRecord], now: NaiveDateTime) -> PaymentStats {
    let today = now.date();
    let week_ago = now - Duration::days(7);
    let month_ago = now - Duration::days(30);

    let mut stats = PaymentStats::default();
    for p in payments {
        let Some(paid_at) = p.paid_at() else {
            continue;
        };
        if paid_at.date() == today {
            stats.revenue_today += p.amount;
        }
        if paid_at >= week_ago {
            stats.revenue_week += p.amount;
        }
        if paid_at >= month_ago {
            stats.revenue_month += p.amount;
        }
    }

    if !payments.is_empty() {
        let total: f64 = payments.iter().map(|p| p.amount).sum();
        stats.avg_payment = (total / payments.len() as f64 * 100.0).round() / 100.0;
    }

    stats.by_period = REPORTED_PERIODS
        .iter()
        .map(|&months| {
            let n = payments.iter().filter(|p| p.period_months == months).count();
            (months, n)
        })
        .collect();
    stats
}

/// Only subscriptions with the stored flag set are counted, split by derived status.
pub fn user_stats(users: &[BotUser], subs: &[Subscription], now: NaiveDateTime) -> UserStats {
    let week_ago = now - Duration::days(7);
    let mut stats = UserStats {
        total_users: users.len(),
        ..UserStats::default()
    };

    for sub in subs.iter().filter(|s| s.active && s.expiry_date.is_some()) {
        if sub.is_active_at(now) {
            stats.active_subs += 1;
        } else {
            stats.expired_subs += 1;
        }
    }

    for first_seen in users.iter().filter_map(BotUser::first_seen_at) {
        if first_seen.date() == now.date() {
            stats.new_today += 1;
        }
        if first_seen >= week_ago {
            stats.new_week += 1;
        }
    }
    stats
}

async fn load_detailed(
    store: &dyn AccountStore,
    now: NaiveDateTime,
) -> Result<DetailedStats, AppError> {
    let users = store.list_bot_users().await?;
    let subs = store.list_subscriptions().await?;
    let payments = store.list_payments().await?;
    Ok(DetailedStats {
        users: user_stats(&users, &subs, now),
        payments: payment_stats(&payments, now),
    })
}

/// Statistics for display; a store failure is logged and reported as zeros.
pub async fn collect(store: &dyn AccountStore, now: NaiveDateTime) -> DetailedStats {
    match load_detailed(store, now).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("failed to collect statistics: {}", e);
            DetailedStats {
                payments: PaymentStats {
                    by_period: REPORTED_PERIODS.iter().map(|&m| (m, 0)).collect(),
                    ..PaymentStats::default()
                },
                ..DetailedStats::default()
            }
        }
    }
}
