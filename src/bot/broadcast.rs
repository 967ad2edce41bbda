use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::time::Duration;

use crate::bot::messenger::{Media, Messenger, SendError};
use crate::error::AppError;
use crate::status;
use crate::storage::AccountStore;
use crate::subscription::Subscription;
use crate::users::BotUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Active,
    Inactive,
    Expiring,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Audience::All => "all",
            Audience::Active => "active",
            Audience::Inactive => "inactive",
            Audience::Expiring => "expiring",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Audience::All),
            "active" => Some(Audience::Active),
            "inactive" => Some(Audience::Inactive),
            "expiring" => Some(Audience::Expiring),
            _ => None,
        }
    }

    /// Dative phrase used in admin prompts ("рассылка ...").
    pub fn label(self) -> &'static str {
        match self {
            Audience::All => "всем пользователям",
            Audience::Active => "активным пользователям",
            Audience::Inactive => "неактивным пользователям",
            Audience::Expiring => "пользователям с истекающими подписками",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastContent {
    Text(String),
    Photo { photo: Media, caption: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub success: usize,
    pub failed: usize,
    pub blocked: usize,
    pub total: usize,
}

fn live(subs: &[Subscription], now: NaiveDateTime) -> impl Iterator<Item = &Subscription> {
    subs.iter().filter(move |s| s.is_enabled_and_active_at(now))
}

/// Recipient ids for an audience; `active` and `inactive` partition the bot users.
pub fn resolve_audience(
    audience: Audience,
    users: &[BotUser],
    subs: &[Subscription],
    now: NaiveDateTime,
) -> Vec<i64> {
    match audience {
        Audience::All => users.iter().map(|u| u.id).collect(),
        Audience::Active => live(subs, now).map(|s| s.user_id).collect(),
        Audience::Inactive => {
            let active: HashSet<i64> = live(subs, now).map(|s| s.user_id).collect();
            users
                .iter()
                .map(|u| u.id)
                .filter(|id| !active.contains(id))
                .collect()
        }
        Audience::Expiring => live(subs, now)
            .filter(|s| status::is_expiring_at(s.expiry_date.as_deref(), now))
            .map(|s| s.user_id)
            .collect(),
    }
}

pub async fn load_audience(
    store: &dyn AccountStore,
    audience: Audience,
    now: NaiveDateTime,
) -> Result<Vec<i64>, AppError> {
    let users = store.list_bot_users().await?;
    let subs = match audience {
        Audience::All => Vec::new(),
        _ => store.list_subscriptions().await?,
    };
    Ok(resolve_audience(audience, &users, &subs, now))
}

/// Sends `content` to every recipient in turn, spaced by `delay`. No retries.
pub async fn send_broadcast(
    messenger: &dyn Messenger,
    recipients: &[i64],
    content: &BroadcastContent,
    delay: Duration,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        total: recipients.len(),
        ..BroadcastReport::default()
    };

    for &chat_id in recipients {
        let sent = match content {
            BroadcastContent::Text(text) => messenger.send_text(chat_id, text, None).await,
            BroadcastContent::Photo { photo, caption } => {
                messenger.send_photo(chat_id, photo, caption, None).await
            }
        };
        match sent {
            Ok(_) => report.success += 1,
            Err(SendError::Blocked) => {
                report.blocked += 1;
                tracing::debug!(chat_id, "broadcast recipient blocked the bot");
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(chat_id, "broadcast send failed: {}", e);
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(
        success = report.success,
        failed = report.failed,
        blocked = report.blocked,
        total = report.total,
        "broadcast finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::time::parse_stored;
    use crate::test_support::{FakeMessenger, Sent};

    fn at(s: &str) -> NaiveDateTime {
        parse_stored(s).unwrap()
    }

    fn user(id: i64) -> BotUser {
        BotUser {
            id,
            username: None,
            first_name: None,
            last_name: None,
            first_seen: None,
            last_seen: None,
        }
    }

    fn sub(user_id: i64, active: bool, expiry: &str) -> Subscription {
        Subscription {
            user_id,
            active,
            payment_date: None,
            expiry_date: Some(expiry.into()),
            token: None,
            last_update: None,
        }
    }

    #[test]
    fn audiences_follow_flag_and_expiry() {
        let now = at("10.06.2026 12:00");
        let users: Vec<BotUser> = (1..=5).map(user).collect();
        let subs = vec![
            sub(1, true, "30.06.2026 12:00"),
            sub(2, true, "12.06.2026 12:00"),
            sub(3, true, "01.06.2026 12:00"),
            sub(4, false, "30.06.2026 12:00"),
        ];

        assert_eq!(resolve_audience(Audience::All, &users, &subs, now), vec![1, 2, 3, 4, 5]);
        assert_eq!(resolve_audience(Audience::Active, &users, &subs, now), vec![1, 2]);
        assert_eq!(resolve_audience(Audience::Inactive, &users, &subs, now), vec![3, 4, 5]);
        assert_eq!(resolve_audience(Audience::Expiring, &users, &subs, now), vec![2]);
    }

    #[tokio::test]
    async fn report_tallies_blocked_and_failed_separately() {
        let messenger = FakeMessenger::new();
        messenger.fail_for(2, SendError::Blocked);
        messenger.fail_for(3, SendError::Other("chat not found".into()));
        messenger.fail_for(4, SendError::Blocked);

        let report = send_broadcast(
            messenger.as_ref(),
            &[1, 2, 3, 4, 5],
            &BroadcastContent::Text("<b>news</b>".into()),
            Duration::ZERO,
        )
        .await;
        assert_eq!(
            report,
            BroadcastReport {
                success: 2,
                failed: 1,
                blocked: 2,
                total: 5
            }
        );
        assert_eq!(messenger.texts_to(5), vec!["<b>news</b>".to_string()]);
    }

    #[tokio::test]
    async fn photo_broadcast_uses_caption() {
        let messenger = FakeMessenger::new();
        let content = BroadcastContent::Photo {
            photo: Media::FileId("AgAC".into()),
            caption: "promo".into(),
        };
        send_broadcast(messenger.as_ref(), &[7], &content, Duration::ZERO).await;
        assert_eq!(
            messenger.sent(),
            vec![Sent::Photo {
                chat_id: 7,
                photo: Media::FileId("AgAC".into()),
                caption: "promo".into()
            }]
        );
    }
}
