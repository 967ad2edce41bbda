use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::AppError;
use crate::storage::time::parse_stored;

/// Anyone who has ever talked to the bot.
#[derive(Debug, Clone, Serialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

impl BotUser {
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn first_seen_at(&self) -> Option<NaiveDateTime> {
        self.first_seen.as_deref().and_then(|s| parse_stored(s).ok())
    }
}

/// Profile fields reported by the chat platform on each interaction.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    #[cfg(test)]
    pub fn bare(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait BotUserStore: Send + Sync {
    /// Inserts the user on first contact, otherwise refreshes profile and last-seen.
    /// Returns `true` when the row was created.
    async fn touch_user(&self, profile: &UserProfile) -> Result<bool, AppError>;
    async fn get_bot_user(&self, id: i64) -> Result<Option<BotUser>, AppError>;
    async fn list_bot_users(&self) -> Result<Vec<BotUser>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_joins_present_parts() {
        let mut u = BotUser {
            id: 1,
            username: None,
            first_name: Some("Ivan".into()),
            last_name: Some("Petrov".into()),
            first_seen: None,
            last_seen: None,
        };
        assert_eq!(u.display_name().as_deref(), Some("Ivan Petrov"));
        u.last_name = Some("  ".into());
        assert_eq!(u.display_name().as_deref(), Some("Ivan"));
        u.first_name = None;
        assert_eq!(u.display_name(), None);
    }
}
