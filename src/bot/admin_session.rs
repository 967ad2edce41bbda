//! Pending free-text prompts for administrators.
//!
//! Each admin has at most one prompt. Prompts expire after a fixed TTL and are
//! consumed by the first message that reads them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::bot::broadcast::Audience;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminPrompt {
    FindUser,
    GrantUserId,
    BroadcastMessage(Audience),
}

struct Pending {
    prompt: AdminPrompt,
    expires_at: Instant,
}

pub struct AdminSessions {
    ttl: Duration,
    pending: Mutex<HashMap<i64, Pending>>,
}

impl AdminSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a prompt, replacing whatever the admin was asked before.
    pub fn begin(&self, admin_id: i64, prompt: AdminPrompt) {
        self.begin_at(admin_id, prompt, Instant::now());
    }

    pub fn begin_at(&self, admin_id: i64, prompt: AdminPrompt, now: Instant) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(
            admin_id,
            Pending {
                prompt,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Removes and returns the admin's live prompt.
    pub fn take(&self, admin_id: i64) -> Option<AdminPrompt> {
        self.take_at(admin_id, Instant::now())
    }

    pub fn take_at(&self, admin_id: i64, now: Instant) -> Option<AdminPrompt> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let entry = pending.remove(&admin_id)?;
        (entry.expires_at > now).then_some(entry.prompt)
    }

    pub fn clear(&self, admin_id: i64) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(&admin_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_consumed_once() {
        let sessions = AdminSessions::new(Duration::from_secs(300));
        sessions.begin(1, AdminPrompt::FindUser);
        assert_eq!(sessions.take(1), Some(AdminPrompt::FindUser));
        assert_eq!(sessions.take(1), None);
        assert_eq!(sessions.take(2), None);
    }

    #[test]
    fn prompt_expires_after_ttl() {
        let sessions = AdminSessions::new(Duration::from_secs(300));
        let start = Instant::now();
        sessions.begin_at(1, AdminPrompt::GrantUserId, start);
        sessions.begin_at(2, AdminPrompt::GrantUserId, start);

        assert_eq!(
            sessions.take_at(1, start + Duration::from_secs(299)),
            Some(AdminPrompt::GrantUserId)
        );
        assert_eq!(sessions.take_at(2, start + Duration::from_secs(300)), None);
        // expired entry was dropped on access
        assert_eq!(sessions.take_at(2, start), None);
    }

    #[test]
    fn new_flow_overwrites_and_clear_discards() {
        let sessions = AdminSessions::new(Duration::from_secs(300));
        sessions.begin(1, AdminPrompt::FindUser);
        sessions.begin(1, AdminPrompt::BroadcastMessage(Audience::Active));
        assert_eq!(
            sessions.take(1),
            Some(AdminPrompt::BroadcastMessage(Audience::Active))
        );
        sessions.begin(1, AdminPrompt::FindUser);
        sessions.clear(1);
        assert_eq!(sessions.take(1), None);
    }
}
