use async_trait::async_trait;
use rusqlite::OptionalExtension;

use crate::error::AppError;
use crate::storage::database::Database;
use crate::storage::time::{now_local, to_stored_string};
use crate::users::{BotUser, BotUserStore, UserProfile};

fn row_to_bot_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<BotUser> {
    Ok(BotUser {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        first_seen: row.get(4)?,
        last_seen: row.get(5)?,
    })
}

#[async_trait]
impl BotUserStore for Database {
    async fn touch_user(&self, profile: &UserProfile) -> Result<bool, AppError> {
        let now_s = to_stored_string(&now_local());
        let conn = self.connection.lock().await;
        let exists = conn
            .query_row(
                "SELECT 1 FROM bot_users WHERE user_id = ?1",
                [profile.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if exists {
            conn.execute(
                "UPDATE bot_users
                 SET username = ?1, first_name = ?2, last_name = ?3, last_interaction = ?4
                 WHERE user_id = ?5",
                rusqlite::params![
                    &profile.username,
                    &profile.first_name,
                    &profile.last_name,
                    &now_s,
                    profile.id
                ],
            )?;
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO bot_users (user_id, username, first_name, last_name, first_interaction, last_interaction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![
                profile.id,
                &profile.username,
                &profile.first_name,
                &profile.last_name,
                &now_s
            ],
        )?;
        Ok(true)
    }

    async fn get_bot_user(&self, id: i64) -> Result<Option<BotUser>, AppError> {
        let conn = self.connection.lock().await;
        let user = conn
            .query_row(
                "SELECT user_id, username, first_name, last_name, first_interaction, last_interaction
                 FROM bot_users WHERE user_id = ?1",
                [id],
                row_to_bot_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn list_bot_users(&self) -> Result<Vec<BotUser>, AppError> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(
            "SELECT user_id, username, first_name, last_name, first_interaction, last_interaction
             FROM bot_users ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], row_to_bot_user)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn touch_user_inserts_then_refreshes_profile() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

        let created = db
            .touch_user(&UserProfile {
                id: 100,
                username: Some("ivan".into()),
                first_name: Some("Ivan".into()),
                last_name: None,
            })
            .await
            .unwrap();
        assert!(created);

        let first = db.get_bot_user(100).await.unwrap().unwrap();
        assert_eq!(first.username.as_deref(), Some("ivan"));
        assert!(first.first_seen_at().is_some());
        assert_eq!(first.first_seen, first.last_seen);

        let created_again = db
            .touch_user(&UserProfile {
                id: 100,
                username: Some("ivan_new".into()),
                first_name: Some("Ivan".into()),
                last_name: Some("P".into()),
            })
            .await
            .unwrap();
        assert!(!created_again);

        let second = db.get_bot_user(100).await.unwrap().unwrap();
        assert_eq!(second.username.as_deref(), Some("ivan_new"));
        assert_eq!(second.display_name().as_deref(), Some("Ivan P"));
        assert_eq!(second.first_seen, first.first_seen);
    }

    #[tokio::test]
    async fn list_and_missing_lookup() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

        assert!(db.get_bot_user(1).await.unwrap().is_none());
        for id in [3, 1, 2] {
            db.touch_user(&UserProfile::bare(id)).await.unwrap();
        }
        let ids: Vec<i64> = db
            .list_bot_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
