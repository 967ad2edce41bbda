use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};

use crate::error::AppError;
use crate::storage::database::Database;
use crate::storage::time::{now_local, to_stored_string};
use crate::subscription::{Subscription, SubscriptionStore, SubscriptionUpsert};

const SELECT_COLUMNS: &str =
    "SELECT user_id, subscribed, payment_date, expiry_date, config, last_update FROM users";

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let subscribed: Option<bool> = row.get(1)?;
    Ok(Subscription {
        user_id: row.get(0)?,
        active: subscribed.unwrap_or(false),
        payment_date: row.get(2)?,
        expiry_date: row.get(3)?,
        token: row.get(4)?,
        last_update: row.get(5)?,
    })
}

/// Full row write used by the renewal transaction.
pub(crate) fn upsert_row(conn: &Connection, upsert: &SubscriptionUpsert) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO users (user_id, subscribed, payment_date, expiry_date, config, last_update)
         VALUES (?1, 1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
            subscribed = 1,
            payment_date = excluded.payment_date,
            expiry_date = excluded.expiry_date,
            config = excluded.config,
            last_update = excluded.last_update",
        rusqlite::params![
            upsert.user_id,
            to_stored_string(&upsert.payment_date),
            to_stored_string(&upsert.expiry),
            &upsert.token,
            to_stored_string(&now_local()),
        ],
    )
}

#[cfg(test)]
impl Database {
    pub async fn upsert_subscription(&self, upsert: &SubscriptionUpsert) -> Result<(), AppError> {
        let conn = self.connection.lock().await;
        upsert_row(&conn, upsert)?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>, AppError> {
        let conn = self.connection.lock().await;
        let sub = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE user_id = ?1"),
                [user_id],
                row_to_subscription,
            )
            .optional()?;
        Ok(sub)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, AppError> {
        let conn = self.connection.lock().await;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY user_id"))?;
        let rows = stmt.query_map([], row_to_subscription)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    async fn update_expiry(
        &self,
        user_id: i64,
        expiry: NaiveDateTime,
        active: bool,
    ) -> Result<bool, AppError> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE users SET expiry_date = ?1, subscribed = ?2, last_update = ?3 WHERE user_id = ?4",
            rusqlite::params![
                to_stored_string(&expiry),
                active,
                to_stored_string(&now_local()),
                user_id
            ],
        )?;
        Ok(n > 0)
    }

    async fn set_active(&self, user_id: i64, active: bool) -> Result<bool, AppError> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE users SET subscribed = ?1, last_update = ?2 WHERE user_id = ?3",
            rusqlite::params![active, to_stored_string(&now_local()), user_id],
        )?;
        Ok(n > 0)
    }

    async fn set_token(&self, user_id: i64, token: &str) -> Result<bool, AppError> {
        let conn = self.connection.lock().await;
        let n = conn.execute(
            "UPDATE users SET config = ?1, last_update = ?2 WHERE user_id = ?3",
            rusqlite::params![token, to_stored_string(&now_local()), user_id],
        )?;
        Ok(n > 0)
    }
}
